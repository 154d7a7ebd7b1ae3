// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Analysis project lifecycle.
//!
//! Projects live in the analysis folders as
//! `{project}/{sample}/{yymmdd}_{position}{flowcell}/`. The best-practice
//! pipeline leaves a `project-summary.csv` per flowcell when done and a
//! `{sample}-bcbb.log` (or `{sample}-drmaa.err`) while it runs; delivery and
//! clean-up drop `FINISHED_AND_DELIVERED` / `FINISHED_AND_REMOVED` into the
//! sample folder, each holding a timestamp per line.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::facts::modified_at;
use crate::stall::Lifecycle;

static PROJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z._]+\d{2}_\d{2,}$").expect("project pattern is valid"));
static FLOWCELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{6}_\S+$").expect("flowcell pattern is valid"));

pub const DELIVERED_MARKER: &str = "FINISHED_AND_DELIVERED";
pub const REMOVED_MARKER: &str = "FINISHED_AND_REMOVED";
pub const PROJECT_SUMMARY: &str = "project-summary.csv";
const MARKER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.fZ";

/// Where an analysis project is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStage {
    Sequencing,
    BcbbAnalysis,
    BestPracticeAndDelivery,
    FinishedAndDelivered,
    FinishedAndRemoved,
    CheckStatus,
}

impl ProjectStage {
    pub const ALL: [ProjectStage; 6] = [
        ProjectStage::Sequencing,
        ProjectStage::BcbbAnalysis,
        ProjectStage::BestPracticeAndDelivery,
        ProjectStage::FinishedAndDelivered,
        ProjectStage::FinishedAndRemoved,
        ProjectStage::CheckStatus,
    ];

    /// Lists whose cards the project pass re-evaluates.
    pub const TRACKED: [ProjectStage; 4] = [
        ProjectStage::BcbbAnalysis,
        ProjectStage::BestPracticeAndDelivery,
        ProjectStage::FinishedAndDelivered,
        ProjectStage::CheckStatus,
    ];

    pub fn list_name(&self) -> &'static str {
        match self {
            ProjectStage::Sequencing => "Sequencing",
            ProjectStage::BcbbAnalysis => "bcbb analysis",
            ProjectStage::BestPracticeAndDelivery => "Best practice and delivery",
            ProjectStage::FinishedAndDelivered => "Finished and delivered",
            ProjectStage::FinishedAndRemoved => "Finished and removed",
            ProjectStage::CheckStatus => "Check status",
        }
    }
}

impl fmt::Display for ProjectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.list_name())
    }
}

impl Lifecycle for ProjectStage {
    fn check_status() -> Self {
        ProjectStage::CheckStatus
    }

    fn list_name(&self) -> &'static str {
        ProjectStage::list_name(self)
    }

    fn from_list_name(name: &str) -> Option<Self> {
        ProjectStage::ALL.into_iter().find(|s| s.list_name() == name)
    }

    fn is_stall_exempt(&self) -> bool {
        matches!(
            self,
            ProjectStage::FinishedAndDelivered | ProjectStage::FinishedAndRemoved
        )
    }
}

/// Allowances used for project due dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTiming {
    /// How long a removed project's card stays on the board.
    pub keep_card: Duration,
    /// How long delivered data is kept before removal.
    pub keep_data: Duration,
    /// Time from analysis summary to delivery.
    pub delivery: Duration,
    /// Time from the latest pipeline log to analysis completion.
    pub analysis: Duration,
    /// A pipeline log untouched for longer than this is inactive.
    pub log_inactive: Duration,
}

impl Default for ProjectTiming {
    fn default() -> Self {
        Self {
            keep_card: Duration::days(14),
            keep_data: Duration::days(14),
            delivery: Duration::days(7),
            analysis: Duration::days(2),
            log_inactive: Duration::hours(3),
        }
    }
}

/// One flowcell folder of a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowcellNode {
    pub name: String,
    pub path: PathBuf,
    /// Modification time of `project-summary.csv`.
    pub summary_at: Option<DateTime<Utc>>,
    /// Modification time of the pipeline log.
    pub log_at: Option<DateTime<Utc>>,
}

/// One sample folder of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleNode {
    pub name: String,
    pub path: PathBuf,
    pub delivered: Option<DateTime<Utc>>,
    pub removed: Option<DateTime<Utc>>,
    pub flowcells: Vec<FlowcellNode>,
}

/// Snapshot of a project's analysis folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTree {
    pub name: String,
    pub path: PathBuf,
    pub samples: Vec<SampleNode>,
}

impl ProjectTree {
    /// Scans the first analysis folder holding `project`.
    pub fn scan(analysis_folders: &[PathBuf], project: &str) -> Result<Option<Self>> {
        let Some(path) = analysis_folders
            .iter()
            .map(|f| f.join(project))
            .find(|p| p.is_dir())
        else {
            return Ok(None);
        };

        let mut samples = Vec::new();
        for sample_path in subdirectories(&path, None)? {
            let name = file_name(&sample_path);
            let mut flowcells = Vec::new();
            for fc_path in subdirectories(&sample_path, Some(&FLOWCELL_RE))? {
                let log_at = [format!("{name}-drmaa.err"), format!("{name}-bcbb.log")]
                    .iter()
                    .filter_map(|log| optional_mtime(&fc_path.join(log)).transpose())
                    .collect::<Result<Vec<_>>>()?
                    .into_iter()
                    .max();
                flowcells.push(FlowcellNode {
                    name: file_name(&fc_path),
                    summary_at: optional_mtime(&fc_path.join(PROJECT_SUMMARY))?,
                    log_at,
                    path: fc_path,
                });
            }
            samples.push(SampleNode {
                delivered: read_marker(&sample_path.join(DELIVERED_MARKER))?,
                removed: read_marker(&sample_path.join(REMOVED_MARKER))?,
                name,
                path: sample_path,
                flowcells,
            });
        }
        samples.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Some(Self {
            name: project.to_string(),
            path,
            samples,
        }))
    }

    fn flowcells(&self) -> impl Iterator<Item = &FlowcellNode> {
        self.samples.iter().flat_map(|s| s.flowcells.iter())
    }
}

/// Infers a project's stage and due date. Rules, first match wins:
///
/// | Condition | Stage | Due |
/// |-----------|-------|-----|
/// | every sample removed | Finished and removed | last removal + keep_card |
/// | every sample delivered | Finished and delivered | last delivery + keep_data |
/// | every flowcell summarized | Best practice and delivery | last summary + delivery |
/// | every other flowcell has an active log | bcbb analysis | last log + analysis |
/// | otherwise | Check status | now |
pub fn infer_project(
    tree: &ProjectTree,
    timing: &ProjectTiming,
    now: DateTime<Utc>,
) -> (ProjectStage, DateTime<Utc>) {
    if tree.samples.is_empty() {
        return (ProjectStage::CheckStatus, now);
    }

    let removed: Option<Vec<_>> = tree.samples.iter().map(|s| s.removed).collect();
    if let Some(last) = removed.and_then(|r| r.into_iter().max()) {
        return (ProjectStage::FinishedAndRemoved, last + timing.keep_card);
    }

    let delivered: Option<Vec<_>> = tree.samples.iter().map(|s| s.delivered).collect();
    if let Some(last) = delivered.and_then(|d| d.into_iter().max()) {
        return (ProjectStage::FinishedAndDelivered, last + timing.keep_data);
    }

    if tree.flowcells().next().is_none() {
        return (ProjectStage::CheckStatus, now);
    }

    let summaries: Option<Vec<_>> = tree.flowcells().map(|fc| fc.summary_at).collect();
    if let Some(last) = summaries.and_then(|s| s.into_iter().max()) {
        return (ProjectStage::BestPracticeAndDelivery, last + timing.delivery);
    }

    let active = tree
        .flowcells()
        .filter(|fc| fc.summary_at.is_none())
        .all(|fc| fc.log_at.is_some_and(|at| at + timing.log_inactive > now));
    if active && let Some(last) = tree.flowcells().filter_map(|fc| fc.log_at).max() {
        return (ProjectStage::BcbbAnalysis, last + timing.analysis);
    }

    (ProjectStage::CheckStatus, now)
}

/// Project folders in the analysis folders, by name.
pub fn list_projects(analysis_folders: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut projects = Vec::new();
    for folder in analysis_folders {
        projects.extend(subdirectories(folder, Some(&PROJECT_RE))?);
    }
    Ok(projects)
}

/// Whether `name` looks like a project name.
pub fn is_project_name(name: &str) -> bool {
    PROJECT_RE.is_match(name)
}

/// The folder a sample's data for one flowcell lands in, if it exists.
pub fn sample_analysis_folder(
    analysis_folders: &[PathBuf],
    project: &str,
    sample: &str,
    flowcell: &str,
) -> Option<PathBuf> {
    analysis_folders
        .iter()
        .map(|f| f.join(project).join(sample).join(flowcell))
        .find(|p| p.exists())
}

/// Reads the latest timestamp in a delivery marker.
///
/// A marker without a parsable line still counts, as of its mtime.
pub fn read_marker(path: &Path) -> Result<Option<DateTime<Utc>>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let latest = content
        .lines()
        .filter_map(|l| NaiveDateTime::parse_from_str(l.trim(), MARKER_TIMESTAMP_FORMAT).ok())
        .map(|n| n.and_utc())
        .max();
    match latest {
        Some(at) => Ok(Some(at)),
        None => modified_at(path).map(Some),
    }
}

fn optional_mtime(path: &Path) -> Result<Option<DateTime<Utc>>> {
    match modified_at(path) {
        Ok(at) => Ok(Some(at)),
        Err(crate::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn subdirectories(path: &Path, pattern: Option<&Regex>) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry?;
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|n| pattern.is_none_or(|re| re.is_match(n)));
        if matches && entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs::File;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2014, 3, 10, 12, 0, 0).unwrap()
    }

    fn flowcell(summary: Option<i64>, log: Option<i64>) -> FlowcellNode {
        FlowcellNode {
            name: "140301_AC3VXXACXX".to_string(),
            path: PathBuf::new(),
            summary_at: summary.map(|h| now() - Duration::hours(h)),
            log_at: log.map(|h| now() - Duration::hours(h)),
        }
    }

    fn sample(name: &str, flowcells: Vec<FlowcellNode>) -> SampleNode {
        SampleNode {
            name: name.to_string(),
            path: PathBuf::new(),
            delivered: None,
            removed: None,
            flowcells,
        }
    }

    fn tree(samples: Vec<SampleNode>) -> ProjectTree {
        ProjectTree {
            name: "J.Doe_14_01".to_string(),
            path: PathBuf::new(),
            samples,
        }
    }

    #[test]
    fn test_removed_wins_over_delivered() {
        let mut a = sample("P1_101", vec![flowcell(Some(100), None)]);
        let mut b = sample("P1_102", vec![flowcell(Some(100), None)]);
        a.delivered = Some(now() - Duration::days(20));
        b.delivered = Some(now() - Duration::days(20));
        a.removed = Some(now() - Duration::days(3));
        b.removed = Some(now() - Duration::days(2));

        let timing = ProjectTiming::default();
        let (stage, due) = infer_project(&tree(vec![a.clone(), b.clone()]), &timing, now());
        assert_eq!(stage, ProjectStage::FinishedAndRemoved);
        assert_eq!(due, now() + Duration::days(12));

        b.removed = None;
        let (stage, due) = infer_project(&tree(vec![a, b]), &timing, now());
        assert_eq!(stage, ProjectStage::FinishedAndDelivered);
        assert_eq!(due, now() - Duration::days(6));
    }

    #[test]
    fn test_all_summarized_is_best_practice() {
        let t = tree(vec![
            sample("P1_101", vec![flowcell(Some(10), Some(20))]),
            sample("P1_102", vec![flowcell(Some(5), Some(20))]),
        ]);
        let (stage, due) = infer_project(&t, &ProjectTiming::default(), now());
        assert_eq!(stage, ProjectStage::BestPracticeAndDelivery);
        assert_eq!(due, now() - Duration::hours(5) + Duration::days(7));
    }

    #[test]
    fn test_active_logs_are_bcbb_analysis() {
        let t = tree(vec![
            sample("P1_101", vec![flowcell(Some(10), Some(30))]),
            sample("P1_102", vec![flowcell(None, Some(1))]),
        ]);
        let (stage, due) = infer_project(&t, &ProjectTiming::default(), now());
        assert_eq!(stage, ProjectStage::BcbbAnalysis);
        assert_eq!(due, now() - Duration::hours(1) + Duration::days(2));
    }

    #[test]
    fn test_inactive_log_needs_attention() {
        let t = tree(vec![sample("P1_101", vec![flowcell(None, Some(4))])]);
        assert_eq!(
            infer_project(&t, &ProjectTiming::default(), now()),
            (ProjectStage::CheckStatus, now())
        );
        assert_eq!(
            infer_project(&tree(vec![]), &ProjectTiming::default(), now()).0,
            ProjectStage::CheckStatus
        );
    }

    #[test]
    fn test_finished_stages_are_stall_exempt() {
        assert!(ProjectStage::FinishedAndRemoved.is_stall_exempt());
        assert!(!ProjectStage::BcbbAnalysis.is_stall_exempt());
        assert_eq!(
            <ProjectStage as Lifecycle>::from_list_name("bcbb analysis"),
            Some(ProjectStage::BcbbAnalysis)
        );
    }

    #[test]
    fn test_scan_project_folder() {
        let analysis = tempfile::tempdir().unwrap();
        let fc = analysis.path().join("J.Doe_14_01/P1_101/140301_AC3VXXACXX");
        fs::create_dir_all(&fc).unwrap();
        fs::create_dir_all(analysis.path().join("J.Doe_14_01/P1_101/notes")).unwrap();
        File::create(fc.join("P1_101-bcbb.log")).unwrap();
        fs::write(
            analysis.path().join("J.Doe_14_01/P1_101").join(DELIVERED_MARKER),
            "2014-03-01 10:00:00.000000Z\n2014-03-02 11:30:00.5Z\n",
        )
        .unwrap();

        let folders = vec![analysis.path().to_path_buf()];
        let tree = ProjectTree::scan(&folders, "J.Doe_14_01").unwrap().unwrap();
        assert_eq!(tree.samples.len(), 1);
        let sample = &tree.samples[0];
        assert_eq!(sample.flowcells.len(), 1);
        assert!(sample.flowcells[0].log_at.is_some());
        assert!(sample.flowcells[0].summary_at.is_none());
        assert_eq!(
            sample.delivered,
            Some(Utc.with_ymd_and_hms(2014, 3, 2, 11, 30, 0).unwrap() + Duration::milliseconds(500))
        );
        assert!(ProjectTree::scan(&folders, "A.Smith_14_02").unwrap().is_none());
    }

    #[test]
    fn test_list_projects_filters_names() {
        let analysis = tempfile::tempdir().unwrap();
        for name in ["J.Doe_14_01", "A_Smith_13_123", "tmp", "J.Doe_14"] {
            fs::create_dir_all(analysis.path().join(name)).unwrap();
        }
        File::create(analysis.path().join("B.Adams_14_02")).unwrap();
        let projects = list_projects(&[analysis.path().to_path_buf()]).unwrap();
        let names: Vec<String> = projects.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["A_Smith_13_123", "J.Doe_14_01"]);
        assert!(is_project_name("J.Doe_14_01"));
    }
}
