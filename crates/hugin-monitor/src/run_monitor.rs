// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run board pass.
//!
//! Scans the run folders, infers each run's stage and due date, and
//! reconciles the run board. Runs are processed concurrently, bounded by the
//! configured concurrency, and each run has its own error boundary: a failure
//! is logged and counted, and the pass continues with the other runs.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use hugin_core::cycle_log::read_cycle_log;
use hugin_core::stall;
use hugin_core::{
    BoardRef, BoardService, Card, Description, Inference, RunDescriptor, RunFacts, RunFolderName,
    RunInfo, RunMetadataReader, RunMode, RunParameters, SampleSheet, SequencerFamily, SortKey,
    Stage, StallVerdict, TransferLog, infer,
};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, MonitorConfig};
use crate::error::{Error, Result};
use crate::notify::StatusNotifier;
use crate::reconciler::{CardPlan, Outcome, Reconciler};

/// Lists whose cards are archived once old enough.
pub const ARCHIVED_RUN_LISTS: [Stage; 3] = [Stage::HandedOver, Stage::Aborted, Stage::Archived];

/// Everything known about one run before reconciliation.
#[derive(Debug, Clone)]
pub struct RunAssessment {
    pub descriptor: RunDescriptor,
    pub inference: Inference,
    pub verdict: StallVerdict<Stage>,
    pub plan: CardPlan<Stage>,
}

/// Counts from one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub seen: usize,
    pub created: usize,
    pub moved: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// Runs excluded from tracking, such as MiSeq runs without a tracked description.
    pub untracked: usize,
    pub failed: usize,
}

impl PassSummary {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Moved => self.moved += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

/// Tracks sequencing runs on the run board.
pub struct RunMonitor {
    config: Arc<MonitorConfig>,
    board: Arc<dyn BoardService>,
    metadata: Arc<dyn RunMetadataReader>,
    notifier: StatusNotifier,
}

impl RunMonitor {
    pub fn new(
        config: Arc<MonitorConfig>,
        board: Arc<dyn BoardService>,
        metadata: Arc<dyn RunMetadataReader>,
        notifier: StatusNotifier,
    ) -> Self {
        Self {
            config,
            board,
            metadata,
            notifier,
        }
    }

    async fn resolve_board(&self, name: Option<&String>, key: &'static str) -> Result<BoardRef> {
        let name = name.ok_or(ConfigError::MissingEnvVar(key))?;
        self.board
            .find_board(name)
            .await?
            .ok_or_else(|| Error::BoardNotFound(name.clone()))
    }

    /// Run folders in the configured folders and their nosync sub-folders.
    pub fn discover_runs(&self) -> Vec<PathBuf> {
        let mut runs = Vec::new();
        for folder in &self.config.run_folders {
            for parent in [folder.clone(), folder.join(&self.config.nosync_folder)] {
                match run_folders_in(&parent) {
                    Ok(found) => runs.extend(found),
                    Err(e) if e.kind() == io::ErrorKind::NotFound && parent != *folder => {}
                    Err(e) => warn!(folder = %parent.display(), error = %e, "Cannot list run folder"),
                }
            }
        }
        runs.sort();
        runs
    }

    /// Infers the state of the run at `path`. `None` means the run is not tracked.
    pub fn assess(&self, path: &Path, now: DateTime<Utc>) -> Result<Option<RunAssessment>> {
        let config = &self.config;
        let name = RunFolderName::from_path(path)
            .ok_or_else(|| hugin_core::Error::InvalidRunFolder(path.display().to_string()))?;

        let info = self.metadata.read_run_info(path)?;
        let params = self.metadata.read_run_parameters(path)?;
        let run_mode = params.run_mode.as_deref().and_then(|mode| match mode.parse::<RunMode>() {
            Ok(mode) => Some(mode),
            Err(e) => {
                debug!(run = %name, error = %e, "Ignoring run mode");
                None
            }
        });
        let descriptor = RunDescriptor::new(name, path, info.reads.clone(), run_mode)?;

        let sheet = self.sample_sheet(&descriptor);
        if descriptor.family == SequencerFamily::MiSeq && !self.is_tracked_miseq(sheet.as_ref()) {
            debug!(run = %descriptor.id(), "MiSeq run without a tracked description");
            return Ok(None);
        }

        let transfer_log = data_folder(path, &config.nosync_folder).join(&config.transfer_log);
        let transfers = TransferLog::read(&transfer_log)?;
        let facts = RunFacts::collect(
            &descriptor,
            &config.sentinels,
            &config.nosync_folder,
            Some(&transfers),
        )?;
        let cycles = read_cycle_log(&path.join(&config.sentinels.cycle_log))?;

        let inference = infer(&descriptor, &facts, cycles.as_deref(), &config.timing, now);
        let (verdict, reason) = stall::check_run(&inference, cycles.as_deref(), &config.timing, now);
        let description = self.describe(
            &descriptor,
            &info,
            &params,
            sheet.as_ref(),
            &verdict,
            reason.as_deref(),
        );

        let plan = CardPlan {
            name: descriptor.id().to_string(),
            stage: verdict.effective,
            due: inference.due,
            description,
            reason,
        };
        Ok(Some(RunAssessment {
            descriptor,
            inference,
            verdict,
            plan,
        }))
    }

    fn sample_sheet(&self, run: &RunDescriptor) -> Option<SampleSheet> {
        let path = SampleSheet::locate(
            &run.name.flowcell_id,
            &self.config.samplesheet_folders,
            &run.path,
        )?;
        match SampleSheet::from_path(&path) {
            Ok(sheet) => Some(sheet),
            Err(e) => {
                warn!(run = %run.id(), error = %e, "Ignoring unreadable sample sheet");
                None
            }
        }
    }

    fn is_tracked_miseq(&self, sheet: Option<&SampleSheet>) -> bool {
        let tracked = &self.config.miseq_descriptions;
        if tracked.is_empty() {
            return true;
        }
        sheet.is_some_and(|sheet| {
            sheet
                .descriptions()
                .iter()
                .any(|d| tracked.iter().any(|t| t.eq_ignore_ascii_case(d)))
        })
    }

    fn describe(
        &self,
        run: &RunDescriptor,
        info: &RunInfo,
        params: &RunParameters,
        sheet: Option<&SampleSheet>,
        verdict: &StallVerdict<Stage>,
        warning: Option<&str>,
    ) -> Description {
        let mut description = Description::new();
        if let Some(sheet) = sheet {
            let projects = sheet.projects();
            if !projects.is_empty() {
                description.insert_list("Projects", projects);
            }
        }
        description.insert("Setup", run.setup());
        if let Some(index) = run.index_setup() {
            description.insert("Index", index);
        }
        description.insert("Flowcell", &run.name.flowcell_id);
        let instrument = info.instrument.as_deref().unwrap_or(&run.name.instrument);
        description.insert("Instrument", self.config.instrument_label(instrument));
        description.insert("Date", info.date.as_deref().unwrap_or(&run.name.date));
        description.insert("Run mode", run.run_mode.to_string());
        if let Some(lanes) = info.lane_count {
            description.insert("Lanes", lanes.to_string());
        }
        if let Some(tiles) = info.tiles_per_lane {
            description.insert("Tiles", tiles.to_string());
        }
        if let Some(chemistry) = &params.chemistry {
            description.insert("Chemistry", chemistry);
        }
        description.insert("Processed in", &self.config.host);
        description.insert("Status", verdict.inferred.list_name());
        if let Some(warning) = warning {
            description.insert("Warning", warning);
        }
        description
    }

    async fn process(
        &self,
        reconciler: &Reconciler,
        path: &Path,
        now: DateTime<Utc>,
    ) -> Result<Option<Outcome>> {
        let name = RunFolderName::from_path(path)
            .ok_or_else(|| hugin_core::Error::InvalidRunFolder(path.display().to_string()))?;
        if reconciler.is_settled::<Stage>(&name.id).await? {
            debug!(run = %name, "Run card is settled, not reading the run folder");
            return Ok(Some(Outcome::Skipped));
        }
        let Some(assessment) = self.assess(path, now)? else {
            return Ok(None);
        };
        debug!(
            run = %assessment.descriptor.id(),
            stage = %assessment.inference.stage,
            effective = %assessment.verdict.effective,
            due = %assessment.inference.due,
            "Inferred run state"
        );
        Ok(Some(reconciler.reconcile(&assessment.plan).await?))
    }

    /// One pass over all run folders.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<PassSummary> {
        if self.config.run_folders.is_empty() {
            return Err(ConfigError::MissingEnvVar("HUGIN_RUN_FOLDERS").into());
        }
        let target = self
            .resolve_board(self.config.run_board.as_ref(), "HUGIN_RUN_BOARD")
            .await?;
        let reconciler = Reconciler::new(self.board.clone(), target, "run")
            .with_refresh_keys(self.config.refresh_keys.clone())
            .with_notifier(self.notifier.clone());

        let runs = self.discover_runs();
        info!(runs = runs.len(), board = %reconciler.target().name, "Starting run pass");

        let semaphore = Semaphore::new(self.config.concurrency.max(1));
        let results = join_all(runs.iter().map(|path| {
            let semaphore = &semaphore;
            let reconciler = &reconciler;
            async move {
                let _permit = semaphore.acquire().await;
                (path, self.process(reconciler, path, now).await)
            }
        }))
        .await;

        let mut summary = PassSummary {
            seen: runs.len(),
            ..Default::default()
        };
        for (path, result) in results {
            match result {
                Ok(Some(outcome)) => summary.record(outcome),
                Ok(None) => summary.untracked += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(run = %path.display(), error = %e, "Failed to process run");
                    summary.failed += 1;
                }
            }
        }

        let in_nosync: BTreeSet<String> = runs
            .iter()
            .filter(|p| is_in_nosync(p, &self.config.nosync_folder))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        if let Err(e) = self.retire_vanished_nosync(&reconciler, &in_nosync).await {
            error!(error = %e, "Failed to retire nosync cards");
        }

        reconciler.sort_touched().await?;
        info!(
            seen = summary.seen,
            created = summary.created,
            moved = summary.moved,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Run pass finished"
        );
        Ok(summary)
    }

    /// Moves this host's nosync cards whose folder is gone to `Archived`.
    async fn retire_vanished_nosync(
        &self,
        reconciler: &Reconciler,
        present: &BTreeSet<String>,
    ) -> Result<usize> {
        let board = reconciler.board();
        let Some(list) = board
            .get_list(reconciler.target(), Stage::Nosync.list_name())
            .await?
        else {
            return Ok(0);
        };

        let mut retired = 0;
        for card in board.list_cards(&list).await? {
            let processed_in = card.metadata().get_joined("Processed in");
            let here = processed_in.as_deref() == Some(self.config.host.as_str());
            if here && !present.contains(&card.name) {
                reconciler.move_to(&card, Stage::Archived).await?;
                retired += 1;
            }
        }
        Ok(retired)
    }

    /// Archives terminal run cards older than the retention window.
    ///
    /// Returns `Ok(0)` without touching the board when no archive board is
    /// configured.
    pub async fn archive_pass(&self, now: DateTime<Utc>) -> Result<usize> {
        if self.config.run_archive_board.is_none() {
            info!("No run archive board configured, archiving disabled");
            return Ok(0);
        }
        let target = self
            .resolve_board(self.config.run_board.as_ref(), "HUGIN_RUN_BOARD")
            .await?;
        let archive = self
            .resolve_board(self.config.run_archive_board.as_ref(), "HUGIN_RUN_ARCHIVE_BOARD")
            .await?;

        let reconciler = Reconciler::new(self.board.clone(), target, "run");
        let sources: Vec<&str> = ARCHIVED_RUN_LISTS.iter().map(|s| s.list_name()).collect();
        let today = now.date_naive();
        let retention = self.config.retention;

        let archived = reconciler
            .archive(&archive, &sources, SortKey::Alphabetical, |card| {
                run_start_date(card).filter(|start| today.signed_duration_since(*start) > retention)
            })
            .await?;
        info!(archived, board = %archive.name, "Run archiving finished");
        Ok(archived)
    }
}

/// Start date of the run on `card`: the `Date` key (`yymmdd` or
/// `m/d/yyyy`), else the date prefix of the card name.
pub fn run_start_date(card: &Card) -> Option<NaiveDate> {
    card.metadata()
        .get_joined("Date")
        .and_then(|date| {
            NaiveDate::parse_from_str(&date, "%y%m%d")
                .or_else(|_| NaiveDate::parse_from_str(&date, "%m/%d/%Y"))
                .ok()
        })
        .or_else(|| RunFolderName::parse(&card.name).and_then(|name| name.start_date()))
}

fn run_folders_in(parent: &Path) -> io::Result<Vec<PathBuf>> {
    let mut runs = Vec::new();
    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if RunFolderName::parse(&name.to_string_lossy()).is_some() {
            runs.push(entry.path());
        }
    }
    Ok(runs)
}

fn is_in_nosync(path: &Path, nosync: &str) -> bool {
    path.parent()
        .and_then(|p| p.file_name())
        .is_some_and(|n| n == nosync)
}

/// The configured folder a run lives in, looking through the nosync folder.
fn data_folder(run: &Path, nosync: &str) -> PathBuf {
    let parent = run.parent().unwrap_or(run);
    if is_in_nosync(run, nosync) {
        parent.parent().unwrap_or(parent).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}
