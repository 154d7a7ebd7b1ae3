// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hand-over detection.
//!
//! A run in an archive folder is handed over once every sample of its sample
//! sheet has landed in the analysis folders. Its run card then moves to
//! `Handed over` and every project of the run gets a card in `bcbb analysis`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hugin_core::project::sample_analysis_folder;
use hugin_core::{
    BoardRef, BoardService, Description, ProjectStage, RunFolderName, SampleSheet, SortKey, Stage,
};
use tracing::{debug, error, info};

use crate::config::{ConfigError, MonitorConfig};
use crate::error::{Error, Result};
use crate::reconciler::Reconciler;

/// Description key listing the runs a project has received.
pub const RUNS_KEY: &str = "Runs";

/// Counts from one hand-over pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandoverSummary {
    pub checked: usize,
    pub handed_over: usize,
    /// Runs with samples still missing from the analysis folders.
    pub pending: usize,
    pub failed: usize,
}

/// Moves fully transferred runs to `Handed over` and opens their projects.
pub struct HandoverMonitor {
    config: Arc<MonitorConfig>,
    board: Arc<dyn BoardService>,
}

impl HandoverMonitor {
    pub fn new(config: Arc<MonitorConfig>, board: Arc<dyn BoardService>) -> Self {
        Self { config, board }
    }

    async fn resolve_board(&self, name: Option<&String>, key: &'static str) -> Result<BoardRef> {
        let name = name.ok_or(ConfigError::MissingEnvVar(key))?;
        self.board
            .find_board(name)
            .await?
            .ok_or_else(|| Error::BoardNotFound(name.clone()))
    }

    /// Run folders in the archive folders.
    fn archived_runs(&self) -> Vec<(RunFolderName, PathBuf)> {
        let mut runs = Vec::new();
        for folder in &self.config.archive_folders {
            let entries = match std::fs::read_dir(folder) {
                Ok(entries) => entries,
                Err(e) => {
                    error!(folder = %folder.display(), error = %e, "Cannot list archive folder");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if let Some(name) = RunFolderName::from_path(&path).filter(|_| path.is_dir()) {
                    runs.push((name, path));
                }
            }
        }
        runs.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        runs
    }

    /// The run's projects when all its samples have been delivered to the
    /// analysis folders, `None` otherwise.
    pub fn delivered_projects(
        &self,
        name: &RunFolderName,
        path: &Path,
    ) -> Result<Option<Vec<String>>> {
        // Archived runs carry their own sheet
        let Some(sheet_path) = SampleSheet::locate(&name.flowcell_id, &[], path) else {
            debug!(run = %name, "No sample sheet");
            return Ok(None);
        };
        let sheet = SampleSheet::from_path(&sheet_path)?;
        let pairs = sheet.project_samples();
        if pairs.is_empty() {
            return Ok(None);
        }

        let flowcell = name.short_name();
        let complete = pairs.iter().all(|(project, sample)| {
            sample_analysis_folder(&self.config.analysis_folders, project, sample, &flowcell)
                .is_some()
        });
        Ok(complete.then(|| sheet.projects()))
    }

    /// One pass over the archive folders.
    pub async fn handover_pass(&self) -> Result<HandoverSummary> {
        if self.config.archive_folders.is_empty() {
            return Err(ConfigError::MissingEnvVar("HUGIN_ARCHIVE_FOLDERS").into());
        }
        let run_board = self
            .resolve_board(self.config.run_board.as_ref(), "HUGIN_RUN_BOARD")
            .await?;
        let project_board = self
            .resolve_board(self.config.project_board.as_ref(), "HUGIN_PROJECT_BOARD")
            .await?;
        let runs = Reconciler::new(self.board.clone(), run_board, "run");
        let projects = Reconciler::new(self.board.clone(), project_board, "project")
            .with_sort_key(SortKey::LastName);

        let mut summary = HandoverSummary::default();
        for (name, path) in self.archived_runs() {
            summary.checked += 1;
            let result = async {
                let Some(delivered) = self.delivered_projects(&name, &path)? else {
                    return Ok(false);
                };
                self.hand_over_run(&runs, &name).await?;
                for project in &delivered {
                    self.open_project(&projects, project, &name).await?;
                }
                Ok::<_, Error>(true)
            }
            .await;

            match result {
                Ok(true) => summary.handed_over += 1,
                Ok(false) => summary.pending += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(run = %name, error = %e, "Failed to check hand-over");
                    summary.failed += 1;
                }
            }
        }

        runs.sort_touched().await?;
        projects.sort_touched().await?;
        info!(
            checked = summary.checked,
            handed_over = summary.handed_over,
            pending = summary.pending,
            failed = summary.failed,
            "Hand-over pass finished"
        );
        Ok(summary)
    }

    async fn hand_over_run(&self, runs: &Reconciler, name: &RunFolderName) -> Result<()> {
        match self.board.get_card_by_name(runs.target(), &name.id).await? {
            Some(card) if card.closed => {
                debug!(run = %name, "Run card is closed");
            }
            Some(card) => {
                if Stage::from_list_name(&card.list.name).is_some_and(|s| s.is_sticky()) {
                    debug!(run = %name, list = %card.list.name, "Run card left alone");
                } else {
                    runs.move_to(&card, Stage::HandedOver).await?;
                }
            }
            None => {
                let list = runs.list_for(Stage::HandedOver).await?;
                let mut description = Description::new();
                description.insert("Flowcell", &name.flowcell_id);
                description.insert("Date", &name.date);
                self.board.create_card(&list, &name.id, &description).await?;
                runs.touch(&list).await;
                info!(run = %name, "Created handed over run card");
            }
        }
        Ok(())
    }

    /// Makes sure `project` has an open card past `Sequencing` that lists `run`.
    async fn open_project(
        &self,
        projects: &Reconciler,
        project: &str,
        run: &RunFolderName,
    ) -> Result<()> {
        let short_name = run.short_name();
        let Some(card) = self.board.get_card_by_name(projects.target(), project).await? else {
            let list = projects.list_for(ProjectStage::BcbbAnalysis).await?;
            let mut description = Description::new();
            description.insert(RUNS_KEY, &short_name);
            self.board.create_card(&list, project, &description).await?;
            projects.touch(&list).await;
            info!(project, run = %run, "Created project card");
            return Ok(());
        };

        if card.closed {
            self.board.set_closed(&card, false).await?;
            info!(project, "Reopened project card");
        }
        let waiting = card.list.name == ProjectStage::Sequencing.list_name();
        if card.closed || waiting {
            projects.move_to(&card, ProjectStage::BcbbAnalysis).await?;
        }

        let mut description = card.metadata();
        let mut runs: Vec<String> = description
            .get(RUNS_KEY)
            .map(|r| r.to_vec())
            .unwrap_or_default();
        if !runs.contains(&short_name) {
            runs.push(short_name);
            runs.sort();
            description.insert_list(RUNS_KEY, runs);
            self.board.set_description(&card, &description).await?;
        }
        Ok(())
    }
}
