// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Project board pass.
//!
//! Project cards are created by the hand-over pass. This pass re-infers the
//! stage of every card in the tracked lists from the project's analysis
//! folder and moves it accordingly, then archives removed projects.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hugin_core::project::infer_project;
use hugin_core::stall;
use hugin_core::{BoardRef, BoardService, Card, Description, ProjectStage, ProjectTree, SortKey};
use tracing::{debug, error, info};

use crate::config::{ConfigError, MonitorConfig};
use crate::error::{Error, Result};
use crate::notify::StatusNotifier;
use crate::reconciler::{CardPlan, Reconciler};
use crate::run_monitor::PassSummary;

/// Tracks analysis projects on the project board.
pub struct ProjectMonitor {
    config: Arc<MonitorConfig>,
    board: Arc<dyn BoardService>,
    notifier: StatusNotifier,
}

impl ProjectMonitor {
    pub fn new(
        config: Arc<MonitorConfig>,
        board: Arc<dyn BoardService>,
        notifier: StatusNotifier,
    ) -> Self {
        Self {
            config,
            board,
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

    /// Desired state of a project card, from the project's analysis folder.
    pub fn plan(&self, card: &Card, now: DateTime<Utc>) -> Result<CardPlan<ProjectStage>> {
        let tree = ProjectTree::scan(&self.config.analysis_folders, &card.name)?;
        let mut description = Description::new();

        let (stage, due) = match &tree {
            Some(tree) => {
                description.insert("Samples", tree.samples.len().to_string());
                infer_project(tree, &self.config.project_timing, now)
            }
            None => (ProjectStage::CheckStatus, now),
        };
        let verdict = stall::check(stage, due, now);
        description.insert("Status", verdict.inferred.list_name());

        let reason = match (&tree, verdict.warning(due)) {
            (None, _) => Some(format!("No analysis folder found for {}", card.name)),
            (Some(_), Some(warning)) => Some(warning),
            (Some(_), None) if verdict.effective == ProjectStage::CheckStatus => Some(format!(
                "Analysis of {} shows no recent activity",
                card.name
            )),
            _ => None,
        };
        if verdict.stalled
            && let Some(reason) = &reason
        {
            description.insert("Warning", reason);
        }

        Ok(CardPlan {
            name: card.name.clone(),
            stage: verdict.effective,
            due,
            description,
            reason,
        })
    }

    /// One pass over the tracked lists of the project board, archiving
    /// removed projects afterwards when `archive` is set.
    pub async fn project_pass(&self, now: DateTime<Utc>, archive: bool) -> Result<PassSummary> {
        let target = self
            .resolve_board(self.config.project_board.as_ref(), "HUGIN_PROJECT_BOARD")
            .await?;
        let reconciler = Reconciler::new(self.board.clone(), target, "project")
            .with_refresh_keys(self.config.refresh_keys.clone())
            .with_sort_key(SortKey::LastName)
            .with_notifier(self.notifier.clone());

        // Snapshot first so a card moved into a later list is seen once
        let mut cards = Vec::new();
        for stage in ProjectStage::TRACKED {
            if let Some(list) = self
                .board
                .get_list(reconciler.target(), stage.list_name())
                .await?
            {
                cards.extend(self.board.list_cards(&list).await?);
            }
        }

        let mut summary = PassSummary {
            seen: cards.len(),
            ..Default::default()
        };
        for card in &cards {
            let result = match self.plan(card, now) {
                Ok(plan) => {
                    debug!(project = %card.name, stage = %plan.stage, "Inferred project state");
                    reconciler.reconcile(&plan).await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(outcome) => summary.record(outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(project = %card.name, error = %e, "Failed to process project");
                    summary.failed += 1;
                }
            }
        }

        if archive {
            self.archive(&reconciler, now).await?;
        }
        reconciler.sort_touched().await?;
        info!(
            seen = summary.seen,
            moved = summary.moved,
            updated = summary.updated,
            failed = summary.failed,
            "Project pass finished"
        );
        Ok(summary)
    }

    /// Archives removed projects whose due date has passed, by due month.
    async fn archive(&self, reconciler: &Reconciler, now: DateTime<Utc>) -> Result<usize> {
        let Some(name) = self.config.project_archive_board.as_ref() else {
            info!("No project archive board configured, archiving disabled");
            return Ok(0);
        };
        let archive = self
            .resolve_board(Some(name), "HUGIN_PROJECT_ARCHIVE_BOARD")
            .await?;
        let archived = reconciler
            .archive(
                &archive,
                &[ProjectStage::FinishedAndRemoved.list_name()],
                SortKey::LastName,
                |card| card.due.filter(|due| *due < now).map(|due| due.date_naive()),
            )
            .await?;
        info!(archived, board = %archive.name, "Project archiving finished");
        Ok(archived)
    }
}
