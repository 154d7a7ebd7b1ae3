// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hugin monitor passes.
//!
//! Each pass is a single batch: it re-derives state from disk and from the
//! board, reconciles, and exits. Scheduling is left to cron or a systemd
//! timer.
//!
//! | Pass | Type | Board |
//! |------|------|-------|
//! | runs | [`RunMonitor::run_pass`] | run board |
//! | archive-runs | [`RunMonitor::archive_pass`] | run board to run archive board |
//! | handover | [`HandoverMonitor::handover_pass`] | run board and project board |
//! | projects | [`ProjectMonitor::project_pass`] | project board (and its archive) |

pub mod config;
pub mod dry_run;
pub mod error;
pub mod handover;
pub mod notify;
pub mod project_monitor;
pub mod reconciler;
pub mod run_monitor;

pub use config::{ConfigError, InstrumentAlias, MonitorConfig};
pub use dry_run::DryRunBoard;
pub use error::{Error, Result};
pub use handover::{HandoverMonitor, HandoverSummary};
pub use notify::{LogNotifier, Notifier, RecipientBook, StatusNotifier, WebhookNotifier};
pub use project_monitor::ProjectMonitor;
pub use reconciler::{CardPlan, Outcome, Reconciler};
pub use run_monitor::{PassSummary, RunAssessment, RunMonitor};
