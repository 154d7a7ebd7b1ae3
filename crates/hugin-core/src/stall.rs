// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stall detection.
//!
//! A run or project that has not reached its expected next state by its due
//! date is shown in the `Check status` list instead of its inferred stage.
//! Stages that are already complete or operator-owned are exempt.
//!
//! HiSeqX runs that are still sequencing are also checked cycle by cycle, so
//! a hung cycle early in a long run is caught before the run's due date.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::cycle_log::{CycleRecord, average_cycle_duration};
use crate::inference::Inference;
use crate::stage::Stage;
use crate::timing::TimingPolicy;

/// A lifecycle whose stages are board lists and which can stall.
///
/// Implemented by [`crate::Stage`] for runs and [`crate::ProjectStage`] for
/// analysis projects, so reconciliation and stall checks work on either.
pub trait Lifecycle: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// The stage shown for overdue items.
    fn check_status() -> Self;

    /// Name of the board list holding this stage.
    fn list_name(&self) -> &'static str;

    /// Stage for a board list name, if the list belongs to this lifecycle.
    fn from_list_name(name: &str) -> Option<Self>;

    /// Whether overdue items in this stage stay where they are.
    fn is_stall_exempt(&self) -> bool;

    /// Whether a card in this stage's list must not be moved by reconciliation.
    fn is_sticky(&self) -> bool {
        false
    }
}

/// Outcome of a stall check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallVerdict<S> {
    /// The stage inference produced.
    pub inferred: S,
    /// The stage to show on the board.
    pub effective: S,
    /// True when `effective` was overridden to `Check status`.
    pub stalled: bool,
}

impl<S: Lifecycle> StallVerdict<S> {
    /// Operator-facing reason, present only for stalled items.
    pub fn warning(&self, due: DateTime<Utc>) -> Option<String> {
        self.stalled.then(|| {
            format!(
                "{} overdue since {}",
                self.inferred.list_name(),
                due.format("%Y-%m-%d %H:%M UTC")
            )
        })
    }
}

/// Overrides `stage` with `Check status` when `now` is past `due`.
///
/// The comparison is strict: an item exactly at its due time is not stalled.
pub fn check<S: Lifecycle>(stage: S, due: DateTime<Utc>, now: DateTime<Utc>) -> StallVerdict<S> {
    let stalled = now > due && !stage.is_stall_exempt() && stage != S::check_status();
    StallVerdict {
        inferred: stage,
        effective: if stalled { S::check_status() } else { stage },
        stalled,
    }
}

/// Number of the last logged cycle if it has run too long.
///
/// Only applies once more than `policy.cycle_check_after` cycles are logged.
/// The time since the last cycle ended, or started if it is still running,
/// must stay within the average cycle time plus `policy.cycle_slack`.
pub fn overlong_cycle(
    cycles: &[CycleRecord],
    policy: &TimingPolicy,
    now: DateTime<Utc>,
) -> Option<u32> {
    if cycles.len() <= policy.cycle_check_after {
        return None;
    }
    let average = average_cycle_duration(cycles, 1)?;
    let last = cycles.last()?;
    let last_change = last.end_time.unwrap_or(last.start_time);
    (now - last_change > average + policy.cycle_slack).then_some(last.cycle_number)
}

/// Stall check for a run, with the warning to show when it is stalled.
///
/// Applies [`check`] to the due date, then [`overlong_cycle`] to runs still
/// in `Sequencing`.
pub fn check_run(
    inference: &Inference,
    cycles: Option<&[CycleRecord]>,
    policy: &TimingPolicy,
    now: DateTime<Utc>,
) -> (StallVerdict<Stage>, Option<String>) {
    let verdict = check(inference.stage, inference.due, now);
    if verdict.stalled {
        return (verdict, verdict.warning(inference.due));
    }
    if inference.stage == Stage::Sequencing
        && let Some(cycle) = cycles.and_then(|c| overlong_cycle(c, policy, now))
    {
        let verdict = StallVerdict {
            inferred: inference.stage,
            effective: Stage::CheckStatus,
            stalled: true,
        };
        return (verdict, Some(format!("Cycle {cycle} lasts too long")));
    }
    (verdict, None)
}
