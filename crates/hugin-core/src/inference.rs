// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stage inference.
//!
//! [`infer`] is a pure function of the run descriptor, its sentinel snapshot
//! and its cycle log. Rules, first match wins:
//!
//! 1. Folder under the nosync directory: `Nosync`, due now.
//! 2. HiSeqX post-sequencing evidence: transfer logged after demultiplexing
//!    is `Sent upstream`; demultiplexing statistics is `Transferring`; a
//!    demultiplexing folder or `RTAComplete.txt` is `Demultiplexing`.
//! 3. No contiguous basecalling flag: `First read` (or `Sequencing` for a
//!    HiSeqX with a cycle log), due after the pre-sequencing allowance.
//! 4. Some reads done: `Index read` if the next read is an index read,
//!    `First read` if no data read has finished, `Second read` otherwise.
//! 5. All reads done: processing flags decide between `Sent upstream` and
//!    `Processing`; HiSeqX runs wait in `Demultiplexing`.

use chrono::{DateTime, Duration, Utc};

use crate::cycle_log::{CycleRecord, average_cycle_duration};
use crate::descriptor::{RunDescriptor, SequencerFamily};
use crate::facts::RunFacts;
use crate::stage::Stage;
use crate::timing::TimingPolicy;

/// Result of inference for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inference {
    pub stage: Stage,
    pub due: DateTime<Utc>,
    /// Number of reads finished, counted contiguously from read 1.
    pub completed_reads: usize,
    /// Cycle duration used for the due date.
    pub cycle_duration: Duration,
    /// Whether `cycle_duration` was measured rather than nominal.
    pub empirical: bool,
}

/// Infers the stage and due date of a run.
pub fn infer(
    run: &RunDescriptor,
    facts: &RunFacts,
    cycles: Option<&[CycleRecord]>,
    policy: &TimingPolicy,
    now: DateTime<Utc>,
) -> Inference {
    let empirical = cycles.and_then(|c| average_cycle_duration(c, policy.min_empirical_cycles));
    let cycle_duration = empirical.unwrap_or_else(|| run.run_mode.cycle_duration());
    let completed = completed_reads(run, facts);

    let (stage, due) = decide(run, facts, cycles, policy, now, completed, cycle_duration);
    Inference {
        stage,
        due,
        completed_reads: completed,
        cycle_duration,
        empirical: empirical.is_some(),
    }
}

fn decide(
    run: &RunDescriptor,
    facts: &RunFacts,
    cycles: Option<&[CycleRecord]>,
    policy: &TimingPolicy,
    now: DateTime<Utc>,
    completed: usize,
    cycle_duration: Duration,
) -> (Stage, DateTime<Utc>) {
    if facts.in_nosync {
        return (Stage::Nosync, now);
    }

    let hiseq_x = run.family == SequencerFamily::HiSeqX;
    if hiseq_x {
        if let Some(done) = facts.demultiplexing_done {
            return match facts.transferred_at {
                Some(sent) => (Stage::SentUpstream, sent + policy.sent_upstream),
                None => (Stage::Transferring, done + policy.transferring),
            };
        }
        if let Some(started) = facts.demultiplexing_started {
            return (Stage::Demultiplexing, started + policy.demultiplexing);
        }
        if let Some(finished) = facts.sequencing_complete {
            return (Stage::Demultiplexing, finished + policy.demultiplexing);
        }
    }

    let total = run.total_reads();
    if completed == 0 {
        // HiSeqX instruments log cycles but drop no per-read flags
        if hiseq_x
            && let Some(first) = cycles.and_then(|c| c.first())
        {
            let total_cycles = i32::try_from(run.total_cycles()).unwrap_or(i32::MAX);
            return (Stage::Sequencing, first.start_time + cycle_duration * total_cycles);
        }
        let allowance = i32::try_from(policy.presequencing_cycles).unwrap_or(i32::MAX);
        return (Stage::FirstRead, facts.started_at + cycle_duration * allowance);
    }

    let last_flag = last_contiguous_flag(run, facts, completed).unwrap_or(facts.started_at);
    if completed < total {
        let next = &run.reads[completed];
        let data_done = run.reads[..completed].iter().filter(|r| !r.is_index).count();
        let stage = if next.is_index {
            Stage::IndexRead
        } else if data_done == 0 {
            Stage::FirstRead
        } else {
            Stage::SecondRead
        };
        let next_cycles = i32::try_from(next.cycles).unwrap_or(i32::MAX);
        return (stage, last_flag + cycle_duration * next_cycles);
    }

    if hiseq_x {
        return (Stage::Demultiplexing, last_flag + policy.demultiplexing);
    }
    match (facts.processing_completed, facts.processing_started) {
        (Some(done), _) => (Stage::SentUpstream, done + policy.sent_upstream),
        (None, Some(started)) => (Stage::Processing, started + policy.processing),
        (None, None) => (Stage::Processing, facts.modified_at + policy.processing),
    }
}

/// Reads finished, counted from read 1 up to the first missing flag.
pub fn completed_reads(run: &RunDescriptor, facts: &RunFacts) -> usize {
    run.reads
        .iter()
        .take_while(|r| facts.basecalling_complete.contains_key(&r.number))
        .count()
}

fn last_contiguous_flag(run: &RunDescriptor, facts: &RunFacts, completed: usize) -> Option<DateTime<Utc>> {
    let read = run.reads.get(completed.checked_sub(1)?)?;
    facts.basecalling_complete.get(&read.number).copied()
}
