// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Timing constants used to compute due dates.

use chrono::Duration;

/// How long each post-sequencing stage is expected to take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingPolicy {
    /// Expected demultiplexing time after sequencing completes (HiSeqX).
    pub demultiplexing: Duration,
    /// Expected transfer time after demultiplexing completes (HiSeqX).
    pub transferring: Duration,
    /// Expected processing time after the last read completes.
    pub processing: Duration,
    /// Grace period after a run has been sent upstream.
    pub sent_upstream: Duration,
    /// Closed cycles needed before the measured cycle time is trusted.
    pub min_empirical_cycles: usize,
    /// Cycles allowed for cluster generation before the first read starts.
    pub presequencing_cycles: u32,
    /// Logged cycles needed before individual cycles are checked (HiSeqX).
    pub cycle_check_after: usize,
    /// How much longer than average a cycle may take.
    pub cycle_slack: Duration,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            demultiplexing: Duration::hours(4),
            transferring: Duration::hours(12),
            processing: Duration::hours(8),
            sent_upstream: Duration::hours(3),
            min_empirical_cycles: 10,
            presequencing_cycles: 2,
            cycle_check_after: 5,
            cycle_slack: Duration::hours(1),
        }
    }
}
