// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run lifecycle stages and their board list names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stall::Lifecycle;

/// Where a sequencing run is in its lifecycle.
///
/// Each stage maps one-to-one onto a list on the run board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Sequencing,
    FirstRead,
    IndexRead,
    SecondRead,
    Demultiplexing,
    Transferring,
    Processing,
    SentUpstream,
    HandedOver,
    CheckStatus,
    Aborted,
    Nosync,
    Archived,
}

impl Stage {
    /// Every stage, in board order.
    pub const ALL: [Stage; 13] = [
        Stage::Sequencing,
        Stage::FirstRead,
        Stage::IndexRead,
        Stage::SecondRead,
        Stage::Demultiplexing,
        Stage::Transferring,
        Stage::Processing,
        Stage::SentUpstream,
        Stage::HandedOver,
        Stage::CheckStatus,
        Stage::Aborted,
        Stage::Nosync,
        Stage::Archived,
    ];

    /// Name of the board list holding cards in this stage.
    pub fn list_name(&self) -> &'static str {
        match self {
            Stage::Sequencing => "Sequencing",
            Stage::FirstRead => "First read",
            Stage::IndexRead => "Index read",
            Stage::SecondRead => "Second read",
            Stage::Demultiplexing => "Demultiplexing",
            Stage::Transferring => "Transferring",
            Stage::Processing => "Processing",
            Stage::SentUpstream => "Sent upstream",
            Stage::HandedOver => "Handed over",
            Stage::CheckStatus => "Check status",
            Stage::Aborted => "Aborted",
            Stage::Nosync => "Nosync",
            Stage::Archived => "Archived",
        }
    }

    /// Reverse of [`Stage::list_name`].
    pub fn from_list_name(name: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.list_name() == name)
    }

    /// Stages the engine never moves a card out of on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Stage::HandedOver | Stage::Aborted | Stage::Nosync | Stage::Archived
        )
    }

    /// Stages set by operators or the hand-over pass. A card sitting in one of
    /// these lists is left alone by the run reconciler.
    pub fn is_sticky(&self) -> bool {
        matches!(self, Stage::HandedOver | Stage::Aborted | Stage::Archived)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.list_name())
    }
}

impl Lifecycle for Stage {
    fn check_status() -> Self {
        Stage::CheckStatus
    }

    fn list_name(&self) -> &'static str {
        Stage::list_name(self)
    }

    fn from_list_name(name: &str) -> Option<Self> {
        Stage::from_list_name(name)
    }

    fn is_stall_exempt(&self) -> bool {
        *self == Stage::SentUpstream || self.is_terminal()
    }

    fn is_sticky(&self) -> bool {
        Stage::is_sticky(self)
    }
}
