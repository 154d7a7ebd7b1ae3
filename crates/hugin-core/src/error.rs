// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for hugin-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::board::BoardError;

/// Core errors.
///
/// Every variant except [`Error::Board`] is scoped to a single run or project:
/// callers log it against that item and carry on with the rest of the pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The cycle log exists but contains no parsable row.
    #[error("Malformed cycle log {path}: {reason}")]
    MalformedLog {
        /// Path of the offending log.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Neither the instrument nor the flowcell identifies a known sequencer family.
    #[error("Unrecognized sequencer for run {run_id} (instrument {instrument}, flowcell {flowcell_id})")]
    UnrecognizedSequencer {
        /// Run folder name.
        run_id: String,
        /// Instrument identifier from the folder name.
        instrument: String,
        /// Flowcell identifier from the folder name.
        flowcell_id: String,
    },

    /// The run has no read layout in its metadata.
    #[error("Run {0} has no read layout")]
    MissingReadLayout(String),

    /// A folder name does not follow the run naming convention.
    #[error("Invalid run folder name: {0}")]
    InvalidRunFolder(String),

    /// Instrument metadata could not be parsed.
    #[error("Metadata error in {path}: {reason}")]
    Metadata {
        /// Path of the metadata file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A sample sheet could not be parsed.
    #[error("Sample sheet error in {path}: {reason}")]
    SampleSheet {
        /// Path of the sample sheet.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Board service call failed.
    #[error("Board error: {0}")]
    Board(#[from] BoardError),
}

/// Result type using the core Error.
pub type Result<T> = std::result::Result<T, Error>;
