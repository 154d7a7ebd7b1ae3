// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Monitor error types.

use hugin_core::BoardError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the monitors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error reading a run or project from disk.
    #[error(transparent)]
    Core(#[from] hugin_core::Error),

    /// Error from the board service.
    #[error("Board error: {0}")]
    Board(#[from] BoardError),

    /// A configured board does not exist.
    #[error("Board not found: {0}")]
    BoardNotFound(String),

    /// A notification could not be delivered.
    #[error("Notification failed: {0}")]
    Notification(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error aborts the whole invocation rather than one run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::BoardNotFound(_))
    }
}

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, Error>;
