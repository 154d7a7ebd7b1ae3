// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for hugin-trello.

use hugin_core::BoardError;
use thiserror::Error;

/// Result type using TrelloError.
pub type Result<T> = std::result::Result<T, TrelloError>;

/// Errors that can occur when talking to Trello.
#[derive(Debug, Error)]
pub enum TrelloError {
    /// Configuration error (missing or invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The request did not complete.
    #[error("transport error: {0}")]
    Transport(String),

    /// Trello answered 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Trello answered with another error status.
    #[error("api error [{status}]: {message}")]
    Api { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TrelloError {
    fn from(err: reqwest::Error) -> Self {
        TrelloError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for TrelloError {
    fn from(err: serde_json::Error) -> Self {
        TrelloError::Decode(err.to_string())
    }
}

impl From<TrelloError> for BoardError {
    fn from(err: TrelloError) -> Self {
        match err {
            TrelloError::Config(msg) => BoardError::Other(msg),
            TrelloError::Transport(msg) => BoardError::Transport(msg),
            TrelloError::NotFound(what) => BoardError::NotFound(what),
            TrelloError::Api { status, message } => BoardError::Api { status, message },
            TrelloError::Decode(msg) => BoardError::Decode(msg),
        }
    }
}
