// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Board service trait and the types it exchanges.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::description::Description;

/// Errors from board operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BoardError {
    /// The referenced board, list or card does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The service could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service rejected the request.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP-style status code.
        status: u16,
        /// Message returned by the service.
        message: String,
    },

    /// The response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;

/// A board, resolved by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardRef {
    pub id: String,
    pub name: String,
}

/// A list on a board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListRef {
    pub id: String,
    pub name: String,
    pub board_id: String,
}

/// A card as last read from the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    /// Run or project name; cards are looked up by it.
    pub name: String,
    pub board_id: String,
    pub list: ListRef,
    /// Raw description text.
    pub description: String,
    pub due: Option<DateTime<Utc>>,
    pub closed: bool,
    /// Member usernames.
    #[serde(default)]
    pub members: Vec<String>,
}

impl Card {
    /// Decoded description.
    pub fn metadata(&self) -> Description {
        Description::decode(&self.description)
    }
}

/// Ordering applied when sorting cards in a list or lists on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    /// By name.
    Alphabetical,
    /// By the part after the first `.`, then the part before it.
    /// Project names read `{initial}.{lastname}_{yy}_{nn}`.
    LastName,
    /// By `%b %Y` month names, oldest first; other names sort after.
    Chronological,
}

impl SortKey {
    /// Sort key for `name`.
    pub fn key(&self, name: &str) -> String {
        match self {
            SortKey::Alphabetical => name.to_string(),
            SortKey::LastName => match name.split_once('.') {
                Some((first, rest)) => format!("{rest}.{first}"),
                None => name.to_string(),
            },
            SortKey::Chronological => match month_of(name) {
                Some(date) => date.format("%Y-%m").to_string(),
                None => format!("~{name}"),
            },
        }
    }

    /// Order `names` would be in after sorting.
    pub fn sorted<'a>(&self, names: &[&'a str]) -> Vec<&'a str> {
        let mut sorted = names.to_vec();
        sorted.sort_by_cached_key(|n| self.key(n));
        sorted
    }
}

/// Parses an archive list name such as `Jan 2012`.
pub fn month_of(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("01 {}", name.trim()), "%d %b %Y").ok()
}

/// Name of the archive list for `date`.
pub fn month_list_name(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// Kanban board service.
///
/// Implementations are not required to be transactional; callers re-read a
/// card before deciding whether a mutation is still needed.
#[async_trait]
pub trait BoardService: Send + Sync {
    /// Service type identifier (e.g., "trello", "memory").
    fn service_type(&self) -> &'static str;

    /// Finds an open board by name.
    async fn find_board(&self, name: &str) -> Result<Option<BoardRef>>;

    /// Finds an open list by name without creating it.
    async fn get_list(&self, board: &BoardRef, name: &str) -> Result<Option<ListRef>>;

    /// Finds an open list by name, creating it at the end of the board if missing.
    async fn get_or_create_list(&self, board: &BoardRef, name: &str) -> Result<ListRef>;

    /// Open cards in a list, in board order.
    async fn list_cards(&self, list: &ListRef) -> Result<Vec<Card>>;

    /// Finds a card by name, open or closed. An open card wins over closed ones.
    async fn get_card_by_name(&self, board: &BoardRef, name: &str) -> Result<Option<Card>>;

    /// Creates a card at the end of `list`.
    async fn create_card(&self, list: &ListRef, name: &str, description: &Description)
    -> Result<Card>;

    async fn move_card(&self, card: &Card, list: &ListRef) -> Result<()>;

    async fn set_description(&self, card: &Card, description: &Description) -> Result<()>;

    async fn set_due(&self, card: &Card, due: DateTime<Utc>) -> Result<()>;

    async fn set_closed(&self, card: &Card, closed: bool) -> Result<()>;

    async fn add_comment(&self, card: &Card, text: &str) -> Result<()>;

    /// Reorders the open cards of `list` by name.
    async fn sort_cards_in_list(&self, list: &ListRef, key: SortKey) -> Result<()>;

    /// Reorders the open lists of `board` by name.
    async fn sort_lists_on_board(&self, board: &BoardRef, key: SortKey) -> Result<()>;

    /// Copies `card` with its description and due date into `list` on
    /// `board`, then closes the original. Returns the copy.
    async fn change_board(&self, card: &Card, board: &BoardRef, list: &ListRef) -> Result<Card>;
}
