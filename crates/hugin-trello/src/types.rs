// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire shapes of the Trello REST API.

use chrono::{DateTime, Utc};
use hugin_core::{BoardRef, Card, ListRef};
use serde::{Deserialize, Serialize};

/// Fields requested for every card.
pub(crate) const CARD_FIELDS: &str = "name,desc,due,closed,idList,idBoard,pos";
/// Fields requested for every list.
pub(crate) const LIST_FIELDS: &str = "name,idBoard,closed,pos";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrelloBoard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub closed: bool,
}

impl From<TrelloBoard> for BoardRef {
    fn from(board: TrelloBoard) -> Self {
        BoardRef {
            id: board.id,
            name: board.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrelloList {
    pub id: String,
    pub name: String,
    #[serde(rename = "idBoard")]
    pub board_id: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub pos: f64,
}

impl TrelloList {
    pub fn to_ref(&self) -> ListRef {
        ListRef {
            id: self.id.clone(),
            name: self.name.clone(),
            board_id: self.board_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrelloMember {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrelloCard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub due: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed: bool,
    #[serde(rename = "idList")]
    pub list_id: String,
    #[serde(rename = "idBoard")]
    pub board_id: String,
    #[serde(default)]
    pub pos: f64,
    #[serde(default)]
    pub members: Vec<TrelloMember>,
}

impl TrelloCard {
    /// Converts to the service-neutral card, attaching the resolved list.
    pub fn into_card(self, list: ListRef) -> Card {
        Card {
            id: self.id,
            name: self.name,
            board_id: self.board_id,
            list,
            description: self.desc,
            due: self.due,
            closed: self.closed,
            members: self.members.into_iter().map(|m| m.username).collect(),
        }
    }
}

/// Message body of a rejected request.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Best message available for a failed request.
    pub fn message_from(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => parsed
                .message
                .or(parsed.error)
                .unwrap_or_else(|| body.to_string()),
            Err(_) => body.trim().to_string(),
        }
    }
}
