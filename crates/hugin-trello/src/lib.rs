// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Trello backend for hugin.
//!
//! [`TrelloClient`] implements [`hugin_core::BoardService`] over the Trello
//! REST API. Authentication uses an application key and a user token, both
//! sent as query parameters.
//!
//! # Example
//!
//! ```ignore
//! use hugin_core::BoardService;
//! use hugin_trello::{TrelloClient, TrelloConfig};
//!
//! let client = TrelloClient::new(TrelloConfig::new("key", "token"))?;
//! if let Some(board) = client.find_board("Runs").await? {
//!     let list = client.get_or_create_list(&board, "Sequencing").await?;
//!     for card in client.list_cards(&list).await? {
//!         println!("{}", card.name);
//!     }
//! }
//! ```

mod client;
mod config;
mod error;
pub mod types;

pub use client::TrelloClient;
pub use config::{DEFAULT_API_URL, TrelloConfig};
pub use error::{Result, TrelloError};
