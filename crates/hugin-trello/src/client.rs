// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Trello client implementing [`BoardService`].

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use hugin_core::board::Result as BoardResult;
use hugin_core::{BoardRef, BoardService, Card, Description, ListRef, SortKey};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::config::TrelloConfig;
use crate::error::{Result, TrelloError};
use crate::types::{CARD_FIELDS, ErrorBody, LIST_FIELDS, TrelloBoard, TrelloCard, TrelloList};

/// Spacing between positions written when reordering.
const POSITION_STEP: f64 = 1024.0;

/// Board service backed by the Trello REST API.
///
/// # Example
///
/// ```ignore
/// use hugin_trello::{TrelloClient, TrelloConfig};
///
/// let client = TrelloClient::new(TrelloConfig::from_env()?)?;
/// let board = client.find_board("Runs").await?;
/// ```
#[derive(Debug, Clone)]
pub struct TrelloClient {
    http: reqwest::Client,
    config: TrelloConfig,
}

impl TrelloClient {
    /// Create a new client with the given configuration.
    pub fn new(config: TrelloConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TrelloError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    /// Create a new client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(TrelloConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &TrelloConfig {
        &self.config
    }

    // ========================================================================
    // Transport
    // ========================================================================

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        self.http.request(method, url).query(&[
            ("key", self.config.api_key.as_str()),
            ("token", self.config.token.as_str()),
        ])
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 404 {
            return Err(TrelloError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            return Err(TrelloError::Api {
                status: status.as_u16(),
                message: ErrorBody::message_from(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| TrelloError::Decode(format!("{what}: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.send(self.request(Method::GET, path).query(query), path)
            .await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        self.send(self.request(Method::POST, path).json(body), path)
            .await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<()> {
        self.send::<Value>(self.request(Method::PUT, path).json(body), path)
            .await
            .map(|_| ())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    async fn board_lists(&self, board_id: &str, filter: &str) -> Result<Vec<TrelloList>> {
        self.get(
            &format!("boards/{board_id}/lists"),
            &[("filter", filter), ("fields", LIST_FIELDS)],
        )
        .await
    }

    async fn list_cards_raw(&self, list_id: &str) -> Result<Vec<TrelloCard>> {
        self.get(
            &format!("lists/{list_id}/cards"),
            &[
                ("fields", CARD_FIELDS),
                ("members", "true"),
                ("member_fields", "username"),
            ],
        )
        .await
    }

    async fn update_card(&self, card: &Card, body: Value) -> Result<()> {
        self.put(&format!("cards/{}", card.id), &body).await
    }
}

/// Positions to write so items end up in `key` order, or `None` when they
/// already are.
fn reorder<'a>(items: &[(&'a str, &'a str, f64)], key: SortKey) -> Option<Vec<(&'a str, f64)>> {
    let mut current: Vec<_> = items.to_vec();
    current.sort_by(|a, b| a.2.total_cmp(&b.2));

    let mut target = current.clone();
    target.sort_by_cached_key(|(_, name, _)| key.key(name));

    if current.iter().map(|i| i.0).eq(target.iter().map(|i| i.0)) {
        return None;
    }
    Some(
        target
            .iter()
            .enumerate()
            .map(|(i, (id, _, _))| (*id, (i as f64 + 1.0) * POSITION_STEP))
            .collect(),
    )
}

fn format_due(due: DateTime<Utc>) -> String {
    due.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl BoardService for TrelloClient {
    fn service_type(&self) -> &'static str {
        "trello"
    }

    #[instrument(skip(self))]
    async fn find_board(&self, name: &str) -> BoardResult<Option<BoardRef>> {
        let boards: Vec<TrelloBoard> = self
            .get(
                "members/me/boards",
                &[("filter", "open"), ("fields", "name,closed")],
            )
            .await?;
        Ok(boards
            .into_iter()
            .find(|b| !b.closed && b.name == name)
            .map(BoardRef::from))
    }

    #[instrument(skip(self, board), fields(board = %board.name))]
    async fn get_list(&self, board: &BoardRef, name: &str) -> BoardResult<Option<ListRef>> {
        let lists = self.board_lists(&board.id, "open").await?;
        Ok(lists
            .iter()
            .find(|l| !l.closed && l.name == name)
            .map(TrelloList::to_ref))
    }

    #[instrument(skip(self, board), fields(board = %board.name))]
    async fn get_or_create_list(&self, board: &BoardRef, name: &str) -> BoardResult<ListRef> {
        if let Some(list) = self.get_list(board, name).await? {
            return Ok(list);
        }
        debug!("Creating list");
        let created: TrelloList = self
            .post(
                "lists",
                &json!({ "name": name, "idBoard": board.id, "pos": "bottom" }),
            )
            .await?;
        Ok(created.to_ref())
    }

    #[instrument(skip(self, list), fields(list = %list.name))]
    async fn list_cards(&self, list: &ListRef) -> BoardResult<Vec<Card>> {
        let mut cards = self.list_cards_raw(&list.id).await?;
        cards.sort_by(|a, b| a.pos.total_cmp(&b.pos));
        Ok(cards
            .into_iter()
            .filter(|c| !c.closed)
            .map(|c| c.into_card(list.clone()))
            .collect())
    }

    #[instrument(skip(self, board), fields(board = %board.name))]
    async fn get_card_by_name(&self, board: &BoardRef, name: &str) -> BoardResult<Option<Card>> {
        let cards: Vec<TrelloCard> = self
            .get(
                &format!("boards/{}/cards/all", board.id),
                &[
                    ("fields", CARD_FIELDS),
                    ("members", "true"),
                    ("member_fields", "username"),
                ],
            )
            .await?;

        let mut matching: Vec<TrelloCard> = cards.into_iter().filter(|c| c.name == name).collect();
        matching.sort_by_key(|c| c.closed);
        let Some(card) = matching.into_iter().next() else {
            return Ok(None);
        };

        let lists = self.board_lists(&board.id, "all").await?;
        let list = lists
            .iter()
            .find(|l| l.id == card.list_id)
            .map(TrelloList::to_ref)
            .unwrap_or_else(|| ListRef {
                id: card.list_id.clone(),
                name: String::new(),
                board_id: board.id.clone(),
            });
        Ok(Some(card.into_card(list)))
    }

    #[instrument(skip(self, list, description), fields(list = %list.name))]
    async fn create_card(
        &self,
        list: &ListRef,
        name: &str,
        description: &Description,
    ) -> BoardResult<Card> {
        let created: TrelloCard = self
            .post(
                "cards",
                &json!({
                    "idList": list.id,
                    "name": name,
                    "desc": description.encode(),
                    "pos": "bottom",
                }),
            )
            .await?;
        Ok(created.into_card(list.clone()))
    }

    #[instrument(skip(self, card, list), fields(card = %card.name, list = %list.name))]
    async fn move_card(&self, card: &Card, list: &ListRef) -> BoardResult<()> {
        let mut body = json!({ "idList": list.id, "pos": "bottom" });
        if card.board_id != list.board_id {
            body["idBoard"] = json!(list.board_id);
        }
        Ok(self.update_card(card, body).await?)
    }

    #[instrument(skip(self, card, description), fields(card = %card.name))]
    async fn set_description(&self, card: &Card, description: &Description) -> BoardResult<()> {
        Ok(self
            .update_card(card, json!({ "desc": description.encode() }))
            .await?)
    }

    #[instrument(skip(self, card), fields(card = %card.name))]
    async fn set_due(&self, card: &Card, due: DateTime<Utc>) -> BoardResult<()> {
        Ok(self
            .update_card(card, json!({ "due": format_due(due) }))
            .await?)
    }

    #[instrument(skip(self, card), fields(card = %card.name))]
    async fn set_closed(&self, card: &Card, closed: bool) -> BoardResult<()> {
        Ok(self.update_card(card, json!({ "closed": closed })).await?)
    }

    #[instrument(skip(self, card, text), fields(card = %card.name))]
    async fn add_comment(&self, card: &Card, text: &str) -> BoardResult<()> {
        let _: Value = self
            .post(
                &format!("cards/{}/actions/comments", card.id),
                &json!({ "text": text }),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, list), fields(list = %list.name))]
    async fn sort_cards_in_list(&self, list: &ListRef, key: SortKey) -> BoardResult<()> {
        let cards = self.list_cards_raw(&list.id).await?;
        let items: Vec<_> = cards
            .iter()
            .filter(|c| !c.closed)
            .map(|c| (c.id.as_str(), c.name.as_str(), c.pos))
            .collect();

        if let Some(positions) = reorder(&items, key) {
            debug!(cards = positions.len(), "Reordering cards");
            for (id, pos) in positions {
                self.put(&format!("cards/{id}"), &json!({ "pos": pos }))
                    .await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self, board), fields(board = %board.name))]
    async fn sort_lists_on_board(&self, board: &BoardRef, key: SortKey) -> BoardResult<()> {
        let lists = self.board_lists(&board.id, "open").await?;
        let items: Vec<_> = lists
            .iter()
            .map(|l| (l.id.as_str(), l.name.as_str(), l.pos))
            .collect();

        if let Some(positions) = reorder(&items, key) {
            debug!(lists = positions.len(), "Reordering lists");
            for (id, pos) in positions {
                self.put(&format!("lists/{id}"), &json!({ "pos": pos }))
                    .await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self, card, board, list), fields(card = %card.name, board = %board.name))]
    async fn change_board(
        &self,
        card: &Card,
        board: &BoardRef,
        list: &ListRef,
    ) -> BoardResult<Card> {
        let copy: TrelloCard = self
            .post(
                "cards",
                &json!({
                    "idList": list.id,
                    "idCardSource": card.id,
                    "keepFromSource": "all",
                    "pos": "bottom",
                }),
            )
            .await?;
        self.update_card(card, json!({ "closed": true })).await?;
        debug!(copy = %copy.id, "Card moved to board");
        Ok(copy.into_card(list.clone()))
    }
}
