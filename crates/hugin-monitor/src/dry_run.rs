// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Board wrapper that logs mutations instead of sending them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hugin_core::board::Result;
use hugin_core::{BoardRef, BoardService, Card, Description, ListRef, SortKey};
use tracing::info;

/// Delegates reads to `B` and only logs writes.
///
/// Creations return placeholder cards and lists with `dry-run-` ids so a pass
/// can carry on as if they had happened.
#[derive(Debug, Clone)]
pub struct DryRunBoard<B> {
    inner: B,
}

impl<B: BoardService> DryRunBoard<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

#[async_trait]
impl<B: BoardService> BoardService for DryRunBoard<B> {
    fn service_type(&self) -> &'static str {
        self.inner.service_type()
    }

    async fn find_board(&self, name: &str) -> Result<Option<BoardRef>> {
        self.inner.find_board(name).await
    }

    async fn get_list(&self, board: &BoardRef, name: &str) -> Result<Option<ListRef>> {
        self.inner.get_list(board, name).await
    }

    async fn get_or_create_list(&self, board: &BoardRef, name: &str) -> Result<ListRef> {
        if let Some(list) = self.inner.get_list(board, name).await? {
            return Ok(list);
        }
        info!(board = %board.name, list = name, "[dry-run] would create list");
        Ok(ListRef {
            id: format!("dry-run-{}-{}", board.id, name),
            name: name.to_string(),
            board_id: board.id.clone(),
        })
    }

    async fn list_cards(&self, list: &ListRef) -> Result<Vec<Card>> {
        if list.id.starts_with("dry-run-") {
            return Ok(Vec::new());
        }
        self.inner.list_cards(list).await
    }

    async fn get_card_by_name(&self, board: &BoardRef, name: &str) -> Result<Option<Card>> {
        self.inner.get_card_by_name(board, name).await
    }

    async fn create_card(
        &self,
        list: &ListRef,
        name: &str,
        description: &Description,
    ) -> Result<Card> {
        info!(list = %list.name, card = name, "[dry-run] would create card");
        Ok(Card {
            id: format!("dry-run-{name}"),
            name: name.to_string(),
            board_id: list.board_id.clone(),
            list: list.clone(),
            description: description.encode(),
            due: None,
            closed: false,
            members: Vec::new(),
        })
    }

    async fn move_card(&self, card: &Card, list: &ListRef) -> Result<()> {
        info!(
            card = %card.name,
            from = %card.list.name,
            to = %list.name,
            "[dry-run] would move card"
        );
        Ok(())
    }

    async fn set_description(&self, card: &Card, description: &Description) -> Result<()> {
        info!(card = %card.name, description = %description, "[dry-run] would set description");
        Ok(())
    }

    async fn set_due(&self, card: &Card, due: DateTime<Utc>) -> Result<()> {
        info!(card = %card.name, due = %due, "[dry-run] would set due date");
        Ok(())
    }

    async fn set_closed(&self, card: &Card, closed: bool) -> Result<()> {
        info!(card = %card.name, closed, "[dry-run] would set closed");
        Ok(())
    }

    async fn add_comment(&self, card: &Card, text: &str) -> Result<()> {
        info!(card = %card.name, text, "[dry-run] would add comment");
        Ok(())
    }

    async fn sort_cards_in_list(&self, list: &ListRef, key: SortKey) -> Result<()> {
        info!(list = %list.name, key = ?key, "[dry-run] would sort cards");
        Ok(())
    }

    async fn sort_lists_on_board(&self, board: &BoardRef, key: SortKey) -> Result<()> {
        info!(board = %board.name, key = ?key, "[dry-run] would sort lists");
        Ok(())
    }

    async fn change_board(&self, card: &Card, board: &BoardRef, list: &ListRef) -> Result<Card> {
        info!(
            card = %card.name,
            board = %board.name,
            list = %list.name,
            "[dry-run] would move card to board"
        );
        Ok(Card {
            board_id: board.id.clone(),
            list: list.clone(),
            ..card.clone()
        })
    }
}
