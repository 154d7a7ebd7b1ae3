// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory board for testing.
//!
//! Holds boards, lists and cards in process and records every mutating call,
//! so tests can assert on exactly which board operations a pass performed.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::traits::*;
use crate::description::Description;

/// A mutating call, as recorded by [`InMemoryBoard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateList { board: String, list: String },
    CreateCard { list: String, card: String },
    MoveCard { card: String, from: String, to: String },
    SetDescription { card: String, description: String },
    SetDue { card: String, due: DateTime<Utc> },
    SetClosed { card: String, closed: bool },
    AddComment { card: String, text: String },
    SortCards { list: String },
    SortLists { board: String },
    ChangeBoard { card: String, board: String, list: String },
}

impl Mutation {
    /// Name of the card the mutation touched, if any.
    pub fn card(&self) -> Option<&str> {
        match self {
            Mutation::CreateCard { card, .. }
            | Mutation::MoveCard { card, .. }
            | Mutation::SetDescription { card, .. }
            | Mutation::SetDue { card, .. }
            | Mutation::SetClosed { card, .. }
            | Mutation::AddComment { card, .. }
            | Mutation::ChangeBoard { card, .. } => Some(card.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredList {
    list: ListRef,
    pos: u64,
}

#[derive(Debug, Clone)]
struct StoredCard {
    card: Card,
    pos: u64,
}

#[derive(Debug, Default)]
struct State {
    boards: Vec<BoardRef>,
    lists: Vec<StoredList>,
    cards: Vec<StoredCard>,
    comments: Vec<(String, String)>,
    mutations: Vec<Mutation>,
    failing_cards: HashSet<String>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn next_pos(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id * 1024
    }

    fn list_by_id(&self, id: &str) -> Result<ListRef> {
        self.lists
            .iter()
            .find(|l| l.list.id == id)
            .map(|l| l.list.clone())
            .ok_or_else(|| BoardError::NotFound(format!("list {id}")))
    }

    fn card_mut(&mut self, card: &Card) -> Result<&mut StoredCard> {
        if self.failing_cards.contains(&card.name) {
            return Err(BoardError::Api {
                status: 503,
                message: format!("injected failure for {}", card.name),
            });
        }
        self.cards
            .iter_mut()
            .find(|c| c.card.id == card.id)
            .ok_or_else(|| BoardError::NotFound(format!("card {}", card.id)))
    }

    fn find_list(&self, board: &BoardRef, name: &str) -> Option<ListRef> {
        self.lists
            .iter()
            .find(|l| l.list.board_id == board.id && l.list.name == name)
            .map(|l| l.list.clone())
    }

    fn create_list(&mut self, board: &BoardRef, name: &str) -> ListRef {
        let list = ListRef {
            id: self.next_id("list-"),
            name: name.to_string(),
            board_id: board.id.clone(),
        };
        let pos = self.next_pos();
        self.lists.push(StoredList {
            list: list.clone(),
            pos,
        });
        list
    }
}

/// In-memory board service for testing.
#[derive(Clone, Default)]
pub struct InMemoryBoard {
    state: Arc<Mutex<State>>,
}

impl InMemoryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service holding empty boards with the given names.
    pub async fn with_boards(names: &[&str]) -> Self {
        let board = Self::new();
        for name in names {
            board.add_board(name).await;
        }
        board
    }

    /// Adds an empty board.
    pub async fn add_board(&self, name: &str) -> BoardRef {
        let mut state = self.state.lock().await;
        let board = BoardRef {
            id: state.next_id("board-"),
            name: name.to_string(),
        };
        state.boards.push(board.clone());
        board
    }

    /// Places a card on the board without recording a mutation.
    pub async fn seed_card(
        &self,
        board_name: &str,
        list_name: &str,
        name: &str,
        description: &str,
        due: Option<DateTime<Utc>>,
    ) -> Card {
        let mut state = self.state.lock().await;
        let board = match state.boards.iter().find(|b| b.name == board_name).cloned() {
            Some(board) => board,
            None => {
                let board = BoardRef {
                    id: state.next_id("board-"),
                    name: board_name.to_string(),
                };
                state.boards.push(board.clone());
                board
            }
        };
        let list = match state.find_list(&board, list_name) {
            Some(list) => list,
            None => state.create_list(&board, list_name),
        };
        let card = Card {
            id: state.next_id("card-"),
            name: name.to_string(),
            board_id: board.id.clone(),
            list,
            description: description.to_string(),
            due,
            closed: false,
            members: Vec::new(),
        };
        let pos = state.next_pos();
        state.cards.push(StoredCard {
            card: card.clone(),
            pos,
        });
        card
    }

    /// Sets the members of a card.
    pub async fn set_members(&self, card_id: &str, members: &[&str]) {
        let mut state = self.state.lock().await;
        if let Some(stored) = state.cards.iter_mut().find(|c| c.card.id == card_id) {
            stored.card.members = members.iter().map(|m| m.to_string()).collect();
        }
    }

    /// Makes every mutation of the named card fail with a 503.
    pub async fn fail_card(&self, name: &str) {
        self.state.lock().await.failing_cards.insert(name.to_string());
    }

    /// Mutations recorded so far.
    pub async fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().await.mutations.clone()
    }

    /// Returns and forgets the recorded mutations.
    pub async fn take_mutations(&self) -> Vec<Mutation> {
        std::mem::take(&mut self.state.lock().await.mutations)
    }

    /// Open card by name on the named board.
    pub async fn card(&self, board_name: &str, name: &str) -> Option<Card> {
        let state = self.state.lock().await;
        let board = state.boards.iter().find(|b| b.name == board_name)?;
        state
            .cards
            .iter()
            .find(|c| c.card.board_id == board.id && c.card.name == name && !c.card.closed)
            .map(|c| c.card.clone())
    }

    /// Names of the open cards in a list, in position order.
    pub async fn card_names(&self, board_name: &str, list_name: &str) -> Vec<String> {
        let state = self.state.lock().await;
        let Some(board) = state.boards.iter().find(|b| b.name == board_name) else {
            return Vec::new();
        };
        let Some(list) = state.find_list(board, list_name) else {
            return Vec::new();
        };
        let mut cards: Vec<&StoredCard> = state
            .cards
            .iter()
            .filter(|c| c.card.list.id == list.id && !c.card.closed)
            .collect();
        cards.sort_by_key(|c| c.pos);
        cards.iter().map(|c| c.card.name.clone()).collect()
    }

    /// Names of the lists of a board, in position order.
    pub async fn list_names(&self, board_name: &str) -> Vec<String> {
        let state = self.state.lock().await;
        let Some(board) = state.boards.iter().find(|b| b.name == board_name) else {
            return Vec::new();
        };
        let mut lists: Vec<&StoredList> = state
            .lists
            .iter()
            .filter(|l| l.list.board_id == board.id)
            .collect();
        lists.sort_by_key(|l| l.pos);
        lists.iter().map(|l| l.list.name.clone()).collect()
    }

    /// Comments added to the named card.
    pub async fn comments(&self, card_name: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .comments
            .iter()
            .filter(|(card, _)| card == card_name)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl BoardService for InMemoryBoard {
    fn service_type(&self) -> &'static str {
        "memory"
    }

    async fn find_board(&self, name: &str) -> Result<Option<BoardRef>> {
        let state = self.state.lock().await;
        Ok(state.boards.iter().find(|b| b.name == name).cloned())
    }

    async fn get_list(&self, board: &BoardRef, name: &str) -> Result<Option<ListRef>> {
        Ok(self.state.lock().await.find_list(board, name))
    }

    async fn get_or_create_list(&self, board: &BoardRef, name: &str) -> Result<ListRef> {
        let mut state = self.state.lock().await;
        if let Some(list) = state.find_list(board, name) {
            return Ok(list);
        }
        if !state.boards.iter().any(|b| b.id == board.id) {
            return Err(BoardError::NotFound(format!("board {}", board.name)));
        }
        let list = state.create_list(board, name);
        state.mutations.push(Mutation::CreateList {
            board: board.name.clone(),
            list: name.to_string(),
        });
        Ok(list)
    }

    async fn list_cards(&self, list: &ListRef) -> Result<Vec<Card>> {
        let state = self.state.lock().await;
        let mut cards: Vec<&StoredCard> = state
            .cards
            .iter()
            .filter(|c| c.card.list.id == list.id && !c.card.closed)
            .collect();
        cards.sort_by_key(|c| c.pos);
        Ok(cards.into_iter().map(|c| c.card.clone()).collect())
    }

    async fn get_card_by_name(&self, board: &BoardRef, name: &str) -> Result<Option<Card>> {
        let state = self.state.lock().await;
        let mut matches: Vec<&StoredCard> = state
            .cards
            .iter()
            .filter(|c| c.card.board_id == board.id && c.card.name == name)
            .collect();
        matches.sort_by_key(|c| c.card.closed);
        Ok(matches.first().map(|c| c.card.clone()))
    }

    async fn create_card(
        &self,
        list: &ListRef,
        name: &str,
        description: &Description,
    ) -> Result<Card> {
        let mut state = self.state.lock().await;
        if state.failing_cards.contains(name) {
            return Err(BoardError::Api {
                status: 503,
                message: format!("injected failure for {name}"),
            });
        }
        let list = state.list_by_id(&list.id)?;
        let card = Card {
            id: state.next_id("card-"),
            name: name.to_string(),
            board_id: list.board_id.clone(),
            list: list.clone(),
            description: description.encode(),
            due: None,
            closed: false,
            members: Vec::new(),
        };
        let pos = state.next_pos();
        state.cards.push(StoredCard {
            card: card.clone(),
            pos,
        });
        state.mutations.push(Mutation::CreateCard {
            list: list.name,
            card: name.to_string(),
        });
        Ok(card)
    }

    async fn move_card(&self, card: &Card, list: &ListRef) -> Result<()> {
        let mut state = self.state.lock().await;
        let target = state.list_by_id(&list.id)?;
        let pos = state.next_pos();
        let stored = state.card_mut(card)?;
        let from = std::mem::replace(&mut stored.card.list, target.clone());
        stored.card.board_id = target.board_id.clone();
        stored.pos = pos;
        state.mutations.push(Mutation::MoveCard {
            card: card.name.clone(),
            from: from.name,
            to: target.name,
        });
        Ok(())
    }

    async fn set_description(&self, card: &Card, description: &Description) -> Result<()> {
        let mut state = self.state.lock().await;
        let encoded = description.encode();
        state.card_mut(card)?.card.description = encoded.clone();
        state.mutations.push(Mutation::SetDescription {
            card: card.name.clone(),
            description: encoded,
        });
        Ok(())
    }

    async fn set_due(&self, card: &Card, due: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.card_mut(card)?.card.due = Some(due);
        state.mutations.push(Mutation::SetDue {
            card: card.name.clone(),
            due,
        });
        Ok(())
    }

    async fn set_closed(&self, card: &Card, closed: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.card_mut(card)?.card.closed = closed;
        state.mutations.push(Mutation::SetClosed {
            card: card.name.clone(),
            closed,
        });
        Ok(())
    }

    async fn add_comment(&self, card: &Card, text: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.card_mut(card)?;
        state.comments.push((card.name.clone(), text.to_string()));
        state.mutations.push(Mutation::AddComment {
            card: card.name.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn sort_cards_in_list(&self, list: &ListRef, key: SortKey) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut in_list: Vec<usize> = (0..state.cards.len())
            .filter(|&i| state.cards[i].card.list.id == list.id && !state.cards[i].card.closed)
            .collect();
        in_list.sort_by_key(|&i| state.cards[i].pos);
        let mut sorted = in_list.clone();
        sorted.sort_by_cached_key(|&i| key.key(&state.cards[i].card.name));
        if sorted != in_list {
            for (rank, i) in sorted.into_iter().enumerate() {
                state.cards[i].pos = (rank as u64 + 1) * 1024;
            }
        }
        state.mutations.push(Mutation::SortCards {
            list: list.name.clone(),
        });
        Ok(())
    }

    async fn sort_lists_on_board(&self, board: &BoardRef, key: SortKey) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut on_board: Vec<usize> = (0..state.lists.len())
            .filter(|&i| state.lists[i].list.board_id == board.id)
            .collect();
        on_board.sort_by_key(|&i| state.lists[i].pos);
        on_board.sort_by_cached_key(|&i| key.key(&state.lists[i].list.name));
        for (rank, i) in on_board.into_iter().enumerate() {
            state.lists[i].pos = (rank as u64 + 1) * 1024;
        }
        state.mutations.push(Mutation::SortLists {
            board: board.name.clone(),
        });
        Ok(())
    }

    async fn change_board(&self, card: &Card, board: &BoardRef, list: &ListRef) -> Result<Card> {
        let mut state = self.state.lock().await;
        let target = state.list_by_id(&list.id)?;
        let source = state.card_mut(card)?.card.clone();
        let copy = Card {
            id: state.next_id("card-"),
            board_id: board.id.clone(),
            list: target.clone(),
            closed: false,
            ..source
        };
        let pos = state.next_pos();
        state.cards.push(StoredCard {
            card: copy.clone(),
            pos,
        });
        state.card_mut(card)?.card.closed = true;
        state.mutations.push(Mutation::ChangeBoard {
            card: card.name.clone(),
            board: board.name.clone(),
            list: target.name,
        });
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_cards_are_not_mutations() {
        let board = InMemoryBoard::new();
        board.seed_card("Runs", "First read", "run-a", "", None).await;
        assert!(board.mutations().await.is_empty());
        assert_eq!(board.card_names("Runs", "First read").await, vec!["run-a"]);
    }

    #[tokio::test]
    async fn test_get_or_create_list_records_once() {
        let board = InMemoryBoard::with_boards(&["Runs"]).await;
        let runs = board.find_board("Runs").await.unwrap().unwrap();
        let first = board.get_or_create_list(&runs, "Processing").await.unwrap();
        let second = board.get_or_create_list(&runs, "Processing").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(board.mutations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_open_card_wins_lookup() {
        let board = InMemoryBoard::new();
        let closed = board.seed_card("Runs", "Aborted", "run-a", "", None).await;
        board.set_closed(&closed, true).await.unwrap();
        let open = board.seed_card("Runs", "Processing", "run-a", "", None).await;
        let runs = board.find_board("Runs").await.unwrap().unwrap();

        let found = board.get_card_by_name(&runs, "run-a").await.unwrap().unwrap();
        assert_eq!(found.id, open.id);
    }

    #[tokio::test]
    async fn test_change_board_copies_and_closes() {
        let board = InMemoryBoard::new();
        let card = board
            .seed_card("Runs", "Handed over", "run-a", "- Flowcell: ABC", None)
            .await;
        let archive = board.add_board("Runs archive").await;
        let month = board.get_or_create_list(&archive, "Jan 2012").await.unwrap();

        let copy = board.change_board(&card, &archive, &month).await.unwrap();
        assert_eq!(copy.name, "run-a");
        assert_eq!(copy.description, "- Flowcell: ABC");
        assert_eq!(copy.board_id, archive.id);
        assert!(board.card("Runs", "run-a").await.is_none());
        assert_eq!(board.card_names("Runs archive", "Jan 2012").await, vec!["run-a"]);
    }

    #[tokio::test]
    async fn test_sort_cards_by_name() {
        let board = InMemoryBoard::new();
        for name in ["c", "a", "b"] {
            board.seed_card("Runs", "Processing", name, "", None).await;
        }
        let runs = board.find_board("Runs").await.unwrap().unwrap();
        let list = board.get_list(&runs, "Processing").await.unwrap().unwrap();
        board.sort_cards_in_list(&list, SortKey::Alphabetical).await.unwrap();
        assert_eq!(board.card_names("Runs", "Processing").await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let board = InMemoryBoard::new();
        let card = board.seed_card("Runs", "Processing", "run-a", "", None).await;
        board.fail_card("run-a").await;
        let err = board.set_due(&card, Utc::now()).await.unwrap_err();
        assert!(matches!(err, BoardError::Api { status: 503, .. }));
    }
}
