// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Board reconciliation.
//!
//! A [`Reconciler`] brings one board in line with inferred state, one card at
//! a time. Every decision is taken against a freshly fetched card, and every
//! mutation is skipped when the card already matches, so a second pass over
//! unchanged input issues no board calls that modify anything.
//!
//! Lists that received or gained cards during a pass are remembered and
//! re-sorted by [`Reconciler::sort_touched`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate};
use hugin_core::board::month_list_name;
use hugin_core::{BoardRef, BoardService, Card, Description, Lifecycle, ListRef, SortKey};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::notify::StatusNotifier;

/// Due dates closer than this to the card's are left alone.
pub const DUE_TOLERANCE_SECS: i64 = 60;

/// Desired state of one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPlan<S> {
    /// Card name: run id or project name.
    pub name: String,
    /// Stage whose list the card belongs in.
    pub stage: S,
    pub due: DateTime<chrono::Utc>,
    /// Engine-computed description.
    pub description: Description,
    /// Why the card needs attention, when `stage` is `Check status`.
    pub reason: Option<String>,
}

/// What reconciling one card did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    Created,
    Moved,
    /// Description or due date rewritten in place.
    Updated,
    Unchanged,
    /// Card is closed or in a sticky list.
    Skipped,
}

/// Reconciles cards on one board.
pub struct Reconciler {
    board: Arc<dyn BoardService>,
    target: BoardRef,
    /// Item kind used in notifications, "run" or "project".
    kind: &'static str,
    refresh_keys: Vec<String>,
    sort_key: SortKey,
    notifier: Option<StatusNotifier>,
    lists: Mutex<HashMap<String, ListRef>>,
    touched: Mutex<BTreeMap<String, ListRef>>,
}

impl Reconciler {
    pub fn new(board: Arc<dyn BoardService>, target: BoardRef, kind: &'static str) -> Self {
        Self {
            board,
            target,
            kind,
            refresh_keys: Vec::new(),
            sort_key: SortKey::Alphabetical,
            notifier: None,
            lists: Mutex::new(HashMap::new()),
            touched: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_refresh_keys(mut self, keys: Vec<String>) -> Self {
        self.refresh_keys = keys;
        self
    }

    /// Ordering used by [`Reconciler::sort_touched`].
    pub fn with_sort_key(mut self, key: SortKey) -> Self {
        self.sort_key = key;
        self
    }

    pub fn with_notifier(mut self, notifier: StatusNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn board(&self) -> &dyn BoardService {
        self.board.as_ref()
    }

    pub fn target(&self) -> &BoardRef {
        &self.target
    }

    /// The list for `stage` on the target board, created when missing.
    pub async fn list_for<S: Lifecycle>(&self, stage: S) -> Result<ListRef> {
        self.list_named(&self.target, stage.list_name()).await
    }

    async fn list_named(&self, board: &BoardRef, name: &str) -> Result<ListRef> {
        let key = format!("{}/{}", board.id, name);
        // Held across the lookup so concurrent cards never create the same list twice
        let mut lists = self.lists.lock().await;
        if let Some(list) = lists.get(&key) {
            return Ok(list.clone());
        }
        let list = self.board.get_or_create_list(board, name).await?;
        lists.insert(key, list.clone());
        Ok(list)
    }

    /// Marks `list` for sorting at the end of the pass.
    pub async fn touch(&self, list: &ListRef) {
        self.touched
            .lock()
            .await
            .insert(list.id.clone(), list.clone());
    }

    /// Whether the card called `name` exists and is closed or in a sticky list.
    pub async fn is_settled<S: Lifecycle>(&self, name: &str) -> Result<bool> {
        let card = self.board.get_card_by_name(&self.target, name).await?;
        Ok(card.is_some_and(|card| is_settled::<S>(&card)))
    }

    /// Brings the card named in `plan` in line with it.
    pub async fn reconcile<S: Lifecycle>(&self, plan: &CardPlan<S>) -> Result<Outcome> {
        let Some(card) = self.board.get_card_by_name(&self.target, &plan.name).await? else {
            let list = self.list_for(plan.stage).await?;
            let card = self
                .board
                .create_card(&list, &plan.name, &plan.description)
                .await?;
            self.touch(&list).await;
            info!(card = %plan.name, list = %list.name, "Created card");

            if plan.stage == S::check_status() {
                self.comment(&card, plan).await;
            }
            self.board.set_due(&card, plan.due).await?;
            return Ok(Outcome::Created);
        };

        let current = S::from_list_name(&card.list.name);
        if is_settled::<S>(&card) {
            debug!(card = %card.name, list = %card.list.name, closed = card.closed, "Card left alone");
            return Ok(Outcome::Skipped);
        }

        let mut outcome = Outcome::Unchanged;
        let mut card = card;
        if current != Some(plan.stage) {
            let list = self.list_for(plan.stage).await?;
            self.board.move_card(&card, &list).await?;
            self.touch(&list).await;
            info!(card = %card.name, from = %card.list.name, to = %list.name, "Moved card");
            card.list = list;
            outcome = Outcome::Moved;

            if plan.stage == S::check_status() {
                let reason = self.comment(&card, plan).await;
                if let Some(notifier) = &self.notifier {
                    notifier
                        .needs_attention(self.kind, &card, &self.target.name, &reason)
                        .await;
                }
            }
        }

        let existing = card.metadata();
        let merged = plan.description.merge_preferring(&existing, &self.refresh_keys);
        if merged != existing {
            self.board.set_description(&card, &merged).await?;
            debug!(card = %card.name, "Updated description");
            if outcome == Outcome::Unchanged {
                outcome = Outcome::Updated;
            }
        }

        if due_differs(card.due, plan.due) {
            self.board.set_due(&card, plan.due).await?;
            debug!(card = %card.name, due = %plan.due, "Updated due date");
            if outcome == Outcome::Unchanged {
                outcome = Outcome::Updated;
            }
        }

        Ok(outcome)
    }

    /// Moves `card` to the list of `stage` unless it is already there.
    pub async fn move_to<S: Lifecycle>(&self, card: &Card, stage: S) -> Result<bool> {
        if card.list.name == stage.list_name() {
            return Ok(false);
        }
        let list = self.list_for(stage).await?;
        self.board.move_card(card, &list).await?;
        self.touch(&list).await;
        info!(card = %card.name, from = %card.list.name, to = %list.name, "Moved card");
        Ok(true)
    }

    /// Comments on a card placed in `Check status` and returns the reason.
    ///
    /// A failed comment is logged only; the card is already in its list and
    /// will not be flagged again.
    async fn comment<S: Lifecycle>(&self, card: &Card, plan: &CardPlan<S>) -> String {
        let reason = plan
            .reason
            .clone()
            .unwrap_or_else(|| format!("No progress could be determined for {}", plan.name));
        warn!(card = %card.name, reason = %reason, "Card needs attention");
        if let Err(e) = self.board.add_comment(card, &reason).await {
            warn!(card = %card.name, error = %e, "Failed to comment on card");
        }
        reason
    }

    /// Sorts every list touched since the last call.
    pub async fn sort_touched(&self) -> Result<()> {
        let touched = std::mem::take(&mut *self.touched.lock().await);
        for list in touched.values() {
            self.board.sort_cards_in_list(list, self.sort_key).await?;
            debug!(list = %list.name, "Sorted list");
        }
        Ok(())
    }

    /// Moves cards from `sources` to month lists on `archive`.
    ///
    /// `month_of` returns the date whose month names the destination list, or
    /// `None` to leave the card. Cards are copied with their description and
    /// due date and the original is closed. A failing card is logged and
    /// skipped. Archive lists are then ordered by month and touched archive
    /// lists sorted by `card_key`.
    pub async fn archive<F>(
        &self,
        archive: &BoardRef,
        sources: &[&str],
        card_key: SortKey,
        month_of: F,
    ) -> Result<usize>
    where
        F: Fn(&Card) -> Option<NaiveDate>,
    {
        let mut archived = 0;
        let mut touched: BTreeMap<String, ListRef> = BTreeMap::new();

        for source in sources {
            let Some(list) = self.board.get_list(&self.target, source).await? else {
                continue;
            };
            for card in self.board.list_cards(&list).await? {
                let Some(month) = month_of(&card) else {
                    continue;
                };
                let name = month_list_name(month);
                let result = async {
                    let destination = self.list_named(archive, &name).await?;
                    self.board.change_board(&card, archive, &destination).await?;
                    Ok::<_, crate::error::Error>(destination)
                }
                .await;
                match result {
                    Ok(destination) => {
                        info!(card = %card.name, board = %archive.name, list = %name, "Archived card");
                        touched.insert(destination.id.clone(), destination);
                        archived += 1;
                    }
                    Err(e) => warn!(card = %card.name, error = %e, "Failed to archive card"),
                }
            }
        }

        if archived > 0 {
            self.board
                .sort_lists_on_board(archive, SortKey::Chronological)
                .await?;
            for list in touched.values() {
                self.board.sort_cards_in_list(list, card_key).await?;
            }
        }
        Ok(archived)
    }
}

fn is_settled<S: Lifecycle>(card: &Card) -> bool {
    card.closed || S::from_list_name(&card.list.name).is_some_and(|stage| stage.is_sticky())
}

fn due_differs(current: Option<DateTime<chrono::Utc>>, planned: DateTime<chrono::Utc>) -> bool {
    current.is_none_or(|due| (due - planned).abs() > Duration::seconds(DUE_TOLERANCE_SECS))
}
