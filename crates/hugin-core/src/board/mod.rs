// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Board abstraction.
//!
//! The monitors reconcile inferred state onto a Kanban board through the
//! [`BoardService`] trait. `hugin-trello` provides the production
//! implementation; [`InMemoryBoard`] backs tests and records every mutation.

mod memory;
mod traits;

pub use memory::{InMemoryBoard, Mutation};
pub use traits::*;
