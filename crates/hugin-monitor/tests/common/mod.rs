// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for the monitor integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hugin_core::board::Result as BoardResult;
use hugin_core::{
    BoardError, BoardRef, BoardService, Card, Description, InMemoryBoard, ListRef, SortKey,
};
use hugin_monitor::{Notifier, RecipientBook, StatusNotifier};

pub const HOST: &str = "seqhost1";

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Notifier that keeps every message.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn sink_type(&self) -> &'static str {
        "recording"
    }

    async fn send(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> hugin_monitor::Result<()> {
        self.sent.lock().unwrap().push(Sent {
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// A status notifier writing to a recording sink with `ops@example.org` as
/// the default recipient.
pub fn recording_notifier() -> (Arc<RecordingNotifier>, StatusNotifier) {
    let sink = Arc::new(RecordingNotifier::default());
    let book = RecipientBook::new(vec!["ops@example.org".to_string()], Default::default());
    let notifier = StatusNotifier::new(sink.clone(), book, HOST);
    (sink, notifier)
}

/// Writes `content` to `path`, creating parent folders.
pub fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Sets the modification time of an existing file.
pub fn set_mtime(path: &Path, at: DateTime<Utc>) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::from(at)).unwrap();
}

/// Writes a sentinel file with the given modification time.
pub fn touch(path: &Path, at: DateTime<Utc>) {
    write(path, "");
    set_mtime(path, at);
}

/// Creates a run folder with `RunInfo.xml` and `runParameters.xml`.
///
/// The flowcell has 8 lanes of 64 tiles.
///
/// `reads` lists `(cycles, is_index)` in read order.
pub fn write_run(parent: &Path, name: &str, reads: &[(u32, bool)], run_mode: &str) -> PathBuf {
    let path = parent.join(name);
    fs::create_dir_all(&path).unwrap();

    let reads_xml: String = reads
        .iter()
        .enumerate()
        .map(|(i, (cycles, is_index))| {
            format!(
                r#"<Read Number="{}" NumCycles="{}" IsIndexedRead="{}" />"#,
                i + 1,
                cycles,
                if *is_index { "Y" } else { "N" }
            )
        })
        .collect();
    let date = &name[..6];
    write(
        &path.join("RunInfo.xml"),
        &format!(
            r#"<?xml version="1.0"?>
<RunInfo Version="2"><Run Id="{name}" Number="1"><Date>{date}</Date><Reads>{reads_xml}</Reads>
<FlowcellLayout LaneCount="8" SurfaceCount="2" SwathCount="2" TileCount="16" /></Run></RunInfo>"#
        ),
    );
    write(
        &path.join("runParameters.xml"),
        &format!("<RunParameters><Setup><RunMode>{run_mode}</RunMode></Setup></RunParameters>"),
    );
    path
}

/// Standard HiSeq paired-end layout with one index read.
pub const PAIRED_INDEXED: &[(u32, bool)] = &[(101, false), (7, true), (101, false)];

/// Board that behaves like a remote service: list creation is a lookup, a
/// round trip, then a create, and comments can be made to fail.
pub struct RemoteLikeBoard {
    inner: InMemoryBoard,
    latency: std::time::Duration,
    list_creates: Mutex<Vec<String>>,
    comment_failures: AtomicUsize,
}

impl RemoteLikeBoard {
    pub fn new(inner: InMemoryBoard) -> Self {
        Self {
            inner,
            latency: std::time::Duration::from_millis(20),
            list_creates: Mutex::new(Vec::new()),
            comment_failures: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` comments fail.
    pub fn fail_comments(&self, count: usize) {
        self.comment_failures.store(count, Ordering::SeqCst);
    }

    /// Names of the lists this board was asked to create, one entry per request.
    pub fn list_creates(&self) -> Vec<String> {
        self.list_creates.lock().unwrap().clone()
    }
}

#[async_trait]
impl BoardService for RemoteLikeBoard {
    fn service_type(&self) -> &'static str {
        "remote-like"
    }

    async fn find_board(&self, name: &str) -> BoardResult<Option<BoardRef>> {
        self.inner.find_board(name).await
    }

    async fn get_list(&self, board: &BoardRef, name: &str) -> BoardResult<Option<ListRef>> {
        self.inner.get_list(board, name).await
    }

    async fn get_or_create_list(&self, board: &BoardRef, name: &str) -> BoardResult<ListRef> {
        if let Some(list) = self.inner.get_list(board, name).await? {
            return Ok(list);
        }
        tokio::time::sleep(self.latency).await;
        self.list_creates.lock().unwrap().push(name.to_string());
        self.inner.get_or_create_list(board, name).await
    }

    async fn list_cards(&self, list: &ListRef) -> BoardResult<Vec<Card>> {
        self.inner.list_cards(list).await
    }

    async fn get_card_by_name(&self, board: &BoardRef, name: &str) -> BoardResult<Option<Card>> {
        self.inner.get_card_by_name(board, name).await
    }

    async fn create_card(
        &self,
        list: &ListRef,
        name: &str,
        description: &Description,
    ) -> BoardResult<Card> {
        self.inner.create_card(list, name, description).await
    }

    async fn move_card(&self, card: &Card, list: &ListRef) -> BoardResult<()> {
        self.inner.move_card(card, list).await
    }

    async fn set_description(&self, card: &Card, description: &Description) -> BoardResult<()> {
        self.inner.set_description(card, description).await
    }

    async fn set_due(&self, card: &Card, due: DateTime<Utc>) -> BoardResult<()> {
        self.inner.set_due(card, due).await
    }

    async fn set_closed(&self, card: &Card, closed: bool) -> BoardResult<()> {
        self.inner.set_closed(card, closed).await
    }

    async fn add_comment(&self, card: &Card, text: &str) -> BoardResult<()> {
        let failing = self
            .comment_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BoardError::Api {
                status: 500,
                message: format!("comment on {} rejected", card.name),
            });
        }
        self.inner.add_comment(card, text).await
    }

    async fn sort_cards_in_list(&self, list: &ListRef, key: SortKey) -> BoardResult<()> {
        self.inner.sort_cards_in_list(list, key).await
    }

    async fn sort_lists_on_board(&self, board: &BoardRef, key: SortKey) -> BoardResult<()> {
        self.inner.sort_lists_on_board(board, key).await
    }

    async fn change_board(
        &self,
        card: &Card,
        board: &BoardRef,
        list: &ListRef,
    ) -> BoardResult<Card> {
        self.inner.change_board(card, board, list).await
    }
}
