// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transfer log written by the upstream copy job.
//!
//! One tab-separated line per transferred run: the run folder name, then
//! optionally the time the transfer finished. Lines without a usable time
//! fall back to the log's own modification time.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::Result;
use crate::facts::modified_at;

/// Runs listed in a transfer log, keyed by run id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferLog {
    entries: HashMap<String, DateTime<Utc>>,
}

impl TransferLog {
    /// Reads the log at `path`; a missing log is empty.
    pub fn read(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let fallback = modified_at(path)?;
        Ok(Self::parse(&content, fallback))
    }

    pub fn parse(content: &str, fallback: DateTime<Utc>) -> Self {
        let mut entries = HashMap::new();
        for line in content.lines() {
            let mut fields = line.split('\t').map(str::trim);
            let Some(run_id) = fields.next().filter(|f| !f.is_empty()) else {
                continue;
            };
            let at = fields.next().and_then(parse_timestamp).unwrap_or(fallback);
            entries.insert(run_id.to_string(), at);
        }
        Self { entries }
    }

    /// When `run_id` was transferred, if it was.
    pub fn transferred_at(&self, run_id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(run_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|n| n.and_utc())
        })
}
