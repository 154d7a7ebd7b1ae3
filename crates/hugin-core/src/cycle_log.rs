// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parser for the instrument's per-cycle timing log (`Logs/CycleTimes.txt`).
//!
//! The log is tab separated with a header row:
//!
//! ```text
//! Date        Time          Barcode  Cycle  Action  Status
//! 01/06/2012  10:00:00.000  ABC123   1      Imaging Started
//! 01/06/2012  10:40:00.000  ABC123   1      Imaging Completed
//! ```
//!
//! Timestamps are in the instrument's local time. A cycle starts at its first
//! row and ends at its last; the final cycle stays open until a `Completed`
//! row for it appears. Rows that do not parse are skipped.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::Path;

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

use crate::error::{Error, Result};

const TIMESTAMP_FORMAT: &str = "%m/%d/%Y-%H:%M:%S%.f";

/// Timing of one sequencing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleRecord {
    pub cycle_number: u32,
    pub start_time: DateTime<Utc>,
    /// `None` for the cycle currently in progress.
    pub end_time: Option<DateTime<Utc>>,
}

impl CycleRecord {
    /// Wall time of a closed cycle.
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

/// Reads the cycle log at `path`.
///
/// Returns `Ok(None)` when the log does not exist, which is normal for runs
/// that have not started imaging.
pub fn read_cycle_log(path: &Path) -> Result<Option<Vec<CycleRecord>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    parse_cycle_log(file, path).map(Some)
}

/// Parses cycle log content. `path` is only used in error messages.
pub fn parse_cycle_log(reader: impl io::Read, path: &Path) -> Result<Vec<CycleRecord>> {
    let mut csv = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    // cycle -> (first row, last row, completed)
    let mut cycles: BTreeMap<u32, (DateTime<Utc>, DateTime<Utc>, bool)> = BTreeMap::new();
    let mut rows = 0usize;

    for record in csv.records() {
        let record = record.map_err(|e| Error::MalformedLog {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let Some((cycle, at, completed)) = parse_row(&record) else {
            debug!(path = %path.display(), row = ?record, "Skipping cycle log row");
            continue;
        };
        rows += 1;
        cycles
            .entry(cycle)
            .and_modify(|(_, end, done)| {
                *end = at;
                *done |= completed;
            })
            .or_insert((at, at, completed));
    }

    if rows == 0 {
        return Err(Error::MalformedLog {
            path: path.to_path_buf(),
            reason: "no parsable rows".to_string(),
        });
    }

    let last = cycles.keys().next_back().copied();
    Ok(cycles
        .into_iter()
        .map(|(cycle_number, (start_time, end, done))| CycleRecord {
            cycle_number,
            start_time,
            end_time: if Some(cycle_number) == last && !done {
                None
            } else {
                Some(end)
            },
        })
        .collect())
}

fn parse_row(record: &csv::StringRecord) -> Option<(u32, DateTime<Utc>, bool)> {
    let date = record.get(0)?.trim();
    let time = record.get(1)?.trim();
    let cycle = record.get(3)?.trim().parse::<u32>().ok()?;
    let naive = NaiveDateTime::parse_from_str(&format!("{date}-{time}"), TIMESTAMP_FORMAT).ok()?;
    let local = Local.from_local_datetime(&naive).earliest()?;
    let completed = record
        .get(5)
        .is_some_and(|status| status.trim().eq_ignore_ascii_case("Completed"));
    Some((cycle, local.with_timezone(&Utc), completed))
}

/// Mean duration of the closed cycles, or `None` if fewer than `min_samples`
/// cycles have closed.
pub fn average_cycle_duration(cycles: &[CycleRecord], min_samples: usize) -> Option<Duration> {
    let durations: Vec<Duration> = cycles.iter().filter_map(CycleRecord::duration).collect();
    if durations.is_empty() || durations.len() < min_samples {
        return None;
    }
    let total: Duration = durations.iter().copied().sum();
    Some(total / durations.len() as i32)
}
