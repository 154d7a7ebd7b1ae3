// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Filesystem evidence for one run.
//!
//! Pipelines signal progress by dropping sentinel files into the run folder.
//! [`RunFacts::collect`] takes a read-only snapshot of which sentinels exist and
//! when they were written, so inference itself never touches the filesystem.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::descriptor::RunDescriptor;
use crate::error::Result;
use crate::transfer_log::TransferLog;

/// File and directory names the pipelines write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelNames {
    /// Written by the instrument when sequencing finishes.
    pub sequencing_complete: String,
    /// Per-read basecalling flag; `{N}` is the read number.
    pub basecalling_template: String,
    /// Processing flag; `{read}` is `first`/`second`/`initial`, `{phase}` is `started`/`completed`.
    pub processing_template: String,
    pub demultiplexing_dir: String,
    /// Relative path written when demultiplexing finishes.
    pub demultiplexing_done: String,
    /// Relative path of the per-cycle timing log.
    pub cycle_log: String,
}

impl Default for SentinelNames {
    fn default() -> Self {
        Self {
            sequencing_complete: "RTAComplete.txt".to_string(),
            basecalling_template: "Basecalling_Netcopy_complete_Read{N}.txt".to_string(),
            processing_template: "{read}_read_processing_{phase}.txt".to_string(),
            demultiplexing_dir: "Demultiplexing".to_string(),
            demultiplexing_done: "Demultiplexing/Stats/DemultiplexingStats.xml".to_string(),
            cycle_log: "Logs/CycleTimes.txt".to_string(),
        }
    }
}

/// Phase named by a processing flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingPhase {
    Started,
    Completed,
}

impl SentinelNames {
    pub fn basecalling(&self, read: u32) -> String {
        self.basecalling_template.replace("{N}", &read.to_string())
    }

    /// Processing flag for a run with `data_reads` non-index reads.
    pub fn processing(&self, data_reads: usize, phase: ProcessingPhase) -> String {
        let read = match data_reads {
            0 => "initial",
            1 => "first",
            _ => "second",
        };
        let phase = match phase {
            ProcessingPhase::Started => "started",
            ProcessingPhase::Completed => "completed",
        };
        self.processing_template
            .replace("{read}", read)
            .replace("{phase}", phase)
    }
}

/// Read-only snapshot of a run folder's sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFacts {
    /// Folder creation time, or its mtime where the filesystem has no birth time.
    pub started_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// The folder sits directly under the nosync directory.
    pub in_nosync: bool,
    /// Read number to basecalling flag mtime, for every flag present.
    pub basecalling_complete: BTreeMap<u32, DateTime<Utc>>,
    pub sequencing_complete: Option<DateTime<Utc>>,
    pub processing_started: Option<DateTime<Utc>>,
    pub processing_completed: Option<DateTime<Utc>>,
    pub demultiplexing_started: Option<DateTime<Utc>>,
    pub demultiplexing_done: Option<DateTime<Utc>>,
    pub transferred_at: Option<DateTime<Utc>>,
}

impl RunFacts {
    /// Empty evidence for a run started at `started_at`.
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            modified_at: started_at,
            in_nosync: false,
            basecalling_complete: BTreeMap::new(),
            sequencing_complete: None,
            processing_started: None,
            processing_completed: None,
            demultiplexing_started: None,
            demultiplexing_done: None,
            transferred_at: None,
        }
    }

    /// Snapshots the sentinels of `run`.
    pub fn collect(
        run: &RunDescriptor,
        names: &SentinelNames,
        nosync_folder: &str,
        transfers: Option<&TransferLog>,
    ) -> Result<Self> {
        let path = run.path.as_path();
        let mut facts = Self::new(created_at(path)?);
        facts.modified_at = modified_at(path)?;
        facts.in_nosync = path
            .parent()
            .and_then(|p| p.file_name())
            .is_some_and(|n| n == nosync_folder);

        for read in &run.reads {
            if let Some(at) = mtime_if_exists(&path.join(names.basecalling(read.number)))? {
                facts.basecalling_complete.insert(read.number, at);
            }
        }

        let data_reads = run.data_reads().count();
        facts.processing_started = mtime_if_exists(
            &path.join(names.processing(data_reads, ProcessingPhase::Started)),
        )?;
        facts.processing_completed = mtime_if_exists(
            &path.join(names.processing(data_reads, ProcessingPhase::Completed)),
        )?;
        facts.sequencing_complete = mtime_if_exists(&path.join(&names.sequencing_complete))?;
        facts.demultiplexing_started = mtime_if_exists(&path.join(&names.demultiplexing_dir))?;
        facts.demultiplexing_done = mtime_if_exists(&path.join(&names.demultiplexing_done))?;
        facts.transferred_at = transfers.and_then(|t| t.transferred_at(run.id()));

        Ok(facts)
    }
}

/// Modification time of `path`.
pub fn modified_at(path: &Path) -> Result<DateTime<Utc>> {
    Ok(fs::metadata(path)?.modified()?.into())
}

/// Creation time of `path`, falling back to its modification time.
pub fn created_at(path: &Path) -> Result<DateTime<Utc>> {
    let metadata = fs::metadata(path)?;
    let at = metadata.created().or_else(|_| metadata.modified())?;
    Ok(at.into())
}

fn mtime_if_exists(path: &Path) -> Result<Option<DateTime<Utc>>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata.modified()?.into())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
