// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Immutable description of a sequencing run.
//!
//! A run is identified by its folder name, `{yymmdd}_{instrument}_{run}_{position}{flowcell}`,
//! for example `120106_SN12345_0144_AABC123CXX`. Folders that do not follow the
//! convention are not runs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static RUN_FOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{6})_((?:ST-)?[A-Z]+\d+)_(\d+)_([AB]?)([A-Z0-9\-]+)$")
        .expect("run folder pattern is valid")
});

/// Instrument family, derived from the folder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequencerFamily {
    HiSeqX,
    HiSeq,
    MiSeq,
}

impl fmt::Display for SequencerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SequencerFamily::HiSeqX => "HiSeqX",
            SequencerFamily::HiSeq => "HiSeq",
            SequencerFamily::MiSeq => "MiSeq",
        };
        f.write_str(name)
    }
}

/// Classifies a run by instrument and flowcell identifiers.
///
/// Checked in order: an `ST-` instrument prefix is a HiSeqX, an `XX` flowcell
/// suffix a HiSeq, and a `000000000` flowcell prefix a MiSeq.
pub fn sequencer_family(instrument: &str, flowcell_id: &str) -> Option<SequencerFamily> {
    if instrument.starts_with("ST-") {
        Some(SequencerFamily::HiSeqX)
    } else if flowcell_id.ends_with("XX") {
        Some(SequencerFamily::HiSeq)
    } else if flowcell_id.starts_with("000000000") {
        Some(SequencerFamily::MiSeq)
    } else {
        None
    }
}

/// Instrument run mode, which fixes the nominal time per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunMode {
    RapidRun,
    HighOutput,
    RapidHighOutput,
    MiSeq,
    HiSeqX,
}

impl RunMode {
    /// Nominal minutes per sequencing cycle.
    pub fn minutes_per_cycle(&self) -> i64 {
        match self {
            RunMode::RapidRun => 12,
            RunMode::HighOutput => 100,
            RunMode::RapidHighOutput => 43,
            RunMode::MiSeq => 6,
            RunMode::HiSeqX => 10,
        }
    }

    /// Nominal duration of one cycle.
    pub fn cycle_duration(&self) -> Duration {
        Duration::minutes(self.minutes_per_cycle())
    }

    /// Run mode assumed when the parameters file does not name one.
    pub fn default_for(family: SequencerFamily) -> RunMode {
        match family {
            SequencerFamily::HiSeqX => RunMode::HiSeqX,
            SequencerFamily::HiSeq => RunMode::HighOutput,
            SequencerFamily::MiSeq => RunMode::MiSeq,
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "RapidRun" => Ok(RunMode::RapidRun),
            "HighOutput" => Ok(RunMode::HighOutput),
            "RapidHighOutput" => Ok(RunMode::RapidHighOutput),
            "MiSeq" => Ok(RunMode::MiSeq),
            "HiSeqX" => Ok(RunMode::HiSeqX),
            other => Err(format!("unknown run mode '{other}'")),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunMode::RapidRun => "RapidRun",
            RunMode::HighOutput => "HighOutput",
            RunMode::RapidHighOutput => "RapidHighOutput",
            RunMode::MiSeq => "MiSeq",
            RunMode::HiSeqX => "HiSeqX",
        };
        f.write_str(name)
    }
}

/// One read of the run's read layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Read {
    /// 1-based read number.
    pub number: u32,
    /// Number of cycles in the read.
    pub cycles: u32,
    /// Whether this is an index (barcode) read.
    pub is_index: bool,
}

/// Parsed run folder name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunFolderName {
    /// The full folder name, used as the run id and card name.
    pub id: String,
    /// `yymmdd` start date.
    pub date: String,
    pub instrument: String,
    pub run_number: String,
    /// Flowcell slot, `A`/`B` on HiSeq instruments, empty otherwise.
    pub position: String,
    pub flowcell_id: String,
}

impl RunFolderName {
    /// Parses a folder name, returning `None` when it is not a run folder.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = RUN_FOLDER_RE.captures(name)?;
        Some(Self {
            id: name.to_string(),
            date: caps[1].to_string(),
            instrument: caps[2].to_string(),
            run_number: caps[3].to_string(),
            position: caps[4].to_string(),
            flowcell_id: caps[5].to_string(),
        })
    }

    /// Parses the last component of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(Self::parse)
    }

    /// `{date}_{position}{flowcell}`, the name analysis folders use for a flowcell.
    pub fn short_name(&self) -> String {
        format!("{}_{}{}", self.date, self.position, self.flowcell_id)
    }

    /// Start date encoded in the name.
    pub fn start_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%y%m%d").ok()
    }
}

impl fmt::Display for RunFolderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Immutable facts about a run, fixed once its metadata has been read.
#[derive(Debug, Clone)]
pub struct RunDescriptor {
    pub name: RunFolderName,
    pub path: PathBuf,
    pub family: SequencerFamily,
    /// Reads ordered by read number.
    pub reads: Vec<Read>,
    pub run_mode: RunMode,
}

impl RunDescriptor {
    /// Builds a descriptor, classifying the sequencer and validating the layout.
    ///
    /// A missing `run_mode` falls back to the family default.
    pub fn new(
        name: RunFolderName,
        path: impl Into<PathBuf>,
        mut reads: Vec<Read>,
        run_mode: Option<RunMode>,
    ) -> Result<Self> {
        let family = sequencer_family(&name.instrument, &name.flowcell_id).ok_or_else(|| {
            Error::UnrecognizedSequencer {
                run_id: name.id.clone(),
                instrument: name.instrument.clone(),
                flowcell_id: name.flowcell_id.clone(),
            }
        })?;
        if reads.is_empty() {
            return Err(Error::MissingReadLayout(name.id));
        }
        reads.sort_by_key(|r| r.number);

        Ok(Self {
            path: path.into(),
            family,
            reads,
            run_mode: run_mode.unwrap_or_else(|| RunMode::default_for(family)),
            name,
        })
    }

    pub fn id(&self) -> &str {
        &self.name.id
    }

    pub fn total_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn total_cycles(&self) -> u32 {
        self.reads.iter().map(|r| r.cycles).sum()
    }

    /// Non-index reads.
    pub fn data_reads(&self) -> impl Iterator<Item = &Read> {
        self.reads.iter().filter(|r| !r.is_index)
    }

    pub fn index_reads(&self) -> impl Iterator<Item = &Read> {
        self.reads.iter().filter(|r| r.is_index)
    }

    /// Layout of the data reads, `2x101` when uniform, `101,51` otherwise.
    pub fn setup(&self) -> String {
        layout(self.data_reads())
    }

    /// Layout of the index reads, `None` for runs without index reads.
    pub fn index_setup(&self) -> Option<String> {
        let reads: Vec<&Read> = self.index_reads().collect();
        (!reads.is_empty()).then(|| layout(reads.into_iter()))
    }
}

fn layout<'a>(reads: impl Iterator<Item = &'a Read>) -> String {
    let cycles: Vec<u32> = reads.map(|r| r.cycles).collect();
    match cycles.first() {
        Some(first) if cycles.iter().all(|c| c == first) => format!("{}x{}", cycles.len(), first),
        _ => cycles
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(","),
    }
}
