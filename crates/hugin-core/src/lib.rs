// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hugin Core - sequencing run lifecycle model
//!
//! This crate turns the on-disk evidence a sequencing instrument leaves behind
//! into a lifecycle stage and an expected completion time, and describes the
//! board abstraction the monitors reconcile against.
//!
//! # Architecture
//!
//! ```text
//! run folder ──► RunFolderName ──► RunDescriptor ◄── RunInfo.xml / runParameters.xml
//!                                       │
//!         sentinel files ──► RunFacts ──┤
//!         CycleTimes.txt ──► cycles ────┤
//!                                       ▼
//!                               infer() ──► (Stage, due)
//!                                       │
//!                                       ▼
//!                            stall::check_run() ──► effective stage
//!                                       │
//!                                       ▼
//!                        Description + BoardService (hugin-monitor)
//! ```
//!
//! # Stages
//!
//! | Stage | Evidence |
//! |-------|----------|
//! | `Sequencing` | HiSeqX cycle log, no read finished |
//! | `First read` / `Index read` / `Second read` | Contiguous basecalling flags |
//! | `Demultiplexing` | HiSeqX `RTAComplete.txt` or demultiplexing folder |
//! | `Transferring` | HiSeqX demultiplexing statistics written |
//! | `Processing` | All reads done, processing flags |
//! | `Sent upstream` | Processing finished or transfer logged |
//! | `Check status` | Overdue relative to the due date |
//! | `Nosync` | Folder lives under the nosync directory |
//!
//! `Handed over`, `Aborted` and `Archived` are only ever set on the board.

pub mod board;
pub mod cycle_log;
pub mod description;
pub mod descriptor;
pub mod error;
pub mod facts;
pub mod inference;
pub mod metadata;
pub mod project;
pub mod samplesheet;
pub mod stage;
pub mod stall;
pub mod timing;
pub mod transfer_log;

pub use board::{BoardError, BoardRef, BoardService, Card, InMemoryBoard, ListRef, SortKey};
pub use cycle_log::CycleRecord;
pub use description::Description;
pub use descriptor::{Read, RunDescriptor, RunFolderName, RunMode, SequencerFamily};
pub use error::{Error, Result};
pub use facts::{RunFacts, SentinelNames};
pub use inference::{Inference, infer};
pub use metadata::{RunInfo, RunMetadataReader, RunParameters, XmlMetadataReader};
pub use project::{ProjectStage, ProjectTiming, ProjectTree};
pub use samplesheet::SampleSheet;
pub use stage::Stage;
pub use stall::{Lifecycle, StallVerdict};
pub use timing::TimingPolicy;
pub use transfer_log::TransferLog;
