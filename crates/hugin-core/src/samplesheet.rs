// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sample sheets.
//!
//! A run's sample sheet lists which project and sample each library belongs
//! to. It is looked up as `{flowcell}.csv` in the configured sample sheet
//! folders, then as `SampleSheet.csv` in the run folder. Both the flat
//! layout (header on the first row) and the sectioned layout (header on the
//! first row of the `[Data]` section) are understood.
//!
//! Project and sample names use `__` where the LIMS has `.`; they are
//! normalized on read.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const RUN_SAMPLESHEET: &str = "SampleSheet.csv";

const PROJECT_COLUMNS: [&str; 2] = ["SampleProject", "Sample_Project"];
const SAMPLE_COLUMNS: [&str; 2] = ["SampleID", "Sample_ID"];

/// One library row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRow {
    pub project: String,
    pub sample: String,
    pub lane: Option<String>,
    pub description: Option<String>,
}

/// Parsed sample sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSheet {
    pub rows: Vec<SampleRow>,
}

impl SampleSheet {
    /// Finds the sample sheet for a run, if any.
    pub fn locate(flowcell_id: &str, folders: &[PathBuf], run_path: &Path) -> Option<PathBuf> {
        let file_name = format!("{flowcell_id}.csv");
        folders
            .iter()
            .map(|folder| folder.join(&file_name))
            .chain(std::iter::once(run_path.join(RUN_SAMPLESHEET)))
            .find(|p| p.is_file())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content).map_err(|reason| Error::SampleSheet {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| e.to_string())?;
            let fields: Vec<String> = record.iter().map(|f| f.trim().to_string()).collect();
            records.push(fields);
        }

        let is_section = |r: &Vec<String>| r.first().is_some_and(|f| f.starts_with('['));
        let data: Vec<Vec<String>> = if records.iter().any(is_section) {
            records
                .into_iter()
                .skip_while(|r| !r.first().is_some_and(|f| f.eq_ignore_ascii_case("[Data]")))
                .skip(1)
                .take_while(|r| !is_section(r))
                .collect()
        } else {
            records
        };

        let mut rows = data.into_iter().filter(|r| r.iter().any(|f| !f.is_empty()));
        let header = rows.next().ok_or_else(|| "no header row".to_string())?;
        let column = |names: &[&str]| header.iter().position(|h| names.contains(&h.as_str()));

        let project_col = column(&PROJECT_COLUMNS).ok_or_else(|| "no sample project column".to_string())?;
        let sample_col = column(&SAMPLE_COLUMNS);
        let lane_col = column(&["Lane"]);
        let description_col = column(&["Description"]);

        let field = |row: &Vec<String>, col: Option<usize>| {
            col.and_then(|c| row.get(c))
                .filter(|v| !v.is_empty())
                .cloned()
        };

        let rows = rows
            .filter_map(|row| {
                let project = field(&row, Some(project_col))?;
                Some(SampleRow {
                    project: normalize(&project),
                    sample: field(&row, sample_col).map(|s| normalize(&s)).unwrap_or_default(),
                    lane: field(&row, lane_col),
                    description: field(&row, description_col),
                })
            })
            .collect();

        Ok(Self { rows })
    }

    /// Distinct project names, sorted.
    pub fn projects(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.project.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct `(project, sample)` pairs, sorted.
    pub fn project_samples(&self) -> Vec<(String, String)> {
        self.rows
            .iter()
            .filter(|r| !r.sample.is_empty())
            .map(|r| (r.project.clone(), r.sample.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct values of the Description column.
    pub fn descriptions(&self) -> BTreeSet<String> {
        self.rows.iter().filter_map(|r| r.description.clone()).collect()
    }
}

fn normalize(name: &str) -> String {
    name.replace("__", ".")
}
