// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Instrument metadata files.
//!
//! Every run folder carries `RunInfo.xml` (identity and read layout) and a
//! parameters file whose name depends on the instrument software version
//! (`runParameters.xml` or `RunParameters.xml`). Missing files yield empty
//! metadata; files that exist but do not parse are an error.

use std::fs;
use std::io;
use std::path::Path;

use crate::descriptor::Read;
use crate::error::{Error, Result};

pub const RUN_INFO_FILE: &str = "RunInfo.xml";
pub const RUN_PARAMETERS_FILES: [&str; 2] = ["runParameters.xml", "RunParameters.xml"];

/// Contents of `RunInfo.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInfo {
    pub instrument: Option<String>,
    pub date: Option<String>,
    pub reads: Vec<Read>,
    pub lane_count: Option<u32>,
    /// Surfaces x swaths x tiles, when the layout lists them.
    pub tiles_per_lane: Option<u32>,
}

/// The fields of the parameters file that hugin uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunParameters {
    pub run_mode: Option<String>,
    pub chemistry: Option<String>,
}

/// Source of instrument metadata for a run folder.
///
/// Implementations must be pure reads; the monitors call them concurrently.
pub trait RunMetadataReader: Send + Sync {
    /// Reads `RunInfo.xml` from the run folder.
    fn read_run_info(&self, run_path: &Path) -> Result<RunInfo>;

    /// Reads the run parameters file from the run folder.
    fn read_run_parameters(&self, run_path: &Path) -> Result<RunParameters>;
}

/// Reads the XML files the instruments write.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlMetadataReader;

impl RunMetadataReader for XmlMetadataReader {
    fn read_run_info(&self, run_path: &Path) -> Result<RunInfo> {
        let path = run_path.join(RUN_INFO_FILE);
        match read_optional(&path)? {
            Some(xml) => parse_run_info(&xml).map_err(|reason| Error::Metadata { path, reason }),
            None => Ok(RunInfo::default()),
        }
    }

    fn read_run_parameters(&self, run_path: &Path) -> Result<RunParameters> {
        for name in RUN_PARAMETERS_FILES {
            let path = run_path.join(name);
            if let Some(xml) = read_optional(&path)? {
                return parse_run_parameters(&xml).map_err(|reason| Error::Metadata { path, reason });
            }
        }
        Ok(RunParameters::default())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn child_text(node: roxmltree::Node<'_, '_>, tag: &str) -> Option<String> {
    node.descendants()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn attr_u32(node: roxmltree::Node<'_, '_>, name: &str) -> Option<u32> {
    node.attribute(name).and_then(|v| v.trim().parse().ok())
}

/// Parses the content of `RunInfo.xml`.
pub fn parse_run_info(xml: &str) -> std::result::Result<RunInfo, String> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| e.to_string())?;
    let Some(run) = doc.descendants().find(|n| n.has_tag_name("Run")) else {
        return Err("no <Run> element".to_string());
    };

    let mut reads = Vec::new();
    for node in run.descendants().filter(|n| n.has_tag_name("Read")) {
        let number = attr_u32(node, "Number")
            .ok_or_else(|| "<Read> without a valid Number".to_string())?;
        let cycles = attr_u32(node, "NumCycles")
            .ok_or_else(|| format!("read {number} without a valid NumCycles"))?;
        let is_index = node
            .attribute("IsIndexedRead")
            .is_some_and(|v| v.eq_ignore_ascii_case("Y"));
        reads.push(Read {
            number,
            cycles,
            is_index,
        });
    }

    let layout = run.descendants().find(|n| n.has_tag_name("FlowcellLayout"));
    let tiles_per_lane = layout.and_then(|l| {
        let tiles = attr_u32(l, "TileCount")?;
        let surfaces = attr_u32(l, "SurfaceCount").unwrap_or(1);
        let swaths = attr_u32(l, "SwathCount").unwrap_or(1);
        Some(tiles * surfaces * swaths)
    });

    Ok(RunInfo {
        instrument: child_text(run, "Instrument"),
        date: child_text(run, "Date"),
        reads,
        lane_count: layout.and_then(|l| attr_u32(l, "LaneCount")),
        tiles_per_lane,
    })
}

/// Parses the content of a run parameters file.
pub fn parse_run_parameters(xml: &str) -> std::result::Result<RunParameters, String> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| e.to_string())?;
    let root = doc.root_element();
    Ok(RunParameters {
        run_mode: child_text(root, "RunMode"),
        chemistry: child_text(root, "ChemistryVersion")
            .or_else(|| child_text(root, "Chemistry"))
            .or_else(|| child_text(root, "Sbs")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN_INFO: &str = r#"<?xml version="1.0"?>
<RunInfo xmlns:xsd="http://www.w3.org/2001/XMLSchema" Version="2">
  <Run Id="120106_SN12345_0144_AABC123CXX" Number="144">
    <Flowcell>ABC123CXX</Flowcell>
    <Instrument>SN12345</Instrument>
    <Date>120106</Date>
    <Reads>
      <Read Number="1" NumCycles="101" IsIndexedRead="N" />
      <Read Number="2" NumCycles="7" IsIndexedRead="Y" />
      <Read Number="3" NumCycles="101" IsIndexedRead="N" />
    </Reads>
    <FlowcellLayout LaneCount="8" SurfaceCount="2" SwathCount="3" TileCount="16" />
  </Run>
</RunInfo>"#;

    #[test]
    fn test_parse_run_info() {
        let info = parse_run_info(RUN_INFO).unwrap();
        assert_eq!(info.instrument.as_deref(), Some("SN12345"));
        assert_eq!(info.date.as_deref(), Some("120106"));
        assert_eq!(info.reads.len(), 3);
        assert!(info.reads[1].is_index);
        assert_eq!(info.reads[2].cycles, 101);
        assert_eq!(info.lane_count, Some(8));
        assert_eq!(info.tiles_per_lane, Some(96));
    }

    #[test]
    fn test_parse_run_parameters() {
        let params = parse_run_parameters(
            r#"<RunParameters><Setup><RunMode>RapidRun</RunMode>
               <ApplicationName>HiSeq Control Software</ApplicationName>
               <ApplicationVersion>2.0.12.0</ApplicationVersion>
               <Sbs>TruSeq Rapid SBS Kit</Sbs></Setup></RunParameters>"#,
        )
        .unwrap();
        assert_eq!(params.run_mode.as_deref(), Some("RapidRun"));
        assert_eq!(params.chemistry.as_deref(), Some("TruSeq Rapid SBS Kit"));
    }

    #[test]
    fn test_malformed_run_info() {
        assert!(parse_run_info("<RunInfo><Run>").is_err());
        assert!(parse_run_info("<RunInfo/>").is_err());
        assert!(parse_run_info(r#"<RunInfo><Run><Reads><Read NumCycles="5"/></Reads></Run></RunInfo>"#).is_err());
    }

    #[test]
    fn test_reader_defaults_for_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let reader = XmlMetadataReader;
        assert_eq!(reader.read_run_info(dir.path()).unwrap(), RunInfo::default());
        assert_eq!(reader.read_run_parameters(dir.path()).unwrap(), RunParameters::default());
    }

    #[test]
    fn test_reader_finds_capitalized_parameters_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("RunParameters.xml"),
            "<RunParameters><Chemistry>Amplicon</Chemistry></RunParameters>",
        )
        .unwrap();
        fs::write(dir.path().join(RUN_INFO_FILE), "not xml").unwrap();

        let reader = XmlMetadataReader;
        let params = reader.read_run_parameters(dir.path()).unwrap();
        assert_eq!(params.chemistry.as_deref(), Some("Amplicon"));
        assert!(matches!(
            reader.read_run_info(dir.path()),
            Err(Error::Metadata { .. })
        ));
    }
}
