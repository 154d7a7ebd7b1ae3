// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Card description codec.
//!
//! Card descriptions hold structured metadata as a markdown bullet list that
//! operators can also edit by hand:
//!
//! ```text
//! description := row ("\n" row)*
//! row         := "- " key [": " value]
//! value       := item ("," item)*
//! ```
//!
//! Keys cannot contain `:` and items cannot contain `,`. A key with no value
//! is a flag. Encoding sorts keys, so a canonical description round-trips
//! byte for byte.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Decoded card description: an ordered map from key to list of items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description(BTreeMap<String, Vec<String>>);

impl Description {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` from a scalar, splitting it on `,`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl AsRef<str>) {
        self.0.insert(key.into(), split_items(value.as_ref()));
    }

    /// Sets `key` from a list of items.
    pub fn insert_list<I, V>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        let items = values
            .into_iter()
            .flat_map(|v| split_items(v.as_ref()))
            .collect();
        self.0.insert(key.into(), items);
    }

    /// Sets `key` as a flag with no value.
    pub fn insert_flag(&mut self, key: impl Into<String>) {
        self.0.insert(key.into(), Vec::new());
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Items of `key` joined with `,`.
    pub fn get_joined(&self, key: &str) -> Option<String> {
        self.0.get(key).map(|items| items.join(","))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Serializes to the card text format.
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(key, items)| {
                if items.is_empty() {
                    format!("- {key}")
                } else {
                    format!("- {key}: {}", items.join(","))
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parses card text. Never fails: blank lines are ignored and a line
    /// without `:` is read as a flag.
    pub fn decode(text: &str) -> Self {
        let mut map = BTreeMap::new();
        for line in text.lines() {
            let row = line.trim();
            let row = row.strip_prefix('-').unwrap_or(row).trim();
            if row.is_empty() {
                continue;
            }
            let (key, items) = match row.split_once(':') {
                Some((key, value)) => (key.trim(), split_items(value)),
                None => (row, Vec::new()),
            };
            if key.is_empty() {
                continue;
            }
            map.insert(key.to_string(), items);
        }
        Self(map)
    }

    /// Merges engine output (`self`) with what is on the card.
    ///
    /// Values already on the card win, so operator edits survive, except for
    /// `refresh_keys`, which always come from the engine and are dropped when
    /// the engine no longer produces them.
    pub fn merge_preferring(&self, existing: &Description, refresh_keys: &[String]) -> Description {
        let mut merged = self.clone();
        for (key, items) in existing.iter() {
            if refresh_keys.iter().any(|k| k == key) {
                continue;
            }
            merged.0.insert(key.clone(), items.clone());
        }
        merged
    }
}

fn split_items(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.replace(['\n', '\r'], " ").trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Description {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Description::decode(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_card() -> Description {
        let mut d = Description::new();
        d.insert_list("Projects", ["J.Doe_12_01", "A.Smith_12_02"]);
        d.insert("Setup", "2x101");
        d.insert("Flowcell", "ABC123CXX");
        d.insert("Processed in", "seqhost1");
        d.insert_flag("Rerun");
        d
    }

    #[test]
    fn test_encode_is_sorted_and_canonical() {
        let encoded = run_card().encode();
        assert_eq!(
            encoded,
            "- Flowcell: ABC123CXX\n\
             - Processed in: seqhost1\n\
             - Projects: J.Doe_12_01,A.Smith_12_02\n\
             - Rerun\n\
             - Setup: 2x101"
        );
        assert_eq!(Description::decode(&encoded), run_card());
        assert_eq!(Description::decode(&encoded).encode(), encoded);
    }

    #[test]
    fn test_decode_tolerates_hand_edits() {
        let d = Description::decode("\n-  Projects:  P1 , P2,\n\nNote: rerun lane 3\n- Flag \n");
        assert_eq!(d.get("Projects"), Some(&["P1".to_string(), "P2".to_string()][..]));
        assert_eq!(d.get_joined("Note").as_deref(), Some("rerun lane 3"));
        assert_eq!(d.get("Flag"), Some(&[][..]));
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn test_value_may_contain_colon() {
        let d = Description::decode("- Date: 2012-01-06 10:00:00");
        assert_eq!(d.get_joined("Date").as_deref(), Some("2012-01-06 10:00:00"));
    }

    #[test]
    fn test_empty_description() {
        assert!(Description::decode("").is_empty());
        assert_eq!(Description::new().encode(), "");
    }

    #[test]
    fn test_merge_keeps_operator_values_and_refreshes_setup() {
        let mut engine = Description::new();
        engine.insert("Setup", "2x101");
        engine.insert("Projects", "P1");
        engine.insert("Status", "Second read");

        let existing = Description::decode(
            "- Projects: P1,P2-manual\n- Setup: 1x101\n- Note: lane 3 failed\n- Warning: old",
        );
        let merged = engine.merge_preferring(
            &existing,
            &["Setup".to_string(), "Status".to_string(), "Warning".to_string()],
        );

        assert_eq!(merged.get_joined("Projects").as_deref(), Some("P1,P2-manual"));
        assert_eq!(merged.get_joined("Setup").as_deref(), Some("2x101"));
        assert_eq!(merged.get_joined("Note").as_deref(), Some("lane 3 failed"));
        assert_eq!(merged.get_joined("Status").as_deref(), Some("Second read"));
        assert!(!merged.contains_key("Warning"));
    }
}
