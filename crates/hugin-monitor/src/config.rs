// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Monitor configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use hugin_core::facts::SentinelNames;
use hugin_core::{ProjectTiming, TimingPolicy};
use thiserror::Error;

/// Errors while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing environment variable {0}")]
    MissingEnvVar(&'static str),

    /// A variable is set to something unusable.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Display name and storage location of an instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentAlias {
    pub name: String,
    pub location: Option<String>,
}

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Folders instruments write run folders into.
    pub run_folders: Vec<PathBuf>,
    /// Name of the sub-folder of a run folder holding runs excluded from sync.
    pub nosync_folder: String,
    /// Folders searched for `{flowcell}.csv` sample sheets.
    pub samplesheet_folders: Vec<PathBuf>,
    /// Folders holding project analysis trees.
    pub analysis_folders: Vec<PathBuf>,
    /// Folders runs are moved to once transferred.
    pub archive_folders: Vec<PathBuf>,
    pub run_board: Option<String>,
    pub run_archive_board: Option<String>,
    pub project_board: Option<String>,
    pub project_archive_board: Option<String>,
    /// Age after which terminal run cards are archived.
    pub retention: Duration,
    /// Runs processed at once.
    pub concurrency: usize,
    pub timing: TimingPolicy,
    pub project_timing: ProjectTiming,
    pub sentinels: SentinelNames,
    /// Transfer log file name, relative to the run folder's data folder.
    pub transfer_log: String,
    /// Instrument id to alias.
    pub instruments: BTreeMap<String, InstrumentAlias>,
    /// Description keys always taken from the engine.
    pub refresh_keys: Vec<String>,
    /// Sample sheet descriptions that make a MiSeq run tracked.
    pub miseq_descriptions: Vec<String>,
    /// Recipients used when a card's members resolve to nobody.
    pub email_default: Vec<String>,
    /// Board user name to addresses.
    pub email_users: BTreeMap<String, Vec<String>>,
    /// Endpoint notifications are posted to; logged only when unset.
    pub notify_webhook: Option<String>,
    /// Name of this host, written to the `Processed in` key.
    pub host: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            run_folders: Vec::new(),
            nosync_folder: "nosync".to_string(),
            samplesheet_folders: Vec::new(),
            analysis_folders: Vec::new(),
            archive_folders: Vec::new(),
            run_board: None,
            run_archive_board: None,
            project_board: None,
            project_archive_board: None,
            retention: Duration::days(45),
            concurrency: 4,
            timing: TimingPolicy::default(),
            project_timing: ProjectTiming::default(),
            sentinels: SentinelNames::default(),
            transfer_log: "transfer.tsv".to_string(),
            instruments: BTreeMap::new(),
            refresh_keys: split_list("Setup,Index,Status,Warning"),
            miseq_descriptions: split_list("qc,production,applications"),
            email_default: Vec::new(),
            email_users: BTreeMap::new(),
            notify_webhook: None,
            host: host_name(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `HUGIN_RUN_FOLDERS`, `HUGIN_SAMPLESHEET_FOLDERS`, `HUGIN_ANALYSIS_FOLDERS`,
    ///   `HUGIN_ARCHIVE_FOLDERS`: comma separated folder lists
    /// - `HUGIN_NOSYNC_FOLDER`: nosync sub-folder name (default: "nosync")
    /// - `HUGIN_RUN_BOARD`, `HUGIN_RUN_ARCHIVE_BOARD`, `HUGIN_PROJECT_BOARD`,
    ///   `HUGIN_PROJECT_ARCHIVE_BOARD`: board names
    /// - `HUGIN_RETENTION_DAYS`: archive age of terminal run cards (default: 45)
    /// - `HUGIN_CONCURRENCY`: runs processed at once (default: 4)
    /// - `HUGIN_*_HOURS`, `HUGIN_MIN_EMPIRICAL_CYCLES`, `HUGIN_PRESEQUENCING_CYCLES`: timing
    /// - `HUGIN_SEQUENCING_COMPLETE`, `HUGIN_BASECALLING_TEMPLATE`, `HUGIN_PROCESSING_TEMPLATE`,
    ///   `HUGIN_DEMULTIPLEXING_DIR`, `HUGIN_DEMULTIPLEXING_DONE`, `HUGIN_CYCLE_LOG`,
    ///   `HUGIN_TRANSFER_LOG`: sentinel file names
    /// - `HUGIN_INSTRUMENTS`: `SN123=name@location;...`
    /// - `HUGIN_REFRESH_KEYS`, `HUGIN_MISEQ_DESCRIPTIONS`: comma separated
    /// - `HUGIN_EMAIL_DEFAULT`, `HUGIN_EMAIL_USERS` (`user=a@x,b@x;...`), `HUGIN_NOTIFY_WEBHOOK`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`MonitorConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        let timing = TimingPolicy {
            demultiplexing: hours(&get, "HUGIN_DEMULTIPLEXING_HOURS", defaults.timing.demultiplexing)?,
            transferring: hours(&get, "HUGIN_TRANSFERRING_HOURS", defaults.timing.transferring)?,
            processing: hours(&get, "HUGIN_PROCESSING_HOURS", defaults.timing.processing)?,
            sent_upstream: hours(&get, "HUGIN_SENT_UPSTREAM_HOURS", defaults.timing.sent_upstream)?,
            min_empirical_cycles: parse(
                &get,
                "HUGIN_MIN_EMPIRICAL_CYCLES",
                defaults.timing.min_empirical_cycles,
            )?,
            presequencing_cycles: parse(
                &get,
                "HUGIN_PRESEQUENCING_CYCLES",
                defaults.timing.presequencing_cycles,
            )?,
            cycle_check_after: defaults.timing.cycle_check_after,
            cycle_slack: defaults.timing.cycle_slack,
        };

        let base = SentinelNames::default();
        let sentinels = SentinelNames {
            sequencing_complete: get("HUGIN_SEQUENCING_COMPLETE").unwrap_or(base.sequencing_complete),
            basecalling_template: get("HUGIN_BASECALLING_TEMPLATE").unwrap_or(base.basecalling_template),
            processing_template: get("HUGIN_PROCESSING_TEMPLATE").unwrap_or(base.processing_template),
            demultiplexing_dir: get("HUGIN_DEMULTIPLEXING_DIR").unwrap_or(base.demultiplexing_dir),
            demultiplexing_done: get("HUGIN_DEMULTIPLEXING_DONE").unwrap_or(base.demultiplexing_done),
            cycle_log: get("HUGIN_CYCLE_LOG").unwrap_or(base.cycle_log),
        };

        let concurrency: usize = parse(&get, "HUGIN_CONCURRENCY", defaults.concurrency)?;
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "HUGIN_CONCURRENCY",
                reason: "must be at least 1".to_string(),
            });
        }
        let retention_days: i64 = parse(&get, "HUGIN_RETENTION_DAYS", 45)?;
        let retention = Duration::try_days(retention_days).ok_or_else(|| ConfigError::Invalid {
            key: "HUGIN_RETENTION_DAYS",
            reason: format!("{retention_days} days is out of range"),
        })?;

        Ok(Self {
            run_folders: paths(get("HUGIN_RUN_FOLDERS")),
            nosync_folder: get("HUGIN_NOSYNC_FOLDER").unwrap_or(defaults.nosync_folder),
            samplesheet_folders: paths(get("HUGIN_SAMPLESHEET_FOLDERS")),
            analysis_folders: paths(get("HUGIN_ANALYSIS_FOLDERS")),
            archive_folders: paths(get("HUGIN_ARCHIVE_FOLDERS")),
            run_board: get("HUGIN_RUN_BOARD"),
            run_archive_board: get("HUGIN_RUN_ARCHIVE_BOARD"),
            project_board: get("HUGIN_PROJECT_BOARD"),
            project_archive_board: get("HUGIN_PROJECT_ARCHIVE_BOARD"),
            retention,
            concurrency,
            timing,
            project_timing: defaults.project_timing,
            sentinels,
            transfer_log: get("HUGIN_TRANSFER_LOG").unwrap_or(defaults.transfer_log),
            instruments: match get("HUGIN_INSTRUMENTS") {
                Some(value) => parse_instruments(&value)?,
                None => BTreeMap::new(),
            },
            refresh_keys: get("HUGIN_REFRESH_KEYS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.refresh_keys),
            miseq_descriptions: get("HUGIN_MISEQ_DESCRIPTIONS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.miseq_descriptions),
            email_default: get("HUGIN_EMAIL_DEFAULT")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            email_users: match get("HUGIN_EMAIL_USERS") {
                Some(value) => parse_email_users(&value)?,
                None => BTreeMap::new(),
            },
            notify_webhook: get("HUGIN_NOTIFY_WEBHOOK"),
            host: defaults.host,
        })
    }

    pub fn with_run_folders(mut self, folders: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.run_folders = folders.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_analysis_folders(
        mut self,
        folders: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        self.analysis_folders = folders.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_archive_folders(
        mut self,
        folders: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        self.archive_folders = folders.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_run_board(mut self, board: impl Into<String>) -> Self {
        self.run_board = Some(board.into());
        self
    }

    pub fn with_run_archive_board(mut self, board: impl Into<String>) -> Self {
        self.run_archive_board = Some(board.into());
        self
    }

    pub fn with_project_board(mut self, board: impl Into<String>) -> Self {
        self.project_board = Some(board.into());
        self
    }

    pub fn with_project_archive_board(mut self, board: impl Into<String>) -> Self {
        self.project_archive_board = Some(board.into());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Instrument id annotated with its alias, e.g. `SN123 (hal) from nas`.
    pub fn instrument_label(&self, instrument: &str) -> String {
        match self.instruments.get(instrument) {
            Some(InstrumentAlias {
                name,
                location: Some(location),
            }) => format!("{instrument} ({name}) from {location}"),
            Some(InstrumentAlias {
                name,
                location: None,
            }) => format!("{instrument} ({name})"),
            None => instrument.to_string(),
        }
    }
}

/// Host name of this machine.
pub fn host_name() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn paths(value: Option<String>) -> Vec<PathBuf> {
    value
        .map(|v| split_list(&v).into_iter().map(PathBuf::from).collect())
        .unwrap_or_default()
}

fn parse<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn hours(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match get(key) {
        Some(value) => {
            let hours: f64 = value.parse().map_err(|e: std::num::ParseFloatError| {
                ConfigError::Invalid {
                    key,
                    reason: e.to_string(),
                }
            })?;
            if !hours.is_finite() || hours < 0.0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("{hours} is not a duration"),
                });
            }
            Duration::try_seconds((hours * 3600.0).round() as i64).ok_or_else(|| {
                ConfigError::Invalid {
                    key,
                    reason: format!("{hours} hours is out of range"),
                }
            })
        }
        None => Ok(default),
    }
}

fn parse_instruments(value: &str) -> Result<BTreeMap<String, InstrumentAlias>, ConfigError> {
    let mut instruments = BTreeMap::new();
    for entry in value.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((id, alias)) = entry.split_once('=') else {
            return Err(ConfigError::Invalid {
                key: "HUGIN_INSTRUMENTS",
                reason: format!("expected ID=name@location, got '{entry}'"),
            });
        };
        let (name, location) = match alias.split_once('@') {
            Some((name, location)) => (name.trim(), Some(location.trim().to_string())),
            None => (alias.trim(), None),
        };
        instruments.insert(
            id.trim().to_string(),
            InstrumentAlias {
                name: name.to_string(),
                location: location.filter(|l| !l.is_empty()),
            },
        );
    }
    Ok(instruments)
}

fn parse_email_users(value: &str) -> Result<BTreeMap<String, Vec<String>>, ConfigError> {
    let mut users = BTreeMap::new();
    for entry in value.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((user, addresses)) = entry.split_once('=') else {
            return Err(ConfigError::Invalid {
                key: "HUGIN_EMAIL_USERS",
                reason: format!("expected user=address, got '{entry}'"),
            });
        };
        users.insert(user.trim().to_string(), split_list(addresses));
    }
    Ok(users)
}
