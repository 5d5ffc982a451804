//! Run configuration: which files to reconcile and how strictly to read them.
//!
//! Settings come from an optional JSON file and/or the command line. Both
//! produce a `RunSettings` (every field optional); `validate()` turns the
//! merged settings into a `RunConfig` the engine can run.

use crate::error::{ReconError, ReconResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to do with a row that is too short or carries an unreadable quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedRowPolicy {
    /// Log a warning, count the row, keep going.
    Skip,
    /// Abort the run on the first malformed row.
    #[default]
    Fail,
}

/// File format of the written report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Workbook with a single `Auto Output` sheet.
    #[default]
    Xlsx,
    Csv,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Xlsx => "xlsx",
            ReportFormat::Csv  => "csv",
        }
    }
}

/// Paths of the three debug-report sheets. Always supplied together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugPaths {
    pub reimbursements: PathBuf,
    pub returns_to_fba: PathBuf,
    pub date_range:     PathBuf,
}

impl DebugPaths {
    /// All three present → `Some`, none present → `None`,
    /// anything in between → `IncompleteDebugContext`.
    pub fn from_parts(
        reimbursements: Option<PathBuf>,
        returns_to_fba: Option<PathBuf>,
        date_range: Option<PathBuf>,
    ) -> ReconResult<Option<Self>> {
        match (reimbursements, returns_to_fba, date_range) {
            (Some(reimbursements), Some(returns_to_fba), Some(date_range)) => Ok(Some(Self {
                reimbursements,
                returns_to_fba,
                date_range,
            })),
            (None, None, None) => Ok(None),
            (r, f, d) => {
                let mut missing = Vec::new();
                if r.is_none() {
                    missing.push("reimbursements");
                }
                if f.is_none() {
                    missing.push("returns_to_fba");
                }
                if d.is_none() {
                    missing.push("date_range");
                }
                Err(ReconError::IncompleteDebugContext { missing })
            }
        }
    }
}

/// A validated, ready-to-run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub old_version:    PathBuf,
    pub new_version:    PathBuf,
    pub debug:          Option<DebugPaths>,
    pub malformed_rows: MalformedRowPolicy,
    pub output_dir:     PathBuf,
    pub report_format:  ReportFormat,
}

impl RunConfig {
    /// Reconcile-only configuration with default policy and output directory.
    pub fn new(old_version: impl Into<PathBuf>, new_version: impl Into<PathBuf>) -> Self {
        Self {
            old_version:    old_version.into(),
            new_version:    new_version.into(),
            debug:          None,
            malformed_rows: MalformedRowPolicy::default(),
            output_dir:     PathBuf::from("."),
            report_format:  ReportFormat::default(),
        }
    }

    pub fn with_debug(mut self, debug: DebugPaths) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn with_policy(mut self, policy: MalformedRowPolicy) -> Self {
        self.malformed_rows = policy;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }
}

/// Unvalidated settings as read from a JSON file or the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSettings {
    #[serde(default)]
    pub old_version:    Option<PathBuf>,
    #[serde(default)]
    pub new_version:    Option<PathBuf>,
    #[serde(default)]
    pub reimbursements: Option<PathBuf>,
    #[serde(default)]
    pub returns_to_fba: Option<PathBuf>,
    #[serde(default)]
    pub date_range:     Option<PathBuf>,
    #[serde(default)]
    pub malformed_rows: Option<MalformedRowPolicy>,
    #[serde(default)]
    pub output_dir:     Option<PathBuf>,
    #[serde(default)]
    pub report_format:  Option<ReportFormat>,
}

impl RunSettings {
    /// Load settings from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let settings: RunSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Overlay `other` on top of `self`: any value set in `other` wins.
    pub fn merge(self, other: RunSettings) -> Self {
        Self {
            old_version:    other.old_version.or(self.old_version),
            new_version:    other.new_version.or(self.new_version),
            reimbursements: other.reimbursements.or(self.reimbursements),
            returns_to_fba: other.returns_to_fba.or(self.returns_to_fba),
            date_range:     other.date_range.or(self.date_range),
            malformed_rows: other.malformed_rows.or(self.malformed_rows),
            output_dir:     other.output_dir.or(self.output_dir),
            report_format:  other.report_format.or(self.report_format),
        }
    }

    pub fn validate(self) -> ReconResult<RunConfig> {
        let old_version = self
            .old_version
            .ok_or(ReconError::MissingConfig { field: "old_version" })?;
        let new_version = self
            .new_version
            .ok_or(ReconError::MissingConfig { field: "new_version" })?;
        let debug = DebugPaths::from_parts(self.reimbursements, self.returns_to_fba, self.date_range)?;

        Ok(RunConfig {
            old_version,
            new_version,
            debug,
            malformed_rows: self.malformed_rows.unwrap_or_default(),
            output_dir:     self.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            report_format:  self.report_format.unwrap_or_default(),
        })
    }
}
