//! The reconciliation engine: drives one run from input files to report.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Load       both report versions
//!   2. Detect     MISSING / FINE per identity → ledger
//!   3. Aggregate  debug sheets into the ledger       (only with debug sheets)
//!   4. Classify   MISSING entries                    (only with debug sheets)
//!   5. Assemble   rows and hand them to the writer
//!
//! RULES:
//!   - The engine owns the ledger; phases borrow it in order.
//!   - Every input is opened before any is read, so a missing file fails
//!     the run before work starts.
//!   - The writer is called once, after every other phase succeeded.
//!     A failed run writes nothing.

use crate::{
    aggregator::{aggregate, AggregationTally, DebugSources},
    classifier::{ReasonClassifier, ReasonTally},
    config::RunConfig,
    detector::detect,
    error::ReconResult,
    ledger::Ledger,
    loader::load_identities,
    report::{assemble, file_writer, ReportWriter},
    source::TabularSource,
    types::{VersionLabels, VersionSide},
};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Every source a run reads, already opened.
pub struct ReconInputs {
    pub old:    TabularSource,
    pub new:    TabularSource,
    pub labels: VersionLabels,
    pub debug:  Option<DebugSources>,
}

impl ReconInputs {
    pub fn open(config: &RunConfig) -> ReconResult<Self> {
        let policy = config.malformed_rows;
        let old = TabularSource::open("old version", &config.old_version, policy)?;
        let new = TabularSource::open("new version", &config.new_version, policy)?;
        let debug = match &config.debug {
            Some(paths) => Some(DebugSources::open(paths, policy)?),
            None => None,
        };
        let labels = VersionLabels::from_paths(
            &config.old_version.display().to_string(),
            &config.new_version.display().to_string(),
        );
        Ok(Self { old, new, labels, debug })
    }
}

/// End-of-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub old_identities: usize,
    pub new_identities: usize,
    pub ledger_entries: usize,
    pub missing_in_old: usize,
    pub missing_in_new: usize,
    pub fine:           usize,
    /// Present only when debug sheets were supplied.
    pub debug_rows:     Option<AggregationTally>,
    pub reasons:        Option<ReasonTally>,
    /// Malformed rows skipped across all sources.
    pub rows_skipped:   u64,
    pub output:         Option<String>,
}

impl RunSummary {
    pub fn to_json(&self) -> ReconResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A completed reconciliation, before any output is written.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub ledger:  Ledger,
    pub summary: RunSummary,
}

pub struct ReconEngine {
    classifier: ReasonClassifier,
}

impl ReconEngine {
    pub fn new(classifier: ReasonClassifier) -> Self {
        Self { classifier }
    }

    /// Engine with the standard reason chain.
    pub fn build() -> Self {
        Self::new(ReasonClassifier::build())
    }

    /// Phases 1–4. The returned ledger is final.
    pub fn reconcile(&self, inputs: ReconInputs) -> ReconResult<Reconciliation> {
        let ReconInputs {
            mut old,
            mut new,
            labels,
            debug,
        } = inputs;

        // 1. Load
        let old_version = load_identities(&mut old)?;
        let new_version = load_identities(&mut new)?;
        log::info!(
            "loaded {} old and {} new identities",
            old_version.identities.len(),
            new_version.identities.len()
        );

        // 2. Detect
        let mut ledger = detect(&old_version.identities, &new_version.identities, labels);
        log::info!(
            "{} identities: {} missing in new, {} missing in old, {} fine",
            ledger.len(),
            ledger.missing_count(VersionSide::New),
            ledger.missing_count(VersionSide::Old),
            ledger.fine_count()
        );

        let mut summary = RunSummary {
            old_identities: old_version.identities.len(),
            new_identities: new_version.identities.len(),
            ledger_entries: ledger.len(),
            missing_in_old: ledger.missing_count(VersionSide::Old),
            missing_in_new: ledger.missing_count(VersionSide::New),
            fine:           ledger.fine_count(),
            rows_skipped:   old_version.stats.rows_skipped + new_version.stats.rows_skipped,
            ..RunSummary::default()
        };

        match debug {
            Some(mut sources) => {
                // 3. Aggregate
                let tally = aggregate(&mut ledger, &mut sources)?;
                summary.rows_skipped += tally.rows_skipped();
                summary.debug_rows = Some(tally);

                // 4. Classify
                let reasons = self.classifier.classify(&mut ledger);
                log::info!(
                    "classified {} discrepancies ({} unexplained)",
                    ledger.discrepancies().count(),
                    reasons.unexplained
                );
                summary.reasons = Some(reasons);
            }
            None => {
                log::info!("no debug report supplied; discrepancies keep no reason");
            }
        }

        Ok(Reconciliation { ledger, summary })
    }

    /// All five phases. `writer` is only called if reconciliation succeeded.
    pub fn run(&self, inputs: ReconInputs, writer: &mut dyn ReportWriter) -> ReconResult<RunSummary> {
        let Reconciliation { ledger, mut summary } = self.reconcile(inputs)?;

        // 5. Assemble
        let rows = assemble(&ledger);
        writer.write_report(&rows)?;
        summary.output = Some(writer.destination());
        Ok(summary)
    }

    /// Open the configured inputs and write a timestamped report, in the
    /// configured format, into the configured output directory.
    pub fn run_config(&self, config: &RunConfig, at: NaiveDateTime) -> ReconResult<RunSummary> {
        let inputs = ReconInputs::open(config)?;
        let mut writer = file_writer(&config.output_dir, at, config.report_format);
        self.run(inputs, writer.as_mut())
    }
}

impl Default for ReconEngine {
    fn default() -> Self {
        Self::build()
    }
}
