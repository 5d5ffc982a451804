//! recon-runner: compares two versions of an order discrepancy report.
//!
//! Usage:
//!   recon-runner --old 51.csv --new 26.csv
//!   recon-runner --old 51.csv --new 26.csv \
//!       --reimbursements reimbursements.csv \
//!       --returns-to-fba returns_to_fba.csv \
//!       --date-range date_range.csv
//!   recon-runner --config run.json --output-dir out/ --format csv --summary-json

use anyhow::Result;
use clap::{Parser, ValueEnum};
use discrepancy_core::{
    config::{MalformedRowPolicy, ReportFormat, RunSettings},
    engine::{ReconEngine, RunSummary},
};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RowPolicy {
    Skip,
    Fail,
}

impl From<RowPolicy> for MalformedRowPolicy {
    fn from(policy: RowPolicy) -> Self {
        match policy {
            RowPolicy::Skip => MalformedRowPolicy::Skip,
            RowPolicy::Fail => MalformedRowPolicy::Fail,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Xlsx,
    Csv,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Xlsx => ReportFormat::Xlsx,
            OutputFormat::Csv  => ReportFormat::Csv,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "recon-runner", version, about = "Compare order discrepancy report versions")]
struct Cli {
    /// JSON settings file. Flags below override its values.
    #[arg(long)]
    config: Option<String>,

    /// Old version of the report (CSV)
    #[arg(long = "old")]
    old_version: Option<PathBuf>,

    /// New version of the report (CSV)
    #[arg(long = "new")]
    new_version: Option<PathBuf>,

    /// Reimbursements sheet of the debug report
    #[arg(long)]
    reimbursements: Option<PathBuf>,

    /// ReturnsToFBA sheet of the debug report
    #[arg(long)]
    returns_to_fba: Option<PathBuf>,

    /// DateRange sheet of the debug report
    #[arg(long)]
    date_range: Option<PathBuf>,

    /// What to do with short rows or unreadable quantities
    #[arg(long, value_enum)]
    malformed_rows: Option<RowPolicy>,

    /// Directory the report is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Report file format [default: xlsx]
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Print the run summary as JSON instead of text
    #[arg(long)]
    summary_json: bool,
}

impl Cli {
    fn settings(&self) -> RunSettings {
        RunSettings {
            old_version:    self.old_version.clone(),
            new_version:    self.new_version.clone(),
            reimbursements: self.reimbursements.clone(),
            returns_to_fba: self.returns_to_fba.clone(),
            date_range:     self.date_range.clone(),
            malformed_rows: self.malformed_rows.map(Into::into),
            output_dir:     self.output_dir.clone(),
            report_format:  self.format.map(Into::into),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let file_settings = match &cli.config {
        Some(path) => RunSettings::load(path)?,
        None => RunSettings::default(),
    };
    let config = file_settings.merge(cli.settings()).validate()?;
    log::debug!("run config: {config:?}");

    if !cli.summary_json {
        println!("Order discrepancy comparison");
        println!("  old:      {}", config.old_version.display());
        println!("  new:      {}", config.new_version.display());
        match &config.debug {
            Some(debug) => {
                println!("  debug:    {}", debug.reimbursements.display());
                println!("            {}", debug.returns_to_fba.display());
                println!("            {}", debug.date_range.display());
            }
            None => println!("  debug:    (none, reasons will be blank)"),
        }
        println!();
    }

    let now = chrono_now();
    let summary = ReconEngine::build().run_config(&config, now)?;

    if cli.summary_json {
        println!("{}", summary.to_json()?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("=== RUN SUMMARY ===");
    println!("  old identities:  {}", summary.old_identities);
    println!("  new identities:  {}", summary.new_identities);
    println!("  ledger entries:  {}", summary.ledger_entries);
    println!("  missing in new:  {}", summary.missing_in_new);
    println!("  missing in old:  {}", summary.missing_in_old);
    println!("  fine:            {}", summary.fine);
    if summary.rows_skipped > 0 {
        println!("  rows skipped:    {}", summary.rows_skipped);
    }

    if let Some(reasons) = &summary.reasons {
        println!();
        println!("=== REASONS ===");
        println!("  not in debug:          {}", reasons.not_in_debug);
        println!("  refund without order:  {}", reasons.refund_without_order);
        println!("  refunds exceed orders: {}", reasons.refunds_exceed_orders);
        println!("  should be in report:   {}", reasons.should_appear);
        println!("  unexplained:           {}", reasons.unexplained);
    }

    if let Some(output) = &summary.output {
        println!();
        println!("Compare finished. See '{output}' for the result.");
    }
}

fn chrono_now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}
