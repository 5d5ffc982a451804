//! Report assembly and output.
//!
//! `assemble` turns the finished ledger into display rows; a `ReportWriter`
//! puts them somewhere. The engine only ever talks to the trait.

use crate::{
    config::ReportFormat,
    error::ReconResult,
    ledger::{Ledger, Quantity},
};
use chrono::NaiveDateTime;
use rust_xlsxwriter::Workbook;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const REPORT_HEADER: [&str; 9] = [
    "Order_id",
    "SKU",
    "Order Qty",
    "Refund Qty",
    "Returned Qty",
    "Reimbursed Qty",
    "Status",
    "Missing in",
    "Reason",
];

const REPORT_FILE_PREFIX: &str = "Order_Discrepancy_comparison_result";

/// One output row. Absent values are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub order_id:       String,
    pub sku:            String,
    pub order_qty:      String,
    pub refund_qty:     String,
    pub returned_qty:   String,
    pub reimbursed_qty: String,
    pub status:         String,
    pub missing_in:     String,
    pub reason:         String,
}

impl ReportRow {
    /// Cells in `REPORT_HEADER` order.
    pub fn fields(&self) -> [&str; 9] {
        [
            self.order_id.as_str(),
            self.sku.as_str(),
            self.order_qty.as_str(),
            self.refund_qty.as_str(),
            self.returned_qty.as_str(),
            self.reimbursed_qty.as_str(),
            self.status.as_str(),
            self.missing_in.as_str(),
            self.reason.as_str(),
        ]
    }
}

fn cell(qty: Quantity) -> String {
    qty.recorded().map(|q| q.to_string()).unwrap_or_default()
}

/// Rows for every ledger entry, MISSING first, then FINE.
/// Within a status the ledger's insertion order is kept.
pub fn assemble(ledger: &Ledger) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = ledger
        .iter()
        .map(|(identity, entry)| ReportRow {
            order_id:       identity.order_id.clone(),
            sku:            identity.sku.clone(),
            order_qty:      cell(entry.order_qty),
            refund_qty:     cell(entry.refund_qty),
            returned_qty:   cell(entry.returned_qty),
            reimbursed_qty: cell(entry.reimbursed_qty),
            status:         entry.status.as_str().to_string(),
            missing_in:     ledger.missing_in_label(entry).unwrap_or_default().to_string(),
            reason:         entry.reason.map(|r| r.description()).unwrap_or_default().to_string(),
        })
        .collect();

    // Stable: equal statuses keep ledger order.
    rows.sort_by(|a, b| b.status.cmp(&a.status));
    rows
}

/// Destination for assembled report rows.
pub trait ReportWriter {
    fn write_report(&mut self, rows: &[ReportRow]) -> ReconResult<()>;

    /// Human-readable description of where the report went.
    fn destination(&self) -> String;
}

/// `Order_Discrepancy_comparison_result_<timestamp>.<ext>`, to the microsecond.
pub fn report_file_name(at: NaiveDateTime, format: ReportFormat) -> String {
    format!(
        "{REPORT_FILE_PREFIX}_{}.{}",
        at.format("%Y-%m-%d_%H-%M-%S-%6f"),
        format.extension()
    )
}

/// A writer for a timestamped report file inside `dir`.
pub fn file_writer(dir: &Path, at: NaiveDateTime, format: ReportFormat) -> Box<dyn ReportWriter> {
    let path = dir.join(report_file_name(at, format));
    match format {
        ReportFormat::Xlsx => Box::new(XlsxReportWriter::new(path)),
        ReportFormat::Csv  => Box::new(CsvReportWriter::new(path)),
    }
}

/// Stage the report in a temp file next to `path`, then move it into place.
/// Fails if `path` already exists. Nothing is left behind on error.
fn publish<F>(path: &Path, fill: F) -> ReconResult<()>
where
    F: FnOnce(&mut NamedTempFile) -> ReconResult<()>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut staged = tempfile::Builder::new()
        .prefix(".report-")
        .suffix(".part")
        .tempfile_in(dir)?;
    fill(&mut staged)?;
    staged.as_file().sync_all()?;
    staged.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}

/// Writes the report as a comma-delimited file with a header row.
#[derive(Debug, Clone)]
pub struct CsvReportWriter {
    path: PathBuf,
}

impl CsvReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportWriter for CsvReportWriter {
    fn write_report(&mut self, rows: &[ReportRow]) -> ReconResult<()> {
        publish(&self.path, |staged| {
            let mut writer = csv::Writer::from_writer(staged);
            writer.write_record(REPORT_HEADER)?;
            for row in rows {
                writer.write_record(row.fields())?;
            }
            writer.flush()?;
            Ok(())
        })?;
        log::info!("report written: {} rows to {}", rows.len(), self.path.display());
        Ok(())
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}

pub const XLSX_SHEET_NAME: &str = "Auto Output";

/// Column widths of the workbook sheet, in `REPORT_HEADER` order.
pub const XLSX_COLUMN_WIDTHS: [f64; 9] = [21.0, 20.0, 8.0, 8.0, 8.0, 8.0, 10.0, 15.0, 40.0];

const QUANTITY_COLUMNS: std::ops::RangeInclusive<u16> = 2..=5;

/// Largest integer an xlsx number cell holds exactly.
const XLSX_EXACT_INTEGER: u64 = 1 << 53;

/// Writes the report as a workbook with one sheet. Quantities are number
/// cells; blanks are left empty.
#[derive(Debug, Clone)]
pub struct XlsxReportWriter {
    path: PathBuf,
}

impl XlsxReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn workbook(rows: &[ReportRow]) -> ReconResult<Vec<u8>> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(XLSX_SHEET_NAME)?;

        for (col, (title, width)) in REPORT_HEADER.iter().zip(XLSX_COLUMN_WIDTHS).enumerate() {
            let col = col as u16;
            sheet.set_column_width(col, width)?;
            sheet.write_string(0, col, *title)?;
        }

        for (index, row) in rows.iter().enumerate() {
            let line = u32::try_from(index + 1).unwrap_or(u32::MAX);
            for (col, value) in row.fields().into_iter().enumerate() {
                let col = col as u16;
                if value.is_empty() {
                    continue;
                }
                match number_cell(col, value) {
                    Some(n) => sheet.write_number(line, col, n)?,
                    None => sheet.write_string(line, col, value)?,
                };
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}

fn number_cell(col: u16, value: &str) -> Option<f64> {
    if !QUANTITY_COLUMNS.contains(&col) {
        return None;
    }
    value
        .parse::<u64>()
        .ok()
        .filter(|&n| n <= XLSX_EXACT_INTEGER)
        .map(|n| n as f64)
}

impl ReportWriter for XlsxReportWriter {
    fn write_report(&mut self, rows: &[ReportRow]) -> ReconResult<()> {
        let bytes = Self::workbook(rows)?;
        publish(&self.path, |staged| {
            staged.write_all(&bytes)?;
            Ok(())
        })?;
        log::info!("report written: {} rows to {}", rows.len(), self.path.display());
        Ok(())
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps the rows in memory. Used by tests and by callers that post-process.
#[derive(Debug, Clone, Default)]
pub struct MemoryReportWriter {
    pub rows: Vec<ReportRow>,
    pub writes: usize,
}

impl ReportWriter for MemoryReportWriter {
    fn write_report(&mut self, rows: &[ReportRow]) -> ReconResult<()> {
        self.rows = rows.to_vec();
        self.writes += 1;
        Ok(())
    }

    fn destination(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classifier::{Reason, ReasonClassifier},
        detector::detect,
        ledger::QtyField,
        types::{Identity, VersionLabels},
    };
    use chrono::NaiveDate;

    fn ledger() -> Ledger {
        let old = vec![
            Identity::new("F1", "S"),
            Identity::new("M1", "S"),
            Identity::new("F2", "S"),
        ];
        let new = vec![
            Identity::new("F2", "S"),
            Identity::new("F1", "S"),
            Identity::new("M2", "S"),
        ];
        detect(&old, &new, VersionLabels::from_paths("old.csv", "new.csv"))
    }

    #[test]
    fn missing_rows_come_first_in_ledger_order() {
        let rows = assemble(&ledger());
        let order: Vec<_> = rows.iter().map(|r| r.order_id.as_str()).collect();
        assert_eq!(order, vec!["M1", "M2", "F1", "F2"]);
    }

    #[test]
    fn absent_values_render_blank() {
        let mut ledger = ledger();
        ledger
            .get_mut(&Identity::new("M1", "S"))
            .unwrap()
            .record(QtyField::Refund, 3)
            .unwrap();
        ReasonClassifier::build().classify(&mut ledger);
        let rows = assemble(&ledger);

        let m1 = rows.iter().find(|r| r.order_id == "M1").unwrap();
        assert_eq!(m1.order_qty, "");
        assert_eq!(m1.refund_qty, "3");
        assert_eq!(m1.missing_in, "new version (path: new.csv)");
        assert_eq!(m1.reason, Reason::RefundWithoutOrder.description());

        let f1 = rows.iter().find(|r| r.order_id == "F1").unwrap();
        assert_eq!(f1.status, "FINE");
        assert_eq!(f1.missing_in, "");
        assert_eq!(f1.reason, "");
    }

    #[test]
    fn file_name_carries_timestamp_to_the_microsecond() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(14, 5, 7, 250)
            .unwrap();
        assert_eq!(
            report_file_name(at, ReportFormat::Csv),
            "Order_Discrepancy_comparison_result_2024-03-09_14-05-07-000250.csv"
        );
        assert_eq!(
            report_file_name(at, ReportFormat::Xlsx),
            "Order_Discrepancy_comparison_result_2024-03-09_14-05-07-000250.xlsx"
        );
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn existing_report_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let rows = assemble(&ledger());

        CsvReportWriter::new(&path).write_report(&rows).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        let err = CsvReportWriter::new(&path).write_report(&rows[..1]).unwrap_err();
        match err {
            crate::error::ReconError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
        assert_eq!(dir_entries(dir.path()), vec!["report.csv"]);
    }

    #[test]
    fn failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let err = publish(&path, |staged| {
            staged.write_all(b"Order_id,SKU\npartial")?;
            Err(crate::error::ReconError::MissingConfig { field: "rows" })
        })
        .unwrap_err();

        assert!(matches!(err, crate::error::ReconError::MissingConfig { .. }));
        assert!(dir_entries(dir.path()).is_empty(), "staged file must be removed");
    }

    #[test]
    fn quantity_columns_become_number_cells() {
        assert_eq!(number_cell(2, "3"), Some(3.0));
        assert_eq!(number_cell(5, "0"), Some(0.0));
        assert_eq!(number_cell(0, "3"), None, "order ids stay text");
        assert_eq!(number_cell(3, &u64::MAX.to_string()), None);
    }

    #[test]
    fn workbook_has_one_sheet_with_header_and_rows() {
        use calamine::{open_workbook, Reader, Xlsx};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let mut ledger = ledger();
        ledger
            .get_mut(&Identity::new("M1", "S"))
            .unwrap()
            .record(QtyField::Refund, 3)
            .unwrap();
        ReasonClassifier::build().classify(&mut ledger);
        let rows = assemble(&ledger);

        XlsxReportWriter::new(&path).write_report(&rows).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec![XLSX_SHEET_NAME.to_string()]);
        let range = workbook.worksheet_range(XLSX_SHEET_NAME).unwrap();
        let cells: Vec<Vec<String>> = range
            .rows()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();

        assert_eq!(cells.len(), rows.len() + 1);
        assert_eq!(cells[0], REPORT_HEADER);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(cells[i + 1], row.fields(), "row {i}");
        }
        assert_eq!(dir_entries(dir.path()), vec!["report.xlsx"]);
    }
}
