//! Debug aggregator: folds the three debug-report sheets into the ledger.
//!
//! Each sheet is scanned exactly once. Every row is looked up in the ledger by
//! identity; rows for identities outside the two report versions are ignored.
//! Quantities accumulate by addition, so row order within a sheet is irrelevant.
//!
//! Sheets and the accumulator each one feeds:
//!   Reimbursements → reimbursed_qty
//!   ReturnsToFBA   → returned_qty
//!   DateRange      → order_qty ("Order" rows) / refund_qty ("Refund" rows)

use crate::{
    config::{DebugPaths, MalformedRowPolicy},
    error::{ReconError, ReconResult},
    ledger::{Ledger, QtyField},
    source::{EmptyQuantity, RowDefect, ScanStats, SourceRow, TabularSource},
    types::Identity,
};
use serde::Serialize;

/// Fixed column positions of one debug sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SheetColumns {
    order_id: usize,
    sku:      usize,
    quantity: usize,
}

impl SheetColumns {
    fn width(&self) -> usize {
        self.order_id.max(self.sku).max(self.quantity) + 1
    }

    fn identity(&self, row: &SourceRow<'_>) -> Result<Identity, RowDefect> {
        Ok(Identity::new(row.field(self.order_id)?, row.field(self.sku)?))
    }
}

const REIMBURSEMENT_COLUMNS: SheetColumns = SheetColumns { order_id: 3, sku: 5, quantity: 15 };
const RETURNS_COLUMNS: SheetColumns = SheetColumns { order_id: 1, sku: 2, quantity: 6 };
const DATE_RANGE_COLUMNS: SheetColumns = SheetColumns { order_id: 3, sku: 4, quantity: 6 };
const DATE_RANGE_CONDITION_COLUMN: usize = 2;

/// The three debug-report sheets. They only exist together.
pub struct DebugSources {
    pub reimbursements: TabularSource,
    pub returns_to_fba: TabularSource,
    pub date_range:     TabularSource,
}

impl DebugSources {
    pub fn open(paths: &DebugPaths, policy: MalformedRowPolicy) -> ReconResult<Self> {
        Ok(Self {
            reimbursements: TabularSource::open("reimbursements", &paths.reimbursements, policy)?,
            returns_to_fba: TabularSource::open("returns_to_fba", &paths.returns_to_fba, policy)?,
            date_range:     TabularSource::open("date_range", &paths.date_range, policy)?,
        })
    }

    /// Assemble from individually supplied sheets. Any gap is fatal.
    pub fn from_parts(
        reimbursements: Option<TabularSource>,
        returns_to_fba: Option<TabularSource>,
        date_range: Option<TabularSource>,
    ) -> ReconResult<Self> {
        match (reimbursements, returns_to_fba, date_range) {
            (Some(reimbursements), Some(returns_to_fba), Some(date_range)) => Ok(Self {
                reimbursements,
                returns_to_fba,
                date_range,
            }),
            (r, f, d) => {
                let missing = [
                    (r.is_none(), "reimbursements"),
                    (f.is_none(), "returns_to_fba"),
                    (d.is_none(), "date_range"),
                ]
                .into_iter()
                .filter_map(|(absent, name)| absent.then_some(name))
                .collect();
                Err(ReconError::IncompleteDebugContext { missing })
            }
        }
    }
}

/// Per-sheet counters from one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SheetTally {
    pub rows_read:    u64,
    pub rows_skipped: u64,
    /// Rows whose identity was found in the ledger.
    pub rows_matched: u64,
}

impl SheetTally {
    fn new(stats: ScanStats, rows_matched: u64) -> Self {
        Self {
            rows_read: stats.rows_read,
            rows_skipped: stats.rows_skipped,
            rows_matched,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregationTally {
    pub reimbursements: SheetTally,
    pub returns_to_fba: SheetTally,
    pub date_range:     SheetTally,
}

impl AggregationTally {
    pub fn rows_skipped(&self) -> u64 {
        self.reimbursements.rows_skipped + self.returns_to_fba.rows_skipped + self.date_range.rows_skipped
    }
}

/// Scan all three sheets once each and accumulate into `ledger`.
pub fn aggregate(ledger: &mut Ledger, sources: &mut DebugSources) -> ReconResult<AggregationTally> {
    let reimbursements = scan_quantity_sheet(
        ledger,
        &mut sources.reimbursements,
        REIMBURSEMENT_COLUMNS,
        EmptyQuantity::Zero,
        QtyField::Reimbursed,
    )?;
    let returns_to_fba = scan_quantity_sheet(
        ledger,
        &mut sources.returns_to_fba,
        RETURNS_COLUMNS,
        EmptyQuantity::Rejected,
        QtyField::Returned,
    )?;
    let date_range = scan_date_range(ledger, &mut sources.date_range)?;

    let tally = AggregationTally {
        reimbursements,
        returns_to_fba,
        date_range,
    };
    log::debug!("aggregator: {tally:?}");
    Ok(tally)
}

/// A sheet whose every row feeds the same accumulator.
fn scan_quantity_sheet(
    ledger: &mut Ledger,
    source: &mut TabularSource,
    columns: SheetColumns,
    empty: EmptyQuantity,
    field: QtyField,
) -> ReconResult<SheetTally> {
    let mut matched = 0u64;
    let stats = source.scan(columns.width(), |row| {
        let qty = row.quantity(columns.quantity, empty)?;
        if let Some(entry) = ledger.get_mut(&columns.identity(&row)?) {
            entry.record(field, qty)?;
            matched += 1;
        }
        Ok(())
    })?;
    Ok(SheetTally::new(stats, matched))
}

fn scan_date_range(ledger: &mut Ledger, source: &mut TabularSource) -> ReconResult<SheetTally> {
    let columns = DATE_RANGE_COLUMNS;
    let width = columns.width().max(DATE_RANGE_CONDITION_COLUMN + 1);
    let mut matched = 0u64;

    let stats = source.scan(width, |row| {
        let qty = row.quantity(columns.quantity, EmptyQuantity::Zero)?;
        let Some(entry) = ledger.get_mut(&columns.identity(&row)?) else {
            return Ok(());
        };
        match row.field(DATE_RANGE_CONDITION_COLUMN)? {
            "Order" => entry.record(QtyField::Order, qty)?,
            "Refund" => entry.record(QtyField::Refund, qty)?,
            _ => entry.mark_in_debug(),
        }
        matched += 1;
        Ok(())
    })?;
    Ok(SheetTally::new(stats, matched))
}
