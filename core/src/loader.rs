//! Record loader: reads the (order_id, sku) identities of one report version.

use crate::{
    error::ReconResult,
    source::{ScanStats, TabularSource},
    types::Identity,
};

/// Column of the order id in a report version.
pub const ORDER_ID_COLUMN: usize = 1;
/// Column of the SKU in a report version.
pub const SKU_COLUMN: usize = 2;

/// Identities of one report version, in file order, duplicates kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedVersion {
    pub identities: Vec<Identity>,
    /// Rows dropped because the order id or SKU cell was empty.
    pub blank_rows: u64,
    pub stats:      ScanStats,
}

/// Read every identity from `source`. Rows with an empty order id or SKU are
/// not identities and are dropped without being treated as malformed.
pub fn load_identities(source: &mut TabularSource) -> ReconResult<LoadedVersion> {
    let mut identities = Vec::new();
    let mut blank_rows = 0u64;

    let stats = source.scan(SKU_COLUMN + 1, |row| {
        let order_id = row.field(ORDER_ID_COLUMN)?;
        let sku = row.field(SKU_COLUMN)?;
        if order_id.is_empty() || sku.is_empty() {
            blank_rows += 1;
        } else {
            identities.push(Identity::new(order_id, sku));
        }
        Ok(())
    })?;

    log::debug!(
        "{}: loaded {} identities ({} rows without identity)",
        source.name(),
        identities.len(),
        blank_rows
    );

    Ok(LoadedVersion {
        identities,
        blank_rows,
        stats,
    })
}
