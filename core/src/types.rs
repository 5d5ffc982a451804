//! Shared primitive types used across every reconciliation phase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An order identifier as it appears in the source files.
pub type OrderId = String;

/// A seller SKU as it appears in the source files.
pub type Sku = String;

/// The (order_id, sku) pair that keys a line item across all sources.
///
/// Equality is exact: no trimming, no case folding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub order_id: OrderId,
    pub sku:      Sku,
}

impl Identity {
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>) -> Self {
        Self {
            order_id: order_id.into(),
            sku:      sku.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.order_id, self.sku)
    }
}

/// Which of the two report versions an identity was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSide {
    Old,
    New,
}

impl VersionSide {
    pub fn other(self) -> Self {
        match self {
            VersionSide::Old => VersionSide::New,
            VersionSide::New => VersionSide::Old,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VersionSide::Old => "old",
            VersionSide::New => "new",
        }
    }
}

/// Display labels for both report versions, used for `missing_in`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionLabels {
    pub old: String,
    pub new: String,
}

impl VersionLabels {
    /// Labels in the `"<side> version (path: <path>)"` form.
    pub fn from_paths(old_path: &str, new_path: &str) -> Self {
        Self {
            old: format!("old version (path: {old_path})"),
            new: format!("new version (path: {new_path})"),
        }
    }

    pub fn for_side(&self, side: VersionSide) -> &str {
        match side {
            VersionSide::Old => &self.old,
            VersionSide::New => &self.new,
        }
    }
}
