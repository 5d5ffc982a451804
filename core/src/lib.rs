//! Order discrepancy reconciliation.
//!
//! Compares two versions of an order discrepancy report, finds the
//! (order_id, sku) pairs only one of them contains, and explains each one
//! from the debug report's reimbursement, returns and date-range sheets.

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod loader;
pub mod report;
pub mod source;
pub mod types;
