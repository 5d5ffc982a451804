//! The ledger: one entry per identity seen in either report version.
//!
//! RULE: only the engine owns a Ledger. Phases receive it by reference,
//! in order: detector (creates), aggregator (enriches), classifier
//! (finalizes), report (reads). Nothing mutates it after classification.
//!
//! Entries keep first-insertion order. The report's stable sort relies on it.

use crate::{
    classifier::Reason,
    source::RowDefect,
    types::{Identity, VersionLabels, VersionSide},
};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Fine,
    Missing,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Fine    => "FINE",
            EntryStatus::Missing => "MISSING",
        }
    }
}

/// An accumulated quantity that remembers whether any row contributed to it.
/// Reads as 0 when untouched; the report renders untouched as blank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Quantity(Option<u64>);

impl Quantity {
    /// Accumulate `qty`. On overflow the quantity is left unchanged.
    pub fn add(&mut self, qty: u64) -> Result<(), QuantityOverflow> {
        let current = self.value();
        let total = current
            .checked_add(qty)
            .ok_or(QuantityOverflow { current, added: qty })?;
        self.0 = Some(total);
        Ok(())
    }

    pub fn value(self) -> u64 {
        self.0.unwrap_or(0)
    }

    /// `None` if no source row ever touched this quantity.
    pub fn recorded(self) -> Option<u64> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("quantity overflow: {current} + {added} does not fit in 64 bits")]
pub struct QuantityOverflow {
    pub current: u64,
    pub added:   u64,
}

impl From<QuantityOverflow> for RowDefect {
    fn from(overflow: QuantityOverflow) -> Self {
        RowDefect(overflow.to_string())
    }
}

/// Which accumulator a debug row feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QtyField {
    Order,
    Refund,
    Reimbursed,
    Returned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub status:         EntryStatus,
    /// The version this identity is absent from. `None` for FINE entries.
    pub missing_in:     Option<VersionSide>,
    pub reason:         Option<Reason>,
    pub order_qty:      Quantity,
    pub refund_qty:     Quantity,
    pub reimbursed_qty: Quantity,
    pub returned_qty:   Quantity,
    pub in_debug:       bool,
}

impl LedgerEntry {
    pub fn fine() -> Self {
        Self::with_status(EntryStatus::Fine, None)
    }

    pub fn missing_in(side: VersionSide) -> Self {
        Self::with_status(EntryStatus::Missing, Some(side))
    }

    fn with_status(status: EntryStatus, missing_in: Option<VersionSide>) -> Self {
        Self {
            status,
            missing_in,
            reason: None,
            order_qty: Quantity::default(),
            refund_qty: Quantity::default(),
            reimbursed_qty: Quantity::default(),
            returned_qty: Quantity::default(),
            in_debug: false,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.status == EntryStatus::Missing
    }

    /// Record a debug-source row for this identity. A row that would
    /// overflow its accumulator leaves the entry untouched.
    pub fn record(&mut self, field: QtyField, qty: u64) -> Result<(), QuantityOverflow> {
        self.quantity_mut(field).add(qty)?;
        self.in_debug = true;
        Ok(())
    }

    /// Record presence in a debug source without touching any quantity.
    pub fn mark_in_debug(&mut self) {
        self.in_debug = true;
    }

    fn quantity_mut(&mut self, field: QtyField) -> &mut Quantity {
        match field {
            QtyField::Order      => &mut self.order_qty,
            QtyField::Refund     => &mut self.refund_qty,
            QtyField::Reimbursed => &mut self.reimbursed_qty,
            QtyField::Returned   => &mut self.returned_qty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    labels:  VersionLabels,
    index:   HashMap<Identity, usize>,
    entries: Vec<(Identity, LedgerEntry)>,
}

impl Ledger {
    pub fn new(labels: VersionLabels) -> Self {
        Self {
            labels,
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn labels(&self) -> &VersionLabels {
        &self.labels
    }

    /// Set the entry for `identity`. A new identity is appended; an existing
    /// one is replaced in place and keeps its first position.
    pub fn upsert(&mut self, identity: Identity, entry: LedgerEntry) {
        match self.index.get(&identity) {
            Some(&pos) => self.entries[pos].1 = entry,
            None => {
                self.index.insert(identity.clone(), self.entries.len());
                self.entries.push((identity, entry));
            }
        }
    }

    pub fn get(&self, identity: &Identity) -> Option<&LedgerEntry> {
        self.index.get(identity).map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, identity: &Identity) -> Option<&mut LedgerEntry> {
        match self.index.get(identity) {
            Some(&pos) => Some(&mut self.entries[pos].1),
            None => None,
        }
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.index.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Identity, &LedgerEntry)> {
        self.entries.iter().map(|(id, entry)| (id, entry))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Identity, &mut LedgerEntry)> {
        self.entries.iter_mut().map(|(id, entry)| (&*id, entry))
    }

    /// Identities present in both versions, in insertion order.
    pub fn both_present(&self) -> impl Iterator<Item = &Identity> {
        self.iter()
            .filter(|(_, entry)| entry.status == EntryStatus::Fine)
            .map(|(id, _)| id)
    }

    /// Discrepant identities, in insertion order.
    pub fn discrepancies(&self) -> impl Iterator<Item = (&Identity, &LedgerEntry)> {
        self.iter().filter(|(_, entry)| entry.is_missing())
    }

    pub fn missing_count(&self, side: VersionSide) -> usize {
        self.discrepancies()
            .filter(|(_, entry)| entry.missing_in == Some(side))
            .count()
    }

    pub fn fine_count(&self) -> usize {
        self.both_present().count()
    }

    /// The display label of the version an entry is missing from.
    pub fn missing_in_label(&self, entry: &LedgerEntry) -> Option<&str> {
        entry.missing_in.map(|side| self.labels.for_side(side))
    }
}
