//! Discrepancy detector: symmetric difference of the two report versions.
//!
//! Membership decides, count does not: an identity listed three times in the
//! old version and once in the new one is FINE.

use crate::{
    ledger::{Ledger, LedgerEntry},
    types::{Identity, VersionLabels, VersionSide},
};
use std::collections::HashSet;

/// Build the ledger from both versions' identities.
///
/// Old-version identities are inserted first, in file order, followed by
/// identities that only the new version has.
pub fn detect(old: &[Identity], new: &[Identity], labels: VersionLabels) -> Ledger {
    let old_set: HashSet<&Identity> = old.iter().collect();
    let new_set: HashSet<&Identity> = new.iter().collect();
    let mut ledger = Ledger::new(labels);

    mark_side(&mut ledger, old, &new_set, VersionSide::Old);
    mark_side(&mut ledger, new, &old_set, VersionSide::New);

    log::debug!(
        "detector: {} identities, {} missing in new, {} missing in old, {} in both",
        ledger.len(),
        ledger.missing_count(VersionSide::New),
        ledger.missing_count(VersionSide::Old),
        ledger.fine_count()
    );

    ledger
}

fn mark_side(
    ledger: &mut Ledger,
    identities: &[Identity],
    other: &HashSet<&Identity>,
    side: VersionSide,
) {
    for identity in identities {
        if ledger.contains(identity) {
            // Decided by an earlier duplicate or by the other side.
            continue;
        }
        let entry = if other.contains(identity) {
            LedgerEntry::fine()
        } else {
            LedgerEntry::missing_in(side.other())
        };
        ledger.upsert(identity.clone(), entry);
    }
}
