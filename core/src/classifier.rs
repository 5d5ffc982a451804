//! Reason classifier: explains why a discrepant identity is missing.
//!
//! RULE ORDER (fixed, documented, never reordered):
//!   1. NotInDebug
//!   2. RefundWithoutOrder
//!   3. RefundsExceedOrders
//!   4. ShouldAppear
//!
//! RULES:
//!   - Only MISSING entries are classified. FINE entries never get a reason.
//!   - Every rule is evaluated for every entry; there is no short-circuit.
//!   - The last rule that matches decides the reason.
//!   - An entry no rule matches keeps no reason.

use crate::ledger::{Ledger, LedgerEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    NotInDebug,
    RefundWithoutOrder,
    RefundsExceedOrders,
    ShouldAppear,
}

impl Reason {
    pub fn code(self) -> &'static str {
        match self {
            Reason::NotInDebug          => "NOT_IN_DEBUG",
            Reason::RefundWithoutOrder  => "REFUND_WITHOUT_ORDER",
            Reason::RefundsExceedOrders => "REFUNDS_EXCEED_ORDERS",
            Reason::ShouldAppear        => "SHOULD_APPEAR",
        }
    }

    /// The text written to the report's Reason column.
    pub fn description(self) -> &'static str {
        match self {
            Reason::NotInDebug => "not in debug report",
            Reason::RefundWithoutOrder => {
                "In Date Range this order has only a refund record without an order one"
            }
            Reason::RefundsExceedOrders => {
                "Refunds quantity cannot be greater than orders so variance <= 0 here"
            }
            Reason::ShouldAppear => "Should be in report because variance > 0 here",
        }
    }
}

/// One step of the classification chain.
pub trait ReasonRule {
    /// The reason this rule assigns when it matches.
    fn reason(&self) -> Reason;

    /// Whether the rule matches a MISSING entry.
    fn applies(&self, entry: &LedgerEntry) -> bool;
}

/// Refund minus everything that compensated it. Signed, and wide enough
/// for any pair of `u64` quantities.
fn variance(refund_qty: u64, entry: &LedgerEntry) -> i128 {
    i128::from(refund_qty)
        - i128::from(entry.reimbursed_qty.value())
        - i128::from(entry.returned_qty.value())
}

pub struct NotInDebug;

impl ReasonRule for NotInDebug {
    fn reason(&self) -> Reason {
        Reason::NotInDebug
    }

    fn applies(&self, entry: &LedgerEntry) -> bool {
        !entry.in_debug
    }
}

/// Date range shows refunds for this identity but no order.
pub struct RefundWithoutOrder;

impl ReasonRule for RefundWithoutOrder {
    fn reason(&self) -> Reason {
        Reason::RefundWithoutOrder
    }

    fn applies(&self, entry: &LedgerEntry) -> bool {
        entry.in_debug && entry.order_qty.value() == 0 && entry.refund_qty.value() > 0
    }
}

/// More refunds than orders. Refunds are clamped to the order quantity
/// before the variance is taken; a non-positive variance matches.
pub struct RefundsExceedOrders;

impl ReasonRule for RefundsExceedOrders {
    fn reason(&self) -> Reason {
        Reason::RefundsExceedOrders
    }

    fn applies(&self, entry: &LedgerEntry) -> bool {
        let order_qty = entry.order_qty.value();
        let refund_qty = entry.refund_qty.value();
        if !entry.in_debug || order_qty == 0 || order_qty >= refund_qty {
            return false;
        }
        let clamped = refund_qty.min(order_qty);
        variance(clamped, entry) <= 0
    }
}

/// Ordered, with refunds not covered by reimbursements or returns.
pub struct ShouldAppear;

impl ReasonRule for ShouldAppear {
    fn reason(&self) -> Reason {
        Reason::ShouldAppear
    }

    fn applies(&self, entry: &LedgerEntry) -> bool {
        entry.in_debug
            && entry.order_qty.value() > 0
            && variance(entry.refund_qty.value(), entry) > 0
    }
}

/// How many MISSING entries ended with each reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReasonTally {
    pub not_in_debug:          usize,
    pub refund_without_order:  usize,
    pub refunds_exceed_orders: usize,
    pub should_appear:         usize,
    /// MISSING entries no rule matched.
    pub unexplained:           usize,
}

impl ReasonTally {
    pub fn count(&mut self, reason: Option<Reason>) {
        match reason {
            Some(Reason::NotInDebug)          => self.not_in_debug += 1,
            Some(Reason::RefundWithoutOrder)  => self.refund_without_order += 1,
            Some(Reason::RefundsExceedOrders) => self.refunds_exceed_orders += 1,
            Some(Reason::ShouldAppear)        => self.should_appear += 1,
            None                              => self.unexplained += 1,
        }
    }

    /// Tally the reasons already present on a ledger's MISSING entries.
    pub fn of(ledger: &Ledger) -> Self {
        let mut tally = Self::default();
        for (_, entry) in ledger.discrepancies() {
            tally.count(entry.reason);
        }
        tally
    }
}

pub struct ReasonClassifier {
    rules: Vec<Box<dyn ReasonRule>>,
}

impl ReasonClassifier {
    /// An empty chain. Use `build()` for the standard one.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The standard chain, registered in the documented order.
    pub fn build() -> Self {
        let mut classifier = Self::new();
        classifier.register(Box::new(NotInDebug));
        classifier.register(Box::new(RefundWithoutOrder));
        classifier.register(Box::new(RefundsExceedOrders));
        classifier.register(Box::new(ShouldAppear));
        classifier
    }

    /// Append a rule. Later rules override earlier ones.
    pub fn register(&mut self, rule: Box<dyn ReasonRule>) {
        self.rules.push(rule);
    }

    /// The reason of the last matching rule, if any.
    pub fn classify_entry(&self, entry: &LedgerEntry) -> Option<Reason> {
        let mut reason = None;
        for rule in &self.rules {
            if rule.applies(entry) {
                reason = Some(rule.reason());
            }
        }
        reason
    }

    /// Assign a reason to every MISSING entry of `ledger`.
    pub fn classify(&self, ledger: &mut Ledger) -> ReasonTally {
        let mut tally = ReasonTally::default();
        for (identity, entry) in ledger.iter_mut() {
            if !entry.is_missing() {
                continue;
            }
            entry.reason = self.classify_entry(entry);
            tally.count(entry.reason);
            log::trace!(
                "{identity}: reason={}",
                entry.reason.map_or("none", Reason::code)
            );
        }
        log::debug!("classifier: {tally:?}");
        tally
    }
}

impl Default for ReasonClassifier {
    fn default() -> Self {
        Self::build()
    }
}
