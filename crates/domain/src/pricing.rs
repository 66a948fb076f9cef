//! Pure order pricing.
//!
//! No side effects, no I/O. All arithmetic is in integer minor units, so
//! nothing accumulates rounding error across line items; two-decimal
//! rendering happens only when an amount is displayed.

use common::Money;

/// One priced line of a proposed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLine {
    pub unit_price: Money,
    pub quantity: u32,
}

/// The authoritative totals of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub total: Money,
}

/// Computes subtotal and grand total for a set of lines.
///
/// `total = subtotal + delivery_fee - discount`, always.
pub fn price_order(lines: &[PriceLine], delivery_fee: Money, discount: Money) -> OrderTotals {
    let subtotal: Money = lines
        .iter()
        .map(|line| line.unit_price.multiply(line.quantity))
        .sum();

    OrderTotals {
        subtotal,
        total: subtotal + delivery_fee - discount,
    }
}
