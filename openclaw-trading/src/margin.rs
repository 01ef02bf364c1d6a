//! Pure isolated-margin arithmetic for the perpetual futures engine.
//!
//! All functions are total over their documented domains and never suspend.

use crate::asset::Side;

/// Inclusive leverage bounds accepted by the futures engine.
pub const LEVERAGE_MIN: u32 = 1;
pub const LEVERAGE_MAX: u32 = 150;

/// Leverage applied when neither the caller nor a per-ticker setting
/// provides one.
pub const DEFAULT_LEVERAGE: u32 = 20;

/// Margin posted to open a position: `quantity * entry_price / leverage`.
pub fn initial_margin(quantity: f64, entry_price: f64, leverage: u32) -> f64 {
    quantity * entry_price / leverage as f64
}

/// Tiered maintenance margin rate for a position's current notional.
pub fn maintenance_margin_rate(notional: f64) -> f64 {
    if notional < 50_000.0 {
        0.004
    } else if notional < 250_000.0 {
        0.005
    } else if notional < 1_000_000.0 {
        0.01
    } else {
        0.025
    }
}

/// Maintenance margin at the given mark: `quantity * mark_price * mm_rate`.
pub fn maintenance_margin(quantity: f64, mark_price: f64, mm_rate: f64) -> f64 {
    quantity * mark_price * mm_rate
}

/// Mark price at which an isolated position is force-closed.
pub fn liquidation_price(side: Side, entry_price: f64, leverage: u32, mm_rate: f64) -> f64 {
    let leverage = leverage as f64;
    match side {
        Side::Long => entry_price * (1.0 - 1.0 / leverage + mm_rate),
        Side::Short => entry_price * (1.0 + 1.0 / leverage - mm_rate),
    }
}

/// Signed unrealized profit for `quantity` units between entry and mark.
pub fn unrealized_pnl(side: Side, quantity: f64, entry_price: f64, mark_price: f64) -> f64 {
    match side {
        Side::Long => (mark_price - entry_price) * quantity,
        Side::Short => (entry_price - mark_price) * quantity,
    }
}

/// Return on equity as a percentage of the posted initial margin.
pub fn roe(pnl: f64, initial_margin: f64) -> f64 {
    if initial_margin > 0.0 {
        pnl / initial_margin * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{f64_is_eq, EPSILON};

    #[test]
    fn test_initial_margin() {
        struct TestCase {
            quantity: f64,
            entry_price: f64,
            leverage: u32,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: 1 BTC at 60k with 10x
                quantity: 1.0,
                entry_price: 60_000.0,
                leverage: 10,
                expected: 6_000.0,
            },
            TestCase {
                // TC1: fractional quantity at 1x posts full notional
                quantity: 0.5,
                entry_price: 40_000.0,
                leverage: 1,
                expected: 20_000.0,
            },
            TestCase {
                // TC2: max leverage
                quantity: 2.0,
                entry_price: 75_000.0,
                leverage: 150,
                expected: 1_000.0,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = initial_margin(test.quantity, test.entry_price, test.leverage);
            assert!(
                f64_is_eq(actual, test.expected, EPSILON),
                "TC{} failed: actual={}, expected={}",
                index,
                actual,
                test.expected
            );
        }
    }

    #[test]
    fn test_maintenance_margin_rate_tiers() {
        struct TestCase {
            notional: f64,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: bottom tier
                notional: 0.0,
                expected: 0.004,
            },
            TestCase {
                // TC1: just below first break
                notional: 49_999.99,
                expected: 0.004,
            },
            TestCase {
                // TC2: first break is inclusive of the next tier
                notional: 50_000.0,
                expected: 0.005,
            },
            TestCase {
                // TC3: mid tier
                notional: 249_999.0,
                expected: 0.005,
            },
            TestCase {
                // TC4: third tier
                notional: 250_000.0,
                expected: 0.01,
            },
            TestCase {
                // TC5: top tier
                notional: 1_000_000.0,
                expected: 0.025,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = maintenance_margin_rate(test.notional);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_liquidation_price_closed_forms() {
        // 1 BTC long at 60k, 10x: notional 60k -> mmRate 0.005
        let long = liquidation_price(Side::Long, 60_000.0, 10, 0.005);
        assert!(f64_is_eq(long, 60_000.0 * (1.0 - 0.1 + 0.005), EPSILON));
        assert!(f64_is_eq(long, 54_300.0, EPSILON));

        let short = liquidation_price(Side::Short, 60_000.0, 10, 0.005);
        assert!(f64_is_eq(short, 60_000.0 * (1.0 + 0.1 - 0.005), EPSILON));
        assert!(short > 60_000.0);
    }

    #[test]
    fn test_unrealized_pnl_per_side() {
        assert_eq!(unrealized_pnl(Side::Long, 1.0, 60_000.0, 65_000.0), 5_000.0);
        assert_eq!(
            unrealized_pnl(Side::Long, 1.0, 60_000.0, 55_000.0),
            -5_000.0
        );
        assert_eq!(
            unrealized_pnl(Side::Short, 2.0, 60_000.0, 55_000.0),
            10_000.0
        );
        assert_eq!(
            unrealized_pnl(Side::Short, 2.0, 60_000.0, 65_000.0),
            -10_000.0
        );
    }

    #[test]
    fn test_roe_guards_zero_margin() {
        assert!(f64_is_eq(roe(500.0, 6_000.0), 8.333333333333332, EPSILON));
        assert_eq!(roe(500.0, 0.0), 0.0);
    }

    #[test]
    fn open_then_close_at_entry_price_is_flat() {
        let quantity = 1.0;
        let entry = 60_000.0;
        let margin = initial_margin(quantity, entry, 10);

        let pnl = unrealized_pnl(Side::Long, quantity, entry, entry);
        let released = margin + pnl;

        assert_eq!(pnl, 0.0);
        assert!(f64_is_eq(released, margin, EPSILON));
    }
}
