//! Simplified Black-Scholes surrogate used to mark option premiums.
//!
//! `premium = intrinsic + S * iv * sqrt(dte / 365)`, with implied volatility
//! taken from a closed per-ticker table.

use super::OptionType;
use crate::error::TradingError;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

/// Implied volatility applied to tickers absent from the table.
pub const DEFAULT_IMPLIED_VOL: f64 = 0.35;

/// Closed implied-volatility table, keyed by upper-case ticker.
///
/// Rough tiers: blue chips 0.20-0.30, high-vol tech 0.45-0.60, meme names
/// 0.70-0.80.
const IMPLIED_VOL_TABLE: &[(&str, f64)] = &[
    // Blue chips
    ("AAPL", 0.25),
    ("MSFT", 0.22),
    ("GOOGL", 0.28),
    ("AMZN", 0.30),
    ("META", 0.30),
    ("JPM", 0.24),
    ("V", 0.22),
    ("JNJ", 0.20),
    ("WMT", 0.21),
    ("KO", 0.20),
    // High-vol tech
    ("NVDA", 0.45),
    ("TSLA", 0.60),
    ("AMD", 0.50),
    ("COIN", 0.60),
    ("PLTR", 0.55),
    ("MSTR", 0.60),
    ("SMCI", 0.55),
    // Meme
    ("GME", 0.80),
    ("AMC", 0.75),
    ("BBAI", 0.70),
    ("DJT", 0.75),
];

/// Options expire at 16:00 US eastern, encoded as a fixed `-05:00` offset.
const EXPIRY_OFFSET_SECS: i32 = -5 * 3600;
const EXPIRY_HOUR: u32 = 16;

/// Look up the implied volatility for a ticker (case-insensitive).
pub fn implied_vol(ticker: &str) -> f64 {
    let ticker = ticker.trim().to_uppercase();
    IMPLIED_VOL_TABLE
        .iter()
        .find(|(symbol, _)| *symbol == ticker)
        .map(|(_, vol)| *vol)
        .unwrap_or(DEFAULT_IMPLIED_VOL)
}

/// `call: max(S-K, 0); put: max(K-S, 0)`.
pub fn intrinsic_value(spot: f64, strike: f64, option_type: OptionType) -> f64 {
    match option_type {
        OptionType::Call => (spot - strike).max(0.0),
        OptionType::Put => (strike - spot).max(0.0),
    }
}

/// Extrinsic component; zero at or after expiry.
pub fn time_value(spot: f64, implied_vol: f64, days_to_expiry: f64) -> f64 {
    if days_to_expiry <= 0.0 {
        return 0.0;
    }
    spot * implied_vol * (days_to_expiry / 365.0).sqrt()
}

/// Per-share premium: intrinsic plus time value.
pub fn premium(
    spot: f64,
    strike: f64,
    days_to_expiry: f64,
    implied_vol: f64,
    option_type: OptionType,
) -> f64 {
    intrinsic_value(spot, strike, option_type) + time_value(spot, implied_vol, days_to_expiry)
}

/// The instant a `YYYY-MM-DD` expiry settles: 16:00 at `-05:00`.
pub fn expiry_instant(expiry_date: &str) -> Result<DateTime<Utc>, TradingError> {
    let date = NaiveDate::parse_from_str(expiry_date, "%Y-%m-%d").map_err(|error| {
        TradingError::invalid_param(format!("invalid expiry date {expiry_date:?}: {error}"))
    })?;

    let close = date
        .and_hms_opt(EXPIRY_HOUR, 0, 0)
        .expect("16:00:00 is a valid time of day");

    // Shifting the wall-clock time by the fixed offset yields the UTC instant.
    Ok(Utc.from_utc_datetime(&(close - Duration::seconds(EXPIRY_OFFSET_SECS as i64))))
}

/// Signed days until expiry; negative once the expiry instant has passed.
/// Used for the settlement trigger.
pub fn days_to_expiry(expiry_date: &str, now: DateTime<Utc>) -> Result<f64, TradingError> {
    let expiry = expiry_instant(expiry_date)?;
    Ok((expiry - now).num_seconds() as f64 / 86_400.0)
}

/// Days until expiry clamped at zero. Used for pricing.
pub fn days_to_expiry_clamped(
    expiry_date: &str,
    now: DateTime<Utc>,
) -> Result<f64, TradingError> {
    days_to_expiry(expiry_date, now).map(|days| days.max(0.0))
}

/// Round to 2 decimal places, the precision quoted premiums carry.
pub fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to 1 decimal place, used for quoted days-to-expiry.
pub fn round_1dp(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{f64_is_eq, EPSILON};
    use chrono::TimeZone;

    #[test]
    fn test_implied_vol_table() {
        struct TestCase {
            ticker: &'static str,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: blue chip
                ticker: "AAPL",
                expected: 0.25,
            },
            TestCase {
                // TC1: high-vol tech
                ticker: "NVDA",
                expected: 0.45,
            },
            TestCase {
                // TC2: meme tier
                ticker: "GME",
                expected: 0.80,
            },
            TestCase {
                // TC3: case-insensitive lookup
                ticker: "nvda",
                expected: 0.45,
            },
            TestCase {
                // TC4: unknown ticker falls back to the default
                ticker: "ZZZZ",
                expected: DEFAULT_IMPLIED_VOL,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = implied_vol(test.ticker);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn premium_at_expiry_equals_intrinsic() {
        // OTM call at expiry is worthless.
        assert_eq!(premium(100.0, 110.0, 0.0, 0.35, OptionType::Call), 0.0);
        // ITM call at expiry is pure intrinsic.
        assert_eq!(premium(100.0, 90.0, 0.0, 0.35, OptionType::Call), 10.0);
        // Same for puts.
        assert_eq!(premium(100.0, 110.0, 0.0, 0.35, OptionType::Put), 10.0);
    }

    #[test]
    fn time_value_scales_with_sqrt_of_time() {
        let one_year = time_value(100.0, 0.35, 365.0);
        assert!(f64_is_eq(one_year, 35.0, EPSILON));

        let quarter = time_value(100.0, 0.35, 365.0 / 4.0);
        assert!(f64_is_eq(quarter, 17.5, EPSILON));

        assert_eq!(time_value(100.0, 0.35, -3.0), 0.0);
    }

    #[test]
    fn expiry_instant_is_four_pm_eastern_offset() {
        let instant = expiry_instant("2026-06-19").unwrap();

        // 16:00 at -05:00 is 21:00 UTC.
        let expected = Utc.with_ymd_and_hms(2026, 6, 19, 21, 0, 0).unwrap();
        assert_eq!(instant, expected);
    }

    #[test]
    fn days_to_expiry_is_signed_and_clamped_variant_is_not() {
        let now = Utc.with_ymd_and_hms(2026, 6, 20, 21, 0, 0).unwrap();

        let signed = days_to_expiry("2026-06-19", now).unwrap();
        assert!(f64_is_eq(signed, -1.0, EPSILON));

        let clamped = days_to_expiry_clamped("2026-06-19", now).unwrap();
        assert_eq!(clamped, 0.0);

        let ahead = days_to_expiry("2026-06-26", now).unwrap();
        assert!(f64_is_eq(ahead, 6.0, EPSILON));
    }

    #[test]
    fn malformed_expiry_date_is_rejected() {
        assert!(matches!(
            days_to_expiry("06/19/2026", Utc::now()),
            Err(TradingError::InvalidParam(_))
        ));
    }
}
