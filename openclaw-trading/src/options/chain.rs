//! Expiry-date and strike-grid generation for quoted option chains.

use super::{
    pricing::{self, round_2dp},
    OptionType, CONTRACT_MULTIPLIER,
};
use crate::asset::Ticker;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::Serialize;

/// Number of strikes quoted either side of the centred strike.
const STRIKE_SPAN: i64 = 10;

/// A generated chain for one underlying at one spot price.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionChain {
    pub underlying: Ticker,
    pub spot_price: f64,
    pub implied_vol: f64,
    pub expiries: Vec<ChainExpiry>,
}

/// All quoted strikes for one expiry date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainExpiry {
    pub expiry_date: String,
    pub days_to_expiry: f64,
    pub strikes: Vec<ChainStrike>,
}

/// Quoted call/put premiums at one strike.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStrike {
    pub strike: f64,
    pub call_premium: f64,
    pub put_premium: f64,
    pub call_premium_per_contract: f64,
    pub put_premium_per_contract: f64,
}

/// The Friday of the ISO week containing `date`. May lie in the past for
/// weekend dates; callers filter by time-to-expiry.
fn friday_of_week(date: NaiveDate) -> NaiveDate {
    let from_monday = date.weekday().num_days_from_monday() as i64;
    date + Duration::days(4 - from_monday)
}

/// The third Friday of the given month.
fn third_friday(year: i32, month: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .expect("the first of a valid month always exists");
    let days_to_friday =
        (Weekday::Fri.num_days_from_monday() + 7 - first.weekday().num_days_from_monday()) % 7;
    first + Duration::days(days_to_friday as i64 + 14)
}

/// Candidate expiry dates: this week's Friday (unless under a day away), next
/// Friday, this month's third Friday (if still in the future) and next
/// month's third Friday. Deduplicated, ascending.
pub fn expiry_dates(now: DateTime<Utc>) -> Vec<String> {
    let today = now.date_naive();

    let this_friday = friday_of_week(today);
    let next_friday = this_friday + Duration::days(7);

    let monthly = third_friday(today.year(), today.month());
    let (next_year, next_month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    let next_monthly = third_friday(next_year, next_month);

    let mut candidates: Vec<String> = Vec::with_capacity(4);
    let push_if = |candidates: &mut Vec<String>, date: NaiveDate, include: fn(f64) -> bool| {
        let formatted = date.format("%Y-%m-%d").to_string();
        let days = pricing::days_to_expiry(&formatted, now)
            .expect("formatted expiry date always parses");
        if include(days) && !candidates.contains(&formatted) {
            candidates.push(formatted);
        }
    };

    push_if(&mut candidates, this_friday, |days| days >= 1.0);
    push_if(&mut candidates, next_friday, |days| days > 0.0);
    push_if(&mut candidates, monthly, |days| days > 0.0);
    push_if(&mut candidates, next_monthly, |days| days > 0.0);

    candidates.sort();
    candidates
}

/// Strike step for a spot price band.
pub fn strike_step(price: f64) -> f64 {
    if price < 50.0 {
        1.0
    } else if price < 200.0 {
        5.0
    } else if price < 500.0 {
        10.0
    } else {
        25.0
    }
}

/// 21 strikes centred on the rounded spot, non-positive strikes dropped.
pub fn strike_grid(price: f64) -> Vec<f64> {
    let step = strike_step(price);
    let centre = (price / step).round() * step;

    (-STRIKE_SPAN..=STRIKE_SPAN)
        .map(|offset| centre + offset as f64 * step)
        .filter(|strike| *strike > 0.0)
        .collect()
}

/// Build the full quoted chain for an underlying at the given spot price.
pub fn build_chain(underlying: Ticker, spot_price: f64, now: DateTime<Utc>) -> OptionChain {
    let implied_vol = pricing::implied_vol(underlying.as_str());

    let expiries = expiry_dates(now)
        .into_iter()
        .map(|expiry_date| {
            let days = pricing::days_to_expiry_clamped(&expiry_date, now)
                .expect("generated expiry date always parses");

            let strikes = strike_grid(spot_price)
                .into_iter()
                .map(|strike| {
                    let call = round_2dp(pricing::premium(
                        spot_price,
                        strike,
                        days,
                        implied_vol,
                        OptionType::Call,
                    ));
                    let put = round_2dp(pricing::premium(
                        spot_price,
                        strike,
                        days,
                        implied_vol,
                        OptionType::Put,
                    ));

                    ChainStrike {
                        strike,
                        call_premium: call,
                        put_premium: put,
                        call_premium_per_contract: round_2dp(call * CONTRACT_MULTIPLIER as f64),
                        put_premium_per_contract: round_2dp(put * CONTRACT_MULTIPLIER as f64),
                    }
                })
                .collect();

            ChainExpiry {
                expiry_date,
                days_to_expiry: pricing::round_1dp(days),
                strikes,
            }
        })
        .collect();

    OptionChain {
        underlying,
        spot_price,
        implied_vol,
        expiries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_third_friday() {
        struct TestCase {
            year: i32,
            month: u32,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: month starting on a Monday
                year: 2026,
                month: 6,
                expected: "2026-06-19",
            },
            TestCase {
                // TC1: month starting on a Friday
                year: 2026,
                month: 5,
                expected: "2026-05-15",
            },
            TestCase {
                // TC2: January after a year roll
                year: 2027,
                month: 1,
                expected: "2027-01-15",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = third_friday(test.year, test.month).format("%Y-%m-%d").to_string();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn expiries_dedup_and_sort_ascending() {
        // Wednesday 2026-06-10: this Friday (12th), next Friday (19th) which
        // coincides with June's third Friday, and July's third Friday.
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap();

        let expiries = expiry_dates(now);

        assert_eq!(expiries, vec!["2026-06-12", "2026-06-19", "2026-07-17"]);
    }

    #[test]
    fn same_week_friday_is_skipped_when_under_a_day_away() {
        // Friday 2026-06-12 at 10:00 eastern-ish: expiry is hours away.
        let now = Utc.with_ymd_and_hms(2026, 6, 12, 15, 0, 0).unwrap();

        let expiries = expiry_dates(now);

        assert!(!expiries.contains(&"2026-06-12".to_string()));
        assert!(expiries.contains(&"2026-06-19".to_string()));
    }

    #[test]
    fn weekend_now_rolls_to_next_friday() {
        // Saturday: the week's Friday is already in the past.
        let now = Utc.with_ymd_and_hms(2026, 6, 13, 12, 0, 0).unwrap();

        let expiries = expiry_dates(now);

        assert_eq!(expiries.first().unwrap(), "2026-06-19");
    }

    #[test]
    fn test_strike_step_bands() {
        struct TestCase {
            price: f64,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: penny-stock band
                price: 49.99,
                expected: 1.0,
            },
            TestCase {
                // TC1: mid band
                price: 150.0,
                expected: 5.0,
            },
            TestCase {
                // TC2: upper-mid band
                price: 420.0,
                expected: 10.0,
            },
            TestCase {
                // TC3: large-cap band
                price: 800.0,
                expected: 25.0,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(strike_step(test.price), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn strike_grid_is_centred_and_drops_non_positive() {
        let grid = strike_grid(800.0);
        assert_eq!(grid.len(), 21);
        assert_eq!(grid.first(), Some(&550.0));
        assert_eq!(grid[10], 800.0);
        assert_eq!(grid.last(), Some(&1050.0));

        // Low-priced underlying loses the non-positive strikes.
        let grid = strike_grid(3.0);
        assert_eq!(grid.first(), Some(&1.0));
        assert_eq!(grid.last(), Some(&13.0));
        assert_eq!(grid.len(), 13);
    }

    #[test]
    fn chain_premiums_are_rounded_and_scaled_per_contract() {
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap();

        let chain = build_chain(Ticker::new("NVDA"), 800.0, now);

        assert_eq!(chain.implied_vol, 0.45);
        assert_eq!(chain.expiries.len(), 3);
        for expiry in &chain.expiries {
            for strike in &expiry.strikes {
                assert_eq!(round_2dp(strike.call_premium), strike.call_premium);
                assert_eq!(
                    strike.call_premium_per_contract,
                    round_2dp(strike.call_premium * 100.0)
                );
            }
        }
    }
}
