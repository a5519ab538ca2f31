//! Business-day ordinals ("5º dia útil")
//!
//! Weekends are the only non-business days; there is no holiday calendar.

use super::shift_month;
use crate::text::normalize_for_match;
use chrono::{Datelike, NaiveDate, Weekday};
use lazy_static::lazy_static;
use regex::Regex;

const ORDINAL_WORDS: &[(&str, u32)] = &[
    ("primeiro", 1),
    ("segundo", 2),
    ("terceiro", 3),
    ("quarto", 4),
    ("quinto", 5),
    ("sexto", 6),
    ("setimo", 7),
    ("oitavo", 8),
    ("nono", 9),
    ("decimo", 10),
];

lazy_static! {
    static ref NUMERIC_ORDINAL: Regex =
        Regex::new(r"\b(\d{1,2})\s*(?:º|°|ª|o)?\s+dia\s+util\b").unwrap();
    static ref WORD_ORDINAL: Regex = Regex::new(
        r"\b(primeiro|segundo|terceiro|quarto|quinto|sexto|setimo|oitavo|nono|decimo)\s+dia\s+util\b"
    )
    .unwrap();
    static ref DAY_N_UTIL: Regex = Regex::new(r"\bdia\s+(\d{1,2})\s+util\b").unwrap();
    static ref NEXT_MONTH: Regex = Regex::new(r"\b(?:mes que vem|proximo mes)\b").unwrap();
}

/// "n-th business day", optionally of next month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessDayRule {
    pub n: u32,
    pub next_month: bool,
}

impl BusinessDayRule {
    /// Concrete date for this rule as seen from `today`.
    ///
    /// Without "next month" the current month is used, moving to the
    /// following month when the date has already passed.
    pub fn resolve(&self, today: NaiveDate) -> Option<NaiveDate> {
        if self.next_month {
            let (year, month) = shift_month(today.year(), today.month(), 1);
            return nth_business_day(month, year, self.n);
        }

        let this_month = nth_business_day(today.month(), today.year(), self.n)?;
        if this_month >= today {
            return Some(this_month);
        }
        let (year, month) = shift_month(today.year(), today.month(), 1);
        nth_business_day(month, year, self.n)
    }
}

fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The `n`-th weekday counted from the 1st of `month` (1-based).
///
/// Large `n` may run past the end of the month; that date is returned as is.
/// `None` only for `n == 0` or an invalid month.
pub fn nth_business_day(month: u32, year: i32, n: u32) -> Option<NaiveDate> {
    if n == 0 {
        return None;
    }

    let mut date = NaiveDate::from_ymd_opt(year, month, 1)?;
    let mut count = 0;
    loop {
        if is_business_day(date) {
            count += 1;
            if count == n {
                return Some(date);
            }
        }
        date = date.succ_opt()?;
    }
}

/// Recognise "5º dia útil", "quinto dia útil" and "dia 5 útil", with an
/// optional "do mês que vem".
pub fn extract_business_day_rule(text: &str) -> Option<BusinessDayRule> {
    let t = normalize_for_match(text);

    let n = NUMERIC_ORDINAL
        .captures(&t)
        .or_else(|| DAY_N_UTIL.captures(&t))
        .and_then(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .or_else(|| {
            let caps = WORD_ORDINAL.captures(&t)?;
            let word = caps.get(1)?.as_str();
            ORDINAL_WORDS
                .iter()
                .find(|(w, _)| *w == word)
                .map(|(_, n)| *n)
        })?;

    if !(1..=31).contains(&n) {
        return None;
    }

    Some(BusinessDayRule {
        n,
        next_month: NEXT_MONTH.is_match(&t),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_nth_business_day_skips_weekends() {
        // March 2026 starts on a Sunday
        assert_eq!(nth_business_day(3, 2026, 1), Some(d(2026, 3, 2)));
        assert_eq!(nth_business_day(3, 2026, 5), Some(d(2026, 3, 6)));
        assert_eq!(nth_business_day(3, 2026, 6), Some(d(2026, 3, 9)));
    }

    #[test]
    fn test_nth_business_day_is_strictly_increasing() {
        for (month, year) in [(1, 2026), (2, 2026), (8, 2026), (2, 2028)] {
            let mut previous: Option<NaiveDate> = None;
            for n in 1..=40 {
                let date = nth_business_day(month, year, n).unwrap();
                assert!(is_business_day(date));
                if let Some(prev) = previous {
                    assert!(date > prev);
                }
                previous = Some(date);
            }
        }
    }

    #[test]
    fn test_nth_business_day_overflows_month() {
        // February 2026 has 20 business days
        assert_eq!(nth_business_day(2, 2026, 20), Some(d(2026, 2, 27)));
        assert_eq!(nth_business_day(2, 2026, 21), Some(d(2026, 3, 2)));
    }

    #[test]
    fn test_nth_business_day_rejects_bad_input() {
        assert_eq!(nth_business_day(3, 2026, 0), None);
        assert_eq!(nth_business_day(13, 2026, 1), None);
    }

    #[test]
    fn test_extract_business_day_rule() {
        assert_eq!(
            extract_business_day_rule("salário cai no 5º dia útil"),
            Some(BusinessDayRule { n: 5, next_month: false })
        );
        assert_eq!(
            extract_business_day_rule("quinto dia útil do mês que vem"),
            Some(BusinessDayRule { n: 5, next_month: true })
        );
        assert_eq!(
            extract_business_day_rule("dia 3 útil"),
            Some(BusinessDayRule { n: 3, next_month: false })
        );
        assert_eq!(extract_business_day_rule("dia 5"), None);
    }

    #[test]
    fn test_rule_resolution_rolls_forward() {
        let rule = BusinessDayRule { n: 5, next_month: false };
        assert_eq!(rule.resolve(d(2026, 3, 1)), Some(d(2026, 3, 6)));
        // April 2026: 1st is a Wednesday, 5th business day is the 7th
        assert_eq!(rule.resolve(d(2026, 3, 10)), Some(d(2026, 4, 7)));
    }
}
