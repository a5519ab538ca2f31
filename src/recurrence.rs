//! Next-charge date for recurring transactions

use crate::models::{Frequency, MonthlyRule};
use crate::temporal::{days_in_month, nth_business_day, shift_month};
use chrono::{Datelike, Duration, NaiveDate};

/// `day` in the given month, clamped to the month's last day.
fn clamped_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

fn next_monthly(rule: MonthlyRule, today: NaiveDate) -> Option<NaiveDate> {
    let (next_year, next_month) = shift_month(today.year(), today.month(), 1);

    match rule {
        MonthlyRule::DayOfMonth(day) => {
            let this_month = clamped_day(today.year(), today.month(), day)?;
            if this_month > today {
                Some(this_month)
            } else {
                clamped_day(next_year, next_month, day)
            }
        }
        MonthlyRule::BusinessDay(n) => {
            let this_month = nth_business_day(today.month(), today.year(), n)?;
            if this_month > today {
                Some(this_month)
            } else {
                nth_business_day(next_month, next_year, n)
            }
        }
    }
}

/// First charge strictly after `today`.
///
/// Monthly charges on or before today's day move to next month. Days past
/// the end of a short month are clamped to its last day. Without a rule a
/// monthly charge repeats today's day of month.
pub fn next_charge_date(
    frequency: Frequency,
    rule: Option<MonthlyRule>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    match frequency {
        Frequency::Daily => today.checked_add_signed(Duration::days(1)),
        Frequency::Weekly => today.checked_add_signed(Duration::days(7)),
        Frequency::Monthly => {
            let rule = rule.unwrap_or(MonthlyRule::DayOfMonth(today.day()));
            next_monthly(rule, today)
        }
        Frequency::Annual => clamped_day(today.year() + 1, today.month(), today.day()),
    }
}
