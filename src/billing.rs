// Billing-cycle boundaries: a monthly cycle starts on a configured anchor day.

use chrono::{Datelike, NaiveDate};

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("anchor day must be between 1 and 31, got {0}")]
    InvalidAnchorDay(u32),
    #[error("no calendar date for {year}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> Result<u32, CycleError> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .ok_or(CycleError::InvalidDate { year, month, day: 1 })
}

/// The anchor day as it falls in a given month: months shorter than the anchor
/// start their cycle on their last day.
fn anchor_in_month(year: i32, month: u32, anchor_day: u32) -> Result<NaiveDate, CycleError> {
    let day = anchor_day.min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day).ok_or(CycleError::InvalidDate { year, month, day })
}

/// Start date of the billing cycle containing `today`.
///
/// If today is on or past this month's anchor the cycle began this month, otherwise
/// it began on the previous month's anchor (rolling back a year from January).
pub fn cycle_start(today: NaiveDate, anchor_day: u32) -> Result<NaiveDate, CycleError> {
    if !(1..=31).contains(&anchor_day) {
        return Err(CycleError::InvalidAnchorDay(anchor_day));
    }

    let this_month = anchor_in_month(today.year(), today.month(), anchor_day)?;
    if today >= this_month {
        return Ok(this_month);
    }

    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    anchor_in_month(year, month, anchor_day)
}
