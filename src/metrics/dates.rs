//! Flexible date parsing and year arithmetic.
//!
//! Entity dates are hand-edited and often partial, so everything here is
//! total: bad input yields `None` or a neutral number, never an error.

use crate::profile_store::EntityContext;
use chrono::{Datelike, NaiveDate};

/// Years reported for a missing date. Large enough that any decay reaches ~0.
pub const STALE_YEARS: f64 = 999.0;

const DAYS_PER_YEAR: f64 = 365.25;

/// Parses `YYYY-MM-DD`, `YYYY-MM` (first of month) or `YYYY` (January 1st).
///
/// A longer string is accepted when it starts with a full date, so
/// timestamps like `2021-03-04T10:00:00Z` resolve to their day.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    match s.len() {
        0 => None,
        4 => {
            let year = s.parse::<i32>().ok()?;
            NaiveDate::from_ymd_opt(year, 1, 1)
        }
        7 => NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").ok(),
        10 => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
        _ => s
            .get(..10)
            .filter(|_| matches!(s.as_bytes().get(10), Some(b'T') | Some(b' ')))
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()),
    }
}

/// Parses an optional stored date, treating absent and unparsable alike.
pub fn parse_opt(s: Option<&str>) -> Option<NaiveDate> {
    s.and_then(parse_date)
}

/// Length of `[start, end]` in years, never negative.
pub fn years_between(start: NaiveDate, end: NaiveDate) -> f64 {
    let days = (end - start).num_days();
    (days as f64 / DAYS_PER_YEAR).max(0.0)
}

/// Years from `date` until `today`; [`STALE_YEARS`] when there is no date.
pub fn years_since(date: Option<NaiveDate>, today: NaiveDate) -> f64 {
    match date {
        Some(date) => years_between(date, today),
        None => STALE_YEARS,
    }
}

/// Date as a fractional year, January = `.0`.
pub fn fractional_year(date: NaiveDate) -> f64 {
    date.year() as f64 + date.month0() as f64 / 12.0
}

/// The `[start, end]` span of an entity that has a start date.
///
/// A missing end means ongoing (until `today`). A present but unreadable end
/// leaves the span unresolved. An end before the start collapses the span to
/// its start.
pub fn entity_span(entity: &EntityContext, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = parse_opt(entity.start_date.as_deref())?;
    let end = match entity.end_date.as_deref().map(str::trim) {
        None | Some("") => today,
        Some(raw) => parse_date(raw)?,
    };
    Some((start, end.max(start)))
}

/// Whether the entity counts as ongoing for duration bonuses.
pub fn is_ongoing(entity: &EntityContext) -> bool {
    entity.is_current || entity.end_date.as_deref().map_or(true, |s| s.trim().is_empty())
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
