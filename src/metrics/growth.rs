//! Growth trend of a tag over calendar years.

use super::dates::{fractional_year, parse_opt};
use crate::config::GrowthSettings;
use crate::profile_store::{EntityContext, GrowthTrend};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

/// Best date for placing an entity on the timeline: the point date, else the
/// start, else the end.
fn timeline_date(entity: &EntityContext) -> Option<NaiveDate> {
    parse_opt(entity.date.as_deref())
        .or_else(|| parse_opt(entity.start_date.as_deref()))
        .or_else(|| parse_opt(entity.end_date.as_deref()))
}

/// Least-squares slope of entity count per year. `None` when fewer than two
/// distinct years are present.
pub fn yearly_slope(counts_by_year: &BTreeMap<i32, usize>) -> Option<f64> {
    let first_year = *counts_by_year.keys().next()?;
    let n = counts_by_year.len() as f64;

    let points: Vec<(f64, f64)> = counts_by_year
        .iter()
        .map(|(&year, &count)| ((year - first_year) as f64, count as f64))
        .collect();
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let numerator: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let denominator: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();

    if denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator)
}

/// Both thresholds are inclusive.
pub fn classify_slope(slope: f64, settings: &GrowthSettings) -> GrowthTrend {
    if slope >= settings.increasing_threshold {
        GrowthTrend::Increasing
    } else if slope <= settings.decreasing_threshold {
        GrowthTrend::Decreasing
    } else {
        GrowthTrend::Stable
    }
}

/// Stable unless there are enough dated entities spread over enough time to
/// fit a slope.
pub fn calculate_growth_trend(
    entities: &[EntityContext],
    settings: &GrowthSettings,
) -> GrowthTrend {
    if entities.len() < settings.min_entity_count {
        return GrowthTrend::Stable;
    }

    let dates: Vec<NaiveDate> = entities.iter().filter_map(timeline_date).collect();
    if dates.is_empty() || dates.len() < settings.min_entity_count {
        return GrowthTrend::Stable;
    }

    let (min, max) = dates
        .iter()
        .map(|d| fractional_year(*d))
        .fold((f64::MAX, f64::MIN), |(lo, hi), y| (lo.min(y), hi.max(y)));
    if max - min < settings.min_timespan_years {
        return GrowthTrend::Stable;
    }

    let mut counts_by_year: BTreeMap<i32, usize> = BTreeMap::new();
    for date in &dates {
        *counts_by_year.entry(date.year()).or_insert(0) += 1;
    }

    match yearly_slope(&counts_by_year) {
        Some(slope) => classify_slope(slope, settings),
        None => GrowthTrend::Stable,
    }
}
