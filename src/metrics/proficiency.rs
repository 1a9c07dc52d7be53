//! Proficiency scoring.
//!
//! Each entity scores on recency (exponential decay) and duration, the blend
//! is scaled by the weight of the entity's context (hands-on work outweighs
//! writing about a topic) and floored at `min_score`. The tag's proficiency is
//! the mean over its entities.

use super::dates::{entity_span, parse_opt, round_to, years_between, years_since};
use crate::config::{ContextWeights, ProficiencySettings};
use crate::profile_store::EntityContext;
use chrono::NaiveDate;

/// Flavor assumed for entities stored without one.
pub const FALLBACK_FLAVOR: &str = "oeuvre";
/// Category assumed for entities stored without one.
pub const FALLBACK_CATEGORY: &str = "other";

/// The date an entity was last engaged with: today when current, otherwise
/// the first readable of end, start and point date.
pub fn relevant_date(entity: &EntityContext, today: NaiveDate) -> Option<NaiveDate> {
    if entity.is_current {
        return Some(today);
    }
    parse_opt(entity.end_date.as_deref())
        .or_else(|| parse_opt(entity.start_date.as_deref()))
        .or_else(|| parse_opt(entity.date.as_deref()))
}

/// `100 * e^(-years_ago / halflife)`
pub fn recency_score(years_ago: f64, halflife: f64) -> f64 {
    100.0 * (-years_ago / halflife).exp()
}

fn entity_score(
    entity: &EntityContext,
    settings: &ProficiencySettings,
    weights: &ContextWeights,
    today: NaiveDate,
) -> f64 {
    let years_ago = years_since(relevant_date(entity, today), today);
    let recency = recency_score(years_ago, settings.recency_decay_halflife);

    let duration_years = match entity_span(entity, today) {
        Some((start, end)) => years_between(start, end),
        None => settings.default_oeuvre_duration_years,
    };
    let duration = (duration_years * settings.duration_score_multiplier).min(100.0);

    let base = settings.recency_weight * recency + settings.duration_weight * duration;

    let flavor = entity.flavor.as_deref().unwrap_or(FALLBACK_FLAVOR);
    let category = entity.category.as_deref().unwrap_or(FALLBACK_CATEGORY);
    let context_weight = weights.weight_for(flavor, category);

    settings.min_score.max(context_weight * base)
}

/// Mean entity score in [0, 100], 0 when there are no entities.
pub fn calculate_proficiency(
    entities: &[EntityContext],
    settings: &ProficiencySettings,
    weights: &ContextWeights,
    today: NaiveDate,
) -> f64 {
    if entities.is_empty() {
        return 0.0;
    }
    let total: f64 = entities
        .iter()
        .map(|e| entity_score(e, settings, weights, today))
        .sum();
    round_to((total / entities.len() as f64).clamp(0.0, 100.0), 2)
}
