//! Frequency, last use, diversity and distribution of a tag.

use super::dates::{parse_opt, round_to};
use crate::config::DiversitySettings;
use crate::profile_store::{Distribution, EntityContext};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Share of visible entities carrying the tag, 0 when there are none.
pub fn calculate_frequency(entity_count: usize, total_entities: usize) -> f64 {
    if total_entities == 0 {
        return 0.0;
    }
    round_to((entity_count as f64 / total_entities as f64).min(1.0), 4)
}

/// Most recent readable date over every date field of every entity, today for
/// current entities.
pub fn calculate_last_used(entities: &[EntityContext], today: NaiveDate) -> Option<NaiveDate> {
    entities
        .iter()
        .flat_map(|entity| {
            let dates = if entity.is_current {
                [Some(today), None, None]
            } else {
                [
                    parse_opt(entity.end_date.as_deref()),
                    parse_opt(entity.start_date.as_deref()),
                    parse_opt(entity.date.as_deref()),
                ]
            };
            dates.into_iter().flatten()
        })
        .max()
}

/// `min(1, ln(n + 1) / ln(saturation))`
fn saturating_score(distinct: usize, saturation: f64) -> f64 {
    if distinct == 0 {
        return 0.0;
    }
    if saturation <= 1.0 {
        return 1.0;
    }
    ((distinct as f64 + 1.0).ln() / saturation.ln()).min(1.0)
}

/// Variety of contexts the tag appears in, in [0, 1].
pub fn calculate_diversity(entities: &[EntityContext], settings: &DiversitySettings) -> f64 {
    if entities.is_empty() {
        return 0.0;
    }

    let flavors: BTreeSet<&str> = entities
        .iter()
        .filter_map(|e| e.flavor.as_deref())
        .filter(|f| !f.is_empty())
        .collect();
    let categories: BTreeSet<&str> = entities
        .iter()
        .filter_map(|e| e.category.as_deref())
        .filter(|c| !c.is_empty())
        .collect();

    let flavor_score = saturating_score(flavors.len(), settings.saturation_threshold);
    let category_score = saturating_score(categories.len(), settings.saturation_threshold);

    let diversity =
        settings.flavor_weight * flavor_score + settings.category_weight * category_score;
    round_to(diversity.clamp(0.0, 1.0), 4)
}

pub fn calculate_distribution(entities: &[EntityContext]) -> Distribution {
    let mut distribution = Distribution::default();
    for entity in entities {
        if let Some(flavor) = entity.flavor.as_deref().filter(|f| !f.is_empty()) {
            *distribution.by_flavor.entry(flavor.to_string()).or_insert(0) += 1;
        }
        if let Some(category) = entity.category.as_deref().filter(|c| !c.is_empty()) {
            *distribution
                .by_category
                .entry(category.to_string())
                .or_insert(0) += 1;
        }
    }
    distribution
}
