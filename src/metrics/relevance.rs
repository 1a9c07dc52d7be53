//! Composite relevance score.

use super::dates::{round_to, years_since};
use super::proficiency::recency_score;
use crate::config::{GrowthScores, RelevanceSettings};
use crate::profile_store::GrowthTrend;
use chrono::NaiveDate;

/// The already-computed metrics of a tag that feed its relevance.
#[derive(Debug, Clone)]
pub struct RelevanceInputs {
    pub proficiency: f64,
    pub frequency: f64,
    pub last_used: Option<NaiveDate>,
    pub diversity: f64,
    pub experience_years: f64,
    pub growth_trend: GrowthTrend,
    /// Any entity carrying the tag is current
    pub any_current: bool,
}

fn growth_score(trend: GrowthTrend, scores: &GrowthScores) -> f64 {
    match trend {
        GrowthTrend::Increasing => scores.increasing,
        GrowthTrend::Stable => scores.stable,
        GrowthTrend::Decreasing => scores.decreasing,
    }
}

/// Weighted blend of the tag's metrics on a 0-100 scale, plus the current
/// bonus, minus the stale penalty, rounded to 2 decimals and clamped to [0, 100].
pub fn calculate_relevance(
    inputs: &RelevanceInputs,
    settings: &RelevanceSettings,
    today: NaiveDate,
) -> f64 {
    let weights = &settings.weights;

    let years_ago = years_since(inputs.last_used, today);
    let recency = recency_score(years_ago, settings.recency_decay_halflife);
    let experience = (inputs.experience_years * settings.experience_score_multiplier).min(100.0);

    let mut score = weights.proficiency * inputs.proficiency
        + weights.frequency * inputs.frequency * 100.0
        + weights.recency * recency
        + weights.diversity * inputs.diversity * 100.0
        + weights.experience * experience
        + weights.growth * growth_score(inputs.growth_trend, &settings.growth_scores);

    if inputs.any_current {
        score += settings.current_bonus;
    }
    if years_ago > settings.stale_threshold_years {
        score -= settings.stale_penalty;
    }

    round_to(score, 2).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn inputs(last_used: Option<NaiveDate>) -> RelevanceInputs {
        RelevanceInputs {
            proficiency: 40.0,
            frequency: 0.1,
            last_used,
            diversity: 0.3,
            experience_years: 1.0,
            growth_trend: GrowthTrend::Stable,
            any_current: false,
        }
    }

    #[test]
    fn test_weighted_blend() {
        let settings = RelevanceSettings::default();
        let score = calculate_relevance(&inputs(Some(today())), &settings, today());
        // 0.3*40 + 0.2*10 + 0.2*100 + 0.15*30 + 0.1*10 + 0.05*50
        assert!((score - 42.0).abs() < 0.001, "score was {}", score);
    }

    #[test]
    fn test_current_bonus() {
        let settings = RelevanceSettings::default();
        let base = calculate_relevance(&inputs(Some(today())), &settings, today());
        let mut current = inputs(Some(today()));
        current.any_current = true;
        let boosted = calculate_relevance(&current, &settings, today());
        assert!((boosted - base - settings.current_bonus).abs() < 0.001);
    }

    #[test]
    fn test_stale_penalty() {
        let settings = RelevanceSettings::default();
        let ten_years_ago = NaiveDate::from_ymd_opt(2015, 6, 1);
        let four_years_ago = NaiveDate::from_ymd_opt(2021, 6, 1);

        let stale = calculate_relevance(&inputs(ten_years_ago), &settings, today());
        let recent = calculate_relevance(&inputs(four_years_ago), &settings, today());
        assert!(stale < recent - settings.stale_penalty);

        // Without a date the tag is as stale as it gets
        let undated = calculate_relevance(&inputs(None), &settings, today());
        // 12 + 2 + 0 + 4.5 + 1 + 2.5 - 15
        assert!((undated - 7.0).abs() < 0.001, "undated was {}", undated);
    }

    #[test]
    fn test_growth_scores() {
        let settings = RelevanceSettings::default();
        let mut rising = inputs(Some(today()));
        rising.growth_trend = GrowthTrend::Increasing;
        let mut falling = inputs(Some(today()));
        falling.growth_trend = GrowthTrend::Decreasing;

        let up = calculate_relevance(&rising, &settings, today());
        let down = calculate_relevance(&falling, &settings, today());
        assert!((up - down - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_clamped() {
        let settings = RelevanceSettings::default();
        let maxed = RelevanceInputs {
            proficiency: 100.0,
            frequency: 1.0,
            last_used: Some(today()),
            diversity: 1.0,
            experience_years: 40.0,
            growth_trend: GrowthTrend::Increasing,
            any_current: true,
        };
        assert_eq!(calculate_relevance(&maxed, &settings, today()), 100.0);

        let empty = RelevanceInputs {
            proficiency: 0.0,
            frequency: 0.0,
            last_used: None,
            diversity: 0.0,
            experience_years: 0.0,
            growth_trend: GrowthTrend::Decreasing,
            any_current: false,
        };
        assert_eq!(calculate_relevance(&empty, &settings, today()), 0.0);
    }
}
