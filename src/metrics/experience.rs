//! Total years of experience with a tag.

use super::dates::{entity_span, is_ongoing, parse_opt, round_to, years_between};
use super::intervals::{merge_overlapping_by, Span};
use crate::config::ExperienceSettings;
use crate::profile_store::EntityContext;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Engagement {
    /// Longest ongoing member, the only part the current bonus applies to
    ongoing_years: f64,
    /// Assumed years for point-in-time entities, zero for dated spans
    point_years: f64,
}

impl Engagement {
    fn absorb(&mut self, other: Engagement) {
        self.ongoing_years = self.ongoing_years.max(other.ongoing_years);
        self.point_years = self.point_years.max(other.point_years);
    }
}

fn engagement_spans(
    entities: &[EntityContext],
    point_years: f64,
    today: NaiveDate,
) -> Vec<Span<NaiveDate, Engagement>> {
    entities
        .iter()
        .filter_map(|entity| {
            if let Some((start, end)) = entity_span(entity, today) {
                let ongoing_years = if is_ongoing(entity) {
                    years_between(start, end)
                } else {
                    0.0
                };
                return Some(Span::with_payload(
                    start,
                    end,
                    Engagement {
                        ongoing_years,
                        point_years: 0.0,
                    },
                ));
            }
            // Entities with an unreadable end keep no span, even with a point date
            if parse_opt(entity.start_date.as_deref()).is_some() {
                return None;
            }
            parse_opt(entity.date.as_deref()).map(|date| {
                Span::with_payload(
                    date,
                    date,
                    Engagement {
                        ongoing_years: 0.0,
                        point_years,
                    },
                )
            })
        })
        .collect()
}

fn span_years(span: &Span<NaiveDate, Engagement>, current_bonus: f64) -> f64 {
    let years = years_between(span.start, span.end).max(span.payload.point_years);
    years + span.payload.ongoing_years * (current_bonus - 1.0)
}

/// Years of engagement across all entities, rounded to 2 decimals.
///
/// Dated entities contribute their span, point-in-time entities contribute
/// `point_years`. The years of ongoing spans are multiplied by the current
/// bonus, and only theirs: a merged group never scales the finished spans it
/// absorbed. With
/// `deduplicate_overlaps`, overlapping spans are merged first so concurrent
/// engagements are counted once.
pub fn calculate_experience_years(
    entities: &[EntityContext],
    settings: &ExperienceSettings,
    point_years: f64,
    today: NaiveDate,
) -> f64 {
    let spans = engagement_spans(entities, point_years, today);
    let bonus = settings.current_bonus_multiplier;

    let total: f64 = if settings.deduplicate_overlaps {
        merge_overlapping_by(spans, Engagement::absorb)
            .iter()
            .map(|span| span_years(span, bonus))
            .sum()
    } else {
        spans.iter().map(|span| span_years(span, bonus)).sum()
    };

    round_to(total.max(0.0), 2)
}
