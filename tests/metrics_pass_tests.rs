//! End-to-end tests of the metrics pass over an on-disk profile database.

mod common;

use chrono::NaiveDate;
use common::{today, TestProfile};
use profile_metrics::config::{FileConfig, MetricsSettings};
use profile_metrics::profile_store::{
    EntityTagStore, GrowthTrend, MetricsOrder, RunStatus, TagKey, TagMetricsStore, TagType,
};

fn python() -> TagKey {
    TagKey::new("Python", TagType::Technology)
}

#[test]
fn test_simple_aggregate_scenario() {
    let profile = TestProfile::new();
    profile.add_span_entity("a", "stages", "job", "2019-01-01", Some("2021-01-01"));
    profile.add_point_entity("b", "oeuvre", "article", "2023-06-01");
    profile.add_filler_entities(8);
    profile.tag("a", "Python", "technology");
    profile.tag("b", "Python", "technology");

    let summary = profile
        .engine()
        .calculate_all_metrics_at(None, today())
        .unwrap();
    assert_eq!(summary.tags_processed, 1);

    let metrics = profile.store.get_tag_metrics(&python()).unwrap().unwrap();
    assert_eq!(metrics.entity_count, 2);
    assert_eq!(metrics.frequency, 0.2);
    assert_eq!(metrics.last_used, NaiveDate::from_ymd_opt(2023, 6, 1));
    assert!(
        (metrics.experience_years - 2.5).abs() < 0.01,
        "experience was {}",
        metrics.experience_years
    );
    assert_eq!(metrics.growth_trend, GrowthTrend::Stable);
    assert_eq!(metrics.distribution.by_category["job"], 1);
    assert_eq!(metrics.distribution.by_category["article"], 1);
    assert_eq!(metrics.metrics_version, "1.0");
}

#[test]
fn test_private_entities_do_not_count() {
    let profile = TestProfile::new();
    profile.add_point_entity("b", "oeuvre", "article", "2023-06-01");
    profile.add_private_entity("secret", "2025-01-01");
    profile.add_filler_entities(3);
    profile.tag("b", "Python", "technology");
    profile.tag("secret", "Python", "technology");
    profile.tag("secret", "Haskell", "technology");

    let summary = profile
        .engine()
        .calculate_all_metrics_at(None, today())
        .unwrap();
    assert_eq!(summary.tags_processed, 1);

    let entities = profile.store.collect_tag_entities(&python()).unwrap();
    let metrics = profile.store.get_tag_metrics(&python()).unwrap().unwrap();
    assert_eq!(metrics.entity_count, entities.len());
    assert_eq!(metrics.entity_count, 1);
    assert_eq!(metrics.frequency, 0.25);
    assert_eq!(metrics.last_used, NaiveDate::from_ymd_opt(2023, 6, 1));
    assert!(profile
        .store
        .get_tag_metrics(&TagKey::new("Haskell", TagType::Technology))
        .unwrap()
        .is_none());
}

#[test]
fn test_overlapping_jobs_counted_once() {
    let profile = TestProfile::new();
    profile.add_span_entity("j1", "stages", "job", "2020-01", Some("2021-06"));
    profile.add_span_entity("j2", "stages", "job", "2021-01", Some("2022-01"));
    profile.tag("j1", "Go", "technology");
    profile.tag("j2", "Go", "technology");

    profile
        .engine()
        .calculate_all_metrics_at(None, today())
        .unwrap();

    let metrics = profile
        .store
        .get_tag_metrics(&TagKey::new("Go", TagType::Technology))
        .unwrap()
        .unwrap();
    assert!(
        (metrics.experience_years - 2.0).abs() < 0.01,
        "experience was {}",
        metrics.experience_years
    );
}

#[test]
fn test_current_entity_last_used_today() {
    let profile = TestProfile::new();
    profile.add_current_entity("now", "stages", "job", "2018-03-01");
    profile.tag("now", "Rust", "technology");

    profile
        .engine()
        .calculate_all_metrics_at(None, today())
        .unwrap();

    let metrics = profile
        .store
        .get_tag_metrics(&TagKey::new("Rust", TagType::Technology))
        .unwrap()
        .unwrap();
    assert_eq!(metrics.last_used, Some(today()));
    assert_eq!(metrics.frequency, 1.0);
}

#[test]
fn test_stale_single_mention() {
    let profile = TestProfile::new();
    profile.add_span_entity("old", "stages", "job", "2013-06-01", Some("2015-06-01"));
    profile.add_span_entity("new", "stages", "job", "2021-06-01", Some("2023-06-01"));
    profile.tag("old", "COBOL", "technology");
    profile.tag("new", "Fortran", "technology");

    let engine = profile.engine();
    engine.calculate_all_metrics_at(None, today()).unwrap();

    let cobol = profile
        .store
        .get_tag_metrics(&TagKey::new("COBOL", TagType::Technology))
        .unwrap()
        .unwrap();
    let fortran = profile
        .store
        .get_tag_metrics(&TagKey::new("Fortran", TagType::Technology))
        .unwrap()
        .unwrap();

    assert_eq!(cobol.growth_trend, GrowthTrend::Stable);
    let penalty = engine.settings().relevance.stale_penalty;
    assert!(cobol.relevance_score < fortran.relevance_score - penalty);
}

#[test]
fn test_rerun_is_idempotent() {
    let profile = TestProfile::new();
    profile.add_span_entity("j1", "stages", "job", "2016-01-01", Some("2019-01-01"));
    profile.add_current_entity("j2", "stages", "job", "2019-02-01");
    profile.add_point_entity("p1", "oeuvre", "coding", "2020-05-01");
    profile.add_point_entity("p2", "oeuvre", "article", "2022-05-01");
    profile.add_point_entity("p3", "oeuvre", "article", "2023-05-01");
    for id in ["j1", "j2", "p1", "p2", "p3"] {
        profile.tag(id, "Rust", "technology");
    }
    profile.tag("j2", "Leadership", "skill");
    profile.tag("p2", "Writing", "skill");
    profile.tag("p3", "Writing", "skill");

    let engine = profile.engine();
    engine.calculate_all_metrics_at(None, today()).unwrap();
    let first = profile
        .store
        .list_tag_metrics(None, MetricsOrder::RelevanceScore, 100)
        .unwrap();

    engine.calculate_all_metrics_at(None, today()).unwrap();
    let second = profile
        .store
        .list_tag_metrics(None, MetricsOrder::RelevanceScore, 100)
        .unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        let mut b = b.clone();
        b.calculated_at = a.calculated_at;
        assert_eq!(*a, b);
    }
    assert_eq!(profile.metrics_row_count(), 3);
}

#[test]
fn test_outputs_bounded() {
    let profile = TestProfile::new();
    profile.add_current_entity("j", "stages", "job", "1995-01-01");
    profile.add_span_entity("e", "stages", "education", "1990-09-01", Some("1994-07-01"));
    profile.add_point_entity("x", "oeuvre", "book", "not-a-date");
    profile.add_point_entity("y", "oeuvre", "coding", "2024-11");
    for id in ["j", "e", "x", "y"] {
        profile.tag(id, "C", "technology");
    }
    profile.tag("x", "Obscure", "generic");

    profile
        .engine()
        .calculate_all_metrics_at(None, today())
        .unwrap();

    for metrics in profile
        .store
        .list_tag_metrics(None, MetricsOrder::RelevanceScore, 10)
        .unwrap()
    {
        assert!((0.0..=100.0).contains(&metrics.proficiency));
        assert!((0.0..=100.0).contains(&metrics.relevance_score));
        assert!((0.0..=1.0).contains(&metrics.frequency));
        assert!((0.0..=1.0).contains(&metrics.diversity_score));
        assert!(metrics.experience_years >= 0.0);
    }

    // Undated entity still counts, but has no last use
    let obscure = profile
        .store
        .get_tag_metrics(&TagKey::new("Obscure", TagType::Generic))
        .unwrap()
        .unwrap();
    assert_eq!(obscure.entity_count, 1);
    assert_eq!(obscure.last_used, None);
}

#[test]
fn test_version_check_and_run_history() {
    let profile = TestProfile::new();
    profile.add_point_entity("b", "oeuvre", "article", "2023-06-01");
    profile.tag("b", "Python", "technology");

    let engine = profile.engine();
    assert!(!engine.is_up_to_date().unwrap());
    assert!(profile.store.last_run().unwrap().is_none());

    let summary = engine.calculate_all_metrics_at(None, today()).unwrap();
    assert!(engine.is_up_to_date().unwrap());

    let run = profile.store.last_run().unwrap().unwrap();
    assert_eq!(run.id, summary.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.tags_processed, 1);
    assert_eq!(run.metrics_version, "1.0");
    assert!(run.finished_at.is_some());

    let bumped = profile.engine_with(MetricsSettings {
        version: "1.1".to_string(),
        ..Default::default()
    });
    assert!(!bumped.is_up_to_date().unwrap());
    bumped
        .calculate_all_metrics_at(Some(TagType::Technology), today())
        .unwrap();
    assert!(bumped.is_up_to_date().unwrap());
    assert_eq!(
        profile.store.last_run().unwrap().unwrap().tag_type_filter,
        Some(TagType::Technology)
    );
}

#[test]
fn test_empty_profile() {
    let profile = TestProfile::new();
    let engine = profile.engine();

    let summary = engine.calculate_all_metrics_at(None, today()).unwrap();
    assert_eq!(summary.tags_processed, 0);
    assert_eq!(profile.store.total_visible_entity_count().unwrap(), 0);

    let metrics = engine.calculate_tag_metrics_at(&python(), today()).unwrap();
    assert_eq!(metrics.entity_count, 0);
    assert_eq!(metrics.frequency, 0.0);
    assert_eq!(metrics.growth_trend, GrowthTrend::Stable);
}

#[test]
fn test_type_filter_and_unknown_types() {
    let profile = TestProfile::new();
    profile.add_current_entity("j", "stages", "job", "2022-01-01");
    profile.tag("j", "Rust", "technology");
    profile.tag("j", "Mentoring", "skill");
    profile.tag("j", "Vibes", "mystery");

    let summary = profile
        .engine()
        .calculate_all_metrics_at(Some(TagType::Skill), today())
        .unwrap();
    assert_eq!(summary.tags_processed, 1);
    assert_eq!(
        profile.store.count_metrics_by_type().unwrap(),
        vec![(TagType::Skill, 1)]
    );

    let summary = profile
        .engine()
        .calculate_all_metrics_at(None, today())
        .unwrap();
    assert_eq!(summary.tags_processed, 2);
}

#[test]
fn test_batches_cover_every_tag() {
    let profile = TestProfile::new();
    profile.add_point_entity("p", "oeuvre", "coding", "2024-02-01");
    for name in ["A", "B", "C", "D", "E"] {
        profile.tag("p", name, "technology");
    }

    let summary = profile
        .engine_with(MetricsSettings {
            batch_size: 2,
            ..Default::default()
        })
        .calculate_all_metrics_at(None, today())
        .unwrap();

    assert_eq!(summary.tags_processed, 5);
    assert_eq!(profile.metrics_row_count(), 5);
}

#[test]
fn test_stale_records_pruned_only_when_enabled() {
    let profile = TestProfile::new();
    profile.add_point_entity("a", "oeuvre", "article", "2023-01-01");
    profile.add_point_entity("b", "oeuvre", "article", "2024-01-01");
    profile.tag("a", "Flash", "technology");
    profile.tag("b", "Rust", "technology");
    profile
        .engine()
        .calculate_all_metrics_at(None, today())
        .unwrap();

    profile.set_visibility("a", "private");
    let flash = TagKey::new("Flash", TagType::Technology);

    let summary = profile
        .engine()
        .calculate_all_metrics_at(None, today())
        .unwrap();
    assert_eq!(summary.pruned, 0);
    assert!(profile.store.get_tag_metrics(&flash).unwrap().is_some());

    let summary = profile
        .engine_with(MetricsSettings {
            prune_stale_records: true,
            ..Default::default()
        })
        .calculate_all_metrics_at(None, today())
        .unwrap();
    assert_eq!(summary.pruned, 1);
    assert!(profile.store.get_tag_metrics(&flash).unwrap().is_none());
    assert_eq!(profile.metrics_row_count(), 1);
}

#[test]
fn test_file_config_drives_scores() {
    let profile = TestProfile::new();
    profile.add_point_entity("t", "oeuvre", "talk", "2025-06-01");
    profile.tag("t", "Speaking", "skill");

    let file: FileConfig = toml::from_str(
        r#"
        [metrics]
        version = "2.0"

        [metrics.context_weights.oeuvre]
        talk = 1.0
        "#,
    )
    .unwrap();
    let weighted = MetricsSettings::resolve(file.metrics.unwrap()).unwrap();

    let engine = profile.engine();
    let default_score = engine
        .calculate_tag_metrics_at(&TagKey::new("Speaking", TagType::Skill), today())
        .unwrap()
        .proficiency;

    profile
        .engine_with(weighted)
        .calculate_all_metrics_at(None, today())
        .unwrap();
    let stored = profile
        .store
        .get_tag_metrics(&TagKey::new("Speaking", TagType::Skill))
        .unwrap()
        .unwrap();

    assert_eq!(stored.metrics_version, "2.0");
    // "talk" is not in the default table, so it falls back to 0.5
    assert!((stored.proficiency - 2.0 * default_score).abs() < 0.02);
}
