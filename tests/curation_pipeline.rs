//! Integration tests for the curation pipeline.
//!
//! Exercises the public API end to end: JSON records in, deduplicated and
//! selected records out, through the engines and the stage runner.

use chrono::NaiveDate;
use serde_json::{json, Value};

use fauna_forge::diversity::{
    balance_dataset, DatasetStatistics, ObservationDeduplicator, SampleSelector, SelectionMethod,
};
use fauna_forge::observation::Observation;
use fauna_forge::pipeline::{CurationConfig, CurationRunner};

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
}

fn parse(records: Value) -> Vec<Observation> {
    serde_json::from_value(records).expect("records should deserialize")
}

/// Two species-100 sightings ~15 m apart on one day, one ~60 km away, and a
/// co-located species-200 sighting.
fn four_observations() -> Vec<Observation> {
    parse(json!([
        {
            "id": 1,
            "taxon": {"id": 100, "name": "Panthera onca"},
            "latitude": -25.5, "longitude": -54.5,
            "observed_on": "2023-06-15",
            "photos": [{"id": 11, "original_dimensions": {"width": 1024, "height": 768}}]
        },
        {
            "id": 2,
            "taxon": {"id": 100, "name": "Panthera onca"},
            "geojson": {"type": "Point", "coordinates": [-54.5001, -25.5001]},
            "observed_on": "2023-06-15T14:30:00",
            "photos": [{"id": 12, "original_dimensions": {"width": 2048, "height": 1536}}]
        },
        {
            "id": 3,
            "taxon": {"id": 100, "name": "Panthera onca"},
            "location": "-26.0,-54.8",
            "observed_on": "2023-06-15"
        },
        {
            "id": 4,
            "taxon": {"id": 200, "name": "Tapirus terrestris"},
            "latitude": "-25.5", "longitude": "-54.5",
            "observed_on": "2023-06-15"
        }
    ]))
}

fn species_grid(species_id: i64, name: &str, count: i64) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "id": species_id * 1000 + i,
                "taxon": {"id": species_id, "name": name},
                "latitude": -25.0 - (i % 5) as f64 * 0.5,
                "longitude": -54.0 - (i / 5) as f64 * 0.5,
                "observed_on": format!("2023-{:02}-10", 1 + i % 12),
                "quality_score": 40.0 + (i * 13 % 50) as f64,
                "quality_grade": "research"
            })
        })
        .collect()
}

#[test]
fn test_end_to_end_merge_at_500m() {
    let dedup = ObservationDeduplicator::new(500.0, 1.0);
    let result = dedup.deduplicate_as_of(&four_observations(), reference_date());

    assert_eq!(result.total_original, 4);
    assert_eq!(result.total_unique, 3);
    assert_eq!(result.duplicates_removed, 1);
    assert!((result.dedup_rate - 0.25).abs() < 1e-10);

    // The larger photo wins the merged cluster.
    let merged = result
        .unique_individuals
        .iter()
        .find(|ind| ind.observations.len() == 2)
        .expect("one merged individual");
    assert_eq!(merged.best_observation.id.to_string(), "2");
    assert_eq!(merged.species_id, 100);
}

#[test]
fn test_end_to_end_distant_stays_separate_at_100m() {
    let dedup = ObservationDeduplicator::new(100.0, 1.0);
    let result = dedup.deduplicate_as_of(&four_observations(), reference_date());

    let distant = result
        .unique_individuals
        .iter()
        .find(|ind| ind.observations.iter().any(|o| o.id.to_string() == "3"))
        .expect("individual for observation 3");
    assert_eq!(distant.observations.len(), 1);
    assert!(result.total_unique <= result.total_original);
}

#[test]
fn test_species_never_merge() {
    let dedup = ObservationDeduplicator::new(100_000.0, 365.0);
    let result = dedup.deduplicate_as_of(&four_observations(), reference_date());

    assert_eq!(result.total_unique, 2);
    for individual in &result.unique_individuals {
        assert!(individual
            .observations
            .iter()
            .all(|o| o.species_id() == Some(individual.species_id)));
    }
}

#[test]
fn test_deduplicated_records_keep_unknown_fields() {
    let records = parse(Value::Array(species_grid(300, "Ara chloropterus", 3)));
    let result = ObservationDeduplicator::default().deduplicate_as_of(&records, reference_date());

    let out = serde_json::to_value(result.deduplicated_observations()).expect("serialize");
    assert_eq!(out[0]["quality_grade"], "research");
    assert_eq!(out[0]["taxon"]["name"], "Ara chloropterus");
}

#[test]
fn test_malformed_geodata_is_excluded_not_fatal() {
    let observations = parse(json!([
        {
            "id": 1,
            "taxon": {"id": 100, "name": "Panthera onca"},
            "latitude": -25.5, "longitude": -54.5,
            "observed_on": "2023-06-15",
            "photos": null
        },
        {
            "id": 2,
            "taxon": {"id": 100, "name": "Panthera onca"},
            "geojson": {"type": "Point", "coordinates": null},
            "location": "-25.5,-54.5",
            "observed_on": "2023-06-15"
        },
        {
            "id": 3,
            "taxon": {"id": 100, "name": "Panthera onca"},
            "geojson": "unknown",
            "observed_on": "2023-06-15"
        }
    ]));

    let result =
        ObservationDeduplicator::new(500.0, 1.0).deduplicate_as_of(&observations, reference_date());

    // Records 1 and 2 resolve to the same place; record 3 has no usable geodata.
    assert_eq!(result.total_original, 3);
    assert_eq!(result.total_unique, 1);
    assert_eq!(result.unique_individuals[0].observations.len(), 2);
}

#[test]
fn test_selection_respects_bounds_for_every_method() {
    let mut records = species_grid(100, "Species A", 40);
    records.extend(species_grid(200, "Species B", 15));
    records.extend(species_grid(300, "Species C", 4));
    let observations = parse(Value::Array(records));

    for method in SelectionMethod::all() {
        let mut selector = SampleSelector::new(*method, 42);
        let result = selector.select_samples(&observations, 10, 5, 0.7, 0.3);

        assert_eq!(result.by_species.get(&100), Some(&10), "{}", method);
        assert_eq!(result.by_species.get(&200), Some(&10), "{}", method);
        assert!(!result.by_species.contains_key(&300), "{}", method);
        assert_eq!(result.total_candidates, 59);
        assert_eq!(result.total_selected, 20);
        assert!(result.selected.iter().all(|o| o.species_id() != Some(300)));
    }
}

#[test]
fn test_selection_is_reproducible_across_engines() {
    let mut records = species_grid(100, "Species A", 30);
    records.extend(species_grid(200, "Species B", 25));
    let observations = parse(Value::Array(records));

    for method in SelectionMethod::all() {
        let ids = |seed: u64| -> Vec<String> {
            SampleSelector::new(*method, seed)
                .select_samples(&observations, 8, 1, 0.7, 0.3)
                .selected
                .iter()
                .map(|o| o.id.to_string())
                .collect()
        };
        assert_eq!(ids(99), ids(99), "{} differs for the same seed", method);
    }
}

#[test]
fn test_balance_after_selection() {
    let mut records = species_grid(100, "Species A", 30);
    records.extend(species_grid(200, "Species B", 6));
    let observations = parse(Value::Array(records));

    let selected = SampleSelector::new(SelectionMethod::Quality, 42)
        .select_samples(&observations, 20, 1, 0.7, 0.3)
        .selected;

    let capped = balance_dataset(&selected, 10, true);
    let stats = DatasetStatistics::calculate(&capped);
    assert_eq!(stats.species[0].count, 10);
    assert_eq!(stats.species[1].count, 6);

    let kept = balance_dataset(&selected, 10, false);
    assert_eq!(kept.len(), selected.len());
}

#[tokio::test]
async fn test_stage_runner_pipeline() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = dir.path().join("cache");
    std::fs::create_dir_all(&cache).expect("cache dir");

    // Every species-100 record is duplicated once at the same place and day.
    let mut records = species_grid(100, "Species A", 12);
    let duplicates: Vec<Value> = records
        .iter()
        .map(|r| {
            let mut dup = r.clone();
            dup["id"] = json!(r["id"].as_i64().unwrap_or_default() + 500);
            dup
        })
        .collect();
    records.extend(duplicates);
    records.extend(species_grid(200, "Species B", 3));
    std::fs::write(
        cache.join("observations.json"),
        serde_json::to_string(&records).expect("serialize"),
    )
    .expect("write raw");

    let config = CurationConfig::default()
        .with_data_dir(dir.path())
        .with_selection_method(SelectionMethod::Stratified)
        .with_samples_per_species(5)
        .with_min_samples_per_species(4)
        .with_target_per_species(4);
    let runner = CurationRunner::new(config);

    let dedup = runner.run_dedup().await.expect("dedup stage");
    assert_eq!(dedup.result.total_original, 27);
    assert_eq!(dedup.result.total_unique, 15);
    assert!(cache.join("observations_deduplicated.json").exists());

    let dedup_stats: Value = serde_json::from_str(
        &std::fs::read_to_string(cache.join("deduplication_stats.json")).expect("read"),
    )
    .expect("json");
    assert_eq!(dedup_stats["by_species"]["100"]["removed"], 12);

    let selection = runner.run_select().await.expect("select stage");
    assert_eq!(
        selection.input_path,
        cache.join("observations_deduplicated.json")
    );
    assert_eq!(selection.result.by_species.get(&100), Some(&5));
    assert!(!selection.result.by_species.contains_key(&200));

    let selection_stats: Value = serde_json::from_str(
        &std::fs::read_to_string(cache.join("selection_stats.json")).expect("read"),
    )
    .expect("json");
    assert_eq!(selection_stats["method"], "stratified");
    assert_eq!(selection_stats["by_species"]["100"], 5);
    assert_eq!(selection_stats["parameters"]["samples_per_species"], 5);

    let balance = runner.run_balance().await.expect("balance stage");
    assert_eq!(balance.input_count, 5);
    assert_eq!(balance.output_count, 4);
    assert!(cache.join("observations_balanced.json").exists());

    let stats = runner.run_stats(None).await.expect("stats");
    assert_eq!(stats.total_observations, 5);
    assert_eq!(stats.total_species, 1);
}
