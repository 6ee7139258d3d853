//! Per-species balancing of a selected dataset.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use tracing::info;

use crate::observation::{partition_by_species, Observation};

/// Caps every species at `target_per_species`, keeping the best by quality.
///
/// Species at or above the target are reduced to their top `target_per_species`
/// records by quality (ties in input order) when `allow_undersampling` is set;
/// otherwise they are kept whole. Smaller species are always kept whole and
/// nothing is ever duplicated. Records without a species id are dropped.
///
/// # Returns
///
/// The balanced records, grouped by species in first-appearance order.
pub fn balance_dataset(
    observations: &[Observation],
    target_per_species: usize,
    allow_undersampling: bool,
) -> Vec<Observation> {
    let partitions = partition_by_species(observations);
    let species_count = partitions.len();
    let mut balanced = Vec::with_capacity(observations.len());

    for partition in partitions {
        if allow_undersampling && partition.len() >= target_per_species {
            let mut members = partition.members;
            members.sort_by_key(|obs| Reverse(OrderedFloat(obs.quality())));
            balanced.extend(members.into_iter().take(target_per_species).cloned());
        } else {
            balanced.extend(partition.members.into_iter().cloned());
        }
    }

    info!(
        "Balanced dataset: {} -> {} ({} species)",
        observations.len(),
        balanced.len(),
        species_count
    );

    balanced
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn dataset() -> Vec<Observation> {
        let mut observations = Vec::new();
        for i in 0..6 {
            observations.push(
                Observation::new(i)
                    .with_species(100, "Species A")
                    .with_quality_score(10.0 * i as f64),
            );
        }
        for i in 6..8 {
            observations.push(Observation::new(i).with_species(200, "Species B"));
        }
        observations.push(Observation::new(99));
        observations
    }

    fn counts(observations: &[Observation]) -> HashMap<i64, usize> {
        let mut counts = HashMap::new();
        for obs in observations {
            if let Some(id) = obs.species_id() {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        counts
    }

    #[test]
    fn test_undersampling_caps_at_target() {
        let balanced = balance_dataset(&dataset(), 3, true);
        let counts = counts(&balanced);

        assert_eq!(counts[&100], 3);
        assert_eq!(counts[&200], 2);
        assert_eq!(balanced.len(), 5);

        let kept: Vec<String> = balanced[..3].iter().map(|o| o.id.to_string()).collect();
        assert_eq!(kept, vec!["5", "4", "3"]);
    }

    #[test]
    fn test_without_undersampling_keeps_everything_identified() {
        let balanced = balance_dataset(&dataset(), 3, false);
        let counts = counts(&balanced);

        assert_eq!(counts[&100], 6);
        assert_eq!(counts[&200], 2);
        assert_eq!(balanced.len(), 8);
    }

    #[test]
    fn test_never_oversamples() {
        let balanced = balance_dataset(&dataset(), 50, true);
        assert_eq!(balanced.len(), 8);
    }

    #[test]
    fn test_empty_input() {
        assert!(balance_dataset(&[], 10, true).is_empty());
    }
}
