//! Species partitioning shared by every curation stage.

use std::collections::HashMap;

use super::types::Observation;

/// The observations of one species, in input order.
#[derive(Debug, Clone)]
pub struct SpeciesPartition<'a> {
    /// Taxon id shared by every member.
    pub species_id: i64,
    /// Name taken from the first member.
    pub species_name: String,
    /// Members in the order they appeared in the input.
    pub members: Vec<&'a Observation>,
}

impl SpeciesPartition<'_> {
    /// Number of observations in the partition.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the partition has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Groups observations by species id.
///
/// Partitions are returned in order of first appearance so every downstream
/// stage is deterministic for a given input order. Observations without a
/// species id are left out.
pub fn partition_by_species(observations: &[Observation]) -> Vec<SpeciesPartition<'_>> {
    let mut slots: HashMap<i64, usize> = HashMap::new();
    let mut partitions: Vec<SpeciesPartition<'_>> = Vec::new();

    for observation in observations {
        let Some(species_id) = observation.species_id() else {
            continue;
        };

        let slot = *slots.entry(species_id).or_insert_with(|| {
            partitions.push(SpeciesPartition {
                species_id,
                species_name: observation.species_name().to_string(),
                members: Vec::new(),
            });
            partitions.len() - 1
        });
        partitions[slot].members.push(observation);
    }

    partitions
}
