use std::collections::{BTreeSet, HashMap, HashSet};

use formats::OccurrenceTable;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesCount {
    pub species: String,
    pub occurrences: usize,
}

/// The `n` most recorded species, most records first.
///
/// Ties keep first-seen order. Returns `min(n, distinct species)` rows.
pub fn top_species(occurrences: &OccurrenceTable, n: usize) -> Vec<SpeciesCount> {
    if n == 0 {
        return Vec::new();
    }

    let mut counts: Vec<SpeciesCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for record in occurrences.records() {
        match index.get(record.species.as_str()).copied() {
            Some(i) => counts[i].occurrences += 1,
            None => {
                index.insert(record.species.as_str(), counts.len());
                counts.push(SpeciesCount {
                    species: record.species.clone(),
                    occurrences: 1,
                });
            }
        }
    }

    // `sort_by` is stable, which gives the first-seen tie-break.
    counts.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
    counts.truncate(n);
    counts
}

/// Sorted distinct species names.
pub fn species_options(occurrences: &OccurrenceTable) -> Vec<String> {
    occurrences
        .records()
        .iter()
        .map(|r| r.species.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn distinct_species(occurrences: &OccurrenceTable) -> usize {
    occurrences
        .records()
        .iter()
        .map(|r| r.species.as_str())
        .collect::<HashSet<_>>()
        .len()
}
