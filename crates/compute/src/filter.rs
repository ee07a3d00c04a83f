use std::collections::BTreeSet;

use formats::OccurrenceTable;

/// Species allowlist. An empty selection means "no filter", never "match nothing".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeciesFilter {
    selected: BTreeSet<String>,
}

impl SpeciesFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<I, S>(species: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        species.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    pub fn allows(&self, species: &str) -> bool {
        self.selected.is_empty() || self.selected.contains(species)
    }

    /// Order-preserving subset of `table`.
    pub fn apply(&self, table: &OccurrenceTable) -> OccurrenceTable {
        if self.is_empty() {
            return table.clone();
        }
        table.with_records(
            table
                .records()
                .iter()
                .filter(|r| self.selected.contains(&r.species))
                .cloned()
                .collect(),
        )
    }
}

impl<S: Into<String>> FromIterator<S> for SpeciesFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            selected: iter
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.trim().is_empty())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use formats::{OccurrenceRecord, OccurrenceTable};
    use pretty_assertions::assert_eq;

    use super::SpeciesFilter;

    fn table() -> OccurrenceTable {
        OccurrenceTable::new(
            Vec::new(),
            ["A", "B", "A", "C", "B"]
                .iter()
                .enumerate()
                .map(|(i, sp)| OccurrenceRecord::new(*sp, None, i as f64, 0.0, Vec::new()))
                .collect(),
        )
    }

    #[test]
    fn empty_selection_returns_input_unchanged() {
        let t = table();
        assert_eq!(SpeciesFilter::all().apply(&t), t);
        assert_eq!(SpeciesFilter::new(["", "  "]).apply(&t), t);
    }

    #[test]
    fn selection_keeps_only_selected_in_order() {
        let t = table();
        let out = SpeciesFilter::new(["B", "C"]).apply(&t);
        assert!(out.len() <= t.len());
        let got: Vec<(&str, f64)> = out
            .records()
            .iter()
            .map(|r| (r.species.as_str(), r.latitude()))
            .collect();
        assert_eq!(got, vec![("B", 1.0), ("C", 3.0), ("B", 4.0)]);
    }

    #[test]
    fn unknown_species_matches_nothing() {
        let out = SpeciesFilter::new(["Z"]).apply(&table());
        assert!(out.is_empty());
        assert_eq!(out.crs(), table().crs());
    }

    #[test]
    fn allows_everything_when_empty() {
        assert!(SpeciesFilter::all().allows("anything"));
        let f = SpeciesFilter::new(["A"]);
        assert!(f.allows("A"));
        assert!(!f.allows("B"));
        assert_eq!(f.selected().collect::<Vec<_>>(), vec!["A"]);
    }
}
