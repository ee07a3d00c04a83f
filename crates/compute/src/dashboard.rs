use std::sync::Arc;

use formats::export::{occurrences_geojson, write_csv};
use formats::{
    BoundarySet, ColumnNames, DatasetConfig, OccurrenceTable, RawTable, load_boundaries,
    load_occurrences,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::spatial::{ColorDomain, JoinPredicate, Richness, country_species_richness};
use crate::analysis::species::{SpeciesCount, species_options, top_species};
use crate::cleaner::{CleaningReport, clean_with};
use crate::error::{DatasetError, SpatialJoinError};
use crate::filter::SpeciesFilter;
use crate::metrics::{CoordinateQuality, SummaryMetrics, summarize};
use crate::records::{RecordPage, record_page};

pub const DEFAULT_TOP_N: usize = 10;
pub const EMPTY_SELECTION_MESSAGE: &str = "No records match the selected species.";

/// Loaded, cleaned data shared read-only by every query.
///
/// Built once at startup; a restart is the only way to pick up new files.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub quality: CoordinateQuality,
    pub cleaning: CleaningReport,
    pub occurrences: Arc<OccurrenceTable>,
    pub boundaries: Arc<BoundarySet>,
    /// blake3 of the occurrence file, when it came from disk.
    pub fingerprint: Option<String>,
    species: Vec<String>,
}

impl Dataset {
    pub fn load(config: &DatasetConfig) -> Result<Self, DatasetError> {
        let raw = load_occurrences(&config.occurrences_path, &config.occurrence)?;
        let boundaries = load_boundaries(&config.countries_path, &config.boundary)?;
        let dataset = Self::from_parts(&raw, &config.occurrence.columns, boundaries)?;
        info!(
            "dataset ready: {} of {} rows kept, {} countries, fingerprint {}",
            dataset.cleaning.kept,
            dataset.cleaning.input_rows,
            dataset.boundaries.len(),
            dataset.fingerprint.as_deref().unwrap_or("-")
        );
        Ok(dataset)
    }

    pub fn from_parts(
        raw: &RawTable,
        columns: &ColumnNames,
        boundaries: BoundarySet,
    ) -> Result<Self, DatasetError> {
        let quality = CoordinateQuality::of(raw, columns);
        let (occurrences, cleaning) = clean_with(raw, columns)?;
        if cleaning.invalid_coordinates > 0 {
            warn!(
                "{} rows dropped for unparseable or out-of-range coordinates",
                cleaning.invalid_coordinates
            );
        }
        let species = species_options(&occurrences);
        Ok(Self {
            quality,
            cleaning,
            occurrences: Arc::new(occurrences),
            boundaries: Arc::new(boundaries),
            fingerprint: raw.fingerprint.clone(),
            species,
        })
    }

    /// Sorted distinct species of the whole cleaned table.
    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn filtered(&self, filter: &SpeciesFilter) -> OccurrenceTable {
        filter.apply(&self.occurrences)
    }

    pub fn richness(
        &self,
        filter: &SpeciesFilter,
        predicate: JoinPredicate,
    ) -> Result<Richness, SpatialJoinError> {
        country_species_richness(&self.filtered(filter), &self.boundaries, predicate)
    }

    pub fn choropleth(
        &self,
        filter: &SpeciesFilter,
        predicate: JoinPredicate,
    ) -> Result<Value, SpatialJoinError> {
        Ok(self
            .richness(filter, predicate)?
            .to_choropleth_geojson(&self.boundaries))
    }

    pub fn top_species(&self, filter: &SpeciesFilter, n: usize) -> Vec<SpeciesCount> {
        top_species(&self.filtered(filter), n)
    }

    pub fn records(&self, filter: &SpeciesFilter, limit: usize) -> RecordPage {
        record_page(&self.filtered(filter), limit)
    }

    pub fn export_csv(&self, filter: &SpeciesFilter) -> Result<Vec<u8>, csv::Error> {
        let mut out = Vec::new();
        write_csv(&self.filtered(filter), &mut out, b',')?;
        Ok(out)
    }

    pub fn export_geojson(&self, filter: &SpeciesFilter) -> Value {
        occurrences_geojson(&self.filtered(filter))
    }

    /// Empty when the filter keeps no cleaned record.
    pub fn status(&self, filter: &SpeciesFilter) -> ViewStatus {
        let any = self
            .occurrences
            .records()
            .iter()
            .any(|r| filter.allows(&r.species));
        if any { ViewStatus::Ready } else { ViewStatus::Empty }
    }

    /// Everything one dashboard view shows, computed from a single filter pass.
    pub fn dashboard(&self, query: &DashboardQuery) -> Result<DashboardOutcome, SpatialJoinError> {
        let filtered = self.filtered(&query.species);
        if filtered.is_empty() {
            return Ok(DashboardOutcome::Empty {
                message: EMPTY_SELECTION_MESSAGE.to_string(),
            });
        }

        let richness = country_species_richness(&filtered, &self.boundaries, query.predicate)?;
        let color_domain = richness.color_domain();
        Ok(DashboardOutcome::Ready(DashboardReport {
            metrics: summarize(&filtered, &richness, self.quality),
            top_species: top_species(&filtered, query.top_n),
            richness,
            color_domain,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardQuery {
    pub species: SpeciesFilter,
    pub top_n: usize,
    pub predicate: JoinPredicate,
}

impl Default for DashboardQuery {
    fn default() -> Self {
        Self {
            species: SpeciesFilter::all(),
            top_n: DEFAULT_TOP_N,
            predicate: JoinPredicate::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub metrics: SummaryMetrics,
    pub top_species: Vec<SpeciesCount>,
    pub richness: Richness,
    pub color_domain: ColorDomain,
}

/// An empty selection is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DashboardOutcome {
    Empty { message: String },
    Ready(DashboardReport),
}

/// Status marker for the single-purpose views (richness, top species).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Empty,
    Ready,
}

impl ViewStatus {
    pub fn message(self) -> Option<&'static str> {
        match self {
            ViewStatus::Empty => Some(EMPTY_SELECTION_MESSAGE),
            ViewStatus::Ready => None,
        }
    }
}
