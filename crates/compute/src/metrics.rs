use formats::{ColumnNames, OccurrenceTable, RawTable, resolve};
use serde::Serialize;

use crate::analysis::spatial::Richness;
use crate::analysis::species::distinct_species;
use crate::analysis::statistics::Statistics;

/// Share of raw rows that carried both coordinates, measured before cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinateQuality {
    pub raw_rows: usize,
    pub with_coordinates: usize,
}

impl CoordinateQuality {
    pub fn of(raw: &RawTable, names: &ColumnNames) -> Self {
        let with_coordinates = match (
            resolve(&raw.columns, &names.latitude),
            resolve(&raw.columns, &names.longitude),
        ) {
            (Some(lat), Some(lon)) => raw.count_present(&[lat, lon]),
            _ => 0,
        };
        Self {
            raw_rows: raw.len(),
            with_coordinates,
        }
    }

    /// Percentage in [0, 100]; 0 for an empty source.
    pub fn percent(&self) -> f64 {
        if self.raw_rows == 0 {
            return 0.0;
        }
        self.with_coordinates as f64 / self.raw_rows as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapCenter {
    pub latitude: f64,
    pub longitude: f64,
}

/// Mean position of the records, the natural centre for a point map.
pub fn map_center(occurrences: &OccurrenceTable) -> Option<MapCenter> {
    let records = occurrences.records();
    Some(MapCenter {
        latitude: Statistics::mean(records.iter().map(|r| r.latitude()))?,
        longitude: Statistics::mean(records.iter().map(|r| r.longitude()))?,
    })
}

/// Headline numbers for one filtered view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total_records: usize,
    pub unique_species: usize,
    pub countries_with_presence: usize,
    pub coordinate_quality_pct: f64,
    pub center: Option<MapCenter>,
}

pub fn summarize(
    filtered: &OccurrenceTable,
    richness: &Richness,
    quality: CoordinateQuality,
) -> SummaryMetrics {
    SummaryMetrics {
        total_records: filtered.len(),
        unique_species: distinct_species(filtered),
        countries_with_presence: richness.countries_with_presence(),
        coordinate_quality_pct: quality.percent(),
        center: map_center(filtered),
    }
}
