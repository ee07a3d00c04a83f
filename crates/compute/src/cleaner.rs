use formats::{ColumnNames, OccurrenceRecord, OccurrenceTable, RawTable, resolve};
use serde::Serialize;
use tracing::debug;

use crate::error::CleanError;

/// What happened to the rows of one cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub kept: usize,
    pub missing_species: usize,
    pub missing_coordinates: usize,
    /// Present but not a finite in-range number.
    pub invalid_coordinates: usize,
}

/// Cleans with the default GBIF column names.
pub fn clean(raw: &RawTable) -> Result<OccurrenceTable, CleanError> {
    clean_with(raw, &ColumnNames::default()).map(|(table, _)| table)
}

/// Drops rows lacking species or coordinates, renames the interpreted
/// columns to the display identifiers and attaches the point geometry.
///
/// Display names are always accepted as input names, so cleaning the
/// `to_raw()` of a cleaned table yields the same table.
pub fn clean_with(
    raw: &RawTable,
    names: &ColumnNames,
) -> Result<(OccurrenceTable, CleaningReport), CleanError> {
    let required = |candidates: &[String]| {
        resolve(&raw.columns, candidates)
            .ok_or_else(|| CleanError::MissingColumn(candidates.first().cloned().unwrap_or_default()))
    };
    let species_idx = required(names.species.as_slice())?;
    let lat_idx = required(names.latitude.as_slice())?;
    let lon_idx = required(names.longitude.as_slice())?;
    let sci_idx = resolve(&raw.columns, &names.scientific_name);

    let interpreted = [Some(species_idx), Some(lat_idx), Some(lon_idx), sci_idx];
    let extra_idx: Vec<usize> = (0..raw.columns.len())
        .filter(|i| !interpreted.contains(&Some(*i)))
        .collect();
    let extra_columns = extra_idx.iter().map(|&i| raw.columns[i].clone()).collect();

    let mut report = CleaningReport {
        input_rows: raw.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(raw.len());

    for row in &raw.rows {
        let cell = |i: usize| row.get(i).and_then(|c| c.as_deref());

        let Some(species) = cell(species_idx) else {
            report.missing_species += 1;
            continue;
        };
        let (Some(lat_text), Some(lon_text)) = (cell(lat_idx), cell(lon_idx)) else {
            report.missing_coordinates += 1;
            continue;
        };
        let (Some(lat), Some(lon)) = (
            parse_coordinate(lat_text, 90.0),
            parse_coordinate(lon_text, 180.0),
        ) else {
            report.invalid_coordinates += 1;
            continue;
        };

        let scientific_name = sci_idx.and_then(|i| cell(i)).map(str::to_string);
        let extra = extra_idx.iter().map(|&i| cell(i).map(str::to_string)).collect();
        records.push(OccurrenceRecord::new(species, scientific_name, lat, lon, extra));
    }

    report.kept = records.len();
    debug!(
        "cleaned {} of {} rows ({} missing species, {} missing coordinates, {} invalid coordinates)",
        report.kept,
        report.input_rows,
        report.missing_species,
        report.missing_coordinates,
        report.invalid_coordinates
    );
    Ok((OccurrenceTable::new(extra_columns, records), report))
}

fn parse_coordinate(text: &str, limit: f64) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= limit)
}
