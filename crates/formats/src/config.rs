use std::env;
use std::path::PathBuf;

use foundation::Crs;

use crate::boundary::BoundaryOptions;
use crate::occurrence::{ColumnNames, OccurrenceSource};

pub const DEFAULT_OCCURRENCE_PATH: &str = "data/occurrence.tsv";
pub const DEFAULT_COUNTRIES_PATH: &str = "data/countries.geojson";

/// Where the two input files live and how to read them.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub occurrences_path: PathBuf,
    pub countries_path: PathBuf,
    pub occurrence: OccurrenceSource,
    pub boundary: BoundaryOptions,
}

impl DatasetConfig {
    pub fn new(occurrences_path: impl Into<PathBuf>, countries_path: impl Into<PathBuf>) -> Self {
        Self {
            occurrences_path: occurrences_path.into(),
            countries_path: countries_path.into(),
            occurrence: OccurrenceSource::default(),
            boundary: BoundaryOptions::default(),
        }
    }

    /// Reads `OCCURRENCE_PATH`, `COUNTRIES_PATH`, `OCCURRENCE_LIMIT`,
    /// `OCCURRENCE_SPECIES_COLUMN`, `OCCURRENCE_LAT_COLUMN`,
    /// `OCCURRENCE_LON_COLUMN`, `COUNTRY_NAME_FIELD` and `COUNTRIES_CRS`.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::new(
            var("OCCURRENCE_PATH").unwrap_or_else(|| DEFAULT_OCCURRENCE_PATH.to_string()),
            var("COUNTRIES_PATH").unwrap_or_else(|| DEFAULT_COUNTRIES_PATH.to_string()),
        );

        cfg.occurrence.limit = var("OCCURRENCE_LIMIT").and_then(|v| v.parse().ok());
        let defaults = ColumnNames::default();
        let species = var("OCCURRENCE_SPECIES_COLUMN").unwrap_or_else(|| defaults.species[0].clone());
        let lat = var("OCCURRENCE_LAT_COLUMN").unwrap_or_else(|| defaults.latitude[0].clone());
        let lon = var("OCCURRENCE_LON_COLUMN").unwrap_or_else(|| defaults.longitude[0].clone());
        cfg.occurrence.columns = ColumnNames::with_primary(&species, &lat, &lon);

        if let Some(field) = var("COUNTRY_NAME_FIELD") {
            cfg.boundary.name_field = field;
        }
        cfg.boundary.crs_override = var("COUNTRIES_CRS").map(|v| Crs::parse(&v));
        cfg
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use foundation::Crs;

    use super::{DEFAULT_COUNTRIES_PATH, DatasetConfig};

    #[test]
    fn defaults_when_unset() {
        let cfg = DatasetConfig::from_vars(|_| None);
        assert_eq!(cfg.countries_path.to_str(), Some(DEFAULT_COUNTRIES_PATH));
        assert_eq!(cfg.occurrence.limit, None);
        assert_eq!(cfg.occurrence.columns.species[0], "species");
        assert_eq!(cfg.boundary.name_field, "ADMIN");
        assert!(cfg.boundary.crs_override.is_none());
    }

    #[test]
    fn vars_override_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OCCURRENCE_PATH", "/srv/croc.tsv"),
            ("OCCURRENCE_LIMIT", "500"),
            ("OCCURRENCE_LAT_COLUMN", "lat"),
            ("COUNTRY_NAME_FIELD", "NAME_EN"),
            ("COUNTRIES_CRS", "EPSG:3857"),
        ]);
        let cfg = DatasetConfig::from_vars(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.occurrences_path.to_str(), Some("/srv/croc.tsv"));
        assert_eq!(cfg.occurrence.limit, Some(500));
        assert_eq!(cfg.occurrence.columns.latitude, vec!["lat", "Latitude"]);
        assert_eq!(cfg.boundary.name_field, "NAME_EN");
        assert_eq!(cfg.boundary.crs_override, Some(Crs::WebMercator));
    }
}
