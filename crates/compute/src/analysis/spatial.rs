use std::collections::HashSet;
use std::str::FromStr;

use formats::export::choropleth_geojson;
use formats::{BoundarySet, OccurrenceTable};
use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{Coord, MultiPolygon};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::analysis::statistics::Statistics;
use crate::error::{SpatialJoinError, UnknownPredicate};

/// How a point is matched against a country polygon.
///
/// `Within` only matches points strictly inside, so a point on a shared
/// border belongs to no country. `Intersects` also matches points on the
/// boundary, so a border point belongs to every country touching it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPredicate {
    #[default]
    Within,
    Intersects,
}

impl JoinPredicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinPredicate::Within => "within",
            JoinPredicate::Intersects => "intersects",
        }
    }

    pub fn matches(&self, geometry: &MultiPolygon<f64>, coord: Coord<f64>) -> bool {
        // Per polygon: a multipolygon-wide position would cancel out points
        // lying on an edge shared by two of its parts.
        geometry.iter().any(|poly| {
            let pos = poly.coordinate_position(&coord);
            match self {
                JoinPredicate::Within => pos == CoordPos::Inside,
                JoinPredicate::Intersects => pos != CoordPos::Outside,
            }
        })
    }
}

impl FromStr for JoinPredicate {
    type Err = UnknownPredicate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "within" => Ok(JoinPredicate::Within),
            "intersects" => Ok(JoinPredicate::Intersects),
            _ => Err(UnknownPredicate(s.to_string())),
        }
    }
}

impl std::fmt::Display for JoinPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (occurrence, country) match, by index into the two inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPair {
    pub record: usize,
    pub country: usize,
}

fn ensure_same_crs(
    occurrences: &OccurrenceTable,
    boundaries: &BoundarySet,
) -> Result<(), SpatialJoinError> {
    if occurrences.crs() != &boundaries.crs {
        return Err(SpatialJoinError::CrsMismatch {
            occurrences: occurrences.crs().clone(),
            boundaries: boundaries.crs.clone(),
        });
    }
    Ok(())
}

/// Inner join of occurrence points against country polygons.
///
/// The reference systems are compared before any predicate is evaluated.
pub fn spatial_join(
    occurrences: &OccurrenceTable,
    boundaries: &BoundarySet,
    predicate: JoinPredicate,
) -> Result<Vec<JoinPair>, SpatialJoinError> {
    ensure_same_crs(occurrences, boundaries)?;

    let mut pairs = Vec::new();
    for (record, occ) in occurrences.records().iter().enumerate() {
        let coord = occ.point().0;
        for (country, boundary) in boundaries.countries.iter().enumerate() {
            let Some(bounds) = boundary.bounds else {
                continue;
            };
            if !bounds.contains_point(coord.x, coord.y) {
                continue;
            }
            if predicate.matches(&boundary.geometry, coord) {
                pairs.push(JoinPair { record, country });
            }
        }
    }

    debug!(
        "{predicate} join: {} pairs from {} points x {} countries",
        pairs.len(),
        occurrences.len(),
        boundaries.len()
    );
    Ok(pairs)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryRichness {
    pub country: String,
    pub species_count: usize,
}

/// Color-scale domain for a choropleth, never degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorDomain {
    pub min: f64,
    pub max: f64,
}

/// Distinct species per country, one row per boundary country in boundary order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Richness {
    pub predicate: JoinPredicate,
    pub rows: Vec<CountryRichness>,
    /// Occurrences that fell inside at least one country.
    pub matched_records: usize,
}

impl Richness {
    pub fn min(&self) -> Option<usize> {
        Statistics::min_max(self.rows.iter().map(|r| r.species_count)).map(|(min, _)| min)
    }

    pub fn max(&self) -> Option<usize> {
        Statistics::min_max(self.rows.iter().map(|r| r.species_count)).map(|(_, max)| max)
    }

    pub fn get(&self, country: &str) -> Option<usize> {
        self.rows
            .iter()
            .find(|r| r.country == country)
            .map(|r| r.species_count)
    }

    pub fn countries_with_presence(&self) -> usize {
        self.rows.iter().filter(|r| r.species_count > 0).count()
    }

    /// `[0, 1]` when every count is zero (or there are no countries),
    /// `[v - 0.5, v + 0.5]` when all counts equal `v`, else `[min, max]`.
    pub fn color_domain(&self) -> ColorDomain {
        match Statistics::min_max(self.rows.iter().map(|r| r.species_count as f64)) {
            None => ColorDomain { min: 0.0, max: 1.0 },
            Some((min, max)) if min == max && max == 0.0 => ColorDomain { min: 0.0, max: 1.0 },
            Some((min, max)) if min == max => ColorDomain {
                min: min - 0.5,
                max: max + 0.5,
            },
            Some((min, max)) => ColorDomain { min, max },
        }
    }

    /// Choropleth FeatureCollection; `boundaries` must be the set this was computed from.
    pub fn to_choropleth_geojson(&self, boundaries: &BoundarySet) -> Value {
        choropleth_geojson(
            boundaries
                .countries
                .iter()
                .zip(&self.rows)
                .map(|(country, row)| (country, row.species_count)),
        )
    }
}

/// Distinct species per country, left-merged onto every boundary country
/// with zero for countries without matches.
pub fn country_species_richness(
    occurrences: &OccurrenceTable,
    boundaries: &BoundarySet,
    predicate: JoinPredicate,
) -> Result<Richness, SpatialJoinError> {
    let pairs = spatial_join(occurrences, boundaries, predicate)?;

    let records = occurrences.records();
    let mut species_by_country: Vec<HashSet<&str>> = vec![HashSet::new(); boundaries.len()];
    let mut matched: HashSet<usize> = HashSet::new();
    for pair in &pairs {
        species_by_country[pair.country].insert(records[pair.record].species.as_str());
        matched.insert(pair.record);
    }

    let rows = boundaries
        .countries
        .iter()
        .zip(&species_by_country)
        .map(|(country, species)| CountryRichness {
            country: country.name.clone(),
            species_count: species.len(),
        })
        .collect();

    Ok(Richness {
        predicate,
        rows,
        matched_records: matched.len(),
    })
}

/// Number of countries holding at least one occurrence.
pub fn countries_with_presence(
    occurrences: &OccurrenceTable,
    boundaries: &BoundarySet,
    predicate: JoinPredicate,
) -> Result<usize, SpatialJoinError> {
    let pairs = spatial_join(occurrences, boundaries, predicate)?;
    let countries: HashSet<usize> = pairs.iter().map(|p| p.country).collect();
    Ok(countries.len())
}
