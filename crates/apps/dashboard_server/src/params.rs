use std::ops::RangeInclusive;

use compute::{DashboardQuery, JoinPredicate, SpeciesFilter, UnknownPredicate, DEFAULT_TOP_N};
use serde::Deserialize;

pub const TOP_N_RANGE: RangeInclusive<usize> = 5..=20;
pub const LIMIT_RANGE: RangeInclusive<usize> = 10..=1000;
pub const DEFAULT_LIMIT: usize = 100;

/// Query string shared by every `/api` view.
#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    /// Comma-separated species names; absent or blank means all species.
    pub species: Option<String>,
    pub top_n: Option<usize>,
    pub limit: Option<usize>,
    pub predicate: Option<String>,
}

impl ViewParams {
    pub fn species_filter(&self) -> SpeciesFilter {
        self.species
            .as_deref()
            .map(|list| list.split(',').map(str::trim).collect())
            .unwrap_or_default()
    }

    pub fn top_n(&self) -> usize {
        clamp(self.top_n, DEFAULT_TOP_N, TOP_N_RANGE)
    }

    pub fn limit(&self) -> usize {
        clamp(self.limit, DEFAULT_LIMIT, LIMIT_RANGE)
    }

    /// A request may override the server default predicate.
    pub fn predicate(&self, default: JoinPredicate) -> Result<JoinPredicate, UnknownPredicate> {
        match self.predicate.as_deref() {
            None | Some("") => Ok(default),
            Some(name) => name.parse(),
        }
    }

    pub fn dashboard_query(&self, default: JoinPredicate) -> Result<DashboardQuery, UnknownPredicate> {
        Ok(DashboardQuery {
            species: self.species_filter(),
            top_n: self.top_n(),
            predicate: self.predicate(default)?,
        })
    }
}

fn clamp(value: Option<usize>, default: usize, range: RangeInclusive<usize>) -> usize {
    value
        .unwrap_or(default)
        .clamp(*range.start(), *range.end())
}
