//! # Survey Aggregates
//!
//! Pure functions over tidy observations. [`engine::AggregationEngine`]
//! fetches the current rows from the repository and delegates here, so every
//! aggregate can be tested without a store.
//!
//! Undefined results (no rows, zero denominators) are `None` or empty
//! collections, never panics.

pub mod distribution;
pub mod engine;

use crate::config::TrendPoint;
use crate::survey::Attribute;
use crate::survey::Gender;
use crate::survey::Method;
use crate::survey::ObservationByMethod;
use crate::survey::ObservationBySite;
use serde::Serialize;

/// Inclusive bounds for [`count_in_range`]; `None` leaves a side open.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RangeFilter {
    pub length_min: Option<f64>,
    pub length_max: Option<f64>,
    pub weight_min: Option<f64>,
    pub weight_max: Option<f64>,
}

impl RangeFilter {
    fn contains(&self, observation: &ObservationBySite) -> bool {
        within(observation.length, self.length_min, self.length_max)
            && within(observation.weight, self.weight_min, self.weight_max)
    }
}

fn within(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

/// Female and male counts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SexCounts {
    pub female: usize,
    pub male: usize,
}

impl SexCounts {
    pub fn total(&self) -> usize {
        self.female + self.male
    }

    pub fn get(&self, gender: Gender) -> usize {
        match gender {
            Gender::Female => self.female,
            Gender::Male => self.male,
        }
    }
}

/// Female and male means; `None` marks a sex with no observations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct SexMeans {
    pub female: Option<f64>,
    pub male: Option<f64>,
}

/// Observation count of one trend point.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrendCount {
    pub year: i32,
    pub site: String,
    pub count: usize,
}

/// Rounds to two decimals, as means are shown.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Counts by-site rows at `site` inside `range` whose gender is in `sexes`.
pub fn count_in_range(rows: &[ObservationBySite], site: &str, range: &RangeFilter, sexes: &[Gender]) -> usize {
    rows.iter()
        .filter(|row| row.site == site && sexes.contains(&row.gender) && range.contains(row))
        .count()
}

/// Global (min, max) of an attribute as the min of per-site minimums and the
/// max of per-site maximums. `None` for an empty table.
pub fn bounds(rows: &[ObservationBySite], attribute: Attribute) -> Option<(f64, f64)> {
    let mut per_site: Vec<(&str, f64, f64)> = Vec::new();
    for row in rows {
        let value = row.value(attribute);
        match per_site.iter_mut().find(|(site, _, _)| *site == row.site) {
            Some((_, min, max)) => {
                *min = min.min(value);
                *max = max.max(value);
            }
            None => per_site.push((row.site.as_str(), value, value)),
        }
    }
    per_site.into_iter().fold(None, |bounds, (_, min, max)| match bounds {
        None => Some((min, max)),
        Some((low, high)) => Some((f64::min(low, min), f64::max(high, max))),
    })
}

/// Female and male counts at a site, across all methods.
pub fn sex_counts(rows: &[ObservationByMethod], site: &str) -> SexCounts {
    rows.iter()
        .filter(|row| row.site == site)
        .fold(SexCounts::default(), |mut counts, row| {
            match row.gender {
                Gender::Female => counts.female += 1,
                Gender::Male => counts.male += 1,
            }
            counts
        })
}

/// Mean length per sex at a site, across all methods, rounded to two decimals.
pub fn mean_length_by_sex(rows: &[ObservationByMethod], site: &str) -> SexMeans {
    let at_site = || rows.iter().filter(|row| row.site == site);
    let of = |gender: Gender| mean(at_site().filter(|row| row.gender == gender).map(|row| row.length)).map(round2);
    SexMeans {
        female: of(Gender::Female),
        male: of(Gender::Male),
    }
}

/// Row count per method at a site, every method listed.
pub fn method_counts(rows: &[ObservationByMethod], site: &str) -> Vec<(Method, usize)> {
    Method::ALL
        .into_iter()
        .map(|method| {
            let count = rows.iter().filter(|row| row.site == site && row.method == method).count();
            (method, count)
        })
        .collect()
}

/// Mean length per method at a site, rounded to two decimals.
pub fn method_mean_lengths(rows: &[ObservationByMethod], site: &str) -> Vec<(Method, Option<f64>)> {
    Method::ALL
        .into_iter()
        .map(|method| {
            let lengths = rows
                .iter()
                .filter(|row| row.site == site && row.method == method)
                .map(|row| row.length);
            (method, mean(lengths).map(round2))
        })
        .collect()
}

/// Mean weight per site in order of first appearance, rounded to two decimals.
pub fn mean_weight_by_site(rows: &[ObservationBySite]) -> Vec<(String, f64)> {
    sites(rows)
        .into_iter()
        .filter_map(|site| {
            let weights = rows.iter().filter(|row| row.site == site).map(|row| row.weight);
            mean(weights).map(|weight| (site, round2(weight)))
        })
        .collect()
}

/// Distinct sites in order of first appearance.
pub fn sites(rows: &[ObservationBySite]) -> Vec<String> {
    let mut sites: Vec<String> = Vec::new();
    for row in rows {
        if !sites.contains(&row.site) {
            sites.push(row.site.to_owned());
        }
    }
    sites
}

/// Values of `attribute` at `site` for the selected sexes.
pub fn attribute_values(rows: &[ObservationBySite], site: &str, attribute: Attribute, sexes: &[Gender]) -> Vec<f64> {
    rows.iter()
        .filter(|row| row.site == site && sexes.contains(&row.gender))
        .map(|row| row.value(attribute))
        .collect()
}

/// By-method counts at each trend point for the selected sexes. The
/// selection is a set: `{M}`, `{F}` or `{M, F}`; an empty selection gives an
/// empty series.
pub fn population_trend(rows: &[ObservationByMethod], points: &[TrendPoint], sexes: &[Gender]) -> Vec<TrendCount> {
    if sexes.is_empty() {
        return Vec::new();
    }
    points
        .iter()
        .map(|point| TrendCount {
            year: point.year,
            site: point.site.to_owned(),
            count: rows
                .iter()
                .filter(|row| row.site == point.site && sexes.contains(&row.gender))
                .count(),
        })
        .collect()
}
