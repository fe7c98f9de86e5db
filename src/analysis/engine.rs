use crate::analysis;
use crate::analysis::distribution;
use crate::analysis::distribution::DistributionSeries;
use crate::analysis::distribution::NormalFit;
use crate::analysis::RangeFilter;
use crate::analysis::SexCounts;
use crate::analysis::SexMeans;
use crate::analysis::TrendCount;
use crate::config::SurveyConfig;
use crate::config::TrendPoint;
use crate::database::Repository;
use crate::error::SurveyError;
use crate::survey::Attribute;
use crate::survey::Gender;
use crate::survey::Method;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::RwLock;
use tracing::debug;

/// Length and weight bounds used when a range query leaves a side open.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DefaultBounds {
    pub length: Option<(f64, f64)>,
    pub weight: Option<(f64, f64)>,
}

/// Optional bounds and sex selection of a [`AggregationEngine::count_in_range`] query.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeQuery {
    pub length_min: Option<f64>,
    pub length_max: Option<f64>,
    pub weight_min: Option<f64>,
    pub weight_max: Option<f64>,
    pub sexes: Vec<Gender>,
}

impl Default for RangeQuery {
    fn default() -> Self {
        Self {
            length_min: None,
            length_max: None,
            weight_min: None,
            weight_max: None,
            sexes: Gender::ALL.to_vec(),
        }
    }
}

/// Read-only aggregate queries over the current repository contents.
///
/// Every query reads the tables afresh. Only the default range bounds are
/// cached: they are computed when the engine is built and again on
/// [`AggregationEngine::refresh_bounds`].
pub struct AggregationEngine {
    repository: Arc<Repository>,
    defaults: RwLock<DefaultBounds>,
    sample_size: usize,
    trend: Vec<TrendPoint>,
    rng: Mutex<StdRng>,
}

impl AggregationEngine {
    pub fn new(repository: Arc<Repository>, config: &SurveyConfig) -> Result<AggregationEngine, SurveyError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let engine = AggregationEngine {
            repository,
            defaults: RwLock::new(DefaultBounds::default()),
            sample_size: config.sample_size,
            trend: config.trend.clone(),
            rng: Mutex::new(rng),
        };
        engine.refresh_bounds()?;
        Ok(engine)
    }

    /// Recomputes the cached default bounds from the by-site table.
    pub fn refresh_bounds(&self) -> Result<DefaultBounds, SurveyError> {
        let bounds = DefaultBounds {
            length: self.bounds(Attribute::Length)?,
            weight: self.bounds(Attribute::Weight)?,
        };
        *self.defaults.write().unwrap_or_else(PoisonError::into_inner) = bounds;
        debug!(?bounds, "refreshed default bounds");
        Ok(bounds)
    }

    /// The bounds that fill open sides of range queries.
    pub fn default_bounds(&self) -> DefaultBounds {
        *self.defaults.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts by-site rows at `site` within the inclusive bounds of `query`.
    /// Open bounds take the cached dataset-wide minimum or maximum.
    pub fn count_in_range(&self, site: &str, query: &RangeQuery) -> Result<usize, SurveyError> {
        let rows = self.repository.observations_by_site(Some(site))?;
        let range = self.resolve(query);
        Ok(analysis::count_in_range(&rows, site, &range, &query.sexes))
    }

    /// [`count_in_range`](Self::count_in_range) for every site, in site order.
    pub fn counts_by_site(&self, query: &RangeQuery) -> Result<Vec<(String, usize)>, SurveyError> {
        let rows = self.repository.observations_by_site(None)?;
        let range = self.resolve(query);
        Ok(analysis::sites(&rows)
            .into_iter()
            .map(|site| {
                let count = analysis::count_in_range(&rows, &site, &range, &query.sexes);
                (site, count)
            })
            .collect())
    }

    fn resolve(&self, query: &RangeQuery) -> RangeFilter {
        let defaults = self.default_bounds();
        RangeFilter {
            length_min: query.length_min.or(defaults.length.map(|(min, _)| min)),
            length_max: query.length_max.or(defaults.length.map(|(_, max)| max)),
            weight_min: query.weight_min.or(defaults.weight.map(|(min, _)| min)),
            weight_max: query.weight_max.or(defaults.weight.map(|(_, max)| max)),
        }
    }

    /// Current (min, max) of an attribute over the by-site table; `None`
    /// when the table is empty.
    pub fn bounds(&self, attribute: Attribute) -> Result<Option<(f64, f64)>, SurveyError> {
        let rows = self.repository.observations_by_site(None)?;
        Ok(analysis::bounds(&rows, attribute))
    }

    /// Sites of the by-site table in order of first appearance.
    pub fn sites(&self) -> Result<Vec<String>, SurveyError> {
        let rows = self.repository.observations_by_site(None)?;
        Ok(analysis::sites(&rows))
    }

    pub fn sex_counts(&self, site: &str) -> Result<SexCounts, SurveyError> {
        let rows = self.repository.observations_by_method(Some(site))?;
        Ok(analysis::sex_counts(&rows, site))
    }

    pub fn mean_length_by_sex(&self, site: &str) -> Result<SexMeans, SurveyError> {
        let rows = self.repository.observations_by_method(Some(site))?;
        Ok(analysis::mean_length_by_sex(&rows, site))
    }

    pub fn method_counts(&self, site: &str) -> Result<Vec<(Method, usize)>, SurveyError> {
        let rows = self.repository.observations_by_method(Some(site))?;
        Ok(analysis::method_counts(&rows, site))
    }

    pub fn method_mean_lengths(&self, site: &str) -> Result<Vec<(Method, Option<f64>)>, SurveyError> {
        let rows = self.repository.observations_by_method(Some(site))?;
        Ok(analysis::method_mean_lengths(&rows, site))
    }

    pub fn mean_weight_by_site(&self) -> Result<Vec<(String, f64)>, SurveyError> {
        let rows = self.repository.observations_by_site(None)?;
        Ok(analysis::mean_weight_by_site(&rows))
    }

    /// Evaluates the dashboard density curve; see [`distribution::normal_density`].
    pub fn normal_density(&self, xs: &[f64], mean: f64, std_dev: f64) -> Vec<f64> {
        distribution::normal_density(xs, mean, std_dev)
    }

    /// Fits a normal to `attribute` at `site` for the selected sexes.
    pub fn fit_normal(&self, site: &str, attribute: Attribute, sexes: &[Gender]) -> Result<NormalFit, SurveyError> {
        let rows = self.repository.observations_by_site(Some(site))?;
        distribution::fit_normal(&analysis::attribute_values(&rows, site, attribute, sexes))
    }

    /// Samples the fitted distribution with the engine's generator. `n`
    /// defaults to the configured sample size.
    pub fn sample_distribution(
        &self,
        site: &str,
        attribute: Attribute,
        sexes: &[Gender],
        n: Option<usize>,
    ) -> Result<DistributionSeries, SurveyError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.sample_distribution_with(site, attribute, sexes, n, &mut *rng)
    }

    /// Samples the fitted distribution with a caller supplied generator.
    pub fn sample_distribution_with<R: Rng + ?Sized>(
        &self,
        site: &str,
        attribute: Attribute,
        sexes: &[Gender],
        n: Option<usize>,
        rng: &mut R,
    ) -> Result<DistributionSeries, SurveyError> {
        let rows = self.repository.observations_by_site(Some(site))?;
        let values = analysis::attribute_values(&rows, site, attribute, sexes);
        let series = distribution::sample_distribution(&values, n.unwrap_or(self.sample_size), rng);
        debug!(site, attribute = attribute.column(), values = values.len(), samples = series.len(), "sampled distribution");
        Ok(series)
    }

    /// One sampled series per site, in the order given.
    pub fn sample_distributions<R: Rng + ?Sized>(
        &self,
        sites: &[&str],
        attribute: Attribute,
        sexes: &[Gender],
        n: Option<usize>,
        rng: &mut R,
    ) -> Result<Vec<(String, DistributionSeries)>, SurveyError> {
        sites
            .iter()
            .map(|site| {
                let series = self.sample_distribution_with(site, attribute, sexes, n, rng)?;
                Ok((site.to_string(), series))
            })
            .collect()
    }

    /// Counts at the configured trend points for the selected sexes.
    pub fn population_trend(&self, sexes: &[Gender]) -> Result<Vec<TrendCount>, SurveyError> {
        if sexes.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.repository.observations_by_method(None)?;
        Ok(analysis::population_trend(&rows, &self.trend, sexes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Table;
    use crate::survey::ObservationByMethod;
    use crate::survey::ObservationBySite;

    fn config() -> SurveyConfig {
        SurveyConfig {
            seed: Some(11),
            ..SurveyConfig::default()
        }
    }

    fn site_rows(site: &str, lengths: &[f64]) -> Vec<ObservationBySite> {
        let genders = [Gender::Male, Gender::Male, Gender::Female];
        lengths
            .iter()
            .zip(genders.iter().cycle())
            .map(|(length, gender)| ObservationBySite {
                site: site.to_owned(),
                gender: *gender,
                length: *length,
                weight: *length * 2.0,
            })
            .collect()
    }

    fn method_rows(site: &str, rows: &[(Method, Gender, f64)]) -> Vec<ObservationByMethod> {
        rows.iter()
            .map(|(method, gender, length)| ObservationByMethod {
                site: site.to_owned(),
                method: *method,
                gender: *gender,
                length: *length,
            })
            .collect()
    }

    fn engine(by_method: &[ObservationByMethod], by_site: &[ObservationBySite]) -> AggregationEngine {
        let repository = Arc::new(Repository::open_in_memory().unwrap());
        repository.replace_dataset(by_method, by_site).unwrap();
        AggregationEngine::new(repository, &config()).unwrap()
    }

    #[test]
    fn two_site_range_scenario() {
        let mut by_site = site_rows("S1", &[10.0, 10.0, 10.0]);
        by_site.extend(site_rows("S2", &[20.0, 20.0, 20.0]));
        let engine = engine(&[], &by_site);
        let query = RangeQuery {
            length_min: Some(5.0),
            length_max: Some(15.0),
            weight_min: Some(0.0),
            weight_max: Some(1000.0),
            sexes: vec![Gender::Male, Gender::Female],
        };
        assert_eq!(engine.count_in_range("S1", &query).unwrap(), 3);
        assert_eq!(engine.count_in_range("S2", &query).unwrap(), 0);
        assert_eq!(engine.bounds(Attribute::Length).unwrap(), Some((10.0, 20.0)));
    }

    #[test]
    fn open_bounds_use_cached_defaults() {
        let by_site = site_rows("S1", &[10.0, 12.0, 14.0]);
        let engine = engine(&[], &by_site);
        assert_eq!(
            engine.default_bounds(),
            DefaultBounds {
                length: Some((10.0, 14.0)),
                weight: Some((20.0, 28.0)),
            }
        );
        let all = RangeQuery::default();
        assert_eq!(engine.count_in_range("S1", &all).unwrap(), 3);

        // rows outside the cached bounds are not counted until a refresh
        engine
            .repository
            .insert(Table::BySite, &[("site", "S1"), ("gender", "F"), ("length", "30"), ("weight", "60")])
            .unwrap();
        assert_eq!(engine.count_in_range("S1", &all).unwrap(), 3);
        engine.refresh_bounds().unwrap();
        assert_eq!(engine.count_in_range("S1", &all).unwrap(), 4);

        let males = RangeQuery {
            length_max: Some(12.0),
            sexes: vec![Gender::Male],
            ..RangeQuery::default()
        };
        assert_eq!(engine.count_in_range("S1", &males).unwrap(), 2);
        assert_eq!(engine.counts_by_site(&males).unwrap(), vec![("S1".to_owned(), 2)]);
    }

    #[test]
    fn method_table_aggregates() {
        let by_method = method_rows(
            "DGB2016",
            &[
                (Method::Drawdown, Gender::Male, 40.0),
                (Method::Trapping, Gender::Male, 44.0),
                (Method::Handsearch, Gender::Male, 45.0),
            ],
        );
        let engine = engine(&by_method, &[]);
        assert_eq!(engine.sex_counts("DGB2016").unwrap(), SexCounts { female: 0, male: 3 });
        let means = engine.mean_length_by_sex("DGB2016").unwrap();
        assert_eq!(means.female, None);
        assert_eq!(means.male, Some(43.0));
        assert_eq!(
            engine.method_counts("DGB2016").unwrap(),
            vec![(Method::Drawdown, 1), (Method::Handsearch, 1), (Method::Trapping, 1)]
        );
        assert_eq!(engine.method_mean_lengths("DGB2016").unwrap()[2], (Method::Trapping, Some(44.0)));
        assert_eq!(engine.default_bounds(), DefaultBounds::default());
        assert_eq!(engine.bounds(Attribute::Weight).unwrap(), None);
    }

    #[test]
    fn population_trend_uses_configured_points() {
        let mut by_method = method_rows("DGB2016", &[(Method::Drawdown, Gender::Male, 40.0), (Method::Drawdown, Gender::Female, 38.0)]);
        by_method.extend(method_rows("DGB2017", &[(Method::Trapping, Gender::Female, 41.0)]));
        let engine = engine(&by_method, &[]);
        let trend = engine.population_trend(&[Gender::Female, Gender::Male]).unwrap();
        assert_eq!(
            trend,
            vec![
                TrendCount { year: 2016, site: "DGB2016".to_owned(), count: 2 },
                TrendCount { year: 2017, site: "DGB2017".to_owned(), count: 1 },
            ]
        );
        assert_eq!(engine.population_trend(&[Gender::Female]).unwrap()[0].count, 1);
        assert!(engine.population_trend(&[]).unwrap().is_empty());
    }

    #[test]
    fn sampling_is_seedable_and_never_negative() {
        let engine = engine(&[], &site_rows("S1", &[30.0, 35.0, 41.0, 44.0, 38.0, 36.0]));
        let first = engine
            .sample_distribution_with("S1", Attribute::Length, &Gender::ALL, Some(300), &mut StdRng::seed_from_u64(5))
            .unwrap();
        let second = engine
            .sample_distribution_with("S1", Attribute::Length, &Gender::ALL, Some(300), &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert_eq!(first, second);
        assert!(first.x.iter().all(|x| *x >= 0.0));

        let default_size = engine.sample_distribution("S1", Attribute::Weight, &Gender::ALL, None).unwrap();
        assert_eq!(default_size.len(), 1000);

        let empty = engine.sample_distribution("S1", Attribute::Length, &[], None).unwrap();
        assert!(empty.is_empty());

        let series = engine
            .sample_distributions(&["S1", "S9"], Attribute::Length, &Gender::ALL, Some(50), &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(series.len(), 2);
        assert!(series[1].1.is_empty());
    }

    #[test]
    fn fit_reports_insufficient_data() {
        let engine = engine(&[], &site_rows("S1", &[30.0, 30.0]));
        let error = engine.fit_normal("S1", Attribute::Length, &Gender::ALL).unwrap_err();
        assert!(matches!(error, SurveyError::InsufficientData(_)));
        assert_eq!(engine.sites().unwrap(), vec!["S1".to_owned()]);
    }
}
