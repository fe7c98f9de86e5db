//! Runtime configuration: a TOML file with environment overrides.

use crate::error::ResultMessage;
use crate::error::SurveyError;
use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;

/// Environment variable naming the TOML configuration file
pub const CONFIG_ENV: &str = "CRAYFISH_CONFIG";
/// Environment variable overriding [`SurveyConfig::source`]
pub const SOURCE_ENV: &str = "CRAYFISH_SOURCE";
/// Environment variable overriding [`SurveyConfig::database`]
pub const DATABASE_ENV: &str = "CRAYFISH_DATABASE";

/// One comparison point of the population trend.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TrendPoint {
    pub year: i32,
    /// Site whose counts represent this year
    pub site: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SurveyConfig {
    /// Survey workbook
    pub source: PathBuf,
    /// DuckDB file, or `:memory:`
    pub database: PathBuf,
    /// Sheet with the Site / Method / Info header
    pub by_method_sheet: String,
    /// Sheet with the Site / Info header
    pub by_site_sheet: String,
    /// Default number of draws for distribution sampling
    pub sample_size: usize,
    /// Fixed sampling seed; entropy when absent
    pub seed: Option<u64>,
    pub trend: Vec<TrendPoint>,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("data/prepared_datasets.xlsx"),
            database: PathBuf::from("instance/survey.duckdb"),
            by_method_sheet: "Sheet_name_1".to_owned(),
            by_site_sheet: "Sheet_name_2".to_owned(),
            sample_size: 1000,
            seed: None,
            trend: vec![
                TrendPoint {
                    year: 2016,
                    site: "DGB2016".to_owned(),
                },
                TrendPoint {
                    year: 2017,
                    site: "DGB2017".to_owned(),
                },
            ],
        }
    }
}

impl SurveyConfig {
    /// Parses a TOML document; missing keys take their defaults.
    pub fn parse(text: &str) -> Result<SurveyConfig, SurveyError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SurveyConfig, SurveyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(SurveyError::from)
            .with_prefix(&format!("read {}", path.display()))?;
        Self::parse(&text).with_prefix(&format!("parse {}", path.display()))
    }

    /// Loads `.env` when present, then the file named by `CRAYFISH_CONFIG`
    /// (defaults otherwise), then applies `CRAYFISH_SOURCE` and
    /// `CRAYFISH_DATABASE`.
    pub fn from_env() -> Result<SurveyConfig, SurveyError> {
        dotenv::dotenv().ok();
        let lookup = |name: &str| std::env::var(name).ok().filter(|value| !value.is_empty());
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup);
        debug!(?config, "loaded configuration");
        Ok(config)
    }

    fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(source) = lookup(SOURCE_ENV) {
            self.source = PathBuf::from(source);
        }
        if let Some(database) = lookup(DATABASE_ENV) {
            self.database = PathBuf::from(database);
        }
    }
}
