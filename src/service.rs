//! # Survey Service
//!
//! Owns one [`Repository`], the [`AggregationEngine`] reading from it and the
//! summary of the last ingested [`Dataset`]. Constructed once at startup and
//! shared by reference; re-ingestion swaps the dataset behind a single
//! `RwLock<Arc<_>>`.

use crate::analysis::engine::AggregationEngine;
use crate::config::SurveyConfig;
use crate::database::Repository;
use crate::database::Table;
use crate::error::SurveyError;
use crate::spreadsheet::Workbook;
use crate::survey::normalize::NormalizationReport;
use crate::survey::normalize::TableNormalizer;
use crate::survey::raw::RawTableParser;
use crate::survey::raw::RawTables;
use crate::survey::ObservationByMethod;
use crate::survey::ObservationBySite;
use chrono::DateTime;
use chrono::Utc;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use tracing::info;

/// One ingested snapshot of the survey workbook.
#[derive(Clone, Debug)]
pub struct Dataset {
    /// Workbook the rows came from; `None` for a snapshot read back from the store
    pub source: Option<PathBuf>,
    pub by_method: Vec<ObservationByMethod>,
    pub by_site: Vec<ObservationBySite>,
    pub by_method_report: NormalizationReport,
    pub by_site_report: NormalizationReport,
    pub loaded_at: DateTime<Utc>,
}

impl Dataset {
    /// Parses and normalizes the workbook at `path`.
    pub fn ingest<P: AsRef<Path>>(path: P, config: &SurveyConfig) -> Result<Dataset, SurveyError> {
        let path = path.as_ref();
        let raw = parser(config).parse_path(path)?;
        let mut dataset = Self::normalize(&raw)?;
        dataset.source = Some(path.to_path_buf());
        Ok(dataset)
    }

    /// Parses and normalizes an opened workbook.
    pub fn from_workbook(workbook: &mut Workbook, config: &SurveyConfig) -> Result<Dataset, SurveyError> {
        let raw = parser(config).parse(workbook)?;
        Self::normalize(&raw)
    }

    /// Rows currently held by the repository, with empty reports.
    pub fn stored(repository: &Repository) -> Result<Dataset, SurveyError> {
        Ok(Dataset {
            source: None,
            by_method: repository.observations_by_method(None)?,
            by_site: repository.observations_by_site(None)?,
            by_method_report: NormalizationReport::default(),
            by_site_report: NormalizationReport::default(),
            loaded_at: Utc::now(),
        })
    }

    fn normalize(raw: &RawTables) -> Result<Dataset, SurveyError> {
        let normalizer = TableNormalizer;
        let (by_method, by_method_report) = normalizer.normalize_by_method(&raw.by_method)?;
        let (by_site, by_site_report) = normalizer.normalize_by_site(&raw.by_site)?;
        Ok(Dataset {
            source: None,
            by_method,
            by_site,
            by_method_report,
            by_site_report,
            loaded_at: Utc::now(),
        })
    }
}

fn parser(config: &SurveyConfig) -> RawTableParser {
    RawTableParser::new(&config.by_method_sheet, &config.by_site_sheet)
}

pub struct SurveyService {
    config: SurveyConfig,
    repository: Arc<Repository>,
    engine: AggregationEngine,
    dataset: RwLock<Arc<Dataset>>,
}

impl SurveyService {
    /// Opens the configured store. When both tables are empty the configured
    /// workbook is ingested first; otherwise the stored rows are kept.
    pub fn open(config: SurveyConfig) -> Result<SurveyService, SurveyError> {
        let repository = Arc::new(Repository::open(&config.database)?);
        let empty = repository.count(Table::ByMethod)? == 0 && repository.count(Table::BySite)? == 0;
        let dataset = if empty {
            let dataset = Dataset::ingest(&config.source, &config)?;
            repository.replace_dataset(&dataset.by_method, &dataset.by_site)?;
            dataset
        } else {
            info!(database = %config.database.display(), "using stored survey tables");
            Dataset::stored(&repository)?
        };
        Self::build(config, repository, dataset)
    }

    /// Wraps an already populated repository.
    pub fn with_repository(config: SurveyConfig, repository: Arc<Repository>) -> Result<SurveyService, SurveyError> {
        let dataset = Dataset::stored(&repository)?;
        Self::build(config, repository, dataset)
    }

    fn build(config: SurveyConfig, repository: Arc<Repository>, dataset: Dataset) -> Result<SurveyService, SurveyError> {
        let engine = AggregationEngine::new(repository.clone(), &config)?;
        Ok(SurveyService {
            config,
            repository,
            engine,
            dataset: RwLock::new(Arc::new(dataset)),
        })
    }

    /// Replaces both tables with the contents of the workbook at `path`.
    ///
    /// Parsing happens before the store is touched, so a malformed workbook
    /// leaves the stored rows and the current dataset unchanged.
    pub fn reingest<P: AsRef<Path>>(&self, path: P) -> Result<Arc<Dataset>, SurveyError> {
        let dataset = Dataset::ingest(path, &self.config)?;
        self.install(dataset)
    }

    /// [`reingest`](Self::reingest) from an opened workbook.
    pub fn reingest_workbook(&self, workbook: &mut Workbook) -> Result<Arc<Dataset>, SurveyError> {
        let dataset = Dataset::from_workbook(workbook, &self.config)?;
        self.install(dataset)
    }

    fn install(&self, dataset: Dataset) -> Result<Arc<Dataset>, SurveyError> {
        let (by_method, by_site) = self.repository.replace_dataset(&dataset.by_method, &dataset.by_site)?;
        self.engine.refresh_bounds()?;
        let dataset = Arc::new(dataset);
        *self.dataset.write().unwrap_or_else(PoisonError::into_inner) = dataset.clone();
        info!(by_method, by_site, loaded_at = %dataset.loaded_at, "re-ingested survey dataset");
        Ok(dataset)
    }

    pub fn config(&self) -> &SurveyConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    /// The last ingested snapshot.
    pub fn dataset(&self) -> Arc<Dataset> {
        self.dataset.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
