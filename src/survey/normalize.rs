//! # Normalization
//!
//! Flattens a [`RawSheet`] into tidy observations, one per captured
//! individual. Each `(site, method)` group (or each site, for the by-site
//! sheet) is processed as one fragment in three counted passes:
//!
//! 1. rows with no data at all are dropped (padding below the last individual),
//! 2. rows whose Gender is not exactly `M` or `F` are dropped,
//! 3. rows with a valid gender but a missing, non-numeric or non-positive
//!    measurement are dropped.
//!
//! Fragments are emitted site-major, method-minor, so the output order only
//! depends on the sheet.

use crate::error::SurveyError;
use crate::spreadsheet::CellValue;
use crate::survey::raw::LayoutError;
use crate::survey::raw::RawSheet;
use crate::survey::raw::SubTable;
use crate::survey::Gender;
use crate::survey::Info;
use crate::survey::Method;
use crate::survey::ObservationByMethod;
use crate::survey::ObservationBySite;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Row counts of one normalization run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NormalizationReport {
    /// Groups that had columns in the sheet
    pub fragments: usize,
    /// `(site, method)` combinations with no columns in the sheet
    pub missing_fragments: usize,
    /// Data rows seen across all fragments
    pub input_rows: usize,
    /// Pass 1: rows with every cell empty
    pub empty_rows: usize,
    /// Pass 2: rows whose Gender is not `M`/`F`
    pub invalid_genders: usize,
    /// Pass 3: rows with a valid gender but an unusable measurement
    pub invalid_measurements: usize,
    /// Rows kept
    pub output_rows: usize,
    /// Distinct non-blank Gender values found, valid or not
    pub raw_genders: BTreeSet<String>,
}

impl NormalizationReport {
    fn log(&self, sheet: &str) {
        info!(
            sheet,
            fragments = self.fragments,
            input_rows = self.input_rows,
            empty_rows = self.empty_rows,
            output_rows = self.output_rows,
            "normalized sheet"
        );
        if self.invalid_genders > 0 {
            warn!(sheet, rows = self.invalid_genders, genders = ?self.raw_genders, "dropped rows with invalid gender");
        }
        if self.invalid_measurements > 0 {
            warn!(sheet, rows = self.invalid_measurements, "dropped rows with invalid measurements");
        }
    }
}

/// Converts raw sheets into tidy observation rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableNormalizer;

impl TableNormalizer {
    /// Normalizes the by-method sheet: every discovered site crossed with
    /// every [`Method`].
    pub fn normalize_by_method(
        &self,
        sheet: &RawSheet,
    ) -> Result<(Vec<ObservationByMethod>, NormalizationReport), SurveyError> {
        let mut report = NormalizationReport::default();
        let mut observations = Vec::new();
        for site in sheet.sites() {
            for label in sheet.methods(&site) {
                if Method::from_name(&label).is_none() {
                    warn!(sheet = %sheet.name, site = %site, method = %label, "ignored unknown method group");
                }
            }
            for method in Method::ALL {
                let Some(mut table) = sheet.select(&site, Some(method.name())) else {
                    debug!(sheet = %sheet.name, site = %site, method = %method, "no columns for group");
                    report.missing_fragments += 1;
                    continue;
                };
                let group = format!("({}, {})", site, method);
                let gender = require(sheet, &group, &table, Info::Gender)?;
                let length = require(sheet, &group, &table, Info::CarapaceLength)?;
                let before = observations.len();
                for (gender, row) in valid_rows(&mut table, gender, &mut report) {
                    match measurement(&row, length) {
                        Some(length) => observations.push(ObservationByMethod {
                            site: site.to_owned(),
                            method,
                            gender,
                            length,
                        }),
                        None => report.invalid_measurements += 1,
                    }
                }
                debug!(sheet = %sheet.name, group = %group, rows = observations.len() - before, "normalized group");
            }
        }
        report.output_rows = observations.len();
        report.log(&sheet.name);
        Ok((observations, report))
    }

    /// Normalizes the by-site sheet: one fragment per discovered site.
    pub fn normalize_by_site(
        &self,
        sheet: &RawSheet,
    ) -> Result<(Vec<ObservationBySite>, NormalizationReport), SurveyError> {
        let mut report = NormalizationReport::default();
        let mut observations = Vec::new();
        for site in sheet.sites() {
            let Some(mut table) = sheet.select(&site, None) else {
                report.missing_fragments += 1;
                continue;
            };
            let gender = require(sheet, &site, &table, Info::Gender)?;
            let length = require(sheet, &site, &table, Info::CarapaceLength)?;
            let weight = require(sheet, &site, &table, Info::Weight)?;
            let before = observations.len();
            for (gender, row) in valid_rows(&mut table, gender, &mut report) {
                match (measurement(&row, length), measurement(&row, weight)) {
                    (Some(length), Some(weight)) => observations.push(ObservationBySite {
                        site: site.to_owned(),
                        gender,
                        length,
                        weight,
                    }),
                    _ => report.invalid_measurements += 1,
                }
            }
            debug!(sheet = %sheet.name, site = %site, rows = observations.len() - before, "normalized site");
        }
        report.output_rows = observations.len();
        report.log(&sheet.name);
        Ok((observations, report))
    }
}

/// Finds the column of `info` in a fragment.
fn require(sheet: &RawSheet, group: &str, table: &SubTable, info: Info) -> Result<usize, SurveyError> {
    let index = table
        .columns
        .iter()
        .position(|column| *column == info)
        .ok_or_else(|| LayoutError::MissingInfo {
            sheet: sheet.name.to_owned(),
            group: group.to_owned(),
            info: info.label(),
        })?;
    Ok(index)
}

/// Runs the first two passes over a fragment and yields rows with a valid gender.
fn valid_rows(
    table: &mut SubTable,
    gender: usize,
    report: &mut NormalizationReport,
) -> Vec<(Gender, Vec<Option<CellValue>>)> {
    report.fragments += 1;
    report.input_rows += table.rows.len();
    report.empty_rows += table.drop_empty_rows();

    let mut rows = Vec::with_capacity(table.rows.len());
    for row in table.rows.drain(..) {
        let raw = row[gender].as_ref().filter(|value| !value.is_blank());
        if let Some(value) = raw {
            report.raw_genders.insert(value.to_string());
        }
        let code = raw.and_then(CellValue::as_text).and_then(Gender::from_code);
        match code {
            Some(code) => rows.push((code, row)),
            None => report.invalid_genders += 1,
        }
    }
    rows
}

/// A strictly positive, finite number from a measurement cell.
fn measurement(row: &[Option<CellValue>], col: usize) -> Option<f64> {
    row[col]
        .as_ref()
        .and_then(CellValue::as_number)
        .filter(|value| value.is_finite() && *value > 0.0)
}
