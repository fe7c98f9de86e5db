//! # Raw Sheet Parsing
//!
//! Turns a worksheet with a multi-row column header into a [`RawSheet`]: a set
//! of columns keyed by `(Site, [Method], Info)`. No cell content is validated
//! here beyond the header itself.
//!
//! The source sheets look like this (by-method sheet, three header rows):
//!
//! ```text
//!     | DGB2016                                           | DGB2017 ...
//!     | Drawdown              | Handsearch                | Drawdown ...
//!     | Gender | Carapace ... | Gender | Carapace ...     | Gender ...
//!     |        |              |        |                  |
//!   0 | M      | 43.2         | F      | 38.0             | ...
//! ```
//!
//! Column A is an index column left over from an earlier export and is
//! ignored. Upper header labels are written once per merged group and
//! forward-filled. The row after the header is a separator and is dropped.

use crate::error::SurveyError;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::CellValue;
use crate::spreadsheet::Sheet;
use crate::spreadsheet::Workbook;
use crate::survey::Info;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use tracing::info;

/// Column index of the leftover export index
const INDEX_COLUMN: usize = 0;

/// Errors raised when a sheet does not have the survey header layout.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Sheet '{sheet}' has {found} header rows, expected {expected}")]
    HeaderDepth { sheet: String, expected: usize, found: usize },

    #[error("Sheet '{sheet}' column {column}: unknown header label '{label}'")]
    UnknownInfo { sheet: String, column: String, label: String },

    #[error("Sheet '{sheet}' column {column}: missing {level} header")]
    MissingHeader { sheet: String, column: String, level: &'static str },

    #[error("Sheet '{sheet}' column {column}: duplicate header {key}")]
    DuplicateColumn { sheet: String, column: String, key: String },

    #[error("Sheet '{sheet}' group {group} has no '{info}' column")]
    MissingInfo { sheet: String, group: String, info: &'static str },
}

/// Semantic name of a header row.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeaderLevel {
    Site,
    Method,
    Info,
}

impl HeaderLevel {
    /// Levels of the by-method sheet.
    pub const BY_METHOD: [HeaderLevel; 3] = [HeaderLevel::Site, HeaderLevel::Method, HeaderLevel::Info];
    /// Levels of the by-site sheet.
    pub const BY_SITE: [HeaderLevel; 2] = [HeaderLevel::Site, HeaderLevel::Info];

    pub fn name(&self) -> &'static str {
        match self {
            HeaderLevel::Site => "Site",
            HeaderLevel::Method => "Method",
            HeaderLevel::Info => "Info",
        }
    }
}

/// Composite key of one leaf column.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HeaderKey {
    pub site: String,
    /// Present only for sheets with a Method level
    pub method: Option<String>,
    pub info: Info,
}

impl std::fmt::Display for HeaderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.method {
            Some(method) => write!(f, "({}, {}, {})", self.site, method, self.info.label()),
            None => write!(f, "({}, {})", self.site, self.info.label()),
        }
    }
}

/// A rectangular block of cells selected by a partial header key.
#[derive(Clone, Debug, PartialEq)]
pub struct SubTable {
    /// Info label of each column, in sheet order
    pub columns: Vec<Info>,
    /// Row-major cell values, one entry per column
    pub rows: Vec<Vec<Option<CellValue>>>,
}

impl SubTable {
    /// Gets a cell by row and Info label.
    pub fn get(&self, row: usize, info: Info) -> Option<&CellValue> {
        let col = self.columns.iter().position(|column| *column == info)?;
        self.rows.get(row)?.get(col)?.as_ref()
    }

    /// Removes rows in which every cell is absent or blank and returns how
    /// many were removed.
    pub fn drop_empty_rows(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| !is_empty_row(row.iter()));
        before - self.rows.len()
    }
}

/// One sheet after header interpretation.
#[derive(Clone, Debug)]
pub struct RawSheet {
    pub name: String,
    levels: Vec<HeaderLevel>,
    keys: Vec<HeaderKey>,
    columns: Vec<Vec<Option<CellValue>>>,
    indexes: HashMap<HeaderKey, usize>,
    row_count: usize,
}

impl RawSheet {
    pub fn levels(&self) -> &[HeaderLevel] {
        &self.levels
    }

    /// Number of data rows (separator row excluded).
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Leaf column keys in sheet order.
    pub fn keys(&self) -> &[HeaderKey] {
        &self.keys
    }

    /// Sites in order of first appearance.
    pub fn sites(&self) -> Vec<String> {
        let mut sites: Vec<String> = Vec::new();
        for key in &self.keys {
            if !sites.contains(&key.site) {
                sites.push(key.site.to_owned());
            }
        }
        sites
    }

    /// Method labels under a site, in order of first appearance.
    pub fn methods(&self, site: &str) -> Vec<String> {
        let mut methods: Vec<String> = Vec::new();
        for key in self.keys.iter().filter(|key| key.site == site) {
            if let Some(method) = &key.method {
                if !methods.contains(method) {
                    methods.push(method.to_owned());
                }
            }
        }
        methods
    }

    /// Gets the data of one leaf column.
    pub fn column(&self, key: &HeaderKey) -> Option<&[Option<CellValue>]> {
        self.indexes.get(key).map(|index| self.columns[*index].as_slice())
    }

    /// Selects every column under `site` (and `method`, when given) as a
    /// sub-table. Returns `None` when no column matches.
    pub fn select(&self, site: &str, method: Option<&str>) -> Option<SubTable> {
        let selected: Vec<usize> = self
            .keys
            .iter()
            .enumerate()
            .filter(|(_, key)| key.site == site && key.method.as_deref() == method)
            .map(|(index, _)| index)
            .collect();
        if selected.is_empty() {
            return None;
        }
        let columns = selected.iter().map(|index| self.keys[*index].info).collect();
        let rows = (0..self.row_count)
            .map(|row| {
                selected
                    .iter()
                    .map(|index| self.columns[*index][row].clone())
                    .collect()
            })
            .collect();
        Some(SubTable { columns, rows })
    }
}

/// The two raw sheets of the survey workbook.
#[derive(Clone, Debug)]
pub struct RawTables {
    pub by_method: RawSheet,
    pub by_site: RawSheet,
}

/// Reads the by-method and by-site sheets of a survey workbook.
#[derive(Clone, Debug)]
pub struct RawTableParser {
    by_method_sheet: String,
    by_site_sheet: String,
}

impl RawTableParser {
    pub fn new(by_method_sheet: &str, by_site_sheet: &str) -> Self {
        Self {
            by_method_sheet: by_method_sheet.to_owned(),
            by_site_sheet: by_site_sheet.to_owned(),
        }
    }

    /// Opens the workbook at `path` and parses both sheets.
    pub fn parse_path<P: AsRef<Path>>(&self, path: P) -> Result<RawTables, SurveyError> {
        let mut workbook = crate::spreadsheet::open_workbook(path)?;
        self.parse(&mut workbook)
    }

    /// Parses both sheets of an opened workbook.
    ///
    /// # Arguments
    ///
    /// * `workbook` - The workbook holding the two survey sheets
    ///
    /// # Returns
    ///
    /// Returns the raw tables, or a source-format error when a sheet is
    /// absent or its header depth is not 3 (by method) / 2 (by site).
    pub fn parse(&self, workbook: &mut Workbook) -> Result<RawTables, SurveyError> {
        let by_method = workbook.read_sheet(&self.by_method_sheet)?;
        let by_method = parse_sheet(&by_method, &HeaderLevel::BY_METHOD)?;
        let by_site = workbook.read_sheet(&self.by_site_sheet)?;
        let by_site = parse_sheet(&by_site, &HeaderLevel::BY_SITE)?;
        info!(
            by_method_columns = by_method.keys.len(),
            by_method_rows = by_method.row_count,
            by_site_columns = by_site.keys.len(),
            by_site_rows = by_site.row_count,
            "parsed survey workbook"
        );
        Ok(RawTables { by_method, by_site })
    }
}

fn is_empty_cell(cell: Option<&CellValue>) -> bool {
    cell.map(CellValue::is_blank).unwrap_or(true)
}

fn is_empty_row<'a>(mut cells: impl Iterator<Item = &'a Option<CellValue>>) -> bool {
    cells.all(|cell| is_empty_cell(cell.as_ref()))
}

fn label_of(cell: Option<&CellValue>) -> Option<String> {
    cell.filter(|value| !value.is_blank())
        .map(|value| value.to_string().trim().to_owned())
}

/// Interprets a worksheet whose header has exactly `levels.len()` rows.
pub fn parse_sheet(sheet: &Sheet, levels: &[HeaderLevel]) -> Result<RawSheet, SurveyError> {
    let grid = sheet.grid();
    let width = sheet.width();
    let depth = grid
        .iter()
        .position(|row| is_empty_row(row.iter().skip(INDEX_COLUMN + 1)))
        .unwrap_or(grid.len());
    if depth != levels.len() {
        Err(LayoutError::HeaderDepth {
            sheet: sheet.name.to_owned(),
            expected: levels.len(),
            found: depth,
        })?
    }
    // one separator row follows the header
    let data = grid.get(depth + 1..).unwrap_or_default();
    let leaf = levels.len() - 1;

    let mut filled: Vec<Option<String>> = vec![None; leaf];
    let mut keys: Vec<HeaderKey> = Vec::new();
    let mut columns: Vec<Vec<Option<CellValue>>> = Vec::new();
    let mut indexes: HashMap<HeaderKey, usize> = HashMap::new();
    for col in (INDEX_COLUMN + 1)..width {
        let reference = || index_to_reference(0, col).trim_end_matches(char::is_numeric).to_owned();
        // a new label stops the fill of every level below it
        let mut parent_changed = false;
        for level in 0..leaf {
            match label_of(grid[level][col].as_ref()) {
                Some(label) => {
                    filled[level] = Some(label);
                    parent_changed = true;
                }
                None if parent_changed => filled[level] = None,
                None => (),
            }
        }

        let leaf_label = label_of(grid[leaf][col].as_ref());
        let has_data = !is_empty_row(data.iter().map(|row| &row[col]));
        let label = match leaf_label {
            Some(label) => label,
            None if !has_data => continue,
            None => Err(LayoutError::MissingHeader {
                sheet: sheet.name.to_owned(),
                column: reference(),
                level: HeaderLevel::Info.name(),
            })?,
        };
        let info = Info::from_label(&label).ok_or_else(|| LayoutError::UnknownInfo {
            sheet: sheet.name.to_owned(),
            column: reference(),
            label: label.to_owned(),
        })?;

        let mut labels = Vec::with_capacity(leaf);
        for level in 0..leaf {
            let label = filled[level].clone().ok_or_else(|| LayoutError::MissingHeader {
                sheet: sheet.name.to_owned(),
                column: reference(),
                level: levels[level].name(),
            })?;
            labels.push(label);
        }
        let method_level = levels.iter().position(|level| *level == HeaderLevel::Method);
        let site_level = levels.iter().position(|level| *level == HeaderLevel::Site).unwrap_or(0);
        let key = HeaderKey {
            site: labels[site_level].to_owned(),
            method: method_level.map(|level| labels[level].to_owned()),
            info,
        };
        if indexes.contains_key(&key) {
            Err(LayoutError::DuplicateColumn {
                sheet: sheet.name.to_owned(),
                column: reference(),
                key: key.to_string(),
            })?
        }
        debug!(sheet = %sheet.name, column = %reference(), key = %key, "header column");
        indexes.insert(key.clone(), keys.len());
        keys.push(key);
        columns.push(data.iter().map(|row| row[col].clone()).collect());
    }

    Ok(RawSheet {
        name: sheet.name.to_owned(),
        levels: levels.to_vec(),
        keys,
        columns,
        indexes,
        row_count: data.len(),
    })
}
