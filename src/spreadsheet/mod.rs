//! # Spreadsheet Reading Module
//!
//! Reads the cells of Excel 2007+ workbooks (`.xlsx`, `.xlsm`) directly from
//! the OOXML parts of the ZIP container. Only values are read; styles, number
//! formats and formulas are ignored, which is all the survey sheets need.

pub mod cell;
pub mod reference;
pub mod sheet;
pub mod xlsx;

use crate::error::SurveyError;
use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;

pub use cell::CellValue;
pub use sheet::Sheet;
pub use xlsx::XlsxWorkbook as Workbook;

/// Errors raised while locating and decoding workbook content.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Unsupported or unrecognized file format
    #[error("Cannot detect file format for '{name}'")]
    InvalidFileFormat { name: String },

    /// A required part is missing from the archive
    #[error("Missing workbook part '{0}'")]
    FileError(String),

    /// The workbook declares no worksheets
    #[error("Workbook '{0}' has no worksheets")]
    SpreadsheetEmptyError(String),

    /// Requested sheet does not exist in the workbook
    #[error("Sheet '{sheet_name}' not found in '{file_name}'")]
    SheetNotFound { file_name: String, sheet_name: String },

    /// Invalid cell value that cannot be decoded according to its type
    #[error("Invalid cell value in '{0}' sheet '{1}' at '{2}': {3}")]
    CellValueError(String, String, String, String),
}

/// Opens a workbook after checking that its extension is one we can read.
pub fn open_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook, SurveyError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") => Workbook::open(path),
        _ => Err(SpreadsheetError::InvalidFileFormat {
            name: path.to_string_lossy().to_string(),
        })?,
    }
}
