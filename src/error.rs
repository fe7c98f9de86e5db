use thiserror::Error;

/// Main error type for the crayfish survey crate.
/// Aggregates errors from the standard library, dependencies and the internal modules.
#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("{0}")]
    WithContextError(String),

    #[error("No {table} record with id {id}")]
    NotFound { table: &'static str, id: i64 },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Storage connection is unavailable after a panic in another request")]
    StoragePoisoned,

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),


    // Third-party library errors
    #[error("{0}")]
    DuckDBError(#[from] duckdb::Error),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] toml::de::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Survey module errors
    #[error("{0}")]
    LayoutError(#[from] crate::survey::raw::LayoutError),

    // Database module errors
    #[error("{0}")]
    ColumnError(#[from] crate::database::column::ColumnError),
}

/// Coarse classification of a [`SurveyError`], so callers can choose a message
/// without matching on every wrapped library error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source workbook does not have the expected shape.
    SourceFormat,
    /// CRUD input failed type or required-field checks.
    Validation,
    /// The CRUD target id does not exist.
    NotFound,
    /// An aggregate was requested over an empty or zero-denominator selection.
    InsufficientData,
    /// The relational store failed.
    Storage,
    /// The configuration file could not be read or parsed.
    Config,
    /// Any other I/O failure.
    Io,
}

impl SurveyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientData(_) => ErrorKind::InsufficientData,
            Self::ColumnError(_) => ErrorKind::Validation,
            Self::SpreadsheetError(_)
            | Self::LayoutError(_)
            | Self::ZipError(_)
            | Self::XmlError(_)
            | Self::XmlEncodingError(_)
            | Self::XmlAttributeError(_)
            | Self::XmlHelperError(_)
            | Self::ParseIntError(_) => ErrorKind::SourceFormat,
            Self::DuckDBError(_) | Self::StoragePoisoned => ErrorKind::Storage,
            Self::ConfigError(_) => ErrorKind::Config,
            Self::IoError(_) | Self::CsvError(_) | Self::WithContextError(_) => ErrorKind::Io,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SurveyError> {
    /// Prefixes the error message while keeping the error kind of
    /// source-format, validation and not-found failures intact.
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| match e.kind() {
            ErrorKind::Io | ErrorKind::Config => {
                SurveyError::WithContextError(format!("{}: {}", message, e))
            }
            _ => e,
        })
    }
}
