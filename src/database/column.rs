use crate::survey::Gender;
use crate::survey::Method;
use duckdb::types::FromSql;
use duckdb::types::FromSqlError;
use duckdb::types::FromSqlResult;
use duckdb::types::ToSql;
use duckdb::types::ToSqlOutput;
use duckdb::types::ValueRef;
use thiserror::Error;

/// Errors raised when CRUD input does not fit a table column.
#[derive(Error, Debug, PartialEq)]
pub enum ColumnError {
    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("Unknown field '{field}' for table {table}")]
    UnknownField { table: &'static str, field: String },

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Field '{0}' is given more than once")]
    DuplicateField(String),

    #[error("Field 'id' is assigned by the store and cannot be set")]
    ImmutableId,

    #[error("Field '{field}' must be a number, got '{value}'")]
    InvalidNumber { field: String, value: String },

    #[error("Field '{field}' must be greater than zero, got {value}")]
    NonPositive { field: String, value: f64 },

    #[error("Invalid gender '{0}', expected M or F")]
    InvalidGender(String),

    #[error("Invalid method '{0}', expected Drawdown, Handsearch or Trapping")]
    InvalidMethod(String),

    #[error("Field 'site' must not be empty")]
    EmptySite,
}

/// Storage type of a column.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum ColumnType {
    /// 64-bit signed integers
    BigInt,
    /// Double-precision floating point numbers
    Double,
    /// Variable-length strings
    Varchar,
}

impl ColumnType {
    /// Returns the string representation of the column type for DuckDB.
    pub(crate) const fn as_str(&self) -> &'static str {
        match self {
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Varchar => "VARCHAR",
        }
    }
}

/// What a column holds, which decides how input text is validated.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum ColumnRole {
    Id,
    Site,
    Method,
    Gender,
    /// Strictly positive measurement
    Measurement,
}

/// A column of one of the survey tables.
#[derive(Clone, Debug)]
pub struct Column {
    /// Column name in the store and in CRUD field maps
    pub name: &'static str,
    /// Column title in CSV exports
    pub header: &'static str,
    pub(crate) kind: ColumnType,
    pub(crate) role: ColumnRole,
}

impl Column {
    pub(crate) const fn new(name: &'static str, header: &'static str, kind: ColumnType, role: ColumnRole) -> Self {
        Self { name, header, kind, role }
    }

    /// SQL column definition including its CHECK constraint.
    pub(crate) fn definition(&self) -> String {
        let check = match self.role {
            ColumnRole::Id => return format!("{} {} PRIMARY KEY", self.name, self.kind.as_str()),
            ColumnRole::Site => format!("length({}) > 0", self.name),
            ColumnRole::Method => {
                let names: Vec<String> = Method::ALL.iter().map(|method| format!("'{}'", method.name())).collect();
                format!("{} IN ({})", self.name, names.join(", "))
            }
            ColumnRole::Gender => {
                let codes: Vec<String> = Gender::ALL.iter().map(|gender| format!("'{}'", gender.code())).collect();
                format!("{} IN ({})", self.name, codes.join(", "))
            }
            ColumnRole::Measurement => format!("{} > 0", self.name),
        };
        format!("{} {} NOT NULL CHECK ({})", self.name, self.kind.as_str(), check)
    }

    /// Parses and validates a text value for this column.
    pub fn parse_value(&self, value: &str) -> Result<ColumnValue, ColumnError> {
        match self.role {
            ColumnRole::Id => value
                .trim()
                .parse::<i64>()
                .map(ColumnValue::BigInt)
                .map_err(|_| ColumnError::InvalidNumber {
                    field: self.name.to_owned(),
                    value: value.to_owned(),
                }),
            ColumnRole::Site => {
                let site = value.trim();
                if site.is_empty() {
                    Err(ColumnError::EmptySite)
                } else {
                    Ok(ColumnValue::Varchar(site.to_owned()))
                }
            }
            ColumnRole::Method => Method::from_name(value.trim())
                .map(|method| ColumnValue::Varchar(method.name().to_owned()))
                .ok_or_else(|| ColumnError::InvalidMethod(value.to_owned())),
            ColumnRole::Gender => Gender::from_code(value.trim())
                .map(|gender| ColumnValue::Varchar(gender.code().to_owned()))
                .ok_or_else(|| ColumnError::InvalidGender(value.to_owned())),
            ColumnRole::Measurement => {
                let number = value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|number| number.is_finite())
                    .ok_or_else(|| ColumnError::InvalidNumber {
                        field: self.name.to_owned(),
                        value: value.to_owned(),
                    })?;
                if number > 0.0 {
                    Ok(ColumnValue::Double(number))
                } else {
                    Err(ColumnError::NonPositive {
                        field: self.name.to_owned(),
                        value: number,
                    })
                }
            }
        }
    }
}

/// A validated value bound to a statement parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnValue {
    BigInt(i64),
    Double(f64),
    Varchar(String),
}

impl ToSql for ColumnValue {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        match self {
            ColumnValue::BigInt(value) => value.to_sql(),
            ColumnValue::Double(value) => value.to_sql(),
            ColumnValue::Varchar(value) => value.to_sql(),
        }
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::Varchar(value.to_owned())
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        ColumnValue::Double(value)
    }
}

impl ToSql for Gender {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        self.code().to_sql()
    }
}

impl FromSql for Gender {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_str()?;
        Gender::from_code(code).ok_or_else(|| FromSqlError::Other(format!("invalid gender '{}'", code).into()))
    }
}

impl ToSql for Method {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        self.name().to_sql()
    }
}

impl FromSql for Method {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let name = value.as_str()?;
        Method::from_name(name).ok_or_else(|| FromSqlError::Other(format!("invalid method '{}'", name).into()))
    }
}
