use crate::database::column::Column;
use crate::database::column::ColumnError;
use crate::database::column::ColumnRole;
use crate::database::column::ColumnType;
use crate::database::column::ColumnValue;
use std::fmt::Display;
use std::str::FromStr;

const ID: Column = Column::new("id", "id", ColumnType::BigInt, ColumnRole::Id);
const SITE: Column = Column::new("site", "site", ColumnType::Varchar, ColumnRole::Site);
const METHOD: Column = Column::new("method", "method", ColumnType::Varchar, ColumnRole::Method);
const GENDER: Column = Column::new("gender", "gender", ColumnType::Varchar, ColumnRole::Gender);
const LENGTH: Column = Column::new("length", "length (mm)", ColumnType::Double, ColumnRole::Measurement);
const WEIGHT: Column = Column::new("weight", "weight (g)", ColumnType::Double, ColumnRole::Measurement);

static BY_METHOD_COLUMNS: [Column; 5] = [ID, SITE, METHOD, GENDER, LENGTH];
static BY_SITE_COLUMNS: [Column; 5] = [ID, SITE, GENDER, LENGTH, WEIGHT];

/// One of the two survey tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    /// `individuals_by_method`
    ByMethod,
    /// `individuals_by_site`
    BySite,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::ByMethod, Table::BySite];

    /// Table name in the store.
    pub const fn name(&self) -> &'static str {
        match self {
            Table::ByMethod => "individuals_by_method",
            Table::BySite => "individuals_by_site",
        }
    }

    /// All columns, `id` first.
    pub fn columns(&self) -> &'static [Column] {
        match self {
            Table::ByMethod => &BY_METHOD_COLUMNS,
            Table::BySite => &BY_SITE_COLUMNS,
        }
    }

    /// Columns supplied by callers, i.e. everything except `id`.
    pub fn data_columns(&self) -> &'static [Column] {
        &self.columns()[1..]
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Result<&'static Column, ColumnError> {
        self.columns()
            .iter()
            .find(|column| column.name == name)
            .ok_or_else(|| ColumnError::UnknownField {
                table: self.name(),
                field: name.to_owned(),
            })
    }

    /// CSV header titles in column order.
    pub fn csv_header(&self) -> Vec<&'static str> {
        self.columns().iter().map(|column| column.header).collect()
    }

    pub(crate) fn sequence(&self) -> String {
        format!("{}_id_seq", self.name())
    }

    /// Comma separated column names.
    pub(crate) fn column_list(&self) -> String {
        self.columns().iter().map(|column| column.name).collect::<Vec<_>>().join(", ")
    }

    pub(crate) fn create_sql(&self) -> String {
        let definitions: Vec<String> = self.columns().iter().map(Column::definition).collect();
        format!(
            "CREATE SEQUENCE IF NOT EXISTS {}; CREATE TABLE IF NOT EXISTS {} ({});",
            self.sequence(),
            self.name(),
            definitions.join(", ")
        )
    }

    /// Validates caller supplied fields. Every name must be a data column and
    /// may appear once; with `complete` every data column must be present.
    pub(crate) fn validate(
        &self,
        fields: &[(&str, &str)],
        complete: bool,
    ) -> Result<Vec<(&'static Column, ColumnValue)>, ColumnError> {
        let mut values: Vec<(&'static Column, ColumnValue)> = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let column = self.column(name)?;
            if column.role == ColumnRole::Id {
                return Err(ColumnError::ImmutableId);
            }
            if values.iter().any(|(seen, _)| seen.name == column.name) {
                return Err(ColumnError::DuplicateField(column.name.to_owned()));
            }
            values.push((column, column.parse_value(value)?));
        }
        if complete {
            if let Some(missing) = self
                .data_columns()
                .iter()
                .find(|column| !values.iter().any(|(seen, _)| seen.name == column.name))
            {
                return Err(ColumnError::MissingField(missing.name.to_owned()));
            }
            // store order
            values.sort_by_key(|(column, _)| self.columns().iter().position(|it| it.name == column.name));
        }
        Ok(values)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = ColumnError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "individuals_by_method" | "by_method" => Ok(Table::ByMethod),
            "individuals_by_site" | "by_site" => Ok(Table::BySite),
            _ => Err(ColumnError::UnknownTable(name.to_owned())),
        }
    }
}
