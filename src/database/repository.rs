use crate::database::column::ColumnValue;
use crate::database::table::Table;
use crate::error::SurveyError;
use crate::survey::ObservationByMethod;
use crate::survey::ObservationBySite;
use crate::survey::Observation;
use crate::survey::Record;
use duckdb::params_from_iter;
use duckdb::Connection;
use duckdb::Row;
use std::path::Path;
use std::sync::Mutex;
use std::sync::MutexGuard;
use tracing::debug;
use tracing::info;

/// A tidy observation type stored in one of the survey tables.
pub trait TableRow: Sized {
    const TABLE: Table;

    /// Values of the data columns, in [`Table::data_columns`] order.
    fn values(&self) -> Vec<ColumnValue>;

    /// Reads the data columns of a row selected with `id` in column 0.
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self>;
}

impl TableRow for ObservationByMethod {
    const TABLE: Table = Table::ByMethod;

    fn values(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::Varchar(self.site.to_owned()),
            ColumnValue::Varchar(self.method.name().to_owned()),
            ColumnValue::Varchar(self.gender.code().to_owned()),
            ColumnValue::Double(self.length),
        ]
    }

    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(ObservationByMethod {
            site: row.get(1)?,
            method: row.get(2)?,
            gender: row.get(3)?,
            length: row.get(4)?,
        })
    }
}

impl TableRow for ObservationBySite {
    const TABLE: Table = Table::BySite;

    fn values(&self) -> Vec<ColumnValue> {
        vec![
            ColumnValue::Varchar(self.site.to_owned()),
            ColumnValue::Varchar(self.gender.code().to_owned()),
            ColumnValue::Double(self.length),
            ColumnValue::Double(self.weight),
        ]
    }

    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(ObservationBySite {
            site: row.get(1)?,
            gender: row.get(2)?,
            length: row.get(3)?,
            weight: row.get(4)?,
        })
    }
}

/// Sort order of a listing.
#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

/// Exact-match filters and an optional sort key for [`Repository::list_all`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<(String, String)>,
    pub sort: Option<SortKey>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: &str, value: &str) -> Self {
        self.filters.push((column.to_owned(), value.to_owned()));
        self
    }

    pub fn sort_by(mut self, column: &str, descending: bool) -> Self {
        self.sort = Some(SortKey {
            column: column.to_owned(),
            descending,
        });
        self
    }
}

/// System of record for the two survey tables, backed by DuckDB.
///
/// A single connection sits behind a mutex: writers are serialized and each
/// mutation commits before returning, so readers only ever see whole
/// replacements.
pub struct Repository {
    connection: Mutex<Connection>,
}

impl Repository {
    /// Opens (or creates) the store at `path`; `:memory:` opens a private
    /// in-memory database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Repository, SurveyError> {
        let path = path.as_ref();
        if path.as_os_str() == ":memory:" {
            return Self::open_in_memory();
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "opening survey store");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Repository, SurveyError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(connection: Connection) -> Result<Repository, SurveyError> {
        for table in Table::ALL {
            connection.execute_batch(&table.create_sql())?;
        }
        Ok(Repository {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SurveyError> {
        self.connection.lock().map_err(|_| SurveyError::StoragePoisoned)
    }

    /// Replaces every row of `R::TABLE` with `rows` in one transaction.
    /// On failure the previous contents are kept.
    pub fn bulk_replace<R: TableRow>(&self, rows: &[R]) -> Result<usize, SurveyError> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;
        let count = replace_rows(&transaction, rows)?;
        transaction.commit()?;
        info!(table = %R::TABLE, rows = count, "replaced table");
        Ok(count)
    }

    /// Replaces both tables in one transaction.
    pub fn replace_dataset(
        &self,
        by_method: &[ObservationByMethod],
        by_site: &[ObservationBySite],
    ) -> Result<(usize, usize), SurveyError> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;
        let counts = (replace_rows(&transaction, by_method)?, replace_rows(&transaction, by_site)?);
        transaction.commit()?;
        info!(by_method = counts.0, by_site = counts.1, "replaced survey dataset");
        Ok(counts)
    }

    /// Inserts one row from caller supplied fields and returns its id.
    ///
    /// # Arguments
    ///
    /// * `table` - Target table
    /// * `fields` - `(column, value)` pairs covering every data column
    ///
    /// # Returns
    ///
    /// Returns the generated id, or a validation error when a field is
    /// missing, unknown or does not parse.
    pub fn insert(&self, table: Table, fields: &[(&str, &str)]) -> Result<i64, SurveyError> {
        let values = table.validate(fields, true)?;
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;
        let id: i64 = transaction.query_row(&format!("SELECT nextval('{}')", table.sequence()), [], |row| row.get(0))?;
        let mut params = vec![ColumnValue::BigInt(id)];
        params.extend(values.into_iter().map(|(_, value)| value));
        transaction.execute(&insert_sql(table, false), params_from_iter(params.iter()))?;
        transaction.commit()?;
        debug!(table = %table, id, "inserted row");
        Ok(id)
    }

    /// Fetches one row; absence is `Ok(None)`.
    pub fn get(&self, table: Table, id: i64) -> Result<Option<Record>, SurveyError> {
        let connection = self.lock()?;
        select_record(&connection, table, id)
    }

    /// Sets only the supplied fields of an existing row and returns the row
    /// as stored afterwards.
    pub fn update_partial(&self, table: Table, id: i64, fields: &[(&str, &str)]) -> Result<Record, SurveyError> {
        let values = table.validate(fields, false)?;
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;
        if !values.is_empty() {
            let assignments: Vec<String> = values.iter().map(|(column, _)| format!("{} = ?", column.name)).collect();
            let mut params: Vec<ColumnValue> = values.into_iter().map(|(_, value)| value).collect();
            params.push(ColumnValue::BigInt(id));
            let sql = format!("UPDATE {} SET {} WHERE id = ?", table.name(), assignments.join(", "));
            transaction.execute(&sql, params_from_iter(params.iter()))?;
        }
        let record = select_record(&transaction, table, id)?.ok_or(SurveyError::NotFound {
            table: table.name(),
            id,
        })?;
        transaction.commit()?;
        debug!(table = %table, id, fields = fields.len(), "updated row");
        Ok(record)
    }

    /// Deletes one row. Deleting an absent id is a not-found error.
    pub fn delete(&self, table: Table, id: i64) -> Result<(), SurveyError> {
        let connection = self.lock()?;
        let deleted = connection.execute(&format!("DELETE FROM {} WHERE id = ?", table.name()), [id])?;
        if deleted == 0 {
            return Err(SurveyError::NotFound {
                table: table.name(),
                id,
            });
        }
        debug!(table = %table, id, "deleted row");
        Ok(())
    }

    /// Lists rows matching every filter, in insertion order unless a sort key
    /// is given.
    pub fn list_all(&self, table: Table, query: &ListQuery) -> Result<Vec<Record>, SurveyError> {
        let mut conditions: Vec<String> = Vec::with_capacity(query.filters.len());
        let mut params: Vec<ColumnValue> = Vec::with_capacity(query.filters.len());
        for (name, value) in &query.filters {
            let column = table.column(name)?;
            params.push(column.parse_value(value)?);
            conditions.push(format!("{} = ?", column.name));
        }
        let mut sql = format!("SELECT {} FROM {}", table.column_list(), table.name());
        if !conditions.is_empty() {
            sql.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
        }
        match &query.sort {
            Some(sort) => {
                let column = table.column(&sort.column)?;
                let direction = if sort.descending { "DESC" } else { "ASC" };
                sql.push_str(&format!(" ORDER BY {} {}, id", column.name, direction));
            }
            None => sql.push_str(" ORDER BY id"),
        }

        let connection = self.lock()?;
        let mut statement = connection.prepare(&sql)?;
        let rows = statement.query_map(params_from_iter(params.iter()), |row| read_record(table, row))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// By-method observations in insertion order, optionally for one site.
    pub fn observations_by_method(&self, site: Option<&str>) -> Result<Vec<ObservationByMethod>, SurveyError> {
        self.observations(site)
    }

    /// By-site observations in insertion order, optionally for one site.
    pub fn observations_by_site(&self, site: Option<&str>) -> Result<Vec<ObservationBySite>, SurveyError> {
        self.observations(site)
    }

    fn observations<R: TableRow>(&self, site: Option<&str>) -> Result<Vec<R>, SurveyError> {
        let table = R::TABLE;
        let connection = self.lock()?;
        let filter = if site.is_some() { " WHERE site = ?" } else { "" };
        let sql = format!("SELECT {} FROM {}{} ORDER BY id", table.column_list(), table.name(), filter);
        let mut statement = connection.prepare(&sql)?;
        let rows = statement.query_map(params_from_iter(site.iter()), |row| R::from_row(row))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Number of rows in a table.
    pub fn count(&self, table: Table) -> Result<usize, SurveyError> {
        let connection = self.lock()?;
        let count: i64 = connection.query_row(&format!("SELECT count(*) FROM {}", table.name()), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Distinct sites in order of first insertion.
    pub fn sites(&self, table: Table) -> Result<Vec<String>, SurveyError> {
        let connection = self.lock()?;
        let sql = format!("SELECT site FROM {} GROUP BY site ORDER BY min(id)", table.name());
        let mut statement = connection.prepare(&sql)?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn insert_sql(table: Table, generate_id: bool) -> String {
    let id = if generate_id {
        format!("nextval('{}')", table.sequence())
    } else {
        "?".to_owned()
    };
    let placeholders = vec!["?"; table.data_columns().len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}, {})",
        table.name(),
        table.column_list(),
        id,
        placeholders
    )
}

fn replace_rows<R: TableRow>(connection: &Connection, rows: &[R]) -> Result<usize, SurveyError> {
    let table = R::TABLE;
    let removed = connection.execute(&format!("DELETE FROM {}", table.name()), [])?;
    let mut statement = connection.prepare(&insert_sql(table, true))?;
    for row in rows {
        statement.execute(params_from_iter(row.values()))?;
    }
    debug!(table = %table, removed, inserted = rows.len(), "rewrote table rows");
    Ok(rows.len())
}

fn read_record(table: Table, row: &Row<'_>) -> duckdb::Result<Record> {
    let observation: Observation = match table {
        Table::ByMethod => ObservationByMethod::from_row(row)?.into(),
        Table::BySite => ObservationBySite::from_row(row)?.into(),
    };
    Ok(Record {
        id: row.get(0)?,
        observation,
    })
}

fn select_record(connection: &Connection, table: Table, id: i64) -> Result<Option<Record>, SurveyError> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?", table.column_list(), table.name());
    let mut statement = connection.prepare(&sql)?;
    let mut rows = statement.query_map([id], |row| read_record(table, row))?;
    Ok(rows.next().transpose()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::survey::Gender;
    use crate::survey::Method;

    fn by_method(site: &str, method: Method, gender: Gender, length: f64) -> ObservationByMethod {
        ObservationByMethod {
            site: site.to_owned(),
            method,
            gender,
            length,
        }
    }

    fn by_site(site: &str, gender: Gender, length: f64, weight: f64) -> ObservationBySite {
        ObservationBySite {
            site: site.to_owned(),
            gender,
            length,
            weight,
        }
    }

    fn sample() -> Vec<ObservationBySite> {
        vec![
            by_site("S1", Gender::Male, 40.0, 20.0),
            by_site("S2", Gender::Female, 35.5, 15.0),
            by_site("S1", Gender::Female, 30.0, 12.0),
        ]
    }

    #[test]
    fn bulk_replace_is_idempotent() {
        let repository = Repository::open_in_memory().unwrap();
        repository.bulk_replace(&sample()).unwrap();
        let first = repository.observations_by_site(None).unwrap();
        repository.bulk_replace(&sample()).unwrap();
        let second = repository.observations_by_site(None).unwrap();
        assert_eq!(first, sample());
        assert_eq!(first, second);
        assert_eq!(repository.count(Table::BySite).unwrap(), 3);
        assert_eq!(repository.sites(Table::BySite).unwrap(), vec!["S1".to_owned(), "S2".to_owned()]);
    }

    #[test]
    fn failed_bulk_replace_keeps_previous_rows() {
        let repository = Repository::open_in_memory().unwrap();
        repository.bulk_replace(&sample()).unwrap();
        let mut broken = sample();
        broken[1].weight = -1.0;
        let error = repository.bulk_replace(&broken).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Storage);
        assert_eq!(repository.observations_by_site(None).unwrap(), sample());
    }

    #[test]
    fn replace_dataset_is_all_or_nothing() {
        let repository = Repository::open_in_memory().unwrap();
        let methods = vec![by_method("S1", Method::Trapping, Gender::Male, 50.0)];
        assert_eq!(repository.replace_dataset(&methods, &sample()).unwrap(), (1, 3));

        let broken_methods = vec![by_method("S1", Method::Drawdown, Gender::Female, 0.0)];
        assert!(repository.replace_dataset(&broken_methods, &[]).is_err());
        assert_eq!(repository.observations_by_method(None).unwrap(), methods);
        assert_eq!(repository.count(Table::BySite).unwrap(), 3);
    }

    #[test]
    fn insert_get_update_delete() {
        let repository = Repository::open_in_memory().unwrap();
        let id = repository
            .insert(Table::ByMethod, &[("site", "S1"), ("method", "Drawdown"), ("gender", "F"), ("length", "42.5")])
            .unwrap();
        let record = repository.get(Table::ByMethod, id).unwrap().unwrap();
        assert_eq!(record.observation, Observation::ByMethod(by_method("S1", Method::Drawdown, Gender::Female, 42.5)));

        let updated = repository.update_partial(Table::ByMethod, id, &[("length", "44")]).unwrap();
        assert_eq!(updated.id, id);
        assert_eq!(updated.observation, Observation::ByMethod(by_method("S1", Method::Drawdown, Gender::Female, 44.0)));

        repository.delete(Table::ByMethod, id).unwrap();
        assert_eq!(repository.get(Table::ByMethod, id).unwrap(), None);
        let error = repository.delete(Table::ByMethod, id).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn invalid_input_is_validation_error() {
        let repository = Repository::open_in_memory().unwrap();
        let missing = repository.insert(Table::BySite, &[("site", "S1"), ("gender", "M"), ("length", "4")]);
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::Validation);
        let not_a_number = repository.insert(Table::BySite, &[("site", "S1"), ("gender", "M"), ("length", "4"), ("weight", "heavy")]);
        assert_eq!(not_a_number.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(repository.count(Table::BySite).unwrap(), 0);
    }

    #[test]
    fn update_of_absent_row_is_not_found() {
        let repository = Repository::open_in_memory().unwrap();
        let error = repository.update_partial(Table::BySite, 99, &[("weight", "3")]).unwrap_err();
        assert!(matches!(error, SurveyError::NotFound { id: 99, .. }));
        let error = repository.update_partial(Table::BySite, 99, &[]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn list_all_filters_and_sorts() {
        let repository = Repository::open_in_memory().unwrap();
        repository.bulk_replace(&sample()).unwrap();

        let all = repository.list_all(Table::BySite, &ListQuery::new()).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|pair| pair[0].id < pair[1].id));

        let s1 = repository.list_all(Table::BySite, &ListQuery::new().filter("site", "S1")).unwrap();
        assert_eq!(s1.len(), 2);

        let females = ListQuery::new().filter("site", "S1").filter("gender", "F");
        assert_eq!(repository.list_all(Table::BySite, &females).unwrap().len(), 1);

        let by_length = repository.list_all(Table::BySite, &ListQuery::new().sort_by("length", true)).unwrap();
        let lengths: Vec<f64> = by_length
            .iter()
            .map(|record| match &record.observation {
                Observation::BySite(observation) => observation.length,
                Observation::ByMethod(observation) => observation.length,
            })
            .collect();
        assert_eq!(lengths, vec![40.0, 35.5, 30.0]);

        let unknown = repository.list_all(Table::BySite, &ListQuery::new().filter("method", "Trapping"));
        assert_eq!(unknown.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn typed_reads_filter_by_site() {
        let repository = Repository::open_in_memory().unwrap();
        repository.bulk_replace(&sample()).unwrap();
        let rows = repository.observations_by_site(Some("S1")).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.site == "S1"));
        assert!(repository.observations_by_site(Some("S9")).unwrap().is_empty());
    }

    #[test]
    fn writes_are_durable() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("instance").join("survey.duckdb");
        let id = {
            let repository = Repository::open(&path).unwrap();
            repository.bulk_replace(&sample()).unwrap();
            repository
                .insert(Table::BySite, &[("site", "S3"), ("gender", "F"), ("length", "25"), ("weight", "9")])
                .unwrap()
        };
        let repository = Repository::open(&path).unwrap();
        assert_eq!(repository.count(Table::BySite).unwrap(), 4);
        assert!(repository.get(Table::BySite, id).unwrap().is_some());
    }

    #[test]
    fn concurrent_inserts_are_serialized() {
        let repository = Repository::open_in_memory().unwrap();
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let repository = &repository;
                scope.spawn(move || {
                    for index in 0..5 {
                        let length = format!("{}", 10 + worker * 5 + index);
                        repository
                            .insert(Table::ByMethod, &[("site", "S1"), ("method", "Trapping"), ("gender", "M"), ("length", &length)])
                            .unwrap();
                    }
                });
            }
        });
        assert_eq!(repository.count(Table::ByMethod).unwrap(), 20);
    }
}
