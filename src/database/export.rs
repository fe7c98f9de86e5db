//! CSV export of the survey tables.

use crate::database::repository::ListQuery;
use crate::database::repository::Repository;
use crate::database::table::Table;
use crate::error::SurveyError;
use crate::survey::Observation;
use crate::survey::Record;
use std::io::Write;

/// Writes the header row of `table` followed by one line per record, in the
/// order given.
pub fn write_csv<W: Write>(table: Table, records: &[Record], writer: W) -> Result<(), SurveyError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(table.csv_header())?;
    for record in records {
        let mut fields = vec![record.id.to_string()];
        match &record.observation {
            Observation::ByMethod(observation) => fields.extend([
                observation.site.to_owned(),
                observation.method.to_string(),
                observation.gender.to_string(),
                observation.length.to_string(),
            ]),
            Observation::BySite(observation) => fields.extend([
                observation.site.to_owned(),
                observation.gender.to_string(),
                observation.length.to_string(),
                observation.weight.to_string(),
            ]),
        }
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

impl Repository {
    /// Exports the rows selected by `query` as CSV.
    pub fn export_csv<W: Write>(&self, table: Table, query: &ListQuery, writer: W) -> Result<usize, SurveyError> {
        let records = self.list_all(table, query)?;
        write_csv(table, &records, writer)?;
        Ok(records.len())
    }
}
