//! In-memory `.xlsx` workbooks for tests, written with `zip::ZipWriter` so the
//! reader is exercised through the real archive and XML path.

use quick_xml::escape::escape;
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A literal cell value in a test workbook.
#[derive(Clone, Debug)]
pub(crate) enum TestCell {
    Text(String),
    Number(f64),
}

impl From<&str> for TestCell {
    fn from(text: &str) -> Self {
        TestCell::Text(text.to_owned())
    }
}

impl From<f64> for TestCell {
    fn from(value: f64) -> Self {
        TestCell::Number(value)
    }
}

pub(crate) type TestRow = Vec<Option<TestCell>>;

#[derive(Default)]
pub(crate) struct WorkbookBuilder {
    sheets: Vec<(String, Vec<TestRow>)>,
    use_shared_strings: bool,
}

impl WorkbookBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn sheet(mut self, name: &str, rows: Vec<TestRow>) -> Self {
        self.sheets.push((name.to_owned(), rows));
        self
    }

    /// Stores text cells in `xl/sharedStrings.xml` instead of inline.
    pub(crate) fn shared_strings(mut self) -> Self {
        self.use_shared_strings = true;
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut shared: Vec<String> = Vec::new();
        let worksheets: Vec<String> = self
            .sheets
            .iter()
            .map(|(_, rows)| worksheet_xml(rows, self.use_shared_strings.then_some(&mut shared)))
            .collect();

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        let mut workbook = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
        );
        let mut relationships = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (index, (name, _)) in self.sheets.iter().enumerate() {
            let number = index + 1;
            workbook.push_str(&format!(
                r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#,
                escape(name.as_str())
            ));
            relationships.push_str(&format!(
                r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#
            ));
        }
        let styles_id = self.sheets.len() + 1;
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{styles_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
        ));
        workbook.push_str("</sheets></workbook>");
        relationships.push_str("</Relationships>");

        write_part(&mut writer, options, "xl/workbook.xml", &workbook);
        write_part(&mut writer, options, "xl/_rels/workbook.xml.rels", &relationships);
        for (index, xml) in worksheets.iter().enumerate() {
            write_part(&mut writer, options, &format!("xl/worksheets/sheet{}.xml", index + 1), xml);
        }
        if self.use_shared_strings {
            let mut xml = format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
                shared.len()
            );
            for text in &shared {
                xml.push_str(&format!("<si><t>{}</t><rPh sb=\"0\" eb=\"1\"><t>x</t></rPh></si>", escape(text.as_str())));
            }
            xml.push_str("</sst>");
            write_part(&mut writer, options, "xl/sharedStrings.xml", &xml);
        }

        writer.finish().expect("finish test workbook").into_inner()
    }
}

fn write_part(writer: &mut ZipWriter<Cursor<Vec<u8>>>, options: SimpleFileOptions, name: &str, content: &str) {
    writer.start_file(name, options).expect("start zip entry");
    writer.write_all(content.as_bytes()).expect("write zip entry");
}

fn worksheet_xml(rows: &[TestRow], mut shared: Option<&mut Vec<String>>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (row, cells) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for (col, cell) in cells.iter().enumerate() {
            let reference = crate::spreadsheet::reference::index_to_reference(row, col);
            match cell {
                None => xml.push_str(&format!(r#"<c r="{reference}"/>"#)),
                Some(TestCell::Number(value)) => {
                    xml.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#))
                }
                Some(TestCell::Text(text)) => match shared.as_deref_mut() {
                    Some(table) => {
                        let index = match table.iter().position(|it| it == text) {
                            Some(index) => index,
                            None => {
                                table.push(text.to_owned());
                                table.len() - 1
                            }
                        };
                        xml.push_str(&format!(r#"<c r="{reference}" t="s"><v>{index}</v></c>"#));
                    }
                    None => xml.push_str(&format!(
                        r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(text.as_str())
                    )),
                },
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Text cell shorthand.
pub(crate) fn t(text: &str) -> Option<TestCell> {
    Some(TestCell::Text(text.to_owned()))
}

/// Number cell shorthand.
pub(crate) fn n(value: f64) -> Option<TestCell> {
    Some(TestCell::Number(value))
}

/// A by-method sheet (three header rows, one separator row, then data) with
/// the leading index column the survey export always writes.
///
/// `groups` lists `(site, method)` column groups, each with Gender and
/// Carapace length columns; `data` rows hold `(gender, length)` pairs per group.
pub(crate) fn by_method_sheet(groups: &[(&str, &str)], data: &[Vec<(Option<TestCell>, Option<TestCell>)>]) -> Vec<TestRow> {
    let mut site_row: TestRow = vec![None];
    let mut method_row: TestRow = vec![None];
    let mut info_row: TestRow = vec![None];
    for (index, (site, method)) in groups.iter().enumerate() {
        let first_of_site = index == 0 || groups[index - 1].0 != *site;
        site_row.push(if first_of_site { t(site) } else { None });
        site_row.push(None);
        method_row.push(t(method));
        method_row.push(None);
        info_row.push(t("Gender"));
        info_row.push(t("Carapace length  (mm)"));
    }
    let mut rows = vec![site_row, method_row, info_row, vec![None]];
    for (number, record) in data.iter().enumerate() {
        let mut row: TestRow = vec![n(number as f64)];
        for (gender, length) in record {
            row.push(gender.clone());
            row.push(length.clone());
        }
        rows.push(row);
    }
    rows
}

/// A by-site sheet (two header rows, one separator row, then data) with a
/// leading index column; `data` rows hold `(gender, length, weight)` per site.
pub(crate) fn by_site_sheet(
    sites: &[&str],
    data: &[Vec<(Option<TestCell>, Option<TestCell>, Option<TestCell>)>],
) -> Vec<TestRow> {
    let mut site_row: TestRow = vec![None];
    let mut info_row: TestRow = vec![None];
    for site in sites {
        site_row.extend([t(site), None, None]);
        info_row.extend([t("Gender"), t("Carapace length (mm)"), t("Weight (g)")]);
    }
    let mut rows = vec![site_row, info_row, vec![None]];
    for (number, record) in data.iter().enumerate() {
        let mut row: TestRow = vec![n(number as f64)];
        for (gender, length, weight) in record {
            row.extend([gender.clone(), length.clone(), weight.clone()]);
        }
        rows.push(row);
    }
    rows
}
