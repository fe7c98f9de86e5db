use crate::error::SurveyError;
use crate::helpers::reader::SourceReader;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;
use zip::read::ZipFile;
use zip::ZipArchive;

// XML tag names for parsing Excel XLSX format
const TAG_RELATIONSHIP: &[u8] = b"Relationship"; // Part relationship
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_SHEET: QName = QName(b"sheet");             // Worksheet definition
const TAG_ROW: QName = QName(b"row");                 // Row in worksheet
const TAG_CELL: QName = QName(b"c");                  // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");        // Inline string value
const TAG_VALUE: QName = QName(b"v");                 // Cell value content

/// An Excel 2007+ workbook (`.xlsx`, `.xlsm`) opened for reading.
pub struct XlsxWorkbook {
    /// File name of the workbook
    pub(crate) name: String,
    /// ZIP archive containing the workbook parts
    zip: ZipArchive<SourceReader>,
    /// Worksheets as (name, zip_path) pairs in workbook order
    sheets: Vec<(String, String)>,
    /// Shared string table, loaded on first sheet read
    shared_strings: Option<Vec<String>>,
}

impl XlsxWorkbook {
    /// Opens a workbook file and reads its sheet directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<XlsxWorkbook, SurveyError> {
        let name = path.as_ref().to_string_lossy().to_string();
        Self::new(name, SourceReader::open(path.as_ref())?)
    }

    /// Opens a workbook held in memory; `name` is only used in messages.
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<XlsxWorkbook, SurveyError> {
        Self::new(name.to_owned(), SourceReader::from_bytes(bytes))
    }

    fn new(name: String, reader: SourceReader) -> Result<XlsxWorkbook, SurveyError> {
        let mut zip = ZipArchive::new(reader)?;
        let sheets = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
        }
        debug!(workbook = %name, sheets = sheets.len(), "opened workbook");
        Ok(XlsxWorkbook {
            name,
            zip,
            sheets,
            shared_strings: None,
        })
    }

    /// Returns the worksheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads every cell of the named worksheet.
    pub fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, SurveyError> {
        let zip_path = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetNotFound {
                file_name: self.name.to_owned(),
                sheet_name: sheet_name.to_owned(),
            })?;
        if self.shared_strings.is_none() {
            self.shared_strings = Some(load_shared_strings(&mut self.zip)?);
        }
        let shared_strings = self.shared_strings.as_deref().unwrap_or_default();

        let mut sheet = Sheet::new(&self.name, sheet_name);
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut reader = self
            .zip
            .xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                // rows without an r attribute follow the previous one
                row_count = event.get_attribute_value("r")?
                    .and_then(|number| number.parse::<usize>().ok())
                    .map(|number| number.saturating_sub(1))
                    .unwrap_or(row_count);
                col_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => {
                row_count += 1;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                kind = CellType::from_attribute(event.get_attribute_value("t")?.as_deref());
                value.clear();
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if !value.is_empty() {
                    let cell = Cell::decode(row, col, kind, &value, shared_strings).map_err(|message| {
                        SpreadsheetError::CellValueError(
                            self.name.to_owned(),
                            sheet_name.to_owned(),
                            index_to_reference(row, col),
                            message,
                        )
                    })?;
                    if let Some(cell) = cell {
                        sheet.push(cell);
                    }
                }
                kind = CellType::default();
                value.clear();
            }
        });
        debug!(sheet = sheet_name, rows = sheet.height(), columns = sheet.width(), "read worksheet");
        Ok(sheet)
    }
}

/// Loads worksheet names and their part paths from `xl/workbook.xml`.
fn load_workbook(zip: &mut ZipArchive<SourceReader>) -> Result<Vec<(String, String)>, SurveyError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
    });
    Ok(sheets)
}

/// Maps relationship ids to worksheet part paths.
fn load_relationships(zip: &mut ZipArchive<SourceReader>, path: &str) -> Result<HashMap<String, String>, SurveyError> {
    let mut reader = zip
        .xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only worksheet relationships
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Loads the whole shared string table; a workbook without one has no shared strings.
fn load_shared_strings(zip: &mut ZipArchive<SourceReader>) -> Result<Vec<String>, SurveyError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Normalizes a relationship target to a path inside the archive.
fn to_zip_path(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Reads string content up to `end_tag`, skipping phonetic runs and
/// concatenating rich-text runs.
fn read_string_value(
    reader: &mut XmlReader<BufReader<ZipFile<'_, SourceReader>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, SurveyError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
