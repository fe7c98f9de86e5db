use crate::spreadsheet::reference::index_to_reference;
use std::fmt::Display;

/// Storage types of a worksheet cell, taken from the `t` attribute of `<c>`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (`t="b"`)
    Boolean,
    /// Numeric values (no `t` attribute or `t="n"`)
    Number,
    /// ISO 8601 date/time strings (`t="d"`), kept as text
    IsoDateTime,
    /// Inline strings and formula results (`t="inlineStr"`, `t="str"`)
    InlineString,
    /// Shared string table references (`t="s"`)
    SharedString,
    /// Error values (`t="e"`)
    Error,
}

impl CellType {
    pub(crate) fn from_attribute(t: Option<&str>) -> Self {
        match t {
            Some("inlineStr") | Some("str") => Self::InlineString,
            Some("s") => Self::SharedString,
            Some("d") => Self::IsoDateTime,
            Some("b") => Self::Boolean,
            Some("e") => Self::Error,
            _ => Self::Number,
        }
    }
}

/// Decoded content of a non-empty cell.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Spreadsheet error literal such as `#N/A`
    Error(String),
}

impl CellValue {
    /// Returns the numeric content of the cell, accepting numbers stored as text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) => Some(*value),
            CellValue::Text(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Returns the text content, if the cell holds text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// True for text cells that contain only whitespace, which count as blank.
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(text) if text.trim().is_empty())
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Text(text) => write!(f, "{}", text),
            CellValue::Number(value) => write!(f, "{}", value),
            CellValue::Bool(value) => write!(f, "{}", if *value { "TRUE" } else { "FALSE" }),
            CellValue::Error(error) => write!(f, "{}", error),
        }
    }
}

/// A single decoded cell with its zero-based position.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    pub value: CellValue,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Decodes the raw `<v>`/`<is>` content of a cell according to its type.
    pub(crate) fn decode(
        row: usize,
        col: usize,
        kind: CellType,
        raw: &str,
        shared_strings: &[String],
    ) -> Result<Option<Cell>, String> {
        let value = match kind {
            CellType::Empty => return Ok(None),
            CellType::Boolean => CellValue::Bool(raw.trim() == "1" || raw.trim().eq_ignore_ascii_case("true")),
            CellType::Number => CellValue::Number(
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| format!("parse '{}' to double failed", raw))?,
            ),
            CellType::IsoDateTime | CellType::InlineString => CellValue::Text(raw.to_owned()),
            CellType::SharedString => {
                let index = raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| format!("invalid shared string index '{}'", raw))?;
                let text = shared_strings
                    .get(index)
                    .ok_or_else(|| format!("shared string {} out of range", index))?;
                CellValue::Text(text.to_owned())
            }
            CellType::Error => CellValue::Error(raw.to_owned()),
        };
        Ok(Some(Cell { row, col, value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_by_type() {
        let shared = vec!["DGB2016".to_owned(), "M".to_owned()];
        let cell = Cell::decode(2, 1, CellType::SharedString, "1", &shared).unwrap().unwrap();
        assert_eq!(cell.value, CellValue::Text("M".to_owned()));
        assert_eq!(cell.reference(), "B3");

        let cell = Cell::decode(0, 0, CellType::Number, "43.5", &shared).unwrap().unwrap();
        assert_eq!(cell.value.as_number(), Some(43.5));

        let cell = Cell::decode(0, 0, CellType::Boolean, "1", &shared).unwrap().unwrap();
        assert_eq!(cell.value, CellValue::Bool(true));

        assert!(Cell::decode(0, 0, CellType::SharedString, "9", &shared).is_err());
        assert!(Cell::decode(0, 0, CellType::Number, "abc", &shared).is_err());
        assert_eq!(Cell::decode(0, 0, CellType::Empty, "", &shared).unwrap(), None);
    }

    #[test]
    fn numbers_stored_as_text() {
        assert_eq!(CellValue::Text(" 12.25 ".to_owned()).as_number(), Some(12.25));
        assert_eq!(CellValue::Text("M".to_owned()).as_number(), None);
        assert_eq!(CellValue::Error("#N/A".to_owned()).as_number(), None);
        assert!(CellValue::Text("   ".to_owned()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }
}
