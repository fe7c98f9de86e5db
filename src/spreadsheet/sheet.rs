use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use std::collections::HashMap;

/// A worksheet read from a workbook. Cells are kept sparse; `grid` expands
/// them into a dense row-major table starting at A1.
#[derive(Debug)]
pub struct Sheet {
    /// Source file name
    pub file_name: String,
    /// Sheet name
    pub name: String,
    /// All non-empty cells in document order
    cells: Vec<Cell>,
    /// Index mapping from (row, col) to cell vector position
    indexes: HashMap<(usize, usize), usize>,
    /// Actual data range (determined from cell data)
    row_upper_bound: Option<usize>,
    col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            indexes: HashMap::new(),
            row_upper_bound: None,
            col_upper_bound: None,
        }
    }

    /// Returns true if the sheet contains no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of rows from row 1 up to the last row holding a cell.
    pub fn height(&self) -> usize {
        self.row_upper_bound.map(|row| row + 1).unwrap_or(0)
    }

    /// Number of columns from column A up to the last column holding a cell.
    pub fn width(&self) -> usize {
        self.col_upper_bound.map(|col| col + 1).unwrap_or(0)
    }

    /// Adds a cell; a later cell at the same position replaces the earlier one.
    pub(crate) fn push(&mut self, cell: Cell) {
        self.row_upper_bound = Some(self.row_upper_bound.map_or(cell.row, |row| row.max(cell.row)));
        self.col_upper_bound = Some(self.col_upper_bound.map_or(cell.col, |col| col.max(cell.col)));
        match self.indexes.get(&(cell.row, cell.col)) {
            Some(index) => self.cells[*index] = cell,
            None => {
                self.indexes.insert((cell.row, cell.col), self.cells.len());
                self.cells.push(cell);
            }
        }
    }

    /// Gets the value at a zero-based position.
    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.indexes
            .get(&(row, col))
            .and_then(|index| self.cells.get(*index))
            .map(|cell| &cell.value)
    }

    /// Expands the sheet into a dense grid of `height() x width()` optional values.
    pub fn grid(&self) -> Vec<Vec<Option<CellValue>>> {
        let mut grid = vec![vec![None; self.width()]; self.height()];
        for cell in &self.cells {
            grid[cell.row][cell.col] = Some(cell.value.clone());
        }
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(sheet: &mut Sheet, row: usize, col: usize, text: &str) {
        sheet.push(Cell {
            row,
            col,
            value: CellValue::Text(text.to_owned()),
        });
    }

    #[test]
    fn sheet_initial() {
        let sheet = Sheet::new("", "");
        assert!(sheet.is_empty());
        assert_eq!(sheet.height(), 0);
        assert_eq!(sheet.width(), 0);
        assert!(sheet.grid().is_empty());
    }

    #[test]
    fn sheet_update() {
        let mut sheet = Sheet::new("book.xlsx", "Sheet_name_1");
        push(&mut sheet, 1, 1, "a");
        push(&mut sheet, 1, 3, "b");
        push(&mut sheet, 3, 1, "c");
        push(&mut sheet, 3, 3, "d");

        assert_eq!(sheet.height(), 4);
        assert_eq!(sheet.width(), 4);
        assert_eq!(sheet.get(1, 3), Some(&CellValue::Text("b".to_owned())));
        assert_eq!(sheet.get(0, 0), None);

        let grid = sheet.grid();
        assert_eq!(grid.len(), 4);
        assert!(grid[0].iter().all(Option::is_none));
        assert!(grid[2].iter().all(Option::is_none));
        assert_eq!(grid[3][1], Some(CellValue::Text("c".to_owned())));
    }

    #[test]
    fn sheet_replace_same_position() {
        let mut sheet = Sheet::new("", "");
        push(&mut sheet, 0, 0, "old");
        push(&mut sheet, 0, 0, "new");
        assert_eq!(sheet.get(0, 0), Some(&CellValue::Text("new".to_owned())));
        assert_eq!(sheet.grid(), vec![vec![Some(CellValue::Text("new".to_owned()))]]);
    }
}
