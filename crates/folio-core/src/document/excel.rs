//! Spreadsheet workbook model

use serde::{Deserialize, Serialize};

use super::{LibraryError, LibraryResult, check_index};

/// Largest sheet a cell write may grow to
pub const MAX_ROWS: usize = 1_048_576;
pub const MAX_COLUMNS: usize = 16_384;

/// Length needed to hold `index`, bounded by `max`
fn grown_len(what: &str, index: usize, max: usize) -> LibraryResult<usize> {
    index
        .checked_add(1)
        .filter(|len| *len <= max)
        .ok_or_else(|| {
            LibraryError::Invalid(format!(
                "{} index {} exceeds the sheet limit of {}",
                what, index, max
            ))
        })
}

/// A workbook made of named worksheets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Worksheet>,
}

/// A worksheet of string cells, stored row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl Workbook {
    /// A workbook with a single empty sheet named `Sheet1`
    pub fn new() -> Self {
        Self {
            sheets: vec![Worksheet::new("Sheet1")],
        }
    }

    /// Look up a sheet by name, or the first sheet when `name` is None
    pub fn sheet(&self, name: Option<&str>) -> LibraryResult<&Worksheet> {
        let index = self.sheet_index(name)?;
        Ok(&self.sheets[index])
    }

    /// Mutable variant of [`Workbook::sheet`]
    pub fn sheet_mut(&mut self, name: Option<&str>) -> LibraryResult<&mut Worksheet> {
        let index = self.sheet_index(name)?;
        Ok(&mut self.sheets[index])
    }

    /// Append a new empty sheet; names must be unique (case-insensitive)
    pub fn add_sheet(&mut self, name: &str) -> LibraryResult<usize> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::Invalid("sheet name cannot be empty".to_string()));
        }
        if self.sheets.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
            return Err(LibraryError::Invalid(format!(
                "sheet '{}' already exists",
                name
            )));
        }
        self.sheets.push(Worksheet::new(name));
        Ok(self.sheets.len() - 1)
    }

    fn sheet_index(&self, name: Option<&str>) -> LibraryResult<usize> {
        match name {
            Some(name) => self
                .sheets
                .iter()
                .position(|s| s.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| LibraryError::Invalid(format!("sheet '{}' not found", name))),
            None if self.sheets.is_empty() => {
                Err(LibraryError::Invalid("workbook has no sheets".to_string()))
            }
            None => Ok(0),
        }
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Insert a row before `index` (`index == row_count` appends)
    pub fn insert_row(&mut self, index: usize, values: Vec<String>) -> LibraryResult<()> {
        if index > self.rows.len() {
            return Err(LibraryError::Invalid(format!(
                "row index {} is out of range (count: {})",
                index,
                self.rows.len()
            )));
        }
        self.rows.insert(index, values);
        Ok(())
    }

    pub fn delete_row(&mut self, index: usize) -> LibraryResult<Vec<String>> {
        check_index("row", index, self.rows.len())?;
        Ok(self.rows.remove(index))
    }

    /// Set a cell, growing the sheet as needed up to `MAX_ROWS` x `MAX_COLUMNS`
    pub fn set_cell(
        &mut self,
        row: usize,
        column: usize,
        value: impl Into<String>,
    ) -> LibraryResult<()> {
        let row_len = grown_len("row", row, MAX_ROWS)?;
        let column_len = grown_len("column", column, MAX_COLUMNS)?;
        if self.rows.len() < row_len {
            self.rows.resize_with(row_len, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() < column_len {
            cells.resize(column_len, String::new());
        }
        cells[column] = value.into();
        Ok(())
    }

    /// Cell value; empty or missing cells return None
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Rows `start..=end`, clamped to the sheet
    pub fn range(&self, start: usize, end: usize) -> &[Vec<String>] {
        if start >= self.rows.len() || start > end {
            return &[];
        }
        let end = end.min(self.rows.len() - 1);
        &self.rows[start..=end]
    }
}
