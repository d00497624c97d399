use crate::types::Cell;

/// A flat JSON object ready to be inserted into a destination table.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A source row as an ordered list of named cells.
///
/// Column order follows the select list of the extraction query. Rows are read-only once
/// fetched: sanitizing produces a new [`Record`] and leaves the row untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Cell)>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty row with room for `capacity` columns.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Appends a column and returns the row, for building rows inline.
    pub fn with(mut self, name: impl Into<String>, cell: impl Into<Cell>) -> Self {
        self.push(name, cell);
        self
    }

    /// Appends a column.
    pub fn push(&mut self, name: impl Into<String>, cell: impl Into<Cell>) {
        self.columns.push((name.into(), cell.into()));
    }

    /// Returns the cell of the first column named `name`.
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, cell)| cell)
    }

    /// Iterates over `(column, cell)` pairs in select order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns
            .iter()
            .map(|(column, cell)| (column.as_str(), cell))
    }
}

impl From<Record> for Row {
    fn from(record: Record) -> Self {
        let mut row = Row::with_capacity(record.len());
        for (column, value) in record {
            row.push(column, Cell::from_json(value));
        }

        row
    }
}
