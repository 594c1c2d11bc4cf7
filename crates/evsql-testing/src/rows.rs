//! In-memory result sets.

use bytes::Bytes;
use evsql_driver::ResultSet;

/// A result set built by hand.
///
/// ```rust,ignore
/// let rows = MockRows::new(2)
///     .row([Some("1"), Some("alice")])
///     .row([Some("2"), None]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockRows {
    columns: usize,
    rows: Vec<Vec<Option<Bytes>>>,
}

impl MockRows {
    /// An empty result with `columns` columns.
    #[must_use]
    pub fn new(columns: usize) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// A one-row, one-column result.
    #[must_use]
    pub fn single(value: impl Into<Bytes>) -> Self {
        Self::new(1).row([Some(value)])
    }

    /// Append a row. Missing cells read as `NULL`, extra cells are dropped.
    #[must_use]
    pub fn row<I, V>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = Option<V>>,
        V: Into<Bytes>,
    {
        let mut row: Vec<Option<Bytes>> = cells
            .into_iter()
            .take(self.columns)
            .map(|cell| cell.map(Into::into))
            .collect();
        row.resize(self.columns, None);
        self.rows.push(row);
        self
    }
}

impl ResultSet for MockRows {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_count(&self) -> usize {
        self.columns
    }

    fn value(&self, row: usize, col: usize) -> Option<&[u8]> {
        self.rows.get(row)?.get(col)?.as_deref()
    }
}
