//! Generic decoding of whitespace-delimited tabular command output.
//!
//! Slurm's table-producing commands (`squeue`, `sinfo`) emit a header line
//! followed by data rows, all delimited by runs of whitespace. Each command
//! determines its own column set, so the table type is generic over arbitrary
//! column names rather than a fixed schema.

use thiserror::Error;

/// Error type for table decoding failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The output had no lines at all, not even a header
    #[error("command produced no output")]
    EmptyOutput,

    /// A column the caller requires is absent from the header
    #[error("column '{0}' not found in output")]
    MissingColumn(String),
}

/// Structured decoding of tabular command output.
///
/// The column count is fixed at parse time from the header line. Rows are
/// stored positionally and may carry fewer cells than there are columns
/// ("ragged" rows); a cell is associated with a column by index up to the
/// row's own length.
///
/// # Examples
/// ```
/// use smon::table::Table;
///
/// let table = Table::parse("JOBID ST\n123 R\n").unwrap();
/// assert_eq!(table.columns(), ["JOBID", "ST"]);
/// assert_eq!(table.cell(0, 1), Some("R"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse raw command output into a table.
    ///
    /// The first line is the header, tokenized by splitting on whitespace
    /// runs; every subsequent line is tokenized the same way, so cell/column
    /// alignment is purely positional. Fixed-width slicing is deliberately
    /// not used: Slurm pads columns with spaces but never guarantees widths.
    ///
    /// # Errors
    /// Returns [`ParseError::EmptyOutput`] if `raw` contains no lines.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let mut lines = raw.lines();
        let header = lines.next().ok_or(ParseError::EmptyOutput)?;

        let columns: Vec<String> = header.split_whitespace().map(str::to_string).collect();
        let rows: Vec<Vec<String>> = lines
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .collect();

        Ok(Self { columns, rows })
    }

    /// Column names in header order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows in original order. Rows may be shorter than the header.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// True if the table has no data rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the column with the given name, if present
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of the column with the given name.
    ///
    /// # Errors
    /// Returns [`ParseError::MissingColumn`] if no column has that name.
    pub fn require_column(&self, name: &str) -> Result<usize, ParseError> {
        self.column_index(name)
            .ok_or_else(|| ParseError::MissingColumn(name.to_string()))
    }

    /// Cell at (row, column) index, or `None` if the row is too short or
    /// either index is out of range
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }
}
