use comfy_table::{ContentArrangement, Table as Grid};
use std::fmt;

/// Labels of the columns every test record carries, in order.
pub const FIXED_COLUMNS: [&str; 4] = ["Number", "Site", "Result", "Test Name"];

/// Column label of a [`Table`].
///
/// Fields past the fourth have no name in the log format, so they are
/// labelled by position, starting at 1 for every table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Fixed(&'static str),
    Extra(usize),
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Fixed(label) => f.write_str(label),
            Column::Extra(n) => write!(f, "{n}"),
        }
    }
}

/// One cell of a table row. `None` marks padding after a short record.
pub type Cell = Option<String>;

/// Rectangular table built from the records selected by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl Default for Table {
    fn default() -> Self {
        Self::from_records(Vec::new())
    }
}

impl Table {
    /// Shapes ragged records into a table.
    ///
    /// The schema is the four fixed columns plus one numbered column per token
    /// the widest record has beyond the fourth. Shorter records are padded
    /// with absent cells.
    pub fn from_records(records: Vec<Vec<String>>) -> Self {
        let widest = records.iter().map(Vec::len).max().unwrap_or(0);
        let extra = widest.saturating_sub(FIXED_COLUMNS.len());

        let columns: Vec<Column> = FIXED_COLUMNS
            .iter()
            .map(|&label| Column::Fixed(label))
            .chain((1..=extra).map(Column::Extra))
            .collect();

        let width = columns.len();
        let rows = records
            .into_iter()
            .map(|record| {
                let mut cells: Vec<Cell> = record.into_iter().map(Some).collect();
                cells.resize(width, None);
                cells
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Column labels as written to the header row.
    pub fn header(&self) -> Vec<String> {
        self.columns.iter().map(ToString::to_string).collect()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of data rows (the header is not counted).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Terminal preview: header row plus records, absent cells blank.
    pub fn preview(&self) -> Grid {
        let mut grid = Grid::new();
        grid.set_content_arrangement(ContentArrangement::Dynamic);
        grid.set_header(self.header());
        for row in &self.rows {
            grid.add_row(row.iter().map(|c| c.as_deref().unwrap_or("")));
        }
        grid
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.preview())
    }
}

/// How a token is stored in a worksheet cell.
///
/// A token becomes a number only when it parses as a finite float whose
/// canonical rendering is the token itself, so `"007"` or `"1.50"` keep
/// their spelling as text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl<'a> CellValue<'a> {
    pub fn from_token(token: &'a str) -> Self {
        match token.parse::<f64>() {
            Ok(n) if n.is_finite() && n.to_string() == token => CellValue::Number(n),
            _ => CellValue::Text(token),
        }
    }
}
