//! The row store boundary: the only place the ledger touches I/O.
//!
//! A store serves rectangular ranges of string cells, header row first.
//! Calls are blocking and are never retried here; a failure comes back as
//! [`LedgerError::Io`] naming the call.

mod csv;
mod memory;
mod sheets;

pub use self::csv::CsvStore;
pub use self::memory::MemoryStore;
pub use self::sheets::SheetsStore;

use crate::error::{LedgerError, Result};
use crate::range::RangeRef;

pub trait RowStore {
    /// All rows of the range, header first. Empty when the range holds no data.
    fn fetch_range(&self, range: &RangeRef) -> Result<Vec<Vec<String>>>;

    /// Overwrite cells starting at the range origin. Cells outside `rows` are
    /// left as they are.
    fn write_range(&self, range: &RangeRef, rows: &[Vec<String>]) -> Result<()>;

    /// Overwrite one cell. `row` and `col` are 1-based within `range`, and row 1
    /// is the header row.
    fn write_cell(&self, range: &RangeRef, row: usize, col: usize, value: &str) -> Result<()> {
        if row == 0 || col == 0 {
            return Err(LedgerError::io(
                "write_cell",
                format!("cell ({row}, {col}) is not 1-based"),
            ));
        }
        if range.width().is_some_and(|w| col > w) || range.height().is_some_and(|h| row > h) {
            return Err(LedgerError::io(
                "write_cell",
                format!("cell ({row}, {col}) lies outside {range}"),
            ));
        }
        self.write_range(&range.cell(row, col), &[vec![value.to_string()]])
            .map_err(|err| match err {
                LedgerError::Io { detail, .. } => LedgerError::Io {
                    operation: "write_cell",
                    detail,
                },
                other => other,
            })
    }
}

impl<T: RowStore + ?Sized> RowStore for &T {
    fn fetch_range(&self, range: &RangeRef) -> Result<Vec<Vec<String>>> {
        (**self).fetch_range(range)
    }

    fn write_range(&self, range: &RangeRef, rows: &[Vec<String>]) -> Result<()> {
        (**self).write_range(range, rows)
    }

    fn write_cell(&self, range: &RangeRef, row: usize, col: usize, value: &str) -> Result<()> {
        (**self).write_cell(range, row, col, value)
    }
}

impl<T: RowStore + ?Sized> RowStore for Box<T> {
    fn fetch_range(&self, range: &RangeRef) -> Result<Vec<Vec<String>>> {
        (**self).fetch_range(range)
    }

    fn write_range(&self, range: &RangeRef, rows: &[Vec<String>]) -> Result<()> {
        (**self).write_range(range, rows)
    }

    fn write_cell(&self, range: &RangeRef, row: usize, col: usize, value: &str) -> Result<()> {
        (**self).write_cell(range, row, col, value)
    }
}

/// Cut a range out of a full sheet grid the way a spreadsheet API reports it:
/// trailing empty cells dropped from each row, trailing empty rows dropped.
pub(crate) fn read_window(grid: &[Vec<String>], range: &RangeRef) -> Vec<Vec<String>> {
    let first_row = range.first_row as usize - 1;
    let first_col = range.first_col as usize - 1;
    let end_row = range
        .last_row
        .map_or(grid.len(), |r| (r as usize).min(grid.len()));

    let mut out: Vec<Vec<String>> = Vec::new();
    for row in grid.iter().take(end_row).skip(first_row) {
        let end_col = range
            .last_col
            .map_or(row.len(), |c| (c as usize).min(row.len()));
        let mut cells: Vec<String> = row
            .iter()
            .take(end_col)
            .skip(first_col)
            .cloned()
            .collect();
        while cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        out.push(cells);
    }
    while out.last().is_some_and(|r| r.is_empty()) {
        out.pop();
    }
    out
}

/// Write `rows` into a full sheet grid at the range origin, growing the grid
/// as needed. Fails when `rows` doesn't fit a bounded range.
pub(crate) fn overlay(
    grid: &mut Vec<Vec<String>>,
    range: &RangeRef,
    rows: &[Vec<String>],
) -> Result<()> {
    if range.height().is_some_and(|h| rows.len() > h) {
        return Err(LedgerError::io(
            "write_range",
            format!("{} rows do not fit {range}", rows.len()),
        ));
    }
    let widest = rows.iter().map(Vec::len).max().unwrap_or(0);
    if range.width().is_some_and(|w| widest > w) {
        return Err(LedgerError::io(
            "write_range",
            format!("{widest} columns do not fit {range}"),
        ));
    }

    let first_row = range.first_row as usize - 1;
    let first_col = range.first_col as usize - 1;
    for (r, values) in rows.iter().enumerate() {
        let target_row = first_row + r;
        if grid.len() <= target_row {
            grid.resize(target_row + 1, Vec::new());
        }
        let target = &mut grid[target_row];
        if target.len() < first_col + values.len() {
            target.resize(first_col + values.len(), String::new());
        }
        for (c, value) in values.iter().enumerate() {
            target[first_col + c] = value.clone();
        }
    }
    Ok(())
}
