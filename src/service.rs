use crate::error::{LedgerError, Result};
use crate::ledger::{Ledger, Operation, Outcome, StockRow, cell_value, validate_request};
use crate::range::RangeRef;
use crate::schema::{Column, normalize};
use crate::store::RowStore;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How an applied delta is pushed back to the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Write only the physical stock cell of the touched row, or the single new
    /// row when one is appended.
    #[default]
    Cell,
    /// Write the whole range back as it was read, with only the touched stock
    /// cell or the appended row changed.
    Range,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteMode::Cell => "cell",
            WriteMode::Range => "range",
        })
    }
}

impl FromStr for WriteMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cell" => Ok(WriteMode::Cell),
            "range" | "sheet" => Ok(WriteMode::Range),
            other => Err(LedgerError::validation(format!(
                "unknown write mode {other:?}, expected cell or range"
            ))),
        }
    }
}

/// The ledger operations a front end calls, bound to one store and range.
///
/// Build one per request or session; nothing is cached between calls and
/// every operation starts from a fresh read of the range.
///
/// There is no isolation between users. Two people adjusting the same
/// (site, part) at the same moment both read the old value and the last write
/// wins silently.
pub struct StockLedger<S> {
    store: S,
    range: RangeRef,
    write_mode: WriteMode,
}

impl<S: RowStore> StockLedger<S> {
    pub fn new(store: S, range: RangeRef) -> Self {
        StockLedger {
            store,
            range,
            write_mode: WriteMode::default(),
        }
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn range(&self) -> &RangeRef {
        &self.range
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch the range and normalize it. Also used for "refresh".
    pub fn read_ledger(&self) -> Result<Ledger> {
        self.fetch().map(|(ledger, _)| ledger)
    }

    /// Validate, re-read the range, apply the change and persist it.
    ///
    /// Validation errors are returned before the store is contacted. On any
    /// error nothing is written.
    pub fn apply_delta(
        &self,
        site: &str,
        part: &str,
        quantity: i64,
        operation: Operation,
    ) -> Result<Outcome> {
        validate_request(site, part, quantity)?;

        let (mut ledger, raw) = self.fetch()?;
        let outcome = ledger.apply_delta(site, part, quantity, operation)?;
        self.persist(&ledger, &outcome, raw)?;

        info!(
            "{}/{} persisted to {} ({} write): {} -> {}",
            outcome.site,
            outcome.part,
            self.range,
            self.write_mode,
            outcome.previous_value,
            outcome.new_value
        );
        Ok(outcome)
    }

    fn fetch(&self) -> Result<(Ledger, Vec<Vec<String>>)> {
        let raw = self.store.fetch_range(&self.range)?;
        let ledger = normalize(&raw, self.range.width())?;
        info!(
            "read {} row(s) across {} site(s) from {}",
            ledger.len(),
            ledger.sites().len(),
            self.range
        );
        Ok((ledger, raw))
    }

    // Only the touched stock cell, or the appended row, differs from what was
    // read. Every other cell goes back exactly as fetched.
    fn persist(&self, ledger: &Ledger, outcome: &Outcome, mut raw: Vec<Vec<String>>) -> Result<()> {
        // An empty range has no header yet, so the whole table goes out.
        if raw.is_empty() {
            return self.store.write_range(&self.range, &ledger.to_rows());
        }

        // Row 1 of the range is the header; data row `position` sits below it.
        let store_row = outcome.position + 2;
        if self.range.height().is_some_and(|h| store_row > h) {
            return Err(LedgerError::io(
                "write_range",
                format!("row {store_row} lies outside {}; widen the range", self.range),
            ));
        }

        if outcome.created {
            let row = ledger
                .rows()
                .iter()
                .find(|r| r.position == outcome.position)
                .ok_or_else(|| LedgerError::io("write_range", "appended row went missing"))?;
            let cells = appended_cells(ledger, row);
            if self.write_mode == WriteMode::Cell {
                return self
                    .store
                    .write_range(&self.range.row_span(store_row, cells.len()), &[cells]);
            }
            if raw.len() < store_row {
                raw.resize(store_row, Vec::new());
            }
            raw[store_row - 1] = cells;
            return self.store.write_range(&self.range, &raw);
        }

        let col = ledger
            .layout()
            .index_of(Column::PhysicalStock)
            .ok_or(LedgerError::Schema {
                missing: vec![Column::PhysicalStock.label()],
            })?
            + 1;
        let value = outcome.new_value.to_string();
        if self.write_mode == WriteMode::Cell {
            return self.store.write_cell(&self.range, store_row, col, &value);
        }

        let cells = &mut raw[store_row - 1];
        if cells.len() < col {
            cells.resize(col, String::new());
        }
        cells[col - 1] = value;
        self.store.write_range(&self.range, &raw)
    }
}

// Cells for a new row in the store's own column order. The optimal stock cell
// is left blank for whoever maintains targets by hand.
fn appended_cells(ledger: &Ledger, row: &StockRow) -> Vec<String> {
    let layout = ledger.layout();
    let mut cells = vec![String::new(); layout.width()];
    for column in [
        Column::Site,
        Column::Part,
        Column::Description,
        Column::PhysicalStock,
    ] {
        if let Some(idx) = layout.index_of(column) {
            cells[idx] = cell_value(row, column);
        }
    }
    while cells.last().is_some_and(String::is_empty) {
        cells.pop();
    }
    cells
}
