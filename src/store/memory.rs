use super::{RowStore, overlay, read_window};
use crate::error::{LedgerError, Result};
use crate::range::RangeRef;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-process row store: one grid of cells per sheet name.
///
/// Used by the tests and for running the front ends without a spreadsheet.
#[derive(Default)]
pub struct MemoryStore {
    sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a sheet with rows starting at A1.
    pub fn with_sheet<R, C>(self, name: &str, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let grid = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        if let Ok(mut sheets) = self.sheets.lock() {
            sheets.insert(name.to_string(), grid);
        }
        self
    }

    /// Snapshot of a sheet's full grid.
    pub fn sheet(&self, name: &str) -> Vec<Vec<String>> {
        self.sheets
            .lock()
            .ok()
            .and_then(|sheets| sheets.get(name).cloned())
            .unwrap_or_default()
    }

    /// While offline every call fails with an I/O error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self, operation: &'static str) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::io(operation, "store is offline"));
        }
        Ok(())
    }
}

impl RowStore for MemoryStore {
    fn fetch_range(&self, range: &RangeRef) -> Result<Vec<Vec<String>>> {
        self.check_online("fetch_range")?;
        let sheets = self
            .sheets
            .lock()
            .map_err(|_| LedgerError::io("fetch_range", "store lock poisoned"))?;
        let rows = sheets
            .get(&range.sheet)
            .map(|grid| read_window(grid, range))
            .unwrap_or_default();
        debug!("memory store: fetched {} row(s) from {range}", rows.len());
        Ok(rows)
    }

    fn write_range(&self, range: &RangeRef, rows: &[Vec<String>]) -> Result<()> {
        self.check_online("write_range")?;
        let mut sheets = self
            .sheets
            .lock()
            .map_err(|_| LedgerError::io("write_range", "store lock poisoned"))?;
        let grid = sheets.entry(range.sheet.clone()).or_default();
        overlay(grid, range, rows)?;
        debug!("memory store: wrote {} row(s) to {range}", rows.len());
        Ok(())
    }
}
