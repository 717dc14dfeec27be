use super::{RowStore, overlay, read_window};
use crate::downloader::rows_to_csv;
use crate::error::{LedgerError, Result};
use crate::loader::read_csv_file;
use crate::range::RangeRef;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Row store backed by a directory of CSV files, one `<sheet>.csv` per sheet.
///
/// Writes go through a temporary file and a rename so a failed write never
/// leaves a half-written sheet behind.
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding a sheet. Path separators in the sheet name are
    /// replaced so every sheet stays inside the store directory.
    pub fn sheet_path(&self, sheet: &str) -> PathBuf {
        let file: String = sheet
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '\0' => '_',
                other => other,
            })
            .collect();
        let file = if file.starts_with('.') {
            format!("_{file}")
        } else {
            file
        };
        self.dir.join(format!("{file}.csv"))
    }

    fn save(&self, sheet: &str, grid: &[Vec<String>]) -> Result<()> {
        let path = self.sheet_path(sheet);
        fs::create_dir_all(&self.dir)
            .map_err(|e| LedgerError::io("write_range", format!("{}: {e}", self.dir.display())))?;
        let tmp = path.with_extension("csv.tmp");
        fs::write(&tmp, rows_to_csv(grid))
            .map_err(|e| LedgerError::io("write_range", format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .map_err(|e| LedgerError::io("write_range", format!("{}: {e}", path.display())))?;
        Ok(())
    }
}

impl RowStore for CsvStore {
    fn fetch_range(&self, range: &RangeRef) -> Result<Vec<Vec<String>>> {
        let path = self.sheet_path(&range.sheet);
        let grid = read_csv_file(&path)?;
        let rows = read_window(&grid, range);
        debug!("csv store: fetched {} row(s) of {range} from {}", rows.len(), path.display());
        Ok(rows)
    }

    fn write_range(&self, range: &RangeRef, rows: &[Vec<String>]) -> Result<()> {
        let path = self.sheet_path(&range.sheet);
        let mut grid = read_csv_file(&path).map_err(|e| match e {
            LedgerError::Io { detail, .. } => LedgerError::io("write_range", detail),
            other => other,
        })?;
        overlay(&mut grid, range, rows)?;
        self.save(&range.sheet, &grid)?;
        debug!("csv store: wrote {} row(s) to {range} in {}", rows.len(), path.display());
        Ok(())
    }
}
