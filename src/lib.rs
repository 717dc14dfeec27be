/*!
# Stock Ledger

View and adjust the fixed stock held per (site, part) pair, with a remote
spreadsheet as the system of record.

## Overview

Warehouse staff look up the stock of a site, then add or remove units of a
part. The spreadsheet stays the only place the numbers live: every action
reads the range again, and every change is written straight back.

## Architecture

### Row Store Client
- `store::RowStore` fetches a named range (header row first) and writes rows
  or single cells back. It is the only I/O boundary.
- Backends: Google Sheets over HTTP, a directory of CSV files, and an
  in-memory grid.

### Schema Normalizer
- `schema::normalize` maps drifting header labels ("Stock", "stock físico",
  "STOCK_FISICO") onto the canonical columns, pads or truncates ragged rows
  and coerces stock values, failing the read when a required column is
  missing.

### Ledger Update Engine
- `ledger::Ledger::apply_delta` finds the row for a (site, part) key through
  a key index, applies the change clamped at zero, and appends a row when an
  increase targets an unknown key.

### Front ends
- `main.rs`: an interactive terminal prompt.
- `app` (feature `web`): an axum form with per-site panels, JSON endpoints and
  CSV/XLSX downloads.

## Consistency

Nothing is locked and nothing is cached. Two people adjusting the same entry
at once race, and the last write wins.

## Modules

- **error**: Error kinds surfaced to the user
- **range**: A1 range notation
- **schema**: Header aliases and row coercion
- **ledger**: Rows, key index and the delta engine
- **store**: Row store trait and backends
- **service**: Read/adjust operations bound to a store and range
- **config**: File and environment settings
- **loader**: CSV parsing
- **downloader**: CSV and XLSX export
*/

pub mod config;
pub mod downloader;
pub mod error;
pub mod ledger;
pub mod loader;
pub mod range;
pub mod schema;
pub mod service;
pub mod store;

#[cfg(feature = "web")]
pub mod app;

/// Re-export the types front ends work with
pub use config::Config;
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, Operation, Outcome, StockRow};
pub use range::RangeRef;
pub use service::{StockLedger, WriteMode};
pub use store::{CsvStore, MemoryStore, RowStore, SheetsStore};
