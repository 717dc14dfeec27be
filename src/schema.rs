//! Header resolution and row coercion for ledgers read from a row store.
//!
//! Spreadsheet headers drift over time: "Stock", "stock físico", "STOCK_FISICO"
//! and the occasional typo all mean the same column. Everything here maps what
//! the store hands back onto the fixed set of [`Column`]s and produces a
//! [`Ledger`](crate::ledger::Ledger) the update engine can trust.

use crate::error::{LedgerError, Result};
use crate::ledger::{Ledger, StockRow};
use lazy_static::lazy_static;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// The canonical schema, in canonical column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Site,
    Part,
    Description,
    PhysicalStock,
    OptimalStock,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Site,
        Column::Part,
        Column::Description,
        Column::PhysicalStock,
        Column::OptimalStock,
    ];

    pub const REQUIRED: [Column; 3] = [Column::Site, Column::Part, Column::PhysicalStock];

    /// Header label written back to the store.
    pub fn label(self) -> &'static str {
        match self {
            Column::Site => "Sitio",
            Column::Part => "Parte",
            Column::Description => "Descripción",
            Column::PhysicalStock => "Stock Físico",
            Column::OptimalStock => "Stock Óptimo",
        }
    }
}

lazy_static! {
    static ref HEADER_ALIASES: HashMap<&'static str, Column> = {
        let mut m = HashMap::new();
        for alias in ["sitio", "sitios", "site", "sede", "deposito", "almacen"] {
            m.insert(alias, Column::Site);
        }
        for alias in [
            "parte",
            "partes",
            "part",
            "numero de parte",
            "nro de parte",
            "nro parte",
            "n de parte",
            "part number",
            "codigo",
        ] {
            m.insert(alias, Column::Part);
        }
        for alias in [
            "descripcion",
            "description",
            "desc",
            "detalle",
            "decripcion",
            "descripcon",
        ] {
            m.insert(alias, Column::Description);
        }
        for alias in [
            "stock",
            "stock fisico",
            "fisico",
            "physical stock",
            "stock actual",
            "stok",
            "stock fisco",
            "stok fisico",
        ] {
            m.insert(alias, Column::PhysicalStock);
        }
        for alias in [
            "stock optimo",
            "optimo",
            "optimal stock",
            "stock objetivo",
            "stok optimo",
            "stock opimo",
        ] {
            m.insert(alias, Column::OptimalStock);
        }
        m
    };
}

/// Fold a raw header label for alias lookup: diacritics stripped, lowercased,
/// separators turned into single spaces, ends trimmed.
///
/// # Examples
/// ```
/// use stock_ledger::schema::fold_header;
///
/// assert_eq!(fold_header("  Stock_Físico "), "stock fisico");
/// assert_eq!(fold_header("STOCK   ÓPTIMO"), "stock optimo");
/// ```
pub fn fold_header(raw: &str) -> String {
    let stripped: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            '_' | '-' | '.' => ' ',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a single header label to its canonical column, if any alias matches.
pub fn resolve_header(raw: &str) -> Option<Column> {
    HEADER_ALIASES.get(fold_header(raw).as_str()).copied()
}

/// Where each canonical column lives in the store's header row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    headers: Vec<String>,
    positions: Vec<(Column, usize)>,
}

impl Layout {
    /// Resolve a header row. Fails with [`LedgerError::Schema`] when a required
    /// column has no matching header.
    pub fn resolve(headers: &[String]) -> Result<Self> {
        let mut positions: Vec<(Column, usize)> = Vec::new();
        for (idx, raw) in headers.iter().enumerate() {
            match resolve_header(raw) {
                Some(column) if positions.iter().any(|(c, _)| *c == column) => {
                    warn!(
                        "header {raw:?} in column {} duplicates {}; ignoring it",
                        idx + 1,
                        column.label()
                    );
                }
                Some(column) => positions.push((column, idx)),
                None if raw.trim().is_empty() => {}
                None => warn!("unrecognized header {raw:?} in column {}; ignoring it", idx + 1),
            }
        }

        let missing: Vec<&'static str> = Column::REQUIRED
            .iter()
            .filter(|req| !positions.iter().any(|(c, _)| c == *req))
            .map(|c| c.label())
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::Schema { missing });
        }

        positions.sort();
        Ok(Layout {
            headers: headers.to_vec(),
            positions,
        })
    }

    /// Layout used when the range is empty: all five canonical columns, or the
    /// minimal `[Sitio, Parte, Stock]` when the range is narrower than that.
    pub fn default_for_width(width: Option<usize>) -> Self {
        let columns: Vec<Column> = match width {
            Some(w) if w < Column::ALL.len() => Column::REQUIRED.to_vec(),
            _ => Column::ALL.to_vec(),
        };
        Self::canonical(&columns)
    }

    /// Canonical-order layout over the given columns, with canonical labels.
    pub fn canonical(columns: &[Column]) -> Self {
        let mut columns = columns.to_vec();
        columns.sort();
        columns.dedup();
        Layout {
            headers: columns.iter().map(|c| c.label().to_string()).collect(),
            positions: columns.into_iter().enumerate().map(|(i, c)| (c, i)).collect(),
        }
    }

    /// Zero-based index of a column in the store's header row.
    pub fn index_of(&self, column: Column) -> Option<usize> {
        self.positions
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, idx)| *idx)
    }

    pub fn has(&self, column: Column) -> bool {
        self.index_of(column).is_some()
    }

    /// Canonical columns present, in canonical order.
    pub fn columns(&self) -> Vec<Column> {
        self.positions.iter().map(|(c, _)| *c).collect()
    }

    /// Raw header labels as read from the store.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of cells in a store row under this layout.
    pub fn width(&self) -> usize {
        self.headers.len()
    }
}

/// Permissive quantity parse: integers as-is, decimals truncated toward zero.
/// `None` for empty or non-numeric text.
pub fn parse_quantity(raw: &str) -> Option<i64> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v.trunc() as i64),
        _ => None,
    }
}

/// Build a ledger from the raw rows of a range: header row first, then values.
///
/// `range_width` picks the default layout when the range holds no rows at all.
/// Ragged rows are padded with empty strings or truncated to the header count.
/// Numeric cells that are empty, unparsable or negative become 0.
pub fn normalize(raw: &[Vec<String>], range_width: Option<usize>) -> Result<Ledger> {
    let Some((header_row, data)) = raw.split_first() else {
        debug!("range is empty, using default layout");
        return Ok(Ledger::from_parts(
            Layout::default_for_width(range_width),
            Vec::new(),
            0,
        ));
    };

    let layout = Layout::resolve(header_row)?;
    let width = layout.width();
    let mut rows = Vec::with_capacity(data.len());

    for (position, raw_row) in data.iter().enumerate() {
        let mut cells: Vec<&str> = raw_row.iter().take(width).map(String::as_str).collect();
        cells.resize(width, "");

        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let text = |column: Column| cell_text(&layout, &cells, column);

        let site = text(Column::Site).trim();
        let part = text(Column::Part).trim();
        if site.is_empty() || part.is_empty() {
            warn!(
                "data row {} has no {}; skipping it",
                position + 2,
                if site.is_empty() { "site" } else { "part" }
            );
            continue;
        }

        rows.push(StockRow {
            site: site.to_string(),
            part: part.to_string(),
            description: text(Column::Description).trim().to_string(),
            physical_stock: coerce_stock(text(Column::PhysicalStock), position),
            optimal_stock: coerce_stock(text(Column::OptimalStock), position),
            position,
        });
    }

    Ok(Ledger::from_parts(layout, rows, data.len()))
}

fn cell_text<'a>(layout: &Layout, cells: &[&'a str], column: Column) -> &'a str {
    layout.index_of(column).map(|idx| cells[idx]).unwrap_or("")
}

fn coerce_stock(raw: &str, position: usize) -> i64 {
    match parse_quantity(raw) {
        Some(n) if n < 0 => {
            warn!("negative stock {n} in data row {}; reading it as 0", position + 2);
            0
        }
        Some(n) => n,
        None => {
            if !raw.trim().is_empty() {
                debug!("non-numeric stock {raw:?} in data row {}; reading it as 0", position + 2);
            }
            0
        }
    }
}
