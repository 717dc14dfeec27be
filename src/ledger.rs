use crate::error::{LedgerError, Result};
use crate::schema::{Column, Layout};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// One row of the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StockRow {
    pub site: String,
    pub part: String,
    pub description: String,
    pub physical_stock: i64,
    /// Target quantity, maintained by hand in the store. Never written here.
    pub optimal_stock: i64,
    /// Zero-based offset of the row below the header in the store range.
    #[serde(skip)]
    pub position: usize,
}

/// Direction of a quantity change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Increase,
    Decrease,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Increase => "increase",
            Operation::Decrease => "decrease",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "increase" | "add" | "sumar" | "+" => Ok(Operation::Increase),
            "decrease" | "sub" | "restar" | "-" => Ok(Operation::Decrease),
            other => Err(LedgerError::validation(format!(
                "unknown operation {other:?}, expected increase or decrease"
            ))),
        }
    }
}

/// How a successful [`Ledger::apply_delta`] touched the table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub site: String,
    pub part: String,
    pub operation: Operation,
    pub quantity: i64,
    pub previous_value: i64,
    pub new_value: i64,
    /// True when the row didn't exist and was appended.
    pub created: bool,
    /// Storage position of the row that was written.
    pub position: usize,
    /// Extra rows sharing the same key. Non-zero means the store breaks the
    /// uniqueness of (site, part) and the first row in storage order was used.
    pub duplicate_rows: usize,
}

/// The full set of stock rows read from one range, with a key index over
/// (site, part) rebuilt on every read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ledger {
    layout: Layout,
    rows: Vec<StockRow>,
    index: HashMap<(String, String), usize>,
    duplicates: BTreeMap<(String, String), usize>,
    source_rows: usize,
}

impl Ledger {
    /// Assemble a ledger from normalized rows. `source_rows` is the number of
    /// data rows the range held, blank ones included.
    pub fn from_parts(layout: Layout, rows: Vec<StockRow>, source_rows: usize) -> Self {
        let mut index = HashMap::with_capacity(rows.len());
        let mut duplicates: BTreeMap<(String, String), usize> = BTreeMap::new();

        for (i, row) in rows.iter().enumerate() {
            let key = (row.site.clone(), row.part.clone());
            if index.contains_key(&key) {
                *duplicates.entry(key).or_default() += 1;
            } else {
                index.insert(key, i);
            }
        }

        for ((site, part), extra) in &duplicates {
            warn!(
                "data integrity: site {site:?} part {part:?} appears {} times; the first row wins",
                extra + 1
            );
        }

        let source_rows = rows
            .iter()
            .map(|r| r.position + 1)
            .max()
            .unwrap_or(0)
            .max(source_rows);

        Ledger {
            layout,
            rows,
            index,
            duplicates,
            source_rows,
        }
    }

    /// An empty ledger with the full canonical layout.
    pub fn empty() -> Self {
        Self::from_parts(Layout::canonical(&Column::ALL), Vec::new(), 0)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn rows(&self) -> &[StockRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of data rows the range spans, blank rows included.
    pub fn source_rows(&self) -> usize {
        self.source_rows
    }

    pub fn get(&self, site: &str, part: &str) -> Option<&StockRow> {
        self.index
            .get(&(site.to_string(), part.to_string()))
            .map(|&i| &self.rows[i])
    }

    /// Sorted distinct sites.
    pub fn sites(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.rows.iter().map(|r| r.site.as_str()).collect();
        set.into_iter().collect()
    }

    /// Sorted distinct parts, across all sites.
    pub fn parts(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.rows.iter().map(|r| r.part.as_str()).collect();
        set.into_iter().collect()
    }

    /// Rows for one site, in storage order.
    pub fn rows_for_site<'a>(&'a self, site: &'a str) -> impl Iterator<Item = &'a StockRow> + 'a {
        self.rows.iter().filter(move |r| r.site == site)
    }

    /// Keys that occur more than once, with the number of extra rows.
    pub fn duplicate_keys(&self) -> &BTreeMap<(String, String), usize> {
        &self.duplicates
    }

    /// Apply a quantity change to the row keyed by (site, part).
    ///
    /// The matching row's physical stock moves by `quantity` in the direction
    /// of `operation` and is clamped at zero. An increase on an unknown key
    /// appends a new row; a decrease on an unknown key fails with
    /// [`LedgerError::NotFound`]. The ledger is left untouched on any error.
    ///
    /// # Arguments
    /// * `site` - Site identifier, matched case-sensitively after trimming
    /// * `part` - Part identifier, matched case-sensitively after trimming
    /// * `quantity` - Strictly positive amount
    /// * `operation` - Increase or decrease
    ///
    /// # Returns
    /// * `Result<Outcome>` - Previous and new physical stock for confirmation
    pub fn apply_delta(
        &mut self,
        site: &str,
        part: &str,
        quantity: i64,
        operation: Operation,
    ) -> Result<Outcome> {
        let (site, part) = validate_request(site, part, quantity)?;
        let key = (site.to_string(), part.to_string());
        let duplicate_rows = self.duplicates.get(&key).copied().unwrap_or(0);

        let Some(&idx) = self.index.get(&key) else {
            if operation == Operation::Decrease {
                return Err(LedgerError::NotFound {
                    site: key.0,
                    part: key.1,
                });
            }
            return Ok(self.append(key.0, key.1, quantity));
        };

        if duplicate_rows > 0 {
            warn!(
                "data integrity: updating first of {} rows for site {site:?} part {part:?}",
                duplicate_rows + 1
            );
        }

        let row = &mut self.rows[idx];
        let previous_value = row.physical_stock;
        let new_value = match operation {
            Operation::Increase => previous_value.saturating_add(quantity),
            Operation::Decrease => previous_value.saturating_sub(quantity),
        }
        .max(0);
        row.physical_stock = new_value;

        info!("{site}/{part}: {operation} {quantity}, stock {previous_value} -> {new_value}");

        Ok(Outcome {
            site: key.0,
            part: key.1,
            operation,
            quantity,
            previous_value,
            new_value,
            created: false,
            position: row.position,
            duplicate_rows,
        })
    }

    fn append(&mut self, site: String, part: String, quantity: i64) -> Outcome {
        let position = self.source_rows;
        self.rows.push(StockRow {
            site: site.clone(),
            part: part.clone(),
            description: String::new(),
            physical_stock: quantity,
            optimal_stock: 0,
            position,
        });
        self.index
            .insert((site.clone(), part.clone()), self.rows.len() - 1);
        self.source_rows += 1;

        info!("{site}/{part}: new entry with stock {quantity}");

        Outcome {
            site,
            part,
            operation: Operation::Increase,
            quantity,
            previous_value: 0,
            new_value: quantity,
            created: true,
            position,
            duplicate_rows: 0,
        }
    }

    /// Cells of one row under this ledger's canonical layout.
    pub fn render_row(&self, row: &StockRow) -> Vec<String> {
        self.layout
            .columns()
            .into_iter()
            .map(|column| cell_value(row, column))
            .collect()
    }

    /// Render the ledger back into raw rows with canonical headers, restricted
    /// to the columns this ledger carries.
    ///
    /// Rows land at their storage positions. Positions that held blank or
    /// skipped rows come out as empty rows. Used to seed an empty range.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        let columns = self.layout.columns();
        let blank = vec![String::new(); columns.len()];
        let mut out = Vec::with_capacity(self.source_rows + 1);
        out.push(columns.iter().map(|c| c.label().to_string()).collect());
        out.extend(std::iter::repeat_n(blank, self.source_rows));

        for row in &self.rows {
            out[row.position + 1] = self.render_row(row);
        }
        out
    }
}

pub(crate) fn cell_value(row: &StockRow, column: Column) -> String {
    match column {
        Column::Site => row.site.clone(),
        Column::Part => row.part.clone(),
        Column::Description => row.description.clone(),
        Column::PhysicalStock => row.physical_stock.to_string(),
        Column::OptimalStock => row.optimal_stock.to_string(),
    }
}

/// Reject bad input before any remote call. Returns the trimmed key.
pub fn validate_request<'a>(site: &'a str, part: &'a str, quantity: i64) -> Result<(&'a str, &'a str)> {
    let site = site.trim();
    let part = part.trim();
    if site.is_empty() {
        return Err(LedgerError::validation("site must not be empty"));
    }
    if part.is_empty() {
        return Err(LedgerError::validation("part must not be empty"));
    }
    if quantity <= 0 {
        return Err(LedgerError::validation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    Ok((site, part))
}
