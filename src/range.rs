use crate::error::{LedgerError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref AREA_REGEX: Regex =
        Regex::new(r"^([A-Za-z]{1,3})([0-9]+)?(?::([A-Za-z]{1,3})([0-9]+)?)?$").unwrap();
}

/// A rectangular range in A1 notation, e.g. `StockFijo!A:E` or `'Stock Fijo'!A2:E200`.
///
/// Rows and columns are 1-based and absolute within the sheet. An open
/// `last_row`/`last_col` means the range extends to the end of the sheet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RangeRef {
    pub sheet: String,
    pub first_col: u32,
    pub last_col: Option<u32>,
    pub first_row: u32,
    pub last_row: Option<u32>,
}

impl RangeRef {
    /// The whole sheet.
    pub fn sheet(name: impl Into<String>) -> Self {
        RangeRef {
            sheet: name.into(),
            first_col: 1,
            last_col: None,
            first_row: 1,
            last_row: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (sheet, area) = split_sheet(text)?;
        if sheet.is_empty() {
            return Err(LedgerError::validation(format!(
                "range {text:?} has no sheet name"
            )));
        }
        let Some(area) = area else {
            return Ok(Self::sheet(sheet));
        };

        let caps = AREA_REGEX
            .captures(area)
            .ok_or_else(|| LedgerError::validation(format!("invalid range {text:?}")))?;

        let first_col = letter_to_col(&caps[1]);
        let first_row = match caps.get(2) {
            Some(m) => parse_row(m.as_str(), text)?,
            None => 1,
        };
        let (last_col, last_row) = match caps.get(3) {
            Some(end) => {
                let last_row = caps
                    .get(4)
                    .map(|m| parse_row(m.as_str(), text))
                    .transpose()?;
                (Some(letter_to_col(end.as_str())), last_row)
            }
            // "D5" is a single cell; "D" is the whole column.
            None => (Some(first_col), caps.get(2).map(|_| first_row)),
        };

        if last_col.is_some_and(|c| c < first_col) || last_row.is_some_and(|r| r < first_row) {
            return Err(LedgerError::validation(format!(
                "range {text:?} ends before it starts"
            )));
        }

        Ok(RangeRef {
            sheet,
            first_col,
            last_col,
            first_row,
            last_row,
        })
    }

    /// Number of columns, if the range is bounded on the right.
    pub fn width(&self) -> Option<usize> {
        self.last_col.map(|c| (c - self.first_col + 1) as usize)
    }

    /// Number of rows, if the range is bounded at the bottom.
    pub fn height(&self) -> Option<usize> {
        self.last_row.map(|r| (r - self.first_row + 1) as usize)
    }

    /// Single cell at a 1-based position relative to this range (row 1 is the header).
    pub fn cell(&self, row: usize, col: usize) -> RangeRef {
        let abs_row = self.first_row + row.saturating_sub(1) as u32;
        let abs_col = self.first_col + col.saturating_sub(1) as u32;
        RangeRef {
            sheet: self.sheet.clone(),
            first_col: abs_col,
            last_col: Some(abs_col),
            first_row: abs_row,
            last_row: Some(abs_row),
        }
    }

    /// One row, `width` cells wide, at a 1-based row relative to this range.
    pub fn row_span(&self, row: usize, width: usize) -> RangeRef {
        let abs_row = self.first_row + row.saturating_sub(1) as u32;
        RangeRef {
            sheet: self.sheet.clone(),
            first_col: self.first_col,
            last_col: Some(self.first_col + width.max(1) as u32 - 1),
            first_row: abs_row,
            last_row: Some(abs_row),
        }
    }

    fn is_whole_sheet(&self) -> bool {
        self.first_col == 1 && self.first_row == 1 && self.last_col.is_none() && self.last_row.is_none()
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet_name(f, &self.sheet)?;
        if self.is_whole_sheet() {
            return Ok(());
        }

        // "A:E" style when the range starts at the top and runs to the bottom.
        let column_span = self.first_row == 1 && self.last_row.is_none();
        let single_cell = self.last_col == Some(self.first_col) && self.last_row == Some(self.first_row);

        write!(f, "!{}", col_to_letter(self.first_col))?;
        if !column_span {
            write!(f, "{}", self.first_row)?;
        }
        if single_cell {
            return Ok(());
        }
        write!(f, ":")?;
        if let Some(last_col) = self.last_col {
            write!(f, "{}", col_to_letter(last_col))?;
        }
        if let Some(last_row) = self.last_row {
            write!(f, "{last_row}")?;
        }
        Ok(())
    }
}

impl FromStr for RangeRef {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RangeRef {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RangeRef> for String {
    fn from(value: RangeRef) -> Self {
        value.to_string()
    }
}

/// Convert a 1-based column number to its letters (1 = A, 27 = AA).
pub fn col_to_letter(col: u32) -> String {
    let mut col = col;
    let mut result = String::new();
    while col > 0 {
        col -= 1;
        result.push(((col % 26) as u8 + b'A') as char);
        col /= 26;
    }
    result.chars().rev().collect()
}

/// Inverse of [`col_to_letter`]; letters are case-insensitive.
pub fn letter_to_col(letters: &str) -> u32 {
    letters
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .fold(0, |acc, c| acc * 26 + (c as u32 - 'A' as u32 + 1))
}

fn parse_row(digits: &str, text: &str) -> Result<u32> {
    match digits.parse::<u32>() {
        Ok(row) if row > 0 => Ok(row),
        _ => Err(LedgerError::validation(format!(
            "invalid row number in range {text:?}"
        ))),
    }
}

// Splits "'Sheet ''x'''!A:E" into the unquoted sheet name and the area part.
fn split_sheet(text: &str) -> Result<(String, Option<&str>)> {
    if let Some(rest) = text.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '\'' {
                name.push(c);
                continue;
            }
            if let Some(&(_, '\'')) = chars.peek() {
                name.push('\'');
                chars.next();
                continue;
            }
            let tail = &rest[i + 1..];
            return match tail.strip_prefix('!') {
                Some(area) => Ok((name, Some(area))),
                None if tail.is_empty() => Ok((name, None)),
                None => Err(LedgerError::validation(format!("invalid range {text:?}"))),
            };
        }
        return Err(LedgerError::validation(format!(
            "unterminated sheet name in range {text:?}"
        )));
    }

    match text.split_once('!') {
        Some((sheet, area)) => Ok((sheet.to_string(), Some(area))),
        None => Ok((text.to_string(), None)),
    }
}

fn write_sheet_name(f: &mut fmt::Formatter<'_>, sheet: &str) -> fmt::Result {
    if sheet.chars().all(|c| c.is_alphanumeric() || c == '_') {
        write!(f, "{sheet}")
    } else {
        write!(f, "'{}'", sheet.replace('\'', "''"))
    }
}
