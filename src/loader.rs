#![cfg(not(tarpaulin_include))]
use crate::error::{LedgerError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Load the rows of a CSV file
///
/// Reads a CSV file into a grid of string cells. A missing file reads as an
/// empty grid, the same way an empty range reads from a spreadsheet.
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
///
/// # Returns
/// * `Result<Vec<Vec<String>>>` - One vector of cells per line
///
/// # Examples
/// ```no_run
/// use stock_ledger::loader::read_csv_file;
///
/// match read_csv_file("data/StockFijo.csv") {
///     Ok(rows) => println!("Loaded {} rows", rows.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn read_csv_file(filepath: impl AsRef<Path>) -> Result<Vec<Vec<String>>> {
    let path = filepath.as_ref();
    match fs::read_to_string(path) {
        Ok(text) => Ok(parse_csv(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(LedgerError::io(
            "fetch_range",
            format!("{}: {e}", path.display()),
        )),
    }
}

/// Parse CSV text into rows of cells
///
/// Handles quoted fields, doubled quotes inside quoted fields, line breaks
/// inside quoted fields and both `\n` and `\r\n` line endings. A trailing line
/// break does not produce an extra empty row; an empty line in the middle
/// produces an empty row.
///
/// # Arguments
/// * `text` - The CSV content
///
/// # Returns
/// * `Vec<Vec<String>>` - Parsed rows
///
/// # Examples
/// ```
/// use stock_ledger::loader::parse_csv;
///
/// let rows = parse_csv("Sitio,Parte\n\"SAN JUAN\",\"A,1\"\n");
/// assert_eq!(rows, vec![vec!["Sitio", "Parte"], vec!["SAN JUAN", "A,1"]]);
/// ```
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line_has_content = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if let Some(&'"') = chars.peek() {
                    // Double quote inside quoted field - add a single quote
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => {
                in_quotes = true;
                line_has_content = true;
            }
            ',' if !in_quotes => {
                row.push(std::mem::take(&mut field));
                line_has_content = true;
            }
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                if line_has_content || !field.is_empty() {
                    row.push(std::mem::take(&mut field));
                }
                rows.push(std::mem::take(&mut row));
                line_has_content = false;
            }
            _ => {
                field.push(c);
                line_has_content = true;
            }
        }
    }

    // Add the last row when the text doesn't end with a line break
    if line_has_content || !field.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Split a command line into arguments, honouring double quotes
///
/// Used by the terminal front end so that sites with spaces can be typed as
/// `"SAN JUAN"`.
pub fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_arg = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_arg = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_arg {
                    args.push(std::mem::take(&mut current));
                    has_arg = false;
                }
            }
            _ => {
                current.push(c);
                has_arg = true;
            }
        }
    }
    if has_arg {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quotes_and_embedded_line_breaks() {
        let rows = parse_csv("a,\"b \"\"x\"\"\",c\r\n\"multi\nline\",,\n");
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b \"x\"".to_string(), "c".to_string()],
                vec!["multi\nline".to_string(), String::new(), String::new()],
            ]
        );
    }

    #[test]
    fn blank_lines_become_empty_rows() {
        let rows = parse_csv("h\n\nv");
        assert_eq!(rows.len(), 3);
        assert!(rows[1].is_empty());
    }

    #[test]
    fn quoted_args() {
        assert_eq!(
            split_args(r#"add "SAN JUAN" 1750349661  5"#),
            vec!["add", "SAN JUAN", "1750349661", "5"]
        );
        assert_eq!(split_args(r#"show """#), vec!["show", ""]);
    }
}
