#![cfg(not(tarpaulin_include))]
use crate::ledger::{Ledger, StockRow, cell_value};
#[cfg(feature = "web")]
use crate::schema::Column;

/// Convert rows of cells to CSV text
///
/// Values containing commas, quotes or line breaks are quoted, with inner
/// quotes doubled. Every row ends with `\n`.
///
/// # Arguments
/// * `rows` - Rows of cells to write
///
/// # Returns
/// * `String` - CSV content
pub fn rows_to_csv(rows: &[Vec<String>]) -> String {
    let mut csv_content = String::new();
    for row in rows {
        for (c, value) in row.iter().enumerate() {
            if c > 0 {
                csv_content.push(',');
            }
            if value.contains(',') || value.contains('"') || value.contains('\n') {
                let escaped = value.replace('"', "\"\"");
                csv_content.push_str(&format!("\"{}\"", escaped));
            } else {
                csv_content.push_str(value);
            }
        }
        csv_content.push('\n');
    }
    csv_content
}

/// Convert a ledger to CSV format
///
/// Exports the canonical columns the ledger carries, with canonical header
/// labels. Rows keep storage order; blank store rows are not exported.
///
/// # Arguments
/// * `ledger` - The ledger to export
/// * `site` - Only export rows of this site, when given
///
/// # Returns
/// * `String` - CSV content
///
/// # Examples
/// ```
/// use stock_ledger::downloader::to_csv;
/// use stock_ledger::schema::normalize;
///
/// let raw = vec![
///     vec!["Sitio".to_string(), "Parte".to_string(), "Stock".to_string()],
///     vec!["JUJUY".to_string(), "1750349661".to_string(), "50".to_string()],
/// ];
/// let ledger = normalize(&raw, None).unwrap();
/// assert_eq!(to_csv(&ledger, None), "Sitio,Parte,Stock Físico\nJUJUY,1750349661,50\n");
/// ```
pub fn to_csv(ledger: &Ledger, site: Option<&str>) -> String {
    rows_to_csv(&export_rows(ledger, site))
}

/// Convert a ledger to XLSX format
///
/// Writes one worksheet named after the site (or "Stock" for the whole
/// ledger). Keys and descriptions are written as text so long numeric part
/// codes are not reformatted; stock columns are written as numbers.
///
/// # Arguments
/// * `ledger` - The ledger to export
/// * `site` - Only export rows of this site, when given
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(ledger: &Ledger, site: Option<&str>) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(sheet_title(site).as_str())?;

    let bold = Format::new().set_bold();
    let columns = ledger.layout().columns();
    for (c, column) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, column.label(), &bold)?;
    }

    for (r, row) in selected(ledger, site).enumerate() {
        let xlsx_row = (r + 1) as u32;
        for (c, column) in columns.iter().enumerate() {
            let col = c as u16;
            match column {
                Column::PhysicalStock => {
                    worksheet.write_number(xlsx_row, col, row.physical_stock as f64)?;
                }
                Column::OptimalStock => {
                    worksheet.write_number(xlsx_row, col, row.optimal_stock as f64)?;
                }
                other => {
                    worksheet.write_string(xlsx_row, col, &cell_value(row, *other))?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

/// File name for a download, e.g. `stock_JUJUY_2026-10-16.csv`.
pub fn export_filename(site: Option<&str>, extension: &str) -> String {
    let date = chrono::Local::now().format("%Y-%m-%d");
    let scope: String = site
        .unwrap_or("fijo")
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("stock_{scope}_{date}.{extension}")
}

fn export_rows(ledger: &Ledger, site: Option<&str>) -> Vec<Vec<String>> {
    let columns = ledger.layout().columns();
    let mut rows = Vec::with_capacity(ledger.len() + 1);
    rows.push(columns.iter().map(|c| c.label().to_string()).collect());
    rows.extend(
        selected(ledger, site).map(|row| columns.iter().map(|c| cell_value(row, *c)).collect()),
    );
    rows
}

fn selected<'a>(ledger: &'a Ledger, site: Option<&'a str>) -> impl Iterator<Item = &'a StockRow> + 'a {
    ledger
        .rows()
        .iter()
        .filter(move |row| site.is_none_or(|s| row.site == s))
}

// Worksheet names are limited to 31 characters and a few symbols are banned.
#[cfg(feature = "web")]
fn sheet_title(site: Option<&str>) -> String {
    let title: String = site
        .unwrap_or("Stock")
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .take(31)
        .collect();
    if title.trim().is_empty() {
        "Stock".to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::normalize;

    fn ledger() -> Ledger {
        let raw: Vec<Vec<String>> = [
            vec!["Sitio", "Parte", "Descripción", "Stock Físico", "Stock Óptimo"],
            vec!["JUJUY", "1750349661", "Filtro, aceite", "50", "80"],
            vec!["SALTA", "A-1", "Junta \"tórica\"", "3", ""],
        ]
        .into_iter()
        .map(|r| r.into_iter().map(String::from).collect())
        .collect();
        normalize(&raw, Some(5)).unwrap()
    }

    #[test]
    fn csv_escapes_and_filters_by_site() {
        let csv = to_csv(&ledger(), Some("SALTA"));
        assert_eq!(
            csv,
            "Sitio,Parte,Descripción,Stock Físico,Stock Óptimo\nSALTA,A-1,\"Junta \"\"tórica\"\"\",3,0\n"
        );
        let all = to_csv(&ledger(), None);
        assert!(all.contains("JUJUY,1750349661,\"Filtro, aceite\",50,80\n"));
    }

    #[test]
    fn filenames_are_path_safe() {
        let name = export_filename(Some("SAN JUAN/2"), "csv");
        assert!(name.starts_with("stock_SAN_JUAN_2_"));
        assert!(name.ends_with(".csv"));
    }
}
