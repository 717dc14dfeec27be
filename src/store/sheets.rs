use super::RowStore;
use crate::error::{LedgerError, Result};
use crate::range::RangeRef;
use log::debug;
use serde_json::Value;
use std::time::Duration;

/// Row store over the Google Sheets v4 `values` REST API.
///
/// Authentication is a bearer access token obtained elsewhere; this client
/// only attaches it. Values are read unformatted so numbers arrive as numbers,
/// and written raw so keys are stored exactly as given.
pub struct SheetsStore {
    agent: ureq::Agent,
    endpoint: String,
    spreadsheet_id: String,
    token: String,
}

impl SheetsStore {
    pub const DEFAULT_ENDPOINT: &'static str = "https://sheets.googleapis.com/v4/spreadsheets";

    pub fn new(spreadsheet_id: &str, token: &str, timeout: Duration) -> Result<Self> {
        if spreadsheet_id.trim().is_empty() {
            return Err(LedgerError::validation("spreadsheet id must not be empty"));
        }
        if token.trim().is_empty() {
            return Err(LedgerError::validation("access token must not be empty"));
        }
        if timeout.is_zero() {
            return Err(LedgerError::validation("timeout must be > 0"));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(concat!("stock-ledger/", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(SheetsStore {
            agent,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            spreadsheet_id: spreadsheet_id.trim().to_string(),
            token: token.trim().to_string(),
        })
    }

    /// Point the client at another base URL (a proxy or a local fake).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn values_url(&self, range: &RangeRef) -> String {
        format!(
            "{}/{}/values/{}",
            self.endpoint,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(&range.to_string())
        )
    }

    // RAW keeps part codes like "00123" or "3/4" as typed instead of letting
    // the sheet turn them into numbers or dates.
    pub(crate) fn write_url(&self, range: &RangeRef) -> String {
        format!("{}?valueInputOption=RAW", self.values_url(range))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl RowStore for SheetsStore {
    fn fetch_range(&self, range: &RangeRef) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(range);
        debug!("sheets: GET {url}");
        let response = self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer())
            .set("Accept", "application/json")
            .query("majorDimension", "ROWS")
            .query("valueRenderOption", "UNFORMATTED_VALUE")
            .call()
            .map_err(|e| io_error_from_ureq("fetch_range", e))?;
        let body: Value = serde_json::from_reader(response.into_reader())
            .map_err(|e| LedgerError::io("fetch_range", format!("invalid response body: {e}")))?;
        parse_values(&body)
    }

    fn write_range(&self, range: &RangeRef, rows: &[Vec<String>]) -> Result<()> {
        let url = self.write_url(range);
        debug!("sheets: PUT {url} ({} rows)", rows.len());
        self.agent
            .put(&url)
            .set("Authorization", &self.bearer())
            .set("Accept", "application/json")
            .send_json(write_payload(range, rows))
            .map_err(|e| io_error_from_ureq("write_range", e))?;
        Ok(())
    }
}

/// Body of a `values.update` call. Cells holding a plain integer go out as
/// JSON numbers so stock stays numeric in the sheet; everything else is text.
pub(crate) fn write_payload(range: &RangeRef, rows: &[Vec<String>]) -> Value {
    let values: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| row.iter().map(|cell| cell_to_value(cell)).collect())
        .collect();
    serde_json::json!({
        "range": range.to_string(),
        "majorDimension": "ROWS",
        "values": values,
    })
}

// Only text that reads back identically through `cell_to_string` becomes a
// number, so "00123", "+5" or "1e3" stay strings.
fn cell_to_value(cell: &str) -> Value {
    match cell.parse::<i64>() {
        Ok(n) if n.to_string() == cell => Value::from(n),
        _ => Value::String(cell.to_string()),
    }
}

/// Pull the `values` grid out of a `values.get` response. A response without
/// `values` is an empty range.
pub(crate) fn parse_values(body: &Value) -> Result<Vec<Vec<String>>> {
    let Some(values) = body.get("values") else {
        return Ok(Vec::new());
    };
    let rows = values
        .as_array()
        .ok_or_else(|| LedgerError::io("fetch_range", "`values` is not an array"))?;
    rows.iter()
        .map(|row| match row {
            Value::Array(cells) => Ok(cells.iter().map(cell_to_string).collect()),
            _ => Err(LedgerError::io("fetch_range", "row in `values` is not an array")),
        })
        .collect()
}

/// Render one unformatted cell as text. Whole floats lose their `.0` so part
/// codes and quantities read back the way they were typed.
pub(crate) fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
                    _ => n.to_string(),
                }
            }
        }
        other => other.to_string(),
    }
}

fn io_error_from_ureq(operation: &'static str, err: ureq::Error) -> LedgerError {
    match err {
        ureq::Error::Status(status, response) => {
            let message = response
                .into_json::<Value>()
                .ok()
                .and_then(|body| {
                    body.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_default();
            if message.is_empty() {
                LedgerError::io(operation, format!("HTTP {status}"))
            } else {
                LedgerError::io(operation, format!("HTTP {status}: {message}"))
            }
        }
        ureq::Error::Transport(transport) => LedgerError::io(operation, transport),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_values_and_missing_values() {
        let body = json!({
            "range": "StockFijo!A1:E3",
            "majorDimension": "ROWS",
            "values": [
                ["Sitio", "Parte", "Stock"],
                ["JUJUY", 1750349661u64, 50.0],
                [],
                ["SALTA", "A-1", 2.5, true, null]
            ]
        });
        let rows = parse_values(&body).unwrap();
        assert_eq!(rows[1], vec!["JUJUY", "1750349661", "50"]);
        assert!(rows[2].is_empty());
        assert_eq!(rows[3], vec!["SALTA", "A-1", "2.5", "TRUE", ""]);

        assert!(parse_values(&json!({"range": "StockFijo!A1:E1"})).unwrap().is_empty());
        assert!(parse_values(&json!({"values": "nope"})).is_err());
    }

    #[test]
    fn encodes_range_in_url() {
        let store = SheetsStore::new("abc123", "token", Duration::from_secs(5))
            .unwrap()
            .with_endpoint("http://localhost:9000/v4/spreadsheets/");
        let range = RangeRef::parse("'Stock Fijo'!A:E").unwrap();
        assert_eq!(
            store.values_url(&range),
            "http://localhost:9000/v4/spreadsheets/abc123/values/%27Stock%20Fijo%27%21A%3AE"
        );
    }

    #[test]
    fn writes_raw_values_and_keeps_codes_as_text() {
        let store = SheetsStore::new("abc123", "token", Duration::from_secs(5))
            .unwrap()
            .with_endpoint("http://localhost:9000/v4/spreadsheets");
        let range = RangeRef::parse("StockFijo!A:E").unwrap();
        assert!(store.write_url(&range).ends_with("/values/StockFijo%21A%3AE?valueInputOption=RAW"));

        let rows = vec![vec![
            "JUJUY".to_string(),
            "00123".to_string(),
            "3/4".to_string(),
            "60".to_string(),
            "-2".to_string(),
            "".to_string(),
        ]];
        let payload = write_payload(&range, &rows);
        assert_eq!(payload["range"], json!("StockFijo!A:E"));
        assert_eq!(payload["values"], json!([["JUJUY", "00123", "3/4", 60, -2, ""]]));

        // What goes out reads back as the same text
        let echoed = parse_values(&payload).unwrap();
        assert_eq!(echoed, rows);
    }

    #[test]
    fn rejects_missing_credentials() {
        assert!(SheetsStore::new("", "token", Duration::from_secs(5)).is_err());
        assert!(SheetsStore::new("abc", " ", Duration::from_secs(5)).is_err());
        assert!(SheetsStore::new("abc", "token", Duration::ZERO).is_err());
    }
}
