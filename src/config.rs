use crate::error::{LedgerError, Result};
use crate::range::RangeRef;
use crate::service::{StockLedger, WriteMode};
use crate::store::{CsvStore, MemoryStore, RowStore, SheetsStore};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// Constants
pub const DEFAULT_RANGE: &str = "StockFijo!A:E";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Which row store backs the ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    #[default]
    Csv,
    Sheets,
}

impl FromStr for Backend {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "csv" => Ok(Backend::Csv),
            "sheets" | "google" => Ok(Backend::Sheets),
            other => Err(LedgerError::validation(format!(
                "unknown backend {other:?}, expected memory, csv or sheets"
            ))),
        }
    }
}

pub type SharedStore = dyn RowStore + Send + Sync;

/// Runtime settings, read from an optional JSON file and then overridden by
/// `STOCK_LEDGER_*` environment variables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub range: RangeRef,
    pub write_mode: WriteMode,
    pub csv_dir: PathBuf,
    pub spreadsheet_id: Option<String>,
    pub token: Option<String>,
    pub token_file: Option<PathBuf>,
    pub timeout_ms: u64,
    pub bind: String,
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: Backend::default(),
            range: RangeRef {
                sheet: "StockFijo".to_string(),
                first_col: 1,
                last_col: Some(5),
                first_row: 1,
                last_row: None,
            },
            write_mode: WriteMode::default(),
            csv_dir: PathBuf::from("data"),
            spreadsheet_id: None,
            token: None,
            token_file: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            bind: DEFAULT_BIND.to_string(),
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Config {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| LedgerError::io("load_config", format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| {
            LedgerError::validation(format!("config {}: {e}", path.display()))
        })
    }

    /// Settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Settings from any key lookup; `STOCK_LEDGER_CONFIG` names a JSON file
    /// to start from, the other keys override single fields.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = match var("STOCK_LEDGER_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        if let Some(v) = var("STOCK_LEDGER_BACKEND") {
            config.backend = v.parse()?;
        }
        if let Some(v) = var("STOCK_LEDGER_RANGE") {
            config.range = RangeRef::parse(&v)?;
        }
        if let Some(v) = var("STOCK_LEDGER_WRITE_MODE") {
            config.write_mode = v.parse()?;
        }
        if let Some(v) = var("STOCK_LEDGER_CSV_DIR") {
            config.csv_dir = PathBuf::from(v);
        }
        if let Some(v) = var("STOCK_LEDGER_SPREADSHEET_ID") {
            config.spreadsheet_id = Some(v);
        }
        if let Some(v) = var("STOCK_LEDGER_TOKEN") {
            config.token = Some(v);
        }
        if let Some(v) = var("STOCK_LEDGER_TOKEN_FILE") {
            config.token_file = Some(PathBuf::from(v));
        }
        if let Some(v) = var("STOCK_LEDGER_TIMEOUT_MS") {
            config.timeout_ms = v.trim().parse().map_err(|_| {
                LedgerError::validation(format!("STOCK_LEDGER_TIMEOUT_MS {v:?} is not a number"))
            })?;
        }
        if let Some(v) = var("STOCK_LEDGER_BIND") {
            config.bind = v;
        }
        if let Some(v) = var("STOCK_LEDGER_STATIC_DIR") {
            config.static_dir = PathBuf::from(v);
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The bearer token for the sheets backend: inline, or the first line of
    /// `token_file`.
    pub fn access_token(&self) -> Result<String> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.trim().is_empty()) {
            return Ok(token.trim().to_string());
        }
        let Some(path) = &self.token_file else {
            return Err(LedgerError::validation(
                "sheets backend needs STOCK_LEDGER_TOKEN or STOCK_LEDGER_TOKEN_FILE",
            ));
        };
        let text = fs::read_to_string(path)
            .map_err(|e| LedgerError::io("load_token", format!("{}: {e}", path.display())))?;
        text.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| LedgerError::validation(format!("{} holds no token", path.display())))
    }

    /// Build the configured row store.
    pub fn open_store(&self) -> Result<Box<SharedStore>> {
        match self.backend {
            Backend::Memory => {
                info!("using in-memory store (changes are lost on exit)");
                Ok(Box::new(MemoryStore::new()))
            }
            Backend::Csv => {
                info!("using csv store in {}", self.csv_dir.display());
                Ok(Box::new(CsvStore::new(&self.csv_dir)))
            }
            Backend::Sheets => {
                let id = self.spreadsheet_id.as_deref().ok_or_else(|| {
                    LedgerError::validation("sheets backend needs STOCK_LEDGER_SPREADSHEET_ID")
                })?;
                info!("using google sheets store for spreadsheet {id}");
                Ok(Box::new(SheetsStore::new(id, &self.access_token()?, self.timeout())?))
            }
        }
    }

    /// Ledger operations over `store` with this config's range and write mode.
    pub fn ledger<'a>(&self, store: &'a SharedStore) -> StockLedger<&'a SharedStore> {
        StockLedger::new(store, self.range.clone()).with_write_mode(self.write_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_stock_sheet() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.range.to_string(), DEFAULT_RANGE);
        assert_eq!(config.write_mode, WriteMode::Cell);
        assert_eq!(config.backend, Backend::Csv);
    }

    #[test]
    fn environment_overrides_fields() {
        let config = Config::from_lookup(lookup(&[
            ("STOCK_LEDGER_BACKEND", "sheets"),
            ("STOCK_LEDGER_RANGE", "Hoja1!A:C"),
            ("STOCK_LEDGER_WRITE_MODE", "range"),
            ("STOCK_LEDGER_SPREADSHEET_ID", "abc"),
            ("STOCK_LEDGER_TOKEN", "tok"),
            ("STOCK_LEDGER_TIMEOUT_MS", "2500"),
            ("STOCK_LEDGER_BIND", ""),
        ]))
        .unwrap();
        assert_eq!(config.backend, Backend::Sheets);
        assert_eq!(config.range.to_string(), "Hoja1!A:C");
        assert_eq!(config.write_mode, WriteMode::Range);
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.access_token().unwrap(), "tok");
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("STOCK_LEDGER_BACKEND", "excel")])).is_err());
        assert!(Config::from_lookup(lookup(&[("STOCK_LEDGER_TIMEOUT_MS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("STOCK_LEDGER_RANGE", "Hoja!Z:A")])).is_err());
    }

    #[test]
    fn json_file_and_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.txt");
        fs::write(&token_path, "\n  ya29.secret  \n").unwrap();
        let config_path = dir.path().join("stock.json");
        fs::write(
            &config_path,
            format!(
                r#"{{"backend": "sheets", "range": "StockFijo!A2:E", "spreadsheet_id": "id", "token_file": {:?}}}"#,
                token_path.display().to_string()
            ),
        )
        .unwrap();

        let config = Config::from_lookup(lookup(&[(
            "STOCK_LEDGER_CONFIG",
            config_path.to_str().unwrap(),
        )]))
        .unwrap();
        assert_eq!(config.range.first_row, 2);
        assert_eq!(config.csv_dir, PathBuf::from("data"));
        assert_eq!(config.access_token().unwrap(), "ya29.secret");
        assert!(config.open_store().is_ok());
    }

    #[test]
    fn sheets_backend_requires_credentials() {
        let config = Config {
            backend: Backend::Sheets,
            spreadsheet_id: Some("id".to_string()),
            ..Config::default()
        };
        let err = config.open_store().err().unwrap();
        assert_eq!(err.kind(), "validation");
    }
}
