#![cfg(not(tarpaulin_include))]
use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::{Config, SharedStore};
use crate::downloader;
use crate::error::LedgerError;
use crate::ledger::{Ledger, Operation, Outcome, StockRow};
use crate::schema::Column;
use crate::service::StockLedger;

pub struct AppState {
    config: Config,
    store: Box<SharedStore>,
}

impl AppState {
    pub fn new(config: Config, store: Box<SharedStore>) -> Self {
        AppState { config, store }
    }

    fn ledger(&self) -> StockLedger<&SharedStore> {
        self.config.ledger(self.store.as_ref())
    }
}

#[derive(Deserialize)]
struct AdjustRequest {
    site: String,
    part: String,
    quantity: i64,
    operation: String,
}

#[derive(Serialize)]
struct AdjustResponse {
    status: &'static str,
    message: String,
    outcome: Outcome,
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
    site: Option<String>,
}

#[derive(Serialize)]
struct SiteGroup<'a> {
    site: &'a str,
    rows: Vec<&'a StockRow>,
}

#[derive(Serialize)]
struct DuplicateKey<'a> {
    site: &'a str,
    part: &'a str,
    rows: usize,
}

#[derive(Serialize)]
struct LedgerResponse<'a> {
    range: String,
    columns: Vec<Column>,
    sites: Vec<SiteGroup<'a>>,
    known_sites: Vec<&'a str>,
    known_parts: Vec<&'a str>,
    duplicates: Vec<DuplicateKey<'a>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    kind: &'static str,
    message: String,
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
            LedgerError::Schema { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::Io { .. } => StatusCode::BAD_GATEWAY,
        };
        if status == StatusCode::BAD_GATEWAY {
            error!("{self}");
        }
        let body = ErrorResponse {
            status: "error",
            kind: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();
    Router::new()
        .route("/", get(serve_form))
        .route("/api/ledger", get(get_ledger))
        .route("/api/ledger/:site", get(get_site_ledger))
        .route("/api/adjust", post(adjust_stock))
        .route("/api/export", get(export_ledger))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = config.open_store()?;
    let bind = config.bind.clone();
    let state = Arc::new(AppState::new(config, store));
    let app = router(state);

    // Start server
    let listener = TcpListener::bind(&bind).await?;
    info!("Listening on http://{bind}");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_form() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

// Store calls block, so they run on the blocking pool.
async fn blocking<T, F>(state: &Arc<AppState>, work: F) -> Result<T, LedgerError>
where
    T: Send + 'static,
    F: FnOnce(&StockLedger<&SharedStore>) -> Result<T, LedgerError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || work(&state.ledger()))
        .await
        .map_err(|e| LedgerError::io("request", e))?
}

async fn get_ledger(State(state): State<Arc<AppState>>) -> Response {
    match blocking(&state, |ledger| ledger.read_ledger()).await {
        Ok(ledger) => Json(ledger_response(&state.config, &ledger, None)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_site_ledger(
    Path(site): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match blocking(&state, |ledger| ledger.read_ledger()).await {
        Ok(ledger) => {
            Json(ledger_response(&state.config, &ledger, Some(site.as_str()))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AdjustRequest>, JsonRejection>,
) -> Response {
    // Malformed bodies get the same JSON error shape as every other failure.
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return LedgerError::validation(rejection.body_text()).into_response(),
    };
    let result = blocking(&state, move |ledger| {
        let operation: Operation = payload.operation.parse()?;
        ledger.apply_delta(&payload.site, &payload.part, payload.quantity, operation)
    })
    .await;

    match result {
        Ok(outcome) => {
            let message = format!(
                "Stock actualizado para {} - {}: {} -> {}",
                outcome.site, outcome.part, outcome.previous_value, outcome.new_value
            );
            Json(AdjustResponse {
                status: "ok",
                message,
                outcome,
            })
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn export_ledger(
    Query(params): Query<ExportQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let format = params.format.unwrap_or_else(|| "csv".to_string()).to_lowercase();
    if format != "csv" && format != "xlsx" {
        return LedgerError::validation(format!("unknown export format {format:?}")).into_response();
    }

    let ledger = match blocking(&state, |ledger| ledger.read_ledger()).await {
        Ok(ledger) => ledger,
        Err(e) => return e.into_response(),
    };
    let site = params.site.as_deref().filter(|s| !s.is_empty());

    let (content_type, body) = if format == "xlsx" {
        match downloader::to_xlsx(&ledger, site) {
            Ok(bytes) => (
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                bytes,
            ),
            Err(e) => return LedgerError::io("export", e).into_response(),
        }
    } else {
        ("text/csv; charset=utf-8", downloader::to_csv(&ledger, site).into_bytes())
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        downloader::export_filename(site, &format)
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

fn ledger_response<'a>(
    config: &Config,
    ledger: &'a Ledger,
    only_site: Option<&'a str>,
) -> LedgerResponse<'a> {
    let sites = ledger
        .sites()
        .into_iter()
        .filter(|site| only_site.is_none_or(|s| s == *site))
        .map(|site| SiteGroup {
            site,
            rows: ledger.rows_for_site(site).collect(),
        })
        .collect();
    let duplicates = ledger
        .duplicate_keys()
        .iter()
        .map(|((site, part), extra)| DuplicateKey {
            site,
            part,
            rows: extra + 1,
        })
        .collect();

    LedgerResponse {
        range: config.range.to_string(),
        columns: ledger.layout().columns(),
        sites,
        known_sites: ledger.sites(),
        known_parts: ledger.parts(),
        duplicates,
    }
}
