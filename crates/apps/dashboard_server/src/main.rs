use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use compute::{Dataset, JoinPredicate};
use formats::DatasetConfig;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod params;

use params::ViewParams;

#[derive(Clone)]
struct AppState {
    dataset: Arc<Dataset>,
    predicate: JoinPredicate,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr: SocketAddr = match env_var_string("DASHBOARD_ADDR", "127.0.0.1:8080").parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!("invalid DASHBOARD_ADDR: {err}");
            std::process::exit(2);
        }
    };
    let predicate: JoinPredicate = match env_var_string("DASHBOARD_PREDICATE", "within").parse() {
        Ok(p) => p,
        Err(err) => {
            error!("invalid DASHBOARD_PREDICATE: {err}");
            std::process::exit(2);
        }
    };

    let config = DatasetConfig::from_env();
    info!(
        "loading occurrences from {} and boundaries from {}",
        config.occurrences_path.display(),
        config.countries_path.display()
    );
    let dataset = match Dataset::load(&config) {
        Ok(dataset) => dataset,
        Err(err) => {
            error!("dataset load failed: {err}");
            std::process::exit(1);
        }
    };
    if dataset.occurrences.is_empty() {
        warn!("no occurrence survived cleaning; every view will be empty");
    }

    let state = AppState {
        dataset: Arc::new(dataset),
        predicate,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/species", get(get_species))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/richness", get(get_richness))
        .route("/api/top-species", get(get_top_species))
        .route("/api/records", get(get_records))
        .route("/api/countries.geojson", get(get_countries_geojson))
        .route("/api/export.csv", get(export_csv))
        .route("/api/export.geojson", get(export_geojson))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("bind {addr} failed: {err}");
            std::process::exit(1);
        }
    };
    info!("dashboard server listening on http://{addr} (predicate {predicate})");
    if let Err(err) = axum::serve(listener, app).await {
        error!("server stopped: {err}");
        std::process::exit(1);
    }
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

async fn get_species(State(state): State<AppState>) -> Response {
    let ds = &state.dataset;
    json_response(&json!({
        "species": ds.species(),
        "total_records": ds.occurrences.len(),
        "cleaning": ds.cleaning,
        "fingerprint": ds.fingerprint,
    }))
}

async fn get_dashboard(State(state): State<AppState>, Query(params): Query<ViewParams>) -> Response {
    let query = match params.dashboard_query(state.predicate) {
        Ok(q) => q,
        Err(err) => return bad_request(&err.to_string()),
    };
    let outcome = run_blocking(&state, move |ds| ds.dashboard(&query)).await;
    match outcome {
        Ok(Ok(outcome)) => json_response(&outcome),
        Ok(Err(err)) => internal_error(&err.to_string()),
        Err(resp) => resp,
    }
}

async fn get_richness(State(state): State<AppState>, Query(params): Query<ViewParams>) -> Response {
    let predicate = match params.predicate(state.predicate) {
        Ok(p) => p,
        Err(err) => return bad_request(&err.to_string()),
    };
    let filter = params.species_filter();
    let result = run_blocking(&state, move |ds| {
        ds.richness(&filter, predicate)
            .map(|richness| (ds.status(&filter), richness))
    })
    .await;
    match result {
        Ok(Ok((status, richness))) => json_response(&json!({
            "status": status,
            "message": status.message(),
            "predicate": richness.predicate,
            "rows": richness.rows,
            "matched_records": richness.matched_records,
            "min": richness.min(),
            "max": richness.max(),
            "color_domain": richness.color_domain(),
        })),
        Ok(Err(err)) => internal_error(&err.to_string()),
        Err(resp) => resp,
    }
}

async fn get_top_species(State(state): State<AppState>, Query(params): Query<ViewParams>) -> Response {
    let filter = params.species_filter();
    let n = params.top_n();
    match run_blocking(&state, move |ds| (ds.status(&filter), ds.top_species(&filter, n))).await {
        Ok((status, rows)) => json_response(&json!({
            "status": status,
            "message": status.message(),
            "rows": rows,
        })),
        Err(resp) => resp,
    }
}

async fn get_records(State(state): State<AppState>, Query(params): Query<ViewParams>) -> Response {
    let filter = params.species_filter();
    let limit = params.limit();
    match run_blocking(&state, move |ds| ds.records(&filter, limit)).await {
        Ok(page) => json_response(&page),
        Err(resp) => resp,
    }
}

async fn get_countries_geojson(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> Response {
    let predicate = match params.predicate(state.predicate) {
        Ok(p) => p,
        Err(err) => return bad_request(&err.to_string()),
    };
    let filter = params.species_filter();
    match run_blocking(&state, move |ds| ds.choropleth(&filter, predicate)).await {
        Ok(Ok(value)) => body_response(value.to_string(), "application/geo+json", None),
        Ok(Err(err)) => internal_error(&err.to_string()),
        Err(resp) => resp,
    }
}

async fn export_csv(State(state): State<AppState>, Query(params): Query<ViewParams>) -> Response {
    let filter = params.species_filter();
    match run_blocking(&state, move |ds| ds.export_csv(&filter)).await {
        Ok(Ok(bytes)) => body_response(bytes, "text/csv; charset=utf-8", Some("occurrences.csv")),
        Ok(Err(err)) => {
            error!("csv export failed: {err}");
            internal_error("csv export failed")
        }
        Err(resp) => resp,
    }
}

async fn export_geojson(State(state): State<AppState>, Query(params): Query<ViewParams>) -> Response {
    let filter = params.species_filter();
    match run_blocking(&state, move |ds| ds.export_geojson(&filter)).await {
        Ok(value) => body_response(
            value.to_string(),
            "application/geo+json",
            Some("occurrences.geojson"),
        ),
        Err(resp) => resp,
    }
}

/// Runs a synchronous query off the async workers.
async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, Response>
where
    F: FnOnce(&Dataset) -> T + Send + 'static,
    T: Send + 'static,
{
    let dataset = state.dataset.clone();
    tokio::task::spawn_blocking(move || f(dataset.as_ref()))
        .await
        .map_err(|err| {
            error!("query task failed: {err}");
            internal_error("query failed")
        })
}

fn json_response<T: Serialize>(value: &T) -> Response {
    match serde_json::to_string(value) {
        Ok(body) => body_response(body, "application/json", None),
        Err(err) => {
            error!("response serialization failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "serialization error").into_response()
        }
    }
}

fn body_response(body: impl Into<Body>, content_type: &'static str, attachment: Option<&str>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static(content_type),
    );
    if let Some(name) = attachment {
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")) {
            headers.insert(http::header::CONTENT_DISPOSITION, value);
        }
    }
    (StatusCode::OK, headers, body.into()).into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, axum::Json(json!({ "error": message }))).into_response()
}

fn internal_error(message: &str) -> Response {
    error!("request failed: {message}");
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(json!({ "error": message }))).into_response()
}

fn env_var_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
