use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::api::health::HealthState;
use crate::api::latency::{LatencySnapshot, LatencyStats};
use crate::error::AppError;
use crate::pairing::{countries, default_selection};
use crate::pipeline::{self, RunInput, RunSummary, ScoredRun};
use crate::types::{Columns, MarketRecord, NettingConfig, ScoreWeights, ScoredPair, ShipMode};

#[derive(Clone)]
pub struct ApiState {
    /// Ship mode applied when a request leaves it unset.
    pub ship_mode: ShipMode,
    /// Ranked pairs returned when a request leaves `top_n` unset.
    pub top_n: usize,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/score", post(post_score))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    /// Raw rows; their keys are the declared columns even when null.
    pub records: Vec<Map<String, Value>>,
    pub buy_countries: Option<Vec<String>>,
    pub sell_countries: Option<Vec<String>>,
    #[serde(default)]
    pub netting: NettingOverrides,
    pub weights: Option<ScoreWeights>,
    pub top_n: Option<usize>,
}

/// Partial netting parameters. Unset fields keep the service defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NettingOverrides {
    pub vat: BTreeMap<String, f64>,
    pub discount: BTreeMap<String, f64>,
    pub ship_mode: Option<ShipMode>,
    pub referral_fee_fallback: Option<f64>,
    pub fulfillment_fee_fallback: Option<f64>,
    pub fbm_flat_shipping: Option<f64>,
    pub shipping_per_unit: Option<f64>,
    pub other_costs_sell: Option<f64>,
}

impl NettingOverrides {
    pub fn apply(self, base: NettingConfig) -> NettingConfig {
        let mut cfg = self
            .vat
            .iter()
            .fold(base, |cfg, (country, rate)| cfg.with_vat(country, *rate));
        cfg = self
            .discount
            .iter()
            .fold(cfg, |cfg, (country, d)| cfg.with_discount(country, *d));
        if let Some(mode) = self.ship_mode {
            cfg = cfg.with_ship_mode(mode);
        }
        if let Some(v) = self.referral_fee_fallback {
            cfg.referral_fee_fallback = v;
        }
        if let Some(v) = self.fulfillment_fee_fallback {
            cfg.fulfillment_fee_fallback = v;
        }
        if let Some(v) = self.fbm_flat_shipping {
            cfg.fbm_flat_shipping = v;
        }
        if let Some(v) = self.shipping_per_unit {
            cfg.shipping_per_unit = v;
        }
        if let Some(v) = self.other_costs_sell {
            cfg.other_costs_sell = v;
        }
        cfg
    }
}

/// Decodes raw rows into records, collecting every key seen as a column.
pub fn decode_records(rows: Vec<Map<String, Value>>) -> Result<(Vec<MarketRecord>, Columns), AppError> {
    let mut columns = Columns::default();
    let records = rows
        .into_iter()
        .map(|row| {
            columns.extend(row.keys().cloned());
            serde_json::from_value::<MarketRecord>(Value::Object(row))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((records, columns))
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub summary: RunSummary,
    pub pairs: Vec<ScoredPair>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub last_run_at_ns: u64,
    pub last_pair_count: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn post_score(
    State(state): State<ApiState>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    let started = Instant::now();
    let top_n = req.top_n.unwrap_or(state.top_n);
    let netting = req
        .netting
        .apply(NettingConfig::default().with_ship_mode(state.ship_mode));
    let weights = req.weights.unwrap_or_default();
    let (rows, buy, sell) = (req.records, req.buy_countries, req.sell_countries);

    let joined = tokio::task::spawn_blocking(move || {
        let (records, columns) = decode_records(rows)?;
        let (default_buy, default_sell) = default_selection(&countries(&records));
        let buy_countries = buy.unwrap_or(default_buy);
        let sell_countries = sell.unwrap_or(default_sell);
        pipeline::run(RunInput {
            records: &records,
            columns: &columns,
            buy_countries: &buy_countries,
            sell_countries: &sell_countries,
            netting: &netting,
            weights: &weights,
        })
    })
    .await;
    let mut scored = settle(joined, &state.health)?;

    state.latency.record(started.elapsed());
    state.health.record_run(scored.summary.pair_count);
    scored.pairs.truncate(top_n);
    info!(
        pairs = scored.summary.pair_count,
        returned = scored.pairs.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "[API] /score returned {} of {} pairs",
        scored.pairs.len(),
        scored.summary.pair_count,
    );

    Ok(Json(ScoreResponse {
        summary: scored.summary,
        pairs: scored.pairs,
    }))
}

/// Folds a finished blocking run into one result. Every failure counts,
/// including a task that panicked.
fn settle(
    joined: Result<crate::error::Result<ScoredRun>, tokio::task::JoinError>,
    health: &HealthState,
) -> Result<ScoredRun, AppError> {
    match joined.unwrap_or_else(|e| Err(AppError::from(e))) {
        Ok(scored) => Ok(scored),
        Err(e) => {
            health.record_failure();
            warn!("[API] score request rejected: {e}");
            Err(e)
        }
    }
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        runs_completed: state.health.runs_completed(),
        runs_failed: state.health.runs_failed(),
        last_run_at_ns: state.health.last_run_at_ns(),
        last_pair_count: state.health.last_pair_count(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}
