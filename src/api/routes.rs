//! HTTP surface: the Walmart webhook, manual pricing operations, health and
//! stats. All endpoints return structured JSON; validation failures use a
//! `detail` field. Pricing endpoints tag their responses with the listing
//! identity so the logging layer can correlate traffic per ASIN.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Json as AxumJson, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::engine::{Persister, RepricingEngine};
use crate::ingest::normalizer::{parse_walmart_payload, WalmartWebhook};
use crate::middleware::logging::ListingIdentity;
use crate::stats::ProcessingStats;
use crate::store::Store;

/// Strategy name recorded on operator-driven price writes.
const MANUAL_STRATEGY_NAME: &str = "ManualOverride";

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<RepricingEngine>,
    pub store: Arc<dyn Store>,
    pub persister: Arc<Persister>,
    pub stats: Arc<ProcessingStats>,
    pub service_name: String,
    pub event_timeout: Duration,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/walmart/webhook", post(walmart_webhook))
        .route("/pricing/manual", post(manual_reprice))
        .route("/pricing/reset", post(price_reset))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

/// Build a JSON response, tagging it with the listing identity when the
/// handler got far enough to know one.
fn json_response(
    status: StatusCode,
    body: Value,
    identity: Option<ListingIdentity>,
) -> Response {
    let mut response = (status, Json(body)).into_response();
    if let Some(identity) = identity {
        response.extensions_mut().insert(identity);
    }
    response
}

/// `POST /walmart/webhook` — validate, enqueue, 202. Processing happens off
/// the request path; later skips or failures are invisible to the producer.
pub async fn walmart_webhook(
    State(state): State<ApiState>,
    AxumJson(body): AxumJson<Value>,
) -> Response {
    for field in ["itemId", "sellerId"] {
        let present = body
            .get(field)
            .and_then(Value::as_str)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);
        if !present {
            return json_response(
                StatusCode::BAD_REQUEST,
                json!({"detail": format!("{field} is required")}),
                None,
            );
        }
    }

    let payload: WalmartWebhook = match serde_json::from_value(body) {
        Ok(payload) => payload,
        Err(err) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                json!({"detail": format!("invalid webhook payload: {err}")}),
                None,
            );
        }
    };

    let change = match parse_walmart_payload(&payload) {
        Ok(change) => change,
        Err(err) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                json!({"detail": err.to_string()}),
                None,
            );
        }
    };

    let identity = ListingIdentity {
        asin: change.product_id.clone(),
        seller_id: change.seller_id.clone(),
    };
    let response = json!({
        "status": "accepted",
        "item_id": change.product_id.clone(),
        "seller_id": change.seller_id.clone(),
    });

    let engine = state.engine.clone();
    let timeout = state.event_timeout;
    tokio::spawn(async move {
        let result = tokio::time::timeout(timeout, engine.process(&change)).await;
        if let Ok(Err(err)) = result {
            warn!(
                item_id = %change.product_id,
                seller_id = %change.seller_id,
                error = %err,
                "webhook event failed"
            );
        }
    });

    json_response(StatusCode::ACCEPTED, response, Some(identity))
}

/// `POST /pricing/manual` — operator sets a price directly, bounds still
/// apply. Writes through the persister, bypassing change-only semantics.
pub async fn manual_reprice(
    State(state): State<ApiState>,
    AxumJson(body): AxumJson<Value>,
) -> Response {
    let started = Instant::now();

    let Some(new_price) = body.get("new_price").and_then(Value::as_f64) else {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({"detail": "Invalid new_price"}),
            None,
        );
    };
    if !new_price.is_finite() || new_price <= 0.0 {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({"detail": "Invalid new_price"}),
            None,
        );
    }

    let (asin, seller_id, sku) = match identity_fields(&body) {
        Ok(fields) => fields,
        Err(response) => return response,
    };
    let identity = ListingIdentity {
        asin: asin.clone(),
        seller_id: seller_id.clone(),
    };
    let reason = body
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("manual")
        .to_string();

    let product = match state.store.get_product(&asin, &seller_id, &sku).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            return json_response(
                StatusCode::NOT_FOUND,
                json!({"detail": "Product not found"}),
                Some(identity),
            );
        }
        Err(err) => return store_failure(err.to_string(), Some(identity)),
    };

    if let Some(max) = product.max_price {
        if new_price > max {
            return json_response(
                StatusCode::BAD_REQUEST,
                json!({"detail": "Price above maximum price"}),
                Some(identity),
            );
        }
    }
    if let Some(min) = product.min_price {
        if new_price < min {
            return json_response(
                StatusCode::BAD_REQUEST,
                json!({"detail": "Price below minimum price"}),
                Some(identity),
            );
        }
    }

    match state
        .persister
        .persist(
            &product,
            new_price,
            MANUAL_STRATEGY_NAME,
            &product.strategy_id,
            None,
            Default::default(),
            started,
        )
        .await
    {
        Ok(written) => {
            info!(asin = %asin, seller_id = %seller_id, new_price, reason = %reason, "manual reprice");
            json_response(
                StatusCode::OK,
                json!({
                    "status": "success",
                    "new_price": written.new_price,
                    "old_price": written.old_price,
                    "updated_at": written.calculated_at.to_rfc3339(),
                    "reason": reason,
                }),
                Some(identity),
            )
        }
        Err(err) => store_failure(err.to_string(), Some(identity)),
    }
}

/// `POST /pricing/reset` — force one product back to its default price and
/// pause repricing for it, exactly like the scheduled sweep does.
pub async fn price_reset(
    State(state): State<ApiState>,
    AxumJson(body): AxumJson<Value>,
) -> Response {
    let started = Instant::now();

    let (asin, seller_id, sku) = match identity_fields(&body) {
        Ok(fields) => fields,
        Err(response) => return response,
    };
    let identity = ListingIdentity {
        asin: asin.clone(),
        seller_id: seller_id.clone(),
    };
    let reason = body
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("manual_reset")
        .to_string();

    let product = match state.store.get_product(&asin, &seller_id, &sku).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            return json_response(
                StatusCode::NOT_FOUND,
                json!({"detail": "Product not found"}),
                Some(identity),
            );
        }
        Err(err) => return store_failure(err.to_string(), Some(identity)),
    };

    let Some(default_price) = product.default_price.filter(|p| *p > 0.0) else {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({"detail": "Product has no default price"}),
            Some(identity),
        );
    };

    match state
        .persister
        .persist(
            &product,
            default_price,
            crate::reset::RESET_STRATEGY_NAME,
            &product.strategy_id,
            None,
            Default::default(),
            started,
        )
        .await
    {
        Ok(written) => {
            if let Err(err) = state.store.set_paused(&seller_id, &asin, true).await {
                warn!(asin = %asin, seller_id = %seller_id, error = %err, "pause flag write failed");
            }
            info!(asin = %asin, seller_id = %seller_id, default_price, reason = %reason, "price reset");
            json_response(
                StatusCode::OK,
                json!({
                    "status": "success",
                    "new_price": written.new_price,
                    "reset_at": written.calculated_at.to_rfc3339(),
                    "reason": reason,
                }),
                Some(identity),
            )
        }
        Err(err) => store_failure(err.to_string(), Some(identity)),
    }
}

pub async fn health(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.service_name,
    }))
}

pub async fn stats(State(state): State<ApiState>) -> Json<Value> {
    let snapshot = state.stats.snapshot();
    Json(json!({
        "total_processed": snapshot.total_processed,
        "successful": snapshot.successful,
        "failed": snapshot.failed,
        "skipped": snapshot.skipped,
        "average_processing_time_ms": snapshot.average_processing_time_ms,
        "last_reset": snapshot.last_reset.to_rfc3339(),
    }))
}

fn identity_fields(body: &Value) -> Result<(String, String, String), Response> {
    let mut out = Vec::with_capacity(3);
    for field in ["asin", "seller_id", "sku"] {
        match body.get(field).and_then(Value::as_str) {
            Some(v) if !v.trim().is_empty() => out.push(v.to_string()),
            _ => {
                return Err(json_response(
                    StatusCode::BAD_REQUEST,
                    json!({"detail": format!("{field} is required")}),
                    None,
                ));
            }
        }
    }
    let sku = out.pop().unwrap();
    let seller_id = out.pop().unwrap();
    let asin = out.pop().unwrap();
    Ok((asin, seller_id, sku))
}

fn store_failure(detail: String, identity: Option<ListingIdentity>) -> Response {
    warn!(detail = %detail, "store failure while serving request");
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"detail": "internal error"}),
        identity,
    )
}
