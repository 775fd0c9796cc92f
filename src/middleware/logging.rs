//! Request logging middleware.
//!
//! Pricing handlers attach a [`ListingIdentity`] to their responses; the
//! layer folds it into the request log so a grep for an ASIN or seller turns
//! up the API traffic that touched it, not just the pipeline decisions.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

/// Listing coordinates attached to a response by the pricing endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingIdentity {
    pub asin: String,
    pub seller_id: String,
}

/// Logs method, path, status, latency, and the listing identity when the
/// handler provided one. WARN for 5xx, INFO otherwise. `/health` and
/// `/stats` are polled by probes and skipped to keep pricing traffic
/// readable.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if matches!(path.as_str(), "/health" | "/stats") {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    let identity = response.extensions().get::<ListingIdentity>();
    let asin = identity.map(|i| i.asin.as_str());
    let seller_id = identity.map(|i| i.seller_id.as_str());

    if status >= 500 {
        warn!(
            method = %method,
            path = %path,
            status,
            latency_ms,
            asin,
            seller_id,
            "pricing request failed"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status,
            latency_ms,
            asin,
            seller_id,
            "pricing request handled"
        );
    }

    response
}
