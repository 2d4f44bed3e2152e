//! Sports News Aggregator: binary entrypoint.
//! Boots the Axum HTTP server: config stack, live aggregator, optional /metrics.
//!
//! See `README.md` for the endpoint contract and configuration files.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use sports_news_aggregator::metrics::Metrics;
use sports_news_aggregator::{aggregator_from_env, init_tracing, router};
use tracing::{info, warn};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    // Recorder first so gauges set while wiring the aggregator are kept.
    let metrics = if Metrics::route_enabled() {
        Metrics::init()
            .map_err(|e| warn!(error = %e, "metrics disabled"))
            .ok()
    } else {
        None
    };

    let aggregator = aggregator_from_env()
        .map_err(|e| shuttle_runtime::Error::Custom(e.context("aggregator startup")))?;
    let mut app = router(Arc::new(aggregator));

    if let Some(m) = metrics {
        app = app.merge(m.router());
        info!("metrics route enabled at /metrics");
    }

    Ok(app.into())
}
