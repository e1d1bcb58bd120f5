//! # brainswap-observability
//!
//! Observability-Crate fuer Brainswap:
//! - Structured Logging via tracing-subscriber (text oder JSON)
//! - Prometheus-kompatible Metriken der Blick-Erkennung und des Audio-Mix
//! - Optionaler `/metrics`-Endpunkt

pub mod logging;
pub mod metrics;

pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, BrainswapMetrics};

use anyhow::Result;
use std::net::SocketAddr;

/// Startet den Metrik-HTTP-Server
///
/// Endpunkt: `GET /metrics` – Prometheus scrape format
pub async fn metrics_server_starten(bind_addr: SocketAddr, metriken: BrainswapMetrics) -> Result<()> {
    let app = metrics_router(metriken);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Metrik-Server gestartet");

    axum::serve(listener, app).await?;
    Ok(())
}
