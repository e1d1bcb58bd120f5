//! Prometheus-kompatible Metriken fuer Brainswap
//!
//! Registrierte Metriken:
//! - `brainswap_detection_ticks_total` – Counter: Erkennungs-Ticks
//! - `brainswap_empty_frames_total` – Counter: Ticks ohne Gesicht
//! - `brainswap_gaze_transitions_total` – Counter: Blickwechsel (zustand = open/closed)
//! - `brainswap_voice_starts_total` – Counter: Gestartete Voice-Wiedergaben
//! - `brainswap_fallback_buffers_total` – Counter: Rausch-Ersatz statt Clip
//! - `brainswap_completed_clips_total` – Counter: Natuerlich beendete Clips
//! - `brainswap_eye_openness_ratio` – Gauge: Letztes Augen-Oeffnungsverhaeltnis
//! - `brainswap_head_yaw` – Gauge: Letzte kalibrierte Kopfrotation
//! - `brainswap_calibration_threshold` – Gauge: Kalibrierte Schwelle
//! - `brainswap_detection_duration_seconds` – Histogram: Dauer eines Sensor-Aufrufs

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle Brainswap-Prometheus-Metriken
#[derive(Clone)]
pub struct BrainswapMetrics {
    pub registry: Arc<Registry>,

    // Erkennung
    pub detection_ticks: IntCounter,
    pub empty_frames: IntCounter,
    pub gaze_transitions: IntCounterVec,
    pub detection_duration_seconds: Histogram,
    pub eye_openness_ratio: Gauge,
    pub head_yaw: Gauge,
    pub calibration_threshold: Gauge,

    // Audio
    pub voice_starts: IntCounter,
    pub fallback_buffers: IntCounter,
    pub completed_clips: IntCounter,
}

fn zaehler(registry: &Registry, name: &str, hilfe: &str) -> Result<IntCounter> {
    let c = IntCounter::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

fn messwert(registry: &Registry, name: &str, hilfe: &str) -> Result<Gauge> {
    let g = Gauge::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

impl BrainswapMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Erkennung ---
        let detection_ticks = zaehler(
            &registry,
            "brainswap_detection_ticks_total",
            "Anzahl ausgefuehrter Erkennungs-Ticks",
        )?;
        let empty_frames = zaehler(
            &registry,
            "brainswap_empty_frames_total",
            "Anzahl Ticks ohne erkanntes Gesicht",
        )?;

        let gaze_transitions = IntCounterVec::new(
            Opts::new(
                "brainswap_gaze_transitions_total",
                "Anzahl Blickwechsel nach Zielzustand",
            ),
            &["zustand"],
        )?;
        registry.register(Box::new(gaze_transitions.clone()))?;

        let detection_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "brainswap_detection_duration_seconds",
                "Dauer eines Sensor-Aufrufs in Sekunden",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.15, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(detection_duration_seconds.clone()))?;

        let eye_openness_ratio = messwert(
            &registry,
            "brainswap_eye_openness_ratio",
            "Letztes Augen-Oeffnungsverhaeltnis",
        )?;
        let head_yaw = messwert(
            &registry,
            "brainswap_head_yaw",
            "Letzte kalibrierte Kopfrotation",
        )?;
        let calibration_threshold = messwert(
            &registry,
            "brainswap_calibration_threshold",
            "Kalibrierte Schwelle offen/geschlossen",
        )?;

        // --- Audio ---
        let voice_starts = zaehler(
            &registry,
            "brainswap_voice_starts_total",
            "Anzahl gestarteter Voice-Wiedergaben",
        )?;
        let fallback_buffers = zaehler(
            &registry,
            "brainswap_fallback_buffers_total",
            "Anzahl Clips die durch Rauschen ersetzt wurden",
        )?;
        let completed_clips = zaehler(
            &registry,
            "brainswap_completed_clips_total",
            "Anzahl natuerlich beendeter Clips",
        )?;

        Ok(Self {
            registry: Arc::new(registry),
            detection_ticks,
            empty_frames,
            gaze_transitions,
            detection_duration_seconds,
            eye_openness_ratio,
            head_yaw,
            calibration_threshold,
            voice_starts,
            fallback_buffers,
            completed_clips,
        })
    }

    /// Zaehlt einen Blickwechsel (`geschlossen = true` fuer CLOSED)
    pub fn blickwechsel(&self, geschlossen: bool) {
        let zustand = if geschlossen { "closed" } else { "open" };
        self.gaze_transitions.with_label_values(&[zustand]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: BrainswapMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<BrainswapMetrics>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
