//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `BRAINSWAP_LOG_LEVEL`: Filter-Direktive (z.B. `debug` oder
//!   `info,brainswap_gaze=trace`), Standard aus `[logging]`
//! - `BRAINSWAP_LOG_FORMAT`: Format (text/json), Standard aus `[logging]`
//!
//! Die Umgebung hat Vorrang vor der Konfigurationsdatei.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter};

const ENV_LEVEL: &str = "BRAINSWAP_LOG_LEVEL";
const ENV_FORMAT: &str = "BRAINSWAP_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Unbekanntes Log-Format: {other}")),
        }
    }
}

/// Wirksame Logging-Einstellungen nach Zusammenfuehrung von Datei und Umgebung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEinstellungen {
    pub direktive: String,
    pub format: LogFormat,
}

/// Fuehrt Konfigurationswerte und Umgebungswerte zusammen.
///
/// Ungueltige Werte fallen auf `info` bzw. `text` zurueck.
pub fn einstellungen_aufloesen(
    level: &str,
    format: &str,
    env_level: Option<&str>,
    env_format: Option<&str>,
) -> LogEinstellungen {
    let direktive = env_level
        .filter(|l| EnvFilter::try_new(l).is_ok())
        .or(Some(level).filter(|l| EnvFilter::try_new(l).is_ok()))
        .unwrap_or("info")
        .to_string();
    let format = env_format
        .and_then(|f| f.parse().ok())
        .or_else(|| format.parse().ok())
        .unwrap_or_default();
    LogEinstellungen { direktive, format }
}

/// Initialisiert das Logging-System.
///
/// Ein bereits gesetzter globaler Subscriber bleibt bestehen
/// (relevant fuer Tests, die mehrere Sitzungen im selben Prozess starten).
pub fn logging_initialisieren(level: &str, format: &str) {
    let env_level = std::env::var(ENV_LEVEL).ok();
    let env_format = std::env::var(ENV_FORMAT).ok();
    let einstellungen =
        einstellungen_aufloesen(level, format, env_level.as_deref(), env_format.as_deref());
    let filter = EnvFilter::new(&einstellungen.direktive);

    let ergebnis = match einstellungen.format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    if ergebnis.is_ok() {
        tracing::debug!(
            direktive = %einstellungen.direktive,
            format = ?einstellungen.format,
            "Logging initialisiert"
        );
    }
}
