//! Brainswap – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet die App.

use anyhow::Result;
use brainswap_app::{config::ExperienceConfig, App};
use brainswap_observability::logging_initialisieren;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad =
        std::env::var("BRAINSWAP_CONFIG").unwrap_or_else(|_| "brainswap.toml".into());

    // Konfiguration lesen (Standardwerte falls Datei fehlt)
    let gelesen = ExperienceConfig::datei_lesen(&config_pfad)?;
    let datei_fehlt = gelesen.is_none();
    let config = gelesen.unwrap_or_default();

    logging_initialisieren(&config.logging.level, &config.logging.format);
    if datei_fehlt {
        ExperienceConfig::fehlende_datei_melden(&config_pfad);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Brainswap wird initialisiert"
    );

    App::neu(config).starten().await?;

    Ok(())
}
