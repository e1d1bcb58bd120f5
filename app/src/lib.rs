//! brainswap-app – Bibliotheks-Root
//!
//! Deklariert alle App-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.
//!
//! Das Binary laeuft auf dem kopflosen [`SimToolkit`] und ist daher stumm.
//! Ein Toolkit mit Ausgabegeraet wird ueber [`brainswap_audio::AudioToolkit`]
//! an [`Session::neu`] uebergeben, der Rest der Sitzung bleibt gleich.

pub mod config;
pub mod playlist;
pub mod sensor;
pub mod session;
pub mod visualizer;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use brainswap_audio::SimToolkit;
use brainswap_observability::{metrics_server_starten, BrainswapMetrics};
use config::ExperienceConfig;
use playlist::JsonPlaylist;
use sensor::ReplaySensor;
use session::Session;
use visualizer::TraceSink;

/// Abtastrate des kopflosen Toolkits
const SIM_ABTASTRATE: u32 = 44_100;

/// Haelt die App-Konfiguration zusammen
pub struct App {
    pub config: ExperienceConfig,
}

impl App {
    /// Erstellt eine neue App aus der gegebenen Konfiguration
    pub fn neu(config: ExperienceConfig) -> Self {
        Self { config }
    }

    /// Startet alle Teile und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metrik-Server (optional)
    /// 2. Sitzung anlegen, Cue-Dateien laden
    /// 3. Kalibrierung (abbrechbar mit Ctrl-C)
    /// 4. Erlebnis bis Ctrl-C
    /// 5. Zweistufiger Stop
    pub async fn starten(self) -> Result<()> {
        let metriken = BrainswapMetrics::neu()?;
        if self.config.observability.aktiviert {
            let adresse: SocketAddr = self
                .config
                .observability_bind_adresse()
                .parse()
                .map_err(|e| anyhow::anyhow!("Ungueltige Metrik-Adresse: {e}"))?;
            let m = metriken.clone();
            tokio::spawn(async move {
                if let Err(e) = metrics_server_starten(adresse, m).await {
                    tracing::error!("Metrik-Server beendet: {e}");
                }
            });
        }

        let playlist = Arc::new(JsonPlaylist::neu(
            &self.config.playlist.index,
            &self.config.playlist.audio_verzeichnis,
        ));
        let mut sensor = ReplaySensor::laden(
            &self.config.sensor.aufzeichnung,
            self.config.sensor.schleife,
        )
        .await?;

        tracing::info!(
            playlist = %self.config.playlist.index,
            aufzeichnung = %self.config.sensor.aufzeichnung,
            frames = sensor.len(),
            "Brainswap startet"
        );

        let mut session = Session::neu(
            self.config.clone(),
            SimToolkit::realtime(SIM_ABTASTRATE),
            playlist,
        )?
        .mit_metriken(metriken);
        session.cue_dateien_laden().await;

        tracing::info!("Kalibrierung: Augen offen halten, nach dem Ton schliessen");
        tokio::select! {
            profil = session.kalibrieren(&mut sensor) => {
                profil?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Shutdown-Signal waehrend der Kalibrierung");
                return session.stoppen().await;
            }
        }

        session
            .erlebnis_starten(Box::new(sensor), Box::new(TraceSink))
            .await?;

        tracing::info!("Erlebnis laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Sitzung wird beendet");

        session.stoppen().await
    }
}
