//! Konfiguration des Erlebnisses
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass Brainswap ohne Konfigurationsdatei
//! lauffaehig ist.

use brainswap_audio::MixConfig;
use brainswap_gaze::{CalibrationConfig, FeatureConfig};
use serde::{Deserialize, Serialize};

/// Vollstaendige Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceConfig {
    /// Takt der Erkennung und der Anzeige
    pub erfassung: ErfassungEinstellungen,
    /// Merkmal-Extraktion (Gierwinkel-Empfindlichkeit)
    pub merkmale: FeatureConfig,
    /// Kalibrierungs-Ablauf
    pub kalibrierung: CalibrationConfig,
    /// Audio-Mix und Cue-Dateien
    pub audio: AudioEinstellungen,
    /// Pro-Sitzung-Werte
    pub sitzung: SitzungEinstellungen,
    /// Visualisierungs-Flaeche
    pub anzeige: AnzeigeEinstellungen,
    /// Playlist-Quelle
    pub playlist: PlaylistEinstellungen,
    /// Keypoint-Quelle
    pub sensor: SensorEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken)
    pub observability: ObservabilityEinstellungen,
}

/// Takt der beiden kooperativen Aufgaben
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErfassungEinstellungen {
    /// Mindestabstand zwischen zwei Sensor-Aufrufen (ms)
    pub intervall_ms: u64,
    /// Anzeige-Tick (ms)
    pub anzeige_tick_ms: u64,
}

impl Default for ErfassungEinstellungen {
    fn default() -> Self {
        Self {
            intervall_ms: 150,
            anzeige_tick_ms: 16,
        }
    }
}

/// Audio-Einstellungen: Mix-Parameter plus optionale Cue-Dateien
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    #[serde(flatten)]
    pub mix: MixConfig,
    /// WAV-Loop fuer den Scan-Cue (ohne Datei bleibt der Cue stumm)
    pub scan_sound: Option<String>,
    /// WAV fuer den Abschluss-Cue (ohne Datei wird synthetisiert)
    pub snap_sound: Option<String>,
}

/// Pro-Sitzung-Werte
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungEinstellungen {
    /// Zielrotation wird gleichverteilt aus [-grenze, grenze] gezogen (rad)
    pub rotation_grenze: f32,
    /// Toleranz um die Zielrotation
    pub ziel_toleranz: f32,
    /// Fester Seed fuer reproduzierbare Sitzungen
    pub seed: Option<u64>,
}

impl Default for SitzungEinstellungen {
    fn default() -> Self {
        Self {
            rotation_grenze: 0.7,
            ziel_toleranz: 0.15,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnzeigeEinstellungen {
    pub breite: f32,
    pub hoehe: f32,
}

impl Default for AnzeigeEinstellungen {
    fn default() -> Self {
        Self {
            breite: 800.0,
            hoehe: 600.0,
        }
    }
}

/// Playlist-Quelle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistEinstellungen {
    /// JSON-Index der verfuegbaren Clips
    pub index: String,
    /// Verzeichnis mit den Clip-Dateien (`<verzeichnis>/<id>`)
    pub audio_verzeichnis: String,
}

impl Default for PlaylistEinstellungen {
    fn default() -> Self {
        Self {
            index: "playlist.json".into(),
            audio_verzeichnis: "audio".into(),
        }
    }
}

/// Keypoint-Quelle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorEinstellungen {
    /// JSON-Lines-Aufzeichnung, ein Frame pro Zeile
    pub aufzeichnung: String,
    /// Am Ende der Aufzeichnung von vorne beginnen
    pub schleife: bool,
}

impl Default for SensorEinstellungen {
    fn default() -> Self {
        Self {
            aufzeichnung: "gesicht.jsonl".into(),
            schleife: true,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level oder Filter-Direktive, z.B. "info" oder "info,brainswap_gaze=trace"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den `/metrics`-Endpunkt
    pub aktiviert: bool,
    pub bind_adresse: String,
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: false,
            bind_adresse: "127.0.0.1".into(),
            port: 9300,
        }
    }
}

impl ExperienceConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match Self::datei_lesen(pfad)? {
            Some(config) => Ok(config),
            None => {
                Self::fehlende_datei_melden(pfad);
                Ok(Self::default())
            }
        }
    }

    /// Liest und prueft die Datei ohne zu loggen. `None` wenn sie fehlt.
    ///
    /// Fuer den Start vor der Logging-Initialisierung.
    pub fn datei_lesen(pfad: &str) -> anyhow::Result<Option<Self>> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.pruefen()?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    pub fn fehlende_datei_melden(pfad: &str) {
        tracing::warn!(
            pfad = pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    /// Prueft Wertebereiche die serde nicht abdecken kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        self.kalibrierung.validate()?;
        self.audio.mix.validate()?;
        if self.erfassung.anzeige_tick_ms == 0 {
            anyhow::bail!("erfassung.anzeige_tick_ms muss > 0 sein");
        }
        let grenze = self.sitzung.rotation_grenze;
        if !grenze.is_finite() || grenze < 0.0 {
            anyhow::bail!("sitzung.rotation_grenze muss endlich und >= 0 sein");
        }
        Ok(())
    }

    /// Gibt die Bind-Adresse fuer den Metrik-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!(
            "{}:{}",
            self.observability.bind_adresse, self.observability.port
        )
    }
}
