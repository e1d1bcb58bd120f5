//! Sensor aus einer Keypoint-Aufzeichnung
//!
//! Eine Zeile pro Detektor-Aufruf, jede Zeile ein JSON-Array von Punkten
//! (`{"x": .., "y": ..}` oder `null` fuer unbesetzte Landmarks). Eine
//! leere Zeile oder `[]` bedeutet "kein Gesicht".

use std::path::Path;

use async_trait::async_trait;
use brainswap_core::{BrainswapError, Result};
use brainswap_gaze::{FaceSensor, KeypointFrame};
use tracing::{debug, warn};

/// Spielt aufgezeichnete Frames der Reihe nach ab
#[derive(Debug, Clone)]
pub struct ReplaySensor {
    zeilen: Vec<String>,
    position: usize,
    schleife: bool,
}

impl ReplaySensor {
    pub fn aus_text(text: &str, schleife: bool) -> Self {
        Self {
            zeilen: text.lines().map(str::to_owned).collect(),
            position: 0,
            schleife,
        }
    }

    /// Liest eine Aufzeichnung von der Platte
    pub async fn laden(pfad: impl AsRef<Path>, schleife: bool) -> Result<Self> {
        let pfad = pfad.as_ref();
        let text = tokio::fs::read_to_string(pfad).await.map_err(|e| {
            BrainswapError::Sensor(format!("Aufzeichnung '{}' nicht lesbar: {e}", pfad.display()))
        })?;
        let sensor = Self::aus_text(&text, schleife);
        debug!(pfad = %pfad.display(), frames = sensor.zeilen.len(), "Aufzeichnung geladen");
        Ok(sensor)
    }

    pub fn len(&self) -> usize {
        self.zeilen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zeilen.is_empty()
    }

    fn naechste_zeile(&mut self) -> Option<(usize, &str)> {
        if self.position >= self.zeilen.len() {
            if !self.schleife || self.zeilen.is_empty() {
                return None;
            }
            self.position = 0;
        }
        let nummer = self.position;
        self.position += 1;
        self.zeilen.get(nummer).map(|z| (nummer + 1, z.as_str()))
    }
}

#[async_trait]
impl FaceSensor for ReplaySensor {
    async fn detect(&mut self) -> KeypointFrame {
        let Some((nummer, zeile)) = self.naechste_zeile() else {
            return KeypointFrame::empty();
        };
        let zeile = zeile.trim();
        if zeile.is_empty() {
            return KeypointFrame::empty();
        }
        match serde_json::from_str::<KeypointFrame>(zeile) {
            Ok(frame) => frame,
            Err(e) => {
                // Fehler des Detektors werden als "kein Gesicht" gemeldet
                warn!(zeile = nummer, "Frame nicht lesbar, verwerfe: {e}");
                KeypointFrame::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainswap_gaze::Point2;

    const AUFZEICHNUNG: &str = r#"[{"x": 1.0, "y": 2.0}, null, {"x": 3.0, "y": 4.0}]

kein json
[]"#;

    #[tokio::test]
    async fn frames_der_reihe_nach() {
        let mut sensor = ReplaySensor::aus_text(AUFZEICHNUNG, false);
        assert_eq!(sensor.len(), 4);

        let frame = sensor.detect().await;
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.get(0), Some(Point2::new(1.0, 2.0)));
        assert_eq!(frame.get(1), None);

        // Leerzeile, kaputte Zeile, leeres Array: jeweils kein Gesicht
        assert!(sensor.detect().await.is_empty());
        assert!(sensor.detect().await.is_empty());
        assert!(sensor.detect().await.is_empty());

        // Ohne Schleife bleibt es leer
        assert!(sensor.detect().await.is_empty());
    }

    #[tokio::test]
    async fn schleife_beginnt_von_vorn() {
        let mut sensor = ReplaySensor::aus_text(AUFZEICHNUNG, true);
        for _ in 0..4 {
            sensor.detect().await;
        }
        assert_eq!(sensor.detect().await.len(), 3);
    }

    #[tokio::test]
    async fn leere_aufzeichnung_mit_schleife() {
        let mut sensor = ReplaySensor::aus_text("", true);
        assert!(sensor.is_empty());
        assert!(sensor.detect().await.is_empty());
    }

    #[tokio::test]
    async fn aufzeichnung_von_platte() {
        let temp = tempfile::tempdir().expect("Temp-Verzeichnis konnte nicht erstellt werden");
        let pfad = temp.path().join("gesicht.jsonl");
        std::fs::write(&pfad, AUFZEICHNUNG).unwrap();

        let mut sensor = ReplaySensor::laden(&pfad, false).await.unwrap();
        assert_eq!(sensor.len(), 4);
        assert_eq!(sensor.detect().await.len(), 3);
    }

    #[tokio::test]
    async fn fehlende_datei_ist_fehler() {
        let fehler = ReplaySensor::laden("/nicht/vorhanden.jsonl", true)
            .await
            .unwrap_err();
        assert!(matches!(fehler, BrainswapError::Sensor(_)));
        assert!(fehler.to_string().contains("vorhanden.jsonl"));
    }
}
