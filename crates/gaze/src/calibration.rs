//! Blick-Kalibrierung
//!
//! Misst das Augen-Oeffnungsverhaeltnis bei offenen und geschlossenen Augen
//! und leitet daraus einen persoenlichen Schwellenwert ab. Dazu kommt ein
//! Yaw-Nullpunkt fuer die Kopfrotation.
//!
//! Ablauf (streng sequenziell, nur zeitgesteuerte Wartepunkte):
//! 1. Warten bis ein Gesicht erkannt wird (Abfrage alle 200 ms)
//! 2. 20 Messungen mit offenen Augen (alle 100 ms)
//! 3. Signalton, 1.5 s Pause, 20 Messungen mit geschlossenen Augen
//! 4. Ein weiterer Frame direkt danach liefert den Yaw-Nullpunkt
//! 5. Schwellenwert berechnen, zweiter Signalton

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{GazeError, GazeResult};
use crate::features::{eye_openness_ratio, raw_head_yaw, FeatureConfig};
use crate::sensor::FaceSensor;

/// Konfiguration der Kalibrierung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Messungen pro Fenster (offen und geschlossen)
    pub sample_count: u32,
    /// Abstand zwischen zwei Messungen in ms
    pub sample_interval_ms: u64,
    /// Abfrageintervall waehrend der Gesichtssuche in ms
    pub face_poll_ms: u64,
    /// Pause zwischen "Augen offen" und "Augen zu" in ms
    pub transition_pause_ms: u64,
    /// Ersatzwert wenn keine Messung mit offenen Augen gelang
    pub fallback_open: f32,
    /// Ersatzwert wenn keine Messung mit geschlossenen Augen gelang
    pub fallback_closed: f32,
    /// Lage des Schwellenwerts zwischen geschlossen (0.0) und offen (1.0)
    pub threshold_bias: f32,
    /// Signalton nach dem Offen-Fenster (Hz)
    pub beep_open_hz: f32,
    /// Signalton nach Abschluss (Hz)
    pub beep_done_hz: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_count: 20,
            sample_interval_ms: 100,
            face_poll_ms: 200,
            transition_pause_ms: 1500,
            fallback_open: 0.3,
            fallback_closed: 0.15,
            threshold_bias: 0.45,
            beep_open_hz: 600.0,
            beep_done_hz: 1000.0,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> GazeResult<()> {
        if self.sample_count == 0 {
            return Err(GazeError::Konfiguration(
                "sample_count muss > 0 sein".to_string(),
            ));
        }
        if !(self.threshold_bias > 0.0 && self.threshold_bias < 1.0) {
            return Err(GazeError::Konfiguration(format!(
                "threshold_bias muss in (0, 1) liegen, war {}",
                self.threshold_bias
            )));
        }
        if self.fallback_open <= self.fallback_closed {
            return Err(GazeError::Konfiguration(format!(
                "fallback_open ({}) muss groesser als fallback_closed ({}) sein",
                self.fallback_open, self.fallback_closed
            )));
        }
        Ok(())
    }
}

/// Persoenliches Kalibrierungsprofil, einmal pro Sitzung erzeugt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub average_open_ratio: f32,
    pub average_closed_ratio: f32,
    /// Grenze: Verhaeltnis < threshold => Augen zu
    pub threshold: f32,
    /// Roher Gierwinkel der als Null gilt
    pub yaw_baseline: f32,
}

impl CalibrationProfile {
    /// Profil aus den beiden Mittelwerten
    pub fn from_averages(open: f32, closed: f32, bias: f32, yaw_baseline: f32) -> Self {
        Self {
            average_open_ratio: open,
            average_closed_ratio: closed,
            threshold: threshold_for(open, closed, bias),
            yaw_baseline,
        }
    }
}

impl Default for CalibrationProfile {
    /// Unkalibriertes Profil mit den Ersatzwerten
    fn default() -> Self {
        let config = CalibrationConfig::default();
        Self::from_averages(
            config.fallback_open,
            config.fallback_closed,
            config.threshold_bias,
            0.0,
        )
    }
}

/// `closed + (open - closed) * bias`; bei bias < 0.5 naeher an "geschlossen"
pub fn threshold_for(open: f32, closed: f32, bias: f32) -> f32 {
    closed + (open - closed) * bias
}

/// Arithmetisches Mittel, Ersatzwert bei leerer Menge
pub fn mean_or(samples: &[f32], fallback: f32) -> f32 {
    if samples.is_empty() {
        return fallback;
    }
    samples.iter().sum::<f32>() / samples.len() as f32
}

/// Aktuelle Kalibrierungsphase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationPhase {
    SearchingFace,
    EyesOpen,
    EyesClosed,
    Done,
}

/// Fortschritt fuer die Anzeige (0.0..=1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProgress {
    pub phase: CalibrationPhase,
    pub fraction: f32,
}

/// Hoerbare Hinweise waehrend der Kalibrierung
#[async_trait]
pub trait CalibrationCues: Send {
    async fn beep(&mut self, freq_hz: f32);
}

/// Kalibrierungs-Ablauf
pub struct CalibrationEngine {
    config: CalibrationConfig,
    features: FeatureConfig,
    progress: watch::Sender<CalibrationProgress>,
}

impl CalibrationEngine {
    pub fn new(config: CalibrationConfig, features: FeatureConfig) -> GazeResult<Self> {
        config.validate()?;
        let (progress, _) = watch::channel(CalibrationProgress {
            phase: CalibrationPhase::SearchingFace,
            fraction: 0.0,
        });
        Ok(Self {
            config,
            features,
            progress,
        })
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Abonniert den Fortschritt
    pub fn subscribe(&self) -> watch::Receiver<CalibrationProgress> {
        self.progress.subscribe()
    }

    /// Fuehrt die komplette Kalibrierung aus.
    ///
    /// Blockiert unbegrenzt solange kein Gesicht erkannt wird; Abbruch nur
    /// durch Droppen des Futures (Aufrufer verlaesst die Kalibrierung).
    pub async fn run(
        &self,
        sensor: &mut dyn FaceSensor,
        cues: &mut dyn CalibrationCues,
    ) -> CalibrationProfile {
        self.wait_for_face(sensor).await;

        let open = self
            .sample_window(sensor, CalibrationPhase::EyesOpen, 0.0)
            .await;
        cues.beep(self.config.beep_open_hz).await;

        tokio::time::sleep(Duration::from_millis(self.config.transition_pause_ms)).await;
        let closed = self
            .sample_window(sensor, CalibrationPhase::EyesClosed, 0.5)
            .await;

        // Nullpunkt aus dem Frame direkt nach dem Geschlossen-Fenster
        let baseline_frame = sensor.detect().await;
        let yaw_baseline = if baseline_frame.is_empty() {
            debug!("Kein Gesicht fuer Yaw-Nullpunkt, verwende 0");
            0.0
        } else {
            raw_head_yaw(&baseline_frame, &self.features)
        };

        let profile = CalibrationProfile::from_averages(
            mean_or(&open, self.config.fallback_open),
            mean_or(&closed, self.config.fallback_closed),
            self.config.threshold_bias,
            yaw_baseline,
        );

        info!(
            open = profile.average_open_ratio,
            closed = profile.average_closed_ratio,
            threshold = profile.threshold,
            yaw_baseline = profile.yaw_baseline,
            open_samples = open.len(),
            closed_samples = closed.len(),
            "Kalibrierung abgeschlossen"
        );

        cues.beep(self.config.beep_done_hz).await;
        self.progress.send_replace(CalibrationProgress {
            phase: CalibrationPhase::Done,
            fraction: 1.0,
        });
        profile
    }

    /// Fragt den Sensor ab bis ein Gesicht erkannt wird
    pub async fn wait_for_face(&self, sensor: &mut dyn FaceSensor) {
        self.progress.send_replace(CalibrationProgress {
            phase: CalibrationPhase::SearchingFace,
            fraction: 0.0,
        });
        let poll = Duration::from_millis(self.config.face_poll_ms);
        loop {
            if !sensor.detect().await.is_empty() {
                debug!("Gesicht erkannt");
                return;
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Ein Messfenster; Frames ohne Gesicht werden uebersprungen
    async fn sample_window(
        &self,
        sensor: &mut dyn FaceSensor,
        phase: CalibrationPhase,
        offset: f32,
    ) -> Vec<f32> {
        let count = self.config.sample_count;
        let interval = Duration::from_millis(self.config.sample_interval_ms);
        let mut samples = Vec::with_capacity(count as usize);

        for i in 0..count {
            let frame = sensor.detect().await;
            if let Some(ratio) = eye_openness_ratio(&frame) {
                samples.push(ratio);
            }
            self.progress.send_replace(CalibrationProgress {
                phase,
                fraction: offset + i as f32 / (count * 2) as f32,
            });
            tokio::time::sleep(interval).await;
        }

        debug!(?phase, gemessen = samples.len(), "Messfenster beendet");
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{head_yaw, synthetic_face};
    use crate::keypoints::KeypointFrame;
    use crate::sensor::ScriptedSensor;

    #[derive(Default)]
    struct Toene(Vec<f32>);

    #[async_trait]
    impl CalibrationCues for Toene {
        async fn beep(&mut self, freq_hz: f32) {
            self.0.push(freq_hz);
        }
    }

    fn nah(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn schwellenwert_szenario() {
        let p = CalibrationProfile::from_averages(0.32, 0.12, 0.45, 0.0);
        assert!(nah(p.threshold, 0.21), "threshold war {}", p.threshold);
    }

    #[test]
    fn schwellenwert_liegt_zwischen_mittelwerten() {
        let paare = [(0.32, 0.12), (0.9, 0.01), (0.151, 0.15), (0.4, 0.39), (1.0, 0.0)];
        for (open, closed) in paare {
            let t = threshold_for(open, closed, 0.45);
            assert!(closed < t && t < open, "{closed} < {t} < {open} verletzt");
            // Naeher an "geschlossen"
            assert!(t - closed < open - t);
        }
    }

    #[test]
    fn mittelwert_mit_ersatz() {
        assert_eq!(mean_or(&[], 0.3), 0.3);
        assert!(nah(mean_or(&[0.2, 0.4], 0.3), 0.3));
        assert!(nah(mean_or(&[0.1], 0.3), 0.1));
    }

    #[test]
    fn default_profil_sinnvoll() {
        let p = CalibrationProfile::default();
        assert!(p.average_open_ratio > p.average_closed_ratio);
        assert!(p.threshold > p.average_closed_ratio);
        assert_eq!(p.yaw_baseline, 0.0);
    }

    #[test]
    fn konfiguration_validierung() {
        assert!(CalibrationConfig::default().validate().is_ok());
        let null = CalibrationConfig {
            sample_count: 0,
            ..Default::default()
        };
        assert!(null.validate().is_err());
        let bias = CalibrationConfig {
            threshold_bias: 1.0,
            ..Default::default()
        };
        assert!(bias.validate().is_err());
        assert!(CalibrationEngine::new(bias, FeatureConfig::default()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn kalibrierung_kompletter_ablauf() {
        let config = CalibrationConfig::default();
        let n = config.sample_count as usize;

        let mut frames = vec![KeypointFrame::empty(), KeypointFrame::empty()];
        frames.push(synthetic_face(0.3, 0.0)); // Gesicht gefunden
        frames.extend(std::iter::repeat(synthetic_face(0.32, 0.0)).take(n));
        frames.extend(std::iter::repeat(synthetic_face(0.12, 0.0)).take(n));
        let baseline_frame = synthetic_face(0.12, 30.0);
        frames.push(baseline_frame.clone());
        let mut sensor = ScriptedSensor::new(frames);

        let engine = CalibrationEngine::new(config, FeatureConfig::default()).unwrap();
        let progress = engine.subscribe();
        let mut toene = Toene::default();

        let start = tokio::time::Instant::now();
        let profile = engine.run(&mut sensor, &mut toene).await;
        let dauer = start.elapsed();

        assert!(nah(profile.average_open_ratio, 0.32));
        assert!(nah(profile.average_closed_ratio, 0.12));
        assert!(nah(profile.threshold, 0.21));
        assert_eq!(toene.0, vec![600.0, 1000.0]);
        assert_eq!(sensor.calls(), 3 + 2 * n + 1);
        // Yaw-Nullpunkt: auf genau diesem Frame ergibt sich 0
        assert_eq!(
            head_yaw(&baseline_frame, profile.yaw_baseline, &FeatureConfig::default()),
            0.0
        );
        // 2 x 200 ms Suche + 2 x 20 x 100 ms + 1.5 s Pause
        assert!(dauer >= Duration::from_millis(400 + 4000 + 1500));
        assert!(dauer < Duration::from_millis(6000));
        assert_eq!(progress.borrow().phase, CalibrationPhase::Done);
        assert_eq!(progress.borrow().fraction, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn kalibrierung_ohne_messwerte_nutzt_ersatz() {
        // Gesicht nur beim Suchen, danach nur leere Frames
        let mut sensor = ScriptedSensor::new([synthetic_face(0.3, 0.0)]).empty_when_done();
        let engine = CalibrationEngine::new(CalibrationConfig::default(), FeatureConfig::default())
            .unwrap();
        let profile = engine.run(&mut sensor, &mut Toene::default()).await;
        assert!(nah(profile.average_open_ratio, 0.3));
        assert!(nah(profile.average_closed_ratio, 0.15));
        assert_eq!(profile.yaw_baseline, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn gesichtssuche_blockiert_ohne_gesicht() {
        let mut sensor = ScriptedSensor::default();
        let engine = CalibrationEngine::new(CalibrationConfig::default(), FeatureConfig::default())
            .unwrap();
        let ergebnis = tokio::time::timeout(
            Duration::from_secs(60),
            engine.run(&mut sensor, &mut Toene::default()),
        )
        .await;
        assert!(ergebnis.is_err(), "Ohne Gesicht darf die Kalibrierung nicht enden");
        assert!(sensor.calls() >= 250);
    }

    #[tokio::test(start_paused = true)]
    async fn fortschritt_im_geschlossen_fenster_ab_haelfte() {
        let config = CalibrationConfig {
            sample_count: 2,
            ..Default::default()
        };
        let mut sensor = ScriptedSensor::new([synthetic_face(0.3, 0.0)]);
        let engine = CalibrationEngine::new(config, FeatureConfig::default()).unwrap();
        let mut rx = engine.subscribe();

        let mut toene = Toene::default();
        let lauf = engine.run(&mut sensor, &mut toene);
        tokio::pin!(lauf);
        let mut gesehen = Vec::new();
        loop {
            tokio::select! {
                _ = &mut lauf => break,
                Ok(()) = rx.changed() => gesehen.push(*rx.borrow_and_update()),
            }
        }
        assert!(gesehen
            .iter()
            .any(|p| p.phase == CalibrationPhase::EyesClosed && p.fraction >= 0.5));
        assert!(gesehen
            .iter()
            .filter(|p| p.phase == CalibrationPhase::EyesOpen)
            .all(|p| p.fraction < 0.5));
    }
}
