//! Konfiguration des Audio-Mix

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, AudioResult};

/// Parameter des Mix-Graphen und der Cues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Cutoff des Muffle-Filters im dumpfen Zustand (Hz)
    pub muffled_cutoff_hz: f32,
    /// Cutoff im klaren Zustand (Hz)
    pub clear_cutoff_hz: f32,
    /// Cutoff beim Aufbau des Graphen (Hz)
    pub initial_cutoff_hz: f32,
    /// Zeitkonstante der Muffle-Rampe (s)
    pub muffle_time_constant: f64,
    pub dry_gain: f32,
    pub wet_gain: f32,
    /// Laenge der synthetischen Hall-Impulsantwort (s)
    pub reverb_seconds: f32,
    pub analyser_fft_size: usize,
    pub scan_rate_base: f32,
    pub scan_rate_max: f32,
    pub scan_gain: f32,
    /// Zeitkonstante fuer Scan-Gain, -Rate und -Pan beim Nachfuehren (s)
    pub scan_attack: f64,
    /// Zeitkonstante beim Ausblenden des Scan-Cues (s)
    pub scan_release: f64,
    /// Verzoegerung bis zum Stop der Scan-Quelle (s)
    pub scan_stop_grace: f64,
    /// Zeitkonstante beim Ausblenden des Master-Busses (s)
    pub stop_fade_time_constant: f64,
    /// Wartezeit zwischen Ausblenden und hartem Stop (ms)
    pub stop_grace_ms: u64,
    pub snap_highpass_hz: f32,
    /// Dauer des Kalibrierungs-Pieptons (s)
    pub beep_seconds: f64,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            muffled_cutoff_hz: 300.0,
            clear_cutoff_hz: 20_000.0,
            initial_cutoff_hz: 400.0,
            muffle_time_constant: 0.3,
            dry_gain: 0.8,
            wet_gain: 0.4,
            reverb_seconds: 3.0,
            analyser_fft_size: 256,
            scan_rate_base: 0.8,
            scan_rate_max: 1.5,
            scan_gain: 0.4,
            scan_attack: 0.1,
            scan_release: 0.2,
            scan_stop_grace: 0.3,
            stop_fade_time_constant: 0.1,
            stop_grace_ms: 300,
            snap_highpass_hz: 1_000.0,
            beep_seconds: 0.1,
        }
    }
}

impl MixConfig {
    pub fn validate(&self) -> AudioResult<()> {
        if self.muffled_cutoff_hz <= 0.0 || self.muffled_cutoff_hz >= self.clear_cutoff_hz {
            return Err(AudioError::Konfiguration(format!(
                "Cutoffs ungueltig: dumpf {} Hz, klar {} Hz",
                self.muffled_cutoff_hz, self.clear_cutoff_hz
            )));
        }
        if !self.analyser_fft_size.is_power_of_two() || self.analyser_fft_size < 32 {
            return Err(AudioError::Konfiguration(format!(
                "FFT-Groesse {} ist keine Zweierpotenz >= 32",
                self.analyser_fft_size
            )));
        }
        if self.dry_gain < 0.0 || self.wet_gain < 0.0 || self.scan_gain < 0.0 {
            return Err(AudioError::Konfiguration("Negative Verstaerkung".into()));
        }
        if self.scan_rate_base <= 0.0 || self.scan_rate_max < self.scan_rate_base {
            return Err(AudioError::Konfiguration(
                "Scan-Rate: Basis muss > 0 und <= Maximum sein".into(),
            ));
        }
        if self.reverb_seconds <= 0.0 {
            return Err(AudioError::Konfiguration("Hall-Laenge muss > 0 sein".into()));
        }
        Ok(())
    }
}
