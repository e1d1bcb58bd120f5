//! Fehlertypen fuer Brainswap
//!
//! Zentraler Fehler-Enum fuer alle Crates der Sitzung.
//! Untermodule definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Brainswap
pub type Result<T> = std::result::Result<T, BrainswapError>;

/// Alle moeglichen Fehler im Brainswap-System
#[derive(Debug, Error)]
pub enum BrainswapError {
    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Sensor ---
    #[error("Sensorfehler: {0}")]
    Sensor(String),

    // --- Playlist & Abruf ---
    #[error("Playlist-Fehler: {0}")]
    Playlist(String),

    #[error("Audio-Abruf fehlgeschlagen ({id}): {grund}")]
    Abruf { id: String, grund: String },

    // --- Audio ---
    #[error("Audiofehler: {0}")]
    Audio(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl BrainswapError {
    /// Gibt true zurueck wenn der Fehler lokal durch einen Ersatz
    /// (leerer Frame, synthetischer Puffer) aufgefangen werden kann
    pub fn ist_ersetzbar(&self) -> bool {
        matches!(
            self,
            Self::Sensor(_) | Self::Abruf { .. } | Self::Playlist(_) | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = BrainswapError::Abruf {
            id: "abc".into(),
            grund: "404".into(),
        };
        assert_eq!(e.to_string(), "Audio-Abruf fehlgeschlagen (abc): 404");
    }

    #[test]
    fn ersetzbar_erkennung() {
        assert!(BrainswapError::Sensor("glitch".into()).ist_ersetzbar());
        assert!(!BrainswapError::Konfiguration("kaputt".into()).ist_ersetzbar());
        assert!(!BrainswapError::Audio("x".into()).ist_ersetzbar());
    }
}
