//! Gemeinsame Identifikationstypen fuer Brainswap
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Sitzungs- und Audio-Kennungen zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Sitzungs-ID (eine Kalibrierung + ein Erlebnis)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Opake Audio-Kennung, wie sie der Playlist-Kollaborateur vergibt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioId(pub String);

impl AudioId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AudioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "audio:{}", self.0)
    }
}

/// Referenz auf einen Audio-Clip: Kennung plus Abruf-Locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRef {
    /// Opake Kennung
    pub id: AudioId,
    /// Anzeigename (nur fuer Logs)
    pub name: String,
    /// Ort, von dem die Bytes geholt werden (Pfad oder URL, playlist-spezifisch)
    pub locator: String,
}

impl AudioRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: AudioId::new(id),
            name: name.into(),
            locator: locator.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_eindeutig() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b, "Zwei neue SessionIds muessen verschieden sein");
    }

    #[test]
    fn session_id_display() {
        let id = SessionId(Uuid::nil());
        assert!(id.to_string().starts_with("session:"));
    }

    #[test]
    fn audio_id_ist_transparent_serialisiert() {
        let id = AudioId::new("xyz");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"xyz\"");
        assert_eq!(id.to_string(), "audio:xyz");
    }
}
