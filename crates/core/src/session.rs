//! Sitzungszustand
//!
//! Expliziter Kontext der vom Session-Controller gehalten und per Referenz
//! an die Gaze-Zustandsmaschine gereicht wird.

use serde::{Deserialize, Serialize};

use crate::types::{AudioRef, SessionId};

/// Betriebsmodus der Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionMode {
    #[default]
    Idle,
    Calibrating,
    Experiencing,
}

/// Veraenderlicher Zustand einer laufenden Sitzung
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: SessionId,
    pub mode: SessionMode,
    /// Aktuell ausgewaehlter Clip (None = kein Clip, Rausch-Ersatz)
    pub current_audio: Option<AudioRef>,
    /// Zielrotation in Radiant, einmal pro Erlebnis gezogen
    pub target_rotation: f32,
    /// Spiegelt `GazeState == Closed`
    pub is_connected: bool,
    /// Gesetzt sobald ein Clip zu Ende gespielt hat, geloescht beim naechsten OPEN-Frame
    pub awaiting_next_audio: bool,
    /// Letzte kalibrierte Kopfrotation (nur Anzeige)
    pub head_rotation: f32,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            mode: SessionMode::Idle,
            current_audio: None,
            target_rotation: 0.0,
            is_connected: false,
            awaiting_next_audio: false,
            head_rotation: 0.0,
        }
    }

    /// Wechselt in den Erlebnis-Modus und setzt die Pro-Erlebnis-Felder zurueck
    pub fn begin_experience(&mut self, target_rotation: f32) {
        self.mode = SessionMode::Experiencing;
        self.is_connected = false;
        self.awaiting_next_audio = false;
        self.target_rotation = target_rotation;
        self.head_rotation = 0.0;
    }

    pub fn is_experiencing(&self) -> bool {
        self.mode == SessionMode::Experiencing
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
