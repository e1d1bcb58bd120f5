//! Sitzungs-Ereignisse fuer externe Beobachter (UI)
//!
//! Der Session-Controller veroeffentlicht diese Ereignisse ueber einen
//! tokio broadcast-Kanal. Bildschirm und Navigation liegen ausserhalb
//! des Kerns und abonnieren nur.

use crate::types::{AudioId, SessionId};
use serde::{Deserialize, Serialize};

/// Alle Ereignisse die waehrend einer Sitzung entstehen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Kalibrierung abgeschlossen
    Kalibriert {
        session_id: SessionId,
        threshold: f32,
        yaw_baseline: f32,
    },
    /// Erlebnis gestartet
    ErlebnisGestartet {
        session_id: SessionId,
        target_rotation: f32,
    },
    /// Blickzustand hat gewechselt (true = Augen zu / verbunden)
    BlickGewechselt { verbunden: bool },
    /// Voice-Wiedergabe gestartet (None = Rausch-Ersatz)
    StimmeGestartet { audio_id: Option<AudioId> },
    /// Clip zu Ende gespielt
    ClipBeendet { audio_id: Option<AudioId> },
    /// Naechster Clip ausgewaehlt
    NaechsterClip { audio_id: AudioId },
    /// Sitzung beendet
    Gestoppt { session_id: SessionId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ist_serde_kompatibel() {
        let event = SessionEvent::Kalibriert {
            session_id: SessionId::new(),
            threshold: 0.21,
            yaw_baseline: -0.1,
        };
        let json = serde_json::to_string(&event).unwrap();
        let zurueck: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, event);
    }
}
