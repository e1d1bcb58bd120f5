//! Radiale Spektrum-Anzeige
//!
//! Aus dem Byte-Spektrum des Analysers wird pro Anzeige-Tick ein
//! [`VisualFrame`] berechnet: jeder zehnte Bin wird zu einem radialen
//! Strahl, dazu ein pulsierender Innenkreis. Das eigentliche Zeichnen
//! uebernimmt ein [`VisualSink`].

use std::f32::consts::TAU;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tracing::trace;

/// Jeder n-te Bin wird gezeichnet
pub const BIN_SCHRITT: usize = 10;
/// Maximale Strahllaenge bei Vollausschlag (px)
pub const MAX_STRAHL: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Strahl {
    pub von: (f32, f32),
    pub bis: (f32, f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Puls {
    pub radius: f32,
    /// Deckkraft in [0.1, 0.2)
    pub alpha: f32,
}

/// Ein Anzeige-Frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualFrame {
    pub mitte: (f32, f32),
    pub radius: f32,
    pub strahlen: Vec<Strahl>,
    pub puls: Puls,
}

impl VisualFrame {
    /// Berechnet den Frame fuer eine Flaeche `breite` x `hoehe`
    pub fn aus_spektrum<R: Rng + ?Sized>(
        spektrum: &[u8],
        breite: f32,
        hoehe: f32,
        rng: &mut R,
    ) -> Self {
        let cx = breite / 2.0;
        let cy = hoehe / 2.0;
        let radius = cx.min(cy) * 0.4;
        let bins = spektrum.len().max(1) as f32;

        let strahlen = spektrum
            .iter()
            .enumerate()
            .step_by(BIN_SCHRITT)
            .map(|(i, &wert)| {
                let h = wert as f32 / 255.0 * MAX_STRAHL;
                let winkel = i as f32 / bins * TAU;
                let (sin, cos) = winkel.sin_cos();
                Strahl {
                    von: (cx + cos * radius, cy + sin * radius),
                    bis: (cx + cos * (radius + h), cy + sin * (radius + h)),
                }
            })
            .collect();

        Self {
            mitte: (cx, cy),
            radius,
            strahlen,
            puls: Puls {
                radius: radius * 0.9,
                alpha: 0.1 + rng.gen::<f32>() * 0.1,
            },
        }
    }
}

/// Ziel fuer Anzeige-Frames
pub trait VisualSink: Send {
    fn zeichnen(&mut self, frame: &VisualFrame);
    /// Nicht verbunden: Flaeche leeren
    fn leeren(&mut self);
}

/// Schreibt Frames ins Trace-Log
#[derive(Debug, Default)]
pub struct TraceSink;

impl VisualSink for TraceSink {
    fn zeichnen(&mut self, frame: &VisualFrame) {
        let spitze = frame
            .strahlen
            .iter()
            .map(|s| {
                let dx = s.bis.0 - s.von.0;
                let dy = s.bis.1 - s.von.1;
                (dx * dx + dy * dy).sqrt()
            })
            .fold(0.0_f32, f32::max);
        trace!(strahlen = frame.strahlen.len(), spitze, "Anzeige");
    }

    fn leeren(&mut self) {}
}

/// Sammelt Frames zur spaeteren Auswertung (`None` = geleert)
#[derive(Debug, Clone, Default)]
pub struct SammelSink {
    verlauf: Arc<Mutex<Vec<Option<VisualFrame>>>>,
}

impl SammelSink {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn verlauf(&self) -> Vec<Option<VisualFrame>> {
        self.verlauf.lock().clone()
    }

    pub fn gezeichnet(&self) -> usize {
        self.verlauf.lock().iter().filter(|f| f.is_some()).count()
    }
}

impl VisualSink for SammelSink {
    fn zeichnen(&mut self, frame: &VisualFrame) {
        self.verlauf.lock().push(Some(frame.clone()));
    }

    fn leeren(&mut self) {
        self.verlauf.lock().push(None);
    }
}
