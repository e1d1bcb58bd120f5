//! Sensor-Schnittstelle zum Landmark-Detektor
//!
//! Der Detektor selbst ist extern. Er liefert pro Aufruf entweder einen
//! leeren Frame oder die Keypoints genau eines Gesichts. Fehler werden
//! im Sensor geschluckt und als leerer Frame gemeldet.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::keypoints::KeypointFrame;

/// Quelle fuer Keypoint-Frames
#[async_trait]
pub trait FaceSensor: Send {
    /// Fuehrt eine Erkennung aus. Darf laenger als einen Anzeige-Tick dauern.
    async fn detect(&mut self) -> KeypointFrame;
}

/// Sensor mit vorgegebener Frame-Folge
///
/// Ist die Folge erschoepft, wird der letzte Frame wiederholt
/// (oder ein leerer Frame geliefert, siehe [`ScriptedSensor::empty_when_done`]).
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    frames: VecDeque<KeypointFrame>,
    last: Option<KeypointFrame>,
    repeat_last: bool,
    calls: usize,
}

impl ScriptedSensor {
    pub fn new(frames: impl IntoIterator<Item = KeypointFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            last: None,
            repeat_last: true,
            calls: 0,
        }
    }

    /// Nach Ende der Folge nur noch leere Frames liefern
    pub fn empty_when_done(mut self) -> Self {
        self.repeat_last = false;
        self
    }

    /// Haengt weitere Frames an
    pub fn push(&mut self, frame: KeypointFrame) {
        self.frames.push_back(frame);
    }

    /// Anzahl bisheriger `detect`-Aufrufe
    pub fn calls(&self) -> usize {
        self.calls
    }
}

#[async_trait]
impl FaceSensor for ScriptedSensor {
    async fn detect(&mut self) -> KeypointFrame {
        self.calls += 1;
        match self.frames.pop_front() {
            Some(frame) => {
                self.last = Some(frame.clone());
                frame
            }
            None if self.repeat_last => self.last.clone().unwrap_or_default(),
            None => KeypointFrame::empty(),
        }
    }
}
