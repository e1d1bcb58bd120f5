//! brainswap-gaze – Blick-Erkennung
//!
//! Vom Gesichts-Keypoint zum Audio-Kommando:
//! - Merkmale: Augen-Oeffnungsverhaeltnis und Kopf-Gierwinkel
//! - Kalibrierung: persoenlicher Schwellenwert und Yaw-Nullpunkt
//! - Zustandsmaschine: OPEN/CLOSED pro Frame, erzeugt Mix-Kommandos
//! - Sensor-Schnittstelle fuer den externen Landmark-Detektor

pub mod calibration;
pub mod error;
pub mod features;
pub mod keypoints;
pub mod machine;
pub mod sensor;

// Bequeme Re-Exporte der wichtigsten Typen
pub use calibration::{
    CalibrationConfig, CalibrationCues, CalibrationEngine, CalibrationPhase, CalibrationProfile,
    CalibrationProgress,
};
pub use error::{GazeError, GazeResult};
pub use features::{eye_openness_ratio, head_yaw, raw_head_yaw, FeatureConfig};
pub use keypoints::{KeypointFrame, Point2};
pub use machine::{GazeCommand, GazeReading, GazeState, GazeStateMachine, MachineState, Tick};
pub use sensor::{FaceSensor, ScriptedSensor};
