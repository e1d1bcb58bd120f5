//! brainswap-audio – Audio-Mix fuer das Blick-Erlebnis
//!
//! Orchestriert die Knoten eines Plattform-Audio-Toolkits:
//! - Muffle-Filter (Tiefpass) mit Zeitkonstanten-Rampen
//! - Dry/Wet-Hall-Send auf den Master-Bus, Analyser-Abgriff
//! - Voice-Wiedergabe als Singleton mit Rausch-Ersatz
//! - Scan-Cue (Rate/Pan), Abschluss-Snap, Kalibrierungs-Piepton
//! - Zweistufiger Stop (Ausblenden, harter Stop)
//!
//! [`SimToolkit`] fuehrt den Graphen ohne Ausgabegeraet aus.

pub mod buffer;
pub mod config;
pub mod error;
pub mod graph;
pub mod mixer;
pub mod ramp;
pub mod sim;
pub mod toolkit;

// Bequeme Re-Exporte der wichtigsten Typen
pub use buffer::{decode_wav, fallback_noise, reverb_impulse, snap_burst, AudioBuffer};
pub use config::MixConfig;
pub use error::{AudioError, AudioResult};
pub use graph::MixGraph;
pub use mixer::{MixController, MixEvent, MixStats};
pub use ramp::ParamTimeline;
pub use sim::SimToolkit;
pub use toolkit::{AudioToolkit, FilterKind, NodeId, NodeSpec, Param};
