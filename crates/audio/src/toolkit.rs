//! Schnittstelle zum Audio-Toolkit der Plattform
//!
//! Das Toolkit stellt primitive Knoten bereit (Gain, Biquad-Filter,
//! Faltung, Stereo-Panner, Analyser, Oszillator, Puffer-Quelle), verbindet
//! sie und plant Parameter-Rampen. Der Mix-Controller orchestriert nur,
//! DSP-Kernel liegen im Toolkit.

use std::fmt;
use std::sync::Arc;

use crate::buffer::AudioBuffer;
use crate::error::AudioResult;

/// Handle auf einen Toolkit-Knoten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    HighPass,
}

/// Automatisierbare Parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Gain,
    Frequency,
    Pan,
    PlaybackRate,
}

/// Bauplan eines Knotens
#[derive(Debug, Clone)]
pub enum NodeSpec {
    Gain {
        gain: f32,
    },
    Filter {
        kind: FilterKind,
        frequency: f32,
    },
    Convolver {
        impulse: Arc<AudioBuffer>,
    },
    StereoPanner,
    Analyser {
        fft_size: usize,
    },
    Oscillator {
        frequency: f32,
    },
    BufferSource {
        buffer: Arc<AudioBuffer>,
        looping: bool,
    },
}

impl NodeSpec {
    pub fn is_source(&self) -> bool {
        matches!(self, NodeSpec::Oscillator { .. } | NodeSpec::BufferSource { .. })
    }

    /// Parameter die dieser Knotentyp automatisieren kann
    pub fn supports(&self, param: Param) -> bool {
        matches!(
            (self, param),
            (NodeSpec::Gain { .. }, Param::Gain)
                | (NodeSpec::Filter { .. }, Param::Frequency)
                | (NodeSpec::StereoPanner, Param::Pan)
                | (NodeSpec::Oscillator { .. }, Param::Frequency)
                | (NodeSpec::BufferSource { .. }, Param::PlaybackRate)
        )
    }
}

/// Audio-Toolkit der Plattform
///
/// Zeiten sind Sekunden auf der Toolkit-Uhr ([`AudioToolkit::current_time`]).
/// Jede gestartete Quelle wird genau einmal ueber
/// [`AudioToolkit::drain_ended`] als beendet gemeldet.
pub trait AudioToolkit: Send {
    fn sample_rate(&self) -> u32;

    fn current_time(&self) -> f64;

    /// Ausgang des Toolkits (Lautsprecher)
    fn destination(&self) -> NodeId;

    fn create(&mut self, spec: NodeSpec) -> AudioResult<NodeId>;

    fn connect(&mut self, from: NodeId, to: NodeId) -> AudioResult<()>;

    /// Trennt alle ausgehenden Verbindungen des Knotens
    fn disconnect(&mut self, node: NodeId) -> AudioResult<()>;

    /// Gibt einen Knoten frei. Die Id ist danach ungueltig.
    fn release(&mut self, node: NodeId) -> AudioResult<()>;

    /// Setzt den Parameter sofort (zum aktuellen Zeitpunkt)
    fn set_value(&mut self, node: NodeId, param: Param, value: f32) -> AudioResult<()>;

    /// Exponentielle Annaeherung an `target` ab `start` mit Zeitkonstante
    fn set_target_at_time(
        &mut self,
        node: NodeId,
        param: Param,
        target: f32,
        start: f64,
        time_constant: f64,
    ) -> AudioResult<()>;

    /// Geometrische Rampe vom aktuellen Wert bis `value` bei `end_time`
    fn exponential_ramp_to(
        &mut self,
        node: NodeId,
        param: Param,
        value: f32,
        end_time: f64,
    ) -> AudioResult<()>;

    /// Aktueller Wert eines Parameters
    fn param_value(&self, node: NodeId, param: Param) -> AudioResult<f32>;

    fn start(&mut self, source: NodeId, when: f64) -> AudioResult<()>;

    fn stop(&mut self, source: NodeId, when: f64) -> AudioResult<()>;

    fn decode(&mut self, bytes: &[u8]) -> AudioResult<AudioBuffer>;

    /// Seit dem letzten Aufruf beendete Quellen
    fn drain_ended(&mut self) -> Vec<NodeId>;

    /// Byte-Spektrum des Analysers (`fft_size / 2` Bins, 0..=255)
    fn frequency_data(&self, analyser: NodeId) -> AudioResult<Vec<u8>>;
}
