//! Geteilter Mix-Graph
//!
//! ```text
//! voice -> muffle(LP) -+-> dry ------------+
//!                      +-> reverb -> wet --+-> master -> analyser -> out
//! scan  -> scan_gain -> scan_panner -------+
//! ```
//!
//! Muffle-Filter, Hall und Master existieren genau einmal pro Sitzung.
//! [`MixGraph::rewire`] haengt eine neue Voice-Quelle ein und baut dabei
//! die Ausgaenge von Filter und Hall neu auf: danach besteht genau eine
//! Verbindung muffle->dry, muffle->reverb und reverb->wet.

use std::sync::Arc;

use tracing::debug;

use crate::buffer::AudioBuffer;
use crate::config::MixConfig;
use crate::error::AudioResult;
use crate::toolkit::{AudioToolkit, FilterKind, NodeId, NodeSpec};

#[derive(Debug, Clone)]
pub struct MixGraph {
    pub master: NodeId,
    pub analyser: NodeId,
    pub muffle: NodeId,
    pub reverb: NodeId,
    pub dry: NodeId,
    pub wet: NodeId,
    pub scan_gain: NodeId,
    pub scan_panner: NodeId,
    voice_input: Option<NodeId>,
}

impl MixGraph {
    /// Legt alle geteilten Knoten an und verbindet die festen Strecken
    pub fn build<T: AudioToolkit + ?Sized>(
        toolkit: &mut T,
        config: &MixConfig,
        impulse: AudioBuffer,
    ) -> AudioResult<Self> {
        let master = toolkit.create(NodeSpec::Gain { gain: 1.0 })?;
        let analyser = toolkit.create(NodeSpec::Analyser {
            fft_size: config.analyser_fft_size,
        })?;
        let out = toolkit.destination();
        toolkit.connect(master, analyser)?;
        toolkit.connect(analyser, out)?;

        let muffle = toolkit.create(NodeSpec::Filter {
            kind: FilterKind::LowPass,
            frequency: config.initial_cutoff_hz,
        })?;
        let reverb = toolkit.create(NodeSpec::Convolver {
            impulse: Arc::new(impulse),
        })?;
        let dry = toolkit.create(NodeSpec::Gain {
            gain: config.dry_gain,
        })?;
        let wet = toolkit.create(NodeSpec::Gain {
            gain: config.wet_gain,
        })?;
        toolkit.connect(dry, master)?;
        toolkit.connect(wet, master)?;

        let scan_gain = toolkit.create(NodeSpec::Gain { gain: 0.0 })?;
        let scan_panner = toolkit.create(NodeSpec::StereoPanner)?;
        toolkit.connect(scan_gain, scan_panner)?;
        toolkit.connect(scan_panner, master)?;

        debug!(%master, %muffle, %reverb, "Mix-Graph aufgebaut");
        Ok(Self {
            master,
            analyser,
            muffle,
            reverb,
            dry,
            wet,
            scan_gain,
            scan_panner,
            voice_input: None,
        })
    }

    /// Haengt `source` als einzige Voice-Quelle vor den Muffle-Filter
    pub fn rewire<T: AudioToolkit + ?Sized>(
        &mut self,
        toolkit: &mut T,
        source: NodeId,
    ) -> AudioResult<()> {
        if let Some(previous) = self.voice_input.take() {
            toolkit.disconnect(previous)?;
        }
        toolkit.disconnect(self.muffle)?;
        toolkit.disconnect(self.reverb)?;

        toolkit.connect(source, self.muffle)?;
        toolkit.connect(self.muffle, self.dry)?;
        toolkit.connect(self.muffle, self.reverb)?;
        toolkit.connect(self.reverb, self.wet)?;
        self.voice_input = Some(source);
        debug!(%source, "Voice-Quelle eingehaengt");
        Ok(())
    }

    /// Vergisst die Voice-Quelle, wenn sie freigegeben wurde
    pub fn forget_source(&mut self, source: NodeId) {
        if self.voice_input == Some(source) {
            self.voice_input = None;
        }
    }

    /// Aktuell eingehaengte Voice-Quelle
    pub fn voice_input(&self) -> Option<NodeId> {
        self.voice_input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimToolkit;

    fn aufbau() -> (SimToolkit, MixGraph) {
        let mut tk = SimToolkit::new(8_000);
        let impulse = AudioBuffer::new(8_000, vec![vec![0.0; 8]; 2]).unwrap();
        let g = MixGraph::build(&mut tk, &MixConfig::default(), impulse).unwrap();
        (tk, g)
    }

    #[test]
    fn feste_strecken() {
        let (tk, g) = aufbau();
        assert_eq!(tk.connection_count(g.master, g.analyser), 1);
        assert_eq!(tk.connection_count(g.analyser, tk.destination()), 1);
        assert_eq!(tk.connection_count(g.dry, g.master), 1);
        assert_eq!(tk.connection_count(g.wet, g.master), 1);
        assert_eq!(tk.connection_count(g.scan_panner, g.master), 1);
        // Filter noch ohne Ausgang
        assert!(tk.outputs(g.muffle).is_empty());
    }

    #[test]
    fn rewire_mehrfach_genau_eine_verbindung() {
        let (mut tk, mut g) = aufbau();
        for _ in 0..5 {
            let src = tk.create(NodeSpec::Oscillator { frequency: 440.0 }).unwrap();
            g.rewire(&mut tk, src).unwrap();
            assert_eq!(tk.connection_count(src, g.muffle), 1);
            assert_eq!(tk.connection_count(g.muffle, g.dry), 1);
            assert_eq!(tk.connection_count(g.muffle, g.reverb), 1);
            assert_eq!(tk.connection_count(g.reverb, g.wet), 1);
            assert_eq!(tk.outputs(g.muffle).len(), 2);
            assert_eq!(tk.inputs(g.muffle), vec![src]);
            assert_eq!(g.voice_input(), Some(src));
        }
    }
}
