//! Headless Audio-Toolkit
//!
//! Fuehrt den Knotengraphen ohne Ausgabegeraet: Verbindungen werden
//! gezaehlt, Parameter-Automation exakt ausgewertet, Quellen enden nach
//! Pufferlaenge oder Stop-Zeitpunkt. Der Analyser liefert ein echtes
//! Spektrum der Quellen, die ihn erreichen.
//!
//! Die Uhr ist entweder manuell ([`SimToolkit::advance`]) oder folgt der
//! tokio-Zeit (mit pausierter Test-Zeit deterministisch).

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use tokio::time::Instant;
use tracing::trace;

use crate::buffer::{decode_wav, AudioBuffer};
use crate::error::{AudioError, AudioResult};
use crate::ramp::ParamTimeline;
use crate::toolkit::{AudioToolkit, NodeId, NodeSpec, Param};

/// Analyser-Skala wie im Browser: -100 dB -> 0, -30 dB -> 255
const MIN_DB: f64 = -100.0;
const MAX_DB: f64 = -30.0;

#[derive(Debug, Clone, Copy)]
enum SimClock {
    Manual(f64),
    Realtime(Instant),
}

#[derive(Debug, Clone, Copy, Default)]
struct Playback {
    start: Option<f64>,
    stop: Option<f64>,
    ended: bool,
}

#[derive(Debug, Clone)]
struct SimNode {
    spec: NodeSpec,
    params: HashMap<Param, ParamTimeline>,
    outputs: Vec<NodeId>,
    playback: Playback,
}

/// Toolkit ohne Ausgabegeraet
pub struct SimToolkit {
    sample_rate: u32,
    clock: SimClock,
    next_id: u64,
    destination: NodeId,
    nodes: BTreeMap<NodeId, SimNode>,
    /// FFT-Plaene je Analyser-Groesse
    ffts: HashMap<usize, Arc<dyn Fft<f64>>>,
}

impl SimToolkit {
    /// Toolkit mit manueller Uhr bei 0.0
    pub fn new(sample_rate: u32) -> Self {
        Self::with_clock(sample_rate, SimClock::Manual(0.0))
    }

    /// Toolkit dessen Uhr der tokio-Zeit folgt
    pub fn realtime(sample_rate: u32) -> Self {
        Self::with_clock(sample_rate, SimClock::Realtime(Instant::now()))
    }

    fn with_clock(sample_rate: u32, clock: SimClock) -> Self {
        let destination = NodeId(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(destination, SimNode::new(NodeSpec::Gain { gain: 1.0 }));
        Self {
            sample_rate,
            clock,
            next_id: 1,
            destination,
            nodes,
            ffts: HashMap::new(),
        }
    }

    /// Stellt die manuelle Uhr vor. Bei tokio-Uhr ohne Wirkung.
    pub fn advance(&mut self, seconds: f64) {
        if let SimClock::Manual(t) = &mut self.clock {
            *t += seconds;
        }
    }

    /// Anzahl aktiver Verbindungen `from -> to`
    pub fn connection_count(&self, from: NodeId, to: NodeId) -> usize {
        self.nodes
            .get(&from)
            .map(|n| n.outputs.iter().filter(|o| **o == to).count())
            .unwrap_or(0)
    }

    pub fn outputs(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|n| n.outputs.clone())
            .unwrap_or_default()
    }

    /// Alle Knoten mit Verbindung zu `node`
    pub fn inputs(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.outputs.contains(&node))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn spec(&self, node: NodeId) -> Option<&NodeSpec> {
        self.nodes.get(&node).map(|n| &n.spec)
    }

    /// Quelle ist gestartet und noch nicht beendet
    pub fn is_playing(&self, node: NodeId) -> bool {
        let now = self.current_time();
        self.nodes
            .get(&node)
            .map(|n| n.is_playing(now))
            .unwrap_or(false)
    }

    /// Geplanter Stop-Zeitpunkt einer Quelle
    pub fn stop_time(&self, node: NodeId) -> Option<f64> {
        self.nodes.get(&node).and_then(|n| n.playback.stop)
    }

    /// Alle Quellen die gerade spielen
    pub fn playing_sources(&self) -> Vec<NodeId> {
        let now = self.current_time();
        self.nodes
            .iter()
            .filter(|(_, n)| n.is_playing(now))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: NodeId) -> AudioResult<&SimNode> {
        self.nodes.get(&id).ok_or(AudioError::KnotenUnbekannt(id))
    }

    fn node_mut(&mut self, id: NodeId) -> AudioResult<&mut SimNode> {
        self.nodes.get_mut(&id).ok_or(AudioError::KnotenUnbekannt(id))
    }

    fn timeline_mut(&mut self, id: NodeId, param: Param) -> AudioResult<&mut ParamTimeline> {
        let node = self.node_mut(id)?;
        node.params
            .get_mut(&param)
            .ok_or(AudioError::ParameterNichtUnterstuetzt { node: id, param })
    }

    /// Erreicht `from` den Knoten `to` ueber aktive Verbindungen?
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(id) = queue.pop_front() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(n) = self.nodes.get(&id) {
                queue.extend(n.outputs.iter().copied());
            }
        }
        false
    }

    /// Summensignal der Quellen am Zeitpunkt `t`
    fn source_sample(&self, node: &SimNode, t: f64) -> f64 {
        let Some(start) = node.playback.start else {
            return 0.0;
        };
        let elapsed = t - start;
        if elapsed < 0.0 {
            return 0.0;
        }
        match &node.spec {
            NodeSpec::Oscillator { .. } => {
                let f = node.value(Param::Frequency, t) as f64;
                (2.0 * PI * f * elapsed).sin()
            }
            NodeSpec::BufferSource { buffer, looping } => {
                let rate = node.value(Param::PlaybackRate, t).max(0.0) as f64;
                let mut pos = (elapsed * rate * buffer.sample_rate() as f64) as usize;
                if *looping && !buffer.is_empty() {
                    pos %= buffer.len();
                }
                buffer
                    .channel(0)
                    .and_then(|c| c.get(pos))
                    .copied()
                    .unwrap_or(0.0) as f64
            }
            _ => 0.0,
        }
    }
}

impl SimNode {
    fn new(spec: NodeSpec) -> Self {
        let mut params = HashMap::new();
        match &spec {
            NodeSpec::Gain { gain } => {
                params.insert(Param::Gain, ParamTimeline::new(*gain));
            }
            NodeSpec::Filter { frequency, .. } | NodeSpec::Oscillator { frequency } => {
                params.insert(Param::Frequency, ParamTimeline::new(*frequency));
            }
            NodeSpec::StereoPanner => {
                params.insert(Param::Pan, ParamTimeline::new(0.0));
            }
            NodeSpec::BufferSource { .. } => {
                params.insert(Param::PlaybackRate, ParamTimeline::new(1.0));
            }
            NodeSpec::Convolver { .. } | NodeSpec::Analyser { .. } => {}
        }
        Self {
            spec,
            params,
            outputs: Vec::new(),
            playback: Playback::default(),
        }
    }

    fn value(&self, param: Param, t: f64) -> f32 {
        self.params
            .get(&param)
            .map(|p| p.value_at(t))
            .unwrap_or(0.0)
    }

    /// Ende der Wiedergabe, None solange offen
    fn end_time(&self) -> Option<f64> {
        let start = self.playback.start?;
        let natural = match &self.spec {
            NodeSpec::BufferSource {
                buffer,
                looping: false,
            } => {
                let rate = self.value(Param::PlaybackRate, start).max(f32::EPSILON) as f64;
                Some(start + buffer.duration_secs() / rate)
            }
            _ => None,
        };
        let stop = self.playback.stop.map(|s| s.max(start));
        match (natural, stop) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn is_playing(&self, now: f64) -> bool {
        match self.playback.start {
            Some(start) if start <= now && !self.playback.ended => {
                self.end_time().map(|end| now < end).unwrap_or(true)
            }
            _ => false,
        }
    }
}

impl AudioToolkit for SimToolkit {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        match self.clock {
            SimClock::Manual(t) => t,
            SimClock::Realtime(origin) => origin.elapsed().as_secs_f64(),
        }
    }

    fn destination(&self) -> NodeId {
        self.destination
    }

    fn create(&mut self, spec: NodeSpec) -> AudioResult<NodeId> {
        if let &NodeSpec::Analyser { fft_size } = &spec {
            if !fft_size.is_power_of_two() || fft_size < 32 {
                return Err(AudioError::Konfiguration(format!(
                    "FFT-Groesse {fft_size} ungueltig"
                )));
            }
            self.ffts
                .entry(fft_size)
                .or_insert_with(|| FftPlanner::new().plan_fft_forward(fft_size));
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, SimNode::new(spec));
        Ok(id)
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> AudioResult<()> {
        self.node(to)?;
        self.node_mut(from)?.outputs.push(to);
        trace!(%from, %to, "verbunden");
        Ok(())
    }

    fn disconnect(&mut self, node: NodeId) -> AudioResult<()> {
        self.node_mut(node)?.outputs.clear();
        Ok(())
    }

    fn release(&mut self, node: NodeId) -> AudioResult<()> {
        if node == self.destination {
            return Err(AudioError::Konfiguration(
                "Ausgang kann nicht freigegeben werden".into(),
            ));
        }
        self.nodes
            .remove(&node)
            .ok_or(AudioError::KnotenUnbekannt(node))?;
        for n in self.nodes.values_mut() {
            n.outputs.retain(|o| *o != node);
        }
        trace!(%node, "freigegeben");
        Ok(())
    }

    fn set_value(&mut self, node: NodeId, param: Param, value: f32) -> AudioResult<()> {
        let now = self.current_time();
        self.timeline_mut(node, param)?.set_value_at(value, now);
        Ok(())
    }

    fn set_target_at_time(
        &mut self,
        node: NodeId,
        param: Param,
        target: f32,
        start: f64,
        time_constant: f64,
    ) -> AudioResult<()> {
        self.timeline_mut(node, param)?
            .set_target_at(target, start, time_constant);
        Ok(())
    }

    fn exponential_ramp_to(
        &mut self,
        node: NodeId,
        param: Param,
        value: f32,
        end_time: f64,
    ) -> AudioResult<()> {
        let now = self.current_time();
        self.timeline_mut(node, param)?
            .exponential_ramp_to(value, now, end_time);
        Ok(())
    }

    fn param_value(&self, node: NodeId, param: Param) -> AudioResult<f32> {
        let now = self.current_time();
        self.node(node)?
            .params
            .get(&param)
            .map(|p| p.value_at(now))
            .ok_or(AudioError::ParameterNichtUnterstuetzt { node, param })
    }

    fn start(&mut self, source: NodeId, when: f64) -> AudioResult<()> {
        let node = self.node_mut(source)?;
        if !node.spec.is_source() {
            return Err(AudioError::KeineQuelle(source));
        }
        if node.playback.start.is_some() {
            return Err(AudioError::Konfiguration(format!(
                "Quelle {source} bereits gestartet"
            )));
        }
        node.playback.start = Some(when);
        Ok(())
    }

    fn stop(&mut self, source: NodeId, when: f64) -> AudioResult<()> {
        let node = self.node_mut(source)?;
        if !node.spec.is_source() {
            return Err(AudioError::KeineQuelle(source));
        }
        node.playback.stop = Some(match node.playback.stop {
            Some(existing) => existing.min(when),
            None => when,
        });
        Ok(())
    }

    fn decode(&mut self, bytes: &[u8]) -> AudioResult<AudioBuffer> {
        decode_wav(bytes)
    }

    fn drain_ended(&mut self) -> Vec<NodeId> {
        let now = self.current_time();
        let mut ended = Vec::new();
        for (id, node) in self.nodes.iter_mut() {
            if node.playback.ended || !node.spec.is_source() {
                continue;
            }
            if node.end_time().is_some_and(|end| end <= now) {
                node.playback.ended = true;
                node.outputs.clear();
                ended.push(*id);
            }
        }
        ended
    }

    fn frequency_data(&self, analyser: NodeId) -> AudioResult<Vec<u8>> {
        let &NodeSpec::Analyser { fft_size } = &self.node(analyser)?.spec else {
            return Err(AudioError::Konfiguration(format!(
                "{analyser} ist kein Analyser"
            )));
        };
        let bins = fft_size / 2;
        let now = self.current_time();

        let sources: Vec<&SimNode> = self
            .nodes
            .iter()
            .filter(|(id, n)| n.is_playing(now) && self.reaches(**id, analyser))
            .map(|(_, n)| n)
            .collect();
        if sources.is_empty() {
            return Ok(vec![0; bins]);
        }

        let fft = self
            .ffts
            .get(&fft_size)
            .ok_or_else(|| AudioError::Konfiguration(format!("Kein FFT-Plan fuer {fft_size}")))?;

        let sr = self.sample_rate as f64;
        let mut buffer: Vec<Complex64> = (0..fft_size)
            .map(|n| {
                let t = now - (fft_size - n) as f64 / sr;
                let x: f64 = sources.iter().map(|s| self.source_sample(s, t)).sum();
                // Blackman-Fenster
                let a = 2.0 * PI * n as f64 / fft_size as f64;
                Complex64::new(x * (0.42 - 0.5 * a.cos() + 0.08 * (2.0 * a).cos()), 0.0)
            })
            .collect();
        fft.process(&mut buffer);

        let spectrum = buffer[..bins]
            .iter()
            .map(|c| {
                let mag = c.norm() / fft_size as f64;
                if mag <= 0.0 {
                    return 0;
                }
                let db = 20.0 * mag.log10();
                (((db - MIN_DB) / (MAX_DB - MIN_DB)) * 255.0).clamp(0.0, 255.0) as u8
            })
            .collect();
        Ok(spectrum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puffer(sekunden: f64) -> Arc<AudioBuffer> {
        let len = (1_000.0 * sekunden) as usize;
        Arc::new(AudioBuffer::mono(1_000, vec![0.5; len]).unwrap())
    }

    #[test]
    fn verbindungen_zaehlen_und_trennen() {
        let mut tk = SimToolkit::new(48_000);
        let a = tk.create(NodeSpec::Gain { gain: 1.0 }).unwrap();
        let b = tk.create(NodeSpec::Gain { gain: 1.0 }).unwrap();
        tk.connect(a, b).unwrap();
        tk.connect(a, b).unwrap();
        assert_eq!(tk.connection_count(a, b), 2);
        assert_eq!(tk.inputs(b), vec![a]);
        tk.disconnect(a).unwrap();
        assert_eq!(tk.connection_count(a, b), 0);
    }

    #[test]
    fn unbekannter_knoten_und_parameter() {
        let mut tk = SimToolkit::new(48_000);
        assert!(matches!(
            tk.connect(NodeId(99), tk.destination()),
            Err(AudioError::KnotenUnbekannt(NodeId(99)))
        ));
        let g = tk.create(NodeSpec::Gain { gain: 1.0 }).unwrap();
        assert!(matches!(
            tk.set_value(g, Param::Pan, 0.5),
            Err(AudioError::ParameterNichtUnterstuetzt { .. })
        ));
        assert!(matches!(tk.start(g, 0.0), Err(AudioError::KeineQuelle(_))));
    }

    #[test]
    fn quelle_endet_genau_einmal() {
        let mut tk = SimToolkit::new(48_000);
        let src = tk
            .create(NodeSpec::BufferSource {
                buffer: puffer(1.0),
                looping: false,
            })
            .unwrap();
        tk.connect(src, tk.destination()).unwrap();
        tk.start(src, 0.0).unwrap();
        assert!(tk.is_playing(src));

        tk.advance(0.5);
        assert!(tk.drain_ended().is_empty());
        tk.advance(0.5);
        assert_eq!(tk.drain_ended(), vec![src]);
        assert!(tk.drain_ended().is_empty());
        assert!(!tk.is_playing(src));
        assert!(tk.outputs(src).is_empty());
    }

    #[test]
    fn schleife_endet_erst_mit_stop() {
        let mut tk = SimToolkit::new(48_000);
        let src = tk
            .create(NodeSpec::BufferSource {
                buffer: puffer(0.1),
                looping: true,
            })
            .unwrap();
        tk.start(src, 0.0).unwrap();
        tk.advance(5.0);
        assert!(tk.drain_ended().is_empty());
        tk.stop(src, 5.3).unwrap();
        tk.advance(0.2);
        assert!(tk.is_playing(src));
        tk.advance(0.1);
        assert_eq!(tk.drain_ended(), vec![src]);
    }

    #[test]
    fn doppelter_start_abgelehnt() {
        let mut tk = SimToolkit::new(48_000);
        let osc = tk.create(NodeSpec::Oscillator { frequency: 600.0 }).unwrap();
        tk.start(osc, 0.0).unwrap();
        assert!(tk.start(osc, 0.1).is_err());
    }

    #[test]
    fn analyser_still_ohne_quelle() {
        let mut tk = SimToolkit::new(8_000);
        let an = tk.create(NodeSpec::Analyser { fft_size: 256 }).unwrap();
        let data = tk.frequency_data(an).unwrap();
        assert_eq!(data.len(), 128);
        assert!(data.iter().all(|b| *b == 0));
    }

    #[test]
    fn analyser_zeigt_sinus_im_richtigen_bin() {
        let mut tk = SimToolkit::new(8_000);
        let an = tk.create(NodeSpec::Analyser { fft_size: 256 }).unwrap();
        // Bin-Breite 8000/256 = 31.25 Hz -> 1000 Hz in Bin 32
        let osc = tk.create(NodeSpec::Oscillator { frequency: 1_000.0 }).unwrap();
        tk.connect(osc, an).unwrap();
        tk.start(osc, 0.0).unwrap();
        tk.advance(1.0);
        let data = tk.frequency_data(an).unwrap();
        assert_eq!(data[32], 255);
        assert!(data[5] < 50);
        assert!(data[100] < 50);
    }

    #[test]
    fn analyser_kleinere_fft() {
        let mut tk = SimToolkit::new(8_000);
        let gross = tk.create(NodeSpec::Analyser { fft_size: 256 }).unwrap();
        let klein = tk.create(NodeSpec::Analyser { fft_size: 64 }).unwrap();
        // Bin-Breite 125 Hz -> 1000 Hz in Bin 8
        let osc = tk.create(NodeSpec::Oscillator { frequency: 1_000.0 }).unwrap();
        tk.connect(osc, gross).unwrap();
        tk.connect(osc, klein).unwrap();
        tk.start(osc, 0.0).unwrap();
        tk.advance(1.0);
        let data = tk.frequency_data(klein).unwrap();
        assert_eq!(data.len(), 32);
        assert_eq!(data[8], 255);
        assert!(data[1] < 50);
        assert!(data[20] < 50);
        assert_eq!(tk.frequency_data(gross).unwrap().len(), 128);
    }

    #[test]
    fn freigabe_entfernt_knoten_und_verbindungen() {
        let mut tk = SimToolkit::new(8_000);
        let osc = tk.create(NodeSpec::Oscillator { frequency: 600.0 }).unwrap();
        let gain = tk.create(NodeSpec::Gain { gain: 1.0 }).unwrap();
        tk.connect(osc, gain).unwrap();
        tk.connect(gain, tk.destination()).unwrap();
        let vorher = tk.node_count();

        tk.release(gain).unwrap();
        assert_eq!(tk.node_count(), vorher - 1);
        assert!(tk.outputs(osc).is_empty());
        assert!(matches!(
            tk.set_value(gain, Param::Gain, 0.5),
            Err(AudioError::KnotenUnbekannt(_))
        ));
        assert!(tk.release(gain).is_err());
        assert!(tk.release(tk.destination()).is_err());
    }

    #[test]
    fn ungueltige_fft_groesse() {
        let mut tk = SimToolkit::new(8_000);
        assert!(tk.create(NodeSpec::Analyser { fft_size: 100 }).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_uhr() {
        let tk = SimToolkit::realtime(48_000);
        assert_eq!(tk.current_time(), 0.0);
        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        assert!((tk.current_time() - 0.25).abs() < 1e-6);
    }
}
