//! MixController – Zentrale Steuerung des Audio-Mix
//!
//! Besitzt den geteilten [`MixGraph`] und die einzige Voice-Wiedergabe.
//! Fuehrt die Kommandos der Gaze-Zustandsmaschine aus (Muffle, Voice-Start,
//! Scan-Cue) und spielt Einmal-Cues (Abschluss-Snap, Kalibrierungs-Piepton).
//!
//! Das Ende einer Quelle meldet das Toolkit ueber `drain_ended`;
//! [`MixController::poll_events`] macht daraus genau ein
//! [`MixEvent::VoiceEnded`] pro natuerlich beendetem Clip.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use brainswap_core::{AudioId, AudioRef, Playlist};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, trace, warn};

use crate::buffer::{fallback_noise, reverb_impulse, snap_burst, AudioBuffer};
use crate::config::MixConfig;
use crate::error::AudioResult;
use crate::graph::MixGraph;
use crate::toolkit::{AudioToolkit, FilterKind, NodeId, NodeSpec, Param};

/// Ereignisse aus dem Audio-Mix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixEvent {
    /// Der aktive Clip ist natuerlich zu Ende gespielt
    VoiceEnded { audio_id: Option<AudioId> },
}

/// Statistiken des Mix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MixStats {
    pub voice_starts: u64,
    /// Clips die durch den Rausch-Ersatz ersetzt wurden
    pub fallback_buffers: u64,
    pub completed_clips: u64,
    pub cues_played: u64,
}

/// Die einzige Voice-Wiedergabe
#[derive(Debug, Clone)]
struct VoicePlayback {
    source: NodeId,
    audio_id: Option<AudioId>,
}

pub struct MixController<T: AudioToolkit> {
    toolkit: T,
    config: MixConfig,
    graph: MixGraph,
    voice: Option<VoicePlayback>,
    scan_source: Option<NodeId>,
    scan_buffer: Option<Arc<AudioBuffer>>,
    snap_buffer: Option<Arc<AudioBuffer>>,
    /// Hilfsknoten der Einmal-Cues je Quelle, freigegeben mit deren Ende
    one_shots: HashMap<NodeId, Vec<NodeId>>,
    rng: StdRng,
    stats: MixStats,
}

impl<T: AudioToolkit> MixController<T> {
    /// Baut den Mix-Graphen auf. Ein Fehler hier ist fatal fuer die Sitzung.
    pub fn new(toolkit: T, config: MixConfig) -> AudioResult<Self> {
        Self::with_rng(toolkit, config, StdRng::from_entropy())
    }

    /// Wie [`MixController::new`], mit vorgegebener Zufallsquelle
    pub fn with_rng(mut toolkit: T, config: MixConfig, mut rng: StdRng) -> AudioResult<Self> {
        config.validate()?;
        let impulse = reverb_impulse(toolkit.sample_rate(), config.reverb_seconds, &mut rng)?;
        let graph = MixGraph::build(&mut toolkit, &config, impulse)?;
        info!(
            sample_rate = toolkit.sample_rate(),
            fft_size = config.analyser_fft_size,
            "MixController initialisiert"
        );
        Ok(Self {
            toolkit,
            config,
            graph,
            voice: None,
            scan_source: None,
            scan_buffer: None,
            snap_buffer: None,
            one_shots: HashMap::new(),
            rng,
            stats: MixStats::default(),
        })
    }

    /// Laedt den Loop fuer den Scan-Cue. Ohne ihn ist der Scan-Cue stumm.
    pub fn set_scan_sound(&mut self, bytes: &[u8]) -> AudioResult<()> {
        let buffer = self.toolkit.decode(bytes)?;
        self.scan_buffer = Some(Arc::new(buffer));
        Ok(())
    }

    /// Laedt den Abschluss-Sound. Ohne ihn wird der Snap synthetisiert.
    pub fn set_snap_sound(&mut self, bytes: &[u8]) -> AudioResult<()> {
        let buffer = self.toolkit.decode(bytes)?;
        self.snap_buffer = Some(Arc::new(buffer));
        Ok(())
    }

    /// Startet die Voice-Wiedergabe falls keine laeuft.
    ///
    /// Gibt `false` zurueck wenn bereits eine Wiedergabe existiert (No-op).
    /// Abruf- und Dekodierfehler fuehren zum Rausch-Ersatz, nicht zum Fehler.
    pub async fn start_voice(
        &mut self,
        audio: Option<&AudioRef>,
        playlist: &dyn Playlist,
        start_muffled: bool,
    ) -> AudioResult<bool> {
        if self.voice.is_some() {
            trace!("Voice laeuft bereits");
            return Ok(false);
        }

        let buffer = self.load_voice_buffer(audio, playlist).await?;
        let duration = buffer.duration_secs();
        let source = self.toolkit.create(NodeSpec::BufferSource {
            buffer: Arc::new(buffer),
            looping: false,
        })?;
        self.graph.rewire(&mut self.toolkit, source)?;
        let now = self.toolkit.current_time();
        self.toolkit.start(source, now)?;

        let audio_id = audio.map(|a| a.id.clone());
        self.voice = Some(VoicePlayback {
            source,
            audio_id: audio_id.clone(),
        });
        self.stats.voice_starts += 1;
        self.set_muffle(start_muffled)?;

        info!(
            audio_id = audio_id.as_ref().map(|a| a.as_str()),
            %source,
            duration_s = duration,
            muffled = start_muffled,
            "Voice gestartet"
        );
        Ok(true)
    }

    async fn load_voice_buffer(
        &mut self,
        audio: Option<&AudioRef>,
        playlist: &dyn Playlist,
    ) -> AudioResult<AudioBuffer> {
        let Some(audio) = audio else {
            debug!("Kein Clip ausgewaehlt, nutze Rausch-Ersatz");
            return self.fallback_buffer();
        };
        match playlist.fetch_bytes(audio).await {
            Ok(bytes) => match self.toolkit.decode(&bytes) {
                Ok(buffer) => Ok(buffer),
                Err(e) => {
                    warn!(audio_id = %audio.id, "Clip nicht dekodierbar, nutze Rausch-Ersatz: {e}");
                    self.fallback_buffer()
                }
            },
            Err(e) => {
                warn!(audio_id = %audio.id, "Clip-Abruf fehlgeschlagen, nutze Rausch-Ersatz: {e}");
                self.fallback_buffer()
            }
        }
    }

    fn fallback_buffer(&mut self) -> AudioResult<AudioBuffer> {
        self.stats.fallback_buffers += 1;
        fallback_noise(self.toolkit.sample_rate(), &mut self.rng)
    }

    /// Rampt den Muffle-Cutoff Richtung dumpf oder klar
    pub fn set_muffle(&mut self, muffled: bool) -> AudioResult<()> {
        let target = if muffled {
            self.config.muffled_cutoff_hz
        } else {
            self.config.clear_cutoff_hz
        };
        let now = self.toolkit.current_time();
        self.toolkit.set_target_at_time(
            self.graph.muffle,
            Param::Frequency,
            target,
            now,
            self.config.muffle_time_constant,
        )
    }

    /// Aktueller Cutoff des Muffle-Filters (Hz)
    pub fn muffle_cutoff(&self) -> AudioResult<f32> {
        self.toolkit.param_value(self.graph.muffle, Param::Frequency)
    }

    /// Startet (falls noetig) den Scan-Loop und fuehrt Rate und Pan nach.
    ///
    /// `proximity` in [0, 1] skaliert die Rate von Basis bis Maximum,
    /// `direction * 2` wird auf [-1, 1] begrenzt als Stereo-Position genutzt.
    pub fn play_scan_cue(&mut self, proximity: f32, direction: f32) -> AudioResult<()> {
        let Some(buffer) = self.scan_buffer.clone() else {
            trace!("Kein Scan-Sound geladen");
            return Ok(());
        };
        let now = self.toolkit.current_time();
        let source = match self.scan_source {
            Some(source) => source,
            None => {
                let source = self.toolkit.create(NodeSpec::BufferSource {
                    buffer,
                    looping: true,
                })?;
                self.toolkit.connect(source, self.graph.scan_gain)?;
                self.toolkit.start(source, now)?;
                self.scan_source = Some(source);
                debug!(%source, "Scan-Cue gestartet");
                source
            }
        };

        let tau = self.config.scan_attack;
        let rate = self.config.scan_rate_base
            + proximity.clamp(0.0, 1.0) * (self.config.scan_rate_max - self.config.scan_rate_base);
        let pan = (direction * 2.0).clamp(-1.0, 1.0);
        self.toolkit.set_target_at_time(
            self.graph.scan_gain,
            Param::Gain,
            self.config.scan_gain,
            now,
            tau,
        )?;
        self.toolkit
            .set_target_at_time(source, Param::PlaybackRate, rate, now, tau)?;
        self.toolkit
            .set_target_at_time(self.graph.scan_panner, Param::Pan, pan, now, tau)
    }

    /// Blendet den Scan-Cue aus und stoppt den Loop nach kurzer Wartezeit
    pub fn stop_scan_cue(&mut self) -> AudioResult<()> {
        let now = self.toolkit.current_time();
        self.toolkit.set_target_at_time(
            self.graph.scan_gain,
            Param::Gain,
            0.0,
            now,
            self.config.scan_release,
        )?;
        if let Some(source) = self.scan_source.take() {
            self.toolkit.stop(source, now + self.config.scan_stop_grace)?;
            debug!(%source, "Scan-Cue gestoppt");
        }
        Ok(())
    }

    /// Erste Stufe des Stops: Master-Bus ausblenden
    pub fn fade_out(&mut self) -> AudioResult<()> {
        let now = self.toolkit.current_time();
        self.toolkit.set_target_at_time(
            self.graph.master,
            Param::Gain,
            0.0,
            now,
            self.config.stop_fade_time_constant,
        )
    }

    /// Zweite Stufe: Quellen sofort stoppen, Master fuer die naechste
    /// Sitzung wieder auf 1.
    ///
    /// Die Voice wird vor dem Stop freigegeben, ihr Ende erzeugt daher
    /// kein [`MixEvent::VoiceEnded`] und keinen Abschluss-Cue.
    pub fn hard_stop(&mut self) -> AudioResult<()> {
        let now = self.toolkit.current_time();
        if let Some(voice) = self.voice.take() {
            self.toolkit.stop(voice.source, now)?;
            self.toolkit.disconnect(voice.source)?;
        }
        if let Some(source) = self.scan_source.take() {
            self.toolkit.stop(source, now)?;
        }
        self.toolkit.set_value(self.graph.master, Param::Gain, 1.0)
    }

    /// Zweistufiger Stop: ausblenden, Wartezeit, harter Stop
    pub async fn stop_all(&mut self) -> AudioResult<()> {
        self.fade_out()?;
        tokio::time::sleep(Duration::from_millis(self.config.stop_grace_ms)).await;
        self.hard_stop()?;
        info!("Audio gestoppt");
        Ok(())
    }

    /// Abschluss-Cue: Snap-Sound oder synthetischer Rauschstoss
    pub fn play_completion_cue(&mut self) -> AudioResult<()> {
        let now = self.toolkit.current_time();
        self.stats.cues_played += 1;

        if let Some(buffer) = self.snap_buffer.clone() {
            let source = self.toolkit.create(NodeSpec::BufferSource {
                buffer,
                looping: false,
            })?;
            self.toolkit.connect(source, self.graph.master)?;
            self.one_shots.insert(source, Vec::new());
            return self.toolkit.start(source, now);
        }

        let burst = snap_burst(self.toolkit.sample_rate(), &mut self.rng)?;
        let noise = self.toolkit.create(NodeSpec::BufferSource {
            buffer: Arc::new(burst),
            looping: false,
        })?;
        let filter = self.toolkit.create(NodeSpec::Filter {
            kind: FilterKind::HighPass,
            frequency: self.config.snap_highpass_hz,
        })?;
        let gain = self.toolkit.create(NodeSpec::Gain { gain: 1.0 })?;
        self.toolkit.connect(noise, filter)?;
        self.toolkit.connect(filter, gain)?;
        self.toolkit.connect(gain, self.graph.master)?;

        self.toolkit.set_value(gain, Param::Gain, 1.0)?;
        self.toolkit
            .exponential_ramp_to(gain, Param::Gain, 0.01, now + 0.05)?;
        self.one_shots.insert(noise, vec![filter, gain]);
        self.toolkit.start(noise, now)
    }

    /// Kurzer Sinuston direkt auf den Ausgang (am Master vorbei)
    pub fn play_calibration_beep(&mut self, freq_hz: f32) -> AudioResult<()> {
        let now = self.toolkit.current_time();
        let out = self.toolkit.destination();
        let osc = self
            .toolkit
            .create(NodeSpec::Oscillator { frequency: freq_hz })?;
        let gain = self.toolkit.create(NodeSpec::Gain { gain: 1.0 })?;
        self.toolkit.connect(osc, gain)?;
        self.toolkit.connect(gain, out)?;
        self.toolkit.start(osc, now)?;
        self.toolkit.stop(osc, now + self.config.beep_seconds)?;
        self.one_shots.insert(osc, vec![gain]);
        self.stats.cues_played += 1;
        trace!(freq_hz, "Piepton");
        Ok(())
    }

    /// Verarbeitet beendete Quellen.
    ///
    /// Endet die aktive Voice natuerlich: Abschluss-Cue, Handle freigeben,
    /// genau ein [`MixEvent::VoiceEnded`]. Beendete Quellen und ihre
    /// Hilfsknoten werden im Toolkit freigegeben.
    pub fn poll_events(&mut self) -> Vec<MixEvent> {
        let mut events = Vec::new();
        for ended in self.toolkit.drain_ended() {
            self.release_chain(ended);
            if self.scan_source == Some(ended) {
                self.scan_source = None;
                continue;
            }
            let is_voice = self.voice.as_ref().is_some_and(|v| v.source == ended);
            if !is_voice {
                continue;
            }
            let Some(voice) = self.voice.take() else {
                continue;
            };
            self.stats.completed_clips += 1;
            info!(
                audio_id = voice.audio_id.as_ref().map(|a| a.as_str()),
                "Clip beendet"
            );
            if let Err(e) = self.play_completion_cue() {
                warn!("Abschluss-Cue fehlgeschlagen: {e}");
            }
            events.push(MixEvent::VoiceEnded {
                audio_id: voice.audio_id,
            });
        }
        events
    }

    fn release_chain(&mut self, source: NodeId) {
        let helpers = self.one_shots.remove(&source).unwrap_or_default();
        self.graph.forget_source(source);
        for node in std::iter::once(source).chain(helpers) {
            if let Err(e) = self.toolkit.release(node) {
                warn!(%node, "Knoten nicht freigegeben: {e}");
            }
        }
    }

    /// Byte-Spektrum des Analysers
    pub fn spectrum(&self) -> AudioResult<Vec<u8>> {
        self.toolkit.frequency_data(self.graph.analyser)
    }

    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    pub fn voice_source(&self) -> Option<NodeId> {
        self.voice.as_ref().map(|v| v.source)
    }

    pub fn scan_source(&self) -> Option<NodeId> {
        self.scan_source
    }

    pub fn master_gain(&self) -> AudioResult<f32> {
        self.toolkit.param_value(self.graph.master, Param::Gain)
    }

    pub fn graph(&self) -> &MixGraph {
        &self.graph
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    pub fn stats(&self) -> &MixStats {
        &self.stats
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    pub fn toolkit_mut(&mut self) -> &mut T {
        &mut self.toolkit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::wav_bytes;
    use crate::sim::SimToolkit;
    use brainswap_core::MemoryPlaylist;

    const SR: u32 = 8_000;

    fn mixer() -> MixController<SimToolkit> {
        MixController::with_rng(
            SimToolkit::new(SR),
            MixConfig::default(),
            StdRng::seed_from_u64(7),
        )
        .unwrap()
    }

    /// Clip mit `sekunden` Laenge bei 8 kHz
    fn clip(sekunden: f32) -> Vec<u8> {
        let n = (SR as f32 * sekunden) as usize;
        wav_bytes(SR, 1, &vec![1000; n])
    }

    fn referenz(id: &str) -> AudioRef {
        AudioRef::new(id, id, format!("mem://{id}"))
    }

    fn playlist_mit(id: &str, sekunden: f32) -> MemoryPlaylist {
        MemoryPlaylist::default().with_clip(referenz(id), clip(sekunden))
    }

    fn nah(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() <= tol
    }

    #[tokio::test]
    async fn voice_singleton() {
        let mut m = mixer();
        let pl = playlist_mit("a", 5.0);
        let r = referenz("a");

        assert!(m.start_voice(Some(&r), &pl, false).await.unwrap());
        let erste = m.voice_source().unwrap();
        for _ in 0..5 {
            assert!(!m.start_voice(Some(&r), &pl, false).await.unwrap());
        }
        assert_eq!(m.voice_source(), Some(erste));
        assert_eq!(m.stats().voice_starts, 1);

        let spielend: Vec<_> = m
            .toolkit()
            .playing_sources()
            .into_iter()
            .filter(|s| m.toolkit().inputs(m.graph().muffle).contains(s))
            .collect();
        assert_eq!(spielend, vec![erste]);
    }

    #[tokio::test]
    async fn wiederholte_wiedergaben_ohne_verbindungsstau() {
        let mut m = mixer();
        let pl = playlist_mit("a", 0.5);
        let r = referenz("a");
        for _ in 0..4 {
            m.start_voice(Some(&r), &pl, true).await.unwrap();
            let g = m.graph().clone();
            let tk = m.toolkit();
            assert_eq!(tk.connection_count(g.muffle, g.dry), 1);
            assert_eq!(tk.connection_count(g.muffle, g.reverb), 1);
            assert_eq!(tk.connection_count(g.reverb, g.wet), 1);
            assert_eq!(tk.connection_count(g.dry, g.master), 1);
            assert_eq!(tk.connection_count(g.wet, g.master), 1);

            m.toolkit_mut().advance(0.6);
            assert_eq!(m.poll_events().len(), 1);
            assert!(!m.has_voice());
        }
        assert_eq!(m.stats().completed_clips, 4);
    }

    #[tokio::test]
    async fn muffle_gleiches_ziel_zweimal() {
        let mut einmal = mixer();
        einmal.set_muffle(true).unwrap();
        einmal.toolkit_mut().advance(5.0);

        let mut zweimal = mixer();
        zweimal.set_muffle(true).unwrap();
        zweimal.toolkit_mut().advance(0.15);
        zweimal.set_muffle(true).unwrap();
        zweimal.toolkit_mut().advance(4.85);

        let a = einmal.muffle_cutoff().unwrap();
        let b = zweimal.muffle_cutoff().unwrap();
        assert!(nah(a, 300.0, 0.01), "cutoff war {a}");
        assert!(nah(a, b, 0.01));
    }

    #[tokio::test]
    async fn muffle_rampe_nicht_sprunghaft() {
        let mut m = mixer();
        m.set_muffle(false).unwrap();
        // Start bei 400 Hz, nach einer Zeitkonstante ~63 % des Weges
        m.toolkit_mut().advance(0.3);
        let c = m.muffle_cutoff().unwrap();
        assert!(c > 10_000.0 && c < 14_000.0, "cutoff war {c}");
    }

    #[tokio::test]
    async fn startet_gedaempft_wenn_verlangt() {
        let mut m = mixer();
        let pl = playlist_mit("a", 5.0);
        m.start_voice(Some(&referenz("a")), &pl, true).await.unwrap();
        m.toolkit_mut().advance(3.0);
        assert!(nah(m.muffle_cutoff().unwrap(), 300.0, 1.0));
    }

    #[tokio::test]
    async fn abruffehler_nutzt_rausch_ersatz() {
        let mut m = mixer();
        let r = referenz("fehlt");
        let pl = MemoryPlaylist::default().with_missing(r.clone());
        assert!(m.start_voice(Some(&r), &pl, false).await.unwrap());
        assert!(m.has_voice());
        assert_eq!(m.stats().fallback_buffers, 1);
        // Ersatz ist 2 s lang
        m.toolkit_mut().advance(1.9);
        assert!(m.poll_events().is_empty());
        m.toolkit_mut().advance(0.2);
        assert_eq!(m.poll_events().len(), 1);
    }

    #[tokio::test]
    async fn dekodierfehler_nutzt_rausch_ersatz() {
        let mut m = mixer();
        let r = referenz("kaputt");
        let pl = MemoryPlaylist::default().with_clip(r.clone(), b"kein wav".to_vec());
        assert!(m.start_voice(Some(&r), &pl, false).await.unwrap());
        assert_eq!(m.stats().fallback_buffers, 1);
    }

    #[tokio::test]
    async fn ohne_clip_rausch_ersatz() {
        let mut m = mixer();
        let pl = MemoryPlaylist::default();
        assert!(m.start_voice(None, &pl, false).await.unwrap());
        assert_eq!(m.stats().fallback_buffers, 1);
    }

    #[tokio::test]
    async fn clip_ende_genau_ein_ereignis_und_cue() {
        let mut m = mixer();
        let pl = playlist_mit("a", 1.0);
        let r = referenz("a");
        m.start_voice(Some(&r), &pl, false).await.unwrap();

        m.toolkit_mut().advance(1.0);
        let events = m.poll_events();
        assert_eq!(
            events,
            vec![MixEvent::VoiceEnded {
                audio_id: Some(r.id.clone())
            }]
        );
        assert_eq!(m.stats().cues_played, 1);
        m.toolkit_mut().advance(1.0);
        assert!(m.poll_events().is_empty());
        assert_eq!(m.stats().cues_played, 1);
    }

    #[tokio::test]
    async fn snap_sound_statt_synthese() {
        let mut m = mixer();
        m.set_snap_sound(&clip(0.2)).unwrap();
        let vorher = m.toolkit().node_count();
        m.play_completion_cue().unwrap();
        // Nur eine Quelle, kein Filter/Gain
        assert_eq!(m.toolkit().node_count(), vorher + 1);
    }

    #[test]
    fn synthetischer_snap_klingt_ab() {
        let mut m = mixer();
        let vorher = m.toolkit().node_count();
        m.play_completion_cue().unwrap();
        assert_eq!(m.toolkit().node_count(), vorher + 3);
        let gain = NodeId(vorher as u64 + 2);
        m.toolkit_mut().advance(0.05);
        let g = m.toolkit().param_value(gain, Param::Gain).unwrap();
        assert!(nah(g, 0.01, 1e-4));
    }

    #[test]
    fn piepton_stoppt_nach_100ms() {
        let mut m = mixer();
        m.play_calibration_beep(600.0).unwrap();
        let osc = *m.toolkit().playing_sources().last().unwrap();
        assert_eq!(m.toolkit().stop_time(osc), Some(0.1));
        m.toolkit_mut().advance(0.1);
        assert!(m.poll_events().is_empty());
        assert!(m.toolkit().playing_sources().is_empty());
    }

    #[tokio::test]
    async fn beendete_quellen_werden_freigegeben() {
        let mut m = mixer();
        let pl = playlist_mit("a", 0.5);
        let r = referenz("a");
        let basis = m.toolkit().node_count();

        for _ in 0..3 {
            m.play_calibration_beep(600.0).unwrap();
            m.play_completion_cue().unwrap();
            m.start_voice(Some(&r), &pl, false).await.unwrap();
            m.toolkit_mut().advance(0.6);
            // Voice-Ende startet den Abschluss-Cue
            assert_eq!(m.poll_events().len(), 1);
            m.toolkit_mut().advance(0.1);
            assert!(m.poll_events().is_empty());
            assert_eq!(m.toolkit().node_count(), basis);
        }

        m.set_scan_sound(&clip(0.5)).unwrap();
        m.play_scan_cue(0.5, 0.0).unwrap();
        m.stop_scan_cue().unwrap();
        m.toolkit_mut().advance(0.5);
        m.poll_events();
        assert_eq!(m.toolkit().node_count(), basis);
    }

    #[test]
    fn scan_cue_ohne_sound_stumm() {
        let mut m = mixer();
        m.play_scan_cue(0.5, 0.2).unwrap();
        assert!(m.scan_source().is_none());
    }

    #[test]
    fn scan_cue_rate_und_pan() {
        let mut m = mixer();
        m.set_scan_sound(&clip(0.5)).unwrap();
        m.play_scan_cue(0.5, 0.8).unwrap();
        let src = m.scan_source().unwrap();
        m.play_scan_cue(0.5, 0.8).unwrap();
        assert_eq!(m.scan_source(), Some(src), "Loop wird wiederverwendet");

        m.toolkit_mut().advance(2.0);
        let tk = m.toolkit();
        let g = m.graph();
        assert!(nah(tk.param_value(src, Param::PlaybackRate).unwrap(), 1.15, 1e-3));
        assert!(nah(tk.param_value(g.scan_panner, Param::Pan).unwrap(), 1.0, 1e-3));
        assert!(nah(tk.param_value(g.scan_gain, Param::Gain).unwrap(), 0.4, 1e-3));
        assert!(tk.is_playing(src));
    }

    #[test]
    fn scan_cue_ausblenden_und_stoppen() {
        let mut m = mixer();
        m.set_scan_sound(&clip(0.5)).unwrap();
        m.play_scan_cue(1.0, -0.3).unwrap();
        let src = m.scan_source().unwrap();
        m.toolkit_mut().advance(1.0);
        m.stop_scan_cue().unwrap();
        assert!(m.scan_source().is_none());
        let stop = m.toolkit().stop_time(src).unwrap();
        assert!((stop - 1.3).abs() < 1e-9);
        m.toolkit_mut().advance(0.3);
        assert!(!m.toolkit().is_playing(src));
        assert!(m.poll_events().is_empty());
        // Ohne laufenden Loop nur Gain-Rampe
        m.stop_scan_cue().unwrap();
    }

    #[tokio::test]
    async fn harter_stop_ohne_ende_ereignis() {
        let mut m = mixer();
        let pl = playlist_mit("a", 5.0);
        m.start_voice(Some(&referenz("a")), &pl, false).await.unwrap();
        let src = m.voice_source().unwrap();

        m.fade_out().unwrap();
        m.toolkit_mut().advance(0.3);
        assert!(m.master_gain().unwrap() < 0.06);

        m.hard_stop().unwrap();
        assert!(!m.has_voice());
        assert!(nah(m.master_gain().unwrap(), 1.0, 1e-6));
        m.toolkit_mut().advance(0.01);
        assert!(!m.toolkit().is_playing(src));
        assert!(m.poll_events().is_empty());
        assert_eq!(m.stats().cues_played, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_zweistufig() {
        let mut m = MixController::with_rng(
            SimToolkit::realtime(SR),
            MixConfig::default(),
            StdRng::seed_from_u64(1),
        )
        .unwrap();
        let pl = playlist_mit("a", 5.0);
        m.start_voice(Some(&referenz("a")), &pl, false).await.unwrap();

        let start = tokio::time::Instant::now();
        m.stop_all().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(!m.has_voice());
        assert!(nah(m.master_gain().unwrap(), 1.0, 1e-6));
        // Naechste Sitzung kann sofort wieder starten
        assert!(m.start_voice(Some(&referenz("a")), &pl, false).await.unwrap());
    }

    #[test]
    fn spektrum_laenge() {
        let m = mixer();
        assert_eq!(m.spectrum().unwrap().len(), 128);
    }
}
