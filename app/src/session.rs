//! Session-Controller
//!
//! Haelt den Sitzungszustand und verbindet Sensor, Gaze-Zustandsmaschine
//! und Audio-Mix:
//!
//! 1. `kalibrieren`: linearer Ablauf der Kalibrierung (Modus CALIBRATING)
//! 2. `erlebnis_starten`: Zielrotation ziehen, ersten Clip waehlen, Voice
//!    gedaempft starten, dann zwei kooperative Aufgaben pro Anzeige-Tick:
//!    - Erkennung (Sensor hoechstens alle `intervall_ms`)
//!    - Anzeige (Spektrum nur solange verbunden)
//! 3. `stoppen`: Aufgaben beenden, zweistufiger Audio-Stop

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use brainswap_audio::{AudioToolkit, MixController, MixEvent};
use brainswap_core::{
    pick_random, AudioRef, Playlist, SessionEvent, SessionMode, SessionState,
};
use brainswap_gaze::{
    CalibrationCues, CalibrationEngine, CalibrationProfile, CalibrationProgress, FaceSensor,
    GazeCommand, GazeState, GazeStateMachine,
};
use brainswap_observability::BrainswapMetrics;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::ExperienceConfig;
use crate::visualizer::{VisualFrame, VisualSink};

/// Kapazitaet des Event-Kanals
const EVENT_KAPAZITAET: usize = 256;

/// Von Session und Aufgaben geteilte Teile
struct Kontext<T: AudioToolkit> {
    zustand: Arc<RwLock<SessionState>>,
    mixer: Arc<Mutex<MixController<T>>>,
    playlist: Arc<dyn Playlist>,
    events: broadcast::Sender<SessionEvent>,
    metriken: Option<BrainswapMetrics>,
    rng: Arc<parking_lot::Mutex<StdRng>>,
}

impl<T: AudioToolkit> Clone for Kontext<T> {
    fn clone(&self) -> Self {
        Self {
            zustand: Arc::clone(&self.zustand),
            mixer: Arc::clone(&self.mixer),
            playlist: Arc::clone(&self.playlist),
            events: self.events.clone(),
            metriken: self.metriken.clone(),
            rng: Arc::clone(&self.rng),
        }
    }
}

impl<T: AudioToolkit + 'static> Kontext<T> {
    fn melden(&self, event: SessionEvent) {
        trace!(?event, "Sitzungs-Ereignis");
        // Ohne Abonnenten geht das Ereignis verloren
        let _ = self.events.send(event);
    }

    /// Waehlt gleichverteilt einen Clip. Leere oder nicht lesbare Liste: kein Wechsel.
    async fn clip_waehlen(&self) -> Option<AudioRef> {
        let liste = match self.playlist.list_audio_refs().await {
            Ok(liste) => liste,
            Err(e) => {
                warn!("Playlist nicht abrufbar: {e}");
                Vec::new()
            }
        };
        let auswahl = {
            let mut rng = self.rng.lock();
            pick_random(&liste, &mut *rng)
        };
        match &auswahl {
            Some(audio) => {
                self.zustand.write().current_audio = Some(audio.clone());
                debug!(audio_id = %audio.id, name = %audio.name, "Clip ausgewaehlt");
            }
            None => debug!("Playlist leer, Clip bleibt"),
        }
        auswahl
    }

    /// Startet die Voice mit dem aktuellen Clip (No-op falls eine laeuft)
    async fn voice_starten(&self, mixer: &mut MixController<T>, gedaempft: bool) {
        let audio = self.zustand.read().current_audio.clone();
        let ersatz_vorher = mixer.stats().fallback_buffers;
        match mixer
            .start_voice(audio.as_ref(), self.playlist.as_ref(), gedaempft)
            .await
        {
            Ok(true) => {
                if let Some(m) = &self.metriken {
                    m.voice_starts.inc();
                    m.fallback_buffers
                        .inc_by(mixer.stats().fallback_buffers - ersatz_vorher);
                }
                self.melden(SessionEvent::StimmeGestartet {
                    audio_id: audio.map(|a| a.id),
                });
            }
            Ok(false) => {}
            Err(e) => warn!("Voice-Start fehlgeschlagen: {e}"),
        }
    }

    /// Fuehrt die Kommandos eines Ticks auf dem Mix aus
    async fn kommandos_ausfuehren(&self, kommandos: &[GazeCommand]) {
        if kommandos.is_empty() {
            return;
        }
        let mut mixer = self.mixer.lock().await;
        for kommando in kommandos {
            let ergebnis = match *kommando {
                GazeCommand::Muffle(gedaempft) => mixer.set_muffle(gedaempft),
                GazeCommand::StopScanCue => mixer.stop_scan_cue(),
                GazeCommand::PickNextAudio => {
                    if let Some(audio) = self.clip_waehlen().await {
                        self.melden(SessionEvent::NaechsterClip { audio_id: audio.id });
                    }
                    Ok(())
                }
                GazeCommand::StartVoice { muffled } => {
                    self.voice_starten(&mut mixer, muffled).await;
                    Ok(())
                }
            };
            if let Err(e) = ergebnis {
                warn!(?kommando, "Audio-Kommando fehlgeschlagen: {e}");
            }
        }
    }

    /// Verarbeitet Ende-Ereignisse des Mix
    async fn mix_ereignisse(&self, maschine: &mut GazeStateMachine) {
        let ereignisse = self.mixer.lock().await.poll_events();
        for ereignis in ereignisse {
            let MixEvent::VoiceEnded { audio_id } = ereignis;
            let gesetzt = maschine.on_playback_ended(&mut self.zustand.write());
            if let Some(m) = &self.metriken {
                m.completed_clips.inc();
            }
            debug!(gesetzt, "Voice beendet");
            self.melden(SessionEvent::ClipBeendet { audio_id });
        }
    }
}

/// Eine Sitzung vom Kalibrieren bis zum Stop
pub struct Session<T: AudioToolkit + 'static> {
    config: ExperienceConfig,
    ktx: Kontext<T>,
    engine: CalibrationEngine,
    profil: Option<CalibrationProfile>,
    shutdown: watch::Sender<bool>,
    aufgaben: Vec<JoinHandle<()>>,
}

impl<T: AudioToolkit + 'static> Session<T> {
    /// Baut Mix-Graph und Kalibrierung auf.
    ///
    /// Ungueltige Konfiguration und ein Fehler beim Aufbau des Mix-Graphen
    /// sind fatal.
    pub fn neu(config: ExperienceConfig, toolkit: T, playlist: Arc<dyn Playlist>) -> Result<Self> {
        config.pruefen()?;
        let mut rng = match config.sitzung.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mixer_rng = StdRng::seed_from_u64(rng.gen());
        let mixer = MixController::with_rng(toolkit, config.audio.mix.clone(), mixer_rng)?;
        let engine = CalibrationEngine::new(config.kalibrierung.clone(), config.merkmale)?;
        let (events, _) = broadcast::channel(EVENT_KAPAZITAET);
        let (shutdown, _) = watch::channel(false);

        let zustand = SessionState::new();
        info!(session_id = %zustand.id, "Sitzung angelegt");

        Ok(Self {
            config,
            ktx: Kontext {
                zustand: Arc::new(RwLock::new(zustand)),
                mixer: Arc::new(Mutex::new(mixer)),
                playlist,
                events,
                metriken: None,
                rng: Arc::new(parking_lot::Mutex::new(rng)),
            },
            engine,
            profil: None,
            shutdown,
            aufgaben: Vec::new(),
        })
    }

    /// Haengt Prometheus-Metriken an
    pub fn mit_metriken(mut self, metriken: BrainswapMetrics) -> Self {
        self.ktx.metriken = Some(metriken);
        self
    }

    /// Abonniert die Sitzungs-Ereignisse
    pub fn abonnieren(&self) -> broadcast::Receiver<SessionEvent> {
        self.ktx.events.subscribe()
    }

    /// Fortschritt der Kalibrierung
    pub fn kalibrierung_fortschritt(&self) -> watch::Receiver<CalibrationProgress> {
        self.engine.subscribe()
    }

    /// Momentaufnahme des Sitzungszustands
    pub fn zustand(&self) -> SessionState {
        self.ktx.zustand.read().clone()
    }

    pub fn profil(&self) -> Option<&CalibrationProfile> {
        self.profil.as_ref()
    }

    /// Geteilter Audio-Mix
    pub fn mixer(&self) -> Arc<Mutex<MixController<T>>> {
        Arc::clone(&self.ktx.mixer)
    }

    /// Laedt die optionalen Cue-Dateien. Fehlende oder kaputte Dateien
    /// werden gemeldet und uebersprungen.
    pub async fn cue_dateien_laden(&self) {
        let mut mixer = self.ktx.mixer.lock().await;
        if let Some(pfad) = &self.config.audio.scan_sound {
            match tokio::fs::read(pfad).await {
                Ok(bytes) => {
                    if let Err(e) = mixer.set_scan_sound(&bytes) {
                        warn!(pfad = %pfad, "Scan-Sound nicht dekodierbar: {e}");
                    }
                }
                Err(e) => warn!(pfad = %pfad, "Scan-Sound nicht lesbar: {e}"),
            }
        }
        if let Some(pfad) = &self.config.audio.snap_sound {
            match tokio::fs::read(pfad).await {
                Ok(bytes) => {
                    if let Err(e) = mixer.set_snap_sound(&bytes) {
                        warn!(pfad = %pfad, "Snap-Sound nicht dekodierbar: {e}");
                    }
                }
                Err(e) => warn!(pfad = %pfad, "Snap-Sound nicht lesbar: {e}"),
            }
        }
    }

    /// Fuehrt die Kalibrierung aus, genau einmal pro Sitzung.
    ///
    /// Blockiert solange kein Gesicht erkannt wird; abbrechen durch Droppen
    /// des Futures. Ein abgebrochener Lauf darf wiederholt werden.
    pub async fn kalibrieren(
        &mut self,
        sensor: &mut dyn FaceSensor,
    ) -> Result<CalibrationProfile> {
        let modus = self.ktx.zustand.read().mode;
        if self.profil.is_some() || modus == SessionMode::Experiencing {
            anyhow::bail!("Sitzung ist bereits kalibriert");
        }
        let session_id = {
            let mut zustand = self.ktx.zustand.write();
            zustand.mode = SessionMode::Calibrating;
            zustand.id
        };
        info!(%session_id, "Kalibrierung startet");

        let mut cues = MixerCues {
            mixer: Arc::clone(&self.ktx.mixer),
        };
        let profil = self.engine.run(sensor, &mut cues).await;

        if let Some(m) = &self.ktx.metriken {
            m.calibration_threshold.set(profil.threshold as f64);
        }
        self.ktx.melden(SessionEvent::Kalibriert {
            session_id,
            threshold: profil.threshold,
            yaw_baseline: profil.yaw_baseline,
        });
        self.profil = Some(profil);
        Ok(profil)
    }

    /// Wechselt in EXPERIENCING und startet Erkennung und Anzeige
    pub async fn erlebnis_starten(
        &mut self,
        sensor: Box<dyn FaceSensor>,
        sink: Box<dyn VisualSink>,
    ) -> Result<()> {
        let Some(profil) = self.profil else {
            anyhow::bail!("Erlebnis ohne Kalibrierung nicht moeglich");
        };
        if !self.aufgaben.is_empty() {
            anyhow::bail!("Erlebnis laeuft bereits");
        }

        let grenze = self.config.sitzung.rotation_grenze;
        let ziel = if grenze > 0.0 {
            self.ktx.rng.lock().gen_range(-grenze..=grenze)
        } else {
            0.0
        };
        let session_id = {
            let mut zustand = self.ktx.zustand.write();
            zustand.begin_experience(ziel);
            zustand.id
        };
        info!(
            %session_id,
            target_rotation = ziel,
            toleranz = self.config.sitzung.ziel_toleranz,
            "Erlebnis startet"
        );
        self.ktx.melden(SessionEvent::ErlebnisGestartet {
            session_id,
            target_rotation: ziel,
        });

        self.ktx.clip_waehlen().await;
        {
            let mut mixer = self.ktx.mixer.lock().await;
            self.ktx.voice_starten(&mut mixer, true).await;
        }

        let maschine = GazeStateMachine::new(profil, self.config.merkmale);
        let erkennung = erkennung_schleife(
            self.ktx.clone(),
            sensor,
            maschine,
            Duration::from_millis(self.config.erfassung.intervall_ms),
            Duration::from_millis(self.config.erfassung.anzeige_tick_ms),
            self.shutdown.subscribe(),
        );
        let anzeige = anzeige_schleife(
            self.ktx.clone(),
            sink,
            (self.config.anzeige.breite, self.config.anzeige.hoehe),
            Duration::from_millis(self.config.erfassung.anzeige_tick_ms),
            self.shutdown.subscribe(),
        );
        self.aufgaben.push(tokio::spawn(erkennung));
        self.aufgaben.push(tokio::spawn(anzeige));
        Ok(())
    }

    /// Beendet die Sitzung: Aufgaben stoppen, Audio ausblenden und hart stoppen.
    ///
    /// Zustand und `Gestoppt`-Ereignis werden auch bei einem Audiofehler
    /// gesetzt, der Fehler wird danach zurueckgegeben.
    pub async fn stoppen(mut self) -> Result<()> {
        let _ = self.shutdown.send(true);
        for aufgabe in self.aufgaben.drain(..) {
            if let Err(e) = aufgabe.await {
                warn!("Aufgabe nicht sauber beendet: {e}");
            }
        }

        let audio = self.ktx.mixer.lock().await.stop_all().await;

        let session_id = {
            let mut zustand = self.ktx.zustand.write();
            zustand.mode = SessionMode::Idle;
            zustand.is_connected = false;
            zustand.id
        };
        self.ktx.melden(SessionEvent::Gestoppt { session_id });

        match audio {
            Ok(()) => {
                info!(%session_id, "Sitzung beendet");
                Ok(())
            }
            Err(e) => {
                warn!(%session_id, "Sitzung beendet, Audio-Stop fehlgeschlagen: {e}");
                Err(e.into())
            }
        }
    }
}

/// Kalibrierungs-Pieptoene ueber den geteilten Mix
struct MixerCues<T: AudioToolkit> {
    mixer: Arc<Mutex<MixController<T>>>,
}

#[async_trait::async_trait]
impl<T: AudioToolkit + 'static> CalibrationCues for MixerCues<T> {
    async fn beep(&mut self, freq_hz: f32) {
        if let Err(e) = self.mixer.lock().await.play_calibration_beep(freq_hz) {
            warn!(freq_hz, "Piepton fehlgeschlagen: {e}");
        }
    }
}

/// Erkennungs-Aufgabe: pro Anzeige-Tick Ende-Ereignisse verarbeiten,
/// Sensor hoechstens einmal pro `intervall`.
async fn erkennung_schleife<T: AudioToolkit + 'static>(
    ktx: Kontext<T>,
    mut sensor: Box<dyn FaceSensor>,
    mut maschine: GazeStateMachine,
    intervall: Duration,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut takt = tokio::time::interval(tick);
    takt.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut letzte_erkennung: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = takt.tick() => {}
        }

        ktx.mix_ereignisse(&mut maschine).await;

        let jetzt = Instant::now();
        if letzte_erkennung.is_some_and(|l| jetzt.duration_since(l) <= intervall) {
            continue;
        }
        letzte_erkennung = Some(jetzt);

        // Ein langsamer Sensor verschiebt nur die naechste Erkennung
        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            frame = sensor.detect() => frame,
        };
        let dauer = jetzt.elapsed();

        let ergebnis = maschine.step(&frame, &mut ktx.zustand.write());

        if let Some(m) = &ktx.metriken {
            m.detection_ticks.inc();
            m.detection_duration_seconds.observe(dauer.as_secs_f64());
            match &ergebnis.reading {
                Some(messung) => {
                    m.eye_openness_ratio.set(messung.ratio as f64);
                    m.head_yaw.set(messung.yaw as f64);
                }
                None => m.empty_frames.inc(),
            }
        }

        if let Some(messung) = ergebnis.reading {
            if ergebnis.transitioned {
                let verbunden = messung.state == GazeState::Closed;
                if let Some(m) = &ktx.metriken {
                    m.blickwechsel(verbunden);
                }
                ktx.melden(SessionEvent::BlickGewechselt { verbunden });
            }
        }

        ktx.kommandos_ausfuehren(&ergebnis.commands).await;
    }
    debug!("Erkennung beendet");
}

/// Anzeige-Aufgabe: jeden Tick, zeichnet nur solange verbunden
async fn anzeige_schleife<T: AudioToolkit + 'static>(
    ktx: Kontext<T>,
    mut sink: Box<dyn VisualSink>,
    (breite, hoehe): (f32, f32),
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut takt = tokio::time::interval(tick);
    takt.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = takt.tick() => {}
        }

        let verbunden = ktx.zustand.read().is_connected;
        if !verbunden {
            sink.leeren();
            continue;
        }

        let spektrum = ktx.mixer.lock().await.spectrum();
        match spektrum {
            Ok(spektrum) => {
                let frame = {
                    let mut rng = ktx.rng.lock();
                    VisualFrame::aus_spektrum(&spektrum, breite, hoehe, &mut *rng)
                };
                sink.zeichnen(&frame);
            }
            Err(e) => warn!("Spektrum nicht lesbar: {e}"),
        }
    }
    debug!("Anzeige beendet");
}
