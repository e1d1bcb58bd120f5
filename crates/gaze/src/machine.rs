//! Gaze-Zustandsmaschine
//!
//! Klassifiziert jeden Erkennungs-Tick als OPEN oder CLOSED und erzeugt
//! daraus Kommandos fuer den Audio-Mix. Zustaende: SEARCHING (noch kein
//! Gesicht), OPEN, CLOSED. Frames ohne Gesicht halten den letzten Zustand.

use brainswap_core::SessionState;
use tracing::{debug, trace};

use crate::calibration::CalibrationProfile;
use crate::features::{eye_openness_ratio, head_yaw, FeatureConfig};
use crate::keypoints::KeypointFrame;

/// Blickzustand eines einzelnen Frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeState {
    Open,
    Closed,
}

/// Zustand der Maschine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineState {
    /// Noch kein auswertbarer Frame
    #[default]
    Searching,
    Open,
    Closed,
}

impl From<GazeState> for MachineState {
    fn from(s: GazeState) -> Self {
        match s {
            GazeState::Open => MachineState::Open,
            GazeState::Closed => MachineState::Closed,
        }
    }
}

/// Kommandos an Audio-Mix und Session-Controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeCommand {
    /// Muffle-Filter Richtung dumpf (true) oder klar (false) rampen
    Muffle(bool),
    /// Scan-Cue ausblenden
    StopScanCue,
    /// Voice-Wiedergabe starten (No-op falls schon aktiv)
    StartVoice { muffled: bool },
    /// Naechsten Clip aus der Playlist waehlen
    PickNextAudio,
}

/// Messwerte eines klassifizierten Frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeReading {
    pub ratio: f32,
    pub yaw: f32,
    pub state: GazeState,
}

/// Ergebnis eines Ticks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tick {
    /// None wenn der Frame verworfen wurde (kein Gesicht)
    pub reading: Option<GazeReading>,
    /// true wenn sich der Zustand gegenueber dem letzten Tick geaendert hat
    pub transitioned: bool,
    pub commands: Vec<GazeCommand>,
}

/// Gaze-Zustandsmaschine, besitzt das Kalibrierungsprofil
pub struct GazeStateMachine {
    profile: CalibrationProfile,
    features: FeatureConfig,
    state: MachineState,
}

impl GazeStateMachine {
    pub fn new(profile: CalibrationProfile, features: FeatureConfig) -> Self {
        Self {
            profile,
            features,
            state: MachineState::Searching,
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    /// Strikt kleiner: Gleichstand zaehlt als OPEN
    pub fn classify(&self, ratio: f32) -> GazeState {
        if ratio < self.profile.threshold {
            GazeState::Closed
        } else {
            GazeState::Open
        }
    }

    /// Verarbeitet einen Erkennungs-Frame
    pub fn step(&mut self, frame: &KeypointFrame, session: &mut SessionState) -> Tick {
        if frame.is_empty() {
            return Tick::default();
        }
        let Some(ratio) = eye_openness_ratio(frame) else {
            trace!("Frame ohne auswertbare Augen verworfen");
            return Tick::default();
        };

        let yaw = head_yaw(frame, self.profile.yaw_baseline, &self.features);
        session.head_rotation = yaw;

        let state = self.classify(ratio);
        let transitioned = self.state != MachineState::from(state);
        if transitioned {
            debug!(?state, ratio, threshold = self.profile.threshold, "Blickzustand gewechselt");
        }
        trace!(ratio, yaw, target = session.target_rotation, ?state, "Gaze-Tick");
        self.state = state.into();

        let mut commands = Vec::with_capacity(3);
        match state {
            GazeState::Open => {
                commands.push(GazeCommand::Muffle(true));
                commands.push(GazeCommand::StopScanCue);
                session.is_connected = false;
                if session.awaiting_next_audio {
                    session.awaiting_next_audio = false;
                    commands.push(GazeCommand::PickNextAudio);
                }
            }
            GazeState::Closed => {
                session.is_connected = true;
                commands.push(GazeCommand::Muffle(false));
                commands.push(GazeCommand::StopScanCue);
                if !session.awaiting_next_audio {
                    commands.push(GazeCommand::StartVoice { muffled: false });
                }
            }
        }

        Tick {
            reading: Some(GazeReading { ratio, yaw, state }),
            transitioned,
            commands,
        }
    }

    /// Ereignis `PlaybackEnded`: der aktive Clip ist zu Ende.
    ///
    /// Gibt true zurueck wenn `awaiting_next_audio` dadurch gesetzt wurde.
    pub fn on_playback_ended(&mut self, session: &mut SessionState) -> bool {
        if session.awaiting_next_audio {
            return false;
        }
        session.awaiting_next_audio = true;
        debug!("Clip beendet, warte auf naechsten OPEN-Frame");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::synthetic_face;

    fn maschine(threshold: f32) -> GazeStateMachine {
        let profile = CalibrationProfile {
            average_open_ratio: 0.32,
            average_closed_ratio: 0.12,
            threshold,
            yaw_baseline: 0.0,
        };
        GazeStateMachine::new(profile, FeatureConfig::default())
    }

    fn sitzung() -> SessionState {
        let mut s = SessionState::new();
        s.begin_experience(0.3);
        s
    }

    #[test]
    fn startzustand_searching() {
        assert_eq!(maschine(0.21).state(), MachineState::Searching);
    }

    #[test]
    fn gleichstand_ist_open() {
        let m = maschine(0.25);
        assert_eq!(m.classify(0.25), GazeState::Open);
        assert_eq!(m.classify(0.2499), GazeState::Closed);
    }

    #[test]
    fn szenario_ratio_0_2_threshold_0_22_ist_closed() {
        let mut m = maschine(0.22);
        let mut s = sitzung();
        let tick = m.step(&synthetic_face(0.2, 0.0), &mut s);
        let reading = tick.reading.unwrap();
        assert!((reading.ratio - 0.2).abs() < 1e-5);
        assert_eq!(reading.state, GazeState::Closed);
        assert_eq!(m.state(), MachineState::Closed);
        assert!(s.is_connected);
    }

    #[test]
    fn closed_kommandos() {
        let mut m = maschine(0.22);
        let mut s = sitzung();
        let tick = m.step(&synthetic_face(0.1, 0.0), &mut s);
        assert!(tick.transitioned);
        assert_eq!(
            tick.commands,
            vec![
                GazeCommand::Muffle(false),
                GazeCommand::StopScanCue,
                GazeCommand::StartVoice { muffled: false },
            ]
        );
    }

    #[test]
    fn open_kommandos_trennen_verbindung() {
        let mut m = maschine(0.22);
        let mut s = sitzung();
        m.step(&synthetic_face(0.1, 0.0), &mut s);
        let tick = m.step(&synthetic_face(0.3, 0.0), &mut s);
        assert!(tick.transitioned);
        assert!(!s.is_connected);
        assert_eq!(
            tick.commands,
            vec![GazeCommand::Muffle(true), GazeCommand::StopScanCue]
        );
    }

    #[test]
    fn leere_frames_aendern_nichts() {
        let mut m = maschine(0.22);
        let mut s = sitzung();
        m.step(&synthetic_face(0.1, 0.0), &mut s);
        for _ in 0..10 {
            let tick = m.step(&KeypointFrame::empty(), &mut s);
            assert_eq!(tick, Tick::default());
            assert_eq!(m.state(), MachineState::Closed);
            assert!(s.is_connected);
        }
    }

    #[test]
    fn wiederholter_zustand_wiederholt_kommandos() {
        let mut m = maschine(0.22);
        let mut s = sitzung();
        let a = m.step(&synthetic_face(0.1, 0.0), &mut s);
        let b = m.step(&synthetic_face(0.1, 0.0), &mut s);
        assert!(a.transitioned);
        assert!(!b.transitioned);
        assert_eq!(a.commands, b.commands);
    }

    #[test]
    fn warten_auf_naechsten_clip_nur_durch_open_geloescht() {
        let mut m = maschine(0.22);
        let mut s = sitzung();
        m.step(&synthetic_face(0.1, 0.0), &mut s);

        assert!(m.on_playback_ended(&mut s));
        assert!(s.awaiting_next_audio);
        // Zweites Ende ohne neuen Clip setzt nichts mehr
        assert!(!m.on_playback_ended(&mut s));

        // CLOSED loescht nicht und startet keine Wiedergabe
        let tick = m.step(&synthetic_face(0.1, 0.0), &mut s);
        assert!(s.awaiting_next_audio);
        assert!(!tick
            .commands
            .iter()
            .any(|c| matches!(c, GazeCommand::StartVoice { .. })));

        // OPEN loescht und fordert naechsten Clip an
        let tick = m.step(&synthetic_face(0.3, 0.0), &mut s);
        assert!(!s.awaiting_next_audio);
        assert!(tick.commands.contains(&GazeCommand::PickNextAudio));

        // Danach startet CLOSED wieder die Wiedergabe
        let tick = m.step(&synthetic_face(0.1, 0.0), &mut s);
        assert!(tick
            .commands
            .contains(&GazeCommand::StartVoice { muffled: false }));
    }

    #[test]
    fn kopfrotation_kalibriert() {
        let mut m = GazeStateMachine::new(
            CalibrationProfile {
                yaw_baseline: 0.25,
                ..CalibrationProfile::default()
            },
            FeatureConfig::default(),
        );
        let mut s = sitzung();
        // nose_offset 50 -> roh 0.375, minus 0.25
        let tick = m.step(&synthetic_face(0.3, 50.0), &mut s);
        assert!((tick.reading.unwrap().yaw - 0.125).abs() < 1e-5);
        assert!((s.head_rotation - 0.125).abs() < 1e-5);
    }

    #[test]
    fn frame_ohne_augen_wird_wie_leer_behandelt() {
        let mut m = maschine(0.22);
        let mut s = sitzung();
        let f = KeypointFrame::from_indexed([(1, crate::keypoints::Point2::new(1.0, 1.0))]);
        assert_eq!(m.step(&f, &mut s), Tick::default());
        assert_eq!(m.state(), MachineState::Searching);
    }
}
