//! Biometrische Merkmale aus Keypoints
//!
//! Reine Funktionen: Augen-Oeffnungsverhaeltnis (vertikaler Lidabstand /
//! horizontaler Augenwinkelabstand, gemittelt ueber beide Augen) und
//! Kopf-Gierwinkel aus Nasenposition relativ zu den Wangen.

use serde::{Deserialize, Serialize};

use crate::keypoints::{KeypointFrame, Point2};

/// Feste Landmark-Indizes (MediaPipe Face Mesh)
pub mod landmarks {
    pub const LEFT_EYE_OUTER: usize = 33;
    pub const LEFT_EYE_INNER: usize = 133;
    pub const LEFT_EYE_TOP: usize = 159;
    pub const LEFT_EYE_BOTTOM: usize = 145;
    pub const RIGHT_EYE_INNER: usize = 362;
    pub const RIGHT_EYE_OUTER: usize = 263;
    pub const RIGHT_EYE_TOP: usize = 386;
    pub const RIGHT_EYE_BOTTOM: usize = 374;
    pub const LEFT_CHEEK: usize = 454;
    pub const RIGHT_CHEEK: usize = 234;
    pub const NOSE_TIP: usize = 1;
}

/// Konfiguration der Merkmals-Extraktion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Daempft den Gierwinkel: groesserer Wert = weniger Drehung noetig
    pub yaw_sensitivity: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            yaw_sensitivity: 1.5,
        }
    }
}

/// Augen-Oeffnungsverhaeltnis eines Frames.
///
/// `None` wenn ein benoetigter Landmark fehlt oder die Geometrie entartet ist
/// (Augenwinkel fallen zusammen). Aufrufer behandeln das wie "kein Gesicht".
pub fn eye_openness_ratio(frame: &KeypointFrame) -> Option<f32> {
    use landmarks::*;

    let left = eye_ratio(
        frame,
        (LEFT_EYE_TOP, LEFT_EYE_BOTTOM),
        (LEFT_EYE_OUTER, LEFT_EYE_INNER),
    )?;
    let right = eye_ratio(
        frame,
        (RIGHT_EYE_TOP, RIGHT_EYE_BOTTOM),
        (RIGHT_EYE_INNER, RIGHT_EYE_OUTER),
    )?;
    Some((left + right) / 2.0)
}

fn eye_ratio(frame: &KeypointFrame, vertical: (usize, usize), horizontal: (usize, usize)) -> Option<f32> {
    let v = frame.get(vertical.0)?.distance(&frame.get(vertical.1)?);
    let h = frame.get(horizontal.0)?.distance(&frame.get(horizontal.1)?);
    if h <= f32::EPSILON {
        return None;
    }
    let ratio = v / h;
    ratio.is_finite().then_some(ratio)
}

/// Unkalibrierter Gierwinkel: `((nase.x - wangenmitte) / wangenbreite) * sensitivity`
pub fn raw_head_yaw(frame: &KeypointFrame, config: &FeatureConfig) -> f32 {
    use landmarks::*;

    // Fehlende Wange -> aeusserer Augenwinkel derselben Seite
    let left = frame.get(LEFT_CHEEK).or_else(|| frame.get(LEFT_EYE_OUTER));
    let right = frame.get(RIGHT_CHEEK).or_else(|| frame.get(RIGHT_EYE_OUTER));
    let (Some(left), Some(right), Some(nose)) = (left, right, frame.get(NOSE_TIP)) else {
        return 0.0;
    };

    let mid = (left.x + right.x) / 2.0;
    let width = (left.x - right.x).abs();
    if width <= f32::EPSILON {
        return 0.0;
    }
    ((nose.x - mid) / width) * config.yaw_sensitivity
}

/// Kalibrierter Gierwinkel (Rohwert minus Nullpunkt)
pub fn head_yaw(frame: &KeypointFrame, baseline: f32, config: &FeatureConfig) -> f32 {
    raw_head_yaw(frame, config) - baseline
}

/// Minimaler synthetischer Gesichts-Frame mit genau den ausgewerteten Landmarks.
///
/// `openness` ist das resultierende Oeffnungsverhaeltnis beider Augen,
/// `nose_offset` die horizontale Nasenverschiebung gegen die Wangenmitte
/// (Wangenbreite 200). Fuer Replay-Aufnahmen und Tests.
pub fn synthetic_face(openness: f32, nose_offset: f32) -> KeypointFrame {
    use landmarks::*;

    let half_lid = 20.0 * openness;
    KeypointFrame::from_indexed([
        (LEFT_EYE_OUTER, Point2::new(100.0, 100.0)),
        (LEFT_EYE_INNER, Point2::new(140.0, 100.0)),
        (LEFT_EYE_TOP, Point2::new(120.0, 100.0 - half_lid)),
        (LEFT_EYE_BOTTOM, Point2::new(120.0, 100.0 + half_lid)),
        (RIGHT_EYE_INNER, Point2::new(160.0, 100.0)),
        (RIGHT_EYE_OUTER, Point2::new(200.0, 100.0)),
        (RIGHT_EYE_TOP, Point2::new(180.0, 100.0 - half_lid)),
        (RIGHT_EYE_BOTTOM, Point2::new(180.0, 100.0 + half_lid)),
        (LEFT_CHEEK, Point2::new(50.0, 150.0)),
        (RIGHT_CHEEK, Point2::new(250.0, 150.0)),
        (NOSE_TIP, Point2::new(150.0 + nose_offset, 140.0)),
    ])
}
