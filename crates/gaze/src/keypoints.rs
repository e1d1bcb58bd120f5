//! Keypoint-Frames des Landmark-Detektors
//!
//! Ein Frame ist eine indexadressierte Liste von 2-D-Punkten (feste
//! Landmark-Indizes, MediaPipe Face Mesh). Leer wenn kein Gesicht gefunden.

use serde::{Deserialize, Serialize};

/// 2-D-Punkt in Bildkoordinaten
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euklidischer Abstand
    pub fn distance(&self, other: &Point2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Keypoints eines Gesichts in einem Detektor-Aufruf
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeypointFrame {
    points: Vec<Option<Point2>>,
}

impl KeypointFrame {
    /// Leerer Frame (kein Gesicht)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Dichter Frame: Index = Landmark-Nummer
    pub fn new(points: Vec<Point2>) -> Self {
        Self {
            points: points.into_iter().map(Some).collect(),
        }
    }

    /// Duenner Frame aus (Index, Punkt)-Paaren; Luecken bleiben unbesetzt
    pub fn from_indexed(entries: impl IntoIterator<Item = (usize, Point2)>) -> Self {
        let mut points: Vec<Option<Point2>> = Vec::new();
        for (index, p) in entries {
            if index >= points.len() {
                points.resize(index + 1, None);
            }
            points[index] = Some(p);
        }
        Self { points }
    }

    /// Setzt einen einzelnen Landmark (Frame waechst bei Bedarf)
    pub fn set(&mut self, index: usize, p: Point2) {
        if index >= self.points.len() {
            self.points.resize(index + 1, None);
        }
        self.points[index] = Some(p);
    }

    pub fn get(&self, index: usize) -> Option<Point2> {
        self.points.get(index).copied().flatten()
    }

    /// true wenn kein Gesicht erkannt wurde
    pub fn is_empty(&self) -> bool {
        self.points.iter().all(Option::is_none)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leerer_frame() {
        assert!(KeypointFrame::empty().is_empty());
        assert!(KeypointFrame::from_indexed([]).is_empty());
    }

    #[test]
    fn duenner_frame_adressierbar() {
        let f = KeypointFrame::from_indexed([(5, Point2::new(1.0, 2.0))]);
        assert_eq!(f.len(), 6);
        assert_eq!(f.get(5), Some(Point2::new(1.0, 2.0)));
        assert_eq!(f.get(4), None);
        assert_eq!(f.get(500), None);
        assert!(!f.is_empty());
    }

    #[test]
    fn abstand() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn frame_json_mit_luecken() {
        let f: KeypointFrame = serde_json::from_str(r#"[null, {"x": 1.0, "y": 2.0}]"#).unwrap();
        assert_eq!(f.get(1), Some(Point2::new(1.0, 2.0)));
        assert_eq!(f.get(0), None);
    }
}
