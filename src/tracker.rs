//! Hand observations as delivered by the external hand tracker.
//!
//! One observation per detected hand per frame: a handedness label plus the
//! 21 normalized landmark points of the tracker's hand model. Frames arrive
//! as JSON lines (`{"timestamp_ms": .., "hands": [..]}`).

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::gestures::Gesture;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandLabel {
    #[serde(alias = "left", alias = "LEFT")]
    Left,
    #[serde(alias = "right", alias = "RIGHT")]
    Right,
}

impl HandLabel {
    pub const ALL: [HandLabel; 2] = [HandLabel::Left, HandLabel::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

/// A 2D point. Normalized `[0,1]` for landmarks, pixels once projected.
///
/// Deserializes from `[x, y]` or `[x, y, z]` (depth is ignored).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl TryFrom<Vec<f32>> for Point {
    type Error = String;

    fn try_from(v: Vec<f32>) -> Result<Self, Self::Error> {
        match v.as_slice() {
            [x, y] | [x, y, _] => Ok(Point::new(*x, *y)),
            other => Err(format!(
                "landmark must have 2 or 3 coordinates, got {}",
                other.len()
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HandObservation {
    pub hand: HandLabel,
    pub landmarks: Vec<Point>,
    /// Set when the tracker already classified the hand.
    #[serde(default)]
    pub gesture: Option<Gesture>,
    // filled from the enclosing frame when the tracker omits it
    #[serde(default)]
    pub timestamp_ms: u64,
}

impl HandObservation {
    pub fn new(hand: HandLabel, landmarks: Vec<Point>, timestamp_ms: u64) -> Self {
        Self {
            hand,
            landmarks,
            gesture: None,
            timestamp_ms,
        }
    }

    pub fn with_gesture(mut self, gesture: Gesture) -> Self {
        self.gesture = Some(gesture);
        self
    }

    /// Rejects observations the classifier cannot index safely.
    pub fn validate(&self) -> EngineResult<()> {
        if self.landmarks.len() < LANDMARK_COUNT {
            return Err(EngineError::MalformedObservation {
                hand: self.hand,
                expected: LANDMARK_COUNT,
                got: self.landmarks.len(),
            });
        }
        if !self.landmarks.iter().all(Point::is_finite) {
            return Err(EngineError::MalformedObservation {
                hand: self.hand,
                expected: LANDMARK_COUNT,
                got: self.landmarks.iter().filter(|p| p.is_finite()).count(),
            });
        }
        Ok(())
    }

    pub fn landmark(&self, idx: usize) -> Option<Point> {
        self.landmarks.get(idx).copied()
    }

    /// The index fingertip, which drives pointing.
    pub fn index_tip(&self) -> Option<Point> {
        self.landmark(INDEX_TIP)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Frame {
    pub timestamp_ms: u64,
    #[serde(default)]
    pub hands: Vec<HandObservation>,
}

impl Frame {
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        let mut frame: Frame = serde_json::from_str(line)?;
        for h in frame.hands.iter_mut() {
            if h.timestamp_ms == 0 {
                h.timestamp_ms = frame.timestamp_ms;
            }
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_and_inherits_timestamp() {
        let pts: Vec<String> = (0..LANDMARK_COUNT).map(|_| "[0.5,0.5,0.0]".into()).collect();
        let line = format!(
            r#"{{"timestamp_ms": 1234, "hands": [{{"hand": "Left", "landmarks": [{}]}}]}}"#,
            pts.join(",")
        );
        let frame = Frame::from_json_line(&line).unwrap();
        assert_eq!(frame.hands.len(), 1);
        assert_eq!(frame.hands[0].hand, HandLabel::Left);
        assert_eq!(frame.hands[0].timestamp_ms, 1234);
        assert!(frame.hands[0].validate().is_ok());
    }

    #[test]
    fn pre_classified_gesture_is_parsed() {
        let line = r#"{"timestamp_ms": 9, "hands": [{"hand": "Left", "gesture": "pinch", "landmarks": []}]}"#;
        let frame = Frame::from_json_line(line).unwrap();
        assert_eq!(frame.hands[0].gesture, Some(Gesture::Pinch));
    }

    #[test]
    fn lowercase_hand_labels_are_accepted() {
        let line = r#"{"timestamp_ms": 5, "hands": [{"hand": "right", "landmarks": []}]}"#;
        let frame = Frame::from_json_line(line).unwrap();
        assert_eq!(frame.hands[0].hand, HandLabel::Right);
    }

    #[test]
    fn short_landmark_list_is_malformed() {
        let obs = HandObservation::new(HandLabel::Right, vec![Point::new(0.1, 0.1); 20], 0);
        assert_eq!(
            obs.validate(),
            Err(EngineError::MalformedObservation {
                hand: HandLabel::Right,
                expected: LANDMARK_COUNT,
                got: 20
            })
        );
    }

    #[test]
    fn non_finite_landmark_is_malformed() {
        let mut pts = vec![Point::new(0.1, 0.1); LANDMARK_COUNT];
        pts[3] = Point::new(f32::NAN, 0.2);
        let obs = HandObservation::new(HandLabel::Left, pts, 0);
        assert!(obs.validate().is_err());
    }

    #[test]
    fn point_with_one_coordinate_is_rejected() {
        let line = r#"{"timestamp_ms": 5, "hands": [{"hand": "Left", "landmarks": [[0.1]]}]}"#;
        assert!(Frame::from_json_line(line).is_err());
    }
}
