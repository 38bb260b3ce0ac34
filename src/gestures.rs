use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::tracker::{
    HandObservation, INDEX_MCP, INDEX_PIP, INDEX_TIP, MIDDLE_PIP, MIDDLE_TIP, PINKY_PIP,
    PINKY_TIP, RING_PIP, RING_TIP, THUMB_TIP,
};

/// Thumb-to-index distance (normalized) below which a hand is pinching.
pub const DEFAULT_PINCH_THRESHOLD: f32 = 0.06;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    #[default]
    None,
    Point,
    Pinch,
    Fist,
}

impl Gesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Point => "point",
            Self::Pinch => "pinch",
            Self::Fist => "fist",
        }
    }
}

/// Frame-local gesture classification from landmark geometry.
///
/// Stateless: no hysteresis here, the selection state machine absorbs
/// frame-to-frame noise.
#[derive(Debug, Clone, Copy)]
pub struct GestureClassifier {
    pinch_threshold: f32,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PINCH_THRESHOLD)
    }
}

impl GestureClassifier {
    pub fn new(pinch_threshold: f32) -> Self {
        Self { pinch_threshold }
    }

    /// First match wins: pinch, point, fist, otherwise none.
    pub fn classify(&self, obs: &HandObservation) -> EngineResult<Gesture> {
        obs.validate()?;
        let lm = &obs.landmarks;

        if lm[THUMB_TIP].distance(&lm[INDEX_TIP]) < self.pinch_threshold {
            return Ok(Gesture::Pinch);
        }

        // y grows downward; a raised fingertip sits above its joints
        let index = lm[INDEX_TIP].y < lm[INDEX_PIP].y && lm[INDEX_TIP].y < lm[INDEX_MCP].y;
        let middle = lm[MIDDLE_TIP].y < lm[MIDDLE_PIP].y;
        let ring = lm[RING_TIP].y < lm[RING_PIP].y;
        let pinky = lm[PINKY_TIP].y < lm[PINKY_PIP].y;

        if index && !middle && !ring && !pinky {
            return Ok(Gesture::Point);
        }
        if !index && !middle && !ring && !pinky {
            return Ok(Gesture::Fist);
        }
        Ok(Gesture::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::fixtures::{fist, open_palm, pinch, point};
    use crate::tracker::{HandLabel, Point};

    fn classify(obs: &HandObservation) -> Gesture {
        GestureClassifier::default().classify(obs).unwrap()
    }

    #[test]
    fn index_only_is_point() {
        assert_eq!(classify(&point(HandLabel::Left, 0.4, 0.5, 0)), Gesture::Point);
    }

    #[test]
    fn all_curled_is_fist() {
        assert_eq!(classify(&fist(HandLabel::Right, 0.4, 0.5, 0)), Gesture::Fist);
    }

    #[test]
    fn thumb_touching_index_is_pinch() {
        assert_eq!(classify(&pinch(HandLabel::Left, 0.4, 0.5, 0)), Gesture::Pinch);
    }

    #[test]
    fn open_hand_is_none() {
        assert_eq!(classify(&open_palm(HandLabel::Left, 0.4, 0.5, 0)), Gesture::None);
    }

    #[test]
    fn pinch_wins_over_point() {
        // pointing pose whose thumb has drifted onto the index tip
        let mut obs = point(HandLabel::Left, 0.4, 0.5, 0);
        obs.landmarks[THUMB_TIP] = Point::new(0.42, 0.5);
        assert_eq!(classify(&obs), Gesture::Pinch);
    }

    #[test]
    fn pinch_threshold_is_strict() {
        let mut obs = point(HandLabel::Left, 0.4, 0.5, 0);
        obs.landmarks[THUMB_TIP] = Point::new(0.4, 0.5 + DEFAULT_PINCH_THRESHOLD + 0.001);
        assert_eq!(classify(&obs), Gesture::Point);
    }

    #[test]
    fn index_below_its_mcp_is_not_extended() {
        let mut obs = point(HandLabel::Left, 0.4, 0.5, 0);
        obs.landmarks[INDEX_MCP].y = obs.landmarks[INDEX_TIP].y - 0.01;
        // index no longer counts as raised and the rest are curled
        assert_eq!(classify(&obs), Gesture::Fist);
    }

    #[test]
    fn short_observation_is_rejected() {
        let obs = HandObservation::new(HandLabel::Left, vec![Point::new(0.5, 0.5); 5], 0);
        assert!(matches!(
            GestureClassifier::default().classify(&obs),
            Err(EngineError::MalformedObservation { got: 5, .. })
        ));
    }
}
