//! Per-hand dwell selection.
//!
//! Each hand is Idle or holds a Candidate target. Sustained pointing on the
//! same target for the dwell duration asks for an activation; a pinch asks
//! immediately. The state machine never activates anything itself: it hands
//! an [`Attempt`] to the caller and is told the [`Outcome`].

use log::debug;
use serde::Serialize;

use crate::config::{EngineConfig, InputMode};
use crate::gestures::Gesture;
use crate::tracker::{HandLabel, Point};

/// Key reported for activations on the pointer surface.
pub const CLICK: &str = "CLICK";

/// What a hand is aiming at.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A discrete key on the active layout.
    Key(String),
    /// A screen position on the pointer surface.
    Cursor(Point),
}

impl Target {
    pub fn key(&self) -> &str {
        match self {
            Self::Key(k) => k,
            Self::Cursor(_) => CLICK,
        }
    }

    pub fn position(&self) -> Option<Point> {
        match self {
            Self::Key(_) => None,
            Self::Cursor(p) => Some(*p),
        }
    }

    /// Whether `other` continues a dwell on `self`. Cursors may drift up
    /// to `radius` px from where the dwell started.
    pub fn same_as(&self, other: &Target, radius: f32) -> bool {
        match (self, other) {
            (Self::Key(a), Self::Key(b)) => a == b,
            (Self::Cursor(a), Self::Cursor(b)) => a.distance(b) <= radius,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Dwell,
    Pinch,
}

/// An activation the state machine wants to perform this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub hand: HandLabel,
    pub target: Target,
    pub kind: AttemptKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// An activation event was emitted.
    Emitted,
    /// A control key was applied.
    Handled,
    /// Blocked by cooldown; retry next tick.
    Suppressed,
    /// Target is not on the active layout.
    Rejected,
}

/// Timing and mode knobs, copied out of the config once per tick.
#[derive(Debug, Clone, Copy)]
pub struct DwellParams {
    pub dwell_ms: f64,
    pub grace_ms: f64,
    pub cursor_radius_px: f32,
    pub mode: InputMode,
}

impl DwellParams {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            dwell_ms: cfg.dwell_duration_sec * 1000.0,
            grace_ms: cfg.lost_hand_grace_sec * 1000.0,
            cursor_radius_px: cfg.cursor.dwell_radius_px,
            mode: cfg.input_mode,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandSelectionState {
    pub present: bool,
    pub gesture: Gesture,
    pub pointing_pos: Option<Point>,
    pub candidate: Option<Target>,
    pub selection_start_ms: u64,
    /// Last tick this hand pointed or pinched at a target.
    pub last_gesture_ms: u64,
}

impl HandSelectionState {
    pub fn selected_key(&self) -> Option<&str> {
        self.candidate.as_ref().map(Target::key)
    }
}

#[derive(Debug, Clone)]
pub struct DwellSelection {
    hand: HandLabel,
    state: HandSelectionState,
}

impl DwellSelection {
    pub fn new(hand: HandLabel) -> Self {
        Self {
            hand,
            state: HandSelectionState::default(),
        }
    }

    pub fn hand(&self) -> HandLabel {
        self.hand
    }

    pub fn state(&self) -> &HandSelectionState {
        &self.state
    }

    pub fn selected_key(&self) -> Option<&str> {
        self.state.selected_key()
    }

    /// Fraction of the dwell completed, in `[0, 1]`.
    pub fn dwell_progress(&self, now_ms: u64, dwell_ms: f64) -> f32 {
        if self.state.candidate.is_none() || dwell_ms <= 0.0 {
            return 0.0;
        }
        let elapsed = now_ms.saturating_sub(self.state.selection_start_ms) as f64;
        (elapsed / dwell_ms).clamp(0.0, 1.0) as f32
    }

    /// Back to Idle, keeping the observed gesture and position.
    pub fn clear(&mut self) {
        if let Some(prev) = self.state.candidate.take() {
            debug!("{}: cleared selection '{}'", self.hand.as_str(), prev.key());
        }
        self.state.selection_start_ms = 0;
    }

    /// Full reset to start-of-engine defaults.
    pub fn reset(&mut self) {
        self.state = HandSelectionState::default();
    }

    /// The hand was not observed (or filtered out) this tick.
    pub fn on_absent(&mut self, now_ms: u64, params: &DwellParams) {
        self.state.present = false;
        self.expire_grace(now_ms, params);
    }

    /// One frame of input for this hand.
    pub fn step(
        &mut self,
        gesture: Gesture,
        pointing_pos: Option<Point>,
        target: Option<Target>,
        now_ms: u64,
        params: &DwellParams,
    ) -> Option<Attempt> {
        self.state.present = true;
        self.state.gesture = gesture;
        self.state.pointing_pos = pointing_pos;

        match (gesture, target) {
            (Gesture::Fist, _) => {
                self.clear();
                None
            }
            (Gesture::Point, Some(t)) if params.mode.allows_point() => {
                self.state.last_gesture_ms = now_ms;
                let continues = self
                    .state
                    .candidate
                    .as_ref()
                    .is_some_and(|c| c.same_as(&t, params.cursor_radius_px));

                if !continues {
                    debug!("{}: candidate '{}'", self.hand.as_str(), t.key());
                    self.state.candidate = Some(t);
                    self.state.selection_start_ms = now_ms;
                    return None;
                }

                let elapsed = now_ms.saturating_sub(self.state.selection_start_ms) as f64;
                if elapsed >= params.dwell_ms {
                    Some(Attempt {
                        hand: self.hand,
                        target: t,
                        kind: AttemptKind::Dwell,
                    })
                } else {
                    None
                }
            }
            (Gesture::Pinch, Some(t)) if params.mode.allows_pinch() => {
                self.state.last_gesture_ms = now_ms;
                self.clear();
                Some(Attempt {
                    hand: self.hand,
                    target: t,
                    kind: AttemptKind::Pinch,
                })
            }
            _ => {
                // no usable target this frame; hold the selection through the grace window
                self.expire_grace(now_ms, params);
                None
            }
        }
    }

    /// Apply the result of an [`Attempt`] returned by [`step`](Self::step).
    pub fn resolve(&mut self, attempt: &Attempt, outcome: Outcome) {
        match (attempt.kind, outcome) {
            // keep retrying with the original start time
            (AttemptKind::Dwell, Outcome::Suppressed) => {}
            (AttemptKind::Dwell, _) => self.clear(),
            (AttemptKind::Pinch, _) => {}
        }
    }

    /// Drop the candidate once the hand has gone longer than the grace
    /// window without pointing or pinching at a target. The window runs from
    /// `last_gesture_ms`, not `selection_start_ms`, so a hand that vanishes
    /// for less than the grace window keeps its selection even when the
    /// dwell itself is longer.
    fn expire_grace(&mut self, now_ms: u64, params: &DwellParams) {
        if self.state.candidate.is_none() {
            return;
        }
        let idle = now_ms.saturating_sub(self.state.last_gesture_ms) as f64;
        if idle > params.grace_ms {
            debug!(
                "{}: grace expired after {:.0}ms",
                self.hand.as_str(),
                idle
            );
            self.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: InputMode) -> DwellParams {
        DwellParams {
            dwell_ms: 2000.0,
            grace_ms: 3000.0,
            cursor_radius_px: 30.0,
            mode,
        }
    }

    fn key(k: &str) -> Option<Target> {
        Some(Target::Key(k.to_string()))
    }

    fn point_at(sel: &mut DwellSelection, k: &str, t: u64, p: &DwellParams) -> Option<Attempt> {
        sel.step(Gesture::Point, None, key(k), t, p)
    }

    #[test]
    fn starts_idle() {
        let sel = DwellSelection::new(HandLabel::Left);
        assert_eq!(sel.selected_key(), None);
        assert_eq!(sel.state(), &HandSelectionState::default());
    }

    #[test]
    fn dwell_requests_activation_after_duration() {
        let p = params(InputMode::Both);
        let mut sel = DwellSelection::new(HandLabel::Left);
        assert!(point_at(&mut sel, "A", 0, &p).is_none());
        assert_eq!(sel.selected_key(), Some("A"));
        assert!(point_at(&mut sel, "A", 1999, &p).is_none());

        let attempt = point_at(&mut sel, "A", 2000, &p).unwrap();
        assert_eq!(attempt.kind, AttemptKind::Dwell);
        assert_eq!(attempt.target, Target::Key("A".into()));

        sel.resolve(&attempt, Outcome::Emitted);
        assert_eq!(sel.selected_key(), None);
    }

    #[test]
    fn switching_keys_restarts_the_dwell() {
        let p = params(InputMode::Both);
        let mut sel = DwellSelection::new(HandLabel::Right);
        point_at(&mut sel, "A", 0, &p);
        point_at(&mut sel, "S", 1500, &p);
        assert_eq!(sel.state().selection_start_ms, 1500);
        assert!(point_at(&mut sel, "S", 3000, &p).is_none());
        assert!(point_at(&mut sel, "S", 3500, &p).is_some());
    }

    #[test]
    fn suppressed_dwell_keeps_start_time_and_retries() {
        let p = params(InputMode::Both);
        let mut sel = DwellSelection::new(HandLabel::Left);
        point_at(&mut sel, "A", 0, &p);
        let a = point_at(&mut sel, "A", 2000, &p).unwrap();
        sel.resolve(&a, Outcome::Suppressed);
        assert_eq!(sel.selected_key(), Some("A"));
        assert_eq!(sel.state().selection_start_ms, 0);
        assert!(point_at(&mut sel, "A", 2033, &p).is_some());
    }

    #[test]
    fn fist_clears_any_state() {
        let p = params(InputMode::Both);
        let mut sel = DwellSelection::new(HandLabel::Left);
        point_at(&mut sel, "A", 0, &p);
        assert!(sel.step(Gesture::Fist, None, key("A"), 10, &p).is_none());
        assert_eq!(sel.selected_key(), None);
        assert_eq!(sel.state().gesture, Gesture::Fist);
    }

    #[test]
    fn pinch_requests_immediately_and_returns_to_idle() {
        let p = params(InputMode::PinchOnly);
        let mut sel = DwellSelection::new(HandLabel::Left);
        let a = sel.step(Gesture::Pinch, None, key("SPACE"), 5, &p).unwrap();
        assert_eq!(a.kind, AttemptKind::Pinch);
        sel.resolve(&a, Outcome::Suppressed);
        assert_eq!(sel.selected_key(), None);
    }

    #[test]
    fn pinch_drops_an_in_progress_dwell() {
        let p = params(InputMode::Both);
        let mut sel = DwellSelection::new(HandLabel::Left);
        point_at(&mut sel, "A", 0, &p);
        let a = sel.step(Gesture::Pinch, None, key("B"), 100, &p).unwrap();
        assert_eq!(a.target.key(), "B");
        assert_eq!(sel.selected_key(), None);
    }

    #[test]
    fn disallowed_gestures_do_not_transition() {
        let p = params(InputMode::PinchOnly);
        let mut sel = DwellSelection::new(HandLabel::Left);
        assert!(point_at(&mut sel, "A", 0, &p).is_none());
        assert_eq!(sel.selected_key(), None);

        let p = params(InputMode::PointOnly);
        assert!(sel.step(Gesture::Pinch, None, key("A"), 10, &p).is_none());
        assert_eq!(sel.selected_key(), None);
    }

    #[test]
    fn selection_survives_short_dropouts() {
        let p = params(InputMode::Both);
        let mut sel = DwellSelection::new(HandLabel::Left);
        point_at(&mut sel, "A", 0, &p);
        sel.step(Gesture::None, None, None, 2900, &p);
        assert_eq!(sel.selected_key(), Some("A"));
        // pointing off the keyboard counts as a dropout too
        sel.step(Gesture::Point, None, None, 3000, &p);
        assert_eq!(sel.selected_key(), Some("A"));
        sel.step(Gesture::None, None, None, 3001, &p);
        assert_eq!(sel.selected_key(), None);
    }

    #[test]
    fn absent_hand_uses_the_same_grace_rule() {
        let p = params(InputMode::Both);
        let mut sel = DwellSelection::new(HandLabel::Right);
        point_at(&mut sel, "A", 1000, &p);
        sel.on_absent(3500, &p);
        assert!(!sel.state().present);
        assert_eq!(sel.selected_key(), Some("A"));
        sel.on_absent(4001, &p);
        assert_eq!(sel.selected_key(), None);
    }

    #[test]
    fn dwell_progress_is_clamped() {
        let p = params(InputMode::Both);
        let mut sel = DwellSelection::new(HandLabel::Left);
        assert_eq!(sel.dwell_progress(500, p.dwell_ms), 0.0);
        point_at(&mut sel, "A", 1000, &p);
        assert_eq!(sel.dwell_progress(2000, p.dwell_ms), 0.5);
        assert_eq!(sel.dwell_progress(9000, p.dwell_ms), 1.0);
    }

    #[test]
    fn cursor_dwell_tolerates_small_drift() {
        let p = params(InputMode::Both);
        let mut sel = DwellSelection::new(HandLabel::Left);
        let at = |x: f32| Some(Target::Cursor(Point::new(x, 100.0)));

        sel.step(Gesture::Point, None, at(100.0), 0, &p);
        sel.step(Gesture::Point, None, at(120.0), 1000, &p);
        let a = sel.step(Gesture::Point, None, at(125.0), 2000, &p).unwrap();
        assert_eq!(a.target.key(), CLICK);
        assert_eq!(a.target.position(), Some(Point::new(125.0, 100.0)));

        sel.resolve(&a, Outcome::Emitted);
        sel.step(Gesture::Point, None, at(100.0), 2100, &p);
        // drifting past the radius starts over
        sel.step(Gesture::Point, None, at(200.0), 3000, &p);
        assert_eq!(sel.state().selection_start_ms, 3000);
    }
}
