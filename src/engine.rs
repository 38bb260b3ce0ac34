//! Multi-hand coordinator: the single per-frame entry point.
//!
//! `Engine::process` takes every hand observed in a frame, classifies it,
//! resolves its target, runs that hand's dwell state machine and performs
//! any requested activation against the shared cooldown. Hands are visited
//! in a fixed order, so when two hands activate the same key in one tick
//! the first one wins.

use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::{ConflictResolution, EngineConfig, HandPriority, InputMode, Surface};
use crate::cursor::CursorMapper;
use crate::error::{EngineError, EngineResult};
use crate::gestures::{Gesture, GestureClassifier};
use crate::hit_test::HitTester;
use crate::layout::{KeyLayout, LayoutGeometry};
use crate::selection::{Attempt, AttemptKind, DwellParams, DwellSelection, Outcome, Target};
use crate::tracker::{HandLabel, HandObservation, Point};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationEvent {
    pub key: String,
    pub hand: HandLabel,
    pub timestamp_ms: u64,
    /// Screen position for pointer-surface clicks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}

/// Keys that drive the engine instead of producing events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKey {
    Mode(InputMode),
    Layout(String),
    Quit,
}

impl ControlKey {
    /// `POINT`/`PINCH`/`BOTH`, `QUIT`, or the upper-cased id of a known layout.
    pub fn parse<'a>(label: &str, mut layout_ids: impl Iterator<Item = &'a String>) -> Option<Self> {
        match label {
            "POINT" => return Some(Self::Mode(InputMode::PointOnly)),
            "PINCH" => return Some(Self::Mode(InputMode::PinchOnly)),
            "BOTH" => return Some(Self::Mode(InputMode::Both)),
            "QUIT" => return Some(Self::Quit),
            _ => {}
        }
        if label.chars().count() < 2 {
            return None;
        }
        let lower = label.to_ascii_lowercase();
        layout_ids
            .find(|id| **id == lower)
            .map(|id| Self::Layout(id.clone()))
    }
}

/// A control key applied by a pinch that is still held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldControl {
    pub key: String,
    /// Layout active when the key was applied.
    pub layout: String,
}

/// Mutable engine-wide state, owned by one [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineState {
    pub hands: [DwellSelection; 2],
    pub last_typed_key: Option<String>,
    pub last_typed_ms: u64,
    pub shutdown_requested: bool,
    /// Per hand; cleared when the pinch is released.
    pub held_control: [Option<HeldControl>; 2],
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            hands: [
                DwellSelection::new(HandLabel::Left),
                DwellSelection::new(HandLabel::Right),
            ],
            last_typed_key: None,
            last_typed_ms: 0,
            shutdown_requested: false,
            held_control: [None, None],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandSnapshot {
    pub hand: HandLabel,
    pub present: bool,
    pub gesture: Gesture,
    pub pointing_pos: Option<Point>,
    pub selected_key: Option<String>,
    pub dwell_progress: f32,
    pub cursor: Option<Point>,
}

/// Read-only view for overlays and control panels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub timestamp_ms: u64,
    pub input_mode: InputMode,
    pub layout: String,
    pub surface: Surface,
    pub shutdown_requested: bool,
    pub last_typed_key: Option<String>,
    pub hands: Vec<HandSnapshot>,
    pub config: EngineConfig,
}

pub struct Engine {
    config: EngineConfig,
    classifier: GestureClassifier,
    hit_tester: HitTester,
    layouts: BTreeMap<String, KeyLayout>,
    geometry: LayoutGeometry,
    cursor: CursorMapper,
    state: EngineState,
    last_tick_ms: u64,
}

impl Engine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let layouts: BTreeMap<String, KeyLayout> = KeyLayout::builtin()
            .into_iter()
            .map(|l| (l.id.clone(), l))
            .collect();
        let initial = layouts
            .get(&config.initial_layout)
            .cloned()
            .ok_or_else(|| EngineError::UnknownLayout(config.initial_layout.clone()))?;
        let geometry = LayoutGeometry::new(
            initial,
            config.canvas_width,
            config.canvas_height,
            config.keyboard_scale,
        );
        Ok(Self {
            classifier: GestureClassifier::new(config.pinch_threshold),
            hit_tester: HitTester::new(config.max_hit_distance_px, config.bottom_row_weight),
            layouts,
            geometry,
            cursor: CursorMapper::new(),
            state: EngineState::default(),
            last_tick_ms: 0,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn geometry(&self) -> &LayoutGeometry {
        &self.geometry
    }

    pub fn hand(&self, hand: HandLabel) -> &DwellSelection {
        &self.state.hands[hand.index()]
    }

    pub fn input_mode(&self) -> InputMode {
        self.config.input_mode
    }

    pub fn layout_id(&self) -> &str {
        self.geometry.layout_id()
    }

    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested
    }

    /// Timestamp of the most recent processed frame.
    pub fn last_tick_ms(&self) -> u64 {
        self.last_tick_ms
    }

    /// Swap in a new config between ticks. Invalid configs are rejected and
    /// the current one stays in effect.
    pub fn update_config(&mut self, config: EngineConfig) -> EngineResult<()> {
        let layout_changed = config.initial_layout != self.config.initial_layout;
        let checked = config.validate().and_then(|()| {
            if layout_changed && !self.layouts.contains_key(&config.initial_layout) {
                return Err(EngineError::UnknownLayout(config.initial_layout.clone()));
            }
            Ok(())
        });
        if let Err(e) = checked {
            warn!("config rejected: {e}");
            return Err(e);
        }
        if config.surface != self.config.surface {
            for h in self.state.hands.iter_mut() {
                h.reset();
            }
            self.cursor.reset_all();
        }
        self.classifier = GestureClassifier::new(config.pinch_threshold);
        self.hit_tester = HitTester::new(config.max_hit_distance_px, config.bottom_row_weight);
        self.geometry.set_canvas(config.canvas_width, config.canvas_height);
        self.geometry.set_scale(config.keyboard_scale);
        self.config = config;
        if layout_changed {
            let id = self.config.initial_layout.clone();
            self.set_layout(&id)?;
        }
        info!(
            "config updated: mode={} dwell={}s cooldown={}s",
            self.config.input_mode.as_str(),
            self.config.dwell_duration_sec,
            self.config.same_key_cooldown_sec
        );
        Ok(())
    }

    pub fn set_input_mode(&mut self, mode: InputMode) {
        if self.config.input_mode != mode {
            info!("input mode -> {}", mode.as_str());
            self.config.input_mode = mode;
        }
    }

    pub fn set_canvas(&mut self, width: f32, height: f32) -> EngineResult<()> {
        if !(width > 0.0 && height > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "canvas must be non-empty, got {width}x{height}"
            )));
        }
        self.config.canvas_width = width;
        self.config.canvas_height = height;
        self.geometry.set_canvas(width, height);
        Ok(())
    }

    pub fn register_layout(&mut self, layout: KeyLayout) {
        debug!("registered layout '{}'", layout.id);
        self.layouts.insert(layout.id.clone(), layout);
    }

    pub fn layout_ids(&self) -> impl Iterator<Item = &String> {
        self.layouts.keys()
    }

    pub fn set_layout(&mut self, id: &str) -> EngineResult<()> {
        let layout = self
            .layouts
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownLayout(id.to_string()))?;
        if self.geometry.layout_id() != id {
            info!("layout -> {id}");
        }
        self.geometry.set_layout(layout);
        self.geometry.refresh();
        Ok(())
    }

    /// Run one frame. Never fails: bad hands are dropped and logged.
    pub fn process(&mut self, observations: &[HandObservation], now_ms: u64) -> Vec<ActivationEvent> {
        self.last_tick_ms = now_ms;
        self.geometry.refresh();
        let params = DwellParams::from_config(&self.config);

        let retained = self.select_hands(observations);
        let mut seen = [false; 2];
        for (obs, _) in &retained {
            seen[obs.hand.index()] = true;
        }
        for hand in HandLabel::ALL {
            if !seen[hand.index()] {
                self.state.hands[hand.index()].on_absent(now_ms, &params);
                self.state.held_control[hand.index()] = None;
                self.cursor.reset(hand);
            }
        }

        let mut events = Vec::new();
        for (obs, gesture) in retained {
            // control keys may change mode or layout mid-tick
            let params = DwellParams::from_config(&self.config);
            let (pos, target) = self.resolve_target(obs);

            let hand = obs.hand;
            if gesture != Gesture::Pinch {
                self.state.held_control[hand.index()] = None;
            }
            let attempt = self.state.hands[hand.index()].step(gesture, pos, target, now_ms, &params);
            if let Some(attempt) = attempt {
                let blocked = !self.config.simultaneous_typing && !events.is_empty();
                let outcome = if blocked {
                    debug!(
                        "{}: '{}' held back, one activation per tick",
                        hand.as_str(),
                        attempt.target.key()
                    );
                    Outcome::Suppressed
                } else {
                    self.activate(&attempt, now_ms, &mut events)
                };
                self.state.hands[hand.index()].resolve(&attempt, outcome);
            }
        }
        events
    }

    /// Classify, filter by priority, order by conflict policy.
    fn select_hands<'o>(
        &self,
        observations: &'o [HandObservation],
    ) -> Vec<(&'o HandObservation, Gesture)> {
        let mut out: Vec<(&HandObservation, Gesture)> = Vec::with_capacity(2);
        for obs in observations {
            let allowed = match self.config.hand_priority {
                HandPriority::Both => true,
                HandPriority::LeftOnly => obs.hand == HandLabel::Left,
                HandPriority::RightOnly => obs.hand == HandLabel::Right,
            };
            if !allowed {
                continue;
            }
            if out.iter().any(|(o, _)| o.hand == obs.hand) {
                debug!("duplicate {} hand in frame; keeping the first", obs.hand.as_str());
                continue;
            }
            let gesture = match obs.validate() {
                Ok(()) => match obs.gesture {
                    Some(g) => g,
                    None => match self.classifier.classify(obs) {
                        Ok(g) => g,
                        Err(e) => {
                            warn!("dropping observation: {e}");
                            continue;
                        }
                    },
                },
                Err(e) => {
                    warn!("dropping observation: {e}");
                    continue;
                }
            };
            out.push((obs, gesture));
        }

        match self.config.conflict_resolution {
            ConflictResolution::LeftFirst => out.sort_by_key(|(o, _)| o.hand.index()),
            ConflictResolution::RightFirst => out.sort_by_key(|(o, _)| 1 - o.hand.index()),
            ConflictResolution::FirstDetected => {}
        }
        if !self.config.multi_hand_enabled {
            out.truncate(1);
        }
        out
    }

    fn resolve_target(&mut self, obs: &HandObservation) -> (Option<Point>, Option<Target>) {
        let Some(tip) = obs.index_tip() else {
            return (None, None);
        };
        match self.config.surface {
            Surface::Keyboard => {
                let pos = Point::new(
                    tip.x * self.config.canvas_width,
                    tip.y * self.config.canvas_height,
                );
                let target = self
                    .hit_tester
                    .hit(&self.geometry, pos)
                    .map(|hb| Target::Key(hb.key.clone()));
                (Some(pos), target)
            }
            Surface::Pointer => {
                let p = self.cursor.update(obs.hand, tip, &self.config.cursor);
                (Some(p), Some(Target::Cursor(p)))
            }
        }
    }

    fn activate(
        &mut self,
        attempt: &Attempt,
        now_ms: u64,
        events: &mut Vec<ActivationEvent>,
    ) -> Outcome {
        let key = attempt.target.key();

        if let Target::Key(label) = &attempt.target {
            if let Some(ctrl) = ControlKey::parse(label, self.layouts.keys()) {
                if attempt.kind == AttemptKind::Pinch {
                    if self.control_is_held(attempt.hand, label) {
                        return Outcome::Handled;
                    }
                    self.state.held_control[attempt.hand.index()] = Some(HeldControl {
                        key: label.clone(),
                        layout: self.layout_id().to_string(),
                    });
                }
                self.apply_control(ctrl, attempt.hand);
                return Outcome::Handled;
            }
            if !self.geometry.layout().contains(label) {
                warn!("{}", EngineError::UnknownKey(label.clone()));
                return Outcome::Rejected;
            }
        }

        let cooldown_ms = self.config.same_key_cooldown_sec * 1000.0;
        if self.state.last_typed_key.as_deref() == Some(key) {
            let since = now_ms.saturating_sub(self.state.last_typed_ms) as f64;
            if since < cooldown_ms {
                debug!(
                    "{}: '{}' suppressed, {:.0}ms into cooldown",
                    attempt.hand.as_str(),
                    key,
                    since
                );
                return Outcome::Suppressed;
            }
        }

        info!("{}: activate '{}'", attempt.hand.as_str(), key);
        events.push(ActivationEvent {
            key: key.to_string(),
            hand: attempt.hand,
            timestamp_ms: now_ms,
            position: attempt.target.position(),
        });
        self.state.last_typed_key = Some(key.to_string());
        self.state.last_typed_ms = now_ms;
        self.state.held_control[attempt.hand.index()] = None;
        Outcome::Emitted
    }

    /// A held pinch applies a control key once. Moving onto another control
    /// key applies it, unless the held one already switched the layout under
    /// the fingertip.
    fn control_is_held(&self, hand: HandLabel, label: &str) -> bool {
        self.state.held_control[hand.index()]
            .as_ref()
            .is_some_and(|held| held.key == label || held.layout != self.layout_id())
    }

    fn apply_control(&mut self, ctrl: ControlKey, hand: HandLabel) {
        info!("{}: control key {:?}", hand.as_str(), ctrl);
        match ctrl {
            ControlKey::Mode(m) => self.set_input_mode(m),
            ControlKey::Layout(id) => {
                if let Err(e) = self.set_layout(&id) {
                    warn!("layout switch failed: {e}");
                }
            }
            ControlKey::Quit => self.state.shutdown_requested = true,
        }
    }

    pub fn snapshot(&self, now_ms: u64) -> EngineSnapshot {
        let dwell_ms = self.config.dwell_duration_sec * 1000.0;
        let hands = self
            .state
            .hands
            .iter()
            .map(|h| {
                let st = h.state();
                HandSnapshot {
                    hand: h.hand(),
                    present: st.present,
                    gesture: st.gesture,
                    pointing_pos: st.pointing_pos,
                    selected_key: st.selected_key().map(str::to_string),
                    dwell_progress: h.dwell_progress(now_ms, dwell_ms),
                    cursor: self.cursor.position(h.hand()),
                }
            })
            .collect();
        EngineSnapshot {
            timestamp_ms: now_ms,
            input_mode: self.config.input_mode,
            layout: self.geometry.layout_id().to_string(),
            surface: self.config.surface,
            shutdown_requested: self.state.shutdown_requested,
            last_typed_key: self.state.last_typed_key.clone(),
            hands,
            config: self.config.clone(),
        }
    }
}
