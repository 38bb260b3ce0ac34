use airkeys::config::Surface;
use airkeys::engine::{ActivationEvent, EngineSnapshot};
use airkeys::selection::CLICK;
use airkeys::tracker::{HandLabel, Point};
use anyhow::Result;

use crate::actions::UinputSink;

pub fn dispatch_event(ev: &ActivationEvent, sink: &mut UinputSink) -> Result<()> {
    if ev.key == CLICK {
        return sink.click_left();
    }
    sink.type_key(&ev.key)
}

/// Drives the system pointer from the engine's smoothed cursor using
/// relative moves. Sticks with one hand while it stays present.
#[derive(Debug, Default)]
pub struct CursorFollower {
    hand: Option<HandLabel>,
    last: Option<Point>,
}

impl CursorFollower {
    /// Delta to apply for this frame, if the pointer surface has a cursor.
    pub fn delta(&mut self, snap: &EngineSnapshot) -> Option<(i32, i32)> {
        if snap.surface != Surface::Pointer {
            self.hand = None;
            self.last = None;
            return None;
        }
        let tracked = |hand: HandLabel| {
            snap.hands
                .iter()
                .find(|h| h.hand == hand && h.present)
                .and_then(|h| h.cursor)
        };
        let current = self.hand.and_then(|hand| tracked(hand).map(|c| (hand, c)));
        let Some((hand, cur)) = current.or_else(|| {
            snap.hands
                .iter()
                .filter(|h| h.present)
                .find_map(|h| h.cursor.map(|c| (h.hand, c)))
        }) else {
            self.hand = None;
            self.last = None;
            return None;
        };
        if self.hand != Some(hand) {
            // a different hand takes over; anchor without jumping
            self.hand = Some(hand);
            self.last = Some(cur);
            return None;
        }
        let prev = self.last.replace(cur)?;
        let dx = (cur.x - prev.x).round() as i32;
        let dy = (cur.y - prev.y).round() as i32;
        if dx == 0 && dy == 0 {
            // keep the sub-pixel remainder
            self.last = Some(prev);
            return None;
        }
        self.last = Some(Point::new(prev.x + dx as f32, prev.y + dy as f32));
        Some((dx, dy))
    }

    pub fn follow(&mut self, snap: &EngineSnapshot, sink: &mut UinputSink) -> Result<()> {
        if let Some((dx, dy)) = self.delta(snap) {
            sink.move_relative(dx, dy)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airkeys::HandLabel;
    use airkeys::config::EngineConfig;
    use airkeys::engine::Engine;
    use airkeys::tracker::HandObservation;

    fn pointer_engine() -> Engine {
        Engine::new(EngineConfig {
            surface: Surface::Pointer,
            ..Default::default()
        })
        .unwrap()
    }

    fn open_hand(x: f32, y: f32) -> HandObservation {
        hand_at(HandLabel::Left, x, y)
    }

    fn hand_at(hand: HandLabel, x: f32, y: f32) -> HandObservation {
        // fingertip only matters for the cursor; pre-classify to skip geometry
        let mut lm = vec![Point::new(x, y + 0.2); 21];
        lm[8] = Point::new(x, y);
        HandObservation::new(hand, lm, 0).with_gesture(airkeys::Gesture::None)
    }

    #[test]
    fn first_frame_only_anchors_the_cursor() {
        let mut e = pointer_engine();
        let mut f = CursorFollower::default();
        e.process(&[open_hand(0.5, 0.5)], 0);
        assert_eq!(f.delta(&e.snapshot(0)), None);
    }

    #[test]
    fn later_frames_move_by_the_smoothed_delta() {
        let mut e = pointer_engine();
        let mut f = CursorFollower::default();
        e.process(&[open_hand(0.5, 0.5)], 0);
        f.delta(&e.snapshot(0));
        e.process(&[open_hand(0.6, 0.5)], 33);
        let (dx, dy) = f.delta(&e.snapshot(33)).unwrap();
        assert!(dx > 0);
        assert_eq!(dy, 0);
    }

    #[test]
    fn switching_hands_re_anchors_instead_of_jumping() {
        let mut e = pointer_engine();
        let mut f = CursorFollower::default();
        e.process(&[hand_at(HandLabel::Left, 0.2, 0.5)], 0);
        f.delta(&e.snapshot(0));
        // both present: keep following Left even though Right is far away
        e.process(
            &[hand_at(HandLabel::Left, 0.2, 0.5), hand_at(HandLabel::Right, 0.9, 0.9)],
            33,
        );
        assert_eq!(f.delta(&e.snapshot(33)), None);
        // Left leaves: Right takes over without a move
        e.process(&[hand_at(HandLabel::Right, 0.9, 0.9)], 66);
        assert_eq!(f.delta(&e.snapshot(66)), None);
        e.process(&[hand_at(HandLabel::Right, 0.5, 0.9)], 99);
        let (dx, _) = f.delta(&e.snapshot(99)).unwrap();
        assert!(dx < 0);
    }

    #[test]
    fn keyboard_surface_never_moves_the_pointer() {
        let mut e = Engine::new(EngineConfig::default()).unwrap();
        let mut f = CursorFollower::default();
        e.process(&[open_hand(0.5, 0.5)], 0);
        e.process(&[open_hand(0.9, 0.5)], 33);
        assert_eq!(f.delta(&e.snapshot(33)), None);
    }

    #[test]
    fn click_and_keys_reach_the_sink() {
        let mut sink = UinputSink::noop();
        let click = ActivationEvent {
            key: CLICK.into(),
            hand: HandLabel::Right,
            timestamp_ms: 0,
            position: Some(Point::new(1.0, 2.0)),
        };
        assert!(dispatch_event(&click, &mut sink).is_ok());
        let key = ActivationEvent {
            key: "Q".into(),
            hand: HandLabel::Left,
            timestamp_ms: 0,
            position: None,
        };
        assert!(dispatch_event(&key, &mut sink).is_ok());
    }
}
