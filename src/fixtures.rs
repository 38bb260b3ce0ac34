//! Synthetic hand poses for tests.
//!
//! Every pose puts the index fingertip at `(x, y)` when the index is raised,
//! so callers can aim at a known pixel.

use crate::tracker::{
    HandLabel, HandObservation, INDEX_DIP, INDEX_MCP, INDEX_PIP, INDEX_TIP, LANDMARK_COUNT,
    MIDDLE_DIP, MIDDLE_MCP, MIDDLE_PIP, MIDDLE_TIP, PINKY_DIP, PINKY_MCP, PINKY_PIP, PINKY_TIP,
    Point, RING_DIP, RING_MCP, RING_PIP, RING_TIP, THUMB_CMC, THUMB_IP, THUMB_MCP, THUMB_TIP, WRIST,
};

const FINGERS: [[usize; 4]; 4] = [
    [INDEX_MCP, INDEX_PIP, INDEX_DIP, INDEX_TIP],
    [MIDDLE_MCP, MIDDLE_PIP, MIDDLE_DIP, MIDDLE_TIP],
    [RING_MCP, RING_PIP, RING_DIP, RING_TIP],
    [PINKY_MCP, PINKY_PIP, PINKY_DIP, PINKY_TIP],
];

pub fn pose(
    hand: HandLabel,
    x: f32,
    y: f32,
    extended: [bool; 4],
    pinching: bool,
    t_ms: u64,
) -> HandObservation {
    let mut lm = vec![Point::new(x, y + 0.3); LANDMARK_COUNT];
    lm[WRIST] = Point::new(x, y + 0.3);

    for (i, joints) in FINGERS.iter().enumerate() {
        let fx = x + 0.03 * i as f32;
        lm[joints[0]] = Point::new(fx, y + 0.20);
        lm[joints[1]] = Point::new(fx, y + 0.13);
        lm[joints[2]] = Point::new(fx, y + 0.07);
        lm[joints[3]] = if extended[i] {
            Point::new(fx, y)
        } else {
            Point::new(fx, y + 0.18)
        };
    }

    lm[THUMB_CMC] = Point::new(x - 0.05, y + 0.27);
    lm[THUMB_MCP] = Point::new(x - 0.08, y + 0.22);
    lm[THUMB_IP] = Point::new(x - 0.10, y + 0.18);
    lm[THUMB_TIP] = if pinching {
        let tip = lm[INDEX_TIP];
        Point::new(tip.x + 0.01, tip.y + 0.01)
    } else {
        Point::new(x - 0.12, y + 0.15)
    };

    HandObservation::new(hand, lm, t_ms)
}

pub fn point(hand: HandLabel, x: f32, y: f32, t_ms: u64) -> HandObservation {
    pose(hand, x, y, [true, false, false, false], false, t_ms)
}

pub fn pinch(hand: HandLabel, x: f32, y: f32, t_ms: u64) -> HandObservation {
    pose(hand, x, y, [true, false, false, false], true, t_ms)
}

pub fn fist(hand: HandLabel, x: f32, y: f32, t_ms: u64) -> HandObservation {
    pose(hand, x, y, [false; 4], false, t_ms)
}

pub fn open_palm(hand: HandLabel, x: f32, y: f32, t_ms: u64) -> HandObservation {
    pose(hand, x, y, [true; 4], false, t_ms)
}
