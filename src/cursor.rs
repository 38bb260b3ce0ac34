//! Continuous pointer target: maps the index fingertip to screen space.
//!
//! The frame border is dropped (hands rarely reach the edges), the interior
//! is stretched to the screen, and each hand's cursor follows the fingertip
//! through an exponential filter.

use crate::config::CursorConfig;
use crate::tracker::{HandLabel, Point};

#[derive(Debug, Clone, Default)]
pub struct CursorMapper {
    smoothed: [Option<Point>; 2],
}

fn interp(v: f32, lo: f32, hi: f32, out: f32) -> f32 {
    let t = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
    t * out
}

impl CursorMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw screen position for a normalized fingertip, before smoothing.
    pub fn project(tip: Point, cfg: &CursorConfig) -> Point {
        let lo = cfg.margin;
        let hi = 1.0 - cfg.margin;
        Point::new(
            interp(tip.x, lo, hi, cfg.screen_width),
            interp(tip.y, lo, hi, cfg.screen_height),
        )
    }

    /// Feed one fingertip sample and return the smoothed cursor.
    ///
    /// The first sample after a reset is taken as-is.
    pub fn update(&mut self, hand: HandLabel, tip: Point, cfg: &CursorConfig) -> Point {
        let target = Self::project(tip, cfg);
        let slot = &mut self.smoothed[hand.index()];
        let next = match *slot {
            Some(prev) => Point::new(
                prev.x + (target.x - prev.x) / cfg.smoothing,
                prev.y + (target.y - prev.y) / cfg.smoothing,
            ),
            None => target,
        };
        *slot = Some(next);
        next
    }

    pub fn position(&self, hand: HandLabel) -> Option<Point> {
        self.smoothed[hand.index()]
    }

    pub fn reset(&mut self, hand: HandLabel) {
        self.smoothed[hand.index()] = None;
    }

    pub fn reset_all(&mut self) {
        self.smoothed = [None, None];
    }
}
