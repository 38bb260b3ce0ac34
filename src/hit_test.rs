use crate::layout::{KeyHitbox, LayoutGeometry};
use crate::tracker::Point;

pub const DEFAULT_MAX_HIT_DISTANCE_PX: f32 = 50.0;
pub const DEFAULT_BOTTOM_ROW_WEIGHT: f32 = 1.3;

/// Nearest-center hit testing with a bias toward the bottom two rows.
///
/// Bottom rows hold space, enter and the control keys, which are the
/// hardest to reach by pointing; their distances are divided by
/// `bottom_row_weight` before comparison.
#[derive(Debug, Clone, Copy)]
pub struct HitTester {
    pub max_hit_distance_px: f32,
    pub bottom_row_weight: f32,
}

impl Default for HitTester {
    fn default() -> Self {
        Self {
            max_hit_distance_px: DEFAULT_MAX_HIT_DISTANCE_PX,
            bottom_row_weight: DEFAULT_BOTTOM_ROW_WEIGHT,
        }
    }
}

impl HitTester {
    pub fn new(max_hit_distance_px: f32, bottom_row_weight: f32) -> Self {
        Self {
            max_hit_distance_px,
            bottom_row_weight,
        }
    }

    /// Closest hitbox within range, or `None`.
    ///
    /// Ties keep the first hitbox in layout order.
    pub fn hit<'g>(&self, geometry: &'g LayoutGeometry, pos: Point) -> Option<&'g KeyHitbox> {
        let bottom_from = geometry.layout().row_count().saturating_sub(2);

        let mut best: Option<(&KeyHitbox, f32)> = None;
        for hb in geometry.hitboxes() {
            let (cx, cy) = hb.center();
            let mut d = pos.distance(&Point::new(cx, cy));
            if hb.row >= bottom_from {
                d /= self.bottom_row_weight;
            }
            match best {
                Some((_, bd)) if d >= bd => {}
                _ => best = Some((hb, d)),
            }
        }

        match best {
            Some((hb, d)) if d <= self.max_hit_distance_px => Some(hb),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::KeyLayout;

    fn geometry() -> LayoutGeometry {
        LayoutGeometry::new(KeyLayout::letters(), 1280.0, 720.0, 0.6)
    }

    fn center_of(g: &LayoutGeometry, key: &str) -> Point {
        let (x, y) = g.get_hitbox(key).unwrap().center();
        Point::new(x, y)
    }

    #[test]
    fn key_center_hits_that_key() {
        let g = geometry();
        let t = HitTester::default();
        for key in ["Q", "G", "M", "SPACE", "QUIT"] {
            assert_eq!(t.hit(&g, center_of(&g, key)).unwrap().key, key);
        }
    }

    #[test]
    fn just_inside_and_just_outside_range() {
        let g = geometry();
        let t = HitTester::default();
        let q = center_of(&g, "Q");

        // straight up from the top row, away from every other key
        let inside = Point::new(q.x, q.y - (DEFAULT_MAX_HIT_DISTANCE_PX - 1.0));
        let outside = Point::new(q.x, q.y - (DEFAULT_MAX_HIT_DISTANCE_PX + 1.0));

        assert_eq!(t.hit(&g, inside).unwrap().key, "Q");
        assert!(t.hit(&g, outside).is_none());
    }

    #[test]
    fn far_away_point_hits_nothing() {
        let g = geometry();
        let t = HitTester::default();
        assert!(t.hit(&g, Point::new(640.0, 10.0)).is_none());
        assert!(t.hit(&g, Point::new(-500.0, -500.0)).is_none());
    }

    #[test]
    fn bottom_rows_reach_further() {
        let g = geometry();
        let t = HitTester::new(1000.0, 1.3);
        let z = center_of(&g, "Z");
        let space = center_of(&g, "SPACE");

        // below Z, nearer Z than SPACE in raw pixels but not once weighted
        let probe = Point::new(z.x, z.y + (space.y - z.y) * 0.7);
        let dz = probe.distance(&z);
        let ds = probe.distance(&space);
        assert!(dz < ds && ds / 1.3 < dz);

        let raw = HitTester::new(1000.0, 1.0).hit(&g, probe).unwrap().key.clone();
        let weighted = t.hit(&g, probe).unwrap().key.clone();
        assert_ne!(raw, "SPACE");
        assert_eq!(weighted, "SPACE");
    }

    #[test]
    fn weighted_distance_is_used_against_the_limit() {
        let g = geometry();
        let quit = center_of(&g, "QUIT");
        let t = HitTester::new(50.0, 1.3);
        // 60px raw below QUIT (off the keyboard), 46px weighted
        let probe = Point::new(quit.x, quit.y + 60.0);
        assert_eq!(t.hit(&g, probe).unwrap().key, "QUIT");
        let unweighted = HitTester::new(50.0, 1.0);
        assert!(unweighted.hit(&g, probe).is_none());
    }

    #[test]
    fn ties_go_to_layout_order() {
        let layout = KeyLayout::from_rows("pair", [vec!["L", "R"]]);
        let g = LayoutGeometry::new(layout, 1000.0, 1000.0, 0.2);
        let l = center_of(&g, "L");
        let r = center_of(&g, "R");
        let mid = Point::new((l.x + r.x) / 2.0, l.y);
        let t = HitTester::new(10_000.0, 1.0);
        assert_eq!(t.hit(&g, mid).unwrap().key, "L");
    }

    #[test]
    fn empty_geometry_hits_nothing() {
        let empty: Vec<Vec<&str>> = vec![];
        let g = LayoutGeometry::new(KeyLayout::from_rows("empty", empty), 800.0, 600.0, 0.5);
        assert!(HitTester::default().hit(&g, Point::new(400.0, 300.0)).is_none());
    }
}
