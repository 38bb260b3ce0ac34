//! Key layouts and their on-canvas hitboxes.
//!
//! The keyboard occupies a band starting 35% down the canvas, 95% of its
//! width and `scale` of its height. Rows split that band evenly and each row
//! splits the full width among its own keys, so short rows get wider keys.

use log::debug;
use serde::Serialize;
use std::collections::HashMap;

/// Vertical gap between rows (px).
pub const ROW_PADDING_PX: f32 = 10.0;
/// Horizontal gap between keys of a row (px).
pub const KEY_PADDING_PX: f32 = 5.0;

const WIDTH_FRACTION: f32 = 0.95;
const TOP_FRACTION: f32 = 0.35;

pub const LETTERS: &str = "letters";
pub const NUMBERS: &str = "numbers";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySpec {
    pub label: String,
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    pub id: String,
    pub rows: Vec<Vec<KeySpec>>,
}

impl KeyLayout {
    pub fn from_rows<R, K>(id: &str, rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(row, keys)| {
                keys.into_iter()
                    .enumerate()
                    .map(|(col, label)| KeySpec {
                        label: label.into(),
                        row,
                        col,
                    })
                    .collect()
            })
            .collect();
        Self {
            id: id.to_string(),
            rows,
        }
    }

    pub fn letters() -> Self {
        Self::from_rows(
            LETTERS,
            [
                vec!["Q", "W", "E", "R", "T", "Y", "U", "I", "O", "P"],
                vec!["A", "S", "D", "F", "G", "H", "J", "K", "L"],
                vec!["Z", "X", "C", "V", "B", "N", "M"],
                vec!["SPACE", "BACKSPACE", "ENTER", "NUMBERS"],
                vec!["POINT", "PINCH", "BOTH", "QUIT"],
            ],
        )
    }

    pub fn numbers() -> Self {
        Self::from_rows(
            NUMBERS,
            [
                vec!["1", "2", "3", "4", "5", "6", "7", "8", "9", "0"],
                vec!["!", "@", "#", "$", "%", "^", "&", "*", "(", ")"],
                vec!["-", "=", "[", "]", ";", "'", ",", ".", "/"],
                vec!["SPACE", "BACKSPACE", "ENTER", "LETTERS"],
                vec!["POINT", "PINCH", "BOTH", "QUIT"],
            ],
        )
    }

    pub fn builtin() -> Vec<KeyLayout> {
        vec![Self::letters(), Self::numbers()]
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &KeySpec> {
        self.rows.iter().flatten()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.keys().any(|k| k.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyHitbox {
    pub key: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub row: usize,
    pub col: usize,
}

impl KeyHitbox {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Cached hitboxes for one layout on one canvas.
///
/// Any change to canvas size, scale or layout marks the cache dirty;
/// `refresh` recomputes it. Hitboxes are only ever rebuilt there, so readers
/// between two refreshes see identical rectangles.
#[derive(Debug, Clone)]
pub struct LayoutGeometry {
    layout: KeyLayout,
    canvas: (f32, f32),
    scale: f32,
    hitboxes: Vec<KeyHitbox>,
    by_key: HashMap<String, usize>,
    dirty: bool,
    rebuilds: u64,
}

impl LayoutGeometry {
    pub fn new(layout: KeyLayout, width: f32, height: f32, scale: f32) -> Self {
        let mut g = Self {
            layout,
            canvas: (width, height),
            scale,
            hitboxes: Vec::new(),
            by_key: HashMap::new(),
            dirty: true,
            rebuilds: 0,
        };
        g.refresh();
        g
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    pub fn layout_id(&self) -> &str {
        &self.layout.id
    }

    pub fn canvas(&self) -> (f32, f32) {
        self.canvas
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// How many times hitboxes have been computed.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn set_canvas(&mut self, width: f32, height: f32) {
        if self.canvas != (width, height) {
            self.canvas = (width, height);
            self.dirty = true;
        }
    }

    pub fn set_scale(&mut self, scale: f32) {
        if self.scale != scale {
            self.scale = scale;
            self.dirty = true;
        }
    }

    pub fn set_layout(&mut self, layout: KeyLayout) {
        if self.layout != layout {
            self.layout = layout;
            self.dirty = true;
        }
    }

    /// Recompute hitboxes if stale. Returns whether a rebuild happened.
    pub fn refresh(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.hitboxes = compute_hitboxes(&self.layout, self.canvas, self.scale);
        self.by_key.clear();
        for (i, hb) in self.hitboxes.iter().enumerate() {
            self.by_key.entry(hb.key.clone()).or_insert(i);
        }
        self.dirty = false;
        self.rebuilds += 1;
        debug!(
            "layout '{}': rebuilt {} hitboxes for {:.0}x{:.0} @ {:.2}",
            self.layout.id,
            self.hitboxes.len(),
            self.canvas.0,
            self.canvas.1,
            self.scale
        );
        true
    }

    pub fn get_hitbox(&self, key: &str) -> Option<&KeyHitbox> {
        self.by_key.get(key).map(|&i| &self.hitboxes[i])
    }

    /// Hitboxes in layout order (row-major).
    pub fn hitboxes(&self) -> &[KeyHitbox] {
        &self.hitboxes
    }

    pub fn all_hitboxes(&self) -> HashMap<String, KeyHitbox> {
        self.by_key
            .iter()
            .map(|(k, &i)| (k.clone(), self.hitboxes[i].clone()))
            .collect()
    }
}

fn compute_hitboxes(layout: &KeyLayout, canvas: (f32, f32), scale: f32) -> Vec<KeyHitbox> {
    let (cw, ch) = canvas;
    let rows = layout.row_count();
    if rows == 0 {
        return Vec::new();
    }

    let kb_w = cw * WIDTH_FRACTION;
    let kb_h = ch * scale;
    let x0 = (cw - kb_w) / 2.0;
    let y0 = ch * TOP_FRACTION;

    let band = kb_h / rows as f32;
    let key_h = (band - ROW_PADDING_PX).max(1.0);

    let mut out = Vec::with_capacity(layout.keys().count());
    for (r, row) in layout.rows.iter().enumerate() {
        let n = row.len();
        if n == 0 {
            continue;
        }
        let key_w = ((kb_w - KEY_PADDING_PX * (n - 1) as f32) / n as f32).max(1.0);
        let row_w = key_w * n as f32 + KEY_PADDING_PX * (n - 1) as f32;
        let start_x = x0 + (kb_w - row_w) / 2.0;
        let y = y0 + r as f32 * band + ROW_PADDING_PX / 2.0;

        for (c, spec) in row.iter().enumerate() {
            out.push(KeyHitbox {
                key: spec.label.clone(),
                x: start_x + c as f32 * (key_w + KEY_PADDING_PX),
                y,
                width: key_w,
                height: key_h,
                row: spec.row,
                col: spec.col,
            });
        }
    }
    out
}
