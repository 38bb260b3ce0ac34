use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{EngineError, EngineResult};
use crate::gestures::DEFAULT_PINCH_THRESHOLD;
use crate::hit_test::{DEFAULT_BOTTOM_ROW_WEIGHT, DEFAULT_MAX_HIT_DISTANCE_PX};
use crate::layout::LETTERS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    PointOnly,
    PinchOnly,
    #[default]
    Both,
}

impl InputMode {
    pub fn allows_point(&self) -> bool {
        matches!(self, Self::PointOnly | Self::Both)
    }

    pub fn allows_pinch(&self) -> bool {
        matches!(self, Self::PinchOnly | Self::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PointOnly => "point_only",
            Self::PinchOnly => "pinch_only",
            Self::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point_only" | "point" => Some(Self::PointOnly),
            "pinch_only" | "pinch" => Some(Self::PinchOnly),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HandPriority {
    #[default]
    #[serde(rename = "both")]
    Both,
    #[serde(rename = "left")]
    LeftOnly,
    #[serde(rename = "right")]
    RightOnly,
}

/// Order in which hands are processed within a tick. The first hand to
/// activate a key claims the shared cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictResolution {
    #[default]
    #[serde(rename = "left_priority")]
    LeftFirst,
    #[serde(rename = "right_priority")]
    RightFirst,
    /// Tracker order for the frame.
    #[serde(rename = "first_detected")]
    FirstDetected,
}

/// What a pointing hand selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    #[default]
    Keyboard,
    Pointer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub screen_width: f32,
    pub screen_height: f32,
    /// Fraction of the frame ignored on each side before mapping to the screen.
    pub margin: f32,
    /// Exponential smoothing divisor; 1 disables smoothing.
    pub smoothing: f32,
    /// Cursor drift (px) that restarts a dwell-click.
    pub dwell_radius_px: f32,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            screen_width: 1920.0,
            screen_height: 1080.0,
            margin: 100.0 / 1280.0,
            smoothing: 5.0,
            dwell_radius_px: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub dwell_duration_sec: f64,
    pub same_key_cooldown_sec: f64,
    pub input_mode: InputMode,
    pub hand_priority: HandPriority,
    pub lost_hand_grace_sec: f64,
    pub max_hit_distance_px: f32,
    pub bottom_row_weight: f32,
    pub keyboard_scale: f32,
    pub pinch_threshold: f32,
    pub conflict_resolution: ConflictResolution,
    pub multi_hand_enabled: bool,
    pub simultaneous_typing: bool,
    pub initial_layout: String,
    pub canvas_width: f32,
    pub canvas_height: f32,
    pub surface: Surface,
    pub cursor: CursorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dwell_duration_sec: 2.0,
            same_key_cooldown_sec: 1.0,
            input_mode: InputMode::Both,
            hand_priority: HandPriority::Both,
            lost_hand_grace_sec: 3.0,
            max_hit_distance_px: DEFAULT_MAX_HIT_DISTANCE_PX,
            bottom_row_weight: DEFAULT_BOTTOM_ROW_WEIGHT,
            keyboard_scale: 0.6,
            pinch_threshold: DEFAULT_PINCH_THRESHOLD,
            conflict_resolution: ConflictResolution::LeftFirst,
            multi_hand_enabled: true,
            simultaneous_typing: true,
            initial_layout: LETTERS.to_string(),
            canvas_width: 1280.0,
            canvas_height: 720.0,
            surface: Surface::Keyboard,
            cursor: CursorConfig::default(),
        }
    }
}

fn check(ok: bool, msg: impl Into<String>) -> EngineResult<()> {
    if ok {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(msg.into()))
    }
}

impl EngineConfig {
    /// Range checks. NaN fails every comparison and is rejected with it.
    pub fn validate(&self) -> EngineResult<()> {
        check(
            self.dwell_duration_sec > 0.0 && self.dwell_duration_sec.is_finite(),
            format!("dwell_duration_sec must be > 0, got {}", self.dwell_duration_sec),
        )?;
        check(
            self.same_key_cooldown_sec >= 0.0 && self.same_key_cooldown_sec.is_finite(),
            format!("same_key_cooldown_sec must be >= 0, got {}", self.same_key_cooldown_sec),
        )?;
        check(
            self.lost_hand_grace_sec >= 0.0 && self.lost_hand_grace_sec.is_finite(),
            format!("lost_hand_grace_sec must be >= 0, got {}", self.lost_hand_grace_sec),
        )?;
        check(
            self.max_hit_distance_px > 0.0,
            format!("max_hit_distance_px must be > 0, got {}", self.max_hit_distance_px),
        )?;
        check(
            self.bottom_row_weight >= 1.0,
            format!("bottom_row_weight must be >= 1, got {}", self.bottom_row_weight),
        )?;
        check(
            self.keyboard_scale > 0.0 && self.keyboard_scale <= 1.0,
            format!("keyboard_scale must be in (0,1], got {}", self.keyboard_scale),
        )?;
        check(
            self.pinch_threshold > 0.0,
            format!("pinch_threshold must be > 0, got {}", self.pinch_threshold),
        )?;
        check(
            self.canvas_width > 0.0 && self.canvas_height > 0.0,
            format!(
                "canvas must be non-empty, got {}x{}",
                self.canvas_width, self.canvas_height
            ),
        )?;
        check(
            !self.initial_layout.trim().is_empty(),
            "initial_layout must not be empty",
        )?;

        let c = &self.cursor;
        check(
            c.screen_width > 0.0 && c.screen_height > 0.0,
            "cursor screen must be non-empty",
        )?;
        check(
            (0.0..0.5).contains(&c.margin),
            format!("cursor margin must be in [0,0.5), got {}", c.margin),
        )?;
        check(
            c.smoothing >= 1.0,
            format!("cursor smoothing must be >= 1, got {}", c.smoothing),
        )?;
        check(
            c.dwell_radius_px >= 0.0,
            format!("cursor dwell_radius_px must be >= 0, got {}", c.dwell_radius_px),
        )?;
        Ok(())
    }
}

// ---------- persisted settings (loader boundary) ----------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub selection_duration: Option<f64>,
    pub keyboard_size: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiHandSettings {
    pub enabled: Option<bool>,
    pub simultaneous_typing: Option<bool>,
    pub hand_priority: Option<HandPriority>,
    pub conflict_resolution: Option<ConflictResolution>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub same_key_cooldown: Option<f64>,
    pub lost_hand_grace: Option<f64>,
    pub max_hit_distance_px: Option<f32>,
    pub bottom_row_weight: Option<f32>,
    pub pinch_threshold: Option<f32>,
    pub layout: Option<String>,
    pub canvas_width: Option<f32>,
    pub canvas_height: Option<f32>,
    pub surface: Option<Surface>,
    pub cursor: Option<CursorConfig>,
}

/// The settings file as persisted by the control panel.
///
/// Every field is optional; missing ones fall back to `EngineConfig`
/// defaults and unknown ones are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input_mode: Option<InputMode>,
    pub display: DisplaySettings,
    pub multi_hand: MultiHandSettings,
    pub engine: EngineSettings,
}

impl Settings {
    pub fn to_config(&self) -> EngineResult<EngineConfig> {
        let mut c = EngineConfig::default();
        let e = &self.engine;

        if let Some(m) = self.input_mode {
            c.input_mode = m;
        }
        if let Some(v) = self.display.selection_duration {
            c.dwell_duration_sec = v;
        }
        if let Some(v) = self.display.keyboard_size {
            c.keyboard_scale = v;
        }
        if let Some(v) = self.multi_hand.enabled {
            c.multi_hand_enabled = v;
        }
        if let Some(v) = self.multi_hand.simultaneous_typing {
            c.simultaneous_typing = v;
        }
        if let Some(v) = self.multi_hand.hand_priority {
            c.hand_priority = v;
        }
        if let Some(v) = self.multi_hand.conflict_resolution {
            c.conflict_resolution = v;
        }
        if let Some(v) = e.same_key_cooldown {
            c.same_key_cooldown_sec = v;
        }
        if let Some(v) = e.lost_hand_grace {
            c.lost_hand_grace_sec = v;
        }
        if let Some(v) = e.max_hit_distance_px {
            c.max_hit_distance_px = v;
        }
        if let Some(v) = e.bottom_row_weight {
            c.bottom_row_weight = v;
        }
        if let Some(v) = e.pinch_threshold {
            c.pinch_threshold = v;
        }
        if let Some(v) = &e.layout {
            c.initial_layout = v.clone();
        }
        if let Some(v) = e.canvas_width {
            c.canvas_width = v;
        }
        if let Some(v) = e.canvas_height {
            c.canvas_height = v;
        }
        if let Some(v) = e.surface {
            c.surface = v;
        }
        if let Some(v) = &e.cursor {
            c.cursor = v.clone();
        }

        c.validate()?;
        Ok(c)
    }

    pub fn from_config(c: &EngineConfig) -> Self {
        Self {
            input_mode: Some(c.input_mode),
            display: DisplaySettings {
                selection_duration: Some(c.dwell_duration_sec),
                keyboard_size: Some(c.keyboard_scale),
            },
            multi_hand: MultiHandSettings {
                enabled: Some(c.multi_hand_enabled),
                simultaneous_typing: Some(c.simultaneous_typing),
                hand_priority: Some(c.hand_priority),
                conflict_resolution: Some(c.conflict_resolution),
            },
            engine: EngineSettings {
                same_key_cooldown: Some(c.same_key_cooldown_sec),
                lost_hand_grace: Some(c.lost_hand_grace_sec),
                max_hit_distance_px: Some(c.max_hit_distance_px),
                bottom_row_weight: Some(c.bottom_row_weight),
                pinch_threshold: Some(c.pinch_threshold),
                layout: Some(c.initial_layout.clone()),
                canvas_width: Some(c.canvas_width),
                canvas_height: Some(c.canvas_height),
                surface: Some(c.surface),
                cursor: Some(c.cursor.clone()),
            },
        }
    }

    /// Parse by extension: `.toml` through toml, anything else as JSON.
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let is_toml = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        if is_toml {
            toml::from_str(text).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))
        } else {
            serde_json::from_str(text)
                .map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))
        }
    }
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let txt = fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    let settings = Settings::parse(path, &txt)?;
    let cfg = settings
        .to_config()
        .with_context(|| format!("rejected settings in {}", path.display()))?;
    Ok(cfg)
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("airkeys"))
}

pub fn default_settings_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("settings.json"))
}

/// Settings file plus the last config that passed validation.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    pub path: PathBuf,
    pub config: EngineConfig,
}

impl SettingsStore {
    /// Load `path`, or the default location, writing defaults there first
    /// if nothing exists yet.
    pub fn load_or_install_default(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None => default_settings_path()?,
        };
        if !path.exists() {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            Self::write(&path, &EngineConfig::default())?;
            info!("installed default settings at {}", path.display());
        }
        let config = load_config(&path)?;
        Ok(Self { path, config })
    }

    /// Re-read the file. On failure the previous config stays in effect.
    pub fn reload(&mut self) -> Result<&EngineConfig> {
        match load_config(&self.path) {
            Ok(cfg) => {
                self.config = cfg;
                Ok(&self.config)
            }
            Err(e) => {
                warn!("keeping previous settings: {e:#}");
                Err(e)
            }
        }
    }

    /// Write the current config back to the settings file.
    pub fn save(&self) -> Result<()> {
        Self::write(&self.path, &self.config)
    }

    fn write(path: &Path, cfg: &EngineConfig) -> Result<()> {
        let settings = Settings::from_config(cfg);
        let is_toml = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        let text = if is_toml {
            toml::to_string_pretty(&settings)?
        } else {
            serde_json::to_string_pretty(&settings)?
        };
        fs::write(path, text)?;
        Ok(())
    }
}
