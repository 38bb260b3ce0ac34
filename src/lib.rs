//! Hand-gesture keyboard engine.
//!
//! Turns per-frame hand landmarks from an external tracker into discrete key
//! activations: gestures are classified per hand, the index fingertip is
//! hit-tested against an on-screen keyboard, and a per-hand dwell state
//! machine decides when a key fires. Both hands share one cooldown.

pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod gestures;
pub mod hit_test;
pub mod layout;
pub mod selection;
pub mod tracker;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::{EngineConfig, InputMode, Settings, SettingsStore};
pub use engine::{ActivationEvent, Engine, EngineSnapshot};
pub use error::{EngineError, EngineResult};
pub use gestures::Gesture;
pub use tracker::{Frame, HandLabel, HandObservation, Point};
