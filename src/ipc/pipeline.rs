use airkeys::config::Surface;
use airkeys::engine::{ActivationEvent, Engine};
use airkeys::tracker::Frame;
use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use super::dispatch::{CursorFollower, dispatch_event};
use super::server::DaemonEvent;
use crate::actions::UinputSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The tracker closed its stream.
    InputClosed,
    /// A QUIT key was activated.
    QuitKey,
    /// Asked to stop from outside.
    Stopped,
}

/// Parse one JSON line and run it through the engine. Bad lines are
/// logged and skipped.
pub fn process_line(engine: &mut Engine, line: &str) -> Option<Vec<ActivationEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match Frame::from_json_line(line) {
        Ok(frame) => Some(engine.process(&frame.hands, frame.timestamp_ms)),
        Err(e) => {
            warn!("skipping bad frame: {e}");
            None
        }
    }
}

/// Feed frames from `input` until it ends, QUIT fires, or `stop` is set.
/// Activations are echoed to `out` as JSON lines and, unless `sink` is
/// `None`, injected.
pub fn run_frames<R: BufRead, W: Write>(
    engine: &Mutex<Engine>,
    input: R,
    out: &mut W,
    mut sink: Option<&mut UinputSink>,
    stop: &AtomicBool,
) -> Result<StopReason> {
    let mut follower = CursorFollower::default();
    for line in input.lines() {
        if stop.load(Ordering::Relaxed) {
            return Ok(StopReason::Stopped);
        }
        let line = line?;

        let (events, snap, quit) = {
            let mut eng = engine.lock().map_err(|_| anyhow!("engine lock poisoned"))?;
            let Some(events) = process_line(&mut eng, &line) else {
                continue;
            };
            let snap = (eng.config().surface == Surface::Pointer)
                .then(|| eng.snapshot(eng.last_tick_ms()));
            (events, snap, eng.shutdown_requested())
        };

        for ev in &events {
            writeln!(out, "{}", serde_json::to_string(ev)?)?;
            if let Some(sink) = sink.as_deref_mut() {
                if let Err(e) = dispatch_event(ev, sink) {
                    error!("dispatch failed: {e}");
                }
            }
        }
        out.flush()?;

        if let (Some(snap), Some(sink)) = (snap, sink.as_deref_mut()) {
            if let Err(e) = follower.follow(&snap, sink) {
                error!("cursor move failed: {e}");
            }
        }

        if quit {
            info!("QUIT key activated");
            return Ok(StopReason::QuitKey);
        }
    }
    debug!("input stream closed");
    Ok(StopReason::InputClosed)
}

/// Thread body: run frames to stdout and report why it stopped.
pub fn run_pipeline<R: BufRead>(
    engine: Arc<Mutex<Engine>>,
    input: R,
    mut sink: Option<UinputSink>,
    stop: Arc<AtomicBool>,
    tx_evt: Sender<DaemonEvent>,
) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let reason = match run_frames(&engine, input, &mut out, sink.as_mut(), &stop) {
        Ok(r) => r,
        Err(e) => {
            error!("pipeline failed: {e}");
            StopReason::InputClosed
        }
    };
    let _ = tx_evt.send(DaemonEvent::PipelineStopped(reason));
}
