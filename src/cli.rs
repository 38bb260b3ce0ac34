use airkeys::config::{self, EngineConfig};
use airkeys::engine::Engine;
use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, path::PathBuf, process::Command};

use crate::ipc::{self, DaemonOptions};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon(daemon_options(&mut pargs)?);
    }

    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("run") => ipc::run_daemon(daemon_options(&mut pargs)?),

        Some("start") => {
            let opts = daemon_options(&mut pargs)?;
            let exe = std::env::current_exe()?;
            let mut cmd = Command::new(exe);
            cmd.arg("--daemon");
            if let Some(p) = &opts.input {
                cmd.arg("--input").arg(p);
            }
            if let Some(p) = &opts.settings {
                cmd.arg("--settings").arg(p);
            }
            if opts.dry_run {
                cmd.arg("--dry-run");
            }
            let child = cmd.spawn()?;
            println!("airkeys: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request(serde_json::json!({"op": "shutdown"})),
        Some("status") => request(serde_json::json!({"op": "status"})),
        Some("reload") => request(serde_json::json!({"op": "reload"})),
        Some("doctor") => request(serde_json::json!({"op": "doctor"})),

        Some("mode") => {
            let mode: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: airkeys mode <point|pinch|both>"))?;
            request(serde_json::json!({"op": "mode", "mode": mode}))
        }

        Some("layout") => {
            let id: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: airkeys layout <id>"))?;
            request(serde_json::json!({"op": "layout", "layout": id}))
        }

        Some("layout-dump") => {
            let settings: Option<PathBuf> = pargs.opt_value_from_str("--settings")?;
            let layout: Option<String> = pargs.opt_value_from_str("--layout")?;
            layout_dump(settings, layout)
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn daemon_options(pargs: &mut Arguments) -> Result<DaemonOptions> {
    Ok(DaemonOptions {
        input: pargs.opt_value_from_str("--input")?,
        settings: pargs.opt_value_from_str("--settings")?,
        dry_run: pargs.contains("--dry-run"),
    })
}

fn request(req: serde_json::Value) -> Result<()> {
    let r = ipc::client_request(req)?;
    print_response(&r);
    Ok(())
}

/// Print the hitboxes of a layout as the engine would compute them.
fn layout_dump(settings: Option<PathBuf>, layout: Option<String>) -> Result<()> {
    let cfg = match settings {
        Some(path) => config::load_config(&path)?,
        None => {
            let path = config::default_settings_path()?;
            if path.exists() {
                config::load_config(&path)?
            } else {
                EngineConfig::default()
            }
        }
    };
    let mut engine = Engine::new(cfg)?;
    if let Some(id) = layout {
        engine.set_layout(&id)?;
    }
    let dump = serde_json::json!({
        "layout": engine.layout_id(),
        "canvas": engine.geometry().canvas(),
        "keys": engine.geometry().hitboxes(),
    });
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}

fn print_help() {
    println!(
        r#"airkeys: hand-gesture keyboard daemon

USAGE:
  airkeys help [command]                  Show general or command-specific help
  airkeys run [--input PATH] [--settings PATH] [--dry-run]
                                          Run in the foreground
  airkeys start [same flags as run]       Start the daemon in the background
  airkeys stop                            Stop the daemon
  airkeys status                          Show engine state
  airkeys reload                          Reload settings
  airkeys mode <point|pinch|both>         Switch input mode
  airkeys layout <id>                     Switch keyboard layout
  airkeys doctor                          Diagnose permissions
  airkeys layout-dump [--layout ID] [--settings PATH]
                                          Print computed key hitboxes

TIPS:
  - Frames are JSON lines: {{"timestamp_ms": 0, "hands": [{{"hand": "Left", "landmarks": [[x, y], ...]}}]}}
  - Settings: ~/.config/airkeys/settings.json (edits are picked up live)
  - RUST_LOG=debug shows per-hand selection changes
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: airkeys run [--input PATH] [--settings PATH] [--dry-run]\nReads tracker frames (stdin by default), prints activations and injects them via uinput."
        ),
        "start" => println!("usage: airkeys start [--input PATH] [--settings PATH] [--dry-run]\nStarts the background daemon."),
        "stop" => println!("usage: airkeys stop\nStops the running daemon."),
        "status" => println!(
            "usage: airkeys status\nShows input mode, layout, per-hand selection and dwell progress."
        ),
        "reload" => println!(
            "usage: airkeys reload\nReloads the settings file; keeps last good config on error."
        ),
        "mode" => println!("usage: airkeys mode <point|pinch|both>\nSwitches how keys are selected."),
        "layout" => println!("usage: airkeys layout <id>\nSwitches the active keyboard layout."),
        "doctor" => println!("usage: airkeys doctor\nChecks uinput access and group membership."),
        "layout-dump" => println!(
            "usage: airkeys layout-dump [--layout ID] [--settings PATH]\nPrints key hitboxes in canvas pixels."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
