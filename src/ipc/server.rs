use airkeys::config::{InputMode, SettingsStore};
use airkeys::engine::Engine;
use anyhow::{Result, anyhow};
use log::{error, info, warn};
use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
    },
    thread,
    time::Duration,
};

use super::pipeline::{StopReason, run_pipeline};
use super::runtime::{doctor_report, socket_path};
use crate::actions::UinputSink;

#[derive(Debug, Clone, Default)]
pub struct DaemonOptions {
    /// Frame source; stdin when unset.
    pub input: Option<PathBuf>,
    pub settings: Option<PathBuf>,
    /// Print activations without injecting them.
    pub dry_run: bool,
}

#[derive(Debug)]
pub enum DaemonEvent {
    Reload,
    Shutdown,
    PipelineStopped(StopReason),
}

/// State shared between the accept loop and client threads.
#[derive(Clone)]
struct Shared {
    engine: Arc<Mutex<Engine>>,
    store: Arc<Mutex<SettingsStore>>,
}

impl Shared {
    fn engine(&self) -> Result<std::sync::MutexGuard<'_, Engine>> {
        self.engine.lock().map_err(|_| anyhow!("engine lock poisoned"))
    }

    fn store(&self) -> Result<std::sync::MutexGuard<'_, SettingsStore>> {
        self.store.lock().map_err(|_| anyhow!("settings lock poisoned"))
    }

    /// Re-read settings and hand them to the engine. Either step failing
    /// leaves the running config untouched.
    fn reload(&self) -> Result<()> {
        let cfg = self.store()?.reload()?.clone();
        self.engine()?.update_config(cfg)?;
        Ok(())
    }
}

pub fn run_daemon(opts: DaemonOptions) -> Result<()> {
    let store = SettingsStore::load_or_install_default(opts.settings.clone())?;
    info!("daemon: settings at {}", store.path.display());
    let engine = Engine::new(store.config.clone())?;
    let settings_path = store.path.clone();
    let shared = Shared {
        engine: Arc::new(Mutex::new(engine)),
        store: Arc::new(Mutex::new(store)),
    };

    // socket
    let sock = socket_path()?;
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    listener.set_nonblocking(true)?;
    info!("daemon: listening on {}", sock.display());

    let (tx_evt, rx_evt) = mpsc::channel::<DaemonEvent>();
    spawn_signal_thread(tx_evt.clone())?;
    let _watcher = match watch_settings(&settings_path, tx_evt.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("settings hot reload disabled: {e}");
            None
        }
    };

    // pipeline
    let stop = Arc::new(AtomicBool::new(false));
    let input: Box<dyn BufRead + Send> = match &opts.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(std::io::stdin())),
    };
    {
        let engine = shared.engine.clone();
        let stop = stop.clone();
        let tx = tx_evt.clone();
        let dry_run = opts.dry_run;
        thread::spawn(move || {
            // the uinput device stays on the thread that writes to it
            let sink = (!dry_run).then(open_sink);
            run_pipeline(engine, input, sink, stop, tx)
        });
    }

    // accept loop
    loop {
        if let Ok((stream, _)) = listener.accept() {
            let shared = shared.clone();
            let tx = tx_evt.clone();
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, &shared, &tx) {
                    error!("ipc client error: {e}");
                }
            });
        }

        let mut reload = false;
        let mut exit = false;
        while let Ok(evt) = rx_evt.try_recv() {
            match evt {
                DaemonEvent::Reload => reload = true,
                DaemonEvent::Shutdown => exit = true,
                DaemonEvent::PipelineStopped(reason) => {
                    info!("daemon: pipeline stopped ({reason:?})");
                    exit = true;
                }
            }
        }
        if reload {
            match shared.reload() {
                Ok(()) => info!("settings reloaded"),
                Err(e) => error!("reload failed: {e:#}"),
            }
        }
        if exit {
            break;
        }

        thread::sleep(Duration::from_millis(5));
    }

    stop.store(true, Ordering::Relaxed);
    let _ = std::fs::remove_file(&sock);
    info!("daemon: stopped");
    Ok(())
}

fn open_sink() -> UinputSink {
    let sink = UinputSink::new().unwrap_or_else(|e| {
        warn!("uinput unavailable ({e}); activations will only be printed");
        UinputSink::noop()
    });
    if sink.is_virtual() {
        info!("daemon: injecting through uinput");
    }
    sink
}

fn spawn_signal_thread(tx: Sender<DaemonEvent>) -> Result<()> {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    thread::spawn(move || {
        for sig in signals.forever() {
            let evt = if sig == SIGHUP {
                DaemonEvent::Reload
            } else {
                DaemonEvent::Shutdown
            };
            if tx.send(evt).is_err() {
                break;
            }
        }
    });
    Ok(())
}

fn watch_settings(path: &Path, tx: Sender<DaemonEvent>) -> Result<notify::RecommendedWatcher> {
    use notify::{Event, EventKind, RecursiveMode, Watcher};

    let name = path.file_name().map(|n| n.to_os_string());
    // editors replace files, so watch the directory
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(ev) => {
            let ours = ev
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()) == name);
            if ours && matches!(ev.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                let _ = tx.send(DaemonEvent::Reload);
            }
        }
        Err(e) => warn!("settings watcher: {e}"),
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn handle_client(mut stream: UnixStream, shared: &Shared, tx: &Sender<DaemonEvent>) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let resp = match handle_request(&req, shared, tx) {
        Ok(data) => serde_json::json!({"ok": true, "data": data}),
        Err(e) => serde_json::json!({"ok": false, "error": format!("{e:#}")}),
    };
    writeln!(stream, "{resp}")?;
    Ok(())
}

fn handle_request(
    req: &serde_json::Value,
    shared: &Shared,
    tx: &Sender<DaemonEvent>,
) -> Result<serde_json::Value> {
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");
    let arg = |name: &str| {
        req.get(name)
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("'{op}' needs a '{name}' argument"))
    };

    match op {
        "status" => {
            let eng = shared.engine()?;
            let snap = eng.snapshot(eng.last_tick_ms());
            Ok(serde_json::json!({
                "engine": snap,
                "layouts": eng.layout_ids().collect::<Vec<_>>(),
                "settings": shared.store()?.path,
                "socket": socket_path().ok(),
                "pid": std::process::id(),
            }))
        }
        "reload" => {
            shared.reload()?;
            let eng = shared.engine()?;
            Ok(serde_json::json!({"config": eng.config()}))
        }
        "mode" => {
            let raw = arg("mode")?;
            let mode = InputMode::parse(raw).ok_or_else(|| anyhow!("unknown input mode: {raw}"))?;
            shared.engine()?.set_input_mode(mode);
            // persist across restarts
            let mut store = shared.store()?;
            store.config.input_mode = mode;
            if let Err(e) = store.save() {
                warn!("could not persist input mode: {e:#}");
            }
            Ok(serde_json::json!({"input_mode": mode}))
        }
        "layout" => {
            let id = arg("layout")?;
            shared.engine()?.set_layout(id)?;
            Ok(serde_json::json!({"layout": id}))
        }
        "doctor" => {
            let path = shared.store()?.path.clone();
            Ok(doctor_report(&path))
        }
        "shutdown" => {
            tx.send(DaemonEvent::Shutdown)
                .map_err(|_| anyhow!("daemon loop is gone"))?;
            Ok(serde_json::json!("shutting down"))
        }
        _ => Err(anyhow!("unknown op: {op}")),
    }
}
