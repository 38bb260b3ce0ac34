use anyhow::{Result, anyhow};
use directories::UserDirs;
use std::{fs, path::Path, path::PathBuf};

pub fn runtime_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    let dir = dirs.home_dir().join(".local").join("run");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn socket_path() -> Result<PathBuf> {
    Ok(runtime_dir()?.join("airkeys.sock"))
}

/// Permission and environment checks for `airkeys doctor`.
pub fn doctor_report(settings_path: &Path) -> serde_json::Value {
    let uinput = Path::new("/dev/uinput");
    let uinput_writable = fs::OpenOptions::new().write(true).open(uinput).is_ok();
    serde_json::json!({
        "user": whoami::username(),
        "in_input_group": check_in_input_group(),
        "uinput_present": uinput.exists(),
        "uinput_writable": uinput_writable,
        "settings": settings_path,
        "settings_exists": settings_path.exists(),
        "socket": socket_path().ok(),
    })
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .any(|line| {
            line.split(':')
                .nth(3)
                .unwrap_or("")
                .split(',')
                .any(|u| u == user)
        })
}
