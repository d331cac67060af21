use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use directories::ProjectDirs;
use idlenap_shared::Config;
use idlenap_shared::config::ConfigError;
use idlenap_shared::services::ConfigStore;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::AppError;

pub const ENV_CONFIG: &str = "IDLENAP_CONFIG";
pub const CONFIG_FILE_NAME: &str = "config.json";
const MIGRATED_SUFFIX: &str = ".migrated.bak";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "idlenap", "idlenap")
}

pub fn resolve_config_path(cli_value: Option<PathBuf>) -> Result<PathBuf, AppError> {
    if let Some(p) = cli_value {
        return Ok(p);
    }
    if let Ok(p) = std::env::var(ENV_CONFIG) {
        return Ok(PathBuf::from(p));
    }
    default_config_path().ok_or_else(|| AppError::Config("could not determine config dir".into()))
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(project_dirs()?.config_dir().join(CONFIG_FILE_NAME))
}

/// Per-user local data dir; logs and diagnostics go here.
pub fn data_dir() -> Option<PathBuf> {
    Some(project_dirs()?.data_local_dir().to_path_buf())
}

/// `config.json` next to the executable, where older releases kept it.
pub fn legacy_config_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(CONFIG_FILE_NAME))
}

pub fn migrate_legacy_if_needed(target: &Path) -> Result<bool, AppError> {
    match legacy_config_path() {
        Some(legacy) if legacy != target => migrate_legacy(&legacy, target),
        _ => Ok(false),
    }
}

/// Copies a legacy config into `target` once, then renames the legacy file
/// so the copy is not repeated. Does nothing when `target` already exists.
pub fn migrate_legacy(legacy: &Path, target: &Path) -> Result<bool, AppError> {
    if target.exists() || !legacy.is_file() {
        return Ok(false);
    }
    let data = std::fs::read(legacy)?;
    write_atomic(target, &data)?;
    let mut backup = legacy.as_os_str().to_owned();
    backup.push(MIGRATED_SUFFIX);
    if let Err(e) = std::fs::rename(legacy, &backup) {
        warn!(error=%e, path=%legacy.display(), "could not rename migrated legacy config");
    }
    info!(from=%legacy.display(), to=%target.display(), "migrated legacy config");
    Ok(true)
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), AppError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| AppError::Io(e.error))?;
    Ok(())
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// The JSON config file on disk.
///
/// Loading never fails: a missing file is created with defaults and an
/// unreadable one yields defaults. External edits are noticed by comparing the
/// file's modification time with the one seen at the last load or save.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    seen: Mutex<Option<SystemTime>>,
}

impl ConfigFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            seen: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remember_mtime(&self) {
        let mtime = modified(&self.path);
        if let Ok(mut seen) = self.seen.lock() {
            *seen = mtime;
        }
    }

    pub fn load(&self) -> Config {
        let cfg = match std::fs::read_to_string(&self.path) {
            Ok(text) => match Config::from_json(&text) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(error=%e, path=%self.path.display(), "config unreadable; using defaults");
                    Config::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Config::default();
                if let Err(e) = self.write(&cfg) {
                    warn!(error=%e, path=%self.path.display(), "could not create default config");
                }
                cfg
            }
            Err(e) => {
                warn!(error=%e, path=%self.path.display(), "config read failed; using defaults");
                Config::default()
            }
        };
        self.remember_mtime();
        cfg
    }

    pub fn write(&self, cfg: &Config) -> Result<(), AppError> {
        let text = cfg
            .to_json_pretty()
            .map_err(|e| AppError::Config(e.to_string()))?;
        write_atomic(&self.path, text.as_bytes())?;
        self.remember_mtime();
        debug!(path=%self.path.display(), "config saved");
        Ok(())
    }

    /// Returns true once per external modification.
    pub fn changed_on_disk(&self) -> bool {
        let current = modified(&self.path);
        let Ok(mut seen) = self.seen.lock() else {
            return false;
        };
        if current.is_some() && current != *seen {
            *seen = current;
            return true;
        }
        false
    }
}

impl ConfigStore for ConfigFile {
    fn save(&self, config: &Config) -> Result<(), ConfigError> {
        self.write(config).map_err(|e| ConfigError::Io(e.to_string()))
    }
}
