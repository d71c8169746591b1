//! Startup configuration. The environment is read here once and nowhere else.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

pub const MAP_ENV: &str = "WINDOWS_LINK_READER_MAP";
pub const CACHE_ENV: &str = "WINDOWS_LINK_READER_CACHE";
pub const LOG_ENV: &str = "OPEN_LNK_LOG";

const APP_DIR: &str = "windows-link-reader";
const MAP_FILE: &str = "mappings.conf";
const CACHE_FILE: &str = "links.conf";
const LOG_FILE: &str = "open_lnk.log";

/// Log file is truncated once it grows past this.
pub const LOG_MAX_BYTES: u64 = 512 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub map_path: PathBuf,
    pub cache_dir: PathBuf,
    pub mounts_file: PathBuf,
    pub gvfs_root: Option<PathBuf>,
    pub debug: bool,
    pub assist: bool,
    pub log_to_file: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::from_vars(|k| env::var_os(k));
        config.gvfs_root = Some(default_gvfs_root());
        config
    }

    /// Same as `from_env` with an injectable variable lookup and no GVFS root.
    pub fn from_vars(var: impl Fn(&str) -> Option<OsString>) -> Self {
        let set = |k: &str| var(k).filter(|v| !v.is_empty());

        let map_path = set(MAP_ENV).map(PathBuf::from).unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(env::temp_dir)
                .join(APP_DIR)
                .join(MAP_FILE)
        });
        let cache_dir = set(CACHE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| dirs::cache_dir().unwrap_or_else(env::temp_dir).join(APP_DIR));

        Self {
            map_path,
            cache_dir,
            mounts_file: PathBuf::from("/proc/mounts"),
            gvfs_root: None,
            debug: false,
            assist: false,
            log_to_file: set(LOG_ENV).is_some(),
        }
    }

    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir.join(CACHE_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.cache_dir.join(LOG_FILE)
    }
}

/// `/run/user/<uid>/gvfs`
fn default_gvfs_root() -> PathBuf {
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/run/user/{}/gvfs", uid))
}
