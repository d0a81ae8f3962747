use crate::error::{ManagerError, Result};
use crate::version::Version;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "config.json";
pub const CONFIG_DIR_ENV: &str = "WEBOTS_MANAGER_CONFIG_DIR";
pub const HOME_ENV: &str = "WEBOTS_HOME";

/// Configuration for webots-manager, stored in `<config dir>/config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Directory holding every installed version, the active pointer and
    /// the template store.
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,

    /// Public path users point `WEBOTS_HOME` at. It is a symlink to
    /// `<work_root>/used`.
    #[serde(default = "default_home_link")]
    pub home_link: PathBuf,

    /// Either an http(s) listing of release archives or a local mirror
    /// directory.
    #[serde(default = "default_archive_url")]
    pub archive_url: String,

    /// Architecture suffix used in archive names (e.g. `x86-64`).
    #[serde(default = "default_arch")]
    pub arch: String,

    /// Top-level directory stripped from every archive entry.
    #[serde(default = "default_strip_prefix")]
    pub strip_prefix: String,
}

fn default_work_root() -> PathBuf {
    PathBuf::from("/usr/local/webots_manager")
}

fn default_home_link() -> PathBuf {
    PathBuf::from("/usr/local/webots")
}

fn default_archive_url() -> String {
    "https://www.cyberbotics.com/archive/linux".to_string()
}

fn default_arch() -> String {
    if cfg!(target_arch = "x86") {
        "i386".to_string()
    } else {
        "x86-64".to_string()
    }
}

fn default_strip_prefix() -> String {
    "webots".to_string()
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            work_root: default_work_root(),
            home_link: default_home_link(),
            archive_url: default_archive_url(),
            arch: default_arch(),
            strip_prefix: default_strip_prefix(),
        }
    }
}

impl ManagerConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: ManagerConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();
        fs::create_dir_all(config_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_dir.join(CONFIG_FILENAME), content)?;
        Ok(())
    }

    /// Resolve the config directory: explicit flag, then
    /// `WEBOTS_MANAGER_CONFIG_DIR`, then the platform config dir.
    pub fn locate_dir(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = explicit {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        ProjectDirs::from("org", "cyberbotics", "webots-manager")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| {
                ManagerError::InvalidInput("could not determine a config directory".to_string())
            })
    }

    /// `WEBOTS_HOME`, when set, names the public link location.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(home) = env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
            self.home_link = PathBuf::from(home);
        }
        self
    }

    /// The configured paths, made absolute against the current directory.
    /// Overlay links and the home link store these paths verbatim.
    pub fn layout(&self) -> Result<Layout> {
        Layout::new(&self.work_root, &self.home_link).absolute()
    }
}

/// Every well-known path below the work root.
///
/// ```text
/// <work_root>/
/// ├── <major.minor.patch>/        one extracted tree per installed version
/// ├── used -> <major.minor.patch> active pointer
/// ├── global.lock
/// └── templates/
///     ├── data.json               template store snapshot
///     ├── <storage key>.data      stored override files
///     └── global.lock
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub work_root: PathBuf,
    pub home_link: PathBuf,
}

impl Layout {
    pub fn new(work_root: impl Into<PathBuf>, home_link: impl Into<PathBuf>) -> Self {
        Self {
            work_root: work_root.into(),
            home_link: home_link.into(),
        }
    }

    pub fn absolute(self) -> Result<Self> {
        Ok(Self {
            work_root: std::path::absolute(&self.work_root)?,
            home_link: std::path::absolute(&self.home_link)?,
        })
    }

    pub fn version_dir(&self, v: Version) -> PathBuf {
        self.work_root.join(v.to_string())
    }

    pub fn used_link(&self) -> PathBuf {
        self.work_root.join("used")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.work_root.join("global.lock")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.work_root.join("templates")
    }

    pub fn staging_dir(&self, v: Version, tag: &str) -> PathBuf {
        self.work_root.join(format!(".staging-{}-{}", v, tag))
    }
}
