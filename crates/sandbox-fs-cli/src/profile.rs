//! Launcher configuration.
//!
//! Layered, lowest priority first:
//! 1. Built-in defaults
//! 2. `[sandbox]` section of a TOML profile (`--config`)
//! 3. `SANDBOX_BLOCKED_PATHS`, `SANDBOX_LIBRARY_PATH`, `SANDBOX_DEBUG`
//! 4. Command-line flags

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sandbox_fs_core::config::{debug_requested, BLOCKED_PATHS_ENV, DEBUG_ENV};

pub const LIBRARY_PATH_ENV: &str = "SANDBOX_LIBRARY_PATH";
pub const DEFAULT_LIBRARY_PATH: &str = "/app/lib/sandbox_fs.so";
pub const DEFAULT_WORKING_DIR: &str = "/filesystem";
pub const DEFAULT_BLOCKED: [&str; 2] = ["/app", "/.apps_data"];

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("cannot read profile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("blocked path {0:?} must be absolute and must not contain ':'")]
    InvalidBlockedPath(PathBuf),
}

/// On-disk profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFile {
    pub sandbox: ProfileSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileSection {
    pub blocked_paths: Option<Vec<PathBuf>>,
    pub library_path: Option<PathBuf>,
    pub debug: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub working_dir: Option<PathBuf>,
}

/// Command-line values; `None`/empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub blocked_paths: Vec<PathBuf>,
    pub library_path: Option<PathBuf>,
    pub debug: bool,
    pub timeout_secs: Option<u64>,
    pub working_dir: Option<PathBuf>,
}

/// Effective launcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxProfile {
    pub blocked_paths: Vec<PathBuf>,
    pub library_path: PathBuf,
    pub debug: bool,
    pub timeout: Option<Duration>,
    pub working_dir: PathBuf,
}

fn default_blocked() -> Vec<PathBuf> {
    DEFAULT_BLOCKED.iter().map(PathBuf::from).collect()
}

fn or_default_blocked(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    if paths.is_empty() {
        warn!("Empty blocked path list, using the defaults {:?}", DEFAULT_BLOCKED);
        return default_blocked();
    }
    paths
}

impl Default for SandboxProfile {
    fn default() -> Self {
        Self {
            blocked_paths: default_blocked(),
            library_path: PathBuf::from(DEFAULT_LIBRARY_PATH),
            debug: false,
            timeout: None,
            working_dir: PathBuf::from(DEFAULT_WORKING_DIR),
        }
    }
}

impl SandboxProfile {
    /// Defaults, then the profile file, then the process environment.
    pub fn load(config: Option<&Path>) -> Result<Self, ProfileError> {
        let mut profile = Self::default();
        if let Some(path) = config {
            debug!("Loading sandbox profile from {:?}", path);
            let contents = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            profile.merge(Self::parse(&contents)?);
        }
        profile.apply_env(|key| std::env::var_os(key));
        Ok(profile)
    }

    pub fn parse(contents: &str) -> Result<ProfileSection, ProfileError> {
        let file: ProfileFile = toml::from_str(contents)?;
        Ok(file.sandbox)
    }

    pub fn merge(&mut self, section: ProfileSection) {
        if let Some(paths) = section.blocked_paths {
            self.blocked_paths = or_default_blocked(paths);
        }
        if let Some(library) = section.library_path {
            self.library_path = library;
        }
        if let Some(debug) = section.debug {
            self.debug = debug;
        }
        if let Some(secs) = section.timeout_secs {
            self.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(dir) = section.working_dir {
            self.working_dir = dir;
        }
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<OsString>,
    {
        if let Some(paths) = lookup(BLOCKED_PATHS_ENV) {
            self.blocked_paths = or_default_blocked(
                paths
                    .as_bytes()
                    .split(|&b| b == b':')
                    .filter(|p| !p.is_empty())
                    .map(|p| PathBuf::from(OsStr::from_bytes(p)))
                    .collect(),
            );
        }
        if let Some(library) = lookup(LIBRARY_PATH_ENV) {
            self.library_path = PathBuf::from(library);
        }
        if debug_requested(lookup(DEBUG_ENV).as_deref()) {
            self.debug = true;
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if !overrides.blocked_paths.is_empty() {
            self.blocked_paths = overrides.blocked_paths;
        }
        if let Some(library) = overrides.library_path {
            self.library_path = library;
        }
        if overrides.debug {
            self.debug = true;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(dir) = overrides.working_dir {
            self.working_dir = dir;
        }
    }

    /// Value for `SANDBOX_BLOCKED_PATHS`. Each entry must be absolute and
    /// must not contain the list separator. An empty list falls back to the
    /// defaults: the library treats an empty value as "block nothing".
    pub fn blocked_paths_value(&self) -> Result<OsString, ProfileError> {
        let defaults;
        let paths = if self.blocked_paths.is_empty() {
            defaults = default_blocked();
            &defaults
        } else {
            &self.blocked_paths
        };
        let mut value = OsString::new();
        for (i, path) in paths.iter().enumerate() {
            let bytes = path.as_os_str().as_bytes();
            if !path.is_absolute() || bytes.contains(&b':') {
                return Err(ProfileError::InvalidBlockedPath(path.clone()));
            }
            if i > 0 {
                value.push(":");
            }
            value.push(path.as_os_str());
        }
        Ok(value)
    }
}
