//! Offline verdicts: what the library would decide for a path, evaluated
//! with the same engine against the real filesystem.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sandbox_fs_core::{
    Decision, DecisionLine, Engine, NullSink, SandboxConfig, SandboxState, StdResolver,
};

use crate::profile::SandboxProfile;

pub fn check_paths(profile: &SandboxProfile, paths: &[PathBuf]) -> Result<Vec<Decision>> {
    let blocked = profile.blocked_paths_value()?;
    let config = SandboxConfig::from_vars(Some(blocked.as_os_str()), None)
        .and_then(|config| config.with_canonical_aliases(&StdResolver))
        .context("invalid blocked path configuration")?;
    let state = SandboxState::ready(config);
    let engine = Engine::new(&state, &StdResolver, &NullSink);
    Ok(paths.iter().map(|path| engine.check_path(path)).collect())
}

pub fn render(path: &Path, decision: &Decision) -> String {
    DecisionLine::new(path, decision).to_string()
}
