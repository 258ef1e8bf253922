use crate::config::{BlockedPathSet, SandboxConfig};
use crate::error::ConfigError;

/// Process-wide sandbox state. Moves at most once out of `Uninitialized`.
///
/// Only `Ready` lets any call through; the decision engine treats both
/// other states as deny-all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxState {
    Uninitialized,
    Ready { blocked: BlockedPathSet, debug: bool },
    Failed { debug: bool },
}

impl SandboxState {
    pub fn ready(config: SandboxConfig) -> Self {
        SandboxState::Ready {
            blocked: config.blocked,
            debug: config.debug,
        }
    }

    /// Deny-all state. `debug` comes from `SANDBOX_DEBUG`, read
    /// independently of the path list so a failed parse still honors it.
    pub fn failed(debug: bool) -> Self {
        SandboxState::Failed { debug }
    }

    pub fn from_config(config: Result<SandboxConfig, ConfigError>, debug: bool) -> Self {
        match config {
            Ok(config) => Self::ready(config),
            Err(_) => Self::failed(debug),
        }
    }

    pub fn debug(&self) -> bool {
        match self {
            SandboxState::Uninitialized => false,
            SandboxState::Ready { debug, .. } | SandboxState::Failed { debug } => *debug,
        }
    }

    pub fn blocked(&self) -> Option<&BlockedPathSet> {
        match self {
            SandboxState::Ready { blocked, .. } => Some(blocked),
            SandboxState::Uninitialized | SandboxState::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SandboxState::Failed { .. })
    }
}
