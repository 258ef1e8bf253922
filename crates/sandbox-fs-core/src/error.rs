use std::collections::TryReserveError;
use std::fmt;
use std::os::unix::io::RawFd;
use std::path::PathBuf;

/// Failure to build the blocked path set. Any of these puts the sandbox in
/// [`SandboxState::Failed`](crate::SandboxState::Failed).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to allocate memory for blocked paths: {0}")]
    Alloc(#[from] TryReserveError),
    #[error("{count} blocked paths configured, at most {max} are supported")]
    TooManyPaths { count: usize, max: usize },
    #[error("blocked path {0:?} is not absolute")]
    RelativePrefix(String),
}

/// Which stage of the decision matched a blocked prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The lexically normalized path.
    Literal,
    /// The fully canonicalized path.
    Resolved,
    /// Canonical parent directory plus the final component.
    ParentResolved,
    /// Target of a dangling symlink in the final component.
    DanglingTarget,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchKind::Literal => "literal",
            MatchKind::Resolved => "resolved",
            MatchKind::ParentResolved => "parent resolved",
            MatchKind::DanglingTarget => "dangling target",
        })
    }
}

/// Why a call was denied. Every variant surfaces as `EACCES`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("{} matches blocked path {} ({kind})", .path.display(), .prefix.display())]
    BlockedPath {
        path: PathBuf,
        prefix: PathBuf,
        kind: MatchKind,
    },
    #[error("initialization failed, failing closed")]
    FailClosed,
    #[error("cannot resolve directory descriptor {0}")]
    UnresolvableDescriptor(RawFd),
    #[error("cannot determine the working directory")]
    UnresolvableCwd,
    #[error("path exceeds PATH_MAX")]
    PathTooLong,
    #[error("original symbol {0} is unavailable")]
    OriginalSymbolUnavailable(&'static str),
    #[error("too many levels of symbolic links")]
    SymlinkLoop,
}

impl DenyReason {
    /// The errno reported to the caller.
    pub fn errno(&self) -> i32 {
        libc::EACCES
    }
}
