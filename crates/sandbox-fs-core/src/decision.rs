//! Block-decision engine.
//!
//! A call is denied when either the lexically normalized path or its
//! symlink-resolved form falls under a blocked prefix. Anything the engine
//! cannot establish (working directory, descriptor, original symbols) is a
//! denial, and so is every call once initialization has failed.

use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::BlockedPathSet;
use crate::diag::DiagnosticSink;
use crate::error::{DenyReason, MatchKind};
use crate::normalize::{self, absolutize, fits_path_max, join, parent_dir, split_parent};
use crate::resolve::{descriptor_link, Resolver};
use crate::state::SandboxState;

/// Symlinks followed when chasing a dangling final component, matching
/// the kernel's `MAXSYMLINKS`.
pub const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Deny(_))
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn reason(&self) -> Option<&DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny(reason) => Some(reason),
        }
    }
}

impl From<Result<(), DenyReason>> for Decision {
    fn from(result: Result<(), DenyReason>) -> Self {
        match result {
            Ok(()) => Decision::Allow,
            Err(reason) => Decision::Deny(reason),
        }
    }
}

/// Produces one [`Decision`] per intercepted call. Holds no state of its
/// own beyond borrowed references, so it can be built per call.
pub struct Engine<'a, R: ?Sized, S: ?Sized> {
    state: &'a SandboxState,
    resolver: &'a R,
    sink: &'a S,
}

impl<'a, R, S> Engine<'a, R, S>
where
    R: Resolver + ?Sized,
    S: DiagnosticSink + ?Sized,
{
    pub fn new(state: &'a SandboxState, resolver: &'a R, sink: &'a S) -> Self {
        Self {
            state,
            resolver,
            sink,
        }
    }

    /// A call whose path argument is NULL. Nothing to protect unless the
    /// sandbox failed, in which case everything is denied.
    pub fn check_absent(&self) -> Decision {
        self.decide(Path::new("(null)"), |_| Ok(()))
    }

    /// Path relative to the working directory, or absolute.
    pub fn check_path(&self, path: &Path) -> Decision {
        self.decide(path, |blocked| {
            let absolute = self.absolute(path)?;
            self.check_absolute(blocked, &absolute)
        })
    }

    /// `*at()` form: `path` is relative to `dirfd` unless absolute or
    /// `dirfd` is `AT_FDCWD`. An empty path names the descriptor itself.
    pub fn check_path_at(&self, dirfd: RawFd, path: &Path) -> Decision {
        self.decide(path, |blocked| {
            if path.as_os_str().is_empty() && dirfd != libc::AT_FDCWD {
                return self.check_fd_target(blocked, dirfd);
            }
            let absolute = self.absolute_at(dirfd, path)?;
            self.check_absolute(blocked, &absolute)
        })
    }

    /// The object an open descriptor refers to (`fchdir`).
    pub fn check_descriptor(&self, fd: RawFd) -> Decision {
        self.decide(&descriptor_link(fd), |blocked| self.check_fd_target(blocked, fd))
    }

    /// Creation of a symlink at `linkpath` (relative to `dirfd`) pointing
    /// to `target`. Both the link location and the target are checked; a
    /// relative target is interpreted against the directory that will
    /// contain the link, which is how the kernel follows it later.
    pub fn check_symlink(&self, target: &Path, dirfd: RawFd, linkpath: &Path) -> Decision {
        self.decide(linkpath, |blocked| {
            let link = self.absolute_at(dirfd, linkpath)?;
            self.check_absolute(blocked, &link)?;

            let target = if normalize::is_absolute(target) {
                target.to_path_buf()
            } else {
                join(parent_dir(&link), target)
            };
            debug!(link = %link.display(), target = %target.display(), "checking symlink target");
            self.check_absolute(blocked, &target)
        })
    }

    fn decide<F>(&self, path: &Path, check: F) -> Decision
    where
        F: FnOnce(&BlockedPathSet) -> Result<(), DenyReason>,
    {
        let decision: Decision = match self.state {
            SandboxState::Ready { blocked, .. } => check(blocked).into(),
            SandboxState::Uninitialized | SandboxState::Failed { .. } => {
                Decision::Deny(DenyReason::FailClosed)
            }
        };

        if let Decision::Deny(reason) = &decision {
            debug!(path = %path.display(), %reason, "denied");
        }
        if self.state.debug() {
            self.sink.decision(path, &decision);
        }
        decision
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf, DenyReason> {
        if normalize::is_absolute(path) {
            return Ok(path.to_path_buf());
        }
        let cwd = self.resolver.current_dir()?;
        Ok(join(&cwd, path))
    }

    fn absolute_at(&self, dirfd: RawFd, path: &Path) -> Result<PathBuf, DenyReason> {
        if normalize::is_absolute(path) || dirfd == libc::AT_FDCWD {
            return self.absolute(path);
        }
        let base = self.resolver.descriptor_path(dirfd).map_err(|reason| {
            warn!(fd = dirfd, path = %path.display(), %reason, "cannot resolve dirfd, denying");
            reason
        })?;
        // Pipes and sockets cannot anchor a path lookup.
        if !normalize::is_absolute(&base) {
            return Err(DenyReason::UnresolvableDescriptor(dirfd));
        }
        Ok(join(&base, path))
    }

    /// Descriptor used on its own. Objects outside the filesystem
    /// (`pipe:[..]`, `socket:[..]`, `anon_inode:..`) have nothing to block.
    fn check_fd_target(&self, blocked: &BlockedPathSet, fd: RawFd) -> Result<(), DenyReason> {
        let target = self.resolver.descriptor_path(fd).map_err(|reason| {
            warn!(fd, %reason, "cannot resolve descriptor, denying");
            reason
        })?;
        if !normalize::is_absolute(&target) {
            debug!(fd, target = %target.display(), "descriptor is not a filesystem path");
            return Ok(());
        }
        self.check_absolute(blocked, &target)
    }

    fn check_absolute(&self, blocked: &BlockedPathSet, path: &Path) -> Result<(), DenyReason> {
        if blocked.is_empty() {
            return Ok(());
        }
        if !fits_path_max(path) {
            return Err(DenyReason::PathTooLong);
        }
        deny_if_blocked(blocked, &normalize::normalize(path), MatchKind::Literal)?;
        self.check_canonical(blocked, path, 0)
    }

    /// Canonical form of `path`, falling back to the canonical parent plus
    /// the final component when the path does not exist yet. No verdict
    /// when neither resolves; the literal check stands alone then.
    fn check_canonical(
        &self,
        blocked: &BlockedPathSet,
        path: &Path,
        hops: usize,
    ) -> Result<(), DenyReason> {
        if let Some(resolved) = self.resolver.canonicalize(path)? {
            return deny_if_blocked(blocked, &resolved, MatchKind::Resolved);
        }

        let Some((parent, name)) = split_parent(path) else {
            return Ok(());
        };
        let Some(parent) = self.resolver.canonicalize(parent)? else {
            return Ok(());
        };
        let candidate = normalize::normalize(&join(&parent, name));
        deny_if_blocked(blocked, &candidate, MatchKind::ParentResolved)?;

        // A dangling symlink is followed on create, so its target counts.
        let Some(target) = self.resolver.read_link(&candidate)? else {
            return Ok(());
        };
        if hops >= MAX_SYMLINK_HOPS {
            return Err(DenyReason::SymlinkLoop);
        }
        let next = absolutize(&target, &parent);
        if !fits_path_max(&next) {
            return Err(DenyReason::PathTooLong);
        }
        deny_if_blocked(blocked, &normalize::normalize(&next), MatchKind::DanglingTarget)?;
        self.check_canonical(blocked, &next, hops + 1)
    }
}

fn deny_if_blocked(
    blocked: &BlockedPathSet,
    path: &Path,
    kind: MatchKind,
) -> Result<(), DenyReason> {
    match blocked.matching(path) {
        Some(prefix) => Err(DenyReason::BlockedPath {
            path: path.to_path_buf(),
            prefix: prefix.to_path_buf(),
            kind,
        }),
        None => Ok(()),
    }
}
