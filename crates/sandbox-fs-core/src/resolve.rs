//! Filesystem lookups needed by the decision engine.
//!
//! Inside the preloaded library these must go to the original libc
//! primitives: resolving through an intercepted `realpath` or `readlink`
//! would itself be denied once an ancestor is blocked, and a failed
//! descriptor lookup must never turn into an allow.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use crate::error::DenyReason;

/// Source of symlink, working-directory and descriptor information.
///
/// `Ok(None)` means "no answer" (the path does not exist, is not a link);
/// `Err` means the lookup machinery itself is unusable and the call must be
/// denied.
pub trait Resolver {
    /// `realpath(3)`: fully resolved form of an existing path.
    fn canonicalize(&self, path: &Path) -> Result<Option<PathBuf>, DenyReason>;

    /// `readlink(2)` on the final component.
    fn read_link(&self, path: &Path) -> Result<Option<PathBuf>, DenyReason>;

    fn current_dir(&self) -> Result<PathBuf, DenyReason>;

    /// What an open descriptor refers to, as the kernel reports it. An
    /// absolute path for filesystem objects, a pseudo name such as
    /// `pipe:[1234]` otherwise.
    fn descriptor_path(&self, fd: RawFd) -> Result<PathBuf, DenyReason>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn canonicalize(&self, path: &Path) -> Result<Option<PathBuf>, DenyReason> {
        (**self).canonicalize(path)
    }

    fn read_link(&self, path: &Path) -> Result<Option<PathBuf>, DenyReason> {
        (**self).read_link(path)
    }

    fn current_dir(&self) -> Result<PathBuf, DenyReason> {
        (**self).current_dir()
    }

    fn descriptor_path(&self, fd: RawFd) -> Result<PathBuf, DenyReason> {
        (**self).descriptor_path(fd)
    }
}

/// `/proc/self/fd/<fd>`, the kernel's descriptor-to-path mapping.
pub fn descriptor_link(fd: RawFd) -> PathBuf {
    PathBuf::from(format!("/proc/self/fd/{fd}"))
}

/// Interpret a `readlink(2)` result written into `buf`. A negative count
/// is "not a link". A count filling the whole buffer means the target may
/// have been truncated, which is denied.
pub fn link_target(buf: &[u8], n: isize) -> Result<Option<PathBuf>, DenyReason> {
    if n < 0 {
        return Ok(None);
    }
    let n = n as usize;
    if n >= buf.len() {
        return Err(DenyReason::PathTooLong);
    }
    Ok(Some(PathBuf::from(OsStr::from_bytes(&buf[..n]))))
}

/// Resolver backed by `std::fs`. Only correct outside the preloaded
/// library, where `std::fs` is not intercepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdResolver;

impl Resolver for StdResolver {
    fn canonicalize(&self, path: &Path) -> Result<Option<PathBuf>, DenyReason> {
        Ok(std::fs::canonicalize(path).ok())
    }

    fn read_link(&self, path: &Path) -> Result<Option<PathBuf>, DenyReason> {
        Ok(std::fs::read_link(path).ok())
    }

    fn current_dir(&self) -> Result<PathBuf, DenyReason> {
        std::env::current_dir().map_err(|_| DenyReason::UnresolvableCwd)
    }

    fn descriptor_path(&self, fd: RawFd) -> Result<PathBuf, DenyReason> {
        if fd < 0 {
            return Err(DenyReason::UnresolvableDescriptor(fd));
        }
        std::fs::read_link(descriptor_link(fd)).map_err(|_| DenyReason::UnresolvableDescriptor(fd))
    }
}
