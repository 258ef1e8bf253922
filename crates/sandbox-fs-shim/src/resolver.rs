use std::ffi::{CStr, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use libc::c_char;
use sandbox_fs_core::normalize::PATH_MAX;
use sandbox_fs_core::resolve::{descriptor_link, link_target};
use sandbox_fs_core::{DenyReason, Resolver};

use crate::reals::{ReadlinkFn, RealpathFn, REAL_READLINK, REAL_REALPATH};

/// Lookups through the original `realpath`/`readlink`. Going through our own
/// exports would turn every check on a blocked ancestor into a denial of
/// the lookup itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealResolver;

/// NUL-terminated copy of a path on the stack.
struct CPath {
    buf: [u8; PATH_MAX],
}

impl CPath {
    fn new(path: &Path) -> Result<Self, DenyReason> {
        let bytes = path.as_os_str().as_bytes();
        if bytes.len() >= PATH_MAX || bytes.contains(&0) {
            return Err(DenyReason::PathTooLong);
        }
        let mut buf = [0u8; PATH_MAX];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self { buf })
    }

    fn as_ptr(&self) -> *const c_char {
        self.buf.as_ptr().cast()
    }
}

fn path_from(bytes: &[u8]) -> PathBuf {
    PathBuf::from(OsStr::from_bytes(bytes))
}

impl Resolver for RealResolver {
    fn canonicalize(&self, path: &Path) -> Result<Option<PathBuf>, DenyReason> {
        let real = unsafe { get_real!(REAL_REALPATH, RealpathFn) }
            .ok_or(DenyReason::OriginalSymbolUnavailable(REAL_REALPATH.name()))?;
        let input = CPath::new(path)?;
        let mut out = [0 as c_char; PATH_MAX];
        let resolved = unsafe { real(input.as_ptr(), out.as_mut_ptr()) };
        if resolved.is_null() {
            return Ok(None);
        }
        let bytes = unsafe { CStr::from_ptr(out.as_ptr()) }.to_bytes();
        Ok(Some(path_from(bytes)))
    }

    fn read_link(&self, path: &Path) -> Result<Option<PathBuf>, DenyReason> {
        let real = unsafe { get_real!(REAL_READLINK, ReadlinkFn) }
            .ok_or(DenyReason::OriginalSymbolUnavailable(REAL_READLINK.name()))?;
        let input = CPath::new(path)?;
        let mut out = [0u8; PATH_MAX];
        let n = unsafe { real(input.as_ptr(), out.as_mut_ptr().cast(), out.len()) };
        link_target(&out, n)
    }

    fn current_dir(&self) -> Result<PathBuf, DenyReason> {
        // getcwd is not intercepted.
        std::env::current_dir().map_err(|_| DenyReason::UnresolvableCwd)
    }

    fn descriptor_path(&self, fd: RawFd) -> Result<PathBuf, DenyReason> {
        if fd < 0 {
            return Err(DenyReason::UnresolvableDescriptor(fd));
        }
        match self.read_link(&descriptor_link(fd))? {
            Some(target) => Ok(target),
            None => Err(DenyReason::UnresolvableDescriptor(fd)),
        }
    }
}
