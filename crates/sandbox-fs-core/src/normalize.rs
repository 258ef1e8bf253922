//! Lexical path handling.
//!
//! Nothing here touches the filesystem or follows symlinks. Paths are
//! processed as bytes so that non-UTF-8 names are checked like any other.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

/// Longest path the kernel accepts, including the terminating NUL.
pub const PATH_MAX: usize = libc::PATH_MAX as usize;

/// Resolve `.` and `..` components and collapse repeated or trailing
/// slashes. The result is always absolute: a relative input is treated as
/// if it were rooted, and `..` above the root stays at the root.
///
/// ```
/// use std::path::Path;
/// use sandbox_fs_core::normalize::normalize;
///
/// assert_eq!(normalize(Path::new("/allowed/../app/secret")), Path::new("/app/secret"));
/// assert_eq!(normalize(Path::new("/../..")), Path::new("/"));
/// ```
pub fn normalize(path: &Path) -> PathBuf {
    from_bytes(normalize_bytes(path.as_os_str().as_bytes()))
}

pub(crate) fn normalize_bytes(path: &[u8]) -> Vec<u8> {
    let mut stack: Vec<&[u8]> = Vec::new();
    for component in path.split(|&b| b == b'/') {
        match component {
            b"" | b"." => {}
            b".." => {
                stack.pop();
            }
            name => stack.push(name),
        }
    }

    if stack.is_empty() {
        return b"/".to_vec();
    }
    let mut out = Vec::with_capacity(path.len() + 1);
    for name in stack {
        out.push(b'/');
        out.extend_from_slice(name);
    }
    out
}

/// `path` if it is absolute, otherwise `base/path`. No normalization.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if is_absolute(path) {
        path.to_path_buf()
    } else {
        join(base, path)
    }
}

/// Byte-wise `base + "/" + rel`. Unlike [`Path::join`], an absolute `rel`
/// is appended rather than replacing `base`, and an empty `rel` yields
/// `base` unchanged.
pub fn join(base: &Path, rel: &Path) -> PathBuf {
    let base = base.as_os_str().as_bytes();
    let rel = rel.as_os_str().as_bytes();
    if rel.is_empty() {
        return from_bytes(base.to_vec());
    }
    let mut out = Vec::with_capacity(base.len() + rel.len() + 1);
    out.extend_from_slice(base);
    if !base.ends_with(b"/") {
        out.push(b'/');
    }
    out.extend_from_slice(rel);
    from_bytes(out)
}

/// Split off the final component, ignoring trailing slashes.
///
/// Returns `None` for the root and for a bare name without any slash.
pub fn split_parent(path: &Path) -> Option<(&Path, &Path)> {
    let bytes = trim_trailing_slashes(path.as_os_str().as_bytes());
    let idx = bytes.iter().rposition(|&b| b == b'/')?;
    let name = &bytes[idx + 1..];
    if name.is_empty() {
        return None;
    }
    let parent = if idx == 0 { &bytes[..1] } else { &bytes[..idx] };
    Some((as_path(parent), as_path(name)))
}

/// Directory a path lives in: its parent, or `/` for the root itself.
pub fn parent_dir(path: &Path) -> &Path {
    split_parent(path)
        .map(|(parent, _)| parent)
        .unwrap_or_else(|| Path::new("/"))
}

pub fn is_absolute(path: &Path) -> bool {
    path.as_os_str().as_bytes().first() == Some(&b'/')
}

/// Whether `path` (with its NUL) still fits in a `PATH_MAX` buffer.
pub fn fits_path_max(path: &Path) -> bool {
    path.as_os_str().len() < PATH_MAX
}

fn trim_trailing_slashes(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 1 && bytes[end - 1] == b'/' {
        end -= 1;
    }
    &bytes[..end]
}

pub(crate) fn as_path(bytes: &[u8]) -> &Path {
    Path::new(OsStr::from_bytes(bytes))
}

pub(crate) fn from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(OsString::from_vec(bytes))
}
