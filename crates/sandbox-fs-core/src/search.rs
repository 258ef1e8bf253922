//! `PATH` lookup and argument lists for the exec family.
//!
//! The `p` variants (`execvp`, `execvpe`, `posix_spawnp`) run whichever
//! candidate the search reaches first, so each candidate has to be checked
//! on its own before it is tried.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use crate::normalize::PATH_MAX;

/// glibc's search path when `PATH` is unset (`confstr(_CS_PATH)`).
pub const DEFAULT_SEARCH_PATH: &str = "/bin:/usr/bin";

/// Locations tried for `name`, in order.
///
/// A name containing `/` is used as is. Otherwise each `PATH` entry is
/// prefixed, an empty entry meaning the working directory. Entries that
/// would exceed `PATH_MAX` are skipped. An empty name has no candidates.
pub fn exec_candidates(name: &OsStr, search_path: Option<&OsStr>) -> Vec<PathBuf> {
    let name = name.as_bytes();
    if name.is_empty() {
        return Vec::new();
    }
    if name.contains(&b'/') {
        return vec![PathBuf::from(OsStr::from_bytes(name))];
    }

    let search_path = search_path.unwrap_or(OsStr::new(DEFAULT_SEARCH_PATH));
    search_path
        .as_bytes()
        .split(|&b| b == b':')
        .filter_map(|dir| {
            let mut candidate = Vec::with_capacity(dir.len() + 1 + name.len());
            if !dir.is_empty() {
                candidate.extend_from_slice(dir);
                candidate.push(b'/');
            }
            candidate.extend_from_slice(name);
            (candidate.len() < PATH_MAX).then(|| PathBuf::from(OsStr::from_bytes(&candidate)))
        })
        .collect()
}

/// Whether a failed attempt lets the search move on to the next candidate,
/// as execvp does.
pub fn keep_searching(errno: i32) -> bool {
    matches!(
        errno,
        libc::EACCES | libc::ENOENT | libc::ENOTDIR | libc::ESTALE | libc::ENODEV | libc::ETIMEDOUT
    )
}

/// Split the arguments of an `execl`-style list: the argv entries up to and
/// including the terminator, plus the slot after it when `with_env`
/// (`execle`). `None` if the list does not end within `slots`.
pub fn split_arg_list<T: Copy>(
    slots: &[T],
    with_env: bool,
    is_end: impl Fn(T) -> bool,
) -> Option<(&[T], Option<T>)> {
    let end = slots.iter().position(|&slot| is_end(slot))?;
    let argv = &slots[..=end];
    if !with_env {
        return Some((argv, None));
    }
    let envp = *slots.get(end + 1)?;
    Some((argv, Some(envp)))
}
