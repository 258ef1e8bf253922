//! C-argument front end of the decision engine.
//!
//! Every check runs inside `catch_unwind`: a panic anywhere in the decision
//! becomes a denial, never an unwind into C. `errno` is restored afterwards
//! so that lookups made while deciding are invisible to the caller.

use std::ffi::{CStr, CString, OsStr};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use libc::{c_char, c_int};
use sandbox_fs_core::search::{exec_candidates, keep_searching};
use sandbox_fs_core::{Decision, DecisionLine, DenyReason, DiagnosticSink, Engine};

use crate::errno::{errno, set_errno};
use crate::resolver::RealResolver;
use crate::state;

/// Debug lines on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn decision(&self, path: &Path, decision: &Decision) {
        sandbox_log!("{}", DecisionLine::new(path, decision));
    }
}

/// Borrow a C string as a path. `None` for NULL.
pub unsafe fn c_path<'a>(ptr: *const c_char) -> Option<&'a Path> {
    if ptr.is_null() {
        return None;
    }
    Some(Path::new(OsStr::from_bytes(CStr::from_ptr(ptr).to_bytes())))
}

fn decide<F>(check: F) -> Decision
where
    F: FnOnce(&Engine<'_, RealResolver, StderrSink>) -> Decision,
{
    let saved = unsafe { errno() };
    let decision = catch_unwind(AssertUnwindSafe(|| {
        let engine = Engine::new(state::get(), &RealResolver, &StderrSink);
        check(&engine)
    }))
    .unwrap_or(Decision::Deny(DenyReason::FailClosed));
    unsafe { set_errno(saved) };
    decision
}

pub unsafe fn check_path(path: *const c_char) -> Decision {
    let path = c_path(path);
    decide(|engine| match path {
        Some(path) => engine.check_path(path),
        None => engine.check_absent(),
    })
}

pub unsafe fn check_at(dirfd: libc::c_int, path: *const c_char) -> Decision {
    let path = c_path(path);
    decide(|engine| match path {
        Some(path) => engine.check_path_at(dirfd, path),
        None => engine.check_absent(),
    })
}

/// Both sides of a rename or hard link.
pub unsafe fn check_pair(from: *const c_char, to: *const c_char) -> Decision {
    match check_path(from) {
        Decision::Allow => check_path(to),
        denied => denied,
    }
}

pub unsafe fn check_pair_at(
    from_dirfd: libc::c_int,
    from: *const c_char,
    to_dirfd: libc::c_int,
    to: *const c_char,
) -> Decision {
    match check_at(from_dirfd, from) {
        Decision::Allow => check_at(to_dirfd, to),
        denied => denied,
    }
}

pub unsafe fn check_symlink(
    target: *const c_char,
    dirfd: libc::c_int,
    linkpath: *const c_char,
) -> Decision {
    let target = c_path(target);
    let linkpath = c_path(linkpath);
    decide(|engine| match (target, linkpath) {
        (Some(target), Some(linkpath)) => engine.check_symlink(target, dirfd, linkpath),
        _ => engine.check_absent(),
    })
}

pub fn check_fd(fd: libc::c_int) -> Decision {
    decide(|engine| engine.check_descriptor(fd))
}

/// Run `attempt` on each `PATH` candidate for `file` the way execvp
/// searches. A denied candidate counts as `EACCES` and the search goes on,
/// so a blocked early entry never shadows an allowed later one and is never
/// tried. `attempt` returns 0 on success or the error number of the failed
/// try. The result is 0 or the error number to report.
pub unsafe fn search_exec<F>(file: *const c_char, mut attempt: F) -> c_int
where
    F: FnMut(*const c_char) -> c_int,
{
    let Some(name) = c_path(file) else {
        return deny_or(check_path(file), libc::EFAULT);
    };
    let candidates = catch_unwind(|| {
        let search_path = std::env::var_os("PATH");
        exec_candidates(name.as_os_str(), search_path.as_deref())
    });
    let Ok(candidates) = candidates else {
        return DenyReason::FailClosed.errno();
    };
    if candidates.is_empty() {
        return deny_or(decide(|engine| engine.check_absent()), libc::ENOENT);
    }

    let mut got_eacces = false;
    for candidate in candidates {
        let Ok(c_candidate) = CString::new(candidate.into_os_string().into_vec()) else {
            continue;
        };
        if check_path(c_candidate.as_ptr()).is_denied() {
            got_eacces = true;
            continue;
        }
        match attempt(c_candidate.as_ptr()) {
            0 => return 0,
            libc::EACCES => got_eacces = true,
            err if keep_searching(err) => {}
            err => return err,
        }
    }
    if got_eacces {
        libc::EACCES
    } else {
        libc::ENOENT
    }
}

/// The deny error number, or `otherwise` when allowed.
fn deny_or(decision: Decision, otherwise: c_int) -> c_int {
    match decision {
        Decision::Deny(reason) => reason.errno(),
        Decision::Allow => otherwise,
    }
}
