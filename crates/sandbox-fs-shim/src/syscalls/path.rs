use libc::{c_char, size_t};
use sandbox_fs_core::Decision;

use crate::errno::{deny, missing};
use crate::reals::{RealSymbol, RealpathFn, REAL_REALPATH};
use crate::sandbox;

type CanonicalizeFn = unsafe extern "C" fn(*const c_char) -> *mut c_char;
type RealpathChkFn = unsafe extern "C" fn(*const c_char, *mut c_char, size_t) -> *mut c_char;

static REAL_CANONICALIZE_FILE_NAME: RealSymbol = RealSymbol::new("canonicalize_file_name\0");
static REAL_REALPATH_CHK: RealSymbol = RealSymbol::new("__realpath_chk\0");

/// Check a resolved path handed back by libc. `owned` results were
/// allocated by libc for the caller and are released on denial.
unsafe fn check_resolved(result: *mut c_char, owned: bool) -> *mut c_char {
    if result.is_null() {
        return result;
    }
    match sandbox::check_path(result) {
        Decision::Allow => result,
        Decision::Deny(reason) => {
            if owned {
                libc::free(result.cast());
            } else {
                *result = 0;
            }
            deny(&reason)
        }
    }
}

/// The input is checked as given; the resolved result is checked again so
/// that a link out of an allowed directory does not leak a blocked path.
#[no_mangle]
pub unsafe extern "C" fn realpath(path: *const c_char, resolved: *mut c_char) -> *mut c_char {
    if let Decision::Deny(reason) = sandbox::check_path(path) {
        return deny(&reason);
    }
    let Some(real) = get_real!(REAL_REALPATH, RealpathFn) else {
        return missing(&REAL_REALPATH);
    };
    check_resolved(real(path, resolved), resolved.is_null())
}

#[no_mangle]
pub unsafe extern "C" fn __realpath_chk(
    path: *const c_char,
    resolved: *mut c_char,
    resolvedlen: size_t,
) -> *mut c_char {
    if let Decision::Deny(reason) = sandbox::check_path(path) {
        return deny(&reason);
    }
    let Some(real) = get_real!(REAL_REALPATH_CHK, RealpathChkFn) else {
        return missing(&REAL_REALPATH_CHK);
    };
    check_resolved(real(path, resolved, resolvedlen), resolved.is_null())
}

#[no_mangle]
pub unsafe extern "C" fn canonicalize_file_name(path: *const c_char) -> *mut c_char {
    if let Decision::Deny(reason) = sandbox::check_path(path) {
        return deny(&reason);
    }
    let Some(real) = get_real!(REAL_CANONICALIZE_FILE_NAME, CanonicalizeFn) else {
        return missing(&REAL_CANONICALIZE_FILE_NAME);
    };
    check_resolved(real(path), true)
}
