use libc::{c_char, c_int, c_uint, mode_t, FILE};
use sandbox_fs_core::Decision;

use crate::errno::{deny, missing};
use crate::reals::RealSymbol;
use crate::sandbox;

// `open` and `openat` are variadic in C. They are exported with the mode as
// a fixed third argument, which on the supported ABIs reads the same
// register or stack slot a variadic caller fills, and forwarded through the
// variadic prototype with the mode only when the flags say one was passed.
type OpenFn = unsafe extern "C" fn(*const c_char, c_int, ...) -> c_int;
type OpenAtFn = unsafe extern "C" fn(c_int, *const c_char, c_int, ...) -> c_int;

static REAL_OPEN: RealSymbol = RealSymbol::new("open\0");
static REAL_OPEN64: RealSymbol = RealSymbol::new("open64\0");
static REAL_OPENAT: RealSymbol = RealSymbol::new("openat\0");
static REAL_OPENAT64: RealSymbol = RealSymbol::new("openat64\0");

/// Flags of an open-family call plus the mode, present only when the call
/// can create a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenCall {
    pub flags: c_int,
    pub mode: Option<mode_t>,
}

impl OpenCall {
    pub fn new(flags: c_int, mode: mode_t) -> Self {
        let creates = flags & libc::O_CREAT != 0 || flags & libc::O_TMPFILE == libc::O_TMPFILE;
        Self {
            flags,
            mode: creates.then_some(mode),
        }
    }
}

unsafe fn forward_open(real: &RealSymbol, path: *const c_char, call: OpenCall) -> c_int {
    let Some(open) = get_real!(real, OpenFn) else {
        return missing(real);
    };
    match call.mode {
        Some(mode) => open(path, call.flags, mode as c_uint),
        None => open(path, call.flags),
    }
}

unsafe fn forward_openat(
    real: &RealSymbol,
    dirfd: c_int,
    path: *const c_char,
    call: OpenCall,
) -> c_int {
    let Some(openat) = get_real!(real, OpenAtFn) else {
        return missing(real);
    };
    match call.mode {
        Some(mode) => openat(dirfd, path, call.flags, mode as c_uint),
        None => openat(dirfd, path, call.flags),
    }
}

#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let call = OpenCall::new(flags, mode);
    if let Decision::Deny(reason) = sandbox::check_path(path) {
        return deny(&reason);
    }
    forward_open(&REAL_OPEN, path, call)
}

#[no_mangle]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let call = OpenCall::new(flags, mode);
    if let Decision::Deny(reason) = sandbox::check_path(path) {
        return deny(&reason);
    }
    forward_open(&REAL_OPEN64, path, call)
}

#[no_mangle]
pub unsafe extern "C" fn openat(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    let call = OpenCall::new(flags, mode);
    if let Decision::Deny(reason) = sandbox::check_at(dirfd, path) {
        return deny(&reason);
    }
    forward_openat(&REAL_OPENAT, dirfd, path, call)
}

#[no_mangle]
pub unsafe extern "C" fn openat64(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    let call = OpenCall::new(flags, mode);
    if let Decision::Deny(reason) = sandbox::check_at(dirfd, path) {
        return deny(&reason);
    }
    forward_openat(&REAL_OPENAT64, dirfd, path, call)
}

intercept! {
    fn creat(path: *const c_char, mode: mode_t) -> c_int = sandbox::check_path(path);
    fn creat64(path: *const c_char, mode: mode_t) -> c_int = sandbox::check_path(path);

    // _FORTIFY_SOURCE variants, called instead of open/openat when the
    // compiler can prove no mode argument is needed.
    fn __open_2(path: *const c_char, flags: c_int) -> c_int = sandbox::check_path(path);
    fn __open64_2(path: *const c_char, flags: c_int) -> c_int = sandbox::check_path(path);
    fn __openat_2(dirfd: c_int, path: *const c_char, flags: c_int) -> c_int =
        sandbox::check_at(dirfd, path);
    fn __openat64_2(dirfd: c_int, path: *const c_char, flags: c_int) -> c_int =
        sandbox::check_at(dirfd, path);

    fn fopen(path: *const c_char, mode: *const c_char) -> *mut FILE = sandbox::check_path(path);
    fn fopen64(path: *const c_char, mode: *const c_char) -> *mut FILE = sandbox::check_path(path);
    // A NULL path reopens the stream's own file: allowed unless the sandbox
    // failed.
    fn freopen(path: *const c_char, mode: *const c_char, stream: *mut FILE) -> *mut FILE =
        sandbox::check_path(path);
    fn freopen64(path: *const c_char, mode: *const c_char, stream: *mut FILE) -> *mut FILE =
        sandbox::check_path(path);
}
