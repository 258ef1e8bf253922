use libc::{c_char, c_int, c_uint, c_void};

use crate::sandbox;

intercept! {
    fn stat(path: *const c_char, buf: *mut libc::stat) -> c_int = sandbox::check_path(path);
    fn stat64(path: *const c_char, buf: *mut libc::stat64) -> c_int = sandbox::check_path(path);
    fn lstat(path: *const c_char, buf: *mut libc::stat) -> c_int = sandbox::check_path(path);
    fn lstat64(path: *const c_char, buf: *mut libc::stat64) -> c_int = sandbox::check_path(path);
    fn fstatat(dirfd: c_int, path: *const c_char, buf: *mut libc::stat, flags: c_int) -> c_int =
        sandbox::check_at(dirfd, path);
    fn fstatat64(dirfd: c_int, path: *const c_char, buf: *mut libc::stat64, flags: c_int) -> c_int =
        sandbox::check_at(dirfd, path);

    // Pre-2.33 glibc routes stat() through these versioned entry points.
    fn __xstat(ver: c_int, path: *const c_char, buf: *mut libc::stat) -> c_int =
        sandbox::check_path(path);
    fn __xstat64(ver: c_int, path: *const c_char, buf: *mut libc::stat64) -> c_int =
        sandbox::check_path(path);
    fn __lxstat(ver: c_int, path: *const c_char, buf: *mut libc::stat) -> c_int =
        sandbox::check_path(path);
    fn __lxstat64(ver: c_int, path: *const c_char, buf: *mut libc::stat64) -> c_int =
        sandbox::check_path(path);
    fn __fxstatat(
        ver: c_int,
        dirfd: c_int,
        path: *const c_char,
        buf: *mut libc::stat,
        flags: c_int,
    ) -> c_int = sandbox::check_at(dirfd, path);
    fn __fxstatat64(
        ver: c_int,
        dirfd: c_int,
        path: *const c_char,
        buf: *mut libc::stat64,
        flags: c_int,
    ) -> c_int = sandbox::check_at(dirfd, path);

    fn statx(
        dirfd: c_int,
        path: *const c_char,
        flags: c_int,
        mask: c_uint,
        buf: *mut c_void,
    ) -> c_int = sandbox::check_at(dirfd, path);

    fn access(path: *const c_char, mode: c_int) -> c_int = sandbox::check_path(path);
    fn faccessat(dirfd: c_int, path: *const c_char, mode: c_int, flags: c_int) -> c_int =
        sandbox::check_at(dirfd, path);
    fn euidaccess(path: *const c_char, mode: c_int) -> c_int = sandbox::check_path(path);
    fn eaccess(path: *const c_char, mode: c_int) -> c_int = sandbox::check_path(path);
}
