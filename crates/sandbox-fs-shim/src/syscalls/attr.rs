use libc::{
    c_char, c_int, c_void, dev_t, gid_t, mode_t, off64_t, off_t, size_t, ssize_t, timespec,
    timeval, uid_t, utimbuf,
};

use crate::sandbox;

intercept! {
    fn chmod(path: *const c_char, mode: mode_t) -> c_int = sandbox::check_path(path);
    fn fchmodat(dirfd: c_int, path: *const c_char, mode: mode_t, flags: c_int) -> c_int =
        sandbox::check_at(dirfd, path);
    fn chown(path: *const c_char, owner: uid_t, group: gid_t) -> c_int = sandbox::check_path(path);
    fn lchown(path: *const c_char, owner: uid_t, group: gid_t) -> c_int = sandbox::check_path(path);
    fn fchownat(
        dirfd: c_int,
        path: *const c_char,
        owner: uid_t,
        group: gid_t,
        flags: c_int,
    ) -> c_int = sandbox::check_at(dirfd, path);
    fn truncate(path: *const c_char, length: off_t) -> c_int = sandbox::check_path(path);
    fn truncate64(path: *const c_char, length: off64_t) -> c_int = sandbox::check_path(path);

    fn getxattr(path: *const c_char, name: *const c_char, value: *mut c_void, size: size_t) -> ssize_t =
        sandbox::check_path(path);
    fn lgetxattr(path: *const c_char, name: *const c_char, value: *mut c_void, size: size_t) -> ssize_t =
        sandbox::check_path(path);
    fn setxattr(
        path: *const c_char,
        name: *const c_char,
        value: *const c_void,
        size: size_t,
        flags: c_int,
    ) -> c_int = sandbox::check_path(path);
    fn lsetxattr(
        path: *const c_char,
        name: *const c_char,
        value: *const c_void,
        size: size_t,
        flags: c_int,
    ) -> c_int = sandbox::check_path(path);
    fn removexattr(path: *const c_char, name: *const c_char) -> c_int = sandbox::check_path(path);
    fn lremovexattr(path: *const c_char, name: *const c_char) -> c_int = sandbox::check_path(path);
    fn listxattr(path: *const c_char, list: *mut c_char, size: size_t) -> ssize_t =
        sandbox::check_path(path);
    fn llistxattr(path: *const c_char, list: *mut c_char, size: size_t) -> ssize_t =
        sandbox::check_path(path);

    fn utime(path: *const c_char, times: *const utimbuf) -> c_int = sandbox::check_path(path);
    fn utimes(path: *const c_char, times: *const timeval) -> c_int = sandbox::check_path(path);
    fn lutimes(path: *const c_char, times: *const timeval) -> c_int = sandbox::check_path(path);
    fn utimensat(dirfd: c_int, path: *const c_char, times: *const timespec, flags: c_int) -> c_int =
        sandbox::check_at(dirfd, path);
    fn futimesat(dirfd: c_int, path: *const c_char, times: *const timeval) -> c_int =
        sandbox::check_at(dirfd, path);

    fn mknod(path: *const c_char, mode: mode_t, dev: dev_t) -> c_int = sandbox::check_path(path);
    fn mknodat(dirfd: c_int, path: *const c_char, mode: mode_t, dev: dev_t) -> c_int =
        sandbox::check_at(dirfd, path);
    fn mkfifo(path: *const c_char, mode: mode_t) -> c_int = sandbox::check_path(path);
    fn mkfifoat(dirfd: c_int, path: *const c_char, mode: mode_t) -> c_int =
        sandbox::check_at(dirfd, path);
}
