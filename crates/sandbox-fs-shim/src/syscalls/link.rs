use libc::{c_char, c_int, c_uint, size_t, ssize_t};

use crate::sandbox;

intercept! {
    fn rename(old: *const c_char, new: *const c_char) -> c_int = sandbox::check_pair(old, new);
    fn renameat(olddirfd: c_int, old: *const c_char, newdirfd: c_int, new: *const c_char) -> c_int =
        sandbox::check_pair_at(olddirfd, old, newdirfd, new);
    fn renameat2(
        olddirfd: c_int,
        old: *const c_char,
        newdirfd: c_int,
        new: *const c_char,
        flags: c_uint,
    ) -> c_int = sandbox::check_pair_at(olddirfd, old, newdirfd, new);

    fn link(old: *const c_char, new: *const c_char) -> c_int = sandbox::check_pair(old, new);
    fn linkat(
        olddirfd: c_int,
        old: *const c_char,
        newdirfd: c_int,
        new: *const c_char,
        flags: c_int,
    ) -> c_int = sandbox::check_pair_at(olddirfd, old, newdirfd, new);

    fn symlink(target: *const c_char, linkpath: *const c_char) -> c_int =
        sandbox::check_symlink(target, libc::AT_FDCWD, linkpath);
    fn symlinkat(target: *const c_char, newdirfd: c_int, linkpath: *const c_char) -> c_int =
        sandbox::check_symlink(target, newdirfd, linkpath);

    fn readlink(path: *const c_char, buf: *mut c_char, bufsiz: size_t) -> ssize_t =
        sandbox::check_path(path);
    fn readlinkat(dirfd: c_int, path: *const c_char, buf: *mut c_char, bufsiz: size_t) -> ssize_t =
        sandbox::check_at(dirfd, path);
    fn __readlink_chk(path: *const c_char, buf: *mut c_char, len: size_t, buflen: size_t) -> ssize_t =
        sandbox::check_path(path);
    fn __readlinkat_chk(
        dirfd: c_int,
        path: *const c_char,
        buf: *mut c_char,
        len: size_t,
        buflen: size_t,
    ) -> ssize_t = sandbox::check_at(dirfd, path);
}
