use libc::{c_char, c_int, c_void, mode_t, DIR};

use crate::sandbox;

intercept! {
    fn opendir(path: *const c_char) -> *mut DIR = sandbox::check_path(path);
    fn chdir(path: *const c_char) -> c_int = sandbox::check_path(path);
    fn fchdir(fd: c_int) -> c_int = sandbox::check_fd(fd);

    fn mkdir(path: *const c_char, mode: mode_t) -> c_int = sandbox::check_path(path);
    fn mkdirat(dirfd: c_int, path: *const c_char, mode: mode_t) -> c_int =
        sandbox::check_at(dirfd, path);
    fn rmdir(path: *const c_char) -> c_int = sandbox::check_path(path);
    fn unlink(path: *const c_char) -> c_int = sandbox::check_path(path);
    fn unlinkat(dirfd: c_int, path: *const c_char, flags: c_int) -> c_int =
        sandbox::check_at(dirfd, path);

    // Only the root is checked: glibc walks the tree with internal calls
    // that never reach these exports.
    fn nftw(dirpath: *const c_char, callback: *mut c_void, nopenfd: c_int, flags: c_int) -> c_int =
        sandbox::check_path(dirpath);
    fn nftw64(dirpath: *const c_char, callback: *mut c_void, nopenfd: c_int, flags: c_int) -> c_int =
        sandbox::check_path(dirpath);
    fn ftw(dirpath: *const c_char, callback: *mut c_void, nopenfd: c_int) -> c_int =
        sandbox::check_path(dirpath);
    fn ftw64(dirpath: *const c_char, callback: *mut c_void, nopenfd: c_int) -> c_int =
        sandbox::check_path(dirpath);
}
