use std::ptr;

use libc::{c_char, c_int, pid_t, posix_spawn_file_actions_t, posix_spawnattr_t};
use sandbox_fs_core::search::split_arg_list;
use sandbox_fs_core::{Decision, DenyReason};

use crate::errno::{errno, set_errno};
use crate::reals::RealSymbol;
use crate::sandbox;

extern "C" {
    static environ: *const *const c_char;
}

// glibc implements execv, fexecve and the execl forms on top of a hidden
// execve alias, so each needs its own export.
intercept! {
    fn execve(path: *const c_char, argv: *const *const c_char, envp: *const *const c_char) -> c_int =
        sandbox::check_path(path);
    fn execveat(
        dirfd: c_int,
        path: *const c_char,
        argv: *const *const c_char,
        envp: *const *const c_char,
        flags: c_int,
    ) -> c_int = sandbox::check_at(dirfd, path);
    fn execv(path: *const c_char, argv: *const *const c_char) -> c_int = sandbox::check_path(path);
    fn fexecve(fd: c_int, argv: *const *const c_char, envp: *const *const c_char) -> c_int =
        sandbox::check_fd(fd);
}

type ExecveFn =
    unsafe extern "C" fn(*const c_char, *const *const c_char, *const *const c_char) -> c_int;

static REAL_EXECVE: RealSymbol = RealSymbol::new("execve\0");

const SHELL: *const c_char = b"/bin/sh\0".as_ptr() as *const c_char;

/// execvpe with the search done here, each candidate checked before the
/// original execve sees it.
unsafe fn exec_search(
    file: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let Some(real) = get_real!(REAL_EXECVE, ExecveFn) else {
        return crate::errno::missing(&REAL_EXECVE);
    };
    let err = sandbox::search_exec(file, |candidate| {
        real(candidate, argv, envp);
        match errno() {
            libc::ENOEXEC => exec_script(real, candidate, argv, envp),
            err => err,
        }
    });
    set_errno(err);
    -1
}

/// A candidate without a recognised executable format is run by `/bin/sh`,
/// as execvp does.
unsafe fn exec_script(
    real: ExecveFn,
    script: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    if let Decision::Deny(reason) = sandbox::check_path(SHELL) {
        return reason.errno();
    }
    let mut args = vec![SHELL, script];
    if !argv.is_null() && !(*argv).is_null() {
        let mut i = 1;
        while !(*argv.add(i)).is_null() {
            args.push(*argv.add(i));
            i += 1;
        }
    }
    args.push(ptr::null());
    real(SHELL, args.as_ptr(), envp);
    errno()
}

#[no_mangle]
pub unsafe extern "C" fn execvp(file: *const c_char, argv: *const *const c_char) -> c_int {
    exec_search(file, argv, environ)
}

#[no_mangle]
pub unsafe extern "C" fn execvpe(
    file: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    exec_search(file, argv, envp)
}

/// Argument slots after the path accepted by the list forms.
const LIST_SLOTS: usize = 32;

unsafe fn list_too_long() -> c_int {
    sandbox_error!("exec argument list exceeds {} entries, refusing", LIST_SLOTS);
    set_errno(libc::E2BIG);
    -1
}

// On the Linux x86_64 and aarch64 calling conventions variadic pointer
// arguments occupy the same registers and stack slots as named ones, so a
// fixed-arity export receives them in order. Slots past the terminator hold
// whatever the caller's frame holds there and are never dereferenced.
macro_rules! list_forms {
    ($($slot:ident)*) => {
        #[no_mangle]
        pub unsafe extern "C" fn execl(path: *const c_char, $($slot: *const c_char),*) -> c_int {
            let slots = [$($slot),*];
            match split_arg_list(&slots, false, |p| p.is_null()) {
                Some((argv, _)) => execv(path, argv.as_ptr()),
                None => list_too_long(),
            }
        }

        #[no_mangle]
        pub unsafe extern "C" fn execlp(file: *const c_char, $($slot: *const c_char),*) -> c_int {
            let slots = [$($slot),*];
            match split_arg_list(&slots, false, |p| p.is_null()) {
                Some((argv, _)) => execvp(file, argv.as_ptr()),
                None => list_too_long(),
            }
        }

        #[no_mangle]
        pub unsafe extern "C" fn execle(path: *const c_char, $($slot: *const c_char),*) -> c_int {
            let slots = [$($slot),*];
            match split_arg_list(&slots, true, |p| p.is_null()) {
                Some((argv, Some(envp))) => execve(path, argv.as_ptr(), envp.cast()),
                _ => list_too_long(),
            }
        }

        const _: () = assert!([$(stringify!($slot)),*].len() == LIST_SLOTS);
    };
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
list_forms!(
    a0 a1 a2 a3 a4 a5 a6 a7 a8 a9 a10 a11 a12 a13 a14 a15
    a16 a17 a18 a19 a20 a21 a22 a23 a24 a25 a26 a27 a28 a29 a30 a31
);

type PosixSpawnFn = unsafe extern "C" fn(
    *mut pid_t,
    *const c_char,
    *const posix_spawn_file_actions_t,
    *const posix_spawnattr_t,
    *const *mut c_char,
    *const *mut c_char,
) -> c_int;

static REAL_POSIX_SPAWN: RealSymbol = RealSymbol::new("posix_spawn\0");

/// The posix_spawn family reports failure as a return value and leaves
/// `errno` alone.
unsafe fn real_posix_spawn() -> Result<PosixSpawnFn, c_int> {
    get_real!(REAL_POSIX_SPAWN, PosixSpawnFn).ok_or_else(|| {
        let reason = DenyReason::OriginalSymbolUnavailable(REAL_POSIX_SPAWN.name());
        sandbox_error!("{}", reason);
        reason.errno()
    })
}

#[no_mangle]
pub unsafe extern "C" fn posix_spawn(
    pid: *mut pid_t,
    path: *const c_char,
    file_actions: *const posix_spawn_file_actions_t,
    attrp: *const posix_spawnattr_t,
    argv: *const *mut c_char,
    envp: *const *mut c_char,
) -> c_int {
    if let Decision::Deny(reason) = sandbox::check_path(path) {
        return reason.errno();
    }
    match real_posix_spawn() {
        Ok(spawn) => spawn(pid, path, file_actions, attrp, argv, envp),
        Err(err) => err,
    }
}

/// Searched like execvp; each candidate goes to the original posix_spawn.
#[no_mangle]
pub unsafe extern "C" fn posix_spawnp(
    pid: *mut pid_t,
    file: *const c_char,
    file_actions: *const posix_spawn_file_actions_t,
    attrp: *const posix_spawnattr_t,
    argv: *const *mut c_char,
    envp: *const *mut c_char,
) -> c_int {
    let spawn = match real_posix_spawn() {
        Ok(spawn) => spawn,
        Err(err) => return err,
    };
    let saved = errno();
    let ret = sandbox::search_exec(file, |candidate| {
        spawn(pid, candidate, file_actions, attrp, argv, envp)
    });
    set_errno(saved);
    ret
}
