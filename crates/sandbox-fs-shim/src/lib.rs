//! # sandbox-fs-shim
//!
//! `libsandbox_fs.so`: preload it and every filesystem entry point of the
//! process is checked against `SANDBOX_BLOCKED_PATHS` before reaching libc.
//! A blocked call fails with `EACCES`; so does every call when the sandbox
//! could not be configured.
//!
//! Linux/glibc only.

// Unsafe FFI exports mirror the C prototypes they replace.
#![allow(clippy::missing_safety_doc)]

// Macros must be defined before modules that use them
#[macro_use]
pub mod macros;

#[cfg(target_os = "linux")]
pub mod errno;
#[cfg(target_os = "linux")]
pub mod reals;
#[cfg(target_os = "linux")]
pub mod resolver;
#[cfg(target_os = "linux")]
pub mod sandbox;
#[cfg(target_os = "linux")]
pub mod state;
#[cfg(target_os = "linux")]
pub mod syscalls;

/// Loads the configuration as soon as the library is mapped, before `main`
/// and before any intercepted call can race for it.
#[cfg(target_os = "linux")]
#[link_section = ".init_array"]
#[used]
pub static SANDBOX_INIT: unsafe extern "C" fn() = {
    unsafe extern "C" fn init() {
        let ready = std::panic::catch_unwind(|| !crate::state::get().is_failed());
        if ready.unwrap_or(false) {
            sandbox_debug!("Sandbox filesystem interception active");
        }
    }
    init
};

#[cfg(target_os = "linux")]
#[link_section = ".fini_array"]
#[used]
pub static SANDBOX_FINI: unsafe extern "C" fn() = {
    unsafe extern "C" fn fini() {
        sandbox_debug!("Sandbox cleanup");
    }
    fini
};
