//! Process-wide sandbox state.
//!
//! Computed exactly once, by whichever comes first: the `.init_array`
//! constructor or the first intercepted call. Concurrent first callers
//! block until the winner has finished. If the initializing thread itself
//! re-enters an intercepted function (for example through an allocator or
//! loader hook), it is answered from a deny-all state instead of deadlocking
//! on the cell.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;

use sandbox_fs_core::config::{debug_requested, DEBUG_ENV};
use sandbox_fs_core::{SandboxConfig, SandboxState};

use crate::resolver::RealResolver;

static STATE: OnceLock<SandboxState> = OnceLock::new();

/// Thread id currently running [`load`], 0 when none.
static INIT_OWNER: AtomicI64 = AtomicI64::new(0);

static REENTERED: SandboxState = SandboxState::Failed { debug: false };

fn current_tid() -> i64 {
    unsafe { libc::syscall(libc::SYS_gettid) as i64 }
}

pub fn get() -> &'static SandboxState {
    if let Some(state) = STATE.get() {
        return state;
    }
    let tid = current_tid();
    if INIT_OWNER.load(Ordering::Acquire) == tid {
        return &REENTERED;
    }
    STATE.get_or_init(|| {
        INIT_OWNER.store(tid, Ordering::Release);
        let state = load();
        INIT_OWNER.store(0, Ordering::Release);
        state
    })
}

/// Debug flag of the settled state; false until initialization finished.
pub fn debug_enabled() -> bool {
    STATE.get().is_some_and(SandboxState::debug)
}

fn load() -> SandboxState {
    let debug = debug_requested(std::env::var_os(DEBUG_ENV).as_deref());
    let config =
        SandboxConfig::from_env().and_then(|config| config.with_canonical_aliases(&RealResolver));

    match config {
        Ok(config) => SandboxState::ready(config),
        Err(err) => {
            sandbox_error!("{}, denying all filesystem access", err);
            SandboxState::failed(debug)
        }
    }
}
