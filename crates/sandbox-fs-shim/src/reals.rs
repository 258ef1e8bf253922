use libc::{c_char, c_void};
use std::sync::atomic::{AtomicPtr, Ordering};

/// Lazily resolved `dlsym(RTLD_NEXT, name)`: the definition our export
/// shadows. Calling it never comes back through this library.
pub struct RealSymbol {
    ptr: AtomicPtr<c_void>,
    /// NUL-terminated.
    name: &'static str,
}

impl RealSymbol {
    pub const fn new(name: &'static str) -> Self {
        Self {
            ptr: AtomicPtr::new(std::ptr::null_mut()),
            name,
        }
    }

    /// `None` when no later object defines the symbol.
    pub unsafe fn get(&self) -> Option<*mut c_void> {
        let p = self.ptr.load(Ordering::Acquire);
        if !p.is_null() {
            return Some(p);
        }
        let f = libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr() as *const c_char);
        if f.is_null() {
            return None;
        }
        self.ptr.store(f, Ordering::Release);
        Some(f)
    }

    pub fn name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

// Shared between the interceptors and the resolver the decision engine uses.
pub static REAL_REALPATH: RealSymbol = RealSymbol::new("realpath\0");
pub static REAL_READLINK: RealSymbol = RealSymbol::new("readlink\0");

pub type RealpathFn = unsafe extern "C" fn(*const c_char, *mut c_char) -> *mut c_char;
pub type ReadlinkFn = unsafe extern "C" fn(*const c_char, *mut c_char, libc::size_t) -> libc::ssize_t;
