use libc::{c_int, ssize_t};
use sandbox_fs_core::DenyReason;

use crate::reals::RealSymbol;

pub unsafe fn set_errno(value: c_int) {
    *libc::__errno_location() = value;
}

pub unsafe fn errno() -> c_int {
    *libc::__errno_location()
}

/// The value an intercepted function returns when it refuses a call.
pub trait DenyReturn {
    fn denied() -> Self;
}

impl DenyReturn for c_int {
    fn denied() -> Self {
        -1
    }
}

impl DenyReturn for ssize_t {
    fn denied() -> Self {
        -1
    }
}

impl<T> DenyReturn for *mut T {
    fn denied() -> Self {
        std::ptr::null_mut()
    }
}

pub unsafe fn deny<T: DenyReturn>(reason: &DenyReason) -> T {
    set_errno(reason.errno());
    T::denied()
}

/// The original function is gone; refuse rather than guess.
pub unsafe fn missing<T: DenyReturn>(symbol: &RealSymbol) -> T {
    let reason = DenyReason::OriginalSymbolUnavailable(symbol.name());
    sandbox_error!("{}", reason);
    deny(&reason)
}
