/// Room for a tag, a reason and two paths of `PATH_MAX` each.
pub const LOG_BUF_LEN: usize = 2 * libc::PATH_MAX as usize + 256;

/// Write one `[sandbox_fs] ...` line to fd 2.
///
/// Formatting happens in a stack buffer and the line goes out with a single
/// raw `write(2)`, so logging never allocates and never re-enters an
/// intercepted stdio function. Overlong lines are truncated but always end
/// with a newline.
#[macro_export]
macro_rules! sandbox_log {
    ($($arg:tt)*) => {{
        use std::fmt::Write as _;
        let mut buf = [0u8; $crate::macros::LOG_BUF_LEN];
        let mut writer = $crate::macros::StackWriter::new(&mut buf);
        let _ = write!(writer, "{} ", sandbox_fs_core::LOG_TAG);
        let _ = write!(writer, $($arg)*);
        let line = writer.finish();
        #[allow(unused_unsafe)]
        unsafe {
            libc::write(2, line.as_ptr().cast(), line.len());
        }
    }};
}

/// Only with `SANDBOX_DEBUG=1`.
#[macro_export]
macro_rules! sandbox_debug {
    ($($arg:tt)*) => {
        if $crate::state::debug_enabled() {
            $crate::sandbox_log!($($arg)*);
        }
    };
}

/// Printed regardless of `SANDBOX_DEBUG`.
#[macro_export]
macro_rules! sandbox_error {
    ($($arg:tt)*) => {
        $crate::sandbox_log!($($arg)*)
    };
}

/// Typed function pointer for a [`RealSymbol`](crate::reals::RealSymbol),
/// `None` when the symbol cannot be found.
#[macro_export]
macro_rules! get_real {
    ($storage:expr, $t:ty) => {
        $storage
            .get()
            .map(|p| std::mem::transmute::<*mut libc::c_void, $t>(p))
    };
}

/// Define exported replacements for libc entry points.
///
/// Each entry names the prototype and the check to run before forwarding to
/// the next definition of the same symbol. A denied check, or a symbol that
/// cannot be found, returns the type's failure value with `errno = EACCES`.
///
/// ```ignore
/// intercept! {
///     fn unlink(path: *const c_char) -> c_int = sandbox::check_path(path);
/// }
/// ```
#[macro_export]
macro_rules! intercept {
    ($(
        $(#[$meta:meta])*
        fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty = $check:expr;
    )*) => {$(
        $(#[$meta])*
        #[no_mangle]
        pub unsafe extern "C" fn $name($($arg: $ty),*) -> $ret {
            static REAL: $crate::reals::RealSymbol =
                $crate::reals::RealSymbol::new(concat!(stringify!($name), "\0"));
            if let sandbox_fs_core::Decision::Deny(reason) = $check {
                return $crate::errno::deny(&reason);
            }
            match $crate::get_real!(REAL, unsafe extern "C" fn($($ty),*) -> $ret) {
                Some(real) => real($($arg),*),
                None => $crate::errno::missing(&REAL),
            }
        }
    )*};
}

pub struct StackWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> StackWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Terminate with a newline and return the finished line.
    pub fn finish(&mut self) -> &[u8] {
        if self.buf.is_empty() {
            return &[];
        }
        let end = self.pos.min(self.buf.len() - 1);
        self.buf[end] = b'\n';
        &self.buf[..=end]
    }
}

impl std::fmt::Write for StackWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        // Last byte stays free for the newline.
        let room = self.buf.len().saturating_sub(1).saturating_sub(self.pos);
        let n = s.len().min(room);
        self.buf[self.pos..self.pos + n].copy_from_slice(&s.as_bytes()[..n]);
        self.pos += n;
        Ok(())
    }
}
