//! # sandbox-fs-core
//!
//! Allow/deny decisions for the `sandbox_fs` interposition library.
//!
//! A process that preloads the library gets every filesystem entry point
//! checked against a set of blocked path prefixes. This crate holds the part
//! of that check that does not depend on symbol interposition:
//!
//! - [`config`]: parses `SANDBOX_BLOCKED_PATHS` / `SANDBOX_DEBUG` into a
//!   [`BlockedPathSet`]
//! - [`normalize`]: lexical `.`/`..` resolution, never touching the filesystem
//! - [`resolve`]: the [`Resolver`] seam through which symlinks, the working
//!   directory and directory descriptors are looked up
//! - [`search`]: `PATH` candidates for the exec family
//! - [`decision`]: the [`Engine`] combining both checks into one [`Decision`]
//!
//! The shim crate plugs a resolver built on the non-intercepted libc
//! primitives into the engine; tools and tests use [`StdResolver`] or
//! [`testing::FakeResolver`].

pub mod config;
pub mod decision;
pub mod diag;
pub mod error;
pub mod normalize;
pub mod resolve;
pub mod search;
pub mod state;
pub mod testing;

pub use config::{BlockedPathSet, SandboxConfig};
pub use decision::{Decision, Engine};
pub use diag::{DecisionLine, DiagnosticSink, NullSink};
pub use error::{ConfigError, DenyReason, MatchKind};
pub use resolve::{Resolver, StdResolver};
pub use state::SandboxState;

/// Prefix written in front of every diagnostic line.
pub const LOG_TAG: &str = "[sandbox_fs]";
