//! Per-decision diagnostics.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use crate::decision::Decision;

/// Receives one call per decision when debug logging is on.
pub trait DiagnosticSink {
    fn decision(&self, path: &Path, decision: &Decision);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn decision(&self, _path: &Path, _decision: &Decision) {}
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &S {
    fn decision(&self, path: &Path, decision: &Decision) {
        (**self).decision(path, decision)
    }
}

/// Text of a diagnostic line, without tag or newline:
/// `ALLOW <path>` or `DENY <path>: <reason>`.
pub struct DecisionLine<'a> {
    path: &'a Path,
    decision: &'a Decision,
}

impl<'a> DecisionLine<'a> {
    pub fn new(path: &'a Path, decision: &'a Decision) -> Self {
        Self { path, decision }
    }
}

impl fmt::Display for DecisionLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decision {
            Decision::Allow => write!(f, "ALLOW {}", self.path.display()),
            Decision::Deny(reason) => write!(f, "DENY {}: {}", self.path.display(), reason),
        }
    }
}

/// Collects tagged lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl DiagnosticSink for MemorySink {
    fn decision(&self, path: &Path, decision: &Decision) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format!("{} {}", crate::LOG_TAG, DecisionLine::new(path, decision)));
        }
    }
}
