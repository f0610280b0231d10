//! Work description nodes.

use std::time::Instant;

/// What kind of work a description node records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkKind {
    /// The thread itself; always the bottom of a stack.
    Thread,
    /// A handler executing on the thread.
    Handler,
}

/// One node of a per-thread work stack.
///
/// Descriptions are pooled: retired nodes travel through the monitor's
/// lock-free reclamation queue and are reused for later work, so pushing
/// work onto a stack does not allocate in the steady state.
#[derive(Debug)]
pub struct WorkDescription {
    pub(crate) kind: WorkKind,
    pub(crate) name: String,
    pub(crate) detail: String,
    pub(crate) started_at: Instant,
}

impl WorkDescription {
    pub(crate) fn new(kind: WorkKind, name: &str, detail: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            detail: detail.to_string(),
            started_at: Instant::now(),
        }
    }

    /// Re-initializes a pooled description for new work.
    pub(crate) fn reset(&mut self, kind: WorkKind, name: &str, detail: &str) {
        self.kind = kind;
        self.name.clear();
        self.name.push_str(name);
        self.detail.clear();
        self.detail.push_str(detail);
        self.started_at = Instant::now();
    }

    pub fn kind(&self) -> WorkKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Seconds this unit of work has been running.
    pub fn elapsed_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
