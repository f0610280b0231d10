//! Work monitoring.
//!
//! Every dispatcher worker (and any other thread that opts in) registers
//! with the [`MonitorService`] and maintains a per-thread stack of
//! [`WorkDescription`] nodes: the thread itself at the bottom, one node per
//! nested unit of handler work above it. A dedicated monitor thread reclaims
//! retired descriptions through a lock-free queue and can snapshot all
//! stacks into a JSON document for diagnostics.
//!
//! The service is an explicitly created value whose lifetime is tied to
//! server init and teardown; threads join and leave via RAII guards.

mod description;
mod service;

pub use description::{WorkDescription, WorkKind};
pub use service::{HandlerWorkGuard, MonitorService, ThreadRegistration};
