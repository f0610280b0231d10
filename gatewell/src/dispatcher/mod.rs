//! Job dispatching.
//!
//! The dispatcher owns a set of named bounded queues, each with its own
//! pool of worker threads. A [`ServerJob`] wraps one handler; its target
//! queue is chosen by the handler. Submission to a full queue fails fast
//! with a queue-full error that the comm task turns into a 503 response.
//!
//! # Handoff
//!
//! When a job finishes, cleanup decides where the response goes: detached
//! jobs publish into the async job registry; jobs bound to a connection
//! move their handler back to the comm task through the task registry and
//! wake the owning event loop. A vanished task simply makes the handoff
//! fail, and the response is discarded.

mod dispatcher;
mod job;
mod queue;

pub use dispatcher::Dispatcher;
pub use job::{JobOutcome, ServerJob};
pub use queue::{BlockedGuard, DispatcherQueue, QueueStats, WorkerContext};
