//! Event loops and their fleet.
//!
//! Each [`EventLoop`] is a single-threaded reactor: one OS thread running a
//! current-thread runtime that exclusively owns its tasks. All mutations of
//! a task's I/O state happen on its owning loop's thread; other threads can
//! only enqueue [`LoopCommand`]s or wake the loop.
//!
//! The [`Scheduler`] owns the fleet and assigns new connections round-robin.

mod command;
mod event_loop;
mod scheduler;

pub use command::{ConnectionSetup, ListenSetup, LoopCommand};
pub use event_loop::{EventLoop, LoopState};
pub use scheduler::Scheduler;
