//! The event-loop fleet.

use super::command::LoopCommand;
use super::event_loop::{EventLoop, LoopState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// A collection of event loops with round-robin assignment.
///
/// New sockets are spread across the fleet; `wakeup_loop` is callable from
/// any thread.
pub struct Scheduler {
    loops: Vec<EventLoop>,
    next: AtomicUsize,
}

impl Scheduler {
    /// Starts `count` event loops (at least one) in the gated state.
    pub fn start(count: usize) -> Arc<Self> {
        let count = count.max(1);
        let loops = (0..count).map(EventLoop::start).collect();
        info!(loops = count, "scheduler started");

        Arc::new(Self {
            loops,
            next: AtomicUsize::new(0),
        })
    }

    /// Opens every loop for business.
    pub fn open_all(&self) {
        for event_loop in &self.loops {
            event_loop.open();
        }
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Returns a specific loop.
    pub fn event_loop(&self, index: usize) -> Option<&EventLoop> {
        self.loops.get(index)
    }

    /// Picks the next loop round-robin for a new task.
    pub fn assign(&self) -> &EventLoop {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.loops.len();
        &self.loops[index]
    }

    /// Wakes a specific loop. Callable from any thread.
    pub fn wakeup_loop(&self, index: usize) {
        if let Some(event_loop) = self.loops.get(index) {
            event_loop.wakeup();
        }
    }

    /// True while the fleet accepts new tasks.
    pub fn is_active(&self) -> bool {
        self.loops
            .iter()
            .all(|event_loop| event_loop.state() < LoopState::Stopping)
    }

    /// Starts shutdown on every loop: registrations are rejected and the
    /// command queues drained.
    pub fn begin_shutdown(&self) {
        for event_loop in &self.loops {
            event_loop.begin_shutdown();
        }
    }

    /// Joins all loop threads.
    pub fn join(&self) {
        for event_loop in &self.loops {
            event_loop.join();
        }
        info!("scheduler stopped");
    }

    /// Convenience for registering on the round-robin loop.
    pub fn register(&self, command: LoopCommand) -> Result<(), LoopCommand> {
        self.assign().register(command)
    }
}
