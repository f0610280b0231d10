//! A single-threaded reactor thread.

use super::command::{ConnectionSetup, ListenSetup, LoopCommand};
use crate::comm::CommTask;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::task::LocalSet;
use tracing::{debug, error, info, trace, warn};

/// Sleep while gated on `open()`.
const OPEN_GATE_SLEEP: Duration = Duration::from_millis(1);

/// Grace period for local tasks to observe close signals at shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Pause after a failed accept before retrying.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Lifecycle state of an event-loop thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LoopState {
    Created = 0,
    Open = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Open,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Why the reactor future returned.
enum LoopExit {
    Shutdown,
    ChannelClosed,
}

/// One event loop: a reactor thread owning a set of comm tasks.
///
/// The thread starts gated: it spins in a short sleep until `open()` (or
/// shutdown). Commands are accepted from any thread; task mounting happens
/// exclusively on the loop's own thread.
pub struct EventLoop {
    index: usize,
    command_tx: mpsc::UnboundedSender<LoopCommand>,
    wakeup: Arc<Notify>,
    state: Arc<AtomicU8>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    /// Spawns the loop thread in the `Created` state.
    pub fn start(index: usize) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let wakeup = Arc::new(Notify::new());
        let state = Arc::new(AtomicU8::new(LoopState::Created as u8));

        let thread_wakeup = Arc::clone(&wakeup);
        let thread_state = Arc::clone(&state);
        let thread = std::thread::Builder::new()
            .name(format!("event-loop-{}", index))
            .spawn(move || thread_main(index, command_rx, thread_wakeup, thread_state))
            .map_err(|e| error!(loop_index = index, error = %e, "failed to start event loop"))
            .ok();

        Self {
            index,
            command_tx,
            wakeup,
            state,
            thread: Mutex::new(thread),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Opens the loop for business; gates the transition to `Running`.
    pub fn open(&self) {
        let _ = self.state.compare_exchange(
            LoopState::Created as u8,
            LoopState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Enqueues a command and wakes the loop.
    ///
    /// Fails once shutdown has begun: the loop no longer accepts tasks.
    pub fn register(&self, command: LoopCommand) -> Result<(), LoopCommand> {
        if self.state() >= LoopState::Stopping {
            return Err(command);
        }
        self.command_tx.send(command).map_err(|e| e.0)
    }

    /// Causes a blocked loop to return promptly. Callable from any thread.
    pub fn wakeup(&self) {
        self.wakeup.notify_one();
    }

    /// Starts the shutdown sequence: reject further registrations, then
    /// ask the reactor to leave its loop.
    pub fn begin_shutdown(&self) {
        debug!(loop_index = self.index, "event loop shutdown requested");
        self.state
            .store(LoopState::Stopping as u8, Ordering::Release);
        let _ = self.command_tx.send(LoopCommand::Shutdown);
        self.wakeup();
    }

    /// Joins the loop thread.
    pub fn join(&self) {
        if let Some(handle) = self.thread.lock().ok().and_then(|mut t| t.take()) {
            if handle.join().is_err() {
                warn!(loop_index = self.index, "event loop thread panicked");
            }
        }
    }
}

/// Thread body: gate on open, run the reactor, retry on panic, drain.
fn thread_main(
    index: usize,
    mut command_rx: mpsc::UnboundedReceiver<LoopCommand>,
    wakeup: Arc<Notify>,
    state: Arc<AtomicU8>,
) {
    trace!(loop_index = index, "event loop thread started");

    // Spin in a short sleep until opened (or shut down before opening).
    loop {
        match LoopState::from_u8(state.load(Ordering::Acquire)) {
            LoopState::Open => break,
            LoopState::Stopping | LoopState::Stopped => {
                state.store(LoopState::Stopped as u8, Ordering::Release);
                return;
            }
            _ => std::thread::sleep(OPEN_GATE_SLEEP),
        }
    }
    state.store(LoopState::Running as u8, Ordering::Release);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(loop_index = index, error = %e, "cannot build loop runtime");
            state.store(LoopState::Stopped as u8, Ordering::Release);
            return;
        }
    };

    info!(loop_index = index, "event loop running");

    loop {
        let iteration = catch_unwind(AssertUnwindSafe(|| {
            let local = LocalSet::new();
            local.block_on(&runtime, reactor(index, &mut command_rx, &wakeup))
        }));

        match iteration {
            Ok(LoopExit::Shutdown) | Ok(LoopExit::ChannelClosed) => break,
            Err(panic) => {
                if LoopState::from_u8(state.load(Ordering::Acquire)) >= LoopState::Stopping {
                    // Propagate to terminate the thread during teardown.
                    state.store(LoopState::Stopped as u8, Ordering::Release);
                    std::panic::resume_unwind(panic);
                }
                warn!(
                    loop_index = index,
                    "event loop iteration panicked, tasks on this loop were dropped; retrying"
                );
            }
        }
    }

    state.store(LoopState::Stopped as u8, Ordering::Release);

    // Drop whatever is still queued; the senders' sockets close with it.
    while let Ok(command) = command_rx.try_recv() {
        trace!(loop_index = index, ?command, "dropping queued command at shutdown");
    }

    info!(loop_index = index, "event loop stopped");
}

/// The reactor future: drain the command queue, mount tasks, repeat.
async fn reactor(
    index: usize,
    command_rx: &mut mpsc::UnboundedReceiver<LoopCommand>,
    wakeup: &Notify,
) -> LoopExit {
    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(LoopCommand::Connect(setup)) => mount_connection(index, setup),
                Some(LoopCommand::Listen(setup)) => mount_listener(index, setup),
                Some(LoopCommand::Shutdown) => {
                    // Give local tasks a moment to observe their close
                    // signals before the local set is torn down.
                    tokio::time::sleep(SHUTDOWN_GRACE).await;
                    return LoopExit::Shutdown;
                }
                None => return LoopExit::ChannelClosed,
            },
            _ = wakeup.notified() => {
                // Spurious or explicit wake-up; loop back into the wait.
            }
        }
    }
}

/// Mounts a comm task for an accepted connection on this loop.
///
/// A failed setup is logged and the connection dropped; the loop continues.
fn mount_connection(index: usize, setup: ConnectionSetup) {
    let ConnectionSetup {
        stream,
        peer,
        server,
    } = setup;

    let mounted = stream
        .set_nonblocking(true)
        .and_then(|_| tokio::net::TcpStream::from_std(stream));

    match mounted {
        Ok(stream) => {
            let registry = server.context().registry();
            let id = registry.allocate_id();
            let (signal_tx, signal_rx) = mpsc::unbounded_channel();
            registry.insert(id, signal_tx);

            trace!(loop_index = index, task = %id, %peer, "comm task mounted");
            tokio::task::spawn_local(CommTask::new(id, stream, peer, server, signal_rx).run());
        }
        Err(e) => {
            warn!(loop_index = index, %peer, error = %e, "comm task setup failed");
        }
    }
}

/// Mounts a listener's accept loop on this loop.
fn mount_listener(index: usize, setup: ListenSetup) {
    let ListenSetup { listener, server } = setup;
    let local_addr = listener.local_addr().ok();

    let mounted = listener
        .set_nonblocking(true)
        .and_then(|_| tokio::net::TcpListener::from_std(listener));

    match mounted {
        Ok(listener) => {
            debug!(loop_index = index, addr = ?local_addr, "listener mounted");
            tokio::task::spawn_local(accept_loop(listener, server));
        }
        Err(e) => {
            error!(loop_index = index, addr = ?local_addr, error = %e, "listener setup failed");
        }
    }
}

/// Accepts connections and forwards them to the scheduler's assignment.
async fn accept_loop(listener: tokio::net::TcpListener, server: Arc<crate::server::HttpServer>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => match stream.into_std() {
                Ok(stream) => server.handle_connected(stream, peer),
                Err(e) => warn!(%peer, error = %e, "accepted socket unusable"),
            },
            Err(e) => {
                // Transient accept failures (EMFILE and friends) should not
                // kill the listener.
                warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}
