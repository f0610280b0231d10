//! Cross-thread task-control commands for an event loop.

use crate::server::HttpServer;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// A request enqueued onto a loop's command queue from any thread.
///
/// The loop drains its queue after each wait and performs the actual task
/// mounting on its own thread.
pub enum LoopCommand {
    /// Mount an accept loop for a bound listener.
    Listen(ListenSetup),

    /// Mount a comm task for an accepted connection.
    Connect(ConnectionSetup),

    /// Leave the reactor loop; part of the shutdown sequence.
    Shutdown,
}

/// A bound listener waiting to be mounted on a loop.
pub struct ListenSetup {
    pub listener: std::net::TcpListener,
    pub server: Arc<HttpServer>,
}

/// An accepted connection waiting to be mounted on a loop.
pub struct ConnectionSetup {
    pub stream: std::net::TcpStream,
    pub peer: SocketAddr,
    pub server: Arc<HttpServer>,
}

impl fmt::Debug for LoopCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listen(setup) => write!(f, "Listen({:?})", setup.listener.local_addr()),
            Self::Connect(setup) => write!(f, "Connect({})", setup.peer),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}
