//! Cross-thread signals delivered to a comm task.

use crate::handler::Handler;
use bytes::Bytes;
use std::fmt;

/// A notification sent to a comm task from another thread.
///
/// Signals are delivered over the task's unbounded channel and processed in
/// order on the owning event loop. Sending to a task that is being torn
/// down simply fails at the registry; there is no window in which a signal
/// can race the task's destruction.
pub enum TaskSignal {
    /// A finished handler carrying the response, moved back from a worker.
    Response(Box<dyn Handler>),

    /// One chunk of a streaming response.
    Chunk(Bytes),

    /// End of a streaming response; the task writes the terminating frame.
    ChunkEnd,

    /// Orderly close request, e.g. during server shutdown.
    Close,
}

impl fmt::Debug for TaskSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(handler) => write!(f, "Response({})", handler.name()),
            Self::Chunk(data) => write!(f, "Chunk({} bytes)", data.len()),
            Self::ChunkEnd => write!(f, "ChunkEnd"),
            Self::Close => write!(f, "Close"),
        }
    }
}
