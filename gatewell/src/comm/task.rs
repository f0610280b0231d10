//! Per-connection protocol state machine.

use super::registry::TaskId;
use super::signal::TaskSignal;
use crate::error::ServerError;
use crate::protocol::{
    chunk_frame, parse_request_head, HttpMethod, HttpRequest, HttpResponse, HttpStatus,
    RequestHead, LAST_CHUNK, MAXIMAL_PIPELINE_SIZE,
};
use crate::server::{HttpServer, RequestOutcome, ASYNC_EXECUTION_HEADER, ASYNC_ID_HEADER};
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Interim response for `expect: 100-continue`.
const CONTINUE_RESPONSE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Why a comm task left its loop.
enum CloseReason {
    /// Orderly close: client closed, keep-alive expired, or shutdown.
    Closed,
    /// Read or write failure.
    Failure(ServerError),
}

/// The per-connection protocol state machine.
///
/// A comm task lives on exactly one event loop and is driven by three
/// sources: socket readability, the cross-thread signal channel, and the
/// keep-alive timer. Request handling is strictly FIFO per connection: no
/// new request is processed while a response is pending, though bytes keep
/// being buffered so a client close is noticed even mid-dispatch.
pub struct CommTask {
    id: TaskId,
    stream: TcpStream,
    peer: SocketAddr,
    server: Arc<HttpServer>,
    signals: mpsc::UnboundedReceiver<TaskSignal>,

    read_buffer: BytesMut,
    write_queue: VecDeque<Bytes>,
    head: Option<RequestHead>,
    current_method: Option<HttpMethod>,

    /// A response is owed for a dispatched request.
    request_pending: bool,
    /// The connection closes once all queued bytes are written.
    close_requested: bool,
    /// Close as soon as the write queue drains, without waiting for a
    /// pending response. Set by the close signal.
    force_close: bool,
    /// A chunked response is streaming.
    chunked: bool,
    /// Chunks that arrived before the chunked head was written.
    early_chunks: Vec<Bytes>,
    early_chunk_end: bool,

    responses_written: u64,
    keep_alive: Duration,
}

impl CommTask {
    pub fn new(
        id: TaskId,
        stream: TcpStream,
        peer: SocketAddr,
        server: Arc<HttpServer>,
        signals: mpsc::UnboundedReceiver<TaskSignal>,
    ) -> Self {
        let keep_alive = server.http_settings().keep_alive_timeout;
        debug!(task = %id, %peer, "connection established");

        Self {
            id,
            stream,
            peer,
            server,
            signals,
            read_buffer: BytesMut::with_capacity(8 * 1024),
            write_queue: VecDeque::new(),
            head: None,
            current_method: None,
            request_pending: false,
            close_requested: false,
            force_close: false,
            chunked: false,
            early_chunks: Vec::new(),
            early_chunk_end: false,
            responses_written: 0,
            keep_alive,
        }
    }

    /// Drives the connection until it closes, then tears down.
    pub async fn run(mut self) {
        let reason = self.connection_loop().await;
        self.teardown(reason);
    }

    async fn connection_loop(&mut self) -> CloseReason {
        loop {
            if !self.request_pending && !self.close_requested {
                self.process_buffer();
            }

            if let Err(e) = self.flush_writes().await {
                return CloseReason::Failure(e);
            }

            if self.finished() {
                return CloseReason::Closed;
            }

            tokio::select! {
                signal = self.signals.recv() => match signal {
                    Some(TaskSignal::Response(mut handler)) => {
                        let response = handler.take_response();
                        self.handle_response(response);
                    }
                    Some(TaskSignal::Chunk(data)) => self.on_chunk(data),
                    Some(TaskSignal::ChunkEnd) => self.on_chunk_end(),
                    Some(TaskSignal::Close) | None => {
                        trace!(task = %self.id, "close signal received");
                        self.force_close = true;
                    }
                },

                read = self.stream.read_buf(&mut self.read_buffer) => match read {
                    Ok(0) => {
                        debug!(task = %self.id, "client closed connection");
                        return CloseReason::Closed;
                    }
                    Ok(_) => {
                        if self.read_buffer.len() > MAXIMAL_PIPELINE_SIZE {
                            warn!(task = %self.id, "pipeline buffer overflow");
                            return CloseReason::Failure(ServerError::BadRequest(
                                "pipeline buffer overflow".to_string(),
                            ));
                        }
                    }
                    Err(e) => return CloseReason::Failure(e.into()),
                },

                _ = tokio::time::sleep(self.keep_alive),
                    if !self.request_pending && !self.keep_alive.is_zero() =>
                {
                    debug!(task = %self.id, "keep-alive timeout");
                    return CloseReason::Closed;
                }
            }
        }
    }

    /// True once the connection is done and fully flushed.
    fn finished(&self) -> bool {
        if !self.write_queue.is_empty() {
            return false;
        }
        if self.force_close {
            return true;
        }
        self.close_requested && !self.request_pending && !self.chunked
    }

    /// Parses and starts as many buffered requests as the FIFO gate allows.
    fn process_buffer(&mut self) {
        loop {
            if self.request_pending || self.close_requested {
                return;
            }

            if self.head.is_none() {
                if self.read_buffer.is_empty() {
                    return;
                }
                match parse_request_head(&self.read_buffer) {
                    Ok(Some(head)) => self.head = Some(head),
                    Ok(None) => return,
                    Err(e) => {
                        self.fail_request(e);
                        return;
                    }
                }
            }

            let total = {
                let Some(head) = self.head.as_mut() else { return };
                let total = head.header_len + head.content_length;

                if self.read_buffer.len() < total {
                    if head.expects_continue() && !head.continue_sent {
                        head.continue_sent = true;
                        self.write_queue
                            .push_back(Bytes::from_static(CONTINUE_RESPONSE));
                    }
                    return;
                }
                total
            };

            let Some(head) = self.head.take() else { return };
            let mut consumed = self.read_buffer.split_to(total);
            let body = consumed.split_off(head.header_len).freeze();
            self.begin_request(head, body);
        }
    }

    /// Starts handling one complete request.
    fn begin_request(&mut self, head: RequestHead, body: Bytes) {
        self.current_method = Some(head.method);

        // Keep-alive bookkeeping, decided per request.
        let connection = head
            .header("connection")
            .map(str::to_lowercase)
            .unwrap_or_default();
        if connection == "close" {
            debug!(task = %self.id, "connection close requested by client");
            self.close_requested = true;
        } else if !head.version_11 && connection != "keep-alive" {
            debug!(task = %self.id, "http/1.0 without keep-alive");
            self.close_requested = true;
        } else if self.keep_alive.is_zero() {
            debug!(task = %self.id, "keep-alive disabled");
            self.close_requested = true;
        }

        trace!(task = %self.id, method = %head.method, path = %head.path, "request complete");
        let request = HttpRequest::new(head, body, self.id);
        self.request_pending = true;

        let async_mode = request
            .header(ASYNC_EXECUTION_HEADER)
            .map(str::to_lowercase);
        match async_mode.as_deref() {
            Some("true") => self.begin_async_request(request, false),
            Some("store") => self.begin_async_request(request, true),
            _ => self.begin_sync_request(request),
        }
    }

    fn begin_sync_request(&mut self, request: HttpRequest) {
        let handler = self.server.factory().create_handler(request);
        match self.server.handle_request(self.id, handler) {
            RequestOutcome::Responded(response) => self.handle_response(response),
            RequestOutcome::Dispatched => {
                // The worker signals us when the handler comes back.
            }
        }
    }

    /// Detached execution: answer 202 immediately, with the job id when
    /// the result is stored.
    fn begin_async_request(&mut self, request: HttpRequest, store: bool) {
        let handler = self.server.factory().create_handler(request);
        match self.server.handle_request_async(handler, store) {
            Ok(job_id) => {
                let mut response = HttpResponse::new(HttpStatus::ACCEPTED);
                if let Some(id) = job_id {
                    response.set_header(ASYNC_ID_HEADER, &id.to_string());
                }
                self.handle_response(response);
            }
            Err(e) => {
                if e.closes_connection() {
                    self.close_requested = true;
                }
                self.handle_response(HttpResponse::from_error(&e));
            }
        }
    }

    /// Answers a protocol-level failure and abandons the read stream.
    fn fail_request(&mut self, err: ServerError) {
        warn!(task = %self.id, peer = %self.peer, error = %err, "request failed before dispatch");

        // The stream position is unknown; drop buffered input.
        self.read_buffer.clear();
        self.head = None;
        if err.closes_connection() {
            self.close_requested = true;
        }
        self.request_pending = true;
        self.handle_response(HttpResponse::from_error(&err));
    }

    /// Enqueues a finished response onto the write queue.
    fn handle_response(&mut self, response: HttpResponse) {
        let head_only = self.current_method == Some(HttpMethod::Head);
        let keep_alive = !self.close_requested && !self.force_close;

        if response.is_chunked() {
            self.chunked = true;
            self.write_queue.push_back(response.render(keep_alive, head_only));

            // Flush chunks that raced ahead of the response head.
            for data in std::mem::take(&mut self.early_chunks) {
                self.write_queue.push_back(chunk_frame(&data));
            }
            if std::mem::take(&mut self.early_chunk_end) {
                self.finish_chunked_stream();
            }
        } else {
            self.write_queue.push_back(response.render(keep_alive, head_only));
            self.complete_request_cycle();
        }
    }

    fn on_chunk(&mut self, data: Bytes) {
        if self.chunked {
            self.write_queue.push_back(chunk_frame(&data));
        } else {
            // The producer outpaced the handler's response handoff; hold
            // the chunk until the head is written.
            self.early_chunks.push(data);
        }
    }

    fn on_chunk_end(&mut self) {
        if self.chunked {
            self.finish_chunked_stream();
        } else {
            self.early_chunk_end = true;
        }
    }

    fn finish_chunked_stream(&mut self) {
        self.write_queue.push_back(Bytes::from_static(LAST_CHUNK));
        self.chunked = false;
        self.complete_request_cycle();
    }

    /// Response fully queued: reset for the next request on this
    /// connection, or arrange the close.
    fn complete_request_cycle(&mut self) {
        self.request_pending = false;
        self.current_method = None;
        self.responses_written += 1;

        if self.keep_alive.is_zero() {
            // Keep-alive disabled: one request per connection.
            self.close_requested = true;
        }
    }

    /// Writes everything queued, in order.
    async fn flush_writes(&mut self) -> Result<(), ServerError> {
        while let Some(buf) = self.write_queue.pop_front() {
            self.stream.write_all(&buf).await?;
        }
        Ok(())
    }

    /// Removes the task from the live set and notifies the server.
    fn teardown(self, reason: CloseReason) {
        debug!(task = %self.id, peer = %self.peer, responses = self.responses_written, "connection closed");

        self.server.context().unregister_chunked_task(self.id);
        match reason {
            CloseReason::Closed => self.server.handle_communication_closed(self.id),
            CloseReason::Failure(e) => self.server.handle_communication_failure(self.id, &e),
        }
    }
}
