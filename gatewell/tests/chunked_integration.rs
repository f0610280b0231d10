//! Integration tests for chunked response streaming.
//!
//! Run with: `cargo test --test chunked_integration`

mod common;

use bytes::Bytes;
use common::TestServer;
use gatewell::config::ConfigFile;
use gatewell::error::ServerError;
use gatewell::handler::{Handler, KillSwitch};
use gatewell::protocol::{HttpRequest, HttpResponse};
use gatewell::server::ServerContext;
use std::sync::Arc;
use std::time::Duration;

/// A handler that streams a fixed set of chunks from a producer thread.
struct StreamHandler {
    request: HttpRequest,
    response: HttpResponse,
    kill: KillSwitch,
    context: Arc<ServerContext>,
    chunks: Vec<Vec<u8>>,
}

impl Handler for StreamHandler {
    fn name(&self) -> &'static str {
        "StreamHandler"
    }

    fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    fn execute(&mut self) -> Result<(), ServerError> {
        let task = self.request.client_task_id();
        self.context.register_chunked_task(task)?;

        self.response = HttpResponse::ok();
        self.response.set_content_type("application/octet-stream");
        self.response.set_chunked(true);

        // Chunks are produced from a different thread than the handler;
        // delivery order must still match send order.
        let context = Arc::clone(&self.context);
        let chunks = self.chunks.clone();
        std::thread::spawn(move || {
            for chunk in chunks {
                std::thread::sleep(Duration::from_millis(5));
                if context.send_chunk(task, Bytes::from(chunk)).is_err() {
                    return;
                }
            }
            let _ = context.send_chunk(task, Bytes::new());
        });

        Ok(())
    }

    fn request(&self) -> &HttpRequest {
        &self.request
    }

    fn response_mut(&mut self) -> &mut HttpResponse {
        &mut self.response
    }

    fn take_response(&mut self) -> HttpResponse {
        std::mem::take(&mut self.response)
    }
}

/// Registers a streaming route producing the given chunks.
fn add_stream_route(server_chunks: Vec<Vec<u8>>) -> impl FnOnce(
    &mut gatewell::handler::Router,
    &Arc<ServerContext>,
) {
    move |router, context| {
        let context = Arc::clone(context);
        router.add_prefix("/stream", move |request| {
            Box::new(StreamHandler {
                request,
                response: HttpResponse::default(),
                kill: KillSwitch::new(),
                context: Arc::clone(&context),
                chunks: server_chunks.clone(),
            })
        });
    }
}

/// Five chunks of sizes 10, 10, 10, 10, 5: the client must read exactly
/// 45 payload bytes in arrival order.
#[test]
fn test_chunked_stream_delivers_bytes_in_order() {
    let chunks: Vec<Vec<u8>> = (0..5u8)
        .map(|i| {
            let size = if i == 4 { 5 } else { 10 };
            vec![b'a' + i; size]
        })
        .collect();
    let expected: Vec<u8> = chunks.concat();
    assert_eq!(expected.len(), 45);

    let server = TestServer::start_with(ConfigFile::default(), add_stream_route(chunks));
    let mut client = server.connect();

    let response = client.request("GET", "/stream", &[]);
    assert_eq!(response.status, 200);
    assert_eq!(
        response.header("transfer-encoding"),
        Some("chunked")
    );
    assert_eq!(response.body.len(), 45);
    assert_eq!(response.body, expected);

    server.stop();
}

#[test]
fn test_connection_reusable_after_chunked_response() {
    let chunks = vec![b"hello ".to_vec(), b"world".to_vec()];
    let server = TestServer::start_with(ConfigFile::default(), add_stream_route(chunks));
    let mut client = server.connect();

    let response = client.request("GET", "/stream", &[]);
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"hello world");

    // Streaming finished cleanly; keep-alive still works.
    let response = client.request("GET", "/version", &[]);
    assert_eq!(response.status, 200);

    server.stop();
}

#[test]
fn test_chunked_task_limit() {
    let mut config = ConfigFile::default();
    config.http.max_chunked_tasks = 0;

    let chunks = vec![b"data".to_vec()];
    let server = TestServer::start_with(config, add_stream_route(chunks));
    let mut client = server.connect();

    // Registration fails, so the handler errors out with a conflict.
    let response = client.request("GET", "/stream", &[]);
    assert_eq!(response.status, 409);

    server.stop();
}
