//! Shared harness for the integration suites: a fully assembled server on
//! an ephemeral port and a small blocking HTTP client.

#![allow(dead_code)]

use gatewell::config::ConfigFile;
use gatewell::dispatcher::Dispatcher;
use gatewell::handler::Router;
use gatewell::handlers::default_router;
use gatewell::monitor::MonitorService;
use gatewell::scheduler::Scheduler;
use gatewell::server::{Endpoint, HttpServer, ServerContext};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// A running server plus everything needed to tear it down.
pub struct TestServer {
    pub server: Arc<HttpServer>,
    pub monitor: Arc<MonitorService>,
    pub addr: SocketAddr,
}

impl TestServer {
    /// Starts a server with the default routes.
    pub fn start(config: ConfigFile) -> Self {
        Self::start_with(config, |_, _| {})
    }

    /// Starts a server, letting the test add routes before it listens.
    pub fn start_with(
        config: ConfigFile,
        customize: impl FnOnce(&mut Router, &Arc<ServerContext>),
    ) -> Self {
        init_test_logging();

        let monitor = MonitorService::start();
        let context = ServerContext::new(&config);
        let dispatcher = Dispatcher::start(
            &config.dispatcher,
            Arc::clone(&context),
            Arc::clone(&monitor),
        );
        let scheduler = Scheduler::start(2);
        scheduler.open_all();

        let mut router = default_router(&context, &monitor);
        customize(&mut router, &context);

        let server = HttpServer::new(
            Arc::clone(&context),
            scheduler,
            dispatcher,
            router,
            config.http.clone(),
        );

        let endpoint = Endpoint::tcp("127.0.0.1:0".parse().unwrap());
        let addr = server
            .start_listening(&[endpoint])
            .expect("test server must bind")[0];

        Self {
            server,
            monitor,
            addr,
        }
    }

    pub fn connect(&self) -> TestClient {
        TestClient::connect(self.addr)
    }

    pub fn stop(self) {
        self.server.stop();
        self.monitor.shutdown();
    }
}

/// A parsed HTTP response.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("body must be JSON")
    }
}

/// A minimal blocking HTTP/1.1 client for driving the server.
pub struct TestClient {
    stream: std::net::TcpStream,
    buffer: Vec<u8>,
}

impl TestClient {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = std::net::TcpStream::connect(addr).expect("connect to test server");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        Self {
            stream,
            buffer: Vec::new(),
        }
    }

    /// Sends a request with optional extra headers and no body.
    pub fn send(&mut self, method: &str, target: &str, headers: &[(&str, &str)]) {
        let mut request = format!("{} {} HTTP/1.1\r\nhost: test\r\n", method, target);
        for (name, value) in headers {
            request.push_str(name);
            request.push_str(": ");
            request.push_str(value);
            request.push_str("\r\n");
        }
        request.push_str("\r\n");
        self.stream
            .write_all(request.as_bytes())
            .expect("request written");
    }

    /// Sends a request and reads the response.
    pub fn request(&mut self, method: &str, target: &str, headers: &[(&str, &str)]) -> Response {
        self.send(method, target, headers);
        self.read_response().expect("response expected")
    }

    /// Writes raw bytes, for malformed-request tests.
    pub fn send_raw(&mut self, raw: &[u8]) {
        self.stream.write_all(raw).expect("raw bytes written");
    }

    /// Reads one response; `None` on clean EOF before any byte.
    pub fn read_response(&mut self) -> Option<Response> {
        let header_end = loop {
            if let Some(pos) = find_double_crlf(&self.buffer) {
                break pos;
            }
            if !self.fill()? {
                return None;
            }
        };

        let head: Vec<u8> = self.buffer.drain(..header_end + 4).collect();
        let head = String::from_utf8(head).expect("header must be utf8");
        let mut lines = head.split("\r\n");

        let status_line = lines.next().expect("status line");
        let status: u16 = status_line
            .split_whitespace()
            .nth(1)
            .expect("status code")
            .parse()
            .expect("numeric status");

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_lowercase(), value.trim().to_string());
            }
        }

        let body = if headers.get("transfer-encoding").map(String::as_str) == Some("chunked") {
            self.read_chunked_body()
        } else {
            let length: usize = headers
                .get("content-length")
                .map(|v| v.parse().expect("numeric content-length"))
                .unwrap_or(0);
            self.read_exact_bytes(length)
        };

        Some(Response {
            status,
            headers,
            body,
        })
    }

    /// True once the server has closed the connection.
    pub fn at_eof(&mut self) -> bool {
        if !self.buffer.is_empty() {
            return false;
        }
        matches!(self.fill(), Some(false) | None)
    }

    fn read_chunked_body(&mut self) -> Vec<u8> {
        let mut body = Vec::new();
        loop {
            let line = self.read_line();
            let size = usize::from_str_radix(line.trim(), 16).expect("chunk size");
            if size == 0 {
                // Trailing CRLF after the last chunk.
                self.read_line();
                return body;
            }
            body.extend_from_slice(&self.read_exact_bytes(size));
            // CRLF after the chunk payload.
            self.read_line();
        }
    }

    fn read_line(&mut self) -> String {
        loop {
            if let Some(pos) = self.buffer.windows(2).position(|w| w == b"\r\n") {
                let line: Vec<u8> = self.buffer.drain(..pos + 2).collect();
                return String::from_utf8(line).expect("line must be utf8");
            }
            assert!(
                matches!(self.fill(), Some(true)),
                "connection ended mid-line"
            );
        }
    }

    fn read_exact_bytes(&mut self, length: usize) -> Vec<u8> {
        while self.buffer.len() < length {
            assert!(
                matches!(self.fill(), Some(true)),
                "connection ended mid-body"
            );
        }
        self.buffer.drain(..length).collect()
    }

    /// Reads more bytes. `Some(true)` on data, `Some(false)` on EOF, `None`
    /// on a read error (treated as EOF by callers).
    fn fill(&mut self) -> Option<bool> {
        let mut chunk = [0u8; 4096];
        match self.stream.read(&mut chunk) {
            Ok(0) => Some(false),
            Ok(n) => {
                self.buffer.extend_from_slice(&chunk[..n]);
                Some(true)
            }
            Err(_) => None,
        }
    }
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Installs a tracing subscriber honouring `RUST_LOG`. Safe to call from
/// every test; only the first call wins.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `check` until it returns true or the timeout elapses.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

// ============================================================================
// Test Handlers
// ============================================================================

use gatewell::error::ServerError;
use gatewell::handler::{Handler, KillSwitch};
use gatewell::protocol::{HttpRequest, HttpResponse};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A handler that signals when it starts and blocks until released.
pub struct GateHandler {
    request: HttpRequest,
    response: HttpResponse,
    kill: KillSwitch,
    started: crossbeam_channel::Sender<()>,
    release: crossbeam_channel::Receiver<()>,
    completed: Arc<AtomicUsize>,
}

impl Handler for GateHandler {
    fn name(&self) -> &'static str {
        "GateHandler"
    }

    fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    fn execute(&mut self) -> Result<(), ServerError> {
        let _ = self.started.send(());
        let _ = self.release.recv_timeout(Duration::from_secs(10));
        self.response = HttpResponse::ok();
        self.response.set_json_body(&serde_json::json!({ "gate": true }));
        self.completed.fetch_add(1, Ordering::SeqCst);
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

/// Handle to a gate route: observe starts, release workers, count
/// completions.
pub struct Gate {
    pub started: crossbeam_channel::Receiver<()>,
    pub release: crossbeam_channel::Sender<()>,
    pub completed: Arc<AtomicUsize>,
}

impl Gate {
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Registers a gate handler at `path` and returns its control handle.
pub fn add_gate_route(router: &mut Router, path: &str) -> Gate {
    let (started_tx, started_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::unbounded();
    let completed = Arc::new(AtomicUsize::new(0));

    let route_completed = Arc::clone(&completed);
    router.add_prefix(path, move |request| {
        Box::new(GateHandler {
            request,
            response: HttpResponse::default(),
            kill: KillSwitch::new(),
            started: started_tx.clone(),
            release: release_rx.clone(),
            completed: Arc::clone(&route_completed),
        })
    });

    Gate {
        started: started_rx,
        release: release_tx,
        completed,
    }
}

/// A trivial handler recording whether it ever executed.
pub struct FlagHandler {
    request: HttpRequest,
    response: HttpResponse,
    kill: KillSwitch,
    executed: Arc<AtomicUsize>,
}

impl Handler for FlagHandler {
    fn name(&self) -> &'static str {
        "FlagHandler"
    }

    fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    fn execute(&mut self) -> Result<(), ServerError> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        self.response = HttpResponse::ok();
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

/// Registers a flag handler at `path`; the counter records executions.
pub fn add_flag_route(router: &mut Router, path: &str) -> Arc<AtomicUsize> {
    let executed = Arc::new(AtomicUsize::new(0));
    let route_executed = Arc::clone(&executed);
    router.add_prefix(path, move |request| {
        Box::new(FlagHandler {
            request,
            response: HttpResponse::default(),
            kill: KillSwitch::new(),
            executed: Arc::clone(&route_executed),
        })
    });
    executed
}
