//! Integration tests for the request path: dispatch, keep-alive, queue
//! back-pressure, and connection teardown.
//!
//! Run with: `cargo test --test server_integration`

mod common;

use common::{add_gate_route, wait_until, TestServer};
use gatewell::config::{ConfigFile, DispatcherSettings, QueueSettings};
use std::time::Duration;

/// One small queue with one worker, for back-pressure tests.
fn tiny_queue_config() -> ConfigFile {
    let mut config = ConfigFile::default();
    config.dispatcher = DispatcherSettings {
        queues: vec![QueueSettings {
            name: "standard".to_string(),
            size: 1,
            threads: 1,
        }],
    };
    config
}

#[test]
fn test_debug_happy_path() {
    let server = TestServer::start(ConfigFile::default());
    let mut client = server.connect();

    let response = client.request("GET", "/debug?sleep=0", &[]);
    assert_eq!(response.status, 200);

    let body = response.json();
    assert_eq!(body["server"], "gatewell");
    assert_eq!(body["sleep"], 0.0);
    assert_eq!(body["block"], false);
    assert!(body["version"].is_string());

    server.stop();
}

#[test]
fn test_version_is_direct() {
    let server = TestServer::start(ConfigFile::default());
    let mut client = server.connect();

    let response = client.request("GET", "/version", &[]);
    assert_eq!(response.status, 200);
    assert_eq!(response.json()["server"], "gatewell");

    server.stop();
}

#[test]
fn test_unknown_route_is_404_and_keeps_connection() {
    let server = TestServer::start(ConfigFile::default());
    let mut client = server.connect();

    let response = client.request("GET", "/nowhere", &[]);
    assert_eq!(response.status, 404);
    assert_eq!(response.json()["error"], true);

    // Same connection still serves requests.
    let response = client.request("GET", "/version", &[]);
    assert_eq!(response.status, 200);

    server.stop();
}

#[test]
fn test_keep_alive_reuse() {
    let server = TestServer::start(ConfigFile::default());
    let mut client = server.connect();

    for _ in 0..3 {
        let response = client.request("GET", "/debug?sleep=0", &[]);
        assert_eq!(response.status, 200);
        assert_eq!(response.header("connection"), Some("Keep-Alive"));
    }

    server.stop();
}

#[test]
fn test_pipelined_requests_answered_in_order() {
    let server = TestServer::start(ConfigFile::default());
    let mut client = server.connect();

    // Two requests written before reading anything; responses must come
    // back strictly in order.
    client.send("GET", "/version", &[]);
    client.send("GET", "/debug?sleep=0", &[]);

    let first = client.read_response().unwrap();
    assert_eq!(first.status, 200);
    assert!(first.json()["version"].is_string());

    let second = client.read_response().unwrap();
    assert_eq!(second.status, 200);
    assert_eq!(second.json()["sleep"], 0.0);

    server.stop();
}

#[test]
fn test_keep_alive_timeout_zero_closes_after_first_response() {
    let mut config = ConfigFile::default();
    config.http.keep_alive_timeout = Duration::ZERO;
    let server = TestServer::start(config);
    let mut client = server.connect();

    let response = client.request("GET", "/version", &[]);
    assert_eq!(response.status, 200);
    assert_eq!(response.header("connection"), Some("Close"));
    assert!(client.at_eof());

    server.stop();
}

#[test]
fn test_queue_overflow() {
    let mut gate_slot = None;
    let server = TestServer::start_with(tiny_queue_config(), |router, _| {
        gate_slot = Some(add_gate_route(router, "/gate"));
    });
    let gate = gate_slot.expect("gate registered");

    // First request occupies the single worker.
    let mut first = server.connect();
    first.send("GET", "/gate", &[]);
    gate.started
        .recv_timeout(Duration::from_secs(5))
        .expect("first request must start executing");

    // Second request sits in the queue (capacity 1).
    let mut second = server.connect();
    second.send("GET", "/gate", &[]);
    std::thread::sleep(Duration::from_millis(100));

    // Third request overflows the queue.
    let mut third = server.connect();
    let rejected = third.request("GET", "/gate", &[]);
    assert_eq!(rejected.status, 503);
    assert!(rejected.header("retry-after").is_some());
    assert_eq!(rejected.json()["error"], true);

    // Release both blocked jobs; the first two clients get their 200s.
    gate.release.send(()).unwrap();
    gate.release.send(()).unwrap();

    assert_eq!(first.read_response().unwrap().status, 200);
    assert_eq!(second.read_response().unwrap().status, 200);
    assert_eq!(gate.completed_count(), 2);

    server.stop();
}

#[test]
fn test_connection_close_during_dispatch() {
    let mut gate_slot = None;
    let server = TestServer::start_with(tiny_queue_config(), |router, _| {
        gate_slot = Some(add_gate_route(router, "/gate"));
    });
    let gate = gate_slot.expect("gate registered");

    {
        let mut client = server.connect();
        client.send("GET", "/gate", &[]);
        gate.started
            .recv_timeout(Duration::from_secs(5))
            .expect("request must start executing");
        // Client drops the connection while the worker is busy.
    }

    // Give the event loop a moment to observe the close.
    std::thread::sleep(Duration::from_millis(100));

    // The job completes; its response is discarded without a signal.
    gate.release.send(()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        gate.completed_count() == 1
    }));

    // The server stays healthy.
    let mut client = server.connect();
    let response = client.request("GET", "/version", &[]);
    assert_eq!(response.status, 200);

    server.stop();
}

#[test]
fn test_malformed_request_line_closes_connection() {
    let server = TestServer::start(ConfigFile::default());
    let mut client = server.connect();

    client.send_raw(b"total garbage\r\n\r\n");
    let response = client.read_response().expect("error response expected");
    assert_eq!(response.status, 400);
    assert!(client.at_eof());

    server.stop();
}

#[test]
fn test_unknown_method_is_rejected() {
    let server = TestServer::start(ConfigFile::default());
    let mut client = server.connect();

    client.send_raw(b"BREW /coffee HTTP/1.1\r\nhost: test\r\n\r\n");
    let response = client.read_response().expect("error response expected");
    assert_eq!(response.status, 405);
    assert!(client.at_eof());

    server.stop();
}

#[test]
fn test_post_body_roundtrip_to_handler() {
    let server = TestServer::start(ConfigFile::default());
    let mut client = server.connect();

    // The debug handler ignores bodies, but framing must stay intact for
    // the follow-up request on the same connection.
    client.send_raw(
        b"POST /debug?sleep=0 HTTP/1.1\r\nhost: test\r\ncontent-length: 5\r\n\r\nhello",
    );
    let response = client.read_response().unwrap();
    assert_eq!(response.status, 200);

    let response = client.request("GET", "/version", &[]);
    assert_eq!(response.status, 200);

    server.stop();
}
