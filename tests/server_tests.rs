//! HTTP tests against a running `may_minihttp` server hosting the demo
//! handlers, using raw `TcpStream` exchanges.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use dyndispatch::config::DispatchConfig;
use dyndispatch::demo::{demo_registry, demo_services, placeholder_jpeg};
use dyndispatch::dispatcher::{
    ActionError, HandlerDescriptor, HandlerRegistry, InvocationOutcome, ServiceRegistry,
};

mod common;
use common::http::{get, send_request};
use common::test_server::TestServer;

#[test]
fn photo_is_served_as_jpeg() {
    let server = TestServer::demo();
    let res = get(&server.addr, "/dynamic/account/photo/1045.jpg");
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("image/jpeg"));
    assert_eq!(res.body, placeholder_jpeg(1045));
    assert_eq!(server.metrics.dispatched(), 1);
}

#[test]
fn async_action_body_is_written() {
    let server = TestServer::demo();
    let res = get(&server.addr, "/dynamic/echo/echo/hello?ignored=1");
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("application/octet-stream"));
    assert_eq!(res.text(), "hello");
}

#[test]
fn post_under_prefix_is_dispatched() {
    let server = TestServer::demo();
    let res = send_request(
        &server.addr,
        "POST /dynamic/account/photo/1045.jpg HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n",
    );
    assert_eq!(res.status, 200);
    assert_eq!(res.body, placeholder_jpeg(1045));
}

struct Clock;

fn clock_registry() -> HandlerRegistry {
    HandlerRegistry::builder("App.Controllers")
        .register(
            HandlerDescriptor::builder::<Clock>("ClockController")
                .constructor(|_| Ok(Clock))
                .action("wait", 0, |_, _| {
                    InvocationOutcome::pending(async {
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        Ok::<_, ActionError>(b"waited".to_vec())
                    })
                })
                .action("now", 0, |_, _| InvocationOutcome::realized(b"now".to_vec()))
                .build(),
        )
        .unwrap()
        .build()
}

#[test]
fn slow_request_does_not_hold_up_other_connections() {
    let config = DispatchConfig::default();
    let server = TestServer::start(&config, clock_registry(), ServiceRegistry::new());
    let addr = server.addr;

    let slow = thread::spawn(move || {
        let res = get(&addr, "/dynamic/clock/wait");
        (res, Instant::now())
    });
    thread::sleep(Duration::from_millis(50));

    let res = get(&server.addr, "/dynamic/clock/now");
    let fast_done = Instant::now();
    assert_eq!(res.status, 200);
    assert_eq!(res.text(), "now");

    let (slow_res, slow_done) = slow.join().unwrap();
    assert_eq!(slow_res.status, 200);
    assert_eq!(slow_res.text(), "waited");
    assert!(fast_done < slow_done);
}

#[test]
fn path_outside_prefix_is_not_found() {
    let server = TestServer::demo();
    let res = get(&server.addr, "/other/path");
    assert_eq!(res.status, 404);
    assert_eq!(server.metrics.dispatched(), 0);
    assert_eq!(server.metrics.not_applicable(), 0);
}

#[test]
fn unknown_handler_falls_through() {
    let server = TestServer::demo();
    let res = get(&server.addr, "/dynamic/unknownthing/x");
    assert_eq!(res.status, 404);
    assert_eq!(server.metrics.not_applicable(), 1);
}

#[test]
fn missing_argument_is_server_error() {
    let server = TestServer::demo();
    let res = get(&server.addr, "/dynamic/account/photo");
    assert_eq!(res.status, 500);
    let body = res.json();
    assert_eq!(body["error"], "ArityMismatch");
    assert!(body["message"].as_str().unwrap().contains("photo"));
    assert_eq!(server.metrics.faults(), 1);
}

#[test]
fn unknown_action_is_server_error() {
    let server = TestServer::demo();
    let res = get(&server.addr, "/dynamic/account/avatar/1.jpg");
    assert_eq!(res.status, 500);
    assert_eq!(res.json()["error"], "ActionNotFound");
}

#[test]
fn strict_config_turns_unknown_handler_into_error() {
    let config = DispatchConfig {
        strict_types: true,
        ..DispatchConfig::default()
    };
    let server = TestServer::start(
        &config,
        demo_registry(&config.namespace).unwrap(),
        demo_services(),
    );
    let res = get(&server.addr, "/dynamic/unknownthing/x");
    assert_eq!(res.status, 500);
    assert_eq!(res.json()["error"], "UnknownHandlerType");
}

#[test]
fn config_file_changes_prefix() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "prefix: rpc\nnamespace: Shop.Handlers").unwrap();
    let config = DispatchConfig::from_file(file.path()).unwrap();
    let server = TestServer::start(
        &config,
        demo_registry(&config.namespace).unwrap(),
        demo_services(),
    );

    assert_eq!(get(&server.addr, "/rpc/account/photo/1.jpg").status, 200);
    assert_eq!(get(&server.addr, "/dynamic/account/photo/1.jpg").status, 404);
}

#[test]
fn health_and_metrics_endpoints() {
    let server = TestServer::demo();
    let health = get(&server.addr, "/health");
    assert_eq!(health.status, 200);
    assert_eq!(health.json()["status"], "ok");

    let _ = get(&server.addr, "/dynamic/account/photo/1.jpg");
    let metrics = get(&server.addr, "/metrics");
    assert_eq!(metrics.status, 200);
    let text = metrics.text();
    assert!(text.contains("dyndispatch_dispatched_total 1"));
    assert!(text.contains("dyndispatch_requests_total"));
    assert!(server.metrics.stack_size() > 0);
}

#[test]
fn request_id_header_is_accepted() {
    let server = TestServer::demo();
    let res = send_request(
        &server.addr,
        "GET /health HTTP/1.1\r\nHost: localhost\r\nX-Request-Id: 01ARZ3NDEKTSV4RRFFQ69G5FAV\r\n\r\n",
    );
    assert_eq!(res.status, 200);
}
