#![allow(dead_code)]

pub mod test_server {
    use std::sync::{Arc, Once};

    use dyndispatch::config::DispatchConfig;
    use dyndispatch::demo::{demo_registry, demo_services};
    use dyndispatch::dispatcher::{Dispatcher, HandlerRegistry, ServiceRegistry};
    use dyndispatch::middleware::MetricsMiddleware;
    use dyndispatch::runtime_config::RuntimeConfig;
    use dyndispatch::server::{standard_pipeline, AppService, HttpServer, ServerHandle};
    use std::net::{SocketAddr, TcpListener};

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// A loopback address nothing is listening on yet.
    pub fn free_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    /// Running server plus the tokio runtime its pipeline executes on.
    /// Stopped on drop.
    pub struct TestServer {
        pub addr: SocketAddr,
        pub metrics: Arc<MetricsMiddleware>,
        handle: Option<ServerHandle>,
        _runtime: tokio::runtime::Runtime,
    }

    impl TestServer {
        pub fn start(
            config: &DispatchConfig,
            handlers: HandlerRegistry,
            services: ServiceRegistry,
        ) -> Self {
            setup_may_runtime();
            let runtime = RuntimeConfig {
                worker_threads: Some(2),
                ..RuntimeConfig::default()
            }
            .build_tokio()
            .unwrap();
            let dispatcher =
                Dispatcher::from_config(config, Arc::new(handlers), Arc::new(services));
            let metrics = Arc::new(MetricsMiddleware::new());
            let pipeline = standard_pipeline(dispatcher, &config.route_prefix(), metrics.clone());
            let service = AppService::new(Arc::new(pipeline), runtime.handle().clone())
                .with_metrics(metrics.clone());
            let addr = free_addr();
            let handle = HttpServer(service).start(addr).unwrap();
            handle.wait_ready().unwrap();
            Self {
                addr,
                metrics,
                handle: Some(handle),
                _runtime: runtime,
            }
        }

        /// Server with the bundled demo handlers and default configuration.
        pub fn demo() -> Self {
            let config = DispatchConfig::default();
            let handlers = demo_registry(&config.namespace).unwrap();
            Self::start(&config, handlers, demo_services())
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(handle) = self.handle.take() {
                handle.stop();
            }
        }
    }
}

pub mod http {
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    #[derive(Debug)]
    pub struct RawResponse {
        pub status: u16,
        pub headers: HashMap<String, String>,
        pub body: Vec<u8>,
    }

    impl RawResponse {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
        }

        pub fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).unwrap_or_default()
        }

        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.body).to_string()
        }
    }

    /// `GET path` over a fresh connection.
    pub fn get(addr: &SocketAddr, path: &str) -> RawResponse {
        send_request(
            addr,
            &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n"),
        )
    }

    /// Write `req` verbatim and read one response, honouring Content-Length.
    pub fn send_request(addr: &SocketAddr, req: &str) -> RawResponse {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            if let Some(parsed) = parse_response(&buf) {
                return parsed;
            }
            let mut tmp = [0u8; 4096];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        parse_response(&buf).unwrap_or_else(|| {
            panic!("incomplete response: {:?}", String::from_utf8_lossy(&buf))
        })
    }

    /// `None` until the headers and the full body are in `buf`.
    pub fn parse_response(buf: &[u8]) -> Option<RawResponse> {
        let split = buf.windows(4).position(|w| w == b"\r\n\r\n")?;
        let head = std::str::from_utf8(&buf[..split]).ok()?;
        let mut lines = head.split("\r\n");
        let status = lines.next()?.split_whitespace().nth(1)?.parse().ok()?;
        let headers: HashMap<String, String> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        let body_start = split + 4;
        let length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(buf.len() - body_start);
        if buf.len() < body_start + length {
            return None;
        }
        Some(RawResponse {
            status,
            headers,
            body: buf[body_start..body_start + length].to_vec(),
        })
    }
}
