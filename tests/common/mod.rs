//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use outbound_gate::{FetchResponse, OutboundRequest, SchedulerConfig, Transport, TransportError};
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

/// Scheduler config with explicit limits and default backoff.
pub fn limits(global: usize, per_host: usize, per_min: usize) -> SchedulerConfig {
    SchedulerConfig {
        global_max_concurrent: global,
        per_host_max_concurrent: per_host,
        per_host_rate_limit_per_min: per_min,
        ..Default::default()
    }
}

/// What the mock transport does for one call.
#[derive(Debug, Clone, Copy)]
pub struct Reply {
    /// `None` fails at the transport layer.
    pub status: Option<u16>,
    pub delay: Duration,
}

impl Reply {
    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn status(code: u16) -> Self {
        Self {
            status: Some(code),
            delay: Duration::ZERO,
        }
    }

    pub fn fail() -> Self {
        Self {
            status: None,
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One observed transport call.
#[derive(Debug, Clone)]
pub struct Call {
    pub at: Instant,
    pub url: String,
    pub host: String,
}

#[derive(Default)]
struct MockState {
    default_reply: Mutex<Option<Reply>>,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
    active: Mutex<HashMap<String, usize>>,
    global_active: Mutex<usize>,
    peak_global: Mutex<usize>,
    peak_host: Mutex<HashMap<String, usize>>,
}

/// Scripted in-memory transport. Replies are taken per host in call order;
/// once a host's script runs out the default reply is used.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default reply for unscripted calls (200 immediately unless set).
    pub fn with_default(self, reply: Reply) -> Self {
        *self.state.default_reply.lock().unwrap() = Some(reply);
        self
    }

    pub fn script(&self, host: &str, replies: impl IntoIterator<Item = Reply>) {
        self.state
            .scripts
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_default()
            .extend(replies);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }

    pub fn peak_global(&self) -> usize {
        *self.state.peak_global.lock().unwrap()
    }

    pub fn peak_host(&self, host: &str) -> usize {
        self.state.peak_host.lock().unwrap().get(host).copied().unwrap_or(0)
    }

    fn start(&self, request: &OutboundRequest) -> Reply {
        let host = request.host.clone();
        self.state.calls.lock().unwrap().push(Call {
            at: Instant::now(),
            url: request.url.to_string(),
            host: host.clone(),
        });

        let mut global = self.state.global_active.lock().unwrap();
        *global += 1;
        let mut peak = self.state.peak_global.lock().unwrap();
        *peak = (*peak).max(*global);

        let mut active = self.state.active.lock().unwrap();
        let count = active.entry(host.clone()).or_default();
        *count += 1;
        let mut peaks = self.state.peak_host.lock().unwrap();
        let host_peak = peaks.entry(host.clone()).or_default();
        *host_peak = (*host_peak).max(*count);

        let scripted = self
            .state
            .scripts
            .lock()
            .unwrap()
            .get_mut(&host)
            .and_then(|q| q.pop_front());
        scripted
            .or(*self.state.default_reply.lock().unwrap())
            .unwrap_or_else(Reply::ok)
    }

    fn finish(&self, host: &str) {
        *self.state.global_active.lock().unwrap() -= 1;
        if let Some(count) = self.state.active.lock().unwrap().get_mut(host) {
            *count -= 1;
        }
    }
}

impl Transport for MockTransport {
    fn fetch(
        &self,
        request: &OutboundRequest,
    ) -> impl Future<Output = Result<FetchResponse, TransportError>> + Send {
        let reply = self.start(request);
        let this = self.clone();
        let url = request.url.clone();
        let host = request.host.clone();

        async move {
            tokio::time::sleep(reply.delay).await;
            this.finish(&host);
            match reply.status {
                Some(code) => Ok(FetchResponse::new(url, StatusCode::from_u16(code).unwrap())),
                None => Err(TransportError::Connect("connection refused".to_string())),
            }
        }
    }
}

/// Start a programmable HTTP backend on an ephemeral port.
///
/// Every connection gets the `(status, body)` produced by `f`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        // Drain the request head before answering.
                        let mut head = Vec::new();
                        let mut buf = [0u8; 1024];
                        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => head.extend_from_slice(&buf[..n]),
                            }
                        }

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
