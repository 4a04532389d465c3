//! End-to-end tests through the reqwest transport against local backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use outbound_gate::config::TransportConfig;
use outbound_gate::transport::ReqwestTransport;
use outbound_gate::{Gate, GateError, RequestOptions, SchedulerConfig};
use reqwest::StatusCode;

mod common;

use common::start_programmable_backend;

fn gate() -> Gate<ReqwestTransport> {
    let transport = ReqwestTransport::new(&TransportConfig::default()).unwrap();
    Gate::new(transport, SchedulerConfig::default())
}

#[tokio::test]
async fn test_fetches_body() {
    let addr = start_programmable_backend(|| async { (200, "hello".to_string()) }).await;
    let gate = gate();

    let response = gate
        .enqueue(&format!("http://{addr}/greeting"), RequestOptions::get())
        .unwrap()
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"hello");
}

#[tokio::test]
async fn test_service_unavailable_starts_cooldown() {
    let addr = start_programmable_backend(|| async { (503, "busy".to_string()) }).await;
    let gate = gate();

    let response = gate
        .enqueue(&format!("http://{addr}/"), RequestOptions::get())
        .unwrap()
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

    let snapshot = gate.host_snapshot("127.0.0.1").unwrap();
    assert!(snapshot.cooldown_remaining.is_some());
    assert_eq!(snapshot.completed, 1);
}

#[tokio::test]
async fn test_duplicate_requests_hit_backend_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let addr = start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            (200, "shared".to_string())
        }
    })
    .await;
    let gate = gate();

    let url = format!("http://{addr}/item");
    let first = gate.enqueue(&url, RequestOptions::get()).unwrap();
    let second = gate.enqueue(&url, RequestOptions::get()).unwrap();
    let (a, b) = tokio::join!(first, second);

    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_refused_rejects() {
    // Bind and drop to get a port nothing listens on.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let gate = gate();

    let err = gate
        .enqueue(&format!("http://{addr}/"), RequestOptions::get())
        .unwrap()
        .await
        .unwrap_err();

    assert!(matches!(err, GateError::Transport(_)));
    let snapshot = gate.host_snapshot("127.0.0.1").unwrap();
    assert!(snapshot.cooldown_remaining.is_some());
}
