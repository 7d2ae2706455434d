mod common;

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use bkclient_rs::error::ProbeError;
use bkclient_rs::{Prober, Verbosity};
use serde_json::json;

use common::{config_for, dead_port, software, spawn_client, spawn_slow_client, status_body};

#[tokio::test]
async fn only_live_ports_are_reported_in_candidate_order() {
    let first = spawn_client(StatusCode::OK, status_body("1.0.0", json!([software("Blender", 1)]))).await;
    let not_found = spawn_client(StatusCode::NOT_FOUND, "nope").await;
    let garbage = spawn_client(StatusCode::OK, "<html>other app</html>").await;
    let second = spawn_client(StatusCode::OK, status_body("2.0.0", json!([]))).await;
    let refused = dead_port();

    // Live ports deliberately interleaved with absent ones.
    let ports = vec![second.port, refused, not_found.port, garbage.port, first.port];
    let prober = Prober::new(config_for(ports)).unwrap();

    let clients = prober.scan(Verbosity::Debug).await.unwrap();
    let found: Vec<(u16, &str)> = clients
        .iter()
        .map(|c| (c.port, c.client_version.as_str()))
        .collect();
    assert_eq!(found, vec![(second.port, "2.0.0"), (first.port, "1.0.0")]);
}

#[tokio::test]
async fn one_refused_port_out_of_three() {
    let a = spawn_client(StatusCode::OK, status_body("1.2.1", json!([]))).await;
    let b = spawn_client(StatusCode::OK, status_body("1.2.1", json!([]))).await;
    let prober = Prober::new(config_for(vec![a.port, dead_port(), b.port])).unwrap();

    let clients = prober.scan(Verbosity::Quiet).await.unwrap();
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0].port, a.port);
    assert_eq!(clients[1].port, b.port);
}

#[tokio::test]
async fn repeated_candidate_port_yields_one_status() {
    let c = spawn_client(StatusCode::OK, status_body("1.2.1", json!([]))).await;
    let other = spawn_client(StatusCode::OK, status_body("1.2.1", json!([]))).await;
    let prober = Prober::new(config_for(vec![c.port, other.port, c.port])).unwrap();

    let clients = prober.scan(Verbosity::Quiet).await.unwrap();
    let ports: Vec<u16> = clients.iter().map(|s| s.port).collect();
    assert_eq!(ports, vec![c.port, other.port]);
    assert_eq!(c.status_hits(), 1);
}

#[tokio::test]
async fn null_softwares_become_empty_list() {
    let c = spawn_client(StatusCode::OK, r#"{"clientVersion":"1.2.1","softwares":null}"#).await;
    let prober = Prober::new(config_for(vec![c.port])).unwrap();

    let clients = prober.scan(Verbosity::Quiet).await.unwrap();
    assert_eq!(clients.len(), 1);
    assert!(clients[0].softwares.is_empty());
}

#[tokio::test]
async fn probed_port_overrides_payload_and_is_stamped_on_softwares() {
    let body = json!({
        "clientVersion": "1.2.1",
        "port": "1",
        "softwares": [software("Blender", 10), software("Godot", 11)],
    })
    .to_string();
    let c = spawn_client(StatusCode::OK, body).await;
    let prober = Prober::new(config_for(vec![c.port])).unwrap();

    let status = prober.probe(c.port).await.unwrap();
    assert_eq!(status.port, c.port);
    assert_eq!(status.softwares.len(), 2);
    assert!(status.softwares.iter().all(|s| s.client_port == c.port));
    assert_eq!(status.softwares[1].name, "Godot");
    assert_eq!(status.softwares[1].app_id, 11);
}

#[tokio::test]
async fn probe_failures_are_classified() {
    let teapot = spawn_client(StatusCode::IM_A_TEAPOT, "").await;
    let garbage = spawn_client(StatusCode::OK, "{").await;
    let prober = Prober::new(config_for(Vec::new())).unwrap();

    let err = prober.probe(teapot.port).await.unwrap_err();
    assert!(matches!(err, ProbeError::Status(418)));
    assert!(err.is_unexpected_status());

    let err = prober.probe(garbage.port).await.unwrap_err();
    assert!(matches!(err, ProbeError::Decode(_)));

    let err = prober.probe(dead_port()).await.unwrap_err();
    assert!(matches!(err, ProbeError::Http(_)));
}

#[tokio::test]
async fn unresponsive_port_does_not_stall_the_scan() {
    let slow = spawn_slow_client(Duration::from_secs(5), status_body("1.0.0", json!([]))).await;
    let fast = spawn_client(StatusCode::OK, status_body("1.0.0", json!([]))).await;
    let config = config_for(vec![slow.port, fast.port]).with_probe_timeout(Duration::from_millis(200));
    let prober = Prober::new(config).unwrap();

    let started = Instant::now();
    let clients = prober.scan(Verbosity::Debug).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].port, fast.port);
}

#[tokio::test]
async fn no_candidates_no_clients() {
    let prober = Prober::new(config_for(Vec::new())).unwrap();
    assert!(prober.scan(Verbosity::Quiet).await.unwrap().is_empty());
}
