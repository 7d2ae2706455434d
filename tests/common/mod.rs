#![allow(dead_code)]

use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bkclient_rs::ClientConfig;
use serde_json::{json, Value};
use tokio::sync::Mutex;

/// A fake bridge Client listening on an ephemeral loopback port.
#[derive(Clone)]
pub struct MockClient {
    pub port: u16,
    state: MockState,
}

#[derive(Clone)]
struct MockState {
    status: Arc<AtomicU16>,
    body: Arc<String>,
    delay: Duration,
    status_hits: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<Value>>>,
}

impl MockClient {
    pub fn status_hits(&self) -> usize {
        self.state.status_hits.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, code: StatusCode) {
        self.state.status.store(code.as_u16(), Ordering::SeqCst);
    }

    pub async fn received(&self) -> Vec<Value> {
        self.state.received.lock().await.clone()
    }
}

pub async fn spawn_client(status: StatusCode, body: impl Into<String>) -> MockClient {
    spawn_with(status, body.into(), Duration::ZERO).await
}

pub async fn spawn_slow_client(delay: Duration, body: impl Into<String>) -> MockClient {
    spawn_with(StatusCode::OK, body.into(), delay).await
}

async fn spawn_with(status: StatusCode, body: String, delay: Duration) -> MockClient {
    let state = MockState {
        status: Arc::new(AtomicU16::new(status.as_u16())),
        body: Arc::new(body),
        delay,
        status_hits: Arc::new(AtomicUsize::new(0)),
        received: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/bkclientjs/status", get(status_handler))
        .route("/bkclientjs/get_asset", post(get_asset_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockClient { port, state }
}

async fn status_handler(State(s): State<MockState>) -> (StatusCode, String) {
    s.status_hits.fetch_add(1, Ordering::SeqCst);
    if !s.delay.is_zero() {
        tokio::time::sleep(s.delay).await;
    }
    let code = StatusCode::from_u16(s.status.load(Ordering::SeqCst)).unwrap();
    (code, s.body.as_ref().clone())
}

async fn get_asset_handler(State(s): State<MockState>, Json(body): Json<Value>) -> StatusCode {
    s.received.lock().await.push(body);
    StatusCode::from_u16(s.status.load(Ordering::SeqCst)).unwrap()
}

/// A loopback port with nothing listening on it.
pub fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

pub fn config_for(ports: Vec<u16>) -> ClientConfig {
    ClientConfig::default()
        .with_host("127.0.0.1")
        .with_ports(ports)
        .with_probe_timeout(Duration::from_millis(500))
}

pub fn software(name: &str, app_id: u64) -> Value {
    json!({
        "name": name,
        "version": "4.2.1",
        "appID": app_id,
        "addonVersion": "3.12.3",
        "projectName": format!("{name}-{app_id}"),
    })
}

pub fn status_body(version: &str, softwares: Value) -> String {
    json!({ "clientVersion": version, "softwares": softwares }).to_string()
}

/// Poll `cond` every 10ms until it holds or `limit` elapses.
pub async fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
