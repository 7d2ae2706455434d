use std::time::Duration;

use crate::ports;

pub const STATUS_PATH: &str = "/bkclientjs/status";
pub const GET_ASSET_PATH: &str = "/bkclientjs/get_asset";

/// Where and how to reach local Clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    /// Candidate ports in probing order, without duplicates.
    pub ports: Vec<u16>,
    /// Upper bound for a single status probe.
    pub probe_timeout: Duration,
    /// Upper bound for a download command.
    pub dispatch_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            ports: ports::default_ports(),
            probe_timeout: Duration::from_millis(1500),
            dispatch_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Set the candidate ports; repeats are dropped, first occurrence wins.
    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports::dedup_ports(ports);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn status_url(&self, port: u16) -> String {
        format!("http://{}:{}{}", self.host, port, STATUS_PATH)
    }

    pub fn get_asset_url(&self, port: u16) -> String {
        format!("http://{}:{}{}", self.host, port, GET_ASSET_PATH)
    }
}
