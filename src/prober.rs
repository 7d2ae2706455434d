use reqwest::StatusCode;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ProbeError, ScanError};
use crate::ports;
use crate::types::{ClientStatus, Verbosity};

type ProbeOutcome = (usize, u16, Result<ClientStatus, ProbeError>);

/// Probes candidate ports for live Clients.
///
/// Holds one pooled HTTP client; cloning a `reqwest::Client` is cheap so each
/// probe task gets its own handle.
#[derive(Debug, Clone)]
pub struct Prober {
    http: reqwest::Client,
    config: ClientConfig,
}

impl Prober {
    /// Build a prober with the configured per-probe timeout. Proxies are
    /// disabled since every request targets the local machine. Repeated
    /// candidate ports are dropped so a scan reports each port at most once.
    pub fn new(mut config: ClientConfig) -> Result<Self, reqwest::Error> {
        config.ports = ports::dedup_ports(config.ports);
        let http = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .no_proxy()
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Request the status of the Client on `port`.
    pub async fn probe(&self, port: u16) -> Result<ClientStatus, ProbeError> {
        probe_port(&self.http, &self.config.status_url(port), port).await
    }

    /// Probe every candidate port once and return the live Clients.
    ///
    /// - All probes run concurrently; results come back in candidate-list order.
    /// - Non-200 answers, transport failures and undecodable bodies mean "no Client
    ///   here" and never abort the scan.
    /// - A probe task that dies is logged and skipped like an absent port; the
    ///   scan only fails if no probe task could be joined at all.
    /// - `verbosity` only decides which of those failures get logged.
    pub async fn scan(&self, verbosity: Verbosity) -> Result<Vec<ClientStatus>, ScanError> {
        let mut set = JoinSet::new();
        for (idx, &port) in self.config.ports.iter().enumerate() {
            let http = self.http.clone();
            let url = self.config.status_url(port);
            set.spawn(async move {
                let outcome = probe_port(&http, &url, port).await;
                (idx, port, outcome)
            });
        }
        gather(set, verbosity).await
    }
}

/// Drain probe tasks and keep the successful ones in candidate order.
async fn gather(
    mut set: JoinSet<ProbeOutcome>,
    verbosity: Verbosity,
) -> Result<Vec<ClientStatus>, ScanError> {
    let mut found = Vec::new();
    let mut joined_any = false;
    let mut last_join_error = None;

    while let Some(joined) = set.join_next().await {
        let (idx, port, outcome) = match joined {
            Ok(done) => done,
            Err(e) => {
                warn!(error = %e, "probe task failed");
                last_join_error = Some(e);
                continue;
            }
        };
        joined_any = true;
        match outcome {
            Ok(status) => found.push((idx, status)),
            Err(e) => log_absent(port, &e, verbosity),
        }
    }

    if let (false, Some(e)) = (joined_any, last_join_error) {
        return Err(ScanError::Join(e));
    }

    found.sort_by_key(|(idx, _)| *idx);
    Ok(found.into_iter().map(|(_, status)| status).collect())
}

async fn probe_port(
    http: &reqwest::Client,
    url: &str,
    port: u16,
) -> Result<ClientStatus, ProbeError> {
    let resp = http.get(url).send().await?;
    let status = resp.status();
    if status != StatusCode::OK {
        return Err(ProbeError::Status(status.as_u16()));
    }
    let body = resp.bytes().await?;
    let mut client: ClientStatus = serde_json::from_slice(&body)?;

    client.port = port;
    for software in &mut client.softwares {
        software.client_port = port;
    }
    debug!(
        port,
        version = %client.client_version,
        softwares = client.softwares.len(),
        "client responded"
    );
    Ok(client)
}

fn log_absent(port: u16, err: &ProbeError, verbosity: Verbosity) {
    if err.is_unexpected_status() {
        if verbosity >= Verbosity::Info {
            info!(port, error = %err, "wrong status code from candidate port");
        }
    } else if verbosity >= Verbosity::Debug {
        debug!(port, error = %err, "no client on candidate port");
    }
}
