use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use ::time::{format_description::well_known, OffsetDateTime};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::prober::Prober;
use crate::types::{ClientStatus, Snapshot, SoftwareInstance, Verbosity};

/// Longest refresh period honored; larger intervals are clamped to it.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Shared, wholesale-replaced view of the last completed scan.
///
/// Cloning gives another handle to the same snapshot. Reads are synchronous
/// and never touch the network.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot as-is. Empty with `scanned_at == None` before the first scan.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clients(&self) -> Vec<ClientStatus> {
        self.snapshot().clients.clone()
    }

    /// Every attached software, client by client.
    pub fn softwares(&self) -> Vec<SoftwareInstance> {
        self.snapshot().softwares()
    }

    /// Swap in the result of a completed scan.
    pub fn replace(&self, clients: Vec<ClientStatus>) -> Arc<Snapshot> {
        let next = Arc::new(Snapshot {
            clients,
            scanned_at: Some(now_rfc3339()),
        });
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        next
    }
}

/// Handle to a running refresh loop.
#[derive(Debug)]
pub struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Ask the loop to exit. A scan already in flight still completes and writes once.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait for the loop task to finish.
    pub async fn join(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "poll task ended abnormally");
        }
    }
}

/// Keeps a [`SnapshotCache`] fresh by rescanning on a fixed interval.
///
/// At most one refresh loop runs per poller; `start` while running and `stop`
/// while idle are logged no-ops.
#[derive(Debug)]
pub struct Poller {
    prober: Arc<Prober>,
    cache: SnapshotCache,
    handle: Option<PollHandle>,
}

impl Poller {
    pub fn new(prober: Prober) -> Self {
        Self::with_cache(prober, SnapshotCache::new())
    }

    /// Poll into an existing cache, e.g. one already handed to a reader.
    pub fn with_cache(prober: Prober, cache: SnapshotCache) -> Self {
        Self {
            prober: Arc::new(prober),
            cache,
            handle: None,
        }
    }

    /// Another handle to the snapshot this poller writes.
    pub fn cache(&self) -> SnapshotCache {
        self.cache.clone()
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    /// Whether a refresh loop is installed and its task is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.cache.snapshot()
    }

    pub fn clients(&self) -> Vec<ClientStatus> {
        self.cache.clients()
    }

    pub fn softwares(&self) -> Vec<SoftwareInstance> {
        self.cache.softwares()
    }

    /// Scan right away, then keep rescanning every `interval` in the background.
    ///
    /// Returns `false` without scanning if a loop is already running. A failed
    /// initial scan is logged and leaves the snapshot untouched; it never reaches
    /// the caller. The interval is kept within one millisecond and [`MAX_INTERVAL`].
    pub async fn start(&mut self, interval: Duration, verbosity: Verbosity) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                self.handle = Some(handle);
                info!("polling is already running");
                return false;
            }
            Some(_) => warn!("previous poll loop had exited, restarting"),
            None => {}
        }

        match refresh(&self.prober, &self.cache, verbosity).await {
            Ok(snapshot) => info!(clients = snapshot.clients.len(), "updated clients"),
            Err(e) => warn!(error = %e, "initial client scan failed"),
        }

        let period = interval.clamp(Duration::from_millis(1), MAX_INTERVAL);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.prober.clone(),
            self.cache.clone(),
            period,
            verbosity,
            cancel.clone(),
        ));
        self.handle = Some(PollHandle { cancel, task });
        info!(
            interval_ms = period.as_millis() as u64,
            %verbosity,
            "polling started"
        );
        true
    }

    /// Stop the refresh loop, freezing the snapshot at its last value.
    ///
    /// Returns `false` if nothing was running.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.cancel();
                info!("polling stopped");
                true
            }
            None => {
                info!("no polling is running");
                false
            }
        }
    }

    /// Like [`Poller::stop`], but also waits until the loop task has exited.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().await;
            info!("polling stopped");
        }
    }

    /// One scan-and-replace outside the timer.
    pub async fn refresh_now(&self, verbosity: Verbosity) -> Result<Arc<Snapshot>, ScanError> {
        refresh(&self.prober, &self.cache, verbosity).await
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }
}

async fn refresh(
    prober: &Prober,
    cache: &SnapshotCache,
    verbosity: Verbosity,
) -> Result<Arc<Snapshot>, ScanError> {
    let clients = prober.scan(verbosity).await?;
    Ok(cache.replace(clients))
}

async fn poll_loop(
    prober: Arc<Prober>,
    cache: SnapshotCache,
    period: Duration,
    verbosity: Verbosity,
    cancel: CancellationToken,
) {
    // First tick one period out; `start` already did the immediate scan.
    let now = Instant::now();
    let first = now.checked_add(period).unwrap_or(now);
    let mut ticker = time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match refresh(&prober, &cache, verbosity).await {
            Ok(snapshot) => {
                if verbosity >= Verbosity::Info {
                    info!(clients = snapshot.clients.len(), "updated clients");
                }
            }
            Err(e) => {
                if verbosity >= Verbosity::Debug {
                    warn!(error = %e, "error while fetching clients");
                }
            }
        }
    }
    debug!("poll loop exited");
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
