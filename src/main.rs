use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use bkclient_rs::types::{Snapshot, SoftwareInstance};
use bkclient_rs::{ports, server, ClientConfig, Dispatcher, Poller, Prober, Verbosity};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// bkclient-rs — find local gallery bridge Clients and send assets to attached applications.
#[derive(Debug, Clone, Parser)]
#[command(name = "bkclient-rs", version, long_about = None)]
struct Cli {
    /// Host the Clients listen on.
    #[arg(long, default_value = "localhost", global = true)]
    host: String,

    /// Path to a candidate ports file (one port or range per line). Missing or empty means defaults.
    #[arg(long, global = true)]
    ports: Option<PathBuf>,

    /// Comma separated candidate ports; overrides --ports.
    #[arg(long = "port-list", global = true)]
    port_list: Option<String>,

    /// Per-probe timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 1500, global = true)]
    timeout_ms: u64,

    /// 0 = quiet, 1 = log unexpected responses, 2 = log every failed probe.
    #[arg(short, long, default_value = "0", global = true)]
    verbosity: Verbosity,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Probe every candidate port once and print what answered.
    Scan {
        /// Write the snapshot as pretty JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Keep polling and print the software list whenever it changes.
    Watch {
        #[arg(long = "interval-ms", default_value_t = 5000)]
        interval_ms: u64,
    },
    /// Ask a Client to download an asset into one attached application.
    Download {
        #[arg(long)]
        port: u16,
        #[arg(long = "app-id")]
        app_id: u64,
        #[arg(long = "asset-id")]
        asset_id: String,
        #[arg(long = "asset-base-id")]
        asset_base_id: String,
        #[arg(long, default_value = "blend")]
        resolution: String,
        #[arg(long = "api-key", default_value = "")]
        api_key: String,
    },
    /// Poll in the background and serve the snapshot as JSON.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
        #[arg(long = "interval-ms", default_value_t = 5000)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbosity);

    let config = build_config(&cli)?;
    tracing::debug!(
        host = %config.host,
        ports = ?config.ports,
        timeout_ms = cli.timeout_ms,
        "configuration loaded"
    );

    match cli.command {
        Command::Scan { output } => {
            let prober = Prober::new(config)?;
            let poller = Poller::new(prober);
            let snapshot = poller.refresh_now(cli.verbosity).await?;
            print_snapshot(&snapshot);
            if let Some(path) = output.as_deref() {
                write_snapshot_json(path, &snapshot)?;
                println!("Wrote JSON snapshot to {}", path.display());
            }
        }
        Command::Watch { interval_ms } => {
            let mut poller = Poller::new(Prober::new(config)?);
            poller
                .start(Duration::from_millis(interval_ms), cli.verbosity)
                .await;
            let mut last: Option<Vec<SoftwareInstance>> = None;
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = ticker.tick() => {
                        let current = poller.softwares();
                        if last.as_ref() != Some(&current) {
                            print_softwares(&current);
                            last = Some(current);
                        }
                    }
                }
            }
            poller.shutdown().await;
        }
        Command::Download {
            port,
            app_id,
            asset_id,
            asset_base_id,
            resolution,
            api_key,
        } => {
            let dispatcher = Dispatcher::new(config)?;
            let scheduled = dispatcher
                .download_asset_to_software(
                    port,
                    app_id,
                    &asset_id,
                    &asset_base_id,
                    &resolution,
                    &api_key,
                )
                .await;
            if !scheduled {
                eprintln!("Client on port {port} did not accept the download");
                return Ok(ExitCode::FAILURE);
            }
            println!("Download of {asset_id} scheduled to app {app_id} via port {port}");
        }
        Command::Serve { bind, interval_ms } => {
            let mut poller = Poller::new(Prober::new(config.clone())?);
            poller
                .start(Duration::from_millis(interval_ms), cli.verbosity)
                .await;
            let state = server::AppState::new(
                poller.cache(),
                Prober::new(config.clone())?,
                Dispatcher::new(config)?,
                cli.verbosity,
            );
            println!("Serving on http://{} (Ctrl+C to stop)", bind);
            tokio::select! {
                res = server::spawn_server(&bind, state) => res?,
                _ = tokio::signal::ctrl_c() => {}
            }
            poller.shutdown().await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbosity: Verbosity) {
    let default_level = match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Info => "info",
        Verbosity::Debug => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let candidate_ports = match (&cli.port_list, &cli.ports) {
        (Some(list), _) => ports::parse_ports_list(list).context("invalid --port-list")?,
        (None, Some(path)) => ports::load_ports_or_default(path),
        (None, None) => ports::default_ports(),
    };
    Ok(ClientConfig::default()
        .with_host(cli.host.clone())
        .with_ports(candidate_ports)
        .with_probe_timeout(Duration::from_millis(cli.timeout_ms)))
}

fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "\nClients found: {} (scanned at {})",
        snapshot.clients.len(),
        snapshot.scanned_at.as_deref().unwrap_or("<never>")
    );
    for c in &snapshot.clients {
        println!(
            "  port {:>5}  client {}  softwares {}",
            c.port,
            c.client_version,
            c.softwares.len()
        );
    }
    print_softwares(&snapshot.softwares());
}

fn print_softwares(softwares: &[SoftwareInstance]) {
    let mut name_w = "name".len();
    let mut project_w = "project".len();
    for s in softwares {
        name_w = name_w.max(s.name.len());
        if let Some(p) = &s.project_name {
            project_w = project_w.max(p.len().min(40));
        }
    }
    let port_w = 5usize;
    let app_w = 8usize;

    println!("\nSoftwares: {}", softwares.len());
    println!(
        "{:<name_w$}  {:<8}  {:>app_w$}  {:>port_w$}  {:<project_w$}",
        "name", "version", "app_id", "port", "project",
    );
    println!(
        "{:-<name_w$}  {:-<8}  {:-<app_w$}  {:-<port_w$}  {:-<project_w$}",
        "", "", "", "", "",
    );
    for s in softwares {
        let mut project = s.project_name.clone().unwrap_or_default();
        if project.len() > 40 {
            project = project.chars().take(40).collect();
        }
        println!(
            "{:<name_w$}  {:<8}  {:>app_w$}  {:>port_w$}  {:<project_w$}",
            s.name, s.version, s.app_id, s.client_port, project,
        );
    }
}

fn write_snapshot_json(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}
