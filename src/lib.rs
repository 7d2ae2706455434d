//! Library crate for bkclient-rs: discover local bridge Clients, keep a polled
//! snapshot of them, and send download commands.
pub mod config;
pub mod dispatch;
pub mod error;
pub mod poller;
pub mod ports;
pub mod prober;
pub mod server;
pub mod types;

pub use config::ClientConfig;
pub use dispatch::Dispatcher;
pub use poller::{PollHandle, Poller, SnapshotCache};
pub use prober::Prober;
pub use types::{AssetRequest, ClientStatus, Snapshot, SoftwareInstance, Verbosity};
