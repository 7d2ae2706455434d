use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Status reported by one live Client, stamped with the port it was found on.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientStatus {
    #[serde(rename = "clientVersion")]
    pub client_version: String,
    /// Assigned by the prober. The Client does not know which port it was reached on.
    #[serde(default, skip_deserializing)]
    pub port: u16,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub softwares: Vec<SoftwareInstance>,
}

/// One creative application attached to a Client through its add-on.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareInstance {
    pub name: String,
    pub version: String,
    /// OS process id of the application. Opaque routing token for downloads.
    #[serde(rename = "appID")]
    pub app_id: u64,
    pub addon_version: String,
    #[serde(default)]
    pub project_name: Option<String>,
    /// Port of the owning Client, filled in by the prober.
    #[serde(default, skip_deserializing)]
    pub client_port: u16,
}

/// Result of the most recently completed scan.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub clients: Vec<ClientStatus>,
    /// RFC3339 time of the scan; `None` until the first scan lands.
    pub scanned_at: Option<String>,
}

impl Snapshot {
    /// All software instances, client by client, in snapshot order.
    pub fn softwares(&self) -> Vec<SoftwareInstance> {
        self.clients
            .iter()
            .flat_map(|c| c.softwares.iter().cloned())
            .collect()
    }
}

/// JSON body of `POST /bkclientjs/get_asset`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub api_key: String,
    pub asset_id: String,
    pub asset_base_id: String,
    pub resolution: String,
    pub app_id: u64,
}

/// How much incidental failure detail gets logged. Never affects results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Only unexpected faults.
    #[default]
    Quiet,
    /// Also non-200 responses from candidate ports.
    Info,
    /// Also failed requests and undecodable bodies.
    Debug,
}

impl Verbosity {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Verbosity::Quiet,
            1 => Verbosity::Info,
            _ => Verbosity::Debug,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(Verbosity::Quiet),
            "1" => Ok(Verbosity::Info),
            "2" => Ok(Verbosity::Debug),
            other => Err(format!("verbosity must be 0, 1 or 2, got {other:?}")),
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
