use reqwest::StatusCode;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::DispatchError;
use crate::types::AssetRequest;

/// Sends download commands to a previously discovered Client.
///
/// Stateless: it neither reads nor writes any snapshot. The caller picks the
/// port and app id from a discovery result.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    config: ClientConfig,
}

impl Dispatcher {
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.dispatch_timeout)
            .no_proxy()
            .build()?;
        Ok(Self { http, config })
    }

    /// Ask the Client on `port` to download an asset into the application `app_id`.
    ///
    /// Returns `true` only if the Client answered 200, which means the download
    /// was scheduled, not that it finished. Failures are logged, never raised.
    pub async fn download_asset_to_software(
        &self,
        port: u16,
        app_id: u64,
        asset_id: &str,
        asset_base_id: &str,
        resolution: &str,
        api_key: &str,
    ) -> bool {
        let request = AssetRequest {
            api_key: api_key.to_owned(),
            asset_id: asset_id.to_owned(),
            asset_base_id: asset_base_id.to_owned(),
            resolution: resolution.to_owned(),
            app_id,
        };
        match self.dispatch(port, &request).await {
            Ok(()) => {
                info!(port, app_id, asset_id, "download scheduled");
                true
            }
            Err(e) => {
                warn!(port, app_id, asset_id, error = %e, "download not scheduled");
                false
            }
        }
    }

    /// POST `request` to the Client on `port`; anything but 200 is an error.
    pub async fn dispatch(&self, port: u16, request: &AssetRequest) -> Result<(), DispatchError> {
        let resp = self
            .http
            .post(self.config.get_asset_url(port))
            .json(request)
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            other => Err(DispatchError::Rejected(other.as_u16())),
        }
    }
}
