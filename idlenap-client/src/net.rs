use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use idlenap_shared::config::NetCheck;
use idlenap_shared::path::{host_and_port, normalize_url};
use idlenap_shared::services::{Probe, ProbeError};
use tracing::debug;

use crate::AppError;
use crate::platform::Platform;

/// Probe backed by the OS: idle and uptime from the platform, reachability
/// from link state, DNS and one HTTP request.
pub struct SystemProbe {
    platform: Arc<dyn Platform>,
    http: reqwest::Client,
}

impl SystemProbe {
    pub fn new(platform: Arc<dyn Platform>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("idlenap/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Http(e.to_string()))?;
        Ok(Self { platform, http })
    }
}

pub async fn resolves(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, tokio::net::lookup_host((host, port))).await {
        Ok(Ok(mut addrs)) => addrs.next().is_some(),
        Ok(Err(e)) => {
            debug!(error=%e, host, "dns lookup failed");
            false
        }
        Err(_) => {
            debug!(host, "dns lookup timed out");
            false
        }
    }
}

/// 2xx and 3xx both count; redirects are not followed.
pub async fn http_reachable(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    match client.get(url).timeout(timeout).send().await {
        Ok(res) => {
            let status = res.status();
            debug!(%status, url, "reachability response");
            status.is_success() || status.is_redirection()
        }
        Err(e) => {
            debug!(error=%e, url, "reachability request failed");
            false
        }
    }
}

#[async_trait]
impl Probe for SystemProbe {
    fn idle_seconds(&self) -> Result<u64, ProbeError> {
        self.platform.idle_seconds()
    }

    fn uptime_seconds(&self) -> Result<u64, ProbeError> {
        self.platform.uptime_seconds()
    }

    async fn is_online(&self, check: &NetCheck) -> bool {
        if !self.platform.link_up() {
            debug!("no network link");
            return false;
        }
        let Some((host, port)) = host_and_port(&check.url) else {
            debug!(url=%check.url, "reachability url has no host");
            return false;
        };
        if !resolves(&host, port, check.timeout).await {
            return false;
        }
        http_reachable(&self.http, &normalize_url(&check.url), check.timeout).await
    }
}
