//! network provisioning
//!
//! the station joins the network once at boot. on a linux host the link is
//! owned by the os, so "joining" means waiting until the telemetry endpoint is
//! reachable, giving up after a fixed number of probes.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::net::TcpStream;

use crate::config::ProvisioningConfig;

pub trait Provisioner {
    /// block until the network is usable or the provisioner gives up.
    /// `ap_name` is the access point offered for manual setup.
    async fn auto_connect(&mut self, ap_name: &str) -> bool;
}

/// probes tcp reachability of the telemetry host
pub struct NetworkProvisioner {
    host: String,
    port: u16,
    attempts: u32,
    timeout: Duration,
    retry_delay: Duration,
}

impl NetworkProvisioner {
    pub fn new(endpoint: &str, config: &ProvisioningConfig) -> Result<Self> {
        let (host, port) = endpoint_address(endpoint)?;
        Ok(Self {
            host,
            port,
            attempts: config.attempts.max(1),
            timeout: Duration::from_secs(config.timeout_seconds),
            retry_delay: Duration::from_secs(config.retry_delay_seconds),
        })
    }

    async fn probe(&self) -> Result<()> {
        let addr = (self.host.as_str(), self.port);
        tokio::time::timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| anyhow!("timed out after {:?}", self.timeout))?
            .with_context(|| format!("connect to {}:{}", self.host, self.port))?;
        Ok(())
    }
}

impl Provisioner for NetworkProvisioner {
    async fn auto_connect(&mut self, ap_name: &str) -> bool {
        for attempt in 1..=self.attempts {
            match self.probe().await {
                Ok(()) => {
                    tracing::info!("[NET] {}:{} reachable (attempt {})", self.host, self.port, attempt);
                    return true;
                }
                Err(e) => {
                    tracing::warn!("[NET] attempt {}/{} failed: {:#}", attempt, self.attempts, e);
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        tracing::error!("[NET] giving up, configure the network via access point {:?}", ap_name);
        false
    }
}

/// host and port of an http(s) endpoint, port defaults from the scheme
pub fn endpoint_address(endpoint: &str) -> Result<(String, u16)> {
    let url = reqwest::Url::parse(endpoint).with_context(|| format!("invalid endpoint {:?}", endpoint))?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("endpoint {:?} has no host", endpoint))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("endpoint {:?} has no port", endpoint))?;
    Ok((host, port))
}
