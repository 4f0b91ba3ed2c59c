use std::net::Ipv4Addr;
use std::net::SocketAddr;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Prometheus `/metrics` endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Address the endpoint binds to, e.g. `127.0.0.1:9100`
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_listen_addr(),
        }
    }
}

impl MonitoringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.listen_addr.port() == 0 {
            return Err(invalid(format!(
                "monitoring.listen_addr {} needs an explicit port",
                self.listen_addr
            )));
        }
        Ok(())
    }
}

fn default_listen_addr() -> SocketAddr {
    (Ipv4Addr::UNSPECIFIED, 9090).into()
}
