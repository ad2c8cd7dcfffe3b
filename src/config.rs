//! Server configuration from environment variables

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{RelayError, RelayResult};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Frames buffered per connection before broadcasts to it start failing
    pub outbound_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Load config from HOST, PORT and OUTBOUND_QUEUE_CAPACITY.
    /// Unset or blank variables fall back to defaults; unparsable ones are
    /// an error.
    pub fn from_env() -> RelayResult<Self> {
        let defaults = Self::default();

        let host = match env_value("HOST") {
            Some(v) => v
                .parse()
                .map_err(|_| RelayError::Config(format!("HOST is not an IP address: {}", v)))?,
            None => defaults.host,
        };

        let port = match env_value("PORT") {
            Some(v) => v
                .parse()
                .map_err(|_| RelayError::Config(format!("PORT is not a valid port: {}", v)))?,
            None => defaults.port,
        };

        let outbound_queue_capacity = match env_value("OUTBOUND_QUEUE_CAPACITY") {
            Some(v) => match v.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(RelayError::Config(format!(
                        "OUTBOUND_QUEUE_CAPACITY must be a positive integer: {}",
                        v
                    )))
                }
            },
            None => defaults.outbound_queue_capacity,
        };

        tracing::info!(%host, port, outbound_queue_capacity, "Server config loaded");

        Ok(Self {
            host,
            port,
            outbound_queue_capacity,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
