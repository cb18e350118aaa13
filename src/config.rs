//! Startup configuration from flags and environment.
//!
//! Every setting can come from a command-line flag or its environment
//! variable (flags win). A `.env` file in the working directory is loaded by
//! the binary before parsing.

use crate::error::{PitError, Result};
use crate::store::{StoreConfig, DEFAULT_CAPACITY};
use crate::subscriptions::SubscriptionConfig;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Service configuration, read once at process start.
#[derive(Clone, Debug, Parser)]
#[command(
    name = "resendpit",
    version,
    about = "Local mail pit for the Resend and SES APIs with a live event stream"
)]
pub struct Config {
    /// Number of emails kept in memory.
    #[arg(long, env = "RESENDPIT_MAX_EMAILS", default_value_t = DEFAULT_CAPACITY)]
    pub max_emails: usize,

    /// Address to bind.
    #[arg(long, env = "RESENDPIT_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds between keepalive comments on event streams.
    #[arg(long, env = "RESENDPIT_KEEPALIVE_SECS", default_value_t = 30)]
    pub keepalive_secs: u64,

    /// Events buffered per viewer before a slow viewer is dropped.
    #[arg(long, env = "RESENDPIT_SUBSCRIBER_BUFFER", default_value_t = 256)]
    pub subscriber_buffer: usize,

    /// Probe a running instance's health endpoint and exit 0 or 1.
    #[arg(long)]
    pub healthcheck: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_emails: DEFAULT_CAPACITY,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            keepalive_secs: 30,
            subscriber_buffer: 256,
            healthcheck: false,
        }
    }
}

impl Config {
    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_emails == 0 {
            return Err(PitError::Config("max emails must be at least 1".into()));
        }
        if self.subscriber_buffer == 0 {
            return Err(PitError::Config("subscriber buffer must be at least 1".into()));
        }
        if self.keepalive_secs == 0 {
            return Err(PitError::Config("keepalive interval must be at least 1 second".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            capacity: self.max_emails,
        }
    }

    pub fn subscription_config(&self) -> SubscriptionConfig {
        SubscriptionConfig {
            buffer_size: self.subscriber_buffer,
        }
    }

    /// URL probed by `--healthcheck`.
    pub fn health_url(&self) -> String {
        format!("http://localhost:{}/api/health", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store_config().capacity, 50);
        assert_eq!(config.keepalive(), Duration::from_secs(30));
        assert_eq!(config.health_url(), "http://localhost:3000/api/health");
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "resendpit",
            "--max-emails",
            "2",
            "--port",
            "8025",
            "--host",
            "127.0.0.1",
            "--keepalive-secs",
            "5",
            "--subscriber-buffer",
            "8",
        ])
        .unwrap();

        assert_eq!(config.max_emails, 2);
        assert_eq!(config.bind_addr(), "127.0.0.1:8025".parse().unwrap());
        assert_eq!(config.keepalive(), Duration::from_secs(5));
        assert_eq!(config.subscription_config().buffer_size, 8);
        assert!(!config.healthcheck);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = Config {
            max_emails: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PitError::Config(_))));
    }

    #[test]
    fn test_rejects_non_numeric_capacity() {
        assert!(Config::try_parse_from(["resendpit", "--max-emails", "lots"]).is_err());
    }
}
