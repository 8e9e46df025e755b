use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default address of the local helper process.
pub const DEFAULT_HELPER_URL: &str = "http://localhost:8765";

/// Default per-request timeout for helper calls.
pub const DEFAULT_HELPER_TIMEOUT_SECONDS: u64 = 20;

/// Default interval between refresh-job status polls.
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 15;

/// Application configuration.
///
/// Read from environment variables (after `.env` is loaded by the
/// binary). Every value has a default suitable for running on the
/// user's own machine.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Address the wizard API binds to
    pub server_host: String,

    /// Port the wizard API binds to
    pub server_port: u16,

    /// Base URL of the helper process
    pub helper_url: String,

    /// Per-request timeout for helper calls
    pub helper_timeout: Duration,

    /// Local invoice data file
    pub invoice_data_path: PathBuf,

    /// Remote invoice data URL; takes precedence over the file when set
    pub invoice_data_url: Option<String>,

    /// Interval between refresh-job status polls
    pub poll_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 5173,
            helper_url: DEFAULT_HELPER_URL.to_string(),
            helper_timeout: Duration::from_secs(DEFAULT_HELPER_TIMEOUT_SECONDS),
            invoice_data_path: PathBuf::from("faktury_dane.json"),
            invoice_data_url: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS),
        }
    }
}

impl AppConfig {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let server_port = parse_var(&lookup, "SERVER_PORT")?.unwrap_or(defaults.server_port);
        let helper_timeout = parse_var::<u64, _>(&lookup, "HELPER_TIMEOUT_SECONDS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.helper_timeout);
        let poll_interval = match parse_var::<u64, _>(&lookup, "REFRESH_POLL_INTERVAL_SECONDS")? {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    name: "REFRESH_POLL_INTERVAL_SECONDS",
                    value: "0".to_string(),
                })
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.poll_interval,
        };

        Ok(Self {
            server_host: lookup("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port,
            helper_url: lookup("HELPER_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.helper_url),
            helper_timeout,
            invoice_data_path: lookup("INVOICE_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.invoice_data_path),
            invoice_data_url: lookup("INVOICE_DATA_URL").filter(|url| !url.trim().is_empty()),
            poll_interval,
        })
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(None),
    }
}
