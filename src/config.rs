use std::env;
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const MEGABYTE: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Read(String),
    #[error("malformed config: {0}")]
    Parse(String),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Settings of the json configuration file. Every key is optional; a
/// missing file means all defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Length of generated keys, at least 2.
    pub key_length: usize,
    /// How long a record lives.
    pub lifetime_minutes: i64,
    /// Cache idle expiry, also the sweep interval.
    pub cache_expiry_minutes: u64,
    /// Cache weight bound.
    pub cache_max_size_mb: u64,
    /// Stored-size cap per record.
    pub max_content_length_mb: u64,
    /// Size of the i/o worker pool.
    pub core_pool_size: usize,
    pub post_rate_limit_period_mins: u64,
    /// Uploads allowed per client and window.
    pub post_rate_limit: u32,
    pub read_rate_limit_period_mins: u64,
    /// Reads allowed per client and window.
    pub read_rate_limit: u32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            host: String::from("127.0.0.1"),
            port: 8080,
            key_length: 7,
            lifetime_minutes: 1440,
            cache_expiry_minutes: 10,
            cache_max_size_mb: 200,
            max_content_length_mb: 10,
            core_pool_size: 16,
            post_rate_limit_period_mins: 10,
            post_rate_limit: 30,
            read_rate_limit_period_mins: 10,
            read_rate_limit: 100,
        }
    }
}

impl Config {
    pub fn lifetime_ms(&self) -> i64 {
        self.lifetime_minutes * 60 * 1000
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_minutes * 60)
    }

    pub fn cache_max_bytes(&self) -> u64 {
        self.cache_max_size_mb * MEGABYTE
    }

    pub fn max_content_length(&self) -> usize {
        (self.max_content_length_mb * MEGABYTE) as usize
    }

    pub fn post_rate_period(&self) -> Duration {
        Duration::from_secs(self.post_rate_limit_period_mins * 60)
    }

    pub fn read_rate_period(&self) -> Duration {
        Duration::from_secs(self.read_rate_limit_period_mins * 60)
    }
}

/// Load settings from a json file, then apply the `SERVER_HOST` and
/// `SERVER_PORT` environment overrides. A missing file yields the
/// defaults; a file that cannot be read or parsed is an error.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let mut config = match path.exists() {
        true => {
            let text = match read_to_string(path) {
                Ok(v) => v,
                Err(e) => {
                    return Err(ConfigError::Read(e.to_string()));
                },
            };
            match serde_json::from_str::<Config>(&text) {
                Ok(v) => v,
                Err(e) => {
                    return Err(ConfigError::Parse(e.to_string()));
                },
            }
        },
        false => Config::default(),
    };

    match env::var("SERVER_HOST") {
        Ok(v) => {
            config.host = v;
        },
        Err(_) => {},
    };
    match env::var("SERVER_PORT") {
        Ok(v) => {
            match v.parse::<u16>() {
                Ok(port) => {
                    config.port = port;
                },
                Err(_) => {
                    return Err(ConfigError::Invalid(format!("SERVER_PORT={}", v)));
                },
            };
        },
        Err(_) => {},
    };

    Ok(config)
}
