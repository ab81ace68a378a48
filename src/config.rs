use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_PATH: &str = "data/goals.json";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid {name} value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Startup settings, read from the environment once.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub data_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = match lookup("BIND_ADDR") {
            Some(value) => value
                .trim()
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::Invalid { name: "BIND_ADDR", value })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let data_path = lookup("APP_DATA_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

        Ok(Self {
            bind_addr,
            port,
            data_path,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn overrides_are_read() {
        let config = config(&[("PORT", "9001"), ("BIND_ADDR", "127.0.0.1"), ("APP_DATA_PATH", "/tmp/g.json")]).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9001");
        assert_eq!(config.data_path, PathBuf::from("/tmp/g.json"));
    }

    #[test]
    fn bad_port_is_an_error() {
        assert_eq!(
            config(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid {
                name: "PORT",
                value: "eighty".into()
            })
        );
    }
}
