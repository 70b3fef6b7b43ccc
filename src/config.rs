//! Runtime settings, read from the environment.

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::search::index::{IndexLocations, MIN_WRITER_HEAP_BYTES};

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_CATALOG_PATH: &str = "./data/films.csv";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_WRITER_HEAP_BYTES: usize = 50_000_000;
pub const DEFAULT_REBUILD_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Parent of the `index` and `suggester` directories.
    pub data_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub writer_heap_bytes: usize,
    pub rebuild_timeout: Duration,
}

impl Config {
    /// Read `FILMS_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_addr = get("FILMS_BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .with_context(|| format!("FILMS_BIND_ADDR is not a socket address: {}", bind_addr))?;

        let writer_heap_bytes: usize = match lookup("FILMS_WRITER_HEAP_BYTES") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("FILMS_WRITER_HEAP_BYTES is not a number: {}", raw))?,
            None => DEFAULT_WRITER_HEAP_BYTES,
        };
        if writer_heap_bytes < MIN_WRITER_HEAP_BYTES {
            bail!(
                "FILMS_WRITER_HEAP_BYTES must be at least {} (got {})",
                MIN_WRITER_HEAP_BYTES,
                writer_heap_bytes
            );
        }

        let rebuild_timeout_secs: u64 = match lookup("FILMS_REBUILD_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("FILMS_REBUILD_TIMEOUT_SECS is not a number: {}", raw))?,
            None => DEFAULT_REBUILD_TIMEOUT_SECS,
        };

        Ok(Self {
            data_dir: PathBuf::from(get("FILMS_DATA_DIR", DEFAULT_DATA_DIR)),
            catalog_path: PathBuf::from(get("FILMS_CATALOG_PATH", DEFAULT_CATALOG_PATH)),
            bind_addr,
            writer_heap_bytes,
            rebuild_timeout: Duration::from_secs(rebuild_timeout_secs),
        })
    }

    pub fn locations(&self) -> IndexLocations {
        IndexLocations::under(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.catalog_path, PathBuf::from("./data/films.csv"));
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.writer_heap_bytes, 50_000_000);
        assert_eq!(config.rebuild_timeout, Duration::from_secs(300));
        assert_eq!(config.locations().main, PathBuf::from("./data/index"));
        assert_eq!(config.locations().suggester, PathBuf::from("./data/suggester"));
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("FILMS_DATA_DIR", "/var/lib/films"),
            ("FILMS_BIND_ADDR", "0.0.0.0:9000"),
            ("FILMS_REBUILD_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.locations().main, PathBuf::from("/var/lib/films/index"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.rebuild_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("FILMS_BIND_ADDR", "localhost")]).is_err());
        assert!(config(&[("FILMS_WRITER_HEAP_BYTES", "lots")]).is_err());
        assert!(config(&[("FILMS_WRITER_HEAP_BYTES", "1000")]).is_err());
    }
}
