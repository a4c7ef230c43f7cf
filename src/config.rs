//! Server and client configuration.
//!
//! Precedence: defaults < TOML file < environment / CLI flags (applied by the
//! binaries on top of what `load` returns).

use crate::error::{Error, Result};
use crate::path::expand_tilde;
use crate::protocol::{DEFAULT_CHUNK_SIZE, DEFAULT_PORT, MAX_CHUNK_SIZE};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_ROOT: &str = "server_files";

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: String,
    /// TCP port (0 picks a free one)
    pub port: u16,
    /// Directory whose regular files are served
    pub root: PathBuf,
    /// Payload bytes per chunk
    pub chunk_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            root: PathBuf::from(DEFAULT_ROOT),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        load_toml(path)
    }

    /// Store root with `~` expanded.
    pub fn root_path(&self) -> PathBuf {
        expand_tilde(&self.root)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::Config {
                message: format!(
                    "chunk_size must be between 1 and {} bytes, got {}",
                    MAX_CHUNK_SIZE, self.chunk_size
                ),
            });
        }
        if self.bind.is_empty() {
            return Err(Error::Config {
                message: "bind address is empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Client settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Fixed client id; random in 100..=999 when unset
    pub client_id: Option<i32>,
    /// Download directory; `client_<id>_files` when unset
    pub download_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            client_id: None,
            download_dir: None,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        load_toml(path)
    }

    /// Download directory for a given client id.
    pub fn download_dir_for(&self, client_id: i32) -> PathBuf {
        match &self.download_dir {
            Some(dir) => expand_tilde(dir),
            None => PathBuf::from(format!("client_{}_files", client_id)),
        }
    }
}

fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|e| Error::Config {
        message: format!("{}: {}", path.display(), e),
    })
}
