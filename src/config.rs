use anyhow::{bail, Context, Result};
use std::env;
use std::net::SocketAddr;

use crate::tmdb::TMDB_BASE;

const DEFAULT_ADDR: &str = "0.0.0.0:8088";

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: String,
    pub tmdb_read_token: Option<String>,
    pub tmdb_base_url: String,
    pub addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let Some(tmdb_api_key) = get("TMDB_API_KEY") else {
            bail!("Missing required environment variable: TMDB_API_KEY");
        };
        let addr = get("MOVIEDECK_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string())
            .parse()
            .context("MOVIEDECK_ADDR is not a valid socket address")?;

        Ok(Self {
            tmdb_api_key,
            tmdb_read_token: get("TMDB_READ_TOKEN"),
            tmdb_base_url: get("TMDB_BASE_URL").unwrap_or_else(|| TMDB_BASE.to_string()),
            addr,
        })
    }
}
