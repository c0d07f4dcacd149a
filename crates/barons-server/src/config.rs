//! Server settings read from the environment.

use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub content_path: PathBuf,
    pub metadata_path: PathBuf,
    /// How long a drafter may take before their pick is made for them
    pub pick_timeout: Duration,
    /// Shuffle decks once after setup
    pub shuffle: bool,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup, falling back to defaults for
    /// missing keys.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".into())
            .parse()
            .context("SERVER_ADDR is not a socket address")?;

        let pick_timeout = match lookup("DRAFT_PICK_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .with_context(|| format!("DRAFT_PICK_TIMEOUT_SECS={} is not a number", secs))?,
            ),
            None => Duration::from_secs(60),
        };

        let shuffle = match lookup("BARONS_SHUFFLE").as_deref() {
            None | Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            Some(other) => anyhow::bail!("BARONS_SHUFFLE={} is not a boolean", other),
        };

        Ok(Self {
            addr,
            content_path: lookup("BARONS_CONTENT")
                .unwrap_or_else(|| "data/game_content.toml".into())
                .into(),
            metadata_path: lookup("BARONS_METADATA")
                .unwrap_or_else(|| "data/game_metadata.toml".into())
                .into(),
            pick_timeout,
            shuffle,
        })
    }
}
