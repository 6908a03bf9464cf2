//! TOML configuration for the `run` subcommand, grounded on the teacher's
//! `toml`-plus-`serde` config loading pattern
//! (`crates/apps/styrened-rs`/`crates/apps/reticulumd` both load their
//! daemon config this way).

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Wiring for the real-host echo demo: two actor hosts, each owning one
/// actor, exchanging one message.
#[derive(Clone, Debug, Deserialize)]
pub struct EchoConfig {
    pub echoer_prefix: String,
    pub echoer_id: String,
    pub sender_prefix: String,
    pub sender_id: String,
    pub payload: String,
}

impl EchoConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }
}
