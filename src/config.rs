//! Runtime configuration, resolved once at startup from built-in defaults, an
//! optional `vqaserve.toml`, and `VQA_`-prefixed environment variables.

use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Which compute device to place the model on. Resolved to a concrete
/// `tch::Device` once at startup and never re-evaluated per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Prefer an accelerator if one is present, else fall back to the CPU.
    Auto,
    Cpu,
    Cuda,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Directory holding `model.pt`, `tokenizer.json`, and `labels.json`.
    pub model_dir: PathBuf,
    pub device: DevicePreference,
    pub host: String,
    pub port: u16,
    /// Bound on the single image fetch attempt per request.
    pub fetch_timeout_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::defaults()?
            .add_source(File::with_name("vqaserve").required(false))
            .add_source(Environment::with_prefix("VQA"))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        Ok(Config::builder()
            .set_default("model_dir", "models/vilt-vqa")?
            .set_default("device", "auto")?
            .set_default("host", "0.0.0.0")?
            .set_default("port", 5000)?
            .set_default("fetch_timeout_secs", 10)?)
    }
}
