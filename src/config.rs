use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::extract::TextConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeBaseConfig {
    pub id: String,
}

/// Loader settings for text-like formats. Binary formats (pdf, docx) take
/// no configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_autodetect")]
    pub autodetect_encoding: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            autodetect_encoding: default_autodetect(),
        }
    }
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_autodetect() -> bool {
    true
}

impl LoaderConfig {
    pub fn text_config(&self) -> TextConfig {
        TextConfig {
            encoding: self.encoding.clone(),
            autodetect_encoding: self.autodetect_encoding,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.knowledge_base.id.trim().is_empty() {
        anyhow::bail!("knowledge_base.id must not be empty");
    }

    if !config.loader.encoding.eq_ignore_ascii_case("utf-8") {
        anyhow::bail!(
            "Unsupported loader.encoding: '{}'. Only utf-8 is supported.",
            config.loader.encoding
        );
    }

    Ok(config)
}
