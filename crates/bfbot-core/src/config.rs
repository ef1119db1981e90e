use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{errors::Error, Result};

/// Typed configuration loaded from the YAML config file.
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    /// Chat the bot replies into. When unset, replies go back to the chat
    /// the command arrived in.
    pub target_group: Option<i64>,
    /// Root directory the membership stores are discovered under.
    pub database_path: PathBuf,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    bot_token: Option<String>,
    #[serde(default)]
    target_group: Option<i64>,
    #[serde(default)]
    database_path: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(&fs::read_to_string(path)?)?;

        let bot_token = raw
            .bot_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config("no Telegram bot token specified".to_string()))?;
        let database_path = raw
            .database_path
            .ok_or_else(|| Error::Config("database_path is required".to_string()))?;

        Ok(Self {
            bot_token,
            target_group: raw.target_group,
            database_path,
        })
    }
}
