use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::twitch::error::{BotError, Result};

/// On-disk configuration (`config.json`). A missing or unreadable file falls
/// back to the default structure instead of failing startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub bot_settings: BotSettings,
    /// Reward title -> audio path, matched case-sensitively
    #[serde(default)]
    pub reward_sounds: HashMap<String, String>,
    #[serde(default)]
    pub audio_paths: AudioPaths,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_volume")]
    pub audio_volume: f32,
    #[serde(default = "default_max_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_delay_base")]
    pub reconnect_delay_base: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioPaths {
    #[serde(default = "default_base_directory")]
    pub base_directory: String,
    #[serde(default)]
    pub fallback_sound: Option<String>,
}

fn default_channel() -> String {
    String::new()
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_volume() -> f32 {
    1.0
}

fn default_max_attempts() -> u32 {
    5
}

fn default_delay_base() -> u32 {
    2
}

fn default_base_directory() -> String {
    "files".to_string()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            command_prefix: default_prefix(),
            audio_volume: default_volume(),
            max_reconnect_attempts: default_max_attempts(),
            reconnect_delay_base: default_delay_base(),
        }
    }
}

impl Default for AudioPaths {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
            fallback_sound: None,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_settings: BotSettings::default(),
            reward_sounds: HashMap::new(),
            audio_paths: AudioPaths::default(),
        }
    }
}

impl BotConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!(
                        "Failed to parse {}: {} - using default configuration",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => {
                log::info!(
                    "{} not found, using default configuration",
                    path.display()
                );
                Self::default()
            }
        }
    }
}

/// Credentials loaded from the environment at startup. The tokens live behind
/// shared locks so a refresh is visible to every API caller.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub broadcaster_id: String,
    pub access_token: Arc<RwLock<String>>,
    pub refresh_token: Arc<RwLock<String>>,
}

impl Credentials {
    /// Missing credentials are fatal: the bot cannot authenticate without them.
    pub fn from_env() -> Result<Self> {
        let client_id = required_var("CLIENT_ID")?;
        let client_secret = required_var("CLIENT_SECRET")?;
        let broadcaster_id = required_var("BROADCASTER_ID")?;
        let refresh_token = required_var("REFRESH_TOKEN")?;

        let mut token = env::var("TOKEN").unwrap_or_default();
        if let Some(stripped) = token.strip_prefix("oauth:") {
            token = stripped.to_string();
        }

        Ok(Self {
            client_id,
            client_secret,
            broadcaster_id,
            access_token: Arc::new(RwLock::new(token)),
            refresh_token: Arc::new(RwLock::new(refresh_token)),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(BotError::Configuration(format!(
            "missing required environment variable {}",
            name
        ))),
    }
}
