use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:6180".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// Host-platform endpoint that relays a message to a chat destination.
    #[serde(default = "default_push_url")]
    pub push_url: String,
    pub token: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            push_url: default_push_url(),
            token: None,
        }
    }
}

fn default_push_url() -> String {
    "http://127.0.0.1:6190/send".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// When the daily card is selected and rendered (HH:MM, service timezone).
    #[serde(default = "default_generate_at")]
    pub generate_at: String,
    /// When the cached card is pushed to registered destinations.
    #[serde(default = "default_push_at")]
    pub push_at: String,
    #[serde(default = "default_tz_offset")]
    pub tz_offset_hours: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            generate_at: default_generate_at(),
            push_at: default_push_at(),
            tz_offset_hours: default_tz_offset(),
        }
    }
}

fn default_generate_at() -> String {
    "07:30".to_string()
}

fn default_push_at() -> String {
    "08:00".to_string()
}

fn default_tz_offset() -> i32 {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearningConfig {
    /// "random" or "sequential".
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
        }
    }
}

fn default_mode() -> String {
    "random".to_string()
}

#[derive(Debug, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vocabcard")
}

pub fn load(path: &str) -> Result<Config> {
    let path = expand_tilde(path);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config.toml")?;
    Ok(config)
}

const SEED_WORDS: &str = include_str!("../assets/seed_words.json");
const CARD_TEMPLATE: &str = include_str!("../assets/card.html");

pub async fn init_config_dir() -> Result<()> {
    let base = default_base_dir();
    tokio::fs::create_dir_all(&base).await?;

    let words = base.join("words.json");
    if !words.exists() {
        tokio::fs::write(&words, SEED_WORDS).await?;
    }

    let template = base.join("card.html");
    if !template.exists() {
        tokio::fs::write(&template, CARD_TEMPLATE).await?;
    }

    let config_path = base.join("config.toml");
    if !config_path.exists() {
        tokio::fs::write(
            &config_path,
            r#"[service]
bind = "127.0.0.1:6180"

[host]
# Endpoint the host platform exposes for outbound messages.
push_url = "http://127.0.0.1:6190/send"
# token = "YOUR_HOST_TOKEN"

[schedule]
generate_at = "07:30"
push_at = "08:00"
tz_offset_hours = 8

[learning]
# "random" or "sequential"
mode = "random"

# [data]
# base_dir = "~/.vocabcard"
"#,
        )
        .await?;
    }

    Ok(())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(&path[2..]);
    }
    PathBuf::from(path)
}
