use std::path::PathBuf;

use common::config::QueueConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec![],
            max_age: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL. Without one the server keeps everything in memory.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// When the proof image is run through text recognition.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMode {
    /// Spawned after the submission is stored; the result is attached later.
    #[default]
    Background,
    /// Awaited before responding, bounded by the timeout.
    Inline,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubmissionConfig {
    /// Directory that proof images are resolved against. Default: "./media".
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    /// Max length of participant and reviewer notes. Default: 1000.
    #[serde(default = "default_max_notes_len")]
    pub max_notes_len: usize,
    #[serde(default)]
    pub classification_mode: ClassificationMode,
    /// Upper bound for one recognition run. Default: 10000.
    #[serde(default = "default_classification_timeout_ms")]
    pub classification_timeout_ms: u64,
    /// Default: "tesseract".
    #[serde(default = "default_tesseract_bin")]
    pub tesseract_bin: String,
    /// Default: "eng".
    #[serde(default = "default_tesseract_lang")]
    pub tesseract_lang: String,
}

fn default_media_root() -> PathBuf {
    PathBuf::from("./media")
}
fn default_max_notes_len() -> usize {
    1000
}
fn default_classification_timeout_ms() -> u64 {
    10_000
}
fn default_tesseract_bin() -> String {
    "tesseract".into()
}
fn default_tesseract_lang() -> String {
    "eng".into()
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            max_notes_len: default_max_notes_len(),
            classification_mode: ClassificationMode::default(),
            classification_timeout_ms: default_classification_timeout_ms(),
            tesseract_bin: default_tesseract_bin(),
            tesseract_lang: default_tesseract_lang(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub mq: QueueConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., TIMETRIAL__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("TIMETRIAL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
