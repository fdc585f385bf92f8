use serde::Deserialize;

/// Outbound notification queue configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// Whether domain events are published to Redis. Default: false.
    /// In-process subscribers receive them either way.
    #[serde(default)]
    pub enabled: bool,
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_queue_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_queue_pool_size")]
    pub pool_size: u8,
    /// Queue that receives every domain event. Default: "race_events".
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
}

fn default_queue_url() -> String {
    "redis://localhost:6379".into()
}
fn default_queue_pool_size() -> u8 {
    5
}
fn default_queue_name() -> String {
    "race_events".into()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_queue_url(),
            pool_size: default_queue_pool_size(),
            queue_name: default_queue_name(),
        }
    }
}
