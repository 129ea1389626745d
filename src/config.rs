use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub chat: ChatConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// Configuration for one chat session against the workflow backend.
///
/// Passed by value into `SessionController::new` so there are no global
/// endpoint or user-id constants anywhere in the crate.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Webhook that accepts text messages
    pub text_endpoint: String,

    /// Webhook that accepts recorded audio (multipart WAV)
    pub audio_endpoint: String,

    /// Webhook polled for asynchronously pushed replies
    pub updates_endpoint: String,

    /// Client-chosen user identity sent with every request
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Interval between update polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Sample rate of encoded recordings (16kHz default)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    #[serde(default = "default_channels")]
    pub channels: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// GET endpoint serving the pre-aggregated analytics snapshot
    #[serde(default = "default_analytics_endpoint")]
    pub endpoint: String,
}

fn default_user_id() -> String {
    format!("cli-{}", uuid::Uuid::new_v4())
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_analytics_endpoint() -> String {
    "http://localhost:5678/webhook/analytics".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            text_endpoint: "http://localhost:5678/webhook/chat".to_string(),
            audio_endpoint: "http://localhost:5678/webhook/voice".to_string(),
            updates_endpoint: "http://localhost:5678/webhook/updates".to_string(),
            user_id: default_user_id(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_analytics_endpoint(),
        }
    }
}

impl ChatConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
