pub mod analytics;
pub mod audio;
pub mod chat;
pub mod client;
pub mod config;

pub use analytics::{AnalyticsReport, AnalyticsSnapshot, HourlyCount, ToolUsage};
pub use audio::{AudioFrame, AudioPayload, CaptureBackend, Recorder, RecorderState, WavFileBackend};
pub use chat::{
    ConversationLog, FailurePolicy, Message, MessageKind, Role, SendOutcome, SessionController,
};
pub use client::WebhookClient;
pub use config::{AnalyticsConfig, AudioConfig, ChatConfig, Config};
