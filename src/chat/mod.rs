pub mod controller;
pub mod message;

pub use controller::{FailurePolicy, SendOutcome, SessionController};
pub use message::{ConversationLog, Message, MessageKind, Role};
