//! The chat session controller.
//!
//! Owns the conversation log, dispatches outgoing text and audio to the
//! webhook backend, and merges replies from two delivery paths: the direct
//! response to a send, and the background update poller. At most one request
//! is in flight at a time.
//!
//! Reply deduplication is a single-slot, exact-match check against the last
//! appended reply. Delivering the same reply twice in a row appends it once;
//! delivering A, B, A appends three entries.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::message::{ConversationLog, Message};
use crate::audio::AudioPayload;
use crate::client::WebhookClient;
use crate::config::ChatConfig;

/// What to do when a direct send fails (transport or status error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Append an assistant-role error message to the conversation
    #[default]
    Inline,

    /// Log only, and leave the awaiting-reply state set so the update
    /// poller can resolve it if the backend acted on the request
    DeferToPolling,
}

/// Result of a `send` or `send_audio` call.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// The reply was appended to the conversation
    Replied(Message),

    /// The reply matched the last appended reply and was suppressed
    Duplicate,

    /// The backend answered with an empty reply; nothing was appended
    EmptyReply,

    /// The request was cancelled before its reply arrived
    Cancelled,

    /// A request is already in flight; nothing was sent
    Busy,

    /// The request failed; the configured `FailurePolicy` was applied
    Failed(String),
}

#[derive(Default)]
struct Inner {
    log: ConversationLog,

    /// Set between dispatching a request and receiving or abandoning its reply
    awaiting_reply: bool,

    /// The single dedup slot: content of the most recently appended reply
    last_reply: Option<String>,

    /// Bumped on every send and on cancel; a completion whose generation no
    /// longer matches must not touch any state
    generation: u64,

    /// Cancellation token for the in-flight request, if any
    pending_cancel: Option<CancellationToken>,
}

#[derive(Clone)]
pub struct SessionController {
    client: Arc<WebhookClient>,
    policy: FailurePolicy,
    poll_interval: Duration,
    shutdown: CancellationToken,
    inner: Arc<Mutex<Inner>>,
}

impl SessionController {
    pub fn new(config: ChatConfig, policy: FailurePolicy) -> Self {
        let poll_interval = config.poll_interval();
        Self {
            client: Arc::new(WebhookClient::new(config)),
            policy,
            poll_interval,
            shutdown: CancellationToken::new(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn user_id(&self) -> &str {
        self.client.user_id()
    }

    /// Send a text message.
    ///
    /// Appends the user message, dispatches one cancellable request, and on
    /// success appends the reply subject to dedup. Refuses with
    /// [`SendOutcome::Busy`] while another request is pending.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let (token, generation) = {
            let mut inner = self.inner.lock().await;
            if inner.awaiting_reply {
                debug!("send refused: a request is already in flight");
                return SendOutcome::Busy;
            }
            inner.log.push(Message::user_text(text));
            inner.awaiting_reply = true;
            inner.generation = inner.generation.wrapping_add(1);
            let token = CancellationToken::new();
            inner.pending_cancel = Some(token.clone());
            (token, inner.generation)
        };

        let result = tokio::select! {
            _ = token.cancelled() => None,
            res = self.client.send_text(text) => Some(res),
        };

        self.complete(generation, result).await
    }

    /// Send a finalized recording through the audio webhook.
    ///
    /// Shares the pending-request slot with text sends, so a text send and
    /// an audio send cannot be in flight at the same time.
    pub async fn send_audio(&self, payload: AudioPayload) -> SendOutcome {
        let file_name = payload.file_name();

        let (token, generation) = {
            let mut inner = self.inner.lock().await;
            if inner.awaiting_reply {
                debug!("audio send refused: a request is already in flight");
                return SendOutcome::Busy;
            }
            inner
                .log
                .push(Message::user_audio("[voice message]", &payload.reference));
            inner.awaiting_reply = true;
            inner.generation = inner.generation.wrapping_add(1);
            let token = CancellationToken::new();
            inner.pending_cancel = Some(token.clone());
            (token, inner.generation)
        };

        let result = tokio::select! {
            _ = token.cancelled() => None,
            res = self.client.send_audio(payload.wav, &file_name) => Some(res),
        };

        self.complete(generation, result).await
    }

    /// Cancel the in-flight request, if any.
    ///
    /// Clears the awaiting-reply state and invalidates the request so a late
    /// reply can never be appended. No error message is appended for a
    /// user-initiated cancellation.
    pub async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(token) = inner.pending_cancel.take() {
            token.cancel();
            info!("in-flight request cancelled");
        }
        inner.awaiting_reply = false;
        inner.generation = inner.generation.wrapping_add(1);
    }

    /// One polling pass against the updates endpoint.
    ///
    /// A present, non-empty reply that differs from the last appended reply
    /// is appended exactly as a direct reply would be, and clears the
    /// awaiting-reply state. The background poller runs this on an interval
    /// and discards errors.
    pub async fn poll_once(&self) -> Result<Option<Message>> {
        let Some(output) = self.client.fetch_updates().await? else {
            return Ok(None);
        };

        let mut inner = self.inner.lock().await;
        if inner.last_reply.as_deref() == Some(output.as_str()) {
            debug!("polled reply matched last reply, suppressed");
            return Ok(None);
        }

        let message = Message::assistant_text(output.clone());
        inner.log.push(message.clone());
        inner.last_reply = Some(output);
        inner.awaiting_reply = false;
        Ok(Some(message))
    }

    /// Spawn the background update poller.
    ///
    /// Polling failures are swallowed with a debug log line; they never
    /// surface to the caller. The task stops when [`shutdown`] is called.
    ///
    /// [`shutdown`]: SessionController::shutdown
    pub fn spawn_poller(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            debug!("update poller started");

            let mut ticker = tokio::time::interval(controller.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Consume the immediate first tick so polls start one interval in
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = controller.shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match controller.poll_once().await {
                    Ok(Some(message)) => {
                        info!("polled reply appended ({} chars)", message.content.len());
                    }
                    Ok(None) => {}
                    Err(err) => {
                        debug!("update poll failed: {err:#}");
                    }
                }
            }

            debug!("update poller stopped");
        })
    }

    /// Stop the background poller. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Snapshot of the conversation log.
    pub async fn conversation(&self) -> Vec<Message> {
        self.inner.lock().await.log.entries().to_vec()
    }

    pub async fn is_awaiting_reply(&self) -> bool {
        self.inner.lock().await.awaiting_reply
    }

    async fn complete(&self, generation: u64, result: Option<Result<String>>) -> SendOutcome {
        let mut inner = self.inner.lock().await;

        // cancel() or a newer send invalidated this request; its reply must
        // not touch any state
        if inner.generation != generation {
            return SendOutcome::Cancelled;
        }
        inner.pending_cancel = None;

        match result {
            None => {
                inner.awaiting_reply = false;
                SendOutcome::Cancelled
            }
            Some(Ok(reply)) => {
                inner.awaiting_reply = false;
                Self::append_reply(&mut inner, reply)
            }
            Some(Err(err)) => match self.policy {
                FailurePolicy::Inline => {
                    warn!("send failed: {err:#}");
                    inner.awaiting_reply = false;
                    // The error entry is not a remote reply, so it never
                    // enters the dedup slot
                    inner
                        .log
                        .push(Message::assistant_text(format!("Request failed: {err:#}")));
                    SendOutcome::Failed(err.to_string())
                }
                FailurePolicy::DeferToPolling => {
                    debug!("send failed, deferring to polling: {err:#}");
                    SendOutcome::Failed(err.to_string())
                }
            },
        }
    }

    fn append_reply(inner: &mut Inner, reply: String) -> SendOutcome {
        if reply.is_empty() {
            return SendOutcome::EmptyReply;
        }
        if inner.last_reply.as_deref() == Some(reply.as_str()) {
            debug!("duplicate reply suppressed");
            return SendOutcome::Duplicate;
        }

        let message = Message::assistant_text(reply.clone());
        inner.log.push(message.clone());
        inner.last_reply = Some(reply);
        SendOutcome::Replied(message)
    }
}
