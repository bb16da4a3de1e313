use std::cell::{Cell, RefCell};
use std::fmt;

use tracing::{error, info, instrument};

use crate::client::{AssistantService, ServiceError};

pub const GREETING: &str =
    "Hello! I am your AI assistant. How can I help you manage your tasks today?";

pub const UNREACHABLE_REPLY: &str = "Sorry, I could not get a response from the assistant. \
     Please check your network connection or the assistant's API key.";

pub const CANCELLED_REPLY: &str = "Request cancelled before the assistant replied.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
            Self::System => f.write_str("system"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Replied,
    /// A system message describing the failure was appended.
    Failed(ServiceError),
    /// Blank input, or another send was still pending.
    Ignored,
}

/// Append-only transcript with at most one request in flight.
pub struct ChatSession<A> {
    assistant: A,
    transcript: RefCell<Vec<ChatMessage>>,
    pending: Cell<bool>,
}

impl<A: AssistantService> ChatSession<A> {
    pub fn new(assistant: A) -> Self {
        Self {
            assistant,
            transcript: RefCell::new(vec![ChatMessage::new(ChatRole::System, GREETING)]),
            pending: Cell::new(false),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.transcript.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.borrow().is_empty()
    }

    /// Messages appended after the first `from` entries.
    pub fn since(&self, from: usize) -> Vec<ChatMessage> {
        self.transcript.borrow().iter().skip(from).cloned().collect()
    }

    #[instrument(skip(self, message), fields(message_len = message.len()))]
    pub async fn send(&self, message: &str) -> SendOutcome {
        if message.trim().is_empty() || self.pending.get() {
            return SendOutcome::Ignored;
        }

        self.pending.set(true);
        self.push(ChatMessage::new(ChatRole::User, message));
        let in_flight = InFlight {
            transcript: &self.transcript,
            pending: &self.pending,
            settled: false,
        };

        let reply = self.assistant.chat(message).await;
        in_flight.settle();

        match reply {
            Ok(reply) => {
                info!(reply_len = reply.len(), "assistant replied");
                self.push(ChatMessage::new(ChatRole::Assistant, reply));
                SendOutcome::Replied
            }
            Err(err) => {
                error!(kind = err.kind(), error = %err, "chat request failed");
                let notice = match &err {
                    ServiceError::Transport { .. } => UNREACHABLE_REPLY.to_string(),
                    ServiceError::Service { message, .. } => format!("Error: {message}"),
                    ServiceError::Malformed { .. } => format!("Error: {}", err.user_message()),
                };
                self.push(ChatMessage::new(ChatRole::System, notice));
                SendOutcome::Failed(err)
            }
        }
    }

    fn push(&self, message: ChatMessage) {
        self.transcript.borrow_mut().push(message);
    }
}

/// Releases `pending` when a send ends. A send dropped before the assistant
/// answered also leaves a cancellation notice in the transcript.
struct InFlight<'a> {
    transcript: &'a RefCell<Vec<ChatMessage>>,
    pending: &'a Cell<bool>,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            info!("chat request cancelled");
            if let Ok(mut transcript) = self.transcript.try_borrow_mut() {
                transcript.push(ChatMessage::new(ChatRole::System, CANCELLED_REPLY));
            }
        }
        self.pending.set(false);
    }
}
