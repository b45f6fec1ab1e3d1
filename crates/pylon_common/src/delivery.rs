//! Delivery adapter - push replies into a messaging-platform conversation
//!
//! Delivery is best-effort: one attempt, failures are logged and reported
//! through `DeliveryOutcome`, never raised.

use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};

use crate::settings::MessagingSettings;

/// User id attributed to user-role replies when none is given
pub const DEFAULT_USER_ID: &str = "user_1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Visible reply
    #[default]
    Comment,
    /// Internal note
    Note,
    /// Reply and close the conversation
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    #[default]
    Admin,
    User,
}

/// How a reply is attributed and what kind of message it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOptions {
    pub kind: MessageKind,
    pub role: SenderRole,
    /// Used when `role` is `User`
    pub user_id: String,
}

impl Default for ReplyOptions {
    fn default() -> Self {
        Self {
            kind: MessageKind::Comment,
            role: SenderRole::Admin,
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

/// A reply as handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationReply {
    pub conversation_id: String,
    pub body: String,
    pub kind: MessageKind,
    pub role: SenderRole,
    /// Admin id for admin replies, user id for user replies
    pub sender_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Messaging access token is not configured")]
    MissingToken,

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Only an admin can close a conversation")]
    CloseRequiresAdmin,
}

/// Messaging platform seam
pub trait MessagingTransport: Send + Sync {
    fn reply(&self, reply: &ConversationReply) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent)
    }
}

pub struct DeliveryAdapter {
    transport: Arc<dyn MessagingTransport>,
    admin_id: String,
}

impl DeliveryAdapter {
    pub fn new(transport: Arc<dyn MessagingTransport>, admin_id: impl Into<String>) -> Self {
        Self {
            transport,
            admin_id: admin_id.into(),
        }
    }

    /// Send `text` to the conversation; never fails, never retries
    pub fn deliver(&self, conversation_id: &str, text: &str, options: &ReplyOptions) -> DeliveryOutcome {
        let sender_id = match options.role {
            SenderRole::Admin => self.admin_id.clone(),
            SenderRole::User => options.user_id.clone(),
        };

        let reply = ConversationReply {
            conversation_id: conversation_id.to_string(),
            body: text.to_string(),
            kind: options.kind,
            role: options.role,
            sender_id,
        };

        match self.transport.reply(&reply) {
            Ok(()) => {
                info!("Message sent to conversation {}", conversation_id);
                DeliveryOutcome::Sent
            }
            Err(e) => {
                error!("Error sending message to conversation {}: {}", conversation_id, e);
                DeliveryOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Intercom REST transport
pub struct IntercomClient {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct ReplyBody<'a> {
    message_type: MessageKind,
    #[serde(rename = "type")]
    role: SenderRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    intercom_user_id: Option<&'a str>,
    body: &'a str,
}

impl IntercomClient {
    /// Build from settings; a missing token is allowed and makes every
    /// reply fail with `MissingToken`
    pub fn new(settings: &MessagingSettings) -> Result<Self, DeliveryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| DeliveryError::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            access_token: settings.access_token(),
            client,
        })
    }

    /// Comments and notes go through the reply endpoint; closing is a
    /// conversation part
    fn path_for(reply: &ConversationReply) -> String {
        match reply.kind {
            MessageKind::Comment | MessageKind::Note => {
                format!("conversations/{}/reply", reply.conversation_id)
            }
            MessageKind::Close => format!("conversations/{}/parts", reply.conversation_id),
        }
    }

    /// Reject combinations Intercom refuses, before any request is made
    fn validate(reply: &ConversationReply) -> Result<(), DeliveryError> {
        if reply.kind == MessageKind::Close && reply.role != SenderRole::Admin {
            return Err(DeliveryError::CloseRequiresAdmin);
        }
        Ok(())
    }

    fn request_body(reply: &ConversationReply) -> serde_json::Value {
        let sender = reply.sender_id.as_str();
        let body = ReplyBody {
            message_type: reply.kind,
            role: reply.role,
            admin_id: (reply.role == SenderRole::Admin).then_some(sender),
            intercom_user_id: (reply.role == SenderRole::User).then_some(sender),
            body: &reply.body,
        };
        serde_json::to_value(body).unwrap_or(serde_json::Value::Null)
    }
}

impl MessagingTransport for IntercomClient {
    fn reply(&self, reply: &ConversationReply) -> Result<(), DeliveryError> {
        Self::validate(reply)?;
        let token = self.access_token.as_deref().ok_or(DeliveryError::MissingToken)?;
        let url = format!("{}/{}", self.base_url, Self::path_for(reply));

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .json(&Self::request_body(reply))
            .send()
            .map_err(|e| DeliveryError::HttpError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(DeliveryError::HttpError(format!("HTTP {}: {}", status, body)));
        }

        Ok(())
    }
}

/// Transport that records replies instead of sending them
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<ConversationReply>>,
    fail_with: Option<DeliveryError>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the attempt, then fails with `error`
    pub fn failing(error: DeliveryError) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(error),
        }
    }

    pub fn sent(&self) -> Vec<ConversationReply> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl MessagingTransport for RecordingTransport {
    fn reply(&self, reply: &ConversationReply) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(reply.clone());

        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
