use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::roster::RecipientEntry;
use crate::session::Session;

/// Body of one send-exam call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationRequest {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Lets the backend recognise a repeated invitation.
    pub idempotency_key: String,
}

impl InvitationRequest {
    /// The idempotency key is the email address and nothing else, so a
    /// repeated run produces identical requests.
    pub fn for_recipient(entry: &RecipientEntry) -> Self {
        Self {
            name: entry.display_name.trim().to_string(),
            email: entry.email.trim().to_string(),
            phone: entry.phone.clone(),
            idempotency_key: entry.email.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The caller's session may not send invitations.
    AuthorizationDenied,
    /// The candidate already exists on the backend.
    AlreadyExists,
    Other,
}

/// A classified send failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SendFailure {
    pub class: FailureClass,
    pub message: String,
    /// When the backend first saw this candidate, for `AlreadyExists`.
    pub created_at: Option<DateTime<Utc>>,
}

impl SendFailure {
    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::AuthorizationDenied,
            message: message.into(),
            created_at: None,
        }
    }

    pub fn already_exists(message: impl Into<String>, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            class: FailureClass::AlreadyExists,
            message: message.into(),
            created_at,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Other,
            message: message.into(),
            created_at: None,
        }
    }
}

/// The remote send operation.
///
/// Implementations perform exactly one request per call and own any
/// transport timeout; the dispatcher adds none.
#[async_trait]
pub trait InvitationSender: Send + Sync {
    async fn send_invitation(
        &self,
        session: &Session,
        paper_id: u64,
        request: &InvitationRequest,
    ) -> Result<(), SendFailure>;
}
