//! Notification dispatcher.
//!
//! Posts notifications to destinations and edits previously posted ones.
//! The polling engine depends only on the [`NotificationDispatcher`] trait;
//! the concrete Discord client lives in [`discord`].

pub mod discord;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::database::models::DestinationRecord;
use crate::provider::StatusSnapshot;

/// Reference to a previously posted notification, used to later edit it.
///
/// Transient: lives only as long as the stream stays registered online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationHandle {
    pub destination_id: i64,
    pub message_id: String,
    pub created_at: DateTime<Utc>,
}

/// Minimal notification payload. Rich rendering is out of scope; the
/// dispatcher only needs the text and the broad-audience flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub text: String,
    pub mention_everyone: bool,
}

impl NotificationContent {
    /// Content for a stream that just went online.
    pub fn online(snapshot: &StatusSnapshot, mention_everyone: bool) -> Self {
        let text = match snapshot.title.as_deref() {
            Some(title) if !title.is_empty() => {
                format!("{} is live: {}", snapshot.name, title)
            }
            _ => format!("{} is live", snapshot.name),
        };
        Self {
            text,
            mention_everyone,
        }
    }

    /// Content the online notification is edited to once the stream is
    /// confirmed offline.
    pub fn offline(stream_name: &str) -> Self {
        Self {
            text: format!("{} is offline", stream_name),
            mention_everyone: false,
        }
    }
}

/// Posts and edits notification messages in destinations.
///
/// `edit` surfaces an externally deleted target as
/// [`crate::Error::NotificationGone`]; callers treat that as
/// already-retracted, not as a failure.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn post(
        &self,
        destination: &DestinationRecord,
        content: &NotificationContent,
    ) -> Result<NotificationHandle>;

    async fn edit(&self, handle: &NotificationHandle, content: &NotificationContent)
    -> Result<()>;
}
