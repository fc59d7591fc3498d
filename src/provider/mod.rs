//! Status provider gateway.
//!
//! The upstream service that knows which streams are currently live. The
//! polling engine only depends on the [`StatusProvider`] trait; the
//! concrete Twitch client lives in [`twitch`].

pub mod twitch;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Provider-assigned stream identifier.
pub type StreamId = i64;

/// Status snapshot for a currently-live stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub stream_id: StreamId,
    /// Current display name as reported by the provider.
    pub name: String,
    pub title: Option<String>,
    pub category: Option<String>,
    pub viewer_count: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Bulk live-status lookup and name resolution.
///
/// `get_status` has three outcomes the polling engine distinguishes:
/// an `Err` is the no-answer outcome (provider unreachable, the tick is
/// skipped), an empty map means every queried stream is offline, and a
/// populated map carries one snapshot per live stream.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn get_status(&self, ids: &[StreamId]) -> Result<HashMap<StreamId, StatusSnapshot>>;

    /// Resolve stream names to provider ids. Names that cannot be resolved
    /// are omitted from the result.
    async fn get_ids(&self, names: &[String]) -> Result<HashMap<String, StreamId>>;
}
