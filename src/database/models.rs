//! Row models for the durable subscription schema.
//!
//! Only identity and display data are persisted. Transient liveness state
//! (online flag, debounce timestamp, outstanding notifications) lives in
//! the in-memory registry and never reaches these models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tracked stream as persisted. Identity is the provider-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StreamRecord {
    pub id: i64,
    /// Display name, refreshed from provider data when it changes.
    pub name: String,
}

/// A notification destination (messaging channel) as persisted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DestinationRecord {
    pub id: i64,
    pub name: String,
    pub guild_id: i64,
    pub guild_name: String,
}

/// Relation between exactly one stream and exactly one destination.
///
/// At most one row exists per (stream, destination) pair.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub destination_id: i64,
    pub stream_id: i64,
    /// Whether notifications should tag the whole destination audience.
    pub everyone: bool,
}
