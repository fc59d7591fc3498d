//! Shared in-memory test doubles for the collaborator traits.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use stream_notify::database::models::{DestinationRecord, StreamRecord, SubscriptionRecord};
use stream_notify::database::repositories::SubscriptionStore;
use stream_notify::dispatcher::{
    NotificationContent, NotificationDispatcher, NotificationHandle,
};
use stream_notify::provider::{StatusProvider, StatusSnapshot, StreamId};
use stream_notify::{Error, Result};

// ===== Subscription store =====

/// In-memory subscription store.
#[derive(Default)]
pub struct MemoryStore {
    pub streams: Mutex<Vec<StreamRecord>>,
    pub destinations: Mutex<Vec<DestinationRecord>>,
    pub subscriptions: Mutex<Vec<SubscriptionRecord>>,
    /// When set, `rename_stream` fails.
    pub fail_rename: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(
        streams: Vec<StreamRecord>,
        destinations: Vec<DestinationRecord>,
        subscriptions: Vec<SubscriptionRecord>,
    ) -> Self {
        Self {
            streams: Mutex::new(streams),
            destinations: Mutex::new(destinations),
            subscriptions: Mutex::new(subscriptions),
            fail_rename: AtomicBool::new(false),
        }
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    pub fn destination_count(&self) -> usize {
        self.destinations.lock().unwrap().len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn is_ready(&self) -> bool {
        true
    }

    async fn list_streams(&self) -> Result<Vec<StreamRecord>> {
        Ok(self.streams.lock().unwrap().clone())
    }

    async fn get_stream(&self, id: i64) -> Result<Option<StreamRecord>> {
        Ok(self
            .streams
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn create_stream(&self, stream: &StreamRecord) -> Result<()> {
        let mut streams = self.streams.lock().unwrap();
        if streams.iter().any(|s| s.id == stream.id) {
            return Err(Error::already_exists("Stream", stream.id.to_string()));
        }
        streams.push(stream.clone());
        Ok(())
    }

    async fn rename_stream(&self, id: i64, name: &str) -> Result<()> {
        if self.fail_rename.load(Ordering::Relaxed) {
            return Err(Error::Other("rename failure injected".to_string()));
        }
        let mut streams = self.streams.lock().unwrap();
        if let Some(stream) = streams.iter_mut().find(|s| s.id == id) {
            stream.name = name.to_string();
        }
        Ok(())
    }

    async fn delete_stream(&self, id: i64) -> Result<()> {
        self.streams.lock().unwrap().retain(|s| s.id != id);
        Ok(())
    }

    async fn list_destinations(&self) -> Result<Vec<DestinationRecord>> {
        Ok(self.destinations.lock().unwrap().clone())
    }

    async fn get_destination(&self, id: i64) -> Result<Option<DestinationRecord>> {
        Ok(self
            .destinations
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn create_destination(&self, destination: &DestinationRecord) -> Result<()> {
        let mut destinations = self.destinations.lock().unwrap();
        if destinations.iter().any(|d| d.id == destination.id) {
            return Err(Error::already_exists(
                "Destination",
                destination.id.to_string(),
            ));
        }
        destinations.push(destination.clone());
        Ok(())
    }

    async fn delete_destination(&self, id: i64) -> Result<()> {
        self.destinations.lock().unwrap().retain(|d| d.id != id);
        Ok(())
    }

    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionRecord>> {
        Ok(self.subscriptions.lock().unwrap().clone())
    }

    async fn subscriptions_for_stream(&self, stream_id: i64) -> Result<Vec<SubscriptionRecord>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.stream_id == stream_id)
            .cloned()
            .collect())
    }

    async fn subscriptions_for_destination(
        &self,
        destination_id: i64,
    ) -> Result<Vec<SubscriptionRecord>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.destination_id == destination_id)
            .cloned()
            .collect())
    }

    async fn get_subscription(
        &self,
        destination_id: i64,
        stream_id: i64,
    ) -> Result<Option<SubscriptionRecord>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.destination_id == destination_id && s.stream_id == stream_id)
            .cloned())
    }

    async fn create_subscription(&self, subscription: &SubscriptionRecord) -> Result<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if subscriptions
            .iter()
            .any(|s| {
                s.destination_id == subscription.destination_id
                    && s.stream_id == subscription.stream_id
            })
        {
            return Err(Error::already_exists(
                "Subscription",
                format!(
                    "{}:{}",
                    subscription.destination_id, subscription.stream_id
                ),
            ));
        }
        subscriptions.push(subscription.clone());
        Ok(())
    }

    async fn delete_subscription(&self, destination_id: i64, stream_id: i64) -> Result<bool> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let before = subscriptions.len();
        subscriptions
            .retain(|s| !(s.destination_id == destination_id && s.stream_id == stream_id));
        Ok(subscriptions.len() < before)
    }
}

// ===== Status provider =====

/// One scripted provider response.
pub enum ScriptedStatus {
    /// The given streams are live.
    Live(Vec<StatusSnapshot>),
    /// Provider reachable, nothing live.
    Empty,
    /// Provider unreachable.
    NoAnswer,
}

/// Provider returning a scripted sequence of responses, one per call.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ScriptedStatus>>,
    names: HashMap<String, StreamId>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ScriptedStatus>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            names: HashMap::new(),
        }
    }

    pub fn with_names(names: &[(&str, StreamId)]) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            names: names
                .iter()
                .map(|(name, id)| (name.to_string(), *id))
                .collect(),
        }
    }
}

#[async_trait]
impl StatusProvider for ScriptedProvider {
    async fn get_status(&self, _ids: &[StreamId]) -> Result<HashMap<StreamId, StatusSnapshot>> {
        match self.responses.lock().unwrap().pop_front() {
            Some(ScriptedStatus::Live(snapshots)) => Ok(snapshots
                .into_iter()
                .map(|s| (s.stream_id, s))
                .collect()),
            Some(ScriptedStatus::Empty) | None => Ok(HashMap::new()),
            Some(ScriptedStatus::NoAnswer) => {
                Err(Error::ProviderUnavailable("scripted outage".to_string()))
            }
        }
    }

    async fn get_ids(&self, names: &[String]) -> Result<HashMap<String, StreamId>> {
        Ok(names
            .iter()
            .filter_map(|name| self.names.get(name).map(|id| (name.clone(), *id)))
            .collect())
    }
}

/// Snapshot builder for scripted responses.
pub fn snapshot(stream_id: StreamId, name: &str) -> StatusSnapshot {
    StatusSnapshot {
        stream_id,
        name: name.to_string(),
        title: Some("some title".to_string()),
        category: None,
        viewer_count: Some(7),
        started_at: None,
    }
}

// ===== Notification dispatcher =====

/// A recorded post.
#[derive(Debug, Clone)]
pub struct PostedNotification {
    pub destination_id: i64,
    pub content: NotificationContent,
    pub message_id: String,
}

/// A recorded edit.
#[derive(Debug, Clone)]
pub struct EditedNotification {
    pub message_id: String,
    pub content: NotificationContent,
}

/// Dispatcher recording every post and edit.
#[derive(Default)]
pub struct RecordingDispatcher {
    next_message_id: AtomicU64,
    pub posts: Mutex<Vec<PostedNotification>>,
    pub edits: Mutex<Vec<EditedNotification>>,
    /// Message ids whose edit reports the target as deleted.
    pub gone: Mutex<Vec<String>>,
    /// Destination ids whose posts fail.
    pub failing_destinations: Mutex<Vec<i64>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn edit_count(&self) -> usize {
        self.edits.lock().unwrap().len()
    }

    pub fn mark_gone(&self, message_id: &str) {
        self.gone.lock().unwrap().push(message_id.to_string());
    }

    pub fn fail_posts_to(&self, destination_id: i64) {
        self.failing_destinations
            .lock()
            .unwrap()
            .push(destination_id);
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn post(
        &self,
        destination: &DestinationRecord,
        content: &NotificationContent,
    ) -> Result<NotificationHandle> {
        if self
            .failing_destinations
            .lock()
            .unwrap()
            .contains(&destination.id)
        {
            return Err(Error::Dispatch("post failure injected".to_string()));
        }
        let message_id = self
            .next_message_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string();
        self.posts.lock().unwrap().push(PostedNotification {
            destination_id: destination.id,
            content: content.clone(),
            message_id: message_id.clone(),
        });
        Ok(NotificationHandle {
            destination_id: destination.id,
            message_id,
            created_at: Utc::now(),
        })
    }

    async fn edit(
        &self,
        handle: &NotificationHandle,
        content: &NotificationContent,
    ) -> Result<()> {
        if self.gone.lock().unwrap().contains(&handle.message_id) {
            return Err(Error::NotificationGone {
                destination_id: handle.destination_id,
                message_id: handle.message_id.clone(),
            });
        }
        self.edits.lock().unwrap().push(EditedNotification {
            message_id: handle.message_id.clone(),
            content: content.clone(),
        });
        Ok(())
    }
}

// ===== Row builders =====

pub fn stream(id: i64, name: &str) -> StreamRecord {
    StreamRecord {
        id,
        name: name.to_string(),
    }
}

pub fn destination(id: i64) -> DestinationRecord {
    DestinationRecord {
        id,
        name: format!("chan-{id}"),
        guild_id: 1,
        guild_name: "guild".to_string(),
    }
}

pub fn subscription(destination_id: i64, stream_id: i64, everyone: bool) -> SubscriptionRecord {
    SubscriptionRecord {
        destination_id,
        stream_id,
        everyone,
    }
}
