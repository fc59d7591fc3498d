//! Subscription lifecycle operations.
//!
//! The command-facing CRUD around streams, destinations and their
//! subscriptions. Plain create/read/delete with two bits of bookkeeping:
//! rows are garbage-collected when their last subscription goes, and the
//! in-memory registry is kept in sync so the polling engine picks up new
//! streams and drops released ones.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::database::models::{DestinationRecord, StreamRecord, SubscriptionRecord};
use crate::database::repositories::SubscriptionStore;
use crate::provider::{StatusProvider, StreamId};
use crate::registry::StreamRegistry;
use crate::{Error, Result};

/// Subscription command service.
pub struct SubscriptionService<S, P> {
    store: Arc<S>,
    provider: Arc<P>,
    registry: Arc<StreamRegistry>,
}

impl<S, P> SubscriptionService<S, P>
where
    S: SubscriptionStore,
    P: StatusProvider,
{
    pub fn new(store: Arc<S>, provider: Arc<P>, registry: Arc<StreamRegistry>) -> Self {
        Self {
            store,
            provider,
            registry,
        }
    }

    /// Resolve a stream name to its provider id.
    async fn resolve_stream_id(&self, name: &str) -> Result<StreamId> {
        let ids = self.provider.get_ids(&[name.to_string()]).await?;
        ids.get(name)
            .copied()
            .ok_or_else(|| Error::not_found("Stream", name))
    }

    /// Subscribe a destination to a stream.
    ///
    /// Creates the stream and destination rows if this is their first use
    /// and registers new streams with the polling engine. Returns `false`
    /// when the subscription already exists (no error, nothing changed).
    pub async fn add_subscription(
        &self,
        destination: &DestinationRecord,
        stream_name: &str,
        everyone: bool,
    ) -> Result<bool> {
        let stream_name = stream_name.to_lowercase();
        let stream_id = self.resolve_stream_id(&stream_name).await?;

        if self
            .store
            .get_subscription(destination.id, stream_id)
            .await?
            .is_some()
        {
            warn!(
                stream = %stream_name,
                destination_id = destination.id,
                "Stream is already tracked in this destination"
            );
            return Ok(false);
        }

        let record = StreamRecord {
            id: stream_id,
            name: stream_name.clone(),
        };
        if self.store.get_stream(stream_id).await?.is_none() {
            match self.store.create_stream(&record).await {
                Ok(()) | Err(Error::AlreadyExists { .. }) => {}
                Err(e) => return Err(e),
            }
        } else {
            debug!(stream = %stream_name, stream_id, "Stream already stored");
        }
        // Idempotent: a stream already being polled keeps its state.
        self.registry.register(&record);

        if self.store.get_destination(destination.id).await?.is_none() {
            match self.store.create_destination(destination).await {
                Ok(()) | Err(Error::AlreadyExists { .. }) => {}
                Err(e) => return Err(e),
            }
        } else {
            debug!(destination_id = destination.id, "Destination already stored");
        }

        match self
            .store
            .create_subscription(&SubscriptionRecord {
                destination_id: destination.id,
                stream_id,
                everyone,
            })
            .await
        {
            Ok(()) => {
                debug!(
                    stream = %stream_name,
                    destination_id = destination.id,
                    everyone,
                    "Subscription created"
                );
                Ok(true)
            }
            // Lost a race with a concurrent identical add; same outcome as
            // the duplicate check above.
            Err(Error::AlreadyExists { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove a destination's subscription to a stream.
    ///
    /// Returns `false` when no such subscription existed. Rows without any
    /// remaining subscription are deleted, and a released stream is
    /// unregistered from the polling engine.
    pub async fn remove_subscription(
        &self,
        destination_id: i64,
        stream_name: &str,
    ) -> Result<bool> {
        let stream_name = stream_name.to_lowercase();
        let stream_id = self.resolve_stream_id(&stream_name).await?;

        if !self.store.delete_subscription(destination_id, stream_id).await? {
            return Ok(false);
        }
        debug!(
            stream = %stream_name,
            destination_id,
            "Stream is no longer tracked in this destination"
        );

        if self
            .store
            .subscriptions_for_destination(destination_id)
            .await?
            .is_empty()
        {
            debug!(
                destination_id,
                "No streams tracked in this destination anymore, deleting it"
            );
            self.store.delete_destination(destination_id).await?;
        }

        self.release_stream_if_unsubscribed(stream_id).await?;
        Ok(true)
    }

    /// A destination was deleted externally: apply the subscription-removal
    /// side effects for every subscription it had.
    pub async fn on_destination_deleted(&self, destination_id: i64) -> Result<()> {
        for subscription in self
            .store
            .subscriptions_for_destination(destination_id)
            .await?
        {
            self.store
                .delete_subscription(destination_id, subscription.stream_id)
                .await?;
            self.release_stream_if_unsubscribed(subscription.stream_id)
                .await?;
        }
        self.store.delete_destination(destination_id).await?;
        debug!(destination_id, "Destination deleted, subscriptions cleaned up");
        Ok(())
    }

    /// Streams currently tracked, grouped per destination (destinations in
    /// id order, stream names alphabetical).
    pub async fn list_tracked(&self) -> Result<Vec<(DestinationRecord, Vec<String>)>> {
        let streams: HashMap<i64, String> = self
            .store
            .list_streams()
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        let mut by_destination: HashMap<i64, Vec<String>> = HashMap::new();
        for subscription in self.store.list_subscriptions().await? {
            if let Some(name) = streams.get(&subscription.stream_id) {
                by_destination
                    .entry(subscription.destination_id)
                    .or_default()
                    .push(name.clone());
            }
        }

        let mut result = Vec::new();
        for destination in self.store.list_destinations().await? {
            if let Some(mut names) = by_destination.remove(&destination.id) {
                names.sort();
                result.push((destination, names));
            }
        }
        Ok(result)
    }

    /// Delete the stream row and unregister it when nothing subscribes to
    /// it anymore.
    async fn release_stream_if_unsubscribed(&self, stream_id: StreamId) -> Result<()> {
        if self
            .store
            .subscriptions_for_stream(stream_id)
            .await?
            .is_empty()
        {
            debug!(
                stream_id,
                "Stream is no longer tracked in any destination, deleting it"
            );
            self.registry.unregister(stream_id);
            self.store.delete_stream(stream_id).await?;
        }
        Ok(())
    }
}
