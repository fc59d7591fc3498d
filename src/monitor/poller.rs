//! The polling engine.
//!
//! One long-lived serial loop: each tick reads the subscription fan-out,
//! queries the status provider for every registered stream, reconciles the
//! response against the registry to detect online/offline edges, and
//! drives the notification lifecycle (post on online, edit on offline).
//! Provider failures abort the tick atomically; per-stream failures are
//! isolated so one bad stream never starves the rest.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::database::repositories::SubscriptionStore;
use crate::dispatcher::{NotificationContent, NotificationDispatcher};
use crate::provider::{StatusProvider, StatusSnapshot, StreamId};
use crate::registry::StreamRegistry;

use super::fanout::{FanoutTarget, build_fanout};
use super::state::Transition;

/// Default interval between ticks.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default minimum corroborated-absence time before an offline transition
/// is accepted.
const DEFAULT_MIN_OFFLINE_DURATION: Duration = Duration::from_secs(60);

/// Default interval for polling the store readiness gate before the loop
/// starts.
const DEFAULT_READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polling engine configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Fixed sleep between ticks.
    pub poll_interval: Duration,
    /// Debounce window for offline transitions.
    pub min_offline_duration: Duration,
    /// Interval for polling the store readiness gate.
    pub ready_poll_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_offline_duration: DEFAULT_MIN_OFFLINE_DURATION,
            ready_poll_interval: DEFAULT_READY_POLL_INTERVAL,
        }
    }
}

/// The stream status polling engine.
pub struct StreamPoller<S, P, D> {
    store: Arc<S>,
    provider: Arc<P>,
    dispatcher: Arc<D>,
    registry: Arc<StreamRegistry>,
    config: PollerConfig,
}

impl<S, P, D> StreamPoller<S, P, D>
where
    S: SubscriptionStore + 'static,
    P: StatusProvider + 'static,
    D: NotificationDispatcher + 'static,
{
    pub fn new(
        store: Arc<S>,
        provider: Arc<P>,
        dispatcher: Arc<D>,
        registry: Arc<StreamRegistry>,
        config: PollerConfig,
    ) -> Self {
        Self {
            store,
            provider,
            dispatcher,
            registry,
            config,
        }
    }

    /// Run the polling loop until cancelled.
    ///
    /// Waits for the store readiness gate first, then ticks serially with a
    /// fixed sleep in between — a tick never overlaps the previous one.
    /// Cancellation lets an in-flight tick finish and stops rescheduling.
    pub async fn run(&self, cancel: CancellationToken) {
        if !self.wait_for_store(&cancel).await {
            return;
        }

        info!("The polling has started");

        loop {
            if let Err(e) = self.tick(Utc::now()).await {
                warn!(error = %e, "Polling tick failed");
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Polling loop shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Poll the store readiness gate. Returns false when cancelled while
    /// waiting.
    async fn wait_for_store(&self, cancel: &CancellationToken) -> bool {
        while !self.store.is_ready().await {
            debug!("Waiting for the subscription store to be ready");
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.config.ready_poll_interval) => {}
            }
        }
        true
    }

    /// Run one reconciliation pass.
    ///
    /// Exposed so tests can drive the engine tick-by-tick with a
    /// controlled clock.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        // Rebuilt every tick: subscriptions may have changed.
        let subscriptions = self.store.list_subscriptions().await?;
        let destinations = self.store.list_destinations().await?;
        let fanout = build_fanout(&subscriptions, &destinations);

        let ids = self.registry.ids();
        if ids.is_empty() {
            debug!("No registered streams, skipping status lookup");
            return Ok(());
        }

        // Three outcomes: Err = no answer (skip the tick, nothing mutated),
        // empty map = all offline, populated map = the online subset.
        let status = match self.provider.get_status(&ids).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Cannot retrieve status, the polling iteration has been skipped");
                return Ok(());
            }
        };

        for (stream_id, targets) in &fanout {
            let result = match status.get(stream_id) {
                Some(snapshot) => {
                    self.reconcile_present(*stream_id, targets, snapshot).await
                }
                None => self.reconcile_absent(*stream_id, now).await,
            };
            if let Err(e) = result {
                // Isolate per stream: one failure must not abort the rest.
                warn!(stream_id, error = %e, "Failed to reconcile stream");
            }
        }

        Ok(())
    }

    /// The stream is live now.
    async fn reconcile_present(
        &self,
        stream_id: StreamId,
        targets: &[FanoutTarget],
        snapshot: &StatusSnapshot,
    ) -> Result<()> {
        let Some((transition, stored_name)) = self.registry.with_entry(stream_id, |stream| {
            (stream.state.observe_present(), stream.name.clone())
        }) else {
            // Zero-subscriber streams should already be unregistered.
            debug!(stream_id, "Stream not registered, skipping");
            return Ok(());
        };

        // Refresh the display name when the provider reports a new one.
        // Non-fatal: a failed rename must not swallow the online edge and
        // its notifications; the registry keeps the old name, so the
        // rename is retried on the next tick.
        if snapshot.name != stored_name {
            info!(
                stream_id,
                old = %stored_name,
                new = %snapshot.name,
                "Stream name changed, updating"
            );
            match self.store.rename_stream(stream_id, &snapshot.name).await {
                Ok(()) => {
                    self.registry
                        .with_entry(stream_id, |stream| stream.name = snapshot.name.clone());
                }
                Err(e) => {
                    warn!(stream_id, error = %e, "Failed to persist stream name change");
                }
            }
        }

        if transition == Transition::WentOnline {
            self.announce_online(stream_id, targets, snapshot).await;
        }

        Ok(())
    }

    /// Post the online notification in every subscribed destination.
    async fn announce_online(
        &self,
        stream_id: StreamId,
        targets: &[FanoutTarget],
        snapshot: &StatusSnapshot,
    ) {
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets {
            let content = NotificationContent::online(snapshot, target.everyone);
            match self.dispatcher.post(&target.destination, &content).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Per-destination isolation: the remaining targets are
                    // still notified.
                    warn!(
                        stream_id,
                        destination_id = target.destination.id,
                        error = %e,
                        "Failed to post online notification"
                    );
                }
            }
        }

        info!(
            stream = %snapshot.name,
            destinations = handles.len(),
            "Stream went online, notifications posted"
        );

        self.registry.with_entry(stream_id, |stream| {
            stream.notifications.extend(handles);
        });
    }

    /// The stream is not live now.
    async fn reconcile_absent(&self, stream_id: StreamId, now: DateTime<Utc>) -> Result<()> {
        let Some((transition, name, handles)) = self.registry.with_entry(stream_id, |stream| {
            let transition = stream
                .state
                .observe_absent(now, self.config.min_offline_duration);
            // The handles are resolved with the offline transition; take
            // them out under the entry lock, edit outside it.
            let handles = if transition == Transition::WentOffline {
                std::mem::take(&mut stream.notifications)
            } else {
                Vec::new()
            };
            (transition, stream.name.clone(), handles)
        }) else {
            debug!(stream_id, "Stream not registered, skipping");
            return Ok(());
        };

        if transition == Transition::WentOffline {
            self.retract_notifications(stream_id, &name, handles).await;
            info!(stream = %name, "Stream just went offline");
        }

        Ok(())
    }

    /// Edit every outstanding notification to its offline rendering.
    async fn retract_notifications(
        &self,
        stream_id: StreamId,
        stream_name: &str,
        handles: Vec<crate::dispatcher::NotificationHandle>,
    ) {
        let content = NotificationContent::offline(stream_name);

        for handle in handles {
            match self.dispatcher.edit(&handle, &content).await {
                Ok(()) => {
                    debug!(
                        stream_id,
                        message_id = %handle.message_id,
                        created_at = %handle.created_at,
                        "Notification edited to offline"
                    );
                }
                Err(crate::Error::NotificationGone { .. }) => {
                    // Deleted externally; already retracted from our point
                    // of view.
                    warn!(
                        stream_id,
                        message_id = %handle.message_id,
                        "Notification does not exist or has already been deleted"
                    );
                }
                Err(e) => {
                    warn!(
                        stream_id,
                        message_id = %handle.message_id,
                        error = %e,
                        "Failed to edit notification"
                    );
                }
            }
        }
    }
}
