//! Fan-out table construction.
//!
//! One table per tick mapping each subscribed stream to the destinations
//! it must be announced in. Always rebuilt from the store — subscriptions
//! may have changed since the previous tick — and never cached.

use std::collections::HashMap;

use tracing::warn;

use crate::database::models::{DestinationRecord, SubscriptionRecord};
use crate::provider::StreamId;

/// One notification target for a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutTarget {
    pub destination: DestinationRecord,
    /// Broad-audience flag of the subscription.
    pub everyone: bool,
}

/// Join the subscription relation with destination rows.
///
/// Target lists are ordered by destination id so logs and tests are
/// deterministic. Subscriptions whose destination row is missing are
/// skipped; the destination-deletion path should have removed them.
pub fn build_fanout(
    subscriptions: &[SubscriptionRecord],
    destinations: &[DestinationRecord],
) -> HashMap<StreamId, Vec<FanoutTarget>> {
    let by_id: HashMap<i64, &DestinationRecord> =
        destinations.iter().map(|d| (d.id, d)).collect();

    let mut table: HashMap<StreamId, Vec<FanoutTarget>> = HashMap::new();
    for subscription in subscriptions {
        let Some(destination) = by_id.get(&subscription.destination_id) else {
            warn!(
                destination_id = subscription.destination_id,
                stream_id = subscription.stream_id,
                "subscription references a missing destination, skipping"
            );
            continue;
        };
        table
            .entry(subscription.stream_id)
            .or_default()
            .push(FanoutTarget {
                destination: (*destination).clone(),
                everyone: subscription.everyone,
            });
    }

    for targets in table.values_mut() {
        targets.sort_by_key(|t| t.destination.id);
    }

    table
}
