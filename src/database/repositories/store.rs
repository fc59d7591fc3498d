//! Subscription store: durable stream/destination/subscription records.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{DestinationRecord, StreamRecord, SubscriptionRecord};
use crate::{Error, Result};

/// Durable mapping of stream <-> destination subscriptions.
///
/// Source of truth for which destinations must be notified for which
/// stream. Exposes a readiness gate the polling engine waits on before its
/// first tick.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Whether the store has finished its schema setup.
    async fn is_ready(&self) -> bool;

    async fn list_streams(&self) -> Result<Vec<StreamRecord>>;
    async fn get_stream(&self, id: i64) -> Result<Option<StreamRecord>>;
    async fn create_stream(&self, stream: &StreamRecord) -> Result<()>;
    async fn rename_stream(&self, id: i64, name: &str) -> Result<()>;
    async fn delete_stream(&self, id: i64) -> Result<()>;

    async fn list_destinations(&self) -> Result<Vec<DestinationRecord>>;
    async fn get_destination(&self, id: i64) -> Result<Option<DestinationRecord>>;
    async fn create_destination(&self, destination: &DestinationRecord) -> Result<()>;
    async fn delete_destination(&self, id: i64) -> Result<()>;

    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionRecord>>;
    async fn subscriptions_for_stream(&self, stream_id: i64) -> Result<Vec<SubscriptionRecord>>;
    async fn subscriptions_for_destination(
        &self,
        destination_id: i64,
    ) -> Result<Vec<SubscriptionRecord>>;
    async fn get_subscription(
        &self,
        destination_id: i64,
        stream_id: i64,
    ) -> Result<Option<SubscriptionRecord>>;
    async fn create_subscription(&self, subscription: &SubscriptionRecord) -> Result<()>;
    /// Returns whether a row was actually deleted.
    async fn delete_subscription(&self, destination_id: i64, stream_id: i64) -> Result<bool>;
}

/// SQLx implementation of [`SubscriptionStore`].
pub struct SqlxSubscriptionStore {
    pool: SqlitePool,
    ready: AtomicBool,
}

impl SqlxSubscriptionStore {
    /// Create a store over an initialized pool. Not ready until
    /// [`Self::migrate`] has run.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            ready: AtomicBool::new(false),
        }
    }

    /// Run schema migrations and mark the store ready.
    pub async fn migrate(&self) -> Result<()> {
        crate::database::run_migrations(&self.pool).await?;
        self.ready.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for SqlxSubscriptionStore {
    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn list_streams(&self) -> Result<Vec<StreamRecord>> {
        let streams = sqlx::query_as::<_, StreamRecord>("SELECT * FROM streams ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(streams)
    }

    async fn get_stream(&self, id: i64) -> Result<Option<StreamRecord>> {
        let stream = sqlx::query_as::<_, StreamRecord>("SELECT * FROM streams WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(stream)
    }

    async fn create_stream(&self, stream: &StreamRecord) -> Result<()> {
        let result = sqlx::query("INSERT INTO streams (id, name) VALUES (?, ?)")
            .bind(stream.id)
            .bind(&stream.name)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(Error::already_exists("Stream", stream.id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn rename_stream(&self, id: i64, name: &str) -> Result<()> {
        sqlx::query("UPDATE streams SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_stream(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM streams WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_destinations(&self) -> Result<Vec<DestinationRecord>> {
        let destinations =
            sqlx::query_as::<_, DestinationRecord>("SELECT * FROM destinations ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(destinations)
    }

    async fn get_destination(&self, id: i64) -> Result<Option<DestinationRecord>> {
        let destination =
            sqlx::query_as::<_, DestinationRecord>("SELECT * FROM destinations WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(destination)
    }

    async fn create_destination(&self, destination: &DestinationRecord) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO destinations (id, name, guild_id, guild_name) VALUES (?, ?, ?, ?)",
        )
        .bind(destination.id)
        .bind(&destination.name)
        .bind(destination.guild_id)
        .bind(&destination.guild_name)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(Error::already_exists("Destination", destination.id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_destination(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM destinations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionRecord>> {
        let subscriptions = sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM subscriptions ORDER BY stream_id, destination_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }

    async fn subscriptions_for_stream(&self, stream_id: i64) -> Result<Vec<SubscriptionRecord>> {
        let subscriptions = sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM subscriptions WHERE stream_id = ? ORDER BY destination_id",
        )
        .bind(stream_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }

    async fn subscriptions_for_destination(
        &self,
        destination_id: i64,
    ) -> Result<Vec<SubscriptionRecord>> {
        let subscriptions = sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM subscriptions WHERE destination_id = ? ORDER BY stream_id",
        )
        .bind(destination_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }

    async fn get_subscription(
        &self,
        destination_id: i64,
        stream_id: i64,
    ) -> Result<Option<SubscriptionRecord>> {
        let subscription = sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM subscriptions WHERE destination_id = ? AND stream_id = ?",
        )
        .bind(destination_id)
        .bind(stream_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }

    async fn create_subscription(&self, subscription: &SubscriptionRecord) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO subscriptions (destination_id, stream_id, everyone) VALUES (?, ?, ?)",
        )
        .bind(subscription.destination_id)
        .bind(subscription.stream_id)
        .bind(subscription.everyone)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(Error::already_exists(
                    "Subscription",
                    format!(
                        "{}:{}",
                        subscription.destination_id, subscription.stream_id
                    ),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_subscription(&self, destination_id: i64, stream_id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE destination_id = ? AND stream_id = ?")
                .bind(destination_id)
                .bind(stream_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
