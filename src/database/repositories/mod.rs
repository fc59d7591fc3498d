//! Repository traits and their sqlx implementations.

pub mod store;

pub use store::{SqlxSubscriptionStore, SubscriptionStore};
