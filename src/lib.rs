//! stream-notify library crate.
//!
//! Tracks the live/offline status of externally hosted streams and fans
//! notifications out to subscribed destinations when status changes.

pub mod config;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod provider;
pub mod registry;
pub mod subscription;

pub use error::{Error, Result};
