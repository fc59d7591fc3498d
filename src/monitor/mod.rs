//! Stream status monitoring.
//!
//! The polling engine and its supporting pieces: the per-stream state
//! machine and the per-tick fan-out table.

pub mod fanout;
pub mod poller;
pub mod state;

pub use fanout::{FanoutTarget, build_fanout};
pub use poller::{PollerConfig, StreamPoller};
pub use state::{Liveness, StreamState, Transition};
