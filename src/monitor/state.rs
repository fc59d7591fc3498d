//! Per-stream online/offline state machine.
//!
//! Pure and synchronous: the polling engine feeds it one observation per
//! tick and acts on the returned transition. The debounce policy lives
//! here — a stream is only accepted as offline once its absence has been
//! corroborated for longer than the configured minimum offline duration,
//! which suppresses notification spam when the provider flaps.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// The two stable states of a tracked stream.
///
/// The cooling condition (offline but within the debounce window) is not a
/// third state: it is `Online` with a young `last_offline_at` stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Offline,
    Online,
}

/// Result of feeding one observation into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Steady state, nothing to do.
    None,
    /// Offline -> Online edge: notifications must be posted.
    WentOnline,
    /// Online -> Offline edge, debounce elapsed: notifications must be
    /// edited to their offline rendering.
    WentOffline,
}

/// Per-stream liveness state with debounce timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamState {
    liveness: Liveness,
    /// When absence was first observed. Cleared on any presence.
    last_offline_at: Option<DateTime<Utc>>,
}

impl StreamState {
    /// All streams start offline.
    pub fn new() -> Self {
        Self {
            liveness: Liveness::Offline,
            last_offline_at: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.liveness == Liveness::Online
    }

    pub fn last_offline_at(&self) -> Option<DateTime<Utc>> {
        self.last_offline_at
    }

    /// The stream appeared in the provider response.
    pub fn observe_present(&mut self) -> Transition {
        self.last_offline_at = None;
        match self.liveness {
            Liveness::Offline => {
                self.liveness = Liveness::Online;
                Transition::WentOnline
            }
            Liveness::Online => Transition::None,
        }
    }

    /// The stream was absent from the provider response.
    ///
    /// A single-tick absence never fires the offline transition: the first
    /// absence only stamps `last_offline_at`, and the edge fires on a later
    /// tick once the elapsed time exceeds `min_offline`.
    pub fn observe_absent(&mut self, now: DateTime<Utc>, min_offline: Duration) -> Transition {
        match self.liveness {
            Liveness::Offline => {
                // The first-ever observed absence stamps the timestamp even
                // though no online period preceded it; benign, the flag is
                // already offline and no edge can fire from here.
                if self.last_offline_at.is_none() {
                    self.last_offline_at = Some(now);
                }
                Transition::None
            }
            Liveness::Online => match self.last_offline_at {
                None => {
                    self.last_offline_at = Some(now);
                    Transition::None
                }
                Some(stamp) => {
                    let elapsed = now.signed_duration_since(stamp);
                    if elapsed.to_std().is_ok_and(|d| d > min_offline) {
                        self.liveness = Liveness::Offline;
                        Transition::WentOffline
                    } else {
                        Transition::None
                    }
                }
            },
        }
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}
