//! Liveness probing: deciding whether a candidate connection is usable
//! before handing it to a caller.

use std::time::{Duration, Instant};

use crate::conn::PhysicalConnection;

/// Configuration and logic for deciding whether a candidate connection is
/// usable *now*.
///
/// A probe never mutates pool state; it only reports. `Pool::acquire`
/// decides what to do with a `false` result (discard and retry, counting
/// against `local_bad_tolerance`).
#[derive(Debug, Clone)]
pub struct LivenessProbe {
    pub enabled: bool,
    pub query: String,
    /// `None` disables the idle-time gate: the probe always runs when
    /// `enabled` is true. `Some(d)` skips the probe for connections used
    /// within the last `d`.
    pub idle_threshold: Option<Duration>,
}

impl LivenessProbe {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            enabled: true,
            query: query.into(),
            idle_threshold: None,
        }
    }

    /// Returns `true` iff `conn` is usable now.
    ///
    /// `last_used_at` and `now` gate the probe by idle time; `now` is
    /// accepted as a parameter (rather than read internally) so callers
    /// acquiring many connections in a loop use one consistent instant.
    pub fn check<C: PhysicalConnection>(&self, conn: &mut C, last_used_at: Instant, now: Instant) -> bool {
        match conn.is_closed() {
            Ok(true) => return false,
            Ok(false) => {}
            Err(e) => {
                log::debug!("is_closed() failed during liveness check, treating as dead: {e}");
                return false;
            }
        }

        if !self.enabled {
            return true;
        }

        if let Some(threshold) = self.idle_threshold {
            if now.saturating_duration_since(last_used_at) <= threshold {
                return true;
            }
        }

        match conn.create_statement(&self.query) {
            Ok(()) => {
                if !conn.get_auto_commit() {
                    if let Err(e) = conn.rollback() {
                        log::debug!("rollback after successful ping failed: {e}");
                    }
                }
                true
            }
            Err(e) => {
                log::warn!("ping query failed, closing connection: {e}");
                if let Err(close_err) = conn.close() {
                    log::debug!("error closing connection after failed probe: {close_err}");
                }
                false
            }
        }
    }
}
