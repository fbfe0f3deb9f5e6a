//! Configuration for a [`Pool`][crate::Pool], mirroring the builder shape of
//! `sqlx-core`'s `PoolOptions`.

use std::time::Duration;

use crate::probe::LivenessProbe;

/// Configuration options for a [`Pool`][super::Pool].
///
/// Constructed with [`PoolOptions::new`] and consumed by
/// [`Pool::with_options`][super::Pool::with_options]. Every setter here just
/// assigns a not-yet-built pool's field; the corresponding `force_close_all`
/// side effect described in the design only applies to the matching setter
/// on an already-running [`Pool`], since reconfiguring a pool that doesn't
/// exist yet has nothing to drain.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub(crate) max_active: u32,
    pub(crate) max_idle: u32,
    pub(crate) max_checkout: Duration,
    pub(crate) wait: Duration,
    pub(crate) local_bad_tolerance: u32,
    pub(crate) probe: LivenessProbe,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolOptions {
    /// Returns the reference design's default configuration.
    pub fn new() -> Self {
        Self {
            max_active: 10,
            max_idle: 5,
            max_checkout: Duration::from_millis(20_000),
            wait: Duration::from_millis(20_000),
            local_bad_tolerance: 3,
            probe: LivenessProbe {
                enabled: false,
                query: String::new(),
                idle_threshold: None,
            },
        }
    }

    /// Cap on concurrent checked-out connections. Default 10.
    pub fn max_active(mut self, max: u32) -> Self {
        self.max_active = max;
        self
    }

    /// Cap on retained idle connections. Default 5.
    pub fn max_idle(mut self, max: u32) -> Self {
        self.max_idle = max;
        self
    }

    /// Threshold after which an active handle is reclaimable by another
    /// acquirer. Default 20s.
    pub fn max_checkout(mut self, duration: Duration) -> Self {
        self.max_checkout = duration;
        self
    }

    /// Per-wait bound on the pool's condition variable. Default 20s.
    pub fn wait(mut self, duration: Duration) -> Self {
        self.wait = duration;
        self
    }

    /// Extra bad-connection retries allowed per `acquire` beyond `max_idle`.
    /// Default 3.
    pub fn local_bad_tolerance(mut self, tolerance: u32) -> Self {
        self.local_bad_tolerance = tolerance;
        self
    }

    /// Enables the liveness probe using `query`, always gated by
    /// `idle_threshold` if one is set with [`ping_idle_threshold`][Self::ping_idle_threshold].
    pub fn ping_query(mut self, query: impl Into<String>) -> Self {
        self.probe.enabled = true;
        self.probe.query = query.into();
        self
    }

    /// Skip the probe for connections used within `threshold` of now.
    pub fn ping_idle_threshold(mut self, threshold: Duration) -> Self {
        self.probe.idle_threshold = Some(threshold);
        self
    }

    pub fn get_max_active(&self) -> u32 {
        self.max_active
    }

    pub fn get_max_idle(&self) -> u32 {
        self.max_idle
    }
}
