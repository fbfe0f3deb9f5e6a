//! A synchronous, thread-safe pool of database connections.

mod guard;
mod inner;
mod options;
mod stats;

pub use guard::ConnectionGuard;
pub use options::PoolOptions;
pub use stats::PoolStats;

use std::sync::Arc;

use crate::conn::Provider;
use crate::error::Result;
use inner::PoolInner;

/// A pool of physical connections produced by a [`Provider`].
///
/// Cloning a `Pool` is cheap and shares the same underlying state (it's a
/// thin handle around an `Arc`), mirroring the reference design's single
/// `PooledDataSource` instance shared by every caller.
pub struct Pool<P: Provider> {
    inner: Arc<PoolInner<P>>,
}

impl<P: Provider> Clone for Pool<P> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<P: Provider> Pool<P> {
    /// Creates a pool with default [`PoolOptions`].
    pub fn new(provider: P, url: impl Into<String>) -> Self {
        Self::with_options(provider, url, PoolOptions::default())
    }

    /// Creates a pool with explicit [`PoolOptions`].
    pub fn with_options(provider: P, url: impl Into<String>, options: PoolOptions) -> Self {
        Self::with_credentials(provider, url, None, None, options)
    }

    /// Creates a pool that authenticates as `user`/`password`, part of the
    /// identity fingerprint that decides whether a recycled connection can
    /// be handed back out under a reconfigured pool (see
    /// [`crate::identity::fingerprint`]).
    pub fn with_credentials(
        provider: P,
        url: impl Into<String>,
        user: Option<String>,
        password: Option<String>,
        options: PoolOptions,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner::new(provider, options, url.into(), user, password)),
        }
    }

    /// Checks out a connection, opening, reclaiming, or waiting for one as
    /// needed per the pool's configured limits. See module docs for the
    /// full decision tree.
    pub fn acquire(&self) -> Result<ConnectionGuard<P>> {
        PoolInner::acquire(&self.inner)
    }

    /// Invalidates every idle and active connection and reopens the pool
    /// under its current configuration. Connections still checked out are
    /// invalidated in place; their guards learn this the next time they're
    /// used or dropped.
    pub fn force_close_all(&self) {
        self.inner.force_close_all()
    }

    /// Permanently shuts the pool down: closes every idle and active
    /// physical connection and wakes any thread blocked in `acquire`, which
    /// then fails with [`Error::Interrupted`][crate::Error::Interrupted]
    /// instead of retrying. Idempotent. Every `Pool` clone shares this
    /// state, so any clone observes the shutdown.
    ///
    /// Unlike [`force_close_all`][Self::force_close_all], a pool does not
    /// come back from `shutdown`: subsequent `acquire` calls fail
    /// immediately rather than opening fresh connections.
    pub fn shutdown(&self) {
        self.inner.shutdown()
    }

    /// A point-in-time snapshot of the pool's counters.
    pub fn pool_stats(&self) -> PoolStats {
        self.inner.pool_stats()
    }

    pub fn options(&self) -> PoolOptions {
        self.inner.options()
    }

    pub fn url(&self) -> String {
        self.inner.url()
    }
}

/// Configuration mutators. Every setter here force-closes the pool except
/// [`set_local_bad_tolerance`][Self::set_local_bad_tolerance], matching the
/// reference design's "reconfiguring identity or capacity invalidates
/// outstanding state" rule.
impl<P: Provider> Pool<P> {
    pub fn set_url(&self, url: impl Into<String>) {
        self.inner.set_url(url.into())
    }

    pub fn set_user(&self, user: Option<String>) {
        self.inner.set_user(user)
    }

    pub fn set_password(&self, password: Option<String>) {
        self.inner.set_password(password)
    }

    pub fn set_max_active(&self, max: u32) {
        self.inner.set_max_active(max)
    }

    pub fn set_max_idle(&self, max: u32) {
        self.inner.set_max_idle(max)
    }

    pub fn set_max_checkout(&self, duration: std::time::Duration) {
        self.inner.set_max_checkout(duration)
    }

    pub fn set_wait(&self, duration: std::time::Duration) {
        self.inner.set_wait(duration)
    }

    pub fn set_ping(&self, enabled: bool, query: impl Into<String>, idle_threshold: Option<std::time::Duration>) {
        self.inner.set_ping(enabled, query.into(), idle_threshold)
    }

    pub fn set_local_bad_tolerance(&self, tolerance: u32) {
        self.inner.set_local_bad_tolerance(tolerance)
    }
}
