//! The caller-facing connection handle ("proxy" in the reference design).

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::conn::{PhysicalConnection, Provider};
use crate::error::{ConnectionErrorBox, Error, Result};
use crate::pool::inner::{ConnectionRecord, PoolInner};

/// A checked-out connection.
///
/// Dropping a guard (or calling [`close`][Self::close] explicitly) returns
/// it to the pool. Every other operation forwards to the underlying
/// connection via [`with_connection`][Self::with_connection], failing with
/// [`Error::ConnectionInvalid`] if the pool has since reclaimed, recycled,
/// or force-closed the handle out from under the caller — the Rust
/// equivalent of the reference design's "verify valid, then forward, else
/// fail" proxy dispatch.
pub struct ConnectionGuard<P: Provider> {
    pool: Arc<PoolInner<P>>,
    record: Option<ConnectionRecord<P::Connection>>,
    /// Captured once at construction from `record.identity_hash()` and kept
    /// even after `record` is taken on close: the reference design fixes a
    /// handle's `hashCode` at construction precisely so collections indexed
    /// by handles stay consistent after invalidation, and deriving it
    /// through `Option<ConnectionRecord>` would make it flip to a different
    /// value the instant the guard closes.
    identity_hash: u64,
}

impl<P: Provider> ConnectionGuard<P> {
    pub(crate) fn new(pool: Arc<PoolInner<P>>, record: ConnectionRecord<P::Connection>) -> Self {
        let identity_hash = record.identity_hash();
        Self { pool, record: Some(record), identity_hash }
    }

    /// Whether this handle can still be used. `false` once the pool has
    /// reclaimed, recycled, or force-closed it, or after [`close`][Self::close].
    pub fn is_valid(&self) -> bool {
        match &self.record {
            None => false,
            Some(record) => {
                let slot = record.slot().lock().unwrap();
                slot.epoch() == record.epoch() && slot.is_occupied()
            }
        }
    }

    /// The pool-assigned identity of the underlying physical connection,
    /// fixed at construction and unaffected by invalidation or `close`.
    /// Defines equality and the `Hash` impl below, matching the reference
    /// design's "handle equality is the identity hash of the underlying
    /// physical connection, fixed at construction" rule.
    pub fn identity_hash(&self) -> u64 {
        self.identity_hash
    }

    /// Forwards a fallible operation to the underlying connection.
    ///
    /// Fails with [`Error::ConnectionInvalid`] without touching the
    /// connection if this handle has been invalidated; otherwise any error
    /// from `f` is carried through unchanged (wrapped only in
    /// [`Error::Connection`], never reinterpreted).
    pub fn with_connection<T>(
        &mut self,
        f: impl FnOnce(&mut P::Connection) -> std::result::Result<T, <P::Connection as PhysicalConnection>::Error>,
    ) -> Result<T> {
        let record = self.record.as_ref().ok_or(Error::ConnectionInvalid)?;
        let mut slot = record.slot().lock().unwrap();
        if slot.epoch() != record.epoch() {
            return Err(Error::ConnectionInvalid);
        }
        let conn = slot.connection_mut().ok_or(Error::ConnectionInvalid)?;
        f(conn).map_err(|e| Error::Connection(ConnectionErrorBox::new(e)))
    }

    /// Returns the connection to the pool. Idempotent: calling `close` on
    /// an already-closed guard is a no-op, matching the proxy's "second
    /// `close()` is a no-op" contract.
    pub fn close(&mut self) {
        if let Some(record) = self.record.take() {
            self.pool.release(record);
        }
    }
}

impl<P: Provider> Drop for ConnectionGuard<P> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<P: Provider> PartialEq for ConnectionGuard<P> {
    fn eq(&self, other: &Self) -> bool {
        self.identity_hash == other.identity_hash
    }
}

impl<P: Provider> Eq for ConnectionGuard<P> {}

impl<P: Provider> Hash for ConnectionGuard<P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity_hash().hash(state)
    }
}
