//! The capability set the pool requires of a driver connection, and of the
//! provider that creates them.
//!
//! The reference design proxies a driver's own connection interface at
//! runtime and intercepts `close` by name. Rust has no cheap equivalent, so
//! the driver surface the pool actually touches is made explicit here, and
//! [`crate::ConnectionGuard`] forwards to it by hand.

/// The provider-owned object that talks to the database.
///
/// The pool never inspects a connection beyond this surface.
pub trait PhysicalConnection: Send + 'static {
    /// The error type this connection's operations can fail with. Propagated
    /// to callers unchanged, wrapped only in [`crate::Error::Connection`].
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether the connection has already been closed (by the driver, the
    /// server, or a prior call to [`close`][Self::close]).
    fn is_closed(&self) -> Result<bool, Self::Error>;

    /// Whether the connection is currently in auto-commit mode.
    fn get_auto_commit(&self) -> bool;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> Result<(), Self::Error>;

    /// Close the connection. Idempotent from the pool's perspective: it is
    /// only ever called once per physical connection's lifetime.
    fn close(&mut self) -> Result<(), Self::Error>;

    /// Execute `sql` and discard the result. Used only for the liveness
    /// probe's ping query.
    fn create_statement(&mut self, sql: &str) -> Result<(), Self::Error>;

    /// A stable integer identity for this connection, analogous to a
    /// pointer identity hash. Used to define [`ConnectionGuard`][crate::ConnectionGuard]
    /// equality and as the diagnostic "physical connection id".
    fn identity_hash(&self) -> u64;
}

/// The raw connection factory the pool draws from.
///
/// Out of scope per the pool's design: how a provider is configured, how it
/// authenticates, and anything about the wire protocol it speaks.
pub trait Provider: Send + Sync + 'static {
    type Connection: PhysicalConnection;

    /// Open a new physical connection. May block; may fail. Errors propagate
    /// out of [`Pool::acquire`][crate::Pool::acquire] immediately.
    fn open(&self) -> Result<Self::Connection, <Self::Connection as PhysicalConnection>::Error>;
}
