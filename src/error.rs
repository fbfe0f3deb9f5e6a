//! Error and Result types.

use std::fmt::{self, Debug, Display};

/// A type-erased error from a caller-supplied [`PhysicalConnection`][crate::conn::PhysicalConnection].
///
/// The pool never interprets this error; it is carried through unchanged so
/// callers see the driver's native failure, not a pool-internal wrapper.
pub struct ConnectionErrorBox(Box<dyn std::error::Error + Send + Sync + 'static>);

impl ConnectionErrorBox {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(err))
    }
}

impl Debug for ConnectionErrorBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for ConnectionErrorBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ConnectionErrorBox {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong acquiring, using, or returning a pooled connection.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// `acquire` exhausted its local bad-connection retry budget
    /// (`max_idle + local_bad_tolerance + 1` consecutive bad candidates).
    #[error("could not get a good connection: {0} consecutive bad connections")]
    CouldNotGetGoodConnection(u32),

    /// A forwarded operation was attempted on a handle the pool has already
    /// recycled, reclaimed, or force-closed.
    #[error("connection is invalid")]
    ConnectionInvalid,

    /// The pool was shut down while a thread was waiting in `acquire`.
    ///
    /// This is the synchronous analogue of the reference design's "interruption":
    /// there is no cooperative interrupt signal on a condvar wait in Rust, so a
    /// pool shutdown wakes every waiter, which then abandons its acquire cleanly.
    #[error("acquire abandoned: pool is shutting down")]
    Interrupted,

    /// The provider's `open()` failed.
    #[error("failed to open a new connection")]
    Open(#[source] ConnectionErrorBox),

    /// A forwarded operation on the underlying connection failed.
    #[error("connection operation failed")]
    Connection(#[source] ConnectionErrorBox),
}
