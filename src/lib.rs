//! A synchronous, thread-safe database connection pool.
//!
//! Modeled on a widely used Java connection pool's design: a bounded set of
//! physical connections, handed out as recyclable handles, with idle-time
//! liveness probing and overdue-checkout reclamation instead of a
//! background eviction thread. See `DESIGN.md` for the full grounding
//! ledger and the choices made translating that design into Rust.
//!
//! # Scope
//!
//! This crate owns connection lifecycle only: opening, validating,
//! checking out, reclaiming, and closing physical connections. It has no
//! opinion on SQL execution, result-set decoration, or how a [`Provider`]
//! actually talks to a database — that's the caller's [`PhysicalConnection`]
//! implementation.

mod cache_key;
mod conn;
mod error;
mod identity;
mod pool;
mod probe;

pub use cache_key::{CacheComponent, CacheItem, CacheKey};
pub use conn::{PhysicalConnection, Provider};
pub use error::{ConnectionErrorBox, Error, Result};
pub use identity::fingerprint;
pub use pool::{ConnectionGuard, Pool, PoolOptions, PoolStats};
pub use probe::LivenessProbe;
