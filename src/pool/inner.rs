//! The synchronized state container and the acquire/release/force-close-all
//! algorithms, implemented with `std::sync::{Mutex, Condvar}` per the
//! "condvar wait with bounded timeout and notify-all" redesign note.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::conn::{PhysicalConnection, Provider};
use crate::error::{ConnectionErrorBox, Error, Result};
use crate::identity;
use crate::pool::guard::ConnectionGuard;
use crate::pool::options::PoolOptions;
use crate::pool::stats::PoolStats;

/// Holds a physical connection plus the generation counter that gives a
/// [`ConnectionGuard`] a way to detect, without help from the pool mutex,
/// that the connection underneath it has been reclaimed, recycled, or
/// force-closed.
///
/// This stands in for the reference design's aliased-object-reference
/// trick (two Java wrapper objects pointing at the same connection, one
/// live and one dead): here the pool and an outstanding guard share one
/// `Arc<Mutex<Slot<C>>>`, and bump `epoch` every time a handle referencing
/// it is invalidated.
pub(crate) struct Slot<C> {
    conn: Option<C>,
    epoch: u64,
}

impl<C> Slot<C> {
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn is_occupied(&self) -> bool {
        self.conn.is_some()
    }

    pub(crate) fn connection_mut(&mut self) -> Option<&mut C> {
        self.conn.as_mut()
    }
}

/// A pool-internal record of one handle: a slot plus the epoch it was
/// minted at, and the bookkeeping timestamps the design tracks per handle.
///
/// Cloning a record never clones the connection — only the `Arc` pointer to
/// its slot — so pushing the same physical connection into two places
/// (e.g. active, then later idle after recycling) is cheap and intentional.
pub(crate) struct ConnectionRecord<C> {
    slot: Arc<Mutex<Slot<C>>>,
    epoch: u64,
    type_code: u64,
    identity_hash: u64,
    created_at: Instant,
    last_used_at: Instant,
    checked_out_at: Option<Instant>,
}

impl<C> Clone for ConnectionRecord<C> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            epoch: self.epoch,
            type_code: self.type_code,
            identity_hash: self.identity_hash,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            checked_out_at: self.checked_out_at,
        }
    }
}

impl<C: PhysicalConnection> ConnectionRecord<C> {
    pub(crate) fn identity_hash(&self) -> u64 {
        self.identity_hash
    }

    pub(crate) fn slot(&self) -> &Arc<Mutex<Slot<C>>> {
        &self.slot
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Default, Debug, Clone, Copy)]
struct Counters {
    request_count: u64,
    had_to_wait_count: u64,
    accumulated_request_time: Duration,
    accumulated_wait_time: Duration,
    accumulated_checkout_time: Duration,
    bad_connection_count: u64,
    claimed_overdue_connection_count: u64,
    accumulated_checkout_time_of_overdue_connections: Duration,
}

struct State<C> {
    idle: VecDeque<ConnectionRecord<C>>,
    active: VecDeque<ConnectionRecord<C>>,
    options: PoolOptions,
    url: String,
    user: Option<String>,
    password: Option<String>,
    expected_type_code: u64,
    closed: bool,
    counters: Counters,
}

/// The shared, synchronized guts of a [`Pool`][super::Pool].
///
/// `options`/`url`/`user`/`password` live inside the same `Mutex<State>` as
/// the idle/active lists, not in their own lock: `Pool` only ever holds an
/// `Arc<PoolInner<P>>`, so any mutable configuration has to go through
/// interior mutability, and a second lock here would just be another lock
/// to reason about for no benefit, since every setter already needs to
/// touch `expected_type_code` and drain both lists together.
pub(crate) struct PoolInner<P: Provider> {
    provider: P,
    state: Mutex<State<P::Connection>>,
    condvar: Condvar,
}

impl<P: Provider> PoolInner<P> {
    pub(crate) fn new(
        provider: P,
        options: PoolOptions,
        url: String,
        user: Option<String>,
        password: Option<String>,
    ) -> Self {
        let expected_type_code = identity::fingerprint(&url, user.as_deref(), password.as_deref());
        Self {
            provider,
            state: Mutex::new(State {
                idle: VecDeque::new(),
                active: VecDeque::new(),
                options,
                url,
                user,
                password,
                expected_type_code,
                closed: false,
                counters: Counters::default(),
            }),
            condvar: Condvar::new(),
        }
    }

    pub(crate) fn options(&self) -> PoolOptions {
        self.state.lock().unwrap().options.clone()
    }

    pub(crate) fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    /// Acquires a connection, looping through the idle / grow / reclaim /
    /// wait decision tree until a validated handle is obtained or the local
    /// bad-connection budget is exhausted.
    ///
    /// The whole decision body runs under the pool mutex, including the
    /// provider's `open()` call and the liveness probe's I/O — the
    /// reference design's default, simpler-to-reason-about choice (see
    /// `DESIGN.md`), at the cost of serializing connects and probes across
    /// threads. The single suspension point that releases the mutex is the
    /// bounded condvar wait.
    ///
    /// Takes `pool` as a plain `&Arc<Self>` parameter rather than a custom
    /// `self` receiver: stable Rust only special-cases `Box`/`Rc`/`Arc`
    /// *by value* as receiver types, not a reference to one, and this needs
    /// to hand a cheaply-cloned `Arc` to the returned [`ConnectionGuard`]
    /// without consuming the caller's own `Arc<PoolInner<P>>`.
    pub(crate) fn acquire(pool: &Arc<Self>) -> Result<ConnectionGuard<P>> {
        let request_start = Instant::now();
        let mut local_bad_count: u32 = 0;

        let mut state = pool.state.lock().unwrap();

        loop {
            if state.closed {
                return Err(Error::Interrupted);
            }

            let candidate = if let Some(rec) = state.idle.pop_front() {
                log::trace!("acquire: took candidate from idle");
                Some(rec)
            } else if (state.active.len() as u32) < state.options.max_active {
                log::trace!("acquire: opening a new connection (active below max_active)");
                match pool.provider.open() {
                    Ok(conn) => {
                        let identity_hash = conn.identity_hash();
                        let now = Instant::now();
                        let slot = Arc::new(Mutex::new(Slot { conn: Some(conn), epoch: 0 }));
                        Some(ConnectionRecord {
                            slot,
                            epoch: 0,
                            type_code: state.expected_type_code,
                            identity_hash,
                            created_at: now,
                            last_used_at: now,
                            checked_out_at: None,
                        })
                    }
                    Err(e) => return Err(Error::Open(ConnectionErrorBox::new(e))),
                }
            } else if let Some(checkout_duration) = state.active.front().map(|oldest| {
                oldest.checked_out_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
            }) {
                if checkout_duration > state.options.max_checkout {
                    let reclaimed = state.active.pop_front().expect("front() just matched");
                    state.counters.claimed_overdue_connection_count += 1;
                    state.counters.accumulated_checkout_time_of_overdue_connections += checkout_duration;
                    state.counters.accumulated_checkout_time += checkout_duration;
                    log::trace!("acquire: reclaiming overdue active connection");

                    let new_epoch = {
                        let mut slot = reclaimed.slot.lock().unwrap();
                        slot.epoch += 1;
                        if let Some(conn) = slot.conn.as_mut() {
                            if !conn.get_auto_commit() {
                                if let Err(e) = conn.rollback() {
                                    log::debug!(
                                        "rollback during reclaim failed, reusing connection anyway: {e}"
                                    );
                                }
                            }
                        }
                        slot.epoch
                    };

                    Some(ConnectionRecord {
                        slot: Arc::clone(&reclaimed.slot),
                        epoch: new_epoch,
                        type_code: reclaimed.type_code,
                        identity_hash: reclaimed.identity_hash,
                        created_at: reclaimed.created_at,
                        last_used_at: reclaimed.last_used_at,
                        checked_out_at: None,
                    })
                } else {
                    None
                }
            } else {
                None
            };

            let mut candidate = match candidate {
                Some(c) => c,
                None => {
                    state.counters.had_to_wait_count += 1;
                    let wait_start = Instant::now();
                    let wait_duration = state.options.wait;
                    let (new_state, timed_out) =
                        pool.condvar.wait_timeout(state, wait_duration).unwrap();
                    state = new_state;
                    state.counters.accumulated_wait_time += wait_start.elapsed();

                    if state.closed {
                        return Err(Error::Interrupted);
                    }
                    if timed_out.timed_out() {
                        log::trace!("acquire: wait timed out, retrying decision tree");
                    }
                    continue;
                }
            };

            // Validate candidate (still under the pool mutex, see above).
            let now = Instant::now();
            let is_live = {
                let mut slot = candidate.slot.lock().unwrap();
                if slot.epoch != candidate.epoch || slot.conn.is_none() {
                    false
                } else {
                    let conn = slot.conn.as_mut().expect("checked is_none above");
                    let live = state.options.probe.check(conn, candidate.last_used_at, now);
                    if live && !conn.get_auto_commit() {
                        if let Err(e) = conn.rollback() {
                            log::debug!("rollback before handing out connection failed: {e}");
                        }
                    }
                    live
                }
            };

            if is_live {
                candidate.type_code = state.expected_type_code;
                candidate.checked_out_at = Some(now);
                candidate.last_used_at = now;

                state.active.push_back(candidate.clone());
                state.counters.request_count += 1;
                state.counters.accumulated_request_time += request_start.elapsed();

                return Ok(ConnectionGuard::new(Arc::clone(pool), candidate));
            }

            // Bad candidate: discard and retry.
            {
                let mut slot = candidate.slot.lock().unwrap();
                slot.epoch += 1;
                if let Some(mut conn) = slot.conn.take() {
                    if let Err(e) = conn.close() {
                        log::debug!("error closing bad candidate connection: {e}");
                    }
                }
            }
            state.counters.bad_connection_count += 1;
            local_bad_count += 1;

            if local_bad_count > state.options.max_idle + state.options.local_bad_tolerance {
                return Err(Error::CouldNotGetGoodConnection(local_bad_count));
            }
        }
    }

    /// Returns a handle to the pool. Called by [`ConnectionGuard::close`]
    /// and on drop; never panics or propagates an error to the caller, per
    /// the "release never throws" rule.
    pub(crate) fn release(&self, record: ConnectionRecord<P::Connection>) {
        let mut state = self.state.lock().unwrap();

        let position = state
            .active
            .iter()
            .position(|r| Arc::ptr_eq(&r.slot, &record.slot) && r.epoch == record.epoch);

        let Some(position) = position else {
            // Already reclaimed out from under this handle, or never
            // tracked as active (a clean double-release no-op would also
            // land here, but `ConnectionGuard` already guards against that).
            state.counters.bad_connection_count += 1;
            return;
        };

        let active_record = state.active.remove(position).expect("position just matched");
        let checkout_duration = active_record
            .checked_out_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);
        state.counters.accumulated_checkout_time += checkout_duration;

        let mut slot = active_record.slot.lock().unwrap();
        if slot.epoch != active_record.epoch || slot.conn.is_none() {
            state.counters.bad_connection_count += 1;
            return;
        }

        let recycle = (state.idle.len() as u32) < state.options.max_idle
            && active_record.type_code == state.expected_type_code;

        if recycle {
            if let Some(conn) = slot.conn.as_mut() {
                if !conn.get_auto_commit() {
                    if let Err(e) = conn.rollback() {
                        log::debug!("rollback on release failed: {e}");
                    }
                }
            }
            slot.epoch += 1;
            let new_epoch = slot.epoch;
            drop(slot);

            state.idle.push_back(ConnectionRecord {
                slot: Arc::clone(&active_record.slot),
                epoch: new_epoch,
                type_code: active_record.type_code,
                identity_hash: active_record.identity_hash,
                created_at: active_record.created_at,
                last_used_at: Instant::now(),
                checked_out_at: None,
            });

            drop(state);
            self.condvar.notify_all();
        } else {
            if let Some(conn) = slot.conn.as_mut() {
                if !conn.get_auto_commit() {
                    if let Err(e) = conn.rollback() {
                        log::debug!("rollback before closing released connection failed: {e}");
                    }
                }
            }
            if let Some(mut conn) = slot.conn.take() {
                if let Err(e) = conn.close() {
                    log::debug!("error closing released connection: {e}");
                }
            }
            slot.epoch += 1;
        }
    }

    /// Shuts the pool down permanently: drains and closes every idle and
    /// active physical connection, wakes every waiter in `acquire` so each
    /// abandons with [`Error::Interrupted`] instead of looping forever, and
    /// marks the pool closed so any later `acquire` fails immediately.
    ///
    /// This is the explicit replacement the design notes (spec.md §9,
    /// "Finalizer fallback") ask for in place of relying on a finalizer:
    /// `Drop` still does best-effort idle cleanup for a pool that is simply
    /// leaked, but a caller that wants a clean, synchronous teardown should
    /// call this instead.
    pub(crate) fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        state.closed = true;

        let mut drained = 0u32;
        for record in state.idle.drain(..) {
            close_record(&record);
            drained += 1;
        }
        for record in state.active.drain(..) {
            close_record(&record);
            drained += 1;
        }

        drop(state);
        self.condvar.notify_all();
        log::info!("shutdown drained {drained} connections");
    }

    /// Invalidates every handle, rolls back and closes every physical
    /// connection, and recomputes `expected_type_code` from the pool's
    /// current `(url, user, password)`. Called by every configuration
    /// mutator except `local_bad_tolerance`.
    pub(crate) fn force_close_all(&self) {
        let mut state = self.state.lock().unwrap();

        let mut drained = 0u32;
        for record in state.idle.drain(..) {
            close_record(&record);
            drained += 1;
        }
        for record in state.active.drain(..) {
            close_record(&record);
            drained += 1;
        }

        state.expected_type_code =
            identity::fingerprint(&state.url, state.user.as_deref(), state.password.as_deref());

        drop(state);
        self.condvar.notify_all();
        log::info!("force_close_all drained {drained} connections");
    }

    pub(crate) fn set_url(&self, url: String) {
        self.state.lock().unwrap().url = url;
        self.force_close_all();
    }

    pub(crate) fn set_user(&self, user: Option<String>) {
        self.state.lock().unwrap().user = user;
        self.force_close_all();
    }

    pub(crate) fn set_password(&self, password: Option<String>) {
        self.state.lock().unwrap().password = password;
        self.force_close_all();
    }

    pub(crate) fn set_max_active(&self, max: u32) {
        self.state.lock().unwrap().options.max_active = max;
        self.force_close_all();
    }

    pub(crate) fn set_max_idle(&self, max: u32) {
        self.state.lock().unwrap().options.max_idle = max;
        self.force_close_all();
    }

    pub(crate) fn set_max_checkout(&self, duration: Duration) {
        self.state.lock().unwrap().options.max_checkout = duration;
        self.force_close_all();
    }

    pub(crate) fn set_wait(&self, duration: Duration) {
        self.state.lock().unwrap().options.wait = duration;
        self.force_close_all();
    }

    pub(crate) fn set_ping(&self, enabled: bool, query: String, idle_threshold: Option<Duration>) {
        {
            let mut state = self.state.lock().unwrap();
            state.options.probe.enabled = enabled;
            state.options.probe.query = query;
            state.options.probe.idle_threshold = idle_threshold;
        }
        self.force_close_all();
    }

    /// The sole setter that does not force-close the pool: it only affects
    /// per-`acquire` retry bookkeeping, never handed-out handles.
    pub(crate) fn set_local_bad_tolerance(&self, tolerance: u32) {
        self.state.lock().unwrap().options.local_bad_tolerance = tolerance;
    }

    pub(crate) fn pool_stats(&self) -> PoolStats {
        let state = self.state.lock().unwrap();
        PoolStats {
            active_count: state.active.len(),
            idle_count: state.idle.len(),
            request_count: state.counters.request_count,
            had_to_wait_count: state.counters.had_to_wait_count,
            accumulated_request_time: state.counters.accumulated_request_time,
            accumulated_wait_time: state.counters.accumulated_wait_time,
            accumulated_checkout_time: state.counters.accumulated_checkout_time,
            bad_connection_count: state.counters.bad_connection_count,
            claimed_overdue_connection_count: state.counters.claimed_overdue_connection_count,
            accumulated_checkout_time_of_overdue_connections: state
                .counters
                .accumulated_checkout_time_of_overdue_connections,
        }
    }
}

fn close_record<C: PhysicalConnection>(record: &ConnectionRecord<C>) {
    let mut slot = record.slot.lock().unwrap();
    slot.epoch += 1;
    if let Some(mut conn) = slot.conn.take() {
        if !conn.get_auto_commit() {
            if let Err(e) = conn.rollback() {
                log::debug!("rollback during force_close_all failed: {e}");
            }
        }
        if let Err(e) = conn.close() {
            log::debug!("error closing connection during force_close_all: {e}");
        }
    }
}

impl<P: Provider> Drop for PoolInner<P> {
    /// Best-effort cleanup if the pool is dropped with connections still
    /// idle. Not a correctness mechanism — an escape hatch, per the design's
    /// finalization note. Active connections whose guards are still alive
    /// elsewhere are left for those guards to close on their own drop.
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            for record in state.idle.drain(..) {
                close_record(&record);
            }
        }
    }
}
