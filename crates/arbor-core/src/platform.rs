//! Host hooks for waking whatever drives the dispatch loop.
//!
//! The engine never spins on its own; after every enqueue the producer handle
//! pokes the host so it can schedule a `consume` (a frame callback, a condvar,
//! a blocking receive...).

/// Notified whenever new work lands in the event queue.
///
/// Implementations are called from producer threads and must be cheap and
/// non-blocking.
pub trait EngineScheduler: Send + Sync {
    /// Request that the host run a consume cycle soon.
    fn schedule_consume(&self);
}

/// Scheduler for hosts that poll the engine themselves.
#[derive(Debug, Default)]
pub struct DefaultScheduler;

impl EngineScheduler for DefaultScheduler {
    fn schedule_consume(&self) {}
}
