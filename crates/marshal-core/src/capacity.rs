use std::sync::atomic::{AtomicI64, Ordering};

/// The advisory, cross-process capacity scoreboard.
///
/// The Governor is the only writer; `has_capacity` readers (the HTTP
/// adapter, sidecars) only read. Reading a positive value does not reserve
/// a slot — see the admission race discussion in the design notes.
#[derive(Debug, Default)]
pub struct CapacityCounter(AtomicI64);

impl CapacityCounter {
    pub fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    /// Recomputed by the Governor on every loop tick. Never stores a
    /// negative value (invariant I3).
    pub fn set(&self, value: i64) {
        self.0.store(value.max(0), Ordering::SeqCst);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn has_capacity(&self) -> bool {
        self.get() > 0
    }
}
