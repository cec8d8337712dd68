// Flush outcome reporting.
//
// A flush favors availability over atomicity across the side stores:
// counter, cache and fan-out failures are recorded per effect instead of
// aborting the batch, and tests assert on the recorded failures rather
// than on log output.

/// Best-effort side effects that run after a successful bulk insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    CounterIncrement,
    CacheInvalidation,
    NotificationEnqueue,
}

impl std::fmt::Display for SideEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SideEffect::CounterIncrement => write!(f, "counter-increment"),
            SideEffect::CacheInvalidation => write!(f, "cache-invalidation"),
            SideEffect::NotificationEnqueue => write!(f, "notification-enqueue"),
        }
    }
}

/// One side effect that was attempted and failed. The batch itself stays
/// applied; the affected store heals through the read path's degradation.
#[derive(Debug, Clone)]
pub struct SoftFailure {
    pub effect: SideEffect,
    pub detail: String,
}

/// What a single flush accomplished.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Records durably written to the primary store.
    pub applied: usize,
    /// Jobs dropped because their parent was deleted between enqueue and
    /// flush. Never surfaced to the caller - the API already answered 202.
    pub dropped_missing_parent: usize,
    /// Records rejected by a uniqueness constraint.
    pub duplicates: usize,
    pub soft_failures: Vec<SoftFailure>,
}

impl ApplyReport {
    pub fn record_soft_failure(&mut self, effect: SideEffect, detail: impl std::fmt::Display) {
        self.soft_failures.push(SoftFailure {
            effect,
            detail: detail.to_string(),
        });
    }

    pub fn has_soft_failure(&self, effect: SideEffect) -> bool {
        self.soft_failures.iter().any(|f| f.effect == effect)
    }
}
