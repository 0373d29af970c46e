use std::ops::Sub;
use std::time::Duration;

/// Decouples the connection engine from wall-clock time and randomness so
/// it can be driven deterministically in tests and by real system
/// resources in production.
///
/// # Invariants
///
/// - `now()` must be non-decreasing across calls on the same instance.
/// - `random_bytes()` must fill the entire slice; callers rely on this for
///   key material and must never see partially-filled buffers.
pub trait Environment: Clone + Send + Sync + 'static {
    /// A point in time usable for timeout bookkeeping. Must support
    /// subtraction to a [`Duration`] so elapsed time can be computed.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// The current time according to this environment.
    fn now(&self) -> Self::Instant;

    /// Fill `buf` with cryptographically secure random bytes.
    fn random_bytes(&self, buf: &mut [u8]);
}
