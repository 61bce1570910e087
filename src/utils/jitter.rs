//! Jitter for reconnect delays

use std::time::Duration;

/// Random jitter between 0 and `max_jitter_ms` (inclusive)
///
/// ```
/// use livestats::utils::jitter::generate_jitter_ms;
///
/// let jitter = generate_jitter_ms(100);
/// assert!(jitter <= 100);
/// ```
pub fn generate_jitter_ms(max_jitter_ms: u64) -> u64 {
    if max_jitter_ms == 0 {
        return 0;
    }
    fastrand::u64(0..=max_jitter_ms)
}

/// Add up to `jitter_percent` of `base` on top of it
///
/// ```
/// use std::time::Duration;
/// use livestats::utils::jitter::with_jitter;
///
/// let delay = with_jitter(Duration::from_millis(1000), 25);
/// assert!(delay >= Duration::from_millis(1000));
/// assert!(delay <= Duration::from_millis(1250));
/// ```
pub fn with_jitter(base: Duration, jitter_percent: u8) -> Duration {
    if jitter_percent == 0 || base.is_zero() {
        return base;
    }

    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let max_jitter = base_ms.saturating_mul(u64::from(jitter_percent)) / 100;
    base + Duration::from_millis(generate_jitter_ms(max_jitter))
}
