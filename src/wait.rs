use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::HarvestResult;

/// Random duration in `[min, max]`. Returns `min` when the range is empty.
pub fn jitter(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let ms = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
    Duration::from_millis(ms as u64)
}

/// Sleeps for a random duration in the given range.
pub fn pause(range: (Duration, Duration)) {
    let d = jitter(range.0, range.1);
    if !d.is_zero() {
        thread::sleep(d);
    }
}

/// Polls `predicate` every `interval` until it holds or `timeout` elapses.
///
/// The predicate is checked at least once, even with a zero timeout.
/// Errors from the predicate abort the wait.
pub fn wait_until<F>(timeout: Duration, interval: Duration, mut predicate: F) -> HarvestResult<bool>
where
    F: FnMut() -> HarvestResult<bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if predicate()? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        thread::sleep(interval.min(deadline - now));
    }
}
