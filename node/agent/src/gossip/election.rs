use std::time::Duration;

use rand::Rng;

/// A random backoff strictly less than `interval`, so a claim never races
/// past the next scheduled heartbeat (§4.2).
pub fn election_backoff(interval: Duration) -> Duration {
    if interval.is_zero() {
        return Duration::ZERO;
    }
    let millis = interval.as_millis().max(1) as u64;
    let backoff_millis = rand::thread_rng().gen_range(0..millis);
    Duration::from_millis(backoff_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_never_reaches_interval() {
        let interval = Duration::from_millis(1000);
        for _ in 0..500 {
            assert!(election_backoff(interval) < interval);
        }
    }
}
