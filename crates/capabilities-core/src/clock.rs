//! Clock capability: injected so the dialer's business-hours/rate-limit
//! gates and the conversation engine's turn timestamps can be driven by
//! tests rather than wall-clock time.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct FixedClock(AtomicI64);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(self.0.load(Ordering::SeqCst), 0).expect("valid timestamp")
        }
    }

    #[test]
    fn fixed_clock_can_be_advanced_for_tests() {
        let clock = FixedClock(AtomicI64::new(1_000));
        let first = clock.now();
        clock.0.store(2_000, Ordering::SeqCst);
        let second = clock.now();
        assert!(second > first);
    }

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = clock.now();
        assert!(second >= first);
    }
}
