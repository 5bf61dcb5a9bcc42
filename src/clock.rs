//! Monotonic UTC timestamps and opaque unique identifiers, injected
//! everywhere a component needs "now" or a fresh id so tests can swap in a
//! fixed clock (spec.md §2 "Clock / ID provider").

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn new_id(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

    /// A clock with a fixed, advancing timestamp and a sequential id
    /// counter, for deterministic pipeline tests.
    pub struct FixedClock {
        millis: AtomicI64,
        counter: AtomicU64,
    }

    impl FixedClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                millis: AtomicI64::new(start.timestamp_millis()),
                counter: AtomicU64::new(0),
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            let ms = self.millis.fetch_add(1, Ordering::SeqCst);
            DateTime::from_timestamp_millis(ms).unwrap()
        }

        fn new_id(&self) -> String {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            format!("test-id-{n}")
        }
    }
}
