use chrono::{DateTime, Utc};

/// Source of "now" for the engine, so status derivation and default
/// check-in/out instants stay testable.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Settable clock for tests. Clones share the same instant.
    #[derive(Clone)]
    pub struct FixedClock(Arc<Mutex<DateTime<Utc>>>);

    impl FixedClock {
        pub fn at(instant: DateTime<Utc>) -> Self {
            Self(Arc::new(Mutex::new(instant)))
        }

        pub fn set(&self, instant: DateTime<Utc>) {
            *self.0.lock().unwrap() = instant;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }
}
