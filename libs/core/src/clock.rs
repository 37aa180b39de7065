use std::sync::Arc;

use time::OffsetDateTime;

/// Source of wall-clock time for a turn. TTL math everywhere goes through it so
/// tests can drive expiry without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    fn now_unix_ms(&self) -> i64 {
        unix_ms(self.now())
    }
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

pub fn unix_ms(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}
