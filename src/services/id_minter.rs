use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::models::RequestId;

/// Hands out request ids from the nanosecond clock, bumped by one whenever
/// the clock has not moved (or moved backwards) since the last id.
#[derive(Debug, Default)]
pub struct IdMinter {
    last: AtomicI64,
}

impl IdMinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> RequestId {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|p| p);
        RequestId(now.max(prev + 1))
    }

    /// Make sure future ids land above one already in storage.
    pub fn observe(&self, id: RequestId) {
        self.last.fetch_max(id.0, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_increasing() {
        let m = IdMinter::new();
        let mut prev = m.next();
        for _ in 0..10_000 {
            let id = m.next();
            assert!(id > prev);
            prev = id;
        }
    }

    #[test]
    fn observed_ids_are_never_reissued() {
        let m = IdMinter::new();
        let far = RequestId(i64::MAX / 2);
        m.observe(far);
        assert!(m.next() > far);
    }
}
