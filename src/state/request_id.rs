use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation ids for proxy log lines: a random per-process seed mixed with a counter.
pub(crate) struct RequestIds {
    seed: u128,
    issued: AtomicU64,
}

impl RequestIds {
    pub(crate) fn new() -> Self {
        let seed = (u128::from(fastrand::u64(..)) << 64) | u128::from(fastrand::u64(..));
        Self {
            seed,
            issued: AtomicU64::new(0),
        }
    }

    pub(crate) fn next(&self) -> uuid::Uuid {
        let seq = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        uuid::Uuid::from_u128(self.seed ^ u128::from(seq))
    }
}
