use std::sync::atomic::{AtomicU64, Ordering};

static DEGRADED: AtomicU64 = AtomicU64::new(0);

/// Record a degraded-input event (missing file, malformed row, bad face)
/// and keep going. The process never aborts on these; callers that care
/// can compare `count()` before and after an operation.
pub fn report(msg: &str) {
    DEGRADED.fetch_add(1, Ordering::Relaxed);
    tracing::warn!("{}", msg);
}

/// Total degraded-input events since process start. Monotonic.
pub fn count() -> u64 {
    DEGRADED.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_increments_count() {
        let before = count();
        report("test degradation");
        report("another one");
        assert!(count() >= before + 2);
    }
}
