#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chatgate::cache::availability::{AvailabilityTracker, MAX_ERRORS, RETRY_DELAY};

    #[test]
    fn test_defaults() {
        assert_eq!(MAX_ERRORS, 5);
        assert_eq!(RETRY_DELAY, Duration::from_millis(5000));

        let tracker = AvailabilityTracker::new();
        assert!(tracker.is_available());
        assert_eq!(tracker.error_count(), 0);
    }

    #[test]
    fn test_trips_at_threshold() {
        let tracker = AvailabilityTracker::new();
        for i in 1..MAX_ERRORS {
            tracker.record_error("connection refused");
            assert!(tracker.is_available(), "still available after {} errors", i);
        }
        tracker.record_error("connection refused");
        assert!(!tracker.is_available());
        assert_eq!(tracker.error_count(), MAX_ERRORS);
    }

    #[test]
    fn test_success_resets_immediately() {
        let tracker = AvailabilityTracker::new();
        for _ in 0..MAX_ERRORS {
            tracker.record_error("timeout");
        }
        assert!(!tracker.is_available());

        tracker.record_success();
        assert!(tracker.is_available());
        assert_eq!(tracker.error_count(), 0);
    }

    #[test]
    fn test_recovers_after_retry_delay() {
        let tracker = AvailabilityTracker::with_limits(2, Duration::from_millis(50));
        tracker.record_error("boom");
        tracker.record_error("boom");
        assert!(!tracker.is_available());

        std::thread::sleep(Duration::from_millis(80));
        assert!(tracker.is_available());
        assert_eq!(tracker.error_count(), 0);
    }

    #[test]
    fn test_later_errors_do_not_extend_cooldown() {
        let tracker = AvailabilityTracker::with_limits(1, Duration::from_millis(100));
        tracker.record_error("first");
        assert!(!tracker.is_available());

        std::thread::sleep(Duration::from_millis(60));
        tracker.record_error("second");
        assert!(!tracker.is_available());

        // The original deadline (100ms after the first error) still applies.
        std::thread::sleep(Duration::from_millis(60));
        assert!(tracker.is_available());
    }
}
