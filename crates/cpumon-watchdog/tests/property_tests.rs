//! Property-based tests for watch registration.

use cpumon_sync::StopToken;
use cpumon_watchdog::prelude::*;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_ids_are_dense_and_capacity_is_enforced(
        capacity in 1usize..8,
        attempts in 0usize..16,
    ) {
        let config = WatchdogConfig {
            capacity,
            poll_interval: Duration::from_secs(60),
        };
        let watchdog = Watchdog::start(config)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        for i in 0..attempts {
            let result = watchdog.register_watch(format!("w{i}"), StopToken::default());
            if i < capacity {
                prop_assert_eq!(result.map(WatchId::index), Ok(i));
            } else {
                prop_assert_eq!(result, Err(WatchdogError::CapacityExceeded { capacity }));
            }
        }

        prop_assert_eq!(watchdog.watch_count(), attempts.min(capacity));
    }

    #[test]
    fn test_heartbeat_accepts_only_issued_ids(
        registered in 1usize..6,
        candidate in 0usize..12,
    ) {
        let config = WatchdogConfig {
            capacity: registered,
            poll_interval: Duration::from_secs(60),
        };
        let watchdog = Watchdog::start(config)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let mut ids = Vec::new();
        for i in 0..registered {
            ids.push(
                watchdog
                    .register_watch(format!("w{i}"), StopToken::default())
                    .map_err(|e| TestCaseError::fail(e.to_string()))?,
            );
        }

        for id in &ids {
            prop_assert!(watchdog.heartbeat(*id).is_ok());
        }

        if candidate >= registered {
            // An id from a larger watchdog is unknown to this one.
            let other = Watchdog::start(WatchdogConfig {
                capacity: candidate + 1,
                poll_interval: Duration::from_secs(60),
            })
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let mut foreign = None;
            for i in 0..=candidate {
                foreign = Some(
                    other
                        .register_watch(format!("x{i}"), StopToken::default())
                        .map_err(|e| TestCaseError::fail(e.to_string()))?,
                );
            }
            if let Some(foreign) = foreign {
                prop_assert_eq!(
                    watchdog.heartbeat(foreign),
                    Err(WatchdogError::UnknownWatch(foreign))
                );
            }
        }
    }
}
