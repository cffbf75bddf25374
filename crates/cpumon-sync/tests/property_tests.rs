//! Property-based tests for queue invariants.
//!
//! Every operation sequence is replayed against a `VecDeque` model capped at
//! the same capacity; the queue must agree with the model after every step.

use cpumon_sync::BoundedQueue;
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Op {
    Insert(u32),
    Extract,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u32>().prop_map(Op::Insert), Just(Op::Extract)]
}

proptest! {
    #[test]
    fn test_queue_matches_fifo_model(
        capacity in 1usize..16,
        ops in prop::collection::vec(op_strategy(), 0..200),
    ) {
        let queue = BoundedQueue::new(capacity).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut model = VecDeque::new();
        let mut guard = queue.lock();

        for op in ops {
            match op {
                Op::Insert(value) => {
                    let result = guard.insert(value);
                    if model.len() < capacity {
                        prop_assert!(result.is_ok());
                        model.push_back(value);
                    } else {
                        prop_assert_eq!(result, Err(value));
                    }
                }
                Op::Extract => {
                    prop_assert_eq!(guard.extract(), model.pop_front());
                }
            }

            prop_assert_eq!(guard.len(), model.len());
            prop_assert_eq!(guard.is_empty(), model.is_empty());
            prop_assert_eq!(guard.is_full(), model.len() == capacity);
        }
    }

    #[test]
    fn test_drain_yields_insertion_order(
        capacity in 1usize..32,
        values in prop::collection::vec(any::<i64>(), 0..32),
    ) {
        let queue = BoundedQueue::new(capacity).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let accepted: Vec<i64> = {
            let mut guard = queue.lock();
            values.iter().copied().filter(|v| guard.insert(*v).is_ok()).collect()
        };

        prop_assert_eq!(accepted.len(), values.len().min(capacity));
        prop_assert_eq!(queue.drain(), accepted);
    }

    #[test]
    fn test_capacity_is_immutable(capacity in 1usize..64, fills in 0usize..128) {
        let queue = BoundedQueue::new(capacity).map_err(|e| TestCaseError::fail(e.to_string()))?;
        {
            let mut guard = queue.lock();
            for value in 0..fills {
                prop_assert_eq!(guard.insert(value).is_ok(), value < capacity);
            }
            prop_assert_eq!(guard.capacity(), capacity);
        }
        prop_assert_eq!(queue.capacity(), capacity);
    }
}
