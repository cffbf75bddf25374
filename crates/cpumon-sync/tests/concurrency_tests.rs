//! Concurrency tests for the bounded queue and stop tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpumon_sync::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_multi_producer_multi_consumer_preserves_per_producer_order() -> TestResult {
    let queue = Arc::new(BoundedQueue::<(u32, u32)>::new(4)?);
    let stop = StopToken::new([Arc::clone(&queue) as Arc<dyn Wake>]);
    let producers: u32 = 4;
    let per_producer: u32 = 500;

    let producer_handles: Vec<_> = (0..producers)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            let stop = stop.clone();
            thread::spawn(move || {
                for seq in 0..per_producer {
                    assert!(queue.push_blocking((producer, seq), &stop).is_ok());
                }
            })
        })
        .collect();

    let consumer_handles: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let stop = stop.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(item) = queue.pop_blocking(&stop) {
                    seen.push(item);
                }
                seen
            })
        })
        .collect();

    for handle in producer_handles {
        assert!(handle.join().is_ok(), "producer panicked");
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while !queue.lock().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    stop.request_stop();

    let mut total = 0_usize;
    for handle in consumer_handles {
        let seen = handle.join().map_err(|_| "consumer panicked")?;
        total += seen.len();

        let mut last: HashMap<u32, u32> = HashMap::new();
        for (producer, seq) in seen {
            if let Some(previous) = last.insert(producer, seq) {
                assert!(seq > previous, "producer {producer} reordered");
            }
        }
    }

    assert_eq!(total, (producers * per_producer) as usize);
    assert!(queue.drain().is_empty());
    Ok(())
}

#[test]
fn test_slow_consumer_throttles_producer() -> TestResult {
    let capacity = 3;
    let queue = Arc::new(BoundedQueue::<u32>::new(capacity)?);
    let stop = StopToken::new([Arc::clone(&queue) as Arc<dyn Wake>]);

    let producer = {
        let queue = Arc::clone(&queue);
        let stop = stop.clone();
        thread::spawn(move || {
            let mut pushed = 0_u32;
            while queue.push_blocking(pushed, &stop).is_ok() {
                pushed += 1;
            }
            pushed
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(queue.lock().len() <= capacity);
    assert!(queue.lock().is_full());

    for expected in 0..10 {
        assert_eq!(queue.pop_blocking(&stop), Some(expected));
        assert!(queue.lock().len() <= capacity);
    }

    stop.request_stop();
    let pushed = producer.join().map_err(|_| "producer panicked")?;
    let residual = queue.drain();
    assert_eq!(residual.len() as u32 + 10, pushed);
    Ok(())
}

#[test]
fn test_stop_releases_every_blocked_waiter() -> TestResult {
    let queue = Arc::new(BoundedQueue::<u64>::new(1)?);
    let stop = StopToken::new([Arc::clone(&queue) as Arc<dyn Wake>]);

    let waiters: Vec<_> = (0..6)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let stop = stop.clone();
            thread::spawn(move || queue.pop_blocking(&stop))
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    assert!(stop.request_stop());

    for waiter in waiters {
        let result = waiter.join().map_err(|_| "waiter panicked")?;
        assert_eq!(result, None);
    }
    Ok(())
}

#[test]
fn test_manual_wait_loop_with_explicit_notify() -> TestResult {
    let queue = Arc::new(BoundedQueue::new(2)?);

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut guard = queue.lock();
            while guard.is_empty() {
                guard.wait_to_extract();
            }
            let item = guard.extract();
            guard.notify_insert();
            item
        })
    };

    thread::sleep(Duration::from_millis(30));
    {
        let mut guard = queue.lock();
        assert!(guard.insert("payload").is_ok());
        guard.notify_extract();
    }

    let item = consumer.join().map_err(|_| "consumer panicked")?;
    assert_eq!(item, Some("payload"));
    Ok(())
}
