//! Concurrency tests: subscribe/append races, slow subscribers and
//! unsubscribe during publish.

use resendpit::{CaptureStore, CapturedEmail, MailEvent, Provider, SubscriptionConfig};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const APPENDS: usize = 2_000;
const SUBSCRIBERS: usize = 8;

fn email(n: usize) -> CapturedEmail {
    CapturedEmail::new(
        Provider::Resend,
        "app@example.com",
        vec!["user@example.com".to_string()],
        n.to_string(),
    )
}

fn number(email: &CapturedEmail) -> usize {
    email.subject.parse().unwrap()
}

/// Every subscriber sees every email exactly once, in its snapshot or as a
/// live event, regardless of when it subscribed.
#[test]
fn test_subscribe_during_appends_is_exactly_once() {
    let store = Arc::new(CaptureStore::with_capacity(APPENDS));
    let barrier = Arc::new(Barrier::new(SUBSCRIBERS + 1));

    let writer = {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..APPENDS {
                store.append(email(i));
                if i % 100 == 0 {
                    thread::yield_now();
                }
            }
        })
    };

    let readers: Vec<_> = (0..SUBSCRIBERS)
        .map(|n| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // Stagger subscriptions across the write burst.
                thread::sleep(Duration::from_micros(50 * n as u64));
                store.subscribe(SubscriptionConfig {
                    buffer_size: APPENDS + 1,
                })
            })
        })
        .collect();

    let subscriptions: Vec<_> = readers.into_iter().map(|r| r.join().unwrap()).collect();
    writer.join().unwrap();

    for (handle, init) in subscriptions {
        let MailEvent::Init { emails } = init else {
            panic!("Expected Init event");
        };

        let snapshot: Vec<usize> = emails.iter().map(|e| number(e)).collect();
        let live: Vec<usize> = handle
            .receiver
            .try_iter()
            .map(|event| match event {
                MailEvent::Added { email } => number(&email),
                other => panic!("Unexpected event {:?}", other),
            })
            .collect();

        // Snapshot is newest first, live events oldest first, and they meet
        // without a gap.
        assert!(snapshot.windows(2).all(|w| w[0] == w[1] + 1));
        assert!(live.windows(2).all(|w| w[0] + 1 == w[1]));
        let next_live = snapshot.first().map(|n| n + 1).unwrap_or(0);
        assert_eq!(live.first().copied().unwrap_or(APPENDS), next_live);

        let mut seen = HashSet::new();
        for n in snapshot.iter().chain(live.iter()) {
            assert!(seen.insert(*n), "email {} delivered twice", n);
        }
        assert_eq!(seen.len(), APPENDS, "some emails were never delivered");
    }
}

/// Subscribing concurrently with clears never yields a stale snapshot
/// followed by a missing clear.
#[test]
fn test_subscribe_during_clears_is_consistent() {
    let store = Arc::new(CaptureStore::with_capacity(100));

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..500 {
                store.append(email(i));
                if i % 10 == 9 {
                    store.clear();
                }
            }
        })
    };

    let mut subscriptions = Vec::new();
    while !writer.is_finished() {
        subscriptions.push(store.subscribe(SubscriptionConfig { buffer_size: 1_000 }));
        thread::yield_now();
    }
    writer.join().unwrap();

    let final_state: Vec<usize> = store.snapshot().iter().map(|e| number(e)).collect();

    // Replaying snapshot plus live events reproduces the final mailbox.
    for (handle, init) in subscriptions {
        let MailEvent::Init { emails } = init else {
            panic!("Expected Init event");
        };
        let mut replica: Vec<usize> = emails.iter().map(|e| number(e)).collect();
        for event in handle.receiver.try_iter() {
            match event {
                MailEvent::Added { email } => replica.insert(0, number(&email)),
                MailEvent::Cleared => replica.clear(),
                other => panic!("Unexpected event {:?}", other),
            }
        }
        assert_eq!(replica, final_state);
    }
}

/// A stalled subscriber is dropped without slowing the writer or a healthy
/// subscriber.
#[test]
fn test_stalled_subscriber_does_not_block_healthy_one() {
    let store = Arc::new(CaptureStore::with_capacity(50));
    let (stalled, _) = store.subscribe(SubscriptionConfig { buffer_size: 4 });
    let (healthy, _) = store.subscribe(SubscriptionConfig { buffer_size: 1_024 });

    let reader = thread::spawn(move || {
        let mut received = 0;
        let mut worst = Duration::ZERO;
        while received < 500 {
            let start = Instant::now();
            match healthy.recv_timeout(Duration::from_secs(5)) {
                Ok(MailEvent::Added { .. }) => received += 1,
                other => panic!("Unexpected {:?}", other),
            }
            worst = worst.max(start.elapsed());
        }
        (received, worst)
    });

    let start = Instant::now();
    for i in 0..500 {
        store.append(email(i));
    }
    let write_time = start.elapsed();

    let (received, worst) = reader.join().unwrap();
    assert_eq!(received, 500);
    assert!(worst < Duration::from_secs(1), "healthy subscriber waited {:?}", worst);
    assert!(write_time < Duration::from_secs(5));

    assert!(!store.hub().contains(stalled.id));
    assert_eq!(store.hub().subscriber_count(), 1);
}

/// Unsubscribing while another thread publishes neither deadlocks nor
/// errors for the publisher.
#[test]
fn test_unsubscribe_during_publish() {
    let store = Arc::new(CaptureStore::with_capacity(20));

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..1_000 {
                store.append(email(i));
            }
        })
    };

    for _ in 0..200 {
        let (handle, _) = store.subscribe(SubscriptionConfig::default());
        store.unsubscribe(handle.id);
        store.unsubscribe(handle.id);
    }

    writer.join().unwrap();
    assert_eq!(store.hub().subscriber_count(), 0);
    assert_eq!(store.count(), 20);
}
