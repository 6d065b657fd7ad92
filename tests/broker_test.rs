//! Integration tests for ResourceBroker
//!
//! These tests exercise the broker under real concurrency:
//! - Immediate acquisition and direct handoff to waiters
//! - Exclusivity with many competing tasks
//! - Per-id FIFO fairness
//! - Cancellation, timeouts and unregistration during a wait
//! - Waiter FIFO backpressure without polling
//! - `acquire_any` priority ranking

use prometheus_broker::config::BrokerConfig;
use prometheus_broker::core::{BrokerError, PriorityOrder, ResourceBroker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

type Broker = ResourceBroker<&'static str, Arc<String>>;

fn make_broker(max_resources: usize, waiter_capacity: usize) -> Arc<Broker> {
    let config = BrokerConfig::new()
        .with_max_resources(max_resources)
        .with_waiter_capacity(waiter_capacity)
        .with_order(PriorityOrder::Ascending);
    Arc::new(ResourceBroker::new(config).unwrap())
}

fn device(name: &str) -> Arc<String> {
    Arc::new(format!("device:{name}"))
}

/// Wait until `n` callers are queued across the broker.
async fn wait_for_waiters(broker: &Broker, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while broker.stats().waiting != n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("waiters never queued");
}

// ============================================================================
// BASIC HANDOFF
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_acquire_blocks_until_release() {
    let broker = make_broker(4, 4);
    let r = device("x");
    broker.register("x", Arc::clone(&r)).unwrap();

    let cancel = CancellationToken::new();
    let first = broker.acquire(&"x", &cancel).await.unwrap();
    assert!(Arc::ptr_eq(&first, &r));

    let second = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move { broker.acquire(&"x", &CancellationToken::new()).await })
    };
    wait_for_waiters(&broker, 1).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!second.is_finished(), "second acquire returned while resource held");

    broker.release(0, &"x").unwrap();
    let got = second.await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&got, &r));
    assert_eq!(broker.is_busy(&"x"), Some(true));

    broker.release(0, &"x").unwrap();
    assert_eq!(broker.is_busy(&"x"), Some(false));
}

#[tokio::test]
async fn test_acquire_any_empty_then_after_release() {
    let broker = make_broker(2, 2);
    broker.register("only", device("only")).unwrap();
    let (id, _r) = broker.acquire_any().unwrap();
    assert_eq!(id, "only");
    assert!(broker.acquire_any().is_none());

    broker.release(5, &"only").unwrap();
    let (id, r) = broker.acquire_any().unwrap();
    assert_eq!(id, "only");
    assert_eq!(r.as_str(), "device:only");
}

#[tokio::test]
async fn test_acquire_any_prefers_release_priority() {
    let config = BrokerConfig::new()
        .with_max_resources(3)
        .with_order(PriorityOrder::Descending);
    let broker: Broker = ResourceBroker::new(config).unwrap();
    for name in ["a", "b", "c"] {
        broker.register(name, device(name)).unwrap();
    }
    let mut held = Vec::new();
    while let Some((id, _)) = broker.acquire_any() {
        held.push(id);
    }
    assert_eq!(held, vec!["a", "b", "c"]);

    broker.release(1, &"a").unwrap();
    broker.release(10, &"b").unwrap();
    broker.release(5, &"c").unwrap();
    assert_eq!(broker.idle_ids(), vec!["b", "c", "a"]);
}

// ============================================================================
// EXCLUSIVITY AND FAIRNESS
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exclusive_under_contention() {
    // Fewer waiter slots than tasks forces the slot-freed wait path too.
    let broker = make_broker(1, 2);
    broker.register("x", device("x")).unwrap();
    let holders = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let broker = Arc::clone(&broker);
            let holders = Arc::clone(&holders);
            let completed = Arc::clone(&completed);
            tokio::spawn(async move {
                let cancel = CancellationToken::new();
                for _ in 0..25 {
                    broker.acquire(&"x", &cancel).await.unwrap();
                    let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                    assert_eq!(now, 1, "two holders at once");
                    tokio::task::yield_now().await;
                    holders.fetch_sub(1, Ordering::SeqCst);
                    broker.release(0, &"x").unwrap();
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    tokio::time::timeout(Duration::from_secs(20), futures::future::join_all(tasks))
        .await
        .expect("contention test stalled")
        .into_iter()
        .for_each(|r| r.unwrap());

    assert_eq!(completed.load(Ordering::SeqCst), 8 * 25);
    let stats = broker.stats();
    assert_eq!(stats.busy, 0);
    assert_eq!(stats.waiting, 0);
    assert_eq!(stats.idle, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_waiters_woken_in_arrival_order() {
    let broker = make_broker(1, 4);
    broker.register("x", device("x")).unwrap();
    broker.acquire_any().unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    for (n, name) in ["w1", "w2", "w3"].into_iter().enumerate() {
        let task_broker = Arc::clone(&broker);
        let tx = tx.clone();
        tokio::spawn(async move {
            task_broker.acquire(&"x", &CancellationToken::new()).await.unwrap();
            tx.send(name).unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
            task_broker.release(0, &"x").unwrap();
        });
        wait_for_waiters(&broker, n + 1).await;
    }
    drop(tx);

    broker.release(0, &"x").unwrap();
    let mut order = Vec::new();
    while let Some(name) = rx.recv().await {
        order.push(name);
    }
    assert_eq!(order, vec!["w1", "w2", "w3"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_waiter_fifo_waits_for_slot() {
    let broker = make_broker(1, 1);
    broker.register("x", device("x")).unwrap();
    broker.acquire_any().unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    for name in ["queued", "overflow"] {
        let task_broker = Arc::clone(&broker);
        let tx = tx.clone();
        tokio::spawn(async move {
            task_broker.acquire(&"x", &CancellationToken::new()).await.unwrap();
            tx.send(name).unwrap();
        });
        if name == "queued" {
            wait_for_waiters(&broker, 1).await;
        }
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(broker.stats().waiting, 1);

    broker.release(0, &"x").unwrap();
    assert_eq!(rx.recv().await, Some("queued"));
    wait_for_waiters(&broker, 1).await;

    broker.release(0, &"x").unwrap();
    assert_eq!(rx.recv().await, Some("overflow"));
}

// ============================================================================
// CANCELLATION, TIMEOUT, UNREGISTER
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_waiter_leaves_no_trace() {
    let broker = make_broker(1, 2);
    broker.register("x", device("x")).unwrap();
    broker.acquire_any().unwrap();

    let cancel = CancellationToken::new();
    let waiter = {
        let broker = Arc::clone(&broker);
        let cancel = cancel.clone();
        tokio::spawn(async move { broker.acquire(&"x", &cancel).await })
    };
    wait_for_waiters(&broker, 1).await;
    cancel.cancel();
    assert_eq!(waiter.await.unwrap(), Err(BrokerError::Cancelled));
    assert_eq!(broker.stats().waiting, 0);

    broker.release(0, &"x").unwrap();
    assert_eq!(broker.is_busy(&"x"), Some(false));
    let again = broker
        .acquire_timeout(&"x", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(again.as_str(), "device:x");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_release_never_strands() {
    let broker = make_broker(1, 2);
    broker.register("x", device("x")).unwrap();

    for round in 0..200u64 {
        broker.acquire_any().unwrap();
        let cancel = CancellationToken::new();
        let waiter = {
            let broker = Arc::clone(&broker);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let got = broker.acquire(&"x", &cancel).await;
                if got.is_ok() {
                    broker.release(0, &"x").unwrap();
                }
                got.is_ok()
            })
        };
        wait_for_waiters(&broker, 1).await;

        let releaser = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move { broker.release(0, &"x").unwrap() })
        };
        if round % 2 == 0 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        releaser.await.unwrap();
        waiter.await.unwrap();

        assert_eq!(broker.stats().waiting, 0, "round {round}");
        assert_eq!(broker.is_busy(&"x"), Some(false), "round {round}: stranded");
        assert_eq!(broker.idle_ids(), vec!["x"], "round {round}");
    }
}

#[tokio::test]
async fn test_acquire_timeout_withdraws_waiter() {
    let broker = make_broker(1, 2);
    broker.register("x", device("x")).unwrap();
    broker.acquire_any().unwrap();

    let got = broker.acquire_timeout(&"x", Duration::from_millis(20)).await;
    assert_eq!(got, Err(BrokerError::Timeout));
    assert_eq!(broker.stats().waiting, 0);

    broker.release(3, &"x").unwrap();
    assert_eq!(broker.idle_ids(), vec!["x"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unregister_wakes_waiters_with_error() {
    let broker = make_broker(2, 2);
    broker.register("x", device("x")).unwrap();
    broker.acquire_any().unwrap();

    let waiter = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move { broker.acquire(&"x", &CancellationToken::new()).await })
    };
    wait_for_waiters(&broker, 1).await;

    let r = broker.unregister(&"x").unwrap();
    assert_eq!(r.as_str(), "device:x");
    assert!(matches!(
        waiter.await.unwrap(),
        Err(BrokerError::Unregistered(_))
    ));
    // The former holder's release no longer finds the record.
    assert!(matches!(
        broker.release(0, &"x"),
        Err(BrokerError::NotRegistered(_))
    ));
    assert!(!broker.contains(&"x"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parked_and_queued_waiters_see_same_unregister_error() {
    let broker = make_broker(1, 1);
    broker.register("x", device("x")).unwrap();
    broker.acquire_any().unwrap();

    let spawn_waiter = |broker: Arc<Broker>| {
        tokio::spawn(async move { broker.acquire(&"x", &CancellationToken::new()).await })
    };
    let queued = spawn_waiter(Arc::clone(&broker));
    wait_for_waiters(&broker, 1).await;
    // The FIFO is full, so this one sleeps until a slot frees up.
    let parked = spawn_waiter(Arc::clone(&broker));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!parked.is_finished());

    broker.unregister(&"x").unwrap();
    assert!(matches!(queued.await.unwrap(), Err(BrokerError::Unregistered(_))));
    assert!(matches!(parked.await.unwrap(), Err(BrokerError::Unregistered(_))));
}

// ============================================================================
// HOLDER OUTLIVING UNREGISTER
// ============================================================================

#[tokio::test]
async fn test_reregister_waits_for_outstanding_holder() {
    let broker = make_broker(2, 2);
    broker.register("x", device("first")).unwrap();
    let cancel = CancellationToken::new();
    let first = broker.acquire(&"x", &cancel).await.unwrap();
    assert_eq!(first.as_str(), "device:first");

    broker.unregister(&"x").unwrap();
    assert!(matches!(
        broker.register("x", device("second")),
        Err(BrokerError::DuplicateId(_))
    ));
    assert!(matches!(
        broker.acquire(&"x", &cancel).await,
        Err(BrokerError::NotRegistered(_))
    ));
    assert_eq!(broker.stats().retired, 1);

    // The old holder lets go; only now can the id come back.
    assert!(matches!(
        broker.release(0, &"x"),
        Err(BrokerError::NotRegistered(_))
    ));
    broker.register("x", device("second")).unwrap();
    let second = broker.acquire(&"x", &cancel).await.unwrap();
    assert_eq!(second.as_str(), "device:second");

    assert!(broker.acquire_any().is_none(), "second concurrent holder of x");
    assert_eq!(broker.is_busy(&"x"), Some(true));
    let stats = broker.stats();
    assert_eq!((stats.busy, stats.idle, stats.retired), (1, 0, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handed_off_holder_keeps_id_reserved_after_unregister() {
    let broker = make_broker(2, 2);
    broker.register("x", device("first")).unwrap();
    broker.acquire_any().unwrap();

    let waiter = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move { broker.acquire(&"x", &CancellationToken::new()).await })
    };
    wait_for_waiters(&broker, 1).await;
    broker.release(0, &"x").unwrap();
    let handed = waiter.await.unwrap().unwrap();
    assert_eq!(handed.as_str(), "device:first");

    broker.unregister(&"x").unwrap();
    assert!(matches!(
        broker.register("x", device("second")),
        Err(BrokerError::DuplicateId(_))
    ));
    assert!(broker.release(0, &"x").is_err());

    broker.register("x", device("second")).unwrap();
    let (id, r) = broker.acquire_any().unwrap();
    assert_eq!((id, r.as_str()), ("x", "device:second"));
    assert!(broker.acquire_any().is_none());
}

#[tokio::test]
async fn test_acquire_unknown_never_blocks() {
    let broker = make_broker(1, 1);
    let got = broker.acquire(&"ghost", &CancellationToken::new()).await;
    assert!(matches!(got, Err(BrokerError::NotRegistered(_))));
}
