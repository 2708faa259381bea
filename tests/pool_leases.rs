//! Connection pool lease lifecycle tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::time::Duration;

use protocol_adapter::pool::ConnectionPool;
use protocol_adapter::TransportError;

mod common;
use common::ScriptedTransport;

#[tokio::test]
async fn test_released_lease_is_reused() {
    let transport = ScriptedTransport::new();
    let pool = common::pool(&transport, 4);

    let lease = pool.acquire(true).await.unwrap().unwrap();
    let id = lease.id().expect("pooled");
    let handle = lease.handle().unwrap().id;
    pool.release(lease, None).await;
    assert_eq!(pool.idle(), 1);

    let again = pool.acquire(true).await.unwrap().unwrap();
    assert_eq!(again.id(), Some(id));
    assert_eq!(again.handle().unwrap().id, handle);
    assert_eq!(transport.opens(), 1);
    assert_eq!(pool.len(), 1);
}

#[tokio::test]
async fn test_broken_lease_never_reissued() {
    let transport = ScriptedTransport::new();
    let pool = common::pool(&transport, 4);

    let lease = pool.acquire(true).await.unwrap().unwrap();
    let broken = lease.handle().unwrap().id;
    pool.release(lease, Some(&TransportError::Eof)).await;

    assert_eq!(pool.len(), 0);
    assert_eq!(transport.closes(), 1);

    for _ in 0..3 {
        let lease = pool.acquire(true).await.unwrap().unwrap();
        assert_ne!(lease.handle().unwrap().id, broken);
        pool.release(lease, None).await;
    }
    assert_eq!(transport.opens(), 2);
}

#[tokio::test]
async fn test_forced_new_lease_skips_idle() {
    let transport = ScriptedTransport::new();
    let pool = common::pool(&transport, 4);

    let lease = pool.acquire(true).await.unwrap().unwrap();
    pool.release(lease, None).await;

    let fresh = pool.acquire(false).await.unwrap().unwrap();
    assert_eq!(fresh.handle().unwrap().id, 2);
    assert!(fresh.is_pooled());
    assert_eq!(pool.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_aged_lease_replaced_under_same_id() {
    let transport = ScriptedTransport::new();
    let pool = ConnectionPool::new(transport.clone(), common::settings(2, Duration::from_millis(50)));

    let lease = pool.acquire(true).await.unwrap().unwrap();
    let id = lease.id().unwrap();
    tokio::time::advance(Duration::from_millis(100)).await;
    pool.release(lease, None).await;

    assert_eq!(pool.len(), 1);
    assert_eq!(transport.closes(), 1);
    assert_eq!(transport.opens(), 2);

    let again = pool.acquire(true).await.unwrap().unwrap();
    assert_eq!(again.id(), Some(id));
    assert_eq!(again.handle().unwrap().id, 2);
}

#[tokio::test(start_paused = true)]
async fn test_aged_lease_evicted_when_replacement_fails() {
    let transport = ScriptedTransport::new();
    let pool = ConnectionPool::new(transport.clone(), common::settings(2, Duration::from_millis(50)));

    let lease = pool.acquire(true).await.unwrap().unwrap();
    tokio::time::advance(Duration::from_millis(100)).await;
    transport.fail_next_open(TransportError::Connect {
        address: "peer:9000".into(),
        reason: "refused".into(),
    });
    pool.release(lease, None).await;

    assert_eq!(pool.len(), 0);
}

#[tokio::test]
async fn test_dropped_lease_is_evicted() {
    let transport = ScriptedTransport::new();
    let pool = common::pool(&transport, 2);

    let lease = pool.acquire(true).await.unwrap().unwrap();
    assert_eq!(pool.len(), 1);
    drop(lease);
    assert_eq!(pool.len(), 0);
}

#[tokio::test]
async fn test_closed_idle_lease_evicted_on_scan() {
    let transport = ScriptedTransport::new();
    let pool = common::pool(&transport, 2);

    let lease = pool.acquire(true).await.unwrap().unwrap();
    let stale = lease.handle().unwrap().id;
    pool.release(lease, None).await;
    transport.close_remotely(stale);

    let lease = pool.acquire(true).await.unwrap().unwrap();
    assert_ne!(lease.handle().unwrap().id, stale);
    assert_eq!(transport.closes(), 1);
    assert_eq!(pool.len(), 1);
}

#[tokio::test]
async fn test_saturated_pool_reports_none() {
    let transport = ScriptedTransport::new();
    let pool = common::pool(&transport, 1);

    let held = pool.acquire(true).await.unwrap().unwrap();
    assert!(pool.acquire(true).await.unwrap().is_none());

    let extra = pool.acquire(false).await.unwrap().unwrap();
    assert!(!extra.is_pooled());
    pool.release(extra, None).await;
    assert_eq!(pool.len(), 1);
    pool.release(held, None).await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_acquisitions_respect_capacity() {
    let transport = ScriptedTransport::new();
    transport.set_open_delay(Duration::from_millis(5));
    let pool = common::pool(&transport, 2);

    let (a, b, c) = tokio::join!(pool.acquire(true), pool.acquire(true), pool.acquire(true));
    let leases = [a.unwrap().unwrap(), b.unwrap().unwrap(), c.unwrap().unwrap()];

    let pooled = leases.iter().filter(|l| l.is_pooled()).count();
    assert_eq!(pooled, 2);
    assert_eq!(leases.len() - pooled, 1);
    assert_eq!(pool.len(), 2);

    for lease in leases {
        pool.release(lease, None).await;
    }
    assert_eq!(pool.len(), 2);
    assert_eq!(transport.closes(), 1);
}

#[tokio::test]
async fn test_zero_capacity_pools_nothing() {
    let transport = ScriptedTransport::new();
    let pool = common::pool(&transport, 0);

    let lease = pool.acquire(true).await.unwrap().unwrap();
    assert!(!lease.is_pooled());
    pool.release(lease, None).await;
    assert_eq!(pool.len(), 0);
    assert_eq!(transport.closes(), 1);
}

#[tokio::test]
async fn test_evict() {
    let transport = ScriptedTransport::new();
    let pool = common::pool(&transport, 2);

    let lease = pool.acquire(true).await.unwrap().unwrap();
    let id = lease.id().unwrap();
    assert!(pool.evict(id));
    assert!(!pool.evict(id));

    // Released after eviction: closed, not re-added.
    pool.release(lease, None).await;
    assert_eq!(pool.len(), 0);
    assert_eq!(transport.closes(), 1);
}

#[tokio::test]
async fn test_random_operations_keep_invariants() {
    let transport = ScriptedTransport::new();
    let capacity = 3;
    let pool = common::pool(&transport, capacity);
    let mut rng = StdRng::seed_from_u64(7);
    let mut held = Vec::new();

    for _ in 0..500 {
        match rng.gen_range(0..4) {
            0 | 1 => {
                if let Some(lease) = pool.acquire(rng.gen_bool(0.7)).await.unwrap() {
                    held.push(lease);
                }
            }
            2 if !held.is_empty() => {
                let lease = held.swap_remove(rng.gen_range(0..held.len()));
                let err = rng.gen_bool(0.3).then_some(TransportError::BrokenPipe);
                pool.release(lease, err.as_ref()).await;
            }
            3 if !held.is_empty() => {
                drop(held.swap_remove(rng.gen_range(0..held.len())));
            }
            _ => {}
        }

        assert!(pool.len() <= capacity);
        let ids: Vec<_> = held.iter().filter_map(|l| l.id()).collect();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(ids.len(), unique.len(), "a lease was handed out twice");
    }
}
