//! Branch ordering tests through the public `insert_customer` /
//! `remove_customer` API.
//!
//! A seeded random sequence of splices is applied and the doubly-linked
//! invariant is checked after every step.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing,
    clippy::panic
)]

use qsky_core::registry::broken_links;
use qsky_core::{CustomerEvents, ManualClock, ProcessError, QskyConfig};
use qsky_db::{MemoryStore, Store};
use qsky_types::{BranchId, CustomerId, InsertCustomer, RemoveCustomer, ServiceId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type Events = CustomerEvents<MemoryStore, ManualClock>;

const BRANCH: BranchId = BranchId(3);

fn events() -> Events {
    CustomerEvents::new(
        MemoryStore::new(),
        ManualClock::default(),
        &QskyConfig::default(),
    )
    .expect("valid config")
}

fn insert(id: i64, before: Option<i64>, after: Option<i64>) -> InsertCustomer {
    InsertCustomer {
        branch_id: BRANCH,
        service_id: Some(ServiceId(1)),
        customer_id: CustomerId(id),
        before: before.map(CustomerId),
        after: after.map(CustomerId),
    }
}

fn remove(id: i64) -> RemoveCustomer {
    RemoveCustomer {
        branch_id: BRANCH,
        service_id: None,
        customer_id: CustomerId(id),
    }
}

async fn check_invariant(events: &Events) {
    let customers = events.store().customers_in_branch(BRANCH).await.unwrap();
    assert_eq!(broken_links(&customers), Vec::<CustomerId>::new());

    let queues = events.queue_order(BRANCH).await.unwrap();
    let placed = customers.iter().filter(|c| c.is_linked()).count();
    let walked: usize = queues.iter().map(Vec::len).sum();
    assert_eq!(placed, walked, "every placed customer is reachable from a head");
}

#[tokio::test]
async fn random_splices_keep_the_ordering_consistent() {
    let events = events();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let pick = |rng: &mut StdRng| {
        rng.random_bool(0.7)
            .then(|| rng.random_range(1..=12_i64))
    };

    for _ in 0..400 {
        if rng.random_bool(0.25) {
            let id = rng.random_range(1..=12_i64);
            events.process_remove(&remove(id)).await.unwrap();
        } else {
            let id = rng.random_range(1..=12_i64);
            let before = pick(&mut rng);
            let after = pick(&mut rng);
            match events.process_insert(&insert(id, before, after)).await {
                Ok(())
                | Err(ProcessError::NotAdjacent { .. } | ProcessError::InvalidSplice { .. }) => {}
                Err(other) => panic!("unexpected splice failure: {other}"),
            }
        }
        check_invariant(&events).await;
    }
}

#[tokio::test]
async fn queue_is_rebuilt_in_order() {
    let events = events();
    events.insert_customer(insert(10, None, None)).await;
    events.insert_customer(insert(20, Some(10), None)).await;
    events.insert_customer(insert(30, Some(20), None)).await;
    events.insert_customer(insert(15, Some(10), Some(20))).await;
    events.insert_customer(insert(5, None, Some(10))).await;

    let queues = events.queue_order(BRANCH).await.unwrap();
    let ids: Vec<i64> = queues[0].iter().map(|c| c.into_inner()).collect();
    assert_eq!(ids, vec![5, 10, 15, 20, 30]);

    events.remove_customer(remove(15)).await;
    events.remove_customer(remove(15)).await;
    events.remove_customer(remove(99)).await;
    let queues = events.queue_order(BRANCH).await.unwrap();
    let ids: Vec<i64> = queues[0].iter().map(|c| c.into_inner()).collect();
    assert_eq!(ids, vec![5, 10, 20, 30]);
    check_invariant(&events).await;
}

#[tokio::test]
async fn rejected_splice_is_not_committed() {
    let events = events();
    events.insert_customer(insert(1, None, None)).await;
    events.insert_customer(insert(2, Some(1), None)).await;
    events.insert_customer(insert(3, Some(2), None)).await;
    let commits = events.store().commit_count();

    events.insert_customer(insert(4, Some(1), Some(3))).await;
    events.insert_customer(insert(2, Some(2), None)).await;

    assert_eq!(events.store().commit_count(), commits);
    check_invariant(&events).await;
}

#[tokio::test]
async fn joining_the_ends_of_one_queue_is_rejected() {
    let events = events();
    events.insert_customer(insert(1, None, None)).await;
    events.insert_customer(insert(2, Some(1), None)).await;
    events.insert_customer(insert(3, Some(2), None)).await;

    let result = events.process_insert(&insert(4, Some(3), Some(1))).await;
    assert!(matches!(result, Err(ProcessError::NotAdjacent { .. })));
    check_invariant(&events).await;
}
