//! Striped per-branch lock table.
//!
//! Every status change and splice of a branch runs under that branch's
//! stripe, so events of one customer are applied one at a time and in
//! arrival order (`tokio::sync::Mutex` is fair). Branches that hash to
//! different stripes proceed in parallel.

use qsky_types::BranchId;
use tokio::sync::{Mutex, MutexGuard};

/// Stripe used when the table has none to offer.
static UNSHARDED: Mutex<()> = Mutex::const_new(());

/// Fixed-size table of FIFO locks keyed by branch.
#[derive(Debug)]
pub struct LockTable {
    stripes: Vec<Mutex<()>>,
}

impl LockTable {
    /// Create a table with `shards` stripes (at least one).
    pub fn new(shards: usize) -> Self {
        let stripes = (0..shards.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes }
    }

    /// Number of stripes.
    pub fn shards(&self) -> usize {
        self.stripes.len()
    }

    /// Stripe index of a branch.
    pub fn shard_of(&self, branch_id: BranchId) -> usize {
        let shards = i64::try_from(self.shards()).unwrap_or(i64::MAX).max(1);
        usize::try_from(branch_id.into_inner().rem_euclid(shards)).unwrap_or_default()
    }

    /// Wait for the branch's stripe.
    pub async fn lock(&self, branch_id: BranchId) -> MutexGuard<'_, ()> {
        self.stripes
            .get(self.shard_of(branch_id))
            .unwrap_or(&UNSHARDED)
            .lock()
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn zero_shards_still_has_one_stripe() {
        let table = LockTable::new(0);
        assert_eq!(table.shards(), 1);
        assert_eq!(table.shard_of(BranchId(17)), 0);
    }

    #[tokio::test]
    async fn single_stripe_serializes_every_branch() {
        let table = LockTable::new(1);
        let guard = table.lock(BranchId(1)).await;
        let other = tokio::time::timeout(Duration::from_millis(20), table.lock(BranchId(2))).await;
        assert!(other.is_err());
        drop(guard);
        assert!(table.stripes.iter().all(|s| s.try_lock().is_ok()));
    }

    #[test]
    fn negative_branches_map_into_range() {
        let table = LockTable::new(8);
        assert_eq!(table.shard_of(BranchId(-1)), 7);
        assert_eq!(table.shard_of(BranchId(9)), 1);
    }

    #[tokio::test]
    async fn same_branch_is_exclusive() {
        let table = LockTable::new(4);
        let guard = table.lock(BranchId(2)).await;
        let second = tokio::time::timeout(Duration::from_millis(20), table.lock(BranchId(6))).await;
        assert!(second.is_err(), "branches 2 and 6 share a stripe");
        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(20), table.lock(BranchId(6))).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn different_stripes_do_not_block() {
        let table = Arc::new(LockTable::new(4));
        let _held = table.lock(BranchId(1)).await;
        let other = tokio::time::timeout(Duration::from_millis(20), table.lock(BranchId(2))).await;
        assert!(other.is_ok());
    }
}
