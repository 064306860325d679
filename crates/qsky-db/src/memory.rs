//! In-memory store.
//!
//! Holds every table in a single [`RwLock`], so a commit is applied under
//! one write guard and is atomic with respect to every reader. Used by the
//! test suites and by single-process deployments that do not need
//! durability.
//!
//! Steps are also indexed by owning customer, so per-customer reads touch
//! only that customer's records.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use qsky_types::{
    BranchId, Customer, CustomerId, CustomerKey, EmployeeId, EmployeeName, ServiceId, ServiceName, Step,
    StepId,
};
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::store::{ChangeSet, Store};

#[derive(Debug, Default)]
struct Tables {
    customers: BTreeMap<CustomerKey, Customer>,
    steps: BTreeMap<StepId, Step>,
    steps_by_customer: BTreeMap<CustomerKey, BTreeSet<StepId>>,
    service_names: BTreeMap<(BranchId, ServiceId), ServiceName>,
    employee_names: BTreeMap<(BranchId, EmployeeId), EmployeeName>,
}

/// Store backed by in-process maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_next_commit: AtomicBool,
    commits: AtomicUsize,
    step_reads: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next [`Store::commit`] fail with [`DbError::InjectedFailure`]
    /// without applying anything.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of commits applied so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of step records returned by reads so far.
    pub fn step_reads(&self) -> usize {
        self.step_reads.load(Ordering::SeqCst)
    }

    /// Total number of step records held.
    pub async fn step_count(&self) -> usize {
        self.tables.read().await.steps.len()
    }
}

impl Store for MemoryStore {
    async fn find_customer(&self, key: CustomerKey) -> Result<Option<Customer>, DbError> {
        Ok(self.tables.read().await.customers.get(&key).cloned())
    }

    async fn customers_in_branch(&self, branch_id: BranchId) -> Result<Vec<Customer>, DbError> {
        let tables = self.tables.read().await;
        let first = CustomerKey::new(branch_id, CustomerId(i64::MIN));
        let last = CustomerKey::new(branch_id, CustomerId(i64::MAX));
        Ok(tables
            .customers
            .range(first..=last)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn find_step(&self, id: StepId) -> Result<Option<Step>, DbError> {
        let found = self.tables.read().await.steps.get(&id).cloned();
        if found.is_some() {
            self.step_reads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(found)
    }

    async fn steps_of_customer(&self, key: CustomerKey) -> Result<Vec<Step>, DbError> {
        let tables = self.tables.read().await;
        let steps: Vec<Step> = tables
            .steps_by_customer
            .get(&key)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.steps.get(id).cloned())
            .collect();
        self.step_reads.fetch_add(steps.len(), Ordering::SeqCst);
        Ok(steps)
    }

    async fn find_service_name(
        &self,
        branch_id: BranchId,
        service_id: ServiceId,
    ) -> Result<Option<ServiceName>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables.service_names.get(&(branch_id, service_id)).cloned())
    }

    async fn find_employee_name(
        &self,
        branch_id: BranchId,
        employee_id: EmployeeId,
    ) -> Result<Option<EmployeeName>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables.employee_names.get(&(branch_id, employee_id)).cloned())
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            tracing::debug!(records = changes.len(), "Dropping commit (injected failure)");
            return Err(DbError::InjectedFailure);
        }

        for step in changes.steps() {
            tables
                .steps_by_customer
                .entry(step.customer_key())
                .or_default()
                .insert(step.id);
            tables.steps.insert(step.id, step.clone());
        }
        for customer in changes.customers() {
            tables.customers.insert(customer.key(), customer.clone());
        }
        for service in changes.service_names() {
            tables
                .service_names
                .insert((service.branch_id, service.service_id), service.clone());
        }
        for employee in changes.employee_names() {
            tables
                .employee_names
                .insert((employee.branch_id, employee.employee_id), employee.clone());
        }
        self.commits.fetch_add(1, Ordering::SeqCst);

        tracing::trace!(records = changes.len(), "Applied in-memory commit");
        Ok(())
    }
}
