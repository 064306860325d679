//! The store boundary used by the processor.
//!
//! Reads go straight to the store. Writes are collected into a
//! [`ChangeSet`] and committed in one transaction, so a unit of work is
//! either fully visible or not visible at all.

use std::collections::BTreeMap;
use std::future::Future;

use qsky_types::{
    BranchId, Customer, CustomerKey, EmployeeId, EmployeeName, ServiceId, ServiceName, Step,
    StepId,
};

use crate::error::DbError;

/// Durable keyed storage for customers, steps and dimension names.
///
/// Implementations must apply a [`ChangeSet`] atomically: after a failed
/// [`Store::commit`] no record of the set may be observable.
pub trait Store: Send + Sync {
    /// Look up one customer record.
    fn find_customer(
        &self,
        key: CustomerKey,
    ) -> impl Future<Output = Result<Option<Customer>, DbError>> + Send;

    /// All customer records of a branch, in no particular order.
    fn customers_in_branch(
        &self,
        branch_id: BranchId,
    ) -> impl Future<Output = Result<Vec<Customer>, DbError>> + Send;

    /// Look up one step record.
    fn find_step(&self, id: StepId) -> impl Future<Output = Result<Option<Step>, DbError>> + Send;

    /// Every step ever recorded for a customer, in no particular order.
    ///
    /// This includes steps of earlier chains that are no longer reachable
    /// from the customer's current head.
    fn steps_of_customer(
        &self,
        key: CustomerKey,
    ) -> impl Future<Output = Result<Vec<Step>, DbError>> + Send;

    /// Look up a service display name.
    fn find_service_name(
        &self,
        branch_id: BranchId,
        service_id: ServiceId,
    ) -> impl Future<Output = Result<Option<ServiceName>, DbError>> + Send;

    /// Look up an operator display name.
    fn find_employee_name(
        &self,
        branch_id: BranchId,
        employee_id: EmployeeId,
    ) -> impl Future<Output = Result<Option<EmployeeName>, DbError>> + Send;

    /// Insert or update every record of the set in one transaction.
    fn commit(&self, changes: ChangeSet) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// Records written by one unit of work.
///
/// Putting the same record twice keeps the latest version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    customers: BTreeMap<CustomerKey, Customer>,
    steps: BTreeMap<StepId, Step>,
    service_names: BTreeMap<(BranchId, ServiceId), ServiceName>,
    employee_names: BTreeMap<(BranchId, EmployeeId), EmployeeName>,
}

impl ChangeSet {
    /// Create an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a customer upsert.
    pub fn put_customer(&mut self, customer: Customer) {
        self.customers.insert(customer.key(), customer);
    }

    /// Stage a step upsert.
    pub fn put_step(&mut self, step: Step) {
        self.steps.insert(step.id, step);
    }

    /// Stage a service name upsert.
    pub fn put_service_name(&mut self, service: ServiceName) {
        self.service_names
            .insert((service.branch_id, service.service_id), service);
    }

    /// Stage an operator name upsert.
    pub fn put_employee_name(&mut self, employee: EmployeeName) {
        self.employee_names
            .insert((employee.branch_id, employee.employee_id), employee);
    }

    /// The staged version of a customer, if any.
    pub fn customer(&self, key: CustomerKey) -> Option<&Customer> {
        self.customers.get(&key)
    }

    /// The staged version of a step, if any.
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.get(&id)
    }

    /// Staged customers in key order.
    pub fn customers(&self) -> impl Iterator<Item = &Customer> {
        self.customers.values()
    }

    /// Staged steps in id order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.values()
    }

    /// Staged service names.
    pub fn service_names(&self) -> impl Iterator<Item = &ServiceName> {
        self.service_names.values()
    }

    /// Staged operator names.
    pub fn employee_names(&self) -> impl Iterator<Item = &EmployeeName> {
        self.employee_names.values()
    }

    /// Whether nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
            && self.steps.is_empty()
            && self.service_names.is_empty()
            && self.employee_names.is_empty()
    }

    /// Total number of staged records.
    pub fn len(&self) -> usize {
        self.customers
            .len()
            .saturating_add(self.steps.len())
            .saturating_add(self.service_names.len())
            .saturating_add(self.employee_names.len())
    }
}
