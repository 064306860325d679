//! Unit of work: reads through the store, writes into one [`ChangeSet`].
//!
//! A handler may read a record, change it, and read it again; the second
//! read sees the staged version. Nothing reaches the store until
//! [`UnitOfWork::commit`], which hands the whole set over in a single
//! transaction. Dropping a unit of work discards everything it staged.

use std::collections::BTreeSet;

use qsky_db::{ChangeSet, Store};
use qsky_types::{Customer, CustomerKey, Step, StepId};

use crate::chain::StepChain;
use crate::error::ProcessError;

/// Staged writes of one event, overlaid on store reads.
#[derive(Debug)]
pub struct UnitOfWork<'s, S> {
    store: &'s S,
    changes: ChangeSet,
}

impl<'s, S: Store> UnitOfWork<'s, S> {
    /// Begin a unit of work against `store`.
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            changes: ChangeSet::new(),
        }
    }

    /// Look up a customer, preferring a staged version.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Store`] if the store read fails.
    pub async fn customer(&self, key: CustomerKey) -> Result<Option<Customer>, ProcessError> {
        if let Some(staged) = self.changes.customer(key) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.store.find_customer(key).await?)
    }

    /// Look up a customer that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::CustomerNotFound`] if there is no such
    /// customer, or [`ProcessError::Store`] if the read fails.
    pub async fn require_customer(&self, key: CustomerKey) -> Result<Customer, ProcessError> {
        self.customer(key)
            .await?
            .ok_or(ProcessError::CustomerNotFound { key })
    }

    /// Stage a customer write.
    pub fn put_customer(&mut self, customer: Customer) {
        self.changes.put_customer(customer);
    }

    /// Load the customer's current step chain, including staged steps.
    ///
    /// Follows the links from `first_step` one id at a time, so the cost is
    /// the length of the current chain and not of the customer's history.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::BrokenChain`] if the stored links are
    /// inconsistent, or [`ProcessError::Store`] if a read fails.
    pub async fn chain(&self, customer: &Customer) -> Result<StepChain, ProcessError> {
        let key = customer.key();
        let Some(head) = customer.first_step else {
            return Ok(StepChain::empty(key));
        };

        let mut steps = Vec::new();
        let mut seen = BTreeSet::new();
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            // A repeat or a missing id stops the walk; `walk` reports it.
            if !seen.insert(id) {
                break;
            }
            let Some(step) = self.step(id).await? else {
                break;
            };
            cursor = step.after;
            steps.push(step);
        }

        StepChain::walk(key, Some(head), steps)
    }

    async fn step(&self, id: StepId) -> Result<Option<Step>, ProcessError> {
        if let Some(staged) = self.changes.step(id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.store.find_step(id).await?)
    }

    /// Stage every step the chain created or changed.
    pub fn put_chain(&mut self, chain: &StepChain) {
        for step in chain.dirty_steps() {
            self.changes.put_step(step.clone());
        }
    }

    /// Write every staged record in one transaction.
    ///
    /// Returns the number of records written. An empty unit of work does
    /// not touch the store.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Store`] if the commit fails; nothing is
    /// written in that case.
    pub async fn commit(self) -> Result<usize, ProcessError> {
        if self.changes.is_empty() {
            return Ok(0);
        }
        let records = self.changes.len();
        self.store.commit(self.changes).await?;
        Ok(records)
    }
}
