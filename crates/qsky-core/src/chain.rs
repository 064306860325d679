//! Append-only step chain of one customer.
//!
//! The store holds steps as loose records linked by [`StepId`]. A
//! [`StepChain`] is the materialized list reachable from a customer's
//! `first_step`, in order, with every link checked on the way. Handlers
//! mutate the tail or append to it; the chain remembers which records it
//! touched so that only those are written back.

use std::collections::{BTreeSet, HashMap};

use qsky_types::{CustomerKey, Step, StepId};

use crate::error::ProcessError;

/// The ordered visit stages of one customer, head first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepChain {
    key: CustomerKey,
    nodes: Vec<Step>,
    dirty: BTreeSet<StepId>,
}

impl StepChain {
    /// A chain with no steps.
    pub const fn empty(key: CustomerKey) -> Self {
        Self {
            key,
            nodes: Vec::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// A new chain whose head is `first`.
    pub fn start(key: CustomerKey, first: Step) -> Self {
        let mut chain = Self::empty(key);
        chain.append(first);
        chain
    }

    /// Rebuild the chain from `head` using the customer's step records.
    ///
    /// Records not reachable from `head` (steps of earlier visits) are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::BrokenChain`] if a linked step is missing,
    /// a step is reached twice, or a back link disagrees with the walk.
    pub fn walk(
        key: CustomerKey,
        head: Option<StepId>,
        steps: Vec<Step>,
    ) -> Result<Self, ProcessError> {
        let mut by_id: HashMap<StepId, Step> = steps.into_iter().map(|s| (s.id, s)).collect();
        let mut chain = Self::empty(key);
        let mut seen = BTreeSet::new();
        let mut previous: Option<StepId> = None;
        let mut cursor = head;

        while let Some(id) = cursor {
            if !seen.insert(id) {
                return Err(broken(key, format!("step {id} is reached twice")));
            }
            let step = by_id
                .remove(&id)
                .ok_or_else(|| broken(key, format!("step {id} is missing")))?;
            if step.customer_key() != key {
                return Err(broken(key, format!("step {id} belongs to another customer")));
            }
            if step.before != previous {
                return Err(broken(
                    key,
                    format!("step {id} does not link back to its predecessor"),
                ));
            }
            previous = Some(id);
            cursor = step.after;
            chain.nodes.push(step);
        }

        Ok(chain)
    }

    /// Key of the owning customer.
    pub const fn key(&self) -> CustomerKey {
        self.key
    }

    /// Number of steps in the chain.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the chain has no steps.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The first step.
    pub fn head(&self) -> Option<&Step> {
        self.nodes.first()
    }

    /// The current step.
    pub fn tail(&self) -> Option<&Step> {
        self.nodes.last()
    }

    /// The current step, for mutation. Marks it for writing.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::EmptyChain`] when there are no steps.
    pub fn tail_mut(&mut self) -> Result<&mut Step, ProcessError> {
        let key = self.key;
        let tail = self
            .nodes
            .last_mut()
            .ok_or(ProcessError::EmptyChain { key })?;
        self.dirty.insert(tail.id);
        Ok(tail)
    }

    /// Link `step` after the current tail, making it the new tail.
    pub fn append(&mut self, mut step: Step) {
        step.after = None;
        step.before = None;
        if let Some(tail) = self.nodes.last_mut() {
            tail.after = Some(step.id);
            step.before = Some(tail.id);
            self.dirty.insert(tail.id);
        }
        self.dirty.insert(step.id);
        self.nodes.push(step);
    }

    /// Steps that carry a waiting sample.
    pub fn measured_waiting(&self) -> usize {
        self.nodes.iter().filter(|s| s.waiting.is_some()).count()
    }

    /// Steps that carry a working sample.
    pub fn measured_working(&self) -> usize {
        self.nodes.iter().filter(|s| s.working.is_some()).count()
    }

    /// Steps head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.nodes.iter()
    }

    /// Steps created or changed since the chain was loaded.
    pub fn dirty_steps(&self) -> impl Iterator<Item = &Step> {
        self.nodes.iter().filter(|s| self.dirty.contains(&s.id))
    }

    /// Consume the chain, yielding its steps head to tail.
    pub fn into_steps(self) -> Vec<Step> {
        self.nodes
    }
}

fn broken(key: CustomerKey, reason: String) -> ProcessError {
    ProcessError::BrokenChain { key, reason }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;
    use qsky_types::{BranchId, CustomerId, CustomerState};

    use super::*;

    fn key() -> CustomerKey {
        CustomerKey::new(BranchId(1), CustomerId(555))
    }

    fn step(state: CustomerState) -> Step {
        Step::open(key(), None, state, Utc::now())
    }

    fn three_step_chain() -> StepChain {
        let mut chain = StepChain::start(key(), step(CustomerState::Wait));
        chain.append(step(CustomerState::Redirect));
        chain.append(step(CustomerState::Back));
        chain
    }

    #[test]
    fn append_links_both_directions() {
        let chain = three_step_chain();
        let steps: Vec<_> = chain.iter().collect();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].before, None);
        assert_eq!(steps[0].after, Some(steps[1].id));
        assert_eq!(steps[1].before, Some(steps[0].id));
        assert_eq!(steps[1].after, Some(steps[2].id));
        assert_eq!(steps[2].before, Some(steps[1].id));
        assert_eq!(steps[2].after, None);
        assert_eq!(chain.tail().map(|s| s.start_state), Some(CustomerState::Back));
    }

    #[test]
    fn walk_restores_order_from_shuffled_records() {
        let chain = three_step_chain();
        let head = chain.head().map(|s| s.id);
        let mut records = chain.clone().into_steps();
        records.reverse();

        let walked = StepChain::walk(key(), head, records).unwrap();
        let ids: Vec<_> = walked.iter().map(|s| s.id).collect();
        let expected: Vec<_> = chain.iter().map(|s| s.id).collect();
        assert_eq!(ids, expected);
        assert_eq!(walked.dirty_steps().count(), 0);
    }

    #[test]
    fn walk_ignores_steps_of_earlier_visits() {
        let old = three_step_chain();
        let current = StepChain::start(key(), step(CustomerState::Wait));
        let head = current.head().map(|s| s.id);
        let mut records = old.into_steps();
        records.extend(current.into_steps());

        let walked = StepChain::walk(key(), head, records).unwrap();
        assert_eq!(walked.len(), 1);
    }

    #[test]
    fn walk_without_head_is_empty() {
        let walked = StepChain::walk(key(), None, Vec::new()).unwrap();
        assert!(walked.is_empty());
        assert!(walked.tail().is_none());
    }

    #[test]
    fn walk_detects_missing_step() {
        let chain = three_step_chain();
        let head = chain.head().map(|s| s.id);
        let mut records = chain.into_steps();
        records.pop();

        let result = StepChain::walk(key(), head, records);
        assert!(matches!(result, Err(ProcessError::BrokenChain { .. })));
    }

    #[test]
    fn walk_detects_cycle() {
        let mut records = three_step_chain().into_steps();
        let head_id = records[0].id;
        records[2].after = Some(head_id);
        records[0].before = Some(records[2].id);

        let result = StepChain::walk(key(), Some(head_id), records);
        assert!(matches!(result, Err(ProcessError::BrokenChain { .. })));
    }

    #[test]
    fn walk_detects_bad_back_link() {
        let mut records = three_step_chain().into_steps();
        let head_id = records[0].id;
        records[2].before = Some(head_id);

        let result = StepChain::walk(key(), Some(head_id), records);
        assert!(matches!(result, Err(ProcessError::BrokenChain { .. })));
    }

    #[test]
    fn walk_rejects_step_of_another_customer() {
        let mut records = three_step_chain().into_steps();
        let head_id = records[0].id;
        records[1].customer_id = CustomerId(556);

        let result = StepChain::walk(key(), Some(head_id), records);
        assert!(matches!(result, Err(ProcessError::BrokenChain { .. })));
    }

    #[test]
    fn tail_mut_marks_only_the_tail_dirty() {
        let chain = three_step_chain();
        let head = chain.head().map(|s| s.id);
        let mut walked = StepChain::walk(key(), head, chain.into_steps()).unwrap();

        walked.tail_mut().unwrap().working = Some(12);
        let dirty: Vec<_> = walked.dirty_steps().collect();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].working, Some(12));
        assert_eq!(walked.measured_working(), 1);
        assert_eq!(walked.measured_waiting(), 0);
    }

    #[test]
    fn tail_mut_on_empty_chain_fails() {
        let mut chain = StepChain::empty(key());
        assert!(matches!(
            chain.tail_mut(),
            Err(ProcessError::EmptyChain { .. })
        ));
    }
}
