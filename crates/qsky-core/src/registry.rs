//! Doubly-linked ordering of the customers of a branch.
//!
//! Links are customer ids stored on the records themselves. A splice
//! rewrites at most four records (the customer, its old neighbors, its new
//! neighbors), all staged in the same [`UnitOfWork`], so the ordering is
//! either fully updated or left as it was.
//!
//! Invariant: for every customer `c`, `c.before = Some(p)` implies
//! `p.after = Some(c)` and `c.after = Some(n)` implies `n.before = Some(c)`.

use std::collections::{BTreeMap, BTreeSet};

use qsky_db::Store;
use qsky_types::{BranchId, Customer, CustomerId, CustomerKey, InsertCustomer};

use crate::error::ProcessError;
use crate::session::UnitOfWork;

/// Place a customer between two others, creating it if unknown.
///
/// With only one neighbor given, the other side is that neighbor's current
/// link, so the customer is squeezed in next to it. A customer that is
/// already placed is detached first. A neighbor id with no record is
/// treated as the end of the list.
///
/// # Errors
///
/// - [`ProcessError::InvalidSplice`] when the customer is its own neighbor
///   or the same customer is named on both sides.
/// - [`ProcessError::NotAdjacent`] when both neighbors are given but are
///   not next to each other. A placed predecessor with no successor may be
///   joined to an unplaced successor, and the other way round.
/// - [`ProcessError::BrokenQueue`] when an existing link is dangling.
pub async fn insert<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    request: &InsertCustomer,
) -> Result<(), ProcessError> {
    let key = CustomerKey::new(request.branch_id, request.customer_id);
    if request.before == Some(key.customer_id) || request.after == Some(key.customer_id) {
        return Err(ProcessError::InvalidSplice {
            key,
            reason: "customer cannot be its own neighbor",
        });
    }
    if request.before.is_some() && request.before == request.after {
        return Err(ProcessError::InvalidSplice {
            key,
            reason: "same neighbor on both sides",
        });
    }

    let mut customer = match uow.customer(key).await? {
        Some(existing) => existing,
        None => {
            let mut fresh = Customer::new(key);
            fresh.service_id = request.service_id.filter(|s| s.is_assigned());
            fresh
        }
    };
    if customer.is_linked() {
        detach(uow, &mut customer).await?;
    }

    let before = neighbor(uow, key.branch_id, request.before).await?;
    let after = neighbor(uow, key.branch_id, request.after).await?;

    let (before, after) = match (before, after) {
        (Some(b), None) => {
            let next = linked(uow, key.branch_id, b.after).await?;
            (Some(b), next)
        }
        (None, Some(a)) => {
            let prev = linked(uow, key.branch_id, a.before).await?;
            (prev, Some(a))
        }
        (Some(b), Some(a)) => {
            let adjacent = b.after == Some(a.customer_id) && a.before == Some(b.customer_id);
            // Joining a tail to a head is only safe if they are not the
            // ends of the same queue.
            let open_ends = b.after.is_none()
                && a.before.is_none()
                && (!b.is_linked() || !a.is_linked());
            if !adjacent && !open_ends {
                return Err(ProcessError::NotAdjacent {
                    key,
                    before: b.customer_id,
                    after: a.customer_id,
                });
            }
            (Some(b), Some(a))
        }
        (None, None) => (None, None),
    };

    customer.before = before.as_ref().map(|b| b.customer_id);
    customer.after = after.as_ref().map(|a| a.customer_id);
    if let Some(mut b) = before {
        b.after = Some(key.customer_id);
        uow.put_customer(b);
    }
    if let Some(mut a) = after {
        a.before = Some(key.customer_id);
        uow.put_customer(a);
    }

    tracing::debug!(
        branch_id = %key.branch_id,
        customer_id = %key.customer_id,
        before = ?customer.before,
        after = ?customer.after,
        "Customer placed"
    );
    uow.put_customer(customer);
    Ok(())
}

/// Take a customer out of the ordering, joining its neighbors.
///
/// Returns `false`, and stages nothing, when the customer is unknown or
/// not placed.
///
/// # Errors
///
/// Returns [`ProcessError::BrokenQueue`] when a neighbor link is dangling.
pub async fn remove<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    key: CustomerKey,
) -> Result<bool, ProcessError> {
    let Some(mut customer) = uow.customer(key).await? else {
        return Ok(false);
    };
    if !customer.is_linked() {
        return Ok(false);
    }
    detach(uow, &mut customer).await?;
    uow.put_customer(customer);
    Ok(true)
}

/// Unlink `customer` from its neighbors and stage the neighbors.
///
/// The customer itself is cleared but not staged; the caller owns it.
///
/// # Errors
///
/// Returns [`ProcessError::BrokenQueue`] when a neighbor is missing or does
/// not point back at the customer.
pub async fn detach<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    customer: &mut Customer,
) -> Result<(), ProcessError> {
    let branch_id = customer.branch_id;
    let id = customer.customer_id;

    if let Some(prev_id) = customer.before {
        let mut prev = linked(uow, branch_id, Some(prev_id))
            .await?
            .filter(|p| p.after == Some(id))
            .ok_or(ProcessError::BrokenQueue {
                branch_id,
                customer_id: prev_id,
            })?;
        prev.after = customer.after;
        uow.put_customer(prev);
    }
    if let Some(next_id) = customer.after {
        let mut next = linked(uow, branch_id, Some(next_id))
            .await?
            .filter(|n| n.before == Some(id))
            .ok_or(ProcessError::BrokenQueue {
                branch_id,
                customer_id: next_id,
            })?;
        next.before = customer.before;
        uow.put_customer(next);
    }

    customer.before = None;
    customer.after = None;
    Ok(())
}

/// A requested neighbor; a missing record means "end of list".
async fn neighbor<S: Store>(
    uow: &UnitOfWork<'_, S>,
    branch_id: BranchId,
    id: Option<CustomerId>,
) -> Result<Option<Customer>, ProcessError> {
    let Some(id) = id else {
        return Ok(None);
    };
    let found = uow.customer(CustomerKey::new(branch_id, id)).await?;
    if found.is_none() {
        tracing::warn!(
            branch_id = %branch_id,
            customer_id = %id,
            "Neighbor not registered, treating as end of queue"
        );
    }
    Ok(found)
}

/// A customer reached through an existing link; it must exist.
async fn linked<S: Store>(
    uow: &UnitOfWork<'_, S>,
    branch_id: BranchId,
    id: Option<CustomerId>,
) -> Result<Option<Customer>, ProcessError> {
    let Some(id) = id else {
        return Ok(None);
    };
    uow.customer(CustomerKey::new(branch_id, id))
        .await?
        .map(Some)
        .ok_or(ProcessError::BrokenQueue {
            branch_id,
            customer_id: id,
        })
}

/// Every queue of a branch, each walked head to tail.
///
/// Customers that are not placed are left out. Queues are ordered by the
/// id of their head.
///
/// # Errors
///
/// Returns [`ProcessError::BrokenQueue`] when a walk hits a dangling link,
/// a back link that disagrees, or a cycle.
pub async fn queue_order<S: Store>(
    store: &S,
    branch_id: BranchId,
) -> Result<Vec<Vec<CustomerId>>, ProcessError> {
    let customers: BTreeMap<CustomerId, Customer> = store
        .customers_in_branch(branch_id)
        .await?
        .into_iter()
        .map(|c| (c.customer_id, c))
        .collect();

    let mut queues = Vec::new();
    let mut seen = BTreeSet::new();
    for head in customers
        .values()
        .filter(|c| c.before.is_none() && c.after.is_some())
    {
        let mut queue = Vec::new();
        let mut previous = None;
        let mut cursor = Some(head.customer_id);
        while let Some(id) = cursor {
            let node = customers
                .get(&id)
                .filter(|n| n.before == previous && seen.insert(id))
                .ok_or(ProcessError::BrokenQueue {
                    branch_id,
                    customer_id: id,
                })?;
            queue.push(id);
            previous = Some(id);
            cursor = node.after;
        }
        queues.push(queue);
    }

    Ok(queues)
}

/// Customers whose links violate the ordering invariant, ascending.
pub fn broken_links(customers: &[Customer]) -> Vec<CustomerId> {
    let by_id: BTreeMap<CustomerId, &Customer> =
        customers.iter().map(|c| (c.customer_id, c)).collect();
    let points_back = |target: Option<CustomerId>, check: &dyn Fn(&Customer) -> bool| {
        target.is_none_or(|id| by_id.get(&id).is_some_and(|n| check(*n)))
    };

    customers
        .iter()
        .filter(|c| {
            let id = Some(c.customer_id);
            !points_back(c.before, &|p| p.after == id) || !points_back(c.after, &|n| n.before == id)
        })
        .map(|c| c.customer_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
