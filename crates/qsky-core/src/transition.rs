//! The twelve lifecycle transitions.
//!
//! [`Transition::for_state`] is the whole dispatch table: one exhaustive
//! match, so a new [`CustomerState`] does not compile until it is wired.
//! Each handler stages its writes in the caller's [`UnitOfWork`] and never
//! commits on its own.

use chrono::{DateTime, Utc};
use qsky_db::Store;
use qsky_types::{Customer, CustomerKey, CustomerState, StatusChange, Step};

use crate::aggregate::{elapsed_ms, record_waiting, record_working};
use crate::chain::StepChain;
use crate::error::ProcessError;
use crate::registry;
use crate::session::UnitOfWork;

/// What a status change does to a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Dismissed for not showing up: close the current step, leave the queue.
    Kick,
    /// Join a queue: start a fresh step chain.
    StandInService,
    /// Recalled from the postponed list: measure the wait, open a new step.
    WaitAfterPostponed,
    /// Next part of a multi-stage service: close work, open a new step.
    WaitNextComplexService,
    /// Called to a counter, registering the customer if it is unknown.
    Invite,
    /// Called again within an ongoing chain.
    InviteSecondary,
    /// Sent to another queue: close work, open a step there.
    Redirect,
    /// Work started: measure the wait.
    StartWork,
    /// Work restarted within an ongoing chain: measure the wait.
    StartWorkSecondary,
    /// Returned to an earlier queue: close work, open a step there.
    Back,
    /// Served: close work, record the departure, leave the queue.
    Finish,
    /// Parked: close work, open a postponed step.
    Postpone,
}

/// Inputs shared by every handler of one event.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    /// The event being applied.
    pub event: &'a StatusChange,
    /// The decoded state of the event.
    pub state: CustomerState,
    /// Timestamp used for every step mutation of the event.
    pub now: DateTime<Utc>,
    /// Working duration used by FINISH when the stage never started.
    pub finish_fallback_ms: i64,
}

impl EventContext<'_> {
    /// Key of the customer the event refers to.
    pub const fn key(&self) -> CustomerKey {
        CustomerKey::new(self.event.branch_id, self.event.customer_id)
    }
}

impl Transition {
    /// The transition a state change triggers.
    pub const fn for_state(state: CustomerState) -> Self {
        match state {
            CustomerState::Dead => Self::Kick,
            CustomerState::Wait => Self::StandInService,
            CustomerState::WaitAfterPostponed => Self::WaitAfterPostponed,
            CustomerState::WaitComplexService => Self::WaitNextComplexService,
            CustomerState::Invited => Self::Invite,
            CustomerState::InvitedSecondary => Self::InviteSecondary,
            CustomerState::Redirect => Self::Redirect,
            CustomerState::Work => Self::StartWork,
            CustomerState::WorkSecondary => Self::StartWorkSecondary,
            CustomerState::Back => Self::Back,
            CustomerState::Finish => Self::Finish,
            CustomerState::Postponed => Self::Postpone,
        }
    }

    /// Stable name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Kick => "kick",
            Self::StandInService => "stand_in_service",
            Self::WaitAfterPostponed => "wait_after_postponed",
            Self::WaitNextComplexService => "wait_next_complex_service",
            Self::Invite => "invite",
            Self::InviteSecondary => "invite_secondary",
            Self::Redirect => "redirect",
            Self::StartWork => "start_work",
            Self::StartWorkSecondary => "start_work_secondary",
            Self::Back => "back",
            Self::Finish => "finish",
            Self::Postpone => "postpone",
        }
    }

    /// Stage the transition's writes.
    ///
    /// A terminal state also takes the customer out of the queue ordering,
    /// in the same unit of work.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProcessError`] a handler hits; the unit of work
    /// must then be dropped.
    pub async fn apply<S: Store>(
        self,
        uow: &mut UnitOfWork<'_, S>,
        ctx: &EventContext<'_>,
    ) -> Result<(), ProcessError> {
        match self {
            Self::Kick => kick(uow, ctx).await,
            Self::StandInService => stand_in_service(uow, ctx).await,
            Self::WaitAfterPostponed => wait_after_postponed(uow, ctx).await,
            Self::WaitNextComplexService | Self::Redirect | Self::Back => {
                hand_over(uow, ctx).await
            }
            Self::Invite => invite(uow, ctx).await,
            Self::InviteSecondary => invite_secondary(uow, ctx).await,
            Self::StartWork | Self::StartWorkSecondary => start_work(uow, ctx).await,
            Self::Finish => finish(uow, ctx).await,
            Self::Postpone => postpone(uow, ctx).await,
        }?;
        if ctx.state.is_terminal() {
            registry::remove(uow, ctx.key()).await?;
        }
        Ok(())
    }
}

impl core::fmt::Display for Transition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

async fn stand_in_service<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    ctx: &EventContext<'_>,
) -> Result<(), ProcessError> {
    let key = ctx.key();
    let mut customer = uow
        .customer(key)
        .await?
        .unwrap_or_else(|| Customer::new(key));
    if let Some(service_id) = ctx.event.service_id.filter(|s| s.is_assigned()) {
        customer.service_id = Some(service_id);
    }
    customer.number = ctx.event.number;
    customer.prefix.clone_from(&ctx.event.prefix);
    customer.state = Some(ctx.state);

    let chain = StepChain::start(
        key,
        Step::open(key, ctx.event.service_id, ctx.state, ctx.now),
    );
    customer.first_step = chain.head().map(|s| s.id);

    uow.put_chain(&chain);
    uow.put_customer(customer);
    Ok(())
}

async fn kick<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    ctx: &EventContext<'_>,
) -> Result<(), ProcessError> {
    let mut customer = uow.require_customer(ctx.key()).await?;
    customer.state = Some(ctx.state);

    let mut chain = uow.chain(&customer).await?;
    if !chain.is_empty() {
        let tail = chain.tail_mut()?;
        tail.finish_state = Some(ctx.state);
        tail.finish_time = Some(ctx.now);
        tail.employee_id = ctx.event.employee_id;
        uow.put_chain(&chain);
    }
    uow.put_customer(customer);
    Ok(())
}

async fn wait_after_postponed<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    ctx: &EventContext<'_>,
) -> Result<(), ProcessError> {
    let key = ctx.key();
    let mut customer = uow.require_customer(key).await?;
    customer.state = Some(ctx.state);
    customer.service_id = ctx.event.service_id;

    let mut chain = uow.chain(&customer).await?;
    let sample = {
        let tail = chain.tail_mut()?;
        tail.employee_id = ctx.event.employee_id;
        tail.finish_time = Some(ctx.now);
        tail.finish_state = Some(ctx.state);
        let waiting = elapsed_ms(tail.start_time.unwrap_or(tail.stand_time), ctx.now);
        tail.waiting = Some(waiting);
        waiting
    };
    record_waiting(&mut customer, &chain, sample);
    chain.append(Step::open(key, ctx.event.service_id, ctx.state, ctx.now));

    uow.put_chain(&chain);
    uow.put_customer(customer);
    Ok(())
}

/// WAIT_COMPLEX_SERVICE, REDIRECT and BACK: close the working step and
/// queue the customer for the event's service.
async fn hand_over<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    ctx: &EventContext<'_>,
) -> Result<(), ProcessError> {
    let key = ctx.key();
    let mut customer = uow.require_customer(key).await?;
    customer.state = Some(ctx.state);
    customer.service_id = ctx.event.service_id;

    let mut chain = uow.chain(&customer).await?;
    let sample = close_working(&mut chain, ctx)?;
    record_working(&mut customer, &chain, sample);
    chain.append(Step::open(key, ctx.event.service_id, ctx.state, ctx.now));

    uow.put_chain(&chain);
    uow.put_customer(customer);
    Ok(())
}

async fn postpone<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    ctx: &EventContext<'_>,
) -> Result<(), ProcessError> {
    let key = ctx.key();
    let mut customer = uow.require_customer(key).await?;
    customer.state = Some(ctx.state);

    let mut chain = uow.chain(&customer).await?;
    let sample = close_working(&mut chain, ctx)?;
    record_working(&mut customer, &chain, sample);
    chain.append(Step::open(key, customer.service_id, ctx.state, ctx.now));

    uow.put_chain(&chain);
    uow.put_customer(customer);
    Ok(())
}

async fn invite<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    ctx: &EventContext<'_>,
) -> Result<(), ProcessError> {
    let key = ctx.key();
    let queued = uow
        .customer(key)
        .await?
        .is_some_and(|c| c.first_step.is_some());
    if !queued {
        // Tickets from a pre-printed roll, or customers only placed in the
        // ordering, are called without ever queueing.
        tracing::info!(
            branch_id = %key.branch_id,
            customer_id = %key.customer_id,
            "Invited customer has no step chain, queueing it first"
        );
        let wait = EventContext {
            state: CustomerState::Wait,
            ..*ctx
        };
        stand_in_service(uow, &wait).await?;
    }
    invite_secondary(uow, ctx).await
}

async fn invite_secondary<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    ctx: &EventContext<'_>,
) -> Result<(), ProcessError> {
    let mut customer = uow.require_customer(ctx.key()).await?;
    customer.state = Some(ctx.state);
    customer.employee_id = ctx.event.employee_id;
    uow.put_customer(customer);
    Ok(())
}

async fn start_work<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    ctx: &EventContext<'_>,
) -> Result<(), ProcessError> {
    let mut customer = uow.require_customer(ctx.key()).await?;
    let service_id = ctx.event.service_id.filter(|s| s.is_assigned());
    if service_id.is_some() {
        customer.service_id = service_id;
    }
    customer.state = Some(ctx.state);

    let mut chain = uow.chain(&customer).await?;
    let sample = {
        let tail = chain.tail_mut()?;
        tail.employee_id = ctx.event.employee_id;
        if service_id.is_some() {
            tail.service_id = service_id;
        }
        tail.start_time = Some(ctx.now);
        let waiting = elapsed_ms(tail.stand_time, ctx.now);
        tail.waiting = Some(waiting);
        waiting
    };
    record_waiting(&mut customer, &chain, sample);

    uow.put_chain(&chain);
    uow.put_customer(customer);
    Ok(())
}

async fn finish<S: Store>(
    uow: &mut UnitOfWork<'_, S>,
    ctx: &EventContext<'_>,
) -> Result<(), ProcessError> {
    let key = ctx.key();
    let mut customer = uow.require_customer(key).await?;
    customer.state = Some(ctx.state);

    let mut chain = uow.chain(&customer).await?;
    let sample = {
        let tail = chain.tail_mut()?;
        tail.employee_id = ctx.event.employee_id;
        tail.finish_state = Some(ctx.state);
        tail.finish_time = Some(ctx.now);
        let working = tail.start_time.map_or_else(
            || {
                tracing::warn!(
                    branch_id = %key.branch_id,
                    customer_id = %key.customer_id,
                    step = %tail.id,
                    fallback_ms = ctx.finish_fallback_ms,
                    "Finished a stage that never started"
                );
                ctx.finish_fallback_ms
            },
            |start| elapsed_ms(start, ctx.now),
        );
        tail.working = Some(working);
        working
    };
    record_working(&mut customer, &chain, sample);

    let mut departure = Step::open(key, customer.service_id, ctx.state, ctx.now);
    departure.employee_id = ctx.event.employee_id;
    departure.finish_time = Some(ctx.now);
    departure.finish_state = Some(ctx.state);
    chain.append(departure);

    uow.put_chain(&chain);
    uow.put_customer(customer);
    Ok(())
}

/// Close the tail as a finished working stage and return its duration.
fn close_working(chain: &mut StepChain, ctx: &EventContext<'_>) -> Result<i64, ProcessError> {
    let key = chain.key();
    let tail = chain.tail_mut()?;
    let start = tail.start_time.ok_or(ProcessError::MissingStartTime {
        key,
        step: tail.id,
    })?;
    tail.employee_id = ctx.event.employee_id;
    tail.finish_time = Some(ctx.now);
    tail.finish_state = Some(ctx.state);
    let working = elapsed_ms(start, ctx.now);
    tail.working = Some(working);
    Ok(working)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_has_a_distinct_transition() {
        let transitions: std::collections::HashSet<_> = CustomerState::ALL
            .into_iter()
            .map(Transition::for_state)
            .collect();
        assert_eq!(transitions.len(), CustomerState::ALL.len());
    }

    #[test]
    fn table_matches_wire_codes() {
        let by_code = |code| CustomerState::from_code(code).map(Transition::for_state);
        assert_eq!(by_code(0), Ok(Transition::Kick));
        assert_eq!(by_code(1), Ok(Transition::StandInService));
        assert_eq!(by_code(4), Ok(Transition::Invite));
        assert_eq!(by_code(7), Ok(Transition::StartWork));
        assert_eq!(by_code(10), Ok(Transition::Finish));
        assert_eq!(by_code(11), Ok(Transition::Postpone));
        assert!(by_code(12).is_err());
    }

    #[test]
    fn names_are_snake_case() {
        assert_eq!(
            Transition::WaitNextComplexService.to_string(),
            "wait_next_complex_service"
        );
        assert_eq!(Transition::Kick.name(), "kick");
    }
}
