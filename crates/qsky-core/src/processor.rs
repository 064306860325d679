//! The one-way event API.
//!
//! [`CustomerEvents`] is what a transport layer calls for every message a
//! branch server sends. Each event is applied under its branch's lock as
//! one unit of work and committed once. The `change_*`, `insert_*`,
//! `remove_*` and `send_*` entry points return nothing: failures are logged
//! and the unit of work is discarded. The `process_*` variants return the
//! outcome for callers that need it, such as tests and replay tools.

use qsky_db::Store;
use qsky_types::{
    BranchId, CustomerId, CustomerKey, CustomerState, EmployeeName, InsertCustomer, PingReply,
    RemoveCustomer, ServiceName, StatusChange, Step,
};
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, QskyConfig};
use crate::error::ProcessError;
use crate::locks::LockTable;
use crate::registry;
use crate::session::UnitOfWork;
use crate::transition::{EventContext, Transition};
use crate::version::VersionRange;

/// Customer event processor over a [`Store`].
#[derive(Debug)]
pub struct CustomerEvents<S, C = SystemClock> {
    store: S,
    clock: C,
    locks: LockTable,
    names: Mutex<()>,
    versions: VersionRange,
    finish_fallback_ms: i64,
}

impl<S: Store> CustomerEvents<S> {
    /// Processor on the wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not
    /// validate.
    pub fn with_system_clock(store: S, config: &QskyConfig) -> Result<Self, ConfigError> {
        Self::new(store, SystemClock, config)
    }
}

impl<S: Store, C: Clock> CustomerEvents<S, C> {
    /// Build a processor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not
    /// validate.
    pub fn new(store: S, clock: C, config: &QskyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let invalid = |e: crate::version::VersionError| ConfigError::Invalid {
            reason: e.to_string(),
        };
        let versions = VersionRange::new(
            config.clients.min_version.parse().map_err(invalid)?,
            config.clients.max_version.parse().map_err(invalid)?,
        );
        Ok(Self {
            store,
            clock,
            locks: LockTable::new(config.processing.lock_shards),
            names: Mutex::new(()),
            versions,
            finish_fallback_ms: config.processing.finish_fallback_ms,
        })
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The time source stamped on steps.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Record a customer state change. Failures are logged, not returned.
    pub async fn change_customer_status(&self, event: StatusChange) {
        match self.process_status_change(&event).await {
            Ok(_) => {}
            Err(ProcessError::UnknownStatus(err)) => {
                tracing::warn!(
                    branch_id = %event.branch_id,
                    customer_id = %event.customer_id,
                    status = event.status,
                    error = %err,
                    "Dropping event with unknown status"
                );
            }
            Err(err) => {
                tracing::error!(
                    branch_id = %event.branch_id,
                    customer_id = %event.customer_id,
                    status = event.status,
                    error = %err,
                    "Status change rolled back"
                );
            }
        }
    }

    /// Record a customer state change and report the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::UnknownStatus`] for a code outside the
    /// lifecycle table (nothing is read or written), or the handler's
    /// error, in which case nothing was committed.
    pub async fn process_status_change(
        &self,
        event: &StatusChange,
    ) -> Result<Transition, ProcessError> {
        let state = CustomerState::from_code(event.status)?;
        let transition = Transition::for_state(state);
        let span = tracing::info_span!(
            "status_change",
            branch_id = %event.branch_id,
            customer_id = %event.customer_id,
            service_id = ?event.service_id,
            employee_id = ?event.employee_id,
            status = event.status,
            transition = transition.name(),
        );

        async {
            let _guard = self.locks.lock(event.branch_id).await;
            let ctx = EventContext {
                event,
                state,
                now: self.clock.now(),
                finish_fallback_ms: self.finish_fallback_ms,
            };
            let mut uow = UnitOfWork::new(&self.store);
            transition.apply(&mut uow, &ctx).await?;
            let records = uow.commit().await?;
            tracing::debug!(records, "Status change committed");
            Ok::<_, ProcessError>(transition)
        }
        .instrument(span)
        .await
    }

    /// Place a customer in its branch ordering. Failures are logged.
    pub async fn insert_customer(&self, request: InsertCustomer) {
        if let Err(err) = self.process_insert(&request).await {
            tracing::error!(
                branch_id = %request.branch_id,
                customer_id = %request.customer_id,
                error = %err,
                "Insert rolled back"
            );
        }
    }

    /// Place a customer in its branch ordering and report the outcome.
    ///
    /// # Errors
    ///
    /// Returns the splice error; nothing was committed in that case.
    pub async fn process_insert(&self, request: &InsertCustomer) -> Result<(), ProcessError> {
        let _guard = self.locks.lock(request.branch_id).await;
        let mut uow = UnitOfWork::new(&self.store);
        registry::insert(&mut uow, request).await?;
        uow.commit().await?;
        Ok(())
    }

    /// Take a customer out of its branch ordering. Failures are logged.
    pub async fn remove_customer(&self, request: RemoveCustomer) {
        if let Err(err) = self.process_remove(&request).await {
            tracing::error!(
                branch_id = %request.branch_id,
                customer_id = %request.customer_id,
                error = %err,
                "Remove rolled back"
            );
        }
    }

    /// Take a customer out of its branch ordering.
    ///
    /// Returns `false` if the customer was not placed; that is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::BrokenQueue`] or a store error; nothing was
    /// committed in that case.
    pub async fn process_remove(&self, request: &RemoveCustomer) -> Result<bool, ProcessError> {
        let key = CustomerKey::new(request.branch_id, request.customer_id);
        let _guard = self.locks.lock(request.branch_id).await;
        let mut uow = UnitOfWork::new(&self.store);
        let removed = registry::remove(&mut uow, key).await?;
        uow.commit().await?;
        Ok(removed)
    }

    /// Whether a branch server of the given version may connect.
    pub fn ping(&self, version: &str) -> PingReply {
        self.versions.ping(version)
    }

    /// Upsert the display name of a service. Failures are logged.
    pub async fn send_service_name(&self, service: ServiceName) {
        let (branch_id, service_id) = (service.branch_id, service.service_id);
        tracing::info!(%branch_id, %service_id, name = %service.name, "Service name");
        let _guard = self.names.lock().await;
        let mut changes = qsky_db::ChangeSet::new();
        changes.put_service_name(service);
        if let Err(err) = self.store.commit(changes).await {
            tracing::error!(%branch_id, %service_id, error = %err, "Service name not stored");
        }
    }

    /// Upsert the display name of an operator. Failures are logged.
    pub async fn send_user_name(&self, employee: EmployeeName) {
        let (branch_id, employee_id) = (employee.branch_id, employee.employee_id);
        tracing::info!(%branch_id, %employee_id, name = %employee.name, "Operator name");
        let _guard = self.names.lock().await;
        let mut changes = qsky_db::ChangeSet::new();
        changes.put_employee_name(employee);
        if let Err(err) = self.store.commit(changes).await {
            tracing::error!(%branch_id, %employee_id, error = %err, "Operator name not stored");
        }
    }

    /// Every queue of a branch, head to tail.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::BrokenQueue`] if the ordering is corrupt.
    pub async fn queue_order(
        &self,
        branch_id: BranchId,
    ) -> Result<Vec<Vec<CustomerId>>, ProcessError> {
        registry::queue_order(&self.store, branch_id).await
    }

    /// The customer's current step chain, head to tail.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::CustomerNotFound`] for an unknown customer
    /// or [`ProcessError::BrokenChain`] if the chain is corrupt.
    pub async fn customer_history(&self, key: CustomerKey) -> Result<Vec<Step>, ProcessError> {
        let uow = UnitOfWork::new(&self.store);
        let customer = uow.require_customer(key).await?;
        Ok(uow.chain(&customer).await?.into_steps())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use qsky_db::MemoryStore;
    use qsky_types::{EmployeeId, ServiceId};

    use super::*;
    use crate::clock::ManualClock;

    fn events() -> CustomerEvents<MemoryStore, ManualClock> {
        CustomerEvents::new(
            MemoryStore::new(),
            ManualClock::default(),
            &QskyConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn bad_version_range_is_rejected() {
        let mut config = QskyConfig::default();
        config.clients.max_version = "x".to_owned();
        let result = CustomerEvents::new(MemoryStore::new(), ManualClock::default(), &config);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn ping_uses_configured_range() {
        let mut config = QskyConfig::default();
        config.clients.min_version = "2.0".to_owned();
        config.clients.max_version = "2.5".to_owned();
        let events =
            CustomerEvents::new(MemoryStore::new(), ManualClock::default(), &config).unwrap();
        assert_eq!(events.ping("2.4.9").code(), 1);
        assert_eq!(events.ping("1.9").code(), -1);
        assert!(!events.ping("").supported);
    }

    #[tokio::test]
    async fn unknown_status_touches_nothing() {
        let events = events();
        let event = StatusChange {
            branch_id: BranchId(1),
            service_id: Some(ServiceId(10)),
            employee_id: None,
            customer_id: CustomerId(555),
            status: 42,
            number: None,
            prefix: None,
        };
        let result = events.process_status_change(&event).await;
        assert!(matches!(result, Err(ProcessError::UnknownStatus(_))));
        events.change_customer_status(event).await;
        assert_eq!(events.store().commit_count(), 0);
    }

    #[tokio::test]
    async fn names_are_upserted() {
        let events = events();
        for name in ["Loans", "Loans & Deposits"] {
            events
                .send_service_name(ServiceName {
                    branch_id: BranchId(1),
                    service_id: ServiceId(10),
                    name: name.to_owned(),
                })
                .await;
        }
        events
            .send_user_name(EmployeeName {
                branch_id: BranchId(1),
                employee_id: EmployeeId(7),
                name: "Counter 7".to_owned(),
            })
            .await;

        let store = events.store();
        let service = store
            .find_service_name(BranchId(1), ServiceId(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(service.name, "Loans & Deposits");
        let employee = store
            .find_employee_name(BranchId(1), EmployeeId(7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(employee.name, "Counter 7");
    }

    #[tokio::test]
    async fn failed_name_commit_is_swallowed() {
        let events = events();
        events.store().fail_next_commit();
        events
            .send_service_name(ServiceName {
                branch_id: BranchId(1),
                service_id: ServiceId(10),
                name: "Loans".to_owned(),
            })
            .await;
        assert!(events
            .store()
            .find_service_name(BranchId(1), ServiceId(10))
            .await
            .unwrap()
            .is_none());
    }
}
