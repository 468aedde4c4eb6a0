//! Join-by-code.
//!
//! A device joining a shift it did not create has no local copy, so the code
//! is always resolved against the remote store. The snapshot found there is
//! adopted into the registry and the participant is attached to it. Every
//! failure happens before the first local mutation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use valet_shared::error::require_non_empty;
use valet_shared::{Employee, Shift, ShiftCode, ShiftRecord, ValetError, ValidationError};
use valet_sync::{fetch_with_timeout, SyncGateway};

use crate::registry::ShiftStore;

#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub shift: Shift,
    pub employee: Employee,
    /// `true` when a roster entry with the same name already existed and was
    /// reused.
    pub rejoined: bool,
}

#[derive(Clone)]
pub struct JoinProtocol {
    gateway: Arc<dyn SyncGateway>,
    timeout: Duration,
}

impl JoinProtocol {
    pub fn new(gateway: Arc<dyn SyncGateway>, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    /// Resolve `code` remotely and attach `name` to the shift it names.
    pub async fn join(
        &self,
        store: &mut ShiftStore,
        code: &str,
        name: &str,
    ) -> Result<JoinOutcome, ValetError> {
        require_non_empty("employee name", name)?;
        let record = self.resolve(code).await?;
        attach(store, &record, name)
    }

    /// Look a code up in the remote store.
    pub async fn resolve(&self, code: &str) -> Result<ShiftRecord, ValetError> {
        let code = ShiftCode::parse(code).map_err(ValidationError::from)?;

        match fetch_with_timeout(self.gateway.as_ref(), &code, self.timeout).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                info!(code = %code, "No shift found for code");
                Err(ValetError::CodeNotFound(code.to_string()))
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Shift lookup failed");
                Err(ValetError::SyncTransport(e.to_string()))
            }
        }
    }
}

/// Attach `name` to a resolved shift. A participant already on the roster
/// (case-insensitive name match) is returned as-is.
pub fn attach(
    store: &mut ShiftStore,
    record: &ShiftRecord,
    name: &str,
) -> Result<JoinOutcome, ValetError> {
    require_non_empty("employee name", name)?;

    let ended_locally = store.shift(record.id).is_some_and(|s| s.is_ended());
    if record.is_ended() || ended_locally {
        info!(shift_id = %record.id, "Refusing to join an ended shift");
        return Err(ValetError::ShiftEnded(record.id));
    }

    let shift = store.adopt_remote(record)?;
    if let Some(employee) = shift.employee_named(name) {
        info!(shift_id = %shift.id, name = %employee.name, "Participant already on roster");
        let employee = employee.clone();
        return Ok(JoinOutcome {
            shift,
            employee,
            rejoined: true,
        });
    }

    let employee = store.add_employee_to_shift(name, shift.id)?;
    let shift = store
        .shift(shift.id)
        .cloned()
        .ok_or(ValetError::ShiftNotFound(shift.id))?;

    Ok(JoinOutcome {
        shift,
        employee,
        rejoined: false,
    })
}
