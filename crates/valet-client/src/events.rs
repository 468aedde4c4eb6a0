use serde::Serialize;
use tokio::sync::broadcast;

use valet_shared::{CarId, EmployeeId, ShiftCode, ShiftId};

pub const EVENT_SHIFT_STARTED: &str = "shift-started";
pub const EVENT_SHIFT_ENDED: &str = "shift-ended";
pub const EVENT_CAR_CHECKED_IN: &str = "car-checked-in";
pub const EVENT_CAR_RETURNED: &str = "car-returned";
pub const EVENT_EMPLOYEE_ADDED: &str = "employee-added";
pub const EVENT_SHIFT_MERGED: &str = "shift-merged";

/// Registry change notifications for views and other collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ShiftEvent {
    ShiftStarted { shift_id: ShiftId, code: ShiftCode },
    ShiftEnded { shift_id: ShiftId },
    CarCheckedIn { shift_id: ShiftId, car_id: CarId },
    CarReturned { shift_id: ShiftId, car_id: CarId },
    /// `shift_id` is `None` for the device-wide roster.
    EmployeeAdded {
        shift_id: Option<ShiftId>,
        employee_id: EmployeeId,
        name: String,
    },
    /// A remote snapshot changed the local copy.
    ShiftMerged { shift_id: ShiftId },
}

impl ShiftEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ShiftEvent::ShiftStarted { .. } => EVENT_SHIFT_STARTED,
            ShiftEvent::ShiftEnded { .. } => EVENT_SHIFT_ENDED,
            ShiftEvent::CarCheckedIn { .. } => EVENT_CAR_CHECKED_IN,
            ShiftEvent::CarReturned { .. } => EVENT_CAR_RETURNED,
            ShiftEvent::EmployeeAdded { .. } => EVENT_EMPLOYEE_ADDED,
            ShiftEvent::ShiftMerged { .. } => EVENT_SHIFT_MERGED,
        }
    }

    pub fn shift_id(&self) -> Option<ShiftId> {
        match self {
            ShiftEvent::ShiftStarted { shift_id, .. }
            | ShiftEvent::ShiftEnded { shift_id }
            | ShiftEvent::CarCheckedIn { shift_id, .. }
            | ShiftEvent::CarReturned { shift_id, .. }
            | ShiftEvent::ShiftMerged { shift_id } => Some(*shift_id),
            ShiftEvent::EmployeeAdded { shift_id, .. } => *shift_id,
        }
    }
}

pub fn emit_event(tx: &broadcast::Sender<ShiftEvent>, event: ShiftEvent) {
    let name = event.name();
    // No receivers is the normal headless case.
    if tx.send(event).is_err() {
        tracing::trace!(event = name, "No event subscribers");
    }
}
