//! Domain model and protocol types shared by every valet crate.

pub mod code;
pub mod constants;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod merge;
pub mod models;
pub mod protocol;
pub mod types;

pub use code::ShiftCode;
pub use error::{CodeError, RecordError, ValetError, ValidationError};
pub use identity::Identity;
pub use lifecycle::{CarState, ReturnConfirmation, ReturnOutcome};
pub use merge::{merge_shift, ShiftTable};
pub use models::{Car, Employee, NewCar, Shift};
pub use protocol::{CarRecord, EmployeeRecord, ShiftRecord};
pub use types::{CarId, Coordinate, DisplayColor, EmployeeId, ParticipantId, PhotoRef, ShiftId};
