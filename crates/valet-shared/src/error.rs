use thiserror::Error;

use crate::types::{CarId, EmployeeId, ShiftId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValetError {
    #[error("Shift not found: {0}")]
    ShiftNotFound(ShiftId),

    #[error("Car {car} not found in shift {shift}")]
    CarNotFound { shift: ShiftId, car: CarId },

    #[error("Employee not found: {0}")]
    EmployeeNotFound(EmployeeId),

    #[error("No shift found for code {0}")]
    CodeNotFound(String),

    #[error("Shift {0} has already ended")]
    ShiftEnded(ShiftId),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Sync transport error: {0}")]
    SyncTransport(String),

    #[error("No unique shift code after {0} attempts")]
    DuplicateCodeCollision(usize),

    #[error("Invalid shift record: {0}")]
    InvalidRecord(#[from] RecordError),
}

impl ValetError {
    /// `true` when the referenced entity is absent, as opposed to a rejected
    /// or failed operation.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ValetError::ShiftNotFound(_)
                | ValetError::CarNotFound { .. }
                | ValetError::EmployeeNotFound(_)
                | ValetError::CodeNotFound(_)
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("Invalid shift code: {0}")]
    Code(#[from] CodeError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("expected {expected} characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("character {0:?} is not allowed")]
    InvalidCharacter(char),
}

/// Reject blank required fields.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(())
}

/// Failure converting a persisted record back into the entity model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Timestamp out of range: {0}")]
    InvalidTimestamp(i64),

    #[error("Invalid display color: {0}")]
    InvalidColor(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Invalid shift field: {0}")]
    Field(#[from] ValidationError),

    #[error("Invalid car {car}: {source}")]
    InvalidCar {
        car: CarId,
        #[source]
        source: ValidationError,
    },
}
