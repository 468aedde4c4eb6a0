//! Entity model: employees, cars and shifts.
//!
//! Identity fields are public and immutable in practice. State that carries
//! an invariant (a car's departure, a shift's end time, car and employee
//! lists) is private and changes only through the methods below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::code::ShiftCode;
use crate::error::{require_non_empty, ValetError, ValidationError};
use crate::identity::names_match;
use crate::lifecycle::{CarState, ReturnOutcome};
use crate::types::{CarId, Coordinate, DisplayColor, EmployeeId, PhotoRef, ShiftId};

// ---------------------------------------------------------------------------
// Employee
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub color: DisplayColor,
}

impl Employee {
    /// Create an employee with a fresh id and a random display color.
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        require_non_empty("employee name", name)?;
        Ok(Self {
            id: EmployeeId::new(),
            name: name.trim().to_string(),
            color: DisplayColor::random(),
        })
    }

    pub fn is_named(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }
}

// ---------------------------------------------------------------------------
// Car
// ---------------------------------------------------------------------------

/// Everything the attendant supplies when checking a car in.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCar {
    pub license_plate: String,
    pub make: String,
    pub model: String,
    pub color: String,
    pub location: String,
    pub parked_by: Option<Employee>,
    pub photo: Option<PhotoRef>,
    pub coordinate: Option<Coordinate>,
}

impl NewCar {
    pub fn new(
        license_plate: impl Into<String>,
        make: impl Into<String>,
        model: impl Into<String>,
        color: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            license_plate: license_plate.into(),
            make: make.into(),
            model: model.into(),
            color: color.into(),
            location: location.into(),
            parked_by: None,
            photo: None,
            coordinate: None,
        }
    }

    pub fn parked_by(mut self, employee: Employee) -> Self {
        self.parked_by = Some(employee);
        self
    }

    pub fn photo(mut self, photo: PhotoRef) -> Self {
        self.photo = Some(photo);
        self
    }

    pub fn coordinate(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinate = Some(Coordinate::new(latitude, longitude));
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("license plate", &self.license_plate)?;
        require_non_empty("make", &self.make)?;
        require_non_empty("model", &self.model)?;
        require_non_empty("color", &self.color)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    pub license_plate: String,
    pub make: String,
    pub model: String,
    pub color: String,
    pub location: String,
    pub coordinate: Option<Coordinate>,
    pub photo: Option<PhotoRef>,
    pub parked_by: Option<Employee>,
    pub arrival_time: DateTime<Utc>,
    departure_time: Option<DateTime<Utc>>,
}

impl Car {
    /// Check a car in. The car starts `Active`.
    pub fn check_in(new: NewCar, at: DateTime<Utc>) -> Result<Self, ValidationError> {
        new.validate()?;
        Ok(Self {
            id: CarId::new(),
            license_plate: new.license_plate,
            make: new.make,
            model: new.model,
            color: new.color,
            location: new.location,
            coordinate: new.coordinate,
            photo: new.photo,
            parked_by: new.parked_by,
            arrival_time: at,
            departure_time: None,
        })
    }

    /// Rebuild a car from persisted state. A departure earlier than the
    /// arrival is clamped to the arrival.
    pub(crate) fn restore(
        id: CarId,
        new: NewCar,
        arrival_time: DateTime<Utc>,
        departure_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            license_plate: new.license_plate,
            make: new.make,
            model: new.model,
            color: new.color,
            location: new.location,
            coordinate: new.coordinate,
            photo: new.photo,
            parked_by: new.parked_by,
            arrival_time,
            departure_time: departure_time.map(|d| d.max(arrival_time)),
        }
    }

    pub fn departure_time(&self) -> Option<DateTime<Utc>> {
        self.departure_time
    }

    pub fn is_returned(&self) -> bool {
        self.departure_time.is_some()
    }

    pub fn state(&self) -> CarState {
        if self.is_returned() {
            CarState::Returned
        } else {
            CarState::Active
        }
    }

    /// `Active -> Returned`. A second call leaves the departure untouched.
    pub(crate) fn mark_returned(&mut self, at: DateTime<Utc>) -> ReturnOutcome {
        if self.departure_time.is_some() {
            return ReturnOutcome::AlreadyReturned;
        }
        self.departure_time = Some(at.max(self.arrival_time));
        ReturnOutcome::Returned
    }
}

// ---------------------------------------------------------------------------
// Shift
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub customer_name: String,
    pub address: String,
    pub start_time: DateTime<Utc>,
    code: ShiftCode,
    end_time: Option<DateTime<Utc>>,
    cars: Vec<Car>,
    employees: Vec<Employee>,
}

impl Shift {
    pub fn start(
        customer_name: &str,
        address: &str,
        code: ShiftCode,
        at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        require_non_empty("customer name", customer_name)?;
        require_non_empty("address", address)?;
        Ok(Self {
            id: ShiftId::new(),
            customer_name: customer_name.trim().to_string(),
            address: address.trim().to_string(),
            start_time: at,
            code,
            end_time: None,
            cars: Vec::new(),
            employees: Vec::new(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: ShiftId,
        customer_name: String,
        address: String,
        start_time: DateTime<Utc>,
        code: ShiftCode,
        end_time: Option<DateTime<Utc>>,
        cars: Vec<Car>,
        employees: Vec<Employee>,
    ) -> Self {
        Self {
            id,
            customer_name,
            address,
            start_time,
            code,
            end_time: end_time.map(|e| e.max(start_time)),
            cars,
            employees,
        }
    }

    pub fn code(&self) -> &ShiftCode {
        &self.code
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn car(&self, id: CarId) -> Option<&Car> {
        self.cars.iter().find(|c| c.id == id)
    }

    pub fn active_cars(&self) -> impl Iterator<Item = &Car> {
        self.cars.iter().filter(|c| !c.is_returned())
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn employee_named(&self, name: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| e.is_named(name))
    }

    /// End the shift. Returns `false` if it had already ended, in which
    /// case the original end time is kept.
    pub fn end(&mut self, at: DateTime<Utc>) -> bool {
        if self.end_time.is_some() {
            return false;
        }
        self.end_time = Some(at.max(self.start_time));
        true
    }

    /// Check a car in. The parking employee, if any, must be on this shift's
    /// roster: the snapshot carries only the employee's id, and other
    /// devices resolve it against the roster.
    pub fn check_in(&mut self, new: NewCar, at: DateTime<Utc>) -> Result<&Car, ValetError> {
        self.ensure_open()?;
        if let Some(employee) = &new.parked_by {
            if !self.employees.iter().any(|e| e.id == employee.id) {
                return Err(ValetError::EmployeeNotFound(employee.id));
            }
        }
        let car = Car::check_in(new, at)?;
        self.cars.push(car);
        Ok(&self.cars[self.cars.len() - 1])
    }

    pub fn return_car(
        &mut self,
        car: CarId,
        at: DateTime<Utc>,
    ) -> Result<ReturnOutcome, ValetError> {
        let shift = self.id;
        let car = self
            .cars
            .iter_mut()
            .find(|c| c.id == car)
            .ok_or(ValetError::CarNotFound { shift, car })?;
        Ok(car.mark_returned(at))
    }

    pub fn add_employee(&mut self, employee: Employee) -> Result<(), ValetError> {
        self.ensure_open()?;
        self.employees.push(employee);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ValetError> {
        if self.is_ended() {
            return Err(ValetError::ShiftEnded(self.id));
        }
        Ok(())
    }
}
