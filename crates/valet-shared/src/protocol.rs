//! Persisted / wire layout of a shift snapshot.
//!
//! A shift travels as one full snapshot keyed by its id. Timestamps are epoch
//! milliseconds, the parking employee is referenced by id and photos by URL.
//! Records are JSON over HTTP and bincode in the local outbox, so fields
//! must not be conditionally skipped.

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::code::ShiftCode;
use crate::error::{require_non_empty, RecordError};
use crate::models::{Car, Employee, NewCar, Shift};
use crate::types::{CarId, Coordinate, DisplayColor, EmployeeId, PhotoRef, ShiftId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftRecord {
    pub id: ShiftId,
    pub customer_name: String,
    pub address: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub shift_code: ShiftCode,
    pub cars: Vec<CarRecord>,
    pub employees: Vec<EmployeeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarRecord {
    pub id: CarId,
    pub license_plate: String,
    pub make: String,
    pub model: String,
    pub color: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub photo_url: Option<String>,
    pub arrival_time: i64,
    pub departure_time: Option<i64>,
    pub returned: bool,
    pub parked_by: Option<EmployeeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub id: EmployeeId,
    pub name: String,
    pub color: String,
}

/// Current time at the precision records preserve.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, RecordError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(RecordError::InvalidTimestamp(ms))
}

impl ShiftRecord {
    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    /// Rebuild the entity model. Records from the wire get the same field
    /// checks as local input. The car's parking employee is looked up in
    /// this shift's roster first, then in `known`. An unresolvable reference
    /// is dropped.
    pub fn to_shift(&self, known: &[Employee]) -> Result<Shift, RecordError> {
        require_non_empty("customer name", &self.customer_name)?;
        require_non_empty("address", &self.address)?;

        let employees = self
            .employees
            .iter()
            .map(EmployeeRecord::to_employee)
            .collect::<Result<Vec<_>, _>>()?;

        let mut cars = Vec::with_capacity(self.cars.len());
        for record in &self.cars {
            let parked_by = match record.parked_by {
                Some(id) => {
                    let found = employees
                        .iter()
                        .chain(known.iter())
                        .find(|e| e.id == id)
                        .cloned();
                    if found.is_none() {
                        tracing::debug!(
                            shift_id = %self.id,
                            car_id = %record.id,
                            employee_id = %id,
                            "Parking employee unknown on this device"
                        );
                    }
                    found
                }
                None => None,
            };
            cars.push(record.to_car(parked_by)?);
        }

        Ok(Shift::restore(
            self.id,
            self.customer_name.clone(),
            self.address.clone(),
            from_millis(self.start_time)?,
            self.shift_code.clone(),
            self.end_time.map(from_millis).transpose()?,
            cars,
            employees,
        ))
    }

    /// Serialize to binary (bincode)
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        bincode::serialize(self).map_err(|e| RecordError::Encoding(e.to_string()))
    }

    /// Deserialize from binary
    pub fn from_bytes(data: &[u8]) -> Result<Self, RecordError> {
        bincode::deserialize(data).map_err(|e| RecordError::Encoding(e.to_string()))
    }
}

impl From<&Shift> for ShiftRecord {
    fn from(shift: &Shift) -> Self {
        Self {
            id: shift.id,
            customer_name: shift.customer_name.clone(),
            address: shift.address.clone(),
            start_time: to_millis(shift.start_time),
            end_time: shift.end_time().map(to_millis),
            shift_code: shift.code().clone(),
            cars: shift.cars().iter().map(CarRecord::from).collect(),
            employees: shift.employees().iter().map(EmployeeRecord::from).collect(),
        }
    }
}

impl CarRecord {
    pub fn is_returned(&self) -> bool {
        self.returned || self.departure_time.is_some()
    }

    fn to_car(&self, parked_by: Option<Employee>) -> Result<Car, RecordError> {
        let arrival = from_millis(self.arrival_time)?;
        let departure = self.departure_time.map(from_millis).transpose()?;
        // `returned` without a timestamp is repaired to "returned on arrival"
        let departure = match (departure, self.returned) {
            (None, true) => Some(arrival),
            (d, _) => d,
        };

        let coordinate = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        };

        let new = NewCar {
            license_plate: self.license_plate.clone(),
            make: self.make.clone(),
            model: self.model.clone(),
            color: self.color.clone(),
            location: self.location.clone(),
            parked_by,
            photo: self.photo_url.clone().map(PhotoRef),
            coordinate,
        };
        new.validate().map_err(|source| RecordError::InvalidCar {
            car: self.id,
            source,
        })?;

        Ok(Car::restore(self.id, new, arrival, departure))
    }
}

impl From<&Car> for CarRecord {
    fn from(car: &Car) -> Self {
        Self {
            id: car.id,
            license_plate: car.license_plate.clone(),
            make: car.make.clone(),
            model: car.model.clone(),
            color: car.color.clone(),
            location: car.location.clone(),
            latitude: car.coordinate.map(|c| c.latitude),
            longitude: car.coordinate.map(|c| c.longitude),
            photo_url: car.photo.as_ref().map(|p| p.as_str().to_string()),
            arrival_time: to_millis(car.arrival_time),
            departure_time: car.departure_time().map(to_millis),
            returned: car.is_returned(),
            parked_by: car.parked_by.as_ref().map(|e| e.id),
        }
    }
}

impl EmployeeRecord {
    fn to_employee(&self) -> Result<Employee, RecordError> {
        require_non_empty("employee name", &self.name)?;
        let color = DisplayColor::from_hex(&self.color)
            .map_err(|_| RecordError::InvalidColor(self.color.clone()))?;
        Ok(Employee {
            id: self.id,
            name: self.name.clone(),
            color,
        })
    }
}

impl From<&Employee> for EmployeeRecord {
    fn from(employee: &Employee) -> Self {
        Self {
            id: employee.id,
            name: employee.name.clone(),
            color: employee.color.to_hex(),
        }
    }
}
