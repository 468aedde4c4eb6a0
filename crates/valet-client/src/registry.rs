//! Session registry: the device's authoritative set of shifts and employees.
//!
//! All mutation goes through [`ShiftStore`]. Operations are synchronous and
//! local-first: once a precondition holds the change is applied in memory,
//! a full snapshot is handed to the sync worker and a [`ShiftEvent`] is
//! broadcast. Nothing here waits on the network.

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use valet_shared::constants::MAX_CODE_ATTEMPTS;
use valet_shared::error::require_non_empty;
use valet_shared::protocol::now;
use valet_shared::{
    merge_shift, Car, CarId, Employee, Identity, NewCar, ReturnOutcome, Shift, ShiftCode, ShiftId,
    ShiftRecord, ValetError,
};
use valet_sync::SyncHandle;

use crate::events::{emit_event, ShiftEvent};

/// Source of candidate shift codes.
pub type CodeSource = Box<dyn FnMut() -> ShiftCode + Send>;

pub struct ShiftStore {
    identity: Identity,
    shifts: Vec<Shift>,
    employees: Vec<Employee>,
    sync: SyncHandle,
    events: broadcast::Sender<ShiftEvent>,
    next_code: CodeSource,
}

impl ShiftStore {
    pub fn new(identity: Identity, sync: SyncHandle) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            identity,
            shifts: Vec::new(),
            employees: Vec::new(),
            sync,
            events,
            next_code: Box::new(ShiftCode::generate),
        }
    }

    /// Replace the code generator, e.g. with a seeded or scripted one.
    pub fn with_code_source(mut self, source: impl FnMut() -> ShiftCode + Send + 'static) -> Self {
        self.next_code = Box::new(source);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShiftEvent> {
        self.events.subscribe()
    }

    // -- Reads ---------------------------------------------------------------

    pub fn shift(&self, id: ShiftId) -> Option<&Shift> {
        self.shifts.iter().find(|s| s.id == id)
    }

    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    pub fn active_shifts(&self) -> impl Iterator<Item = &Shift> {
        self.shifts.iter().filter(|s| !s.is_ended())
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    /// Case-insensitive lookup among the shifts this device knows. An active
    /// shift wins over an ended one with the same code, then the latest start.
    pub fn find_shift_by_code(&self, code: &str) -> Option<&Shift> {
        self.shifts
            .iter()
            .filter(|s| s.code().matches(code))
            .max_by_key(|s| (!s.is_ended(), s.start_time))
    }

    // -- Shift lifecycle -----------------------------------------------------

    pub fn start_shift(&mut self, customer_name: &str, address: &str) -> Result<Shift, ValetError> {
        require_non_empty("customer name", customer_name)?;
        require_non_empty("address", address)?;

        let code = self.allocate_code()?;
        let shift = Shift::start(customer_name, address, code, now())?;

        info!(
            shift_id = %shift.id,
            code = %shift.code(),
            started_by = %self.identity.name(),
            participant_id = %self.identity.participant_id(),
            "Shift started"
        );

        self.sync.push(ShiftRecord::from(&shift));
        emit_event(
            &self.events,
            ShiftEvent::ShiftStarted {
                shift_id: shift.id,
                code: shift.code().clone(),
            },
        );
        self.shifts.push(shift.clone());
        Ok(shift)
    }

    /// End a shift. Returns `false` when it had already ended; the original
    /// end time is kept and nothing is pushed.
    pub fn end_shift(&mut self, shift_id: ShiftId) -> Result<bool, ValetError> {
        let idx = self.index_of(shift_id)?;
        if !self.shifts[idx].end(now()) {
            debug!(shift_id = %shift_id, "Shift already ended");
            return Ok(false);
        }

        info!(shift_id = %shift_id, cars = self.shifts[idx].cars().len(), "Shift ended");
        self.publish(idx, ShiftEvent::ShiftEnded { shift_id });
        Ok(true)
    }

    // -- Cars ----------------------------------------------------------------

    /// Check a car in. Plates are not unique; the same plate may legitimately
    /// appear twice.
    pub fn add_car(&mut self, shift_id: ShiftId, car: NewCar) -> Result<Car, ValetError> {
        let idx = self.index_of(shift_id)?;
        let car = self.shifts[idx].check_in(car, now())?.clone();

        info!(
            shift_id = %shift_id,
            car_id = %car.id,
            plate = %car.license_plate,
            parked_by = car.parked_by.as_ref().map(|e| e.name.as_str()).unwrap_or("-"),
            "Car checked in"
        );
        self.publish(
            idx,
            ShiftEvent::CarCheckedIn {
                shift_id,
                car_id: car.id,
            },
        );
        Ok(car)
    }

    /// Return a car. A second return leaves the departure time untouched and
    /// reports [`ReturnOutcome::AlreadyReturned`].
    pub fn return_car(
        &mut self,
        shift_id: ShiftId,
        car_id: CarId,
    ) -> Result<ReturnOutcome, ValetError> {
        let idx = self.index_of(shift_id)?;
        let outcome = self.shifts[idx].return_car(car_id, now())?;

        match outcome {
            ReturnOutcome::Returned => {
                info!(shift_id = %shift_id, car_id = %car_id, "Car returned");
                self.publish(idx, ShiftEvent::CarReturned { shift_id, car_id });
            }
            ReturnOutcome::AlreadyReturned => {
                debug!(shift_id = %shift_id, car_id = %car_id, "Car already returned");
            }
        }
        Ok(outcome)
    }

    // -- Employees -----------------------------------------------------------

    /// Add an employee to the device-wide roster. Names are not deduplicated
    /// here.
    pub fn add_employee(&mut self, name: &str) -> Result<Employee, ValetError> {
        let employee = Employee::new(name)?;
        debug!(employee_id = %employee.id, name = %employee.name, "Employee added");

        self.employees.push(employee.clone());
        emit_event(
            &self.events,
            ShiftEvent::EmployeeAdded {
                shift_id: None,
                employee_id: employee.id,
                name: employee.name.clone(),
            },
        );
        Ok(employee)
    }

    /// Create an employee and attach it to a shift.
    pub fn add_employee_to_shift(
        &mut self,
        name: &str,
        shift_id: ShiftId,
    ) -> Result<Employee, ValetError> {
        require_non_empty("employee name", name)?;
        let idx = self.index_of(shift_id)?;
        if self.shifts[idx].is_ended() {
            return Err(ValetError::ShiftEnded(shift_id));
        }

        let employee = self.add_employee(name)?;
        self.shifts[idx].add_employee(employee.clone())?;

        info!(
            shift_id = %shift_id,
            employee_id = %employee.id,
            name = %employee.name,
            "Employee joined shift"
        );
        self.publish(
            idx,
            ShiftEvent::EmployeeAdded {
                shift_id: Some(shift_id),
                employee_id: employee.id,
                name: employee.name.clone(),
            },
        );
        Ok(employee)
    }

    // -- Remote state --------------------------------------------------------

    /// Take in a snapshot from the remote store: insert it if the shift is
    /// new here, otherwise merge it into the local copy. Employees unknown to
    /// this device join the device-wide roster.
    pub fn adopt_remote(&mut self, record: &ShiftRecord) -> Result<Shift, ValetError> {
        let merged = match self.shift(record.id) {
            Some(local) => {
                let local = ShiftRecord::from(local);
                let merged = merge_shift(&local, record);
                if merged == local {
                    debug!(shift_id = %record.id, "Remote snapshot brings nothing new");
                    return self
                        .shift(record.id)
                        .cloned()
                        .ok_or(ValetError::ShiftNotFound(record.id));
                }
                merged
            }
            None => {
                if !record.is_ended() {
                    if let Some(clash) = self
                        .active_shifts()
                        .find(|s| s.code() == &record.shift_code)
                    {
                        // codes are allocated per device, so another device
                        // may have drawn one that is active here
                        warn!(
                            shift_id = %record.id,
                            local_shift_id = %clash.id,
                            code = %record.shift_code,
                            "Remote shift shares its code with a local active shift"
                        );
                    }
                }
                record.clone()
            }
        };

        let shift = merged.to_shift(&self.employees)?;
        for employee in shift.employees() {
            if !self.employees.iter().any(|e| e.id == employee.id) {
                self.employees.push(employee.clone());
            }
        }

        match self.shifts.iter_mut().find(|s| s.id == shift.id) {
            Some(slot) => {
                debug!(shift_id = %shift.id, cars = shift.cars().len(), "Merged remote snapshot");
                *slot = shift.clone();
            }
            None => {
                info!(shift_id = %shift.id, code = %shift.code(), "Adopted remote shift");
                self.shifts.push(shift.clone());
            }
        }

        let shift_id = shift.id;
        emit_event(&self.events, ShiftEvent::ShiftMerged { shift_id });
        Ok(shift)
    }

    /// Rebuild the registry from persisted snapshots. Unreadable snapshots
    /// are skipped. Returns how many were restored.
    pub fn restore(&mut self, records: impl IntoIterator<Item = ShiftRecord>) -> usize {
        let mut restored = 0;
        for record in records {
            match self.adopt_remote(&record) {
                Ok(_) => restored += 1,
                Err(e) => warn!(shift_id = %record.id, error = %e, "Skipping unreadable snapshot"),
            }
        }
        if restored > 0 {
            info!(count = restored, "Restored shifts");
        }
        restored
    }

    // -- Internals -----------------------------------------------------------

    /// Draw codes until one is not held by an active shift.
    fn allocate_code(&mut self) -> Result<ShiftCode, ValetError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = (self.next_code)();
            let taken = self.active_shifts().any(|s| s.code() == &code);
            if !taken {
                return Ok(code);
            }
            debug!(code = %code, attempt, "Shift code collides with an active shift");
        }
        warn!(
            attempts = MAX_CODE_ATTEMPTS,
            "Could not allocate a unique shift code"
        );
        Err(ValetError::DuplicateCodeCollision(MAX_CODE_ATTEMPTS))
    }

    fn index_of(&self, shift_id: ShiftId) -> Result<usize, ValetError> {
        self.shifts
            .iter()
            .position(|s| s.id == shift_id)
            .ok_or_else(|| {
                warn!(shift_id = %shift_id, "Shift not found in registry");
                ValetError::ShiftNotFound(shift_id)
            })
    }

    fn publish(&self, idx: usize, event: ShiftEvent) {
        self.sync.push(ShiftRecord::from(&self.shifts[idx]));
        emit_event(&self.events, event);
    }
}
