//! Convergence policy for concurrent shift snapshots.
//!
//! Devices push full snapshots without coordination and in any order. The
//! merge never loses an addition made elsewhere:
//!
//! - identity fields (id, code, customer, address, start) keep the existing value
//! - `endTime` is last-write-wins, and set always beats unset
//! - cars and employees are append-only unions keyed by id, order-preserving
//! - a car returned on either side stays returned, with the earliest departure
//!
//! The function is commutative on content and idempotent, so replays and
//! out-of-order delivery converge to the same state.

use std::collections::HashMap;

use crate::protocol::{CarRecord, ShiftRecord};
use crate::types::ShiftId;

/// Merge `incoming` into `existing`.
pub fn merge_shift(existing: &ShiftRecord, incoming: &ShiftRecord) -> ShiftRecord {
    let end_time = match (existing.end_time, incoming.end_time) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    let mut cars = existing.cars.clone();
    for theirs in &incoming.cars {
        match cars.iter_mut().find(|c| c.id == theirs.id) {
            Some(ours) => merge_car(ours, theirs),
            None => cars.push(theirs.clone()),
        }
    }

    let mut employees = existing.employees.clone();
    for theirs in &incoming.employees {
        if !employees.iter().any(|e| e.id == theirs.id) {
            employees.push(theirs.clone());
        }
    }

    ShiftRecord {
        id: existing.id,
        customer_name: existing.customer_name.clone(),
        address: existing.address.clone(),
        start_time: existing.start_time,
        end_time,
        shift_code: existing.shift_code.clone(),
        cars,
        employees,
    }
}

fn merge_car(ours: &mut CarRecord, theirs: &CarRecord) {
    ours.departure_time = match (ours.departure_time, theirs.departure_time) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    ours.returned = ours.returned || theirs.returned || ours.departure_time.is_some();
    if ours.parked_by.is_none() {
        ours.parked_by = theirs.parked_by;
    }
}

/// Keyed collection of shift snapshots with upsert-by-merge semantics. This
/// is the state a remote store holds.
#[derive(Debug, Default, Clone)]
pub struct ShiftTable {
    shifts: HashMap<ShiftId, ShiftRecord>,
}

impl ShiftTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a snapshot and return the merged result.
    pub fn upsert(&mut self, incoming: ShiftRecord) -> ShiftRecord {
        let merged = match self.shifts.get(&incoming.id) {
            Some(existing) => merge_shift(existing, &incoming),
            None => incoming,
        };
        self.shifts.insert(merged.id, merged.clone());
        merged
    }

    pub fn get(&self, id: &ShiftId) -> Option<&ShiftRecord> {
        self.shifts.get(id)
    }

    /// Case-insensitive lookup returning at most one record. Codes are only
    /// unique per device, so on a clash an active shift wins over an ended
    /// one, then the most recently started.
    pub fn find_by_code(&self, code: &str) -> Option<&ShiftRecord> {
        self.shifts
            .values()
            .filter(|s| s.shift_code.matches(code))
            .max_by_key(|s| (!s.is_ended(), s.start_time))
    }

    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::ShiftCode;
    use crate::models::{Employee, NewCar, Shift};
    use crate::protocol::now;

    fn base() -> Shift {
        let code = ShiftCode::parse("AB23XZ").unwrap();
        Shift::start("Smith", "123 Main St", code, now()).unwrap()
    }

    fn car(plate: &str) -> NewCar {
        NewCar::new(plate, "Toyota", "Corolla", "Silver", "Row 3")
    }

    #[test]
    fn test_concurrent_additions_are_kept() {
        let origin = base();
        let mut device_a = origin.clone();
        let mut device_b = origin.clone();

        let alex = Employee::new("Alex").unwrap();
        let sam = Employee::new("Sam").unwrap();
        device_a.check_in(car("AAA111"), now()).unwrap();
        device_a.add_employee(alex).unwrap();
        device_b.check_in(car("BBB222"), now()).unwrap();
        device_b.add_employee(sam).unwrap();

        let a = ShiftRecord::from(&device_a);
        let b = ShiftRecord::from(&device_b);

        let ab = merge_shift(&a, &b);
        assert_eq!(ab.cars.len(), 2);
        assert_eq!(ab.employees.len(), 2);
        assert_eq!(ab.cars[0].license_plate, "AAA111");
        assert_eq!(ab.cars[1].license_plate, "BBB222");

        // same content regardless of arrival order
        let ba = merge_shift(&b, &a);
        assert_eq!(ba.cars.len(), 2);
        assert_eq!(ba.employees.len(), 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut shift = base();
        shift.check_in(car("AAA111"), now()).unwrap();
        let record = ShiftRecord::from(&shift);
        assert_eq!(merge_shift(&record, &record), record);
    }

    #[test]
    fn test_end_time_last_write_wins() {
        let origin = ShiftRecord::from(&base());
        let mut early = origin.clone();
        early.end_time = Some(origin.start_time + 1_000);
        let mut late = origin.clone();
        late.end_time = Some(origin.start_time + 5_000);

        assert_eq!(merge_shift(&early, &late).end_time, late.end_time);
        assert_eq!(merge_shift(&late, &early).end_time, late.end_time);
        // a stale snapshot never reopens the shift
        assert_eq!(merge_shift(&late, &origin).end_time, late.end_time);
    }

    #[test]
    fn test_return_survives_stale_snapshot() {
        let mut shift = base();
        let id = shift.check_in(car("AAA111"), now()).unwrap().id;
        let stale = ShiftRecord::from(&shift);
        shift.return_car(id, now()).unwrap();
        let returned = ShiftRecord::from(&shift);

        let merged = merge_shift(&returned, &stale);
        assert!(merged.cars[0].returned);
        assert_eq!(
            merged.cars[0].departure_time,
            returned.cars[0].departure_time
        );

        let merged = merge_shift(&stale, &returned);
        assert!(merged.cars[0].returned);
    }

    #[test]
    fn test_first_return_wins() {
        let mut shift = base();
        shift.check_in(car("AAA111"), now()).unwrap();
        let mut a = ShiftRecord::from(&shift);
        let mut b = a.clone();
        a.cars[0].departure_time = Some(a.cars[0].arrival_time + 10);
        a.cars[0].returned = true;
        b.cars[0].departure_time = Some(b.cars[0].arrival_time + 20);
        b.cars[0].returned = true;

        let merged = merge_shift(&b, &a);
        assert_eq!(merged.cars[0].departure_time, a.cars[0].departure_time);
    }

    #[test]
    fn test_identity_fields_are_not_overwritten() {
        let origin = ShiftRecord::from(&base());
        let mut tampered = origin.clone();
        tampered.customer_name = "Jones".into();
        tampered.shift_code = ShiftCode::parse("ZZZZZZ").unwrap();

        let merged = merge_shift(&origin, &tampered);
        assert_eq!(merged.customer_name, "Smith");
        assert_eq!(merged.shift_code.as_str(), "AB23XZ");
    }

    #[test]
    fn test_table_find_by_code_prefers_active() {
        let mut table = ShiftTable::new();
        let mut ended = ShiftRecord::from(&base());
        ended.end_time = Some(ended.start_time + 1);
        let active = ShiftRecord::from(&base());

        table.upsert(ended);
        table.upsert(active.clone());

        assert_eq!(table.len(), 2);
        assert_eq!(table.find_by_code("ab23xz").map(|s| s.id), Some(active.id));
        assert!(table.find_by_code("QQQQQQ").is_none());
    }

    #[test]
    fn test_table_upsert_merges() {
        let mut table = ShiftTable::new();
        let mut shift = base();
        let first = ShiftRecord::from(&shift);
        table.upsert(first.clone());

        shift.check_in(car("AAA111"), now()).unwrap();
        table.upsert(ShiftRecord::from(&shift));
        // replaying an older snapshot must not erase the car
        let merged = table.upsert(first);

        assert_eq!(merged.cars.len(), 1);
        assert_eq!(table.get(&shift.id).unwrap().cars.len(), 1);
    }
}
