//! Several devices sharing one remote store.

use std::sync::Arc;
use std::time::Duration;

use valet_client::{ClientConfig, ValetClient};
use valet_shared::{Car, Identity, NewCar, Shift, ShiftId, ValetError};
use valet_sync::MemoryGateway;

fn config() -> ClientConfig {
    ClientConfig {
        sync_timeout: Duration::from_millis(200),
        push_max_attempts: 2,
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(5),
        ..ClientConfig::default()
    }
}

fn device(remote: &MemoryGateway, name: &str) -> ValetClient {
    ValetClient::with_gateway(
        config(),
        Identity::local(name).unwrap(),
        Arc::new(remote.clone()),
    )
    .unwrap()
}

fn car(plate: &str) -> NewCar {
    NewCar::new(plate, "Toyota", "Corolla", "Silver", "Row 3")
}

fn start_shift(client: &mut ValetClient) -> Shift {
    let store = client.registry_mut();
    store.start_shift("Smith", "123 Main St").unwrap()
}

fn park(client: &mut ValetClient, shift: ShiftId, plate: &str) -> Car {
    let store = client.registry_mut();
    store.add_car(shift, car(plate)).unwrap()
}

#[tokio::test]
async fn concurrent_check_ins_converge() {
    let remote = MemoryGateway::new();
    let mut alice = device(&remote, "Alice");
    let mut bob = device(&remote, "Bob");

    let shift = start_shift(&mut alice);
    assert_eq!(alice.sync_now().await.unwrap(), 0);

    let code = shift.code().as_str().to_lowercase();
    let joined = bob.join(&code).await.unwrap();
    assert_eq!(joined.shift.id, shift.id);
    alice.join(&code).await.unwrap();

    park(&mut alice, shift.id, "AAA111");
    park(&mut bob, shift.id, "BBB222");
    alice.sync_now().await.unwrap();
    bob.sync_now().await.unwrap();

    let seen_by_alice = alice.refresh(shift.id).await.unwrap();
    let seen_by_bob = bob.refresh(shift.id).await.unwrap();

    for view in [&seen_by_alice, &seen_by_bob] {
        let plates: Vec<_> = view
            .cars()
            .iter()
            .map(|c| c.license_plate.as_str())
            .collect();
        assert_eq!(plates.len(), 2);
        assert!(plates.contains(&"AAA111"));
        assert!(plates.contains(&"BBB222"));
        assert!(view.employee_named("alice").is_some());
        assert!(view.employee_named("bob").is_some());
    }
}

#[tokio::test]
async fn return_on_one_device_is_seen_by_the_other() {
    let remote = MemoryGateway::new();
    let mut alice = device(&remote, "Alice");
    let mut bob = device(&remote, "Bob");

    let shift = start_shift(&mut alice);
    let parked = park(&mut alice, shift.id, "AAA111");
    alice.sync_now().await.unwrap();

    bob.join(shift.code().as_str()).await.unwrap();
    bob.registry_mut().return_car(shift.id, parked.id).unwrap();
    bob.sync_now().await.unwrap();

    // alice pushes a snapshot that still shows the car as active
    park(&mut alice, shift.id, "CCC333");
    alice.sync_now().await.unwrap();

    let view = alice.registry().shift(shift.id).unwrap();
    assert!(view.car(parked.id).unwrap().is_returned());
    assert_eq!(view.cars().len(), 2);
}

#[tokio::test]
async fn parking_employee_is_seen_by_a_joining_device() {
    let remote = MemoryGateway::new();
    let mut alice = device(&remote, "Alice");
    let mut bob = device(&remote, "Bob");

    let shift = start_shift(&mut alice);

    // an employee known only to this device cannot park cars on the shift
    let runner = alice.registry_mut().add_employee("Runner").unwrap();
    assert_eq!(
        alice
            .registry_mut()
            .add_car(shift.id, car("AAA111").parked_by(runner.clone())),
        Err(ValetError::EmployeeNotFound(runner.id))
    );

    let runner = alice
        .registry_mut()
        .add_employee_to_shift("Runner", shift.id)
        .unwrap();
    let parked = alice
        .registry_mut()
        .add_car(shift.id, car("AAA111").parked_by(runner.clone()))
        .unwrap();
    alice.sync_now().await.unwrap();

    let joined = bob.join(shift.code().as_str()).await.unwrap();
    let seen = joined.shift.car(parked.id).unwrap();
    assert_eq!(seen.parked_by.as_ref(), Some(&runner));
}

#[tokio::test]
async fn ending_the_shift_stops_additions_everywhere() {
    let remote = MemoryGateway::new();
    let mut alice = device(&remote, "Alice");
    let mut bob = device(&remote, "Bob");

    let shift = start_shift(&mut alice);
    alice.sync_now().await.unwrap();
    bob.join(shift.code().as_str()).await.unwrap();

    bob.registry_mut().end_shift(shift.id).unwrap();
    bob.sync_now().await.unwrap();

    let view = alice.refresh(shift.id).await.unwrap();
    assert!(view.is_ended());
    assert_eq!(
        alice.registry_mut().add_car(shift.id, car("AAA111")),
        Err(ValetError::ShiftEnded(shift.id))
    );

    let mut carol = device(&remote, "Carol");
    assert_eq!(
        carol.join(shift.code().as_str()).await.unwrap_err(),
        ValetError::ShiftEnded(shift.id)
    );
}

#[tokio::test]
async fn same_name_joins_on_two_devices_both_succeed() {
    let remote = MemoryGateway::new();
    let mut host = device(&remote, "Host");
    let shift = start_shift(&mut host);
    host.sync_now().await.unwrap();

    let mut first = device(&remote, "Sam");
    let mut second = device(&remote, "Sam");
    // both lookups finish before either join reaches the remote
    remote.set_latency(Duration::from_millis(20));
    let code = shift.code().as_str();
    let (a, b) = tokio::join!(first.join(code), second.join(code));
    let (a, b) = (a.unwrap(), b.unwrap());
    first.sync_now().await.unwrap();
    second.sync_now().await.unwrap();

    // each device attached its own roster entry; the remote keeps both
    assert_ne!(a.employee.id, b.employee.id);
    let merged = remote.snapshot(shift.id).await.unwrap();
    let sams = merged.employees.iter().filter(|e| e.name == "Sam");
    assert_eq!(sams.count(), 2);
}

#[tokio::test]
async fn offline_changes_are_delivered_later() {
    let remote = MemoryGateway::new();
    let mut alice = device(&remote, "Alice");
    let mut bob = device(&remote, "Bob");

    let shift = start_shift(&mut alice);
    alice.sync_now().await.unwrap();
    bob.join(shift.code().as_str()).await.unwrap();
    bob.sync_now().await.unwrap();

    remote.set_online(false);
    park(&mut alice, shift.id, "AAA111");
    assert_eq!(alice.sync_now().await.unwrap(), 1);
    // the local change is kept while the remote is unreachable
    assert_eq!(alice.registry().shift(shift.id).unwrap().cars().len(), 1);
    assert!(matches!(
        bob.refresh(shift.id).await,
        Err(ValetError::SyncTransport(_))
    ));

    remote.set_online(true);
    assert_eq!(alice.sync_now().await.unwrap(), 0);
    let view = bob.refresh(shift.id).await.unwrap();
    assert_eq!(view.cars().len(), 1);
}
