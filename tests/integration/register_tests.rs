//! Registration and slot-lifecycle tests.

use crate::mock_hci::{FakeRng, MockController, RecordingSink, PUBLIC_ADDR};

use multiadv::adapters::alarms::SoftwareAlarms;
use multiadv::adv::ports::{AlarmId, AlarmKind};
use multiadv::adv::{BleAdvertisingManager, OwnAddressType};
use multiadv::config::{AdvertiserConfig, RESOLVE_ADDR_MASK, RESOLVE_ADDR_MSB};
use multiadv::AdvError;

fn setup(
    count: u8,
    privacy: bool,
) -> (
    BleAdvertisingManager,
    MockController,
    SoftwareAlarms,
    RecordingSink,
    FakeRng,
) {
    let mut hci = MockController::new(count);
    let mut alarms = SoftwareAlarms::new();
    let mut rng = FakeRng::new(7);
    let config = AdvertiserConfig {
        privacy_enabled: privacy,
        irk: [0x55; 16],
        ..AdvertiserConfig::default()
    };
    let mgr = BleAdvertisingManager::initialize(config, &mut hci, &mut alarms, &mut rng);
    (mgr, hci, alarms, RecordingSink::new(), rng)
}

#[test]
fn register_on_empty_table_returns_slot_zero() {
    let (mut mgr, mut hci, mut alarms, _sink, mut rng) = setup(3, false);

    let id = mgr.register(&mut hci, &mut alarms, &mut rng).unwrap();
    assert_eq!(id, 0);

    let inst = mgr.instance(0).unwrap();
    assert!(inst.in_use());
    assert_eq!(inst.own_address_type(), OwnAddressType::Public);
    assert_eq!(inst.own_address(), PUBLIC_ADDR);
}

#[test]
fn register_fills_slots_in_order() {
    let (mut mgr, mut hci, mut alarms, _sink, mut rng) = setup(3, false);
    for expected in 0..3 {
        let id = mgr.register(&mut hci, &mut alarms, &mut rng).unwrap();
        assert_eq!(id, expected);
    }
    assert_eq!(mgr.in_use_count(), 3);
}

#[test]
fn register_when_full_reports_too_many_advertisers() {
    let (mut mgr, mut hci, mut alarms, _sink, mut rng) = setup(3, false);
    for _ in 0..3 {
        mgr.register(&mut hci, &mut alarms, &mut rng).unwrap();
    }
    assert_eq!(
        mgr.register(&mut hci, &mut alarms, &mut rng),
        Err(AdvError::TooManyAdvertisers)
    );
}

#[test]
fn unregister_frees_the_slot_for_reuse() {
    let (mut mgr, mut hci, mut alarms, _sink, mut rng) = setup(3, false);
    for _ in 0..3 {
        mgr.register(&mut hci, &mut alarms, &mut rng).unwrap();
    }

    mgr.unregister(1, &mut hci, &mut alarms);
    assert!(!mgr.instance(1).unwrap().in_use());
    // The freed slot forgets its previous address.
    assert_eq!(mgr.instance(1).unwrap().own_address(), [0; 6]);

    let id = mgr.register(&mut hci, &mut alarms, &mut rng).unwrap();
    assert_eq!(id, 1);
}

#[test]
fn unregister_is_idempotent_and_tolerates_bad_ids() {
    let (mut mgr, mut hci, mut alarms, _sink, mut rng) = setup(2, false);
    mgr.register(&mut hci, &mut alarms, &mut rng).unwrap();

    mgr.unregister(0, &mut hci, &mut alarms);
    let disables = hci.calls.len();
    mgr.unregister(0, &mut hci, &mut alarms);
    // Second unregister issues nothing.
    assert_eq!(hci.calls.len(), disables);

    // Out-of-table id is a logged no-op.
    mgr.unregister(9, &mut hci, &mut alarms);
    assert_eq!(hci.calls.len(), disables);
}

#[test]
fn privacy_register_assigns_resolvable_address_and_rotation() {
    let (mut mgr, mut hci, mut alarms, _sink, mut rng) = setup(2, true);

    let id = mgr.register(&mut hci, &mut alarms, &mut rng).unwrap();
    let inst = mgr.instance(id).unwrap();
    assert_eq!(inst.own_address_type(), OwnAddressType::Random);
    assert_eq!(inst.own_address()[5] & RESOLVE_ADDR_MASK, RESOLVE_ADDR_MSB);

    let rotation = AlarmId {
        inst_id: id,
        kind: AlarmKind::AddressRotation,
    };
    assert!(alarms.armed(rotation));

    mgr.unregister(id, &mut hci, &mut alarms);
    assert!(!alarms.armed(rotation));
}

#[test]
fn zero_handle_quirk_parks_instance_zero() {
    let mut hci = MockController::new(3);
    hci.quirk_zero = true;
    let mut alarms = SoftwareAlarms::new();
    let mut rng = FakeRng::new(3);
    let mut mgr = BleAdvertisingManager::initialize(
        AdvertiserConfig::default(),
        &mut hci,
        &mut alarms,
        &mut rng,
    );

    assert!(mgr.instance(0).unwrap().in_use());
    // Callers never see handle 0.
    let id = mgr.register(&mut hci, &mut alarms, &mut rng).unwrap();
    assert_eq!(id, 1);
}

#[test]
fn table_is_sized_by_the_controller() {
    let (mgr, ..) = setup(5, false);
    assert_eq!(mgr.instance_count(), 5);
    assert!(mgr.instance(5).is_none());
}
