use daq_gateway::tags::engine::{lock_tag, TagEngine};
use daq_gateway::tags::structures::{
    DataType, DeadbandType, Quality, TagAddress, TagSnapshot, ValueRecord, ValueVariant,
};
use std::sync::Arc;

fn sample_tag(id: u64, equipment_id: &str, address: &str) -> TagSnapshot {
    TagSnapshot::new(id, format!("Device/Tag{}", id), DataType::Integer, TagAddress::default())
        .with_driver(equipment_id, address)
}

#[test]
fn register_and_read_tag() {
    let engine = TagEngine::new();
    assert!(engine.is_empty());
    assert!(engine.register_tag(sample_tag(1, "eq1", "addr1")).is_none());

    let snapshot = engine.snapshot(1).expect("tag should exist");
    assert_eq!(snapshot.name, "Device/Tag1");
    assert_eq!(snapshot.current_value, None);
    assert_eq!(engine.read_value(1), None);
    assert_eq!(engine.len(), 1);
}

#[test]
fn register_replaces_existing_definition() {
    let engine = TagEngine::new();
    engine.register_tag(sample_tag(1, "eq1", "old"));
    let replaced = engine.register_tag(sample_tag(1, "eq1", "new"));

    assert!(replaced.is_some());
    assert_eq!(engine.len(), 1);
    assert_eq!(engine.snapshot(1).unwrap().driver_address, "new");
}

#[test]
fn state_is_changed_through_the_cell() {
    let engine = TagEngine::new();
    engine.register_tag(sample_tag(2, "eq1", "addr2"));

    let cell = engine.get_cell(2).expect("cell");
    {
        let mut tag = lock_tag(2, &cell).unwrap();
        let accepted = tag.update(ValueRecord::new(Some(ValueVariant::Int(42)), "", Quality::ok(), 10));
        assert!(accepted.is_some());
    }

    let value = engine.read_value(2).unwrap();
    assert_eq!(value.value, Some(ValueVariant::Int(42)));
    assert_eq!(value.timestamp, 10);
}

#[test]
fn unchanged_valid_update_is_refused() {
    let mut tag = sample_tag(3, "eq1", "addr3");
    let record = ValueRecord::new(Some(ValueVariant::Int(1)), "", Quality::ok(), 10);
    assert!(tag.update(record.clone()).is_some());

    let same = ValueRecord { timestamp: 20, ..record };
    assert!(tag.update(same).is_none());
    assert_eq!(tag.current_value.as_ref().unwrap().timestamp, 10);

    // Repeating an invalid state is still a transition
    let invalid = ValueRecord::new(Some(ValueVariant::Int(1)), "", Quality::invalid(3, "x"), 30);
    assert!(tag.update(invalid.clone()).is_some());
    assert!(tag.update(invalid).is_some());
}

#[test]
fn update_address_keeps_value() {
    let engine = TagEngine::new();
    engine.register_tag(sample_tag(4, "eq1", "addr4"));
    let cell = engine.get_cell(4).unwrap();
    lock_tag(4, &cell)
        .unwrap()
        .update(ValueRecord::valid(ValueVariant::Int(5)));

    let previous = engine
        .update_address(4, TagAddress::default().with_value_deadband(DeadbandType::Absolute, 1.0))
        .expect("tag exists");
    assert!(!previous.value_deadband_enabled);

    let snapshot = engine.snapshot(4).unwrap();
    assert!(snapshot.address.value_deadband_enabled);
    assert_eq!(snapshot.current_value.unwrap().value, Some(ValueVariant::Int(5)));
    assert!(engine.update_address(99, TagAddress::default()).is_none());
}

#[test]
fn list_ids_and_find_by_address() {
    let engine = TagEngine::new();
    engine.register_tag(sample_tag(20, "eq1", "a2"));
    engine.register_tag(sample_tag(10, "eq1", "a1"));
    engine.register_tag(sample_tag(30, "eq2", "a1"));

    assert_eq!(engine.tag_ids(), vec![10, 20, 30]);
    let names: Vec<String> = engine.all_snapshots().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["Device/Tag10", "Device/Tag20", "Device/Tag30"]);

    assert_eq!(engine.find_by_address("eq1", "a1"), Some(10));
    assert_eq!(engine.find_by_address("eq2", "a1"), Some(30));
    assert_eq!(engine.find_by_address("eq2", "a2"), None);
}

#[test]
fn remove_tag() {
    let engine = TagEngine::new();
    engine.register_tag(sample_tag(5, "eq1", "addr5"));
    assert!(engine.remove_tag(5).is_some());
    assert!(engine.remove_tag(5).is_none());
    assert!(engine.snapshot(5).is_none());
    assert!(engine.get_cell(5).is_none());
}

#[test]
fn registration_is_tied_to_the_cell() {
    let engine = TagEngine::new();
    engine.register_tag(sample_tag(6, "eq1", "addr6"));
    let old = engine.get_cell(6).unwrap();
    assert!(engine.is_registered(6, &old));

    engine.register_tag(sample_tag(6, "eq1", "addr6"));
    assert!(!engine.is_registered(6, &old));
    assert!(engine.is_registered(6, &engine.get_cell(6).unwrap()));

    engine.remove_tag(6);
    assert!(!engine.is_registered(6, &old));
}

#[test]
fn concurrent_updates_on_distinct_tags() {
    let engine = Arc::new(TagEngine::new());
    for id in 0..8 {
        engine.register_tag(sample_tag(id, "eq1", &format!("addr{}", id)));
    }

    let handles: Vec<_> = (0..8u64)
        .map(|id| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let cell = engine.get_cell(id).unwrap();
                for i in 0..100 {
                    lock_tag(id, &cell)
                        .unwrap()
                        .update(ValueRecord::new(Some(ValueVariant::Int(i)), "", Quality::ok(), i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for id in 0..8 {
        assert_eq!(engine.read_value(id).unwrap().value, Some(ValueVariant::Int(99)));
    }
}
