//! Tests for MonostateRegistry

use std::thread;

use compkit::domain::Value;
use compkit::registry::{FieldScope, MonostateRegistry, RegistryKey, StateBag};
use rstest::{fixture, rstest};

#[fixture]
fn registry() -> MonostateRegistry {
    MonostateRegistry::new()
}

fn bag(entries: &[(&str, Value)]) -> StateBag {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// ============================================================
// Shared State
// ============================================================

#[rstest]
fn given_first_bind_when_binding_again_then_second_initial_state_is_ignored(
    registry: MonostateRegistry,
) {
    let first = registry.bind(
        "ceo".into(),
        bag(&[("name", "Steve".into()), ("age", 55.0.into())]),
    );
    let second = registry.bind("ceo".into(), bag(&[("name", "Tim".into())]));

    assert_eq!(second.get("name"), Some(Value::from("Steve")));
    assert_eq!(second.get("age"), Some(Value::Number(55.0)));
    assert!(!first.same_instance(&second));
    assert!(first.shares_state_with(&second));
    assert_ne!(first.id(), second.id());
}

#[rstest]
fn given_shared_field_when_one_instance_writes_then_all_observe(registry: MonostateRegistry) {
    let mut a = registry.bind("ceo".into(), bag(&[("age", 55.0.into())]));
    let b = registry.bind("ceo".into(), StateBag::new());
    let c = registry.bind("ceo".into(), StateBag::new());

    assert_eq!(a.set("age", 66.0), FieldScope::Shared);

    assert_eq!(b.get("age"), Some(Value::Number(66.0)));
    assert_eq!(c.get("age"), Some(Value::Number(66.0)));
    assert_eq!(registry.snapshot(&"ceo".into()), Some(bag(&[("age", 66.0.into())])));
}

#[rstest]
fn given_distinct_keys_when_writing_then_states_are_independent(registry: MonostateRegistry) {
    let mut ceo = registry.bind(RegistryKey::named("ceo"), bag(&[("name", "A".into())]));
    let cfo = registry.bind(RegistryKey::named("cfo"), bag(&[("name", "B".into())]));

    ceo.set("name", "C");

    assert_eq!(cfo.get("name"), Some(Value::from("B")));
    assert!(!ceo.shares_state_with(&cfo));
    assert_eq!(registry.len(), 2);
}

// ============================================================
// Partial Sharing
// ============================================================

#[rstest]
fn given_field_added_after_seeding_when_set_then_local_until_promoted(registry: MonostateRegistry) {
    let mut a = registry.bind("cfg".into(), bag(&[("mode", "fast".into())]));
    let mut b = registry.bind("cfg".into(), StateBag::new());

    assert_eq!(a.set("retries", 3.0), FieldScope::Local);
    assert_eq!(b.set("retries", 5.0), FieldScope::Local);
    assert_eq!(a.get("retries"), Some(Value::Number(3.0)));
    assert_eq!(b.get("retries"), Some(Value::Number(5.0)));
    assert!(!a.is_shared("retries"));

    assert!(a.promote("retries"));

    // shared values take precedence over local ones
    assert_eq!(b.get("retries"), Some(Value::Number(3.0)));
    assert_eq!(b.set("retries", 7.0), FieldScope::Shared);
    assert_eq!(a.get("retries"), Some(Value::Number(7.0)));
    assert_eq!(a.state().len(), 2);
    assert!(a.local_state().is_empty());
}

// ============================================================
// Reset
// ============================================================

#[rstest]
fn given_reset_when_binding_then_new_initial_state_seeds(registry: MonostateRegistry) {
    let old = registry.bind("cfg".into(), bag(&[("level", 1.0.into())]));

    assert!(registry.reset(&"cfg".into()));
    assert!(old.shared_state().is_empty());

    let fresh = registry.bind("cfg".into(), bag(&[("level", 2.0.into())]));
    assert_eq!(fresh.get("level"), Some(Value::Number(2.0)));
    assert_eq!(old.get("level"), Some(Value::Number(2.0)));
    assert!(!registry.reset(&"unknown".into()));
}

#[rstest]
fn given_concurrent_binds_when_writing_then_last_write_is_visible_everywhere(
    registry: MonostateRegistry,
) {
    let seed = bag(&[("counter", 0.0.into())]);
    let mut handles: Vec<_> = (0..8)
        .map(|_| registry.bind("shared".into(), seed.clone()))
        .collect();

    thread::scope(|s| {
        for (i, handle) in handles.iter_mut().enumerate() {
            s.spawn(move || {
                assert_eq!(handle.set("counter", i as f64), FieldScope::Shared);
            });
        }
    });

    let observer = registry.bind("shared".into(), StateBag::new());
    let value = observer.get("counter").and_then(|v| v.as_number());
    assert!(matches!(value, Some(n) if (0.0..8.0).contains(&n)));

    let expected = observer.shared_state();
    for handle in &handles {
        assert_eq!(handle.shared_state(), expected);
        assert_eq!(handle.get("counter"), observer.get("counter"));
        assert!(handle.local_state().is_empty());
    }
    assert_eq!(registry.snapshot(&"shared".into()), Some(expected));
}
