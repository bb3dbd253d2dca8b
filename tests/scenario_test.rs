//! End-to-end scenarios combining the structural primitives

use std::collections::BTreeMap;
use std::sync::Arc;

use compkit::domain::{
    Component, ComponentRef, ComponentTree, Contract, DecoratorChain, Leaf, Offset, OperationSpec,
    Value,
};
use compkit::util::testing::init_test_setup;
use compkit::Toolkit;

fn contract() -> Arc<Contract> {
    Contract::new(
        "order",
        [OperationSpec::sum("total"), OperationSpec::concat("items", ", ")],
    )
    .unwrap()
}

fn item(contract: &Arc<Contract>, name: &str, price: f64) -> ComponentRef {
    Arc::new(
        Leaf::new(
            name,
            contract.clone(),
            [("total", Value::from(price)), ("items", Value::from(name))],
        )
        .unwrap(),
    )
}

fn order(contract: &Arc<Contract>, items: &[(&str, f64)]) -> ComponentTree {
    let mut tree = ComponentTree::new("order", contract.clone());
    let root = tree.root();
    for (name, price) in items {
        tree.push_component(root, item(contract, name, *price)).unwrap();
    }
    tree
}

fn assert_close(value: Value, expected: f64) {
    let n = value.as_number().unwrap();
    assert!((n - expected).abs() < 1e-9, "expected {expected}, got {n}");
}

// ============================================================
// Composite + Decorator
// ============================================================

#[test]
fn given_wrapped_composite_when_reversing_children_then_total_stays_and_listing_changes() {
    init_test_setup();
    let contract = contract();

    let forward: ComponentRef = Arc::new(order(&contract, &[("tea", 1.0), ("cake", 0.5)]));
    let reversed: ComponentRef = Arc::new(order(&contract, &[("cake", 0.5), ("tea", 1.0)]));
    let forward = DecoratorChain::on(forward)
        .wrap(Offset::new("total", 0.2))
        .unwrap()
        .build();
    let reversed = DecoratorChain::on(reversed)
        .wrap(Offset::new("total", 0.2))
        .unwrap()
        .timed()
        .build();

    assert_close(forward.evaluate("total").unwrap(), 1.7);
    assert_close(reversed.evaluate("total").unwrap(), 1.7);
    assert_eq!(forward.evaluate("items").unwrap(), Value::from("tea, cake"));
    assert_eq!(reversed.evaluate("items").unwrap(), Value::from("cake, tea"));
}

#[test]
fn given_decorated_item_inside_tree_when_evaluating_then_only_that_item_changes() {
    let contract = contract();
    let mut tree = ComponentTree::new("order", contract.clone());
    let root = tree.root();
    let discounted = DecoratorChain::on(item(&contract, "soup", 4.0))
        .wrap(Offset::new("total", -1.0))
        .unwrap()
        .build();
    tree.push_component(root, discounted).unwrap();
    tree.push_component(root, item(&contract, "bread", 2.0)).unwrap();

    assert_close(tree.evaluate("total").unwrap(), 5.0);
    assert_eq!(tree.evaluate("items").unwrap(), Value::from("soup, bread"));
}

// ============================================================
// Registry-held service
// ============================================================

/// Read-only lookup service loaded once per process.
#[derive(Debug)]
struct PopulationDirectory {
    cities: BTreeMap<String, u64>,
}

impl PopulationDirectory {
    fn load() -> Self {
        Self {
            cities: BTreeMap::from([
                ("Seoul".to_string(), 17_500_000),
                ("Mexico City".to_string(), 17_400_000),
                ("Tokyo".to_string(), 33_200_000),
            ]),
        }
    }

    fn total_population(&self, names: &[&str]) -> u64 {
        names.iter().filter_map(|n| self.cities.get(*n)).sum()
    }
}

/// Consumer that resolves its directory through the registry instead of a global.
struct RecordFinder<'a> {
    toolkit: &'a Toolkit,
}

impl RecordFinder<'_> {
    fn total(&self, names: &[&str]) -> u64 {
        let directory = self
            .toolkit
            .singletons
            .instance(PopulationDirectory::load)
            .unwrap();
        directory.total_population(names)
    }
}

#[test]
fn given_registry_held_directory_when_finding_records_then_uses_single_instance() {
    let toolkit = Toolkit::default();
    let finder = RecordFinder { toolkit: &toolkit };

    assert_eq!(finder.total(&["Seoul", "Mexico City"]), 34_900_000);
    assert_eq!(finder.total(&["Tokyo", "Atlantis"]), 33_200_000);
    assert_eq!(toolkit.singletons.len(), 1);

    toolkit.reset();
    assert!(toolkit.singletons.is_empty());
}

#[test]
fn given_substituted_directory_when_finding_records_then_uses_test_double() {
    let toolkit = Toolkit::default();
    toolkit
        .singletons
        .instance(|| PopulationDirectory {
            cities: BTreeMap::from([("alpha".to_string(), 1), ("beta".to_string(), 2)]),
        })
        .unwrap();
    let finder = RecordFinder { toolkit: &toolkit };

    assert_eq!(finder.total(&["alpha", "beta"]), 3);
}
