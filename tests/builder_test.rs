//! Tests for TreeBuilder

use std::sync::Arc;

use compkit::domain::{
    Component, ComponentRef, Contract, ContractError, Leaf, OperationSpec, Payload, TreeBuilder,
    Value,
};
use rstest::{fixture, rstest};

#[fixture]
fn contract() -> Arc<Contract> {
    Contract::new(
        "org",
        [OperationSpec::sum("salary"), OperationSpec::concat("roster", " ")],
    )
    .unwrap()
}

fn employee(contract: &Arc<Contract>, name: &str, salary: f64) -> ComponentRef {
    Arc::new(
        Leaf::new(
            name,
            contract.clone(),
            [("salary", Value::from(salary)), ("roster", Value::from(name))],
        )
        .unwrap(),
    )
}

// ============================================================
// Building Trees
// ============================================================

#[rstest]
fn given_linked_nodes_when_building_then_children_follow_link_order(contract: Arc<Contract>) {
    let trees = TreeBuilder::new(contract.clone())
        .group("company")
        .unwrap()
        .group_with("dev", Payload::new(&contract, [("salary", 10.0)]).unwrap())
        .unwrap()
        .component("ann", employee(&contract, "ann", 100.0))
        .unwrap()
        .component("bob", employee(&contract, "bob", 50.0))
        .unwrap()
        .component("cid", employee(&contract, "cid", 70.0))
        .unwrap()
        .link("company", "dev")
        .link("company", "cid")
        .link("dev", "bob")
        .link("dev", "ann")
        .build()
        .unwrap();

    assert_eq!(trees.len(), 1);
    let tree = &trees[0];
    assert_eq!(tree.label(), "company");
    assert_eq!(tree.depth(), 3);
    assert_eq!(tree.evaluate("salary").unwrap(), Value::Number(230.0));
    assert_eq!(tree.evaluate("roster").unwrap(), Value::from("bob ann cid"));
    assert_eq!(tree.leaf_nodes(), vec!["bob", "ann", "cid"]);
}

#[rstest]
fn given_unlinked_nodes_when_building_then_returns_forest(contract: Arc<Contract>) {
    let trees = TreeBuilder::new(contract.clone())
        .group("a")
        .unwrap()
        .group("b")
        .unwrap()
        .component("solo", employee(&contract, "solo", 1.0))
        .unwrap()
        .link("a", "b")
        .build()
        .unwrap();

    assert_eq!(trees.len(), 2);
    assert_eq!(trees[1].label(), "solo");
    // a component root is wrapped in a group of the same name
    assert_eq!(trees[1].depth(), 2);
    assert_eq!(trees[1].evaluate("salary").unwrap(), Value::Number(1.0));
}

#[rstest]
fn given_depth_limit_when_building_deep_chain_then_fails(contract: Arc<Contract>) {
    let result = TreeBuilder::new(contract)
        .max_depth(Some(2))
        .group("l1")
        .unwrap()
        .group("l2")
        .unwrap()
        .group("l3")
        .unwrap()
        .link("l1", "l2")
        .link("l2", "l3")
        .build();

    assert!(matches!(result, Err(ContractError::DepthExceeded { limit: 2 })));
}

// ============================================================
// Invalid Declarations
// ============================================================

#[rstest]
fn given_duplicate_name_when_declaring_then_fails(contract: Arc<Contract>) {
    let result = TreeBuilder::new(contract).group("x").unwrap().group("x");
    assert!(matches!(result, Err(ContractError::DuplicateNode(name)) if name == "x"));
}

#[rstest]
fn given_link_to_undeclared_node_when_building_then_reports_unknown_node(contract: Arc<Contract>) {
    let result = TreeBuilder::new(contract)
        .group("root")
        .unwrap()
        .link("root", "ghost")
        .build();
    assert!(matches!(result, Err(ContractError::UnknownNode(name)) if name == "ghost"));
}

#[rstest]
fn given_child_with_two_parents_when_building_then_reports_multiple_parents(
    contract: Arc<Contract>,
) {
    let result = TreeBuilder::new(contract)
        .group("p1")
        .unwrap()
        .group("p2")
        .unwrap()
        .group("c")
        .unwrap()
        .link("p1", "c")
        .link("p2", "c")
        .build();
    assert!(matches!(result, Err(ContractError::MultipleParents(name)) if name == "c"));
}

#[rstest]
fn given_component_as_parent_when_building_then_reports_not_a_group(contract: Arc<Contract>) {
    let result = TreeBuilder::new(contract.clone())
        .component("leaf", employee(&contract, "leaf", 1.0))
        .unwrap()
        .group("g")
        .unwrap()
        .link("leaf", "g")
        .build();
    assert!(matches!(result, Err(ContractError::NotAGroup(name)) if name == "leaf"));
}

#[rstest]
fn given_cyclic_links_when_building_then_reports_cycle(contract: Arc<Contract>) {
    let result = TreeBuilder::new(contract)
        .group("root")
        .unwrap()
        .group("a")
        .unwrap()
        .group("b")
        .unwrap()
        .link("a", "b")
        .link("b", "a")
        .build();
    assert!(matches!(result, Err(ContractError::CyclicLinks(_))));
}
