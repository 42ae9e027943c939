// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use code_property_graphs::drivers::Driver;
use code_property_graphs::drivers::SubGraph;
use code_property_graphs::nodes::Node;
use code_property_graphs::schema::EdgeKind;
use code_property_graphs::schema::NodeKind;
use maplit::hashset;
use std::collections::HashSet;

use crate::fixtures;
use crate::fixtures::MAIN_SIGNATURE;

fn method_view(class: &str) -> SubGraph {
    let driver = fixtures::project_classes(vec![match class {
        "Conditional1" => fixtures::conditional1(),
        "Conditional4" => fixtures::conditional4(),
        "Conditional5" => fixtures::conditional5(),
        "Conditional6" => fixtures::conditional6(),
        other => panic!("unknown fixture {}", other),
    }]);
    driver
        .get_method(&format!("{}.main", class), MAIN_SIGNATURE, true)
        .unwrap()
}

fn if_structures(view: &SubGraph) -> Vec<&Node> {
    view.nodes_of_kind(NodeKind::ControlStructure)
        .filter(|node| node.code == "IF")
        .collect()
}

fn jump_target_names(view: &SubGraph) -> Vec<String> {
    view.nodes_of_kind(NodeKind::JumpTarget)
        .filter_map(|node| node.name().map(str::to_string))
        .collect()
}

#[test]
fn single_if_with_arithmetic() {
    let view = method_view("Conditional1");

    let locals = view
        .nodes_of_kind(NodeKind::Local)
        .filter_map(Node::name)
        .collect::<HashSet<_>>();
    assert_eq!(locals, hashset! {"a", "b"});

    let calls = fixtures::call_names(&view);
    assert_eq!(calls.get("ADD"), Some(&1));
    assert_eq!(calls.get("SUB"), Some(&2));
    assert_eq!(calls.get("GT"), Some(&1));

    let structures = if_structures(&view);
    assert_eq!(structures.len(), 1);
    let control = structures[0].id().unwrap();

    let jump_targets = view.nodes_of_kind(NodeKind::JumpTarget).collect::<Vec<_>>();
    assert_eq!(jump_targets.len(), 2);
    let mut names = jump_target_names(&view);
    names.sort();
    assert_eq!(names, vec!["FALSE", "TRUE"]);
    for target in &jump_targets {
        assert!(view.contains_edge(control, target.id().unwrap(), EdgeKind::Cfg));
    }
}

#[test]
fn two_sequential_ifs() {
    let view = method_view("Conditional4");
    assert_eq!(if_structures(&view).len(), 2);

    let calls = fixtures::call_names(&view);
    assert_eq!(calls.get("GT"), Some(&1));
    assert_eq!(calls.get("EQ"), Some(&1));
    assert_eq!(calls.get("ADD"), Some(&1));
    assert_eq!(calls.get("SUB"), Some(&2));
    assert_eq!(calls.get("MUL"), Some(&1));

    assert_eq!(view.nodes_of_kind(NodeKind::JumpTarget).count(), 4);
}

#[test]
fn three_conditions() {
    let view = method_view("Conditional5");
    assert_eq!(if_structures(&view).len(), 3);

    let calls = fixtures::call_names(&view);
    assert_eq!(calls.get("GT"), Some(&1));
    assert_eq!(calls.get("EQ"), Some(&1));
    assert_eq!(calls.get("LT"), Some(&1));
    assert_eq!(calls.get("SUB"), Some(&1));
    assert_eq!(calls.get("MUL"), Some(&1));
    assert_eq!(calls.get("DIV"), Some(&1));

    assert_eq!(view.nodes_of_kind(NodeKind::JumpTarget).count(), 6);
}

#[test]
fn short_circuit_compound_condition() {
    let view = method_view("Conditional6");
    assert_eq!(if_structures(&view).len(), 1);

    let calls = fixtures::call_names(&view);
    assert_eq!(calls.get("GT"), Some(&1));
    assert_eq!(calls.get("EQ"), Some(&1));
    assert_eq!(calls.get("LT"), Some(&1));
    assert_eq!(calls.get("MUL"), Some(&1));

    assert_eq!(view.nodes_of_kind(NodeKind::JumpTarget).count(), 2);
}

#[test]
fn the_method_head_is_complete() {
    let view = method_view("Conditional1");
    assert_eq!(view.nodes_of_kind(NodeKind::Method).count(), 1);
    assert_eq!(view.nodes_of_kind(NodeKind::MethodReturn).count(), 1);
    assert_eq!(view.nodes_of_kind(NodeKind::Block).count(), 1);
    let parameters = view
        .nodes_of_kind(NodeKind::MethodParameterIn)
        .collect::<Vec<_>>();
    assert_eq!(parameters.len(), 1);
    assert_eq!(parameters[0].name(), Some("args"));

    let modifiers = view
        .nodes_of_kind(NodeKind::Modifier)
        .map(|node| node.code.clone())
        .collect::<HashSet<_>>();
    assert_eq!(
        modifiers,
        hashset! {"PUBLIC".to_string(), "STATIC".to_string()}
    );

    // The entry block sits at order 2 with argument index 0, after the single parameter.
    let block = view.nodes_of_kind(NodeKind::Block).next().unwrap();
    assert_eq!(block.order, 2);
    assert_eq!(block.argument_index, 0);
}
