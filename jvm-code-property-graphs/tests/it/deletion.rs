// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use code_property_graphs::drivers::Driver;
use code_property_graphs::schema::NodeKind;

use crate::fixtures;
use crate::fixtures::MAIN_SIGNATURE;

#[test]
fn deleting_a_method_preserves_graph_integrity() {
    let mut driver = fixtures::project_classes(vec![fixtures::conditional1()]);
    let before = driver.get_vertex_ids(0, i64::MAX).unwrap();
    let body = driver
        .get_method("Conditional1.main", MAIN_SIGNATURE, true)
        .unwrap();
    assert!(!body.is_empty());

    driver
        .delete_method("Conditional1.main", MAIN_SIGNATURE)
        .unwrap();

    // Every node of the method's closure is gone.
    let after_view = driver
        .get_method("Conditional1.main", MAIN_SIGNATURE, true)
        .unwrap();
    assert!(after_view.is_empty());
    let whole = driver.get_whole_graph().unwrap();
    for kind in [
        NodeKind::Method,
        NodeKind::Block,
        NodeKind::MethodReturn,
        NodeKind::Local,
        NodeKind::Identifier,
        NodeKind::Call,
        NodeKind::ControlStructure,
        NodeKind::JumpTarget,
        NodeKind::Return,
        NodeKind::Literal,
    ]
    .iter()
    {
        assert_eq!(
            whole.nodes_of_kind(*kind).count(),
            0,
            "{} nodes should be gone",
            kind
        );
    }

    // The file node and the program structure remain.
    let structure = driver.get_program_structure().unwrap();
    assert_eq!(structure.nodes_of_kind(NodeKind::File).count(), 1);

    // And the id set shrank strictly.
    let after = driver.get_vertex_ids(0, i64::MAX).unwrap();
    assert!(after.is_subset(&before));
    assert!(after.len() < before.len());
}
