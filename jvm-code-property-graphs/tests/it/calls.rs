// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use code_property_graphs::drivers::Driver;
use code_property_graphs::nodes::NodeData;
use code_property_graphs::schema::DispatchType;
use code_property_graphs::schema::EdgeKind;
use code_property_graphs::schema::NodeKind;
use jvm_code_property_graphs::ir::CallGraphAlg;
use jvm_code_property_graphs::ir::InvokeExpr;
use jvm_code_property_graphs::ir::LocalDecl;
use jvm_code_property_graphs::ir::MethodSignature;
use jvm_code_property_graphs::ir::Operand;
use jvm_code_property_graphs::ir::Unit;
use jvm_code_property_graphs::ir::UnitKind;
use jvm_code_property_graphs::ExtractorConfig;

use crate::fixtures;
use crate::fixtures::MAIN_SIGNATURE;

fn cha() -> ExtractorConfig {
    ExtractorConfig::default().with_call_graph_alg(CallGraphAlg::Cha)
}

#[test]
fn static_calls_link_to_their_targets() {
    let target = MethodSignature::new("Conditional1.main", MAIN_SIGNATURE);
    let (driver, stats) = fixtures::project_with_stats(
        cha(),
        vec![
            fixtures::conditional1(),
            fixtures::caller_of("Caller", &target),
        ],
    );
    assert_eq!(stats.calls_linked, 1);
    assert_eq!(stats.phantoms_created, 0);

    let view = driver.get_whole_graph().unwrap();
    let call_edges = view.edges_of_kind(EdgeKind::Call).collect::<Vec<_>>();
    assert_eq!(call_edges.len(), 1);
    let source = view.node(call_edges[0].source).unwrap();
    let target_node = view.node(call_edges[0].target).unwrap();
    assert_eq!(source.kind(), NodeKind::Call);
    assert_eq!(source.name(), Some("main"));
    assert!(matches!(
        target_node.data(),
        NodeData::Method { full_name, .. } if full_name == "Conditional1.main"
    ));
}

#[test]
fn without_an_algorithm_no_calls_are_linked() {
    let target = MethodSignature::new("Conditional1.main", MAIN_SIGNATURE);
    let (driver, stats) = fixtures::project_with_stats(
        ExtractorConfig::default(),
        vec![
            fixtures::conditional1(),
            fixtures::caller_of("Caller", &target),
        ],
    );
    assert_eq!(stats.calls_linked, 0);
    let view = driver.get_whole_graph().unwrap();
    assert_eq!(view.edges_of_kind(EdgeKind::Call).count(), 0);
    // The call site still carries the symbolic reference.
    let call = view
        .nodes_of_kind(NodeKind::Call)
        .find(|node| node.name() == Some("main"))
        .unwrap();
    assert!(matches!(
        call.data(),
        NodeData::Call { method_full_name, .. } if method_full_name == "Conditional1.main"
    ));
}

#[test]
fn unknown_targets_get_phantom_heads() {
    let target = MethodSignature::new("Lib.helper", "void(int)");
    let (driver, stats) = fixtures::project_with_stats(
        cha(),
        vec![fixtures::caller_of("Caller", &target)],
    );
    assert_eq!(stats.calls_linked, 1);
    assert_eq!(stats.phantoms_created, 1);

    let head = driver.get_method("Lib.helper", "void(int)", false).unwrap();
    assert_eq!(head.nodes_of_kind(NodeKind::Method).count(), 1);
    assert_eq!(head.nodes_of_kind(NodeKind::MethodReturn).count(), 1);

    let view = driver.get_whole_graph().unwrap();
    let call_edges = view.edges_of_kind(EdgeKind::Call).collect::<Vec<_>>();
    assert_eq!(call_edges.len(), 1);
    let phantom = view.node(call_edges[0].target).unwrap();
    assert!(matches!(
        phantom.data(),
        NodeData::Method { full_name, .. } if full_name == "Lib.helper"
    ));
}

#[test]
fn arguments_and_receivers_are_wired() {
    // Printer p; p = new Printer(); p.print(42);
    let invoke = InvokeExpr {
        name: "print".to_string(),
        declaring_type: "Printer".to_string(),
        signature: "void(int)".to_string(),
        return_type: "void".to_string(),
        dispatch: DispatchType::DynamicDispatch,
        receiver: Some(Operand::Local {
            name: "p".to_string(),
            type_full_name: "Printer".to_string(),
        }),
        arguments: vec![Operand::Constant {
            value: "42".to_string(),
            type_full_name: "int".to_string(),
        }],
    };
    let graph = jvm_code_property_graphs::ir::UnitGraph::new(
        fixtures::main_decl("Uses"),
        fixtures::main_parameters(),
        vec![LocalDecl {
            name: "p".to_string(),
            type_full_name: "Printer".to_string(),
        }],
        vec![
            Unit::new(UnitKind::Invoke(invoke)),
            fixtures::return_void(),
        ],
    )
    .unwrap();
    let mut class = fixtures::class_of("Uses", &[], Vec::new());
    class.methods = vec![graph];

    let driver = fixtures::project_classes(vec![class]);
    let view = driver
        .get_method("Uses.main", MAIN_SIGNATURE, true)
        .unwrap();

    let call = view
        .nodes_of_kind(NodeKind::Call)
        .find(|node| node.name() == Some("print"))
        .unwrap();
    let call_id = call.id().unwrap();

    let receivers = view
        .edges_of_kind(EdgeKind::Receiver)
        .filter(|edge| edge.source == call_id)
        .collect::<Vec<_>>();
    assert_eq!(receivers.len(), 1);
    let receiver = view.node(receivers[0].target).unwrap();
    assert_eq!(receiver.kind(), NodeKind::Identifier);
    assert_eq!(receiver.name(), Some("p"));
    assert_eq!(receiver.argument_index, 0);

    let arguments = view
        .edges_of_kind(EdgeKind::Argument)
        .filter(|edge| edge.source == call_id)
        .collect::<Vec<_>>();
    assert_eq!(arguments.len(), 1);
    let argument = view.node(arguments[0].target).unwrap();
    assert_eq!(argument.kind(), NodeKind::Literal);
    assert_eq!(argument.argument_index, 1);
    assert_eq!(argument.code, "42");
}
