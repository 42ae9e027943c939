// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use std::fs;

use code_property_graphs::drivers::Driver;
use code_property_graphs::memory::InMemoryDriver;
use code_property_graphs::nodes::NodeData;
use code_property_graphs::schema::EdgeKind;
use code_property_graphs::schema::NodeKind;
use code_property_graphs::RunToCompletion;
use jvm_code_property_graphs::ir::BinaryOp;
use jvm_code_property_graphs::ir::CallGraphAlg;
use jvm_code_property_graphs::ir::MethodSignature;
use jvm_code_property_graphs::loader::content_hash;
use jvm_code_property_graphs::Extractor;
use jvm_code_property_graphs::ExtractorConfig;

use crate::fixtures;
use crate::fixtures::FixtureLifter;
use crate::fixtures::MAIN_SIGNATURE;

#[test]
fn projecting_unchanged_inputs_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let class = fixtures::conditional1();
    let path = dir.path().join(&class.file_name);
    fs::write(&path, b"conditional1-v1").unwrap();
    let lifter = FixtureLifter::new().with_class(class);

    let mut extractor = Extractor::new(InMemoryDriver::new(), ExtractorConfig::default());
    extractor.load(&path).unwrap();
    let first = extractor.project(&lifter, &RunToCompletion).unwrap();
    assert_eq!(first.classes_built, 1);
    assert_eq!(first.methods_built, 1);

    let ids_before = extractor.driver().get_vertex_ids(0, i64::MAX).unwrap();
    let edges_before = extractor.driver().get_whole_graph().unwrap().edge_count();

    extractor.load(&path).unwrap();
    let second = extractor.project(&lifter, &RunToCompletion).unwrap();
    assert_eq!(second.classes_built, 0);
    assert_eq!(second.classes_skipped, 1);
    assert_eq!(second.methods_built, 0);

    let ids_after = extractor.driver().get_vertex_ids(0, i64::MAX).unwrap();
    assert_eq!(ids_before, ids_after);
    assert_eq!(
        extractor.driver().get_whole_graph().unwrap().edge_count(),
        edges_before
    );
}

#[test]
fn changed_files_are_deleted_and_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let v1 = fixtures::conditional1();
    let path = dir.path().join(&v1.file_name);
    fs::write(&path, b"conditional1-v1").unwrap();
    let lifter = FixtureLifter::new().with_class(v1);

    let mut extractor = Extractor::new(InMemoryDriver::new(), ExtractorConfig::default());
    extractor.load(&path).unwrap();
    extractor.project(&lifter, &RunToCompletion).unwrap();
    let old_method_id = {
        let view = extractor
            .driver()
            .get_method("Conditional1.main", MAIN_SIGNATURE, false)
            .unwrap();
        let id = view.nodes_of_kind(NodeKind::Method).next().unwrap().id().unwrap();
        id
    };

    // Same class name, new content: the final assignment multiplies instead of subtracting.
    let v2 = fixtures::class_of(
        "Conditional1",
        &["a", "b"],
        vec![
            fixtures::assign_constant("a", "7"),
            fixtures::assign_constant("b", "4"),
            fixtures::branch(BinaryOp::Gt, "a", "b", 5),
            fixtures::assign_binary("b", BinaryOp::Sub, "a", "b"),
            fixtures::goto(6),
            fixtures::assign_binary("a", BinaryOp::Add, "a", "b"),
            fixtures::assign_binary("a", BinaryOp::Mul, "a", "b"),
            fixtures::return_void(),
        ],
    );
    let new_bytes = b"conditional1-v2";
    fs::write(&path, new_bytes).unwrap();
    let lifter = FixtureLifter::new().with_class(v2);

    extractor.load(&path).unwrap();
    let stats = extractor.project(&lifter, &RunToCompletion).unwrap();
    assert_eq!(stats.classes_built, 1);
    assert_eq!(stats.classes_skipped, 0);

    let view = extractor
        .driver()
        .get_method("Conditional1.main", MAIN_SIGNATURE, true)
        .unwrap();
    let calls = fixtures::call_names(&view);
    assert_eq!(calls.get("MUL"), Some(&1));
    assert_eq!(calls.get("SUB"), Some(&1));

    // The rebuilt method is a new node, and the file records the new hash.
    let method = view.nodes_of_kind(NodeKind::Method).next().unwrap();
    assert_ne!(method.id().unwrap(), old_method_id);
    let structure = extractor.driver().get_program_structure().unwrap();
    let file = structure.nodes_of_kind(NodeKind::File).next().unwrap();
    match file.data() {
        NodeData::File { hash, .. } => {
            assert_eq!(hash.as_deref(), Some(content_hash(new_bytes).as_str()))
        }
        other => panic!("expected a file, got {:?}", other),
    }
}

#[test]
fn re_ingesting_after_deletion_reproduces_the_method_modulo_ids() {
    let dir = tempfile::tempdir().unwrap();
    let class = fixtures::conditional1();
    let path = dir.path().join(&class.file_name);
    fs::write(&path, b"conditional1-v1").unwrap();
    let lifter = FixtureLifter::new().with_class(class);

    let mut extractor = Extractor::new(InMemoryDriver::new(), ExtractorConfig::default());
    extractor.load(&path).unwrap();
    extractor.project(&lifter, &RunToCompletion).unwrap();
    let original = extractor
        .driver()
        .get_method("Conditional1.main", MAIN_SIGNATURE, true)
        .unwrap();

    extractor
        .driver_mut()
        .delete_method("Conditional1.main", MAIN_SIGNATURE)
        .unwrap();
    // Touch the file so the diff scan notices the class.
    fs::write(&path, b"conditional1-v1'").unwrap();
    extractor.load(&path).unwrap();
    extractor.project(&lifter, &RunToCompletion).unwrap();

    let rebuilt = extractor
        .driver()
        .get_method("Conditional1.main", MAIN_SIGNATURE, true)
        .unwrap();
    assert_eq!(rebuilt.node_count(), original.node_count());
    assert_eq!(rebuilt.edge_count(), original.edge_count());
    for kind in NodeKind::ALL.iter() {
        assert_eq!(
            rebuilt.nodes_of_kind(*kind).count(),
            original.nodes_of_kind(*kind).count(),
            "node count mismatch for {}",
            kind
        );
    }
    for kind in EdgeKind::ALL.iter() {
        assert_eq!(
            rebuilt.edges_of_kind(*kind).count(),
            original.edges_of_kind(*kind).count(),
            "edge count mismatch for {}",
            kind
        );
    }
}

#[test]
fn rebuilding_a_callee_preserves_inbound_call_edges() {
    let dir = tempfile::tempdir().unwrap();
    let callee = fixtures::conditional1();
    let target = MethodSignature::new("Conditional1.main", MAIN_SIGNATURE);
    let caller = fixtures::caller_of("Caller", &target);
    let callee_path = dir.path().join(&callee.file_name);
    let caller_path = dir.path().join(&caller.file_name);
    fs::write(&callee_path, b"callee-v1").unwrap();
    fs::write(&caller_path, b"caller-v1").unwrap();
    let lifter = FixtureLifter::new()
        .with_class(callee.clone())
        .with_class(caller.clone());

    let config = ExtractorConfig::default().with_call_graph_alg(CallGraphAlg::Cha);
    let mut extractor = Extractor::new(InMemoryDriver::new(), config);
    extractor.load(&callee_path).unwrap();
    extractor.load(&caller_path).unwrap();
    let first = extractor.project(&lifter, &RunToCompletion).unwrap();
    assert_eq!(first.calls_linked, 1);

    let call_edges = |driver: &InMemoryDriver| {
        let view = driver.get_whole_graph().unwrap();
        view.edges_of_kind(EdgeKind::Call).copied().collect::<Vec<_>>()
    };
    let before = call_edges(extractor.driver());
    assert_eq!(before.len(), 1);

    // Rebuild only the callee; the caller is skipped, and its call edge is replayed onto the
    // re-created method.
    fs::write(&callee_path, b"callee-v2").unwrap();
    extractor.load(&callee_path).unwrap();
    extractor.load(&caller_path).unwrap();
    let second = extractor.project(&lifter, &RunToCompletion).unwrap();
    assert_eq!(second.classes_built, 1);
    assert_eq!(second.classes_skipped, 1);
    assert!(second.calls_linked >= 1);

    let after = call_edges(extractor.driver());
    assert_eq!(after.len(), 1);
    // Same call site, new target.
    assert_eq!(after[0].source, before[0].source);
    assert_ne!(after[0].target, before[0].target);
    let view = extractor.driver().get_whole_graph().unwrap();
    let target_node = view.node(after[0].target).unwrap();
    assert_eq!(target_node.kind(), NodeKind::Method);
    assert!(matches!(
        target_node.data(),
        NodeData::Method { full_name, .. } if full_name == "Conditional1.main"
    ));
}
