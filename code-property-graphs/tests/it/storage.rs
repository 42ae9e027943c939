// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2023, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use code_property_graphs::drivers::Driver;
use code_property_graphs::memory::InMemoryDriver;
use code_property_graphs::schema::EdgeKind;
use code_property_graphs::schema::NodeKind;
use code_property_graphs::storage::SqliteDriver;

use crate::util;
use crate::util::SAMPLE_FULL_NAME;
use crate::util::SAMPLE_SIGNATURE;

/// Runs the same build against the reference driver and the SQLite driver and asserts that both
/// stores answer every retrieval identically.
#[test]
fn sqlite_agrees_with_the_in_memory_oracle() {
    let mut oracle = InMemoryDriver::new();
    util::build_sample_method(&mut oracle);
    let mut sqlite = SqliteDriver::open_in_memory().unwrap();
    util::build_sample_method(&mut sqlite);

    let oracle_view = oracle.get_whole_graph().unwrap();
    let sqlite_view = sqlite.get_whole_graph().unwrap();
    assert_eq!(sqlite_view.node_count(), oracle_view.node_count());
    assert_eq!(sqlite_view.edge_count(), oracle_view.edge_count());
    for kind in NodeKind::ALL.iter() {
        assert_eq!(
            sqlite_view.nodes_of_kind(*kind).count(),
            oracle_view.nodes_of_kind(*kind).count(),
            "node count mismatch for {}",
            kind
        );
    }
    for kind in EdgeKind::ALL.iter() {
        assert_eq!(
            sqlite_view.edges_of_kind(*kind).count(),
            oracle_view.edges_of_kind(*kind).count(),
            "edge count mismatch for {}",
            kind
        );
    }

    let oracle_method = oracle
        .get_method(SAMPLE_FULL_NAME, SAMPLE_SIGNATURE, true)
        .unwrap();
    let sqlite_method = sqlite
        .get_method(SAMPLE_FULL_NAME, SAMPLE_SIGNATURE, true)
        .unwrap();
    assert_eq!(sqlite_method.node_count(), oracle_method.node_count());
    assert_eq!(sqlite_method.edge_count(), oracle_method.edge_count());

    let oracle_structure = oracle.get_program_structure().unwrap();
    let sqlite_structure = sqlite.get_program_structure().unwrap();
    assert_eq!(
        sqlite_structure.node_count(),
        oracle_structure.node_count()
    );
}

#[test]
fn edge_insertion_is_idempotent() {
    let mut driver = SqliteDriver::open_in_memory().unwrap();
    let sample = util::build_sample_method(&mut driver);
    let mut add = sample.add.clone();
    let mut literal = sample.literal.clone();
    driver
        .add_edge(&mut add, &mut literal, EdgeKind::Argument)
        .unwrap();
    let before = driver.get_whole_graph().unwrap().edge_count();
    driver
        .add_edge(&mut add, &mut literal, EdgeKind::Argument)
        .unwrap();
    assert_eq!(driver.get_whole_graph().unwrap().edge_count(), before);
}

#[test]
fn the_store_survives_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cpg.db");
    let node_count;
    {
        let mut driver = SqliteDriver::open(&path).unwrap();
        util::build_sample_method(&mut driver);
        node_count = driver.get_whole_graph().unwrap().node_count();
    }
    let mut reopened = SqliteDriver::open(&path).unwrap();
    let view = reopened.get_whole_graph().unwrap();
    assert_eq!(view.node_count(), node_count);
    let method = reopened
        .get_method(SAMPLE_FULL_NAME, SAMPLE_SIGNATURE, true)
        .unwrap();
    assert!(!method.is_empty());

    // Id allocation continues past everything already persisted.
    let ids_before = reopened.get_vertex_ids(0, i64::MAX).unwrap();
    let mut fresh = util::file_node("Other.class", "00");
    let id = reopened.add_vertex(&mut fresh).unwrap();
    assert!(!ids_before.contains(&id));
}

#[test]
fn delete_method_preserves_inbound_call_edges_as_danglers() {
    let mut driver = SqliteDriver::open_in_memory().unwrap();
    let sample = util::build_sample_method(&mut driver);
    let mut caller = util::call_node("inc").with_code("inc(4)");
    driver.add_vertex(&mut caller).unwrap();
    let mut method = sample.method.clone();
    driver
        .add_edge(&mut caller, &mut method, EdgeKind::Call)
        .unwrap();

    driver
        .delete_method(SAMPLE_FULL_NAME, SAMPLE_SIGNATURE)
        .unwrap();
    assert!(driver.vertex_exists(&caller).unwrap());
    assert!(!driver.vertex_exists(&sample.method).unwrap());
    assert!(driver.vertex_exists(&sample.file).unwrap());
    let view = driver.get_whole_graph().unwrap();
    assert_eq!(view.edges_of_kind(EdgeKind::Call).count(), 0);

    let mut target = util::method_node(SAMPLE_FULL_NAME, SAMPLE_SIGNATURE);
    driver.add_vertex(&mut target).unwrap();
    driver
        .add_edge(&mut caller, &mut target, EdgeKind::Call)
        .unwrap();
    let view = driver.get_whole_graph().unwrap();
    assert_eq!(view.edges_of_kind(EdgeKind::Call).count(), 1);
}

#[test]
fn clear_empties_the_store() {
    let mut driver = SqliteDriver::open_in_memory().unwrap();
    util::build_sample_method(&mut driver);
    driver.clear().unwrap();
    let view = driver.get_whole_graph().unwrap();
    assert!(view.is_empty());
    let mut node = util::file_node("Foo.class", "aa");
    let id = driver.add_vertex(&mut node).unwrap();
    assert_eq!(id.as_i64(), 1);
}

#[test]
fn schema_violations_leave_the_store_untouched() {
    let mut driver = SqliteDriver::open_in_memory().unwrap();
    let mut file = util::file_node("Foo.class", "aa");
    let mut method = util::method_node("Foo.bar", "void()");
    assert!(driver
        .add_edge(&mut file, &mut method, EdgeKind::Ast)
        .is_err());
    assert!(driver.get_whole_graph().unwrap().is_empty());
}
