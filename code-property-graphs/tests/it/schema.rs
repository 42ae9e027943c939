// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use code_property_graphs::schema::is_allowed;
use code_property_graphs::schema::EdgeKind;
use code_property_graphs::schema::NodeKind;
use code_property_graphs::schema::SchemaError;

#[test]
fn structural_ast_triples_are_allowed() {
    assert!(is_allowed(NodeKind::File, EdgeKind::Ast, NodeKind::NamespaceBlock));
    assert!(is_allowed(
        NodeKind::NamespaceBlock,
        EdgeKind::Ast,
        NodeKind::NamespaceBlock
    ));
    assert!(is_allowed(NodeKind::NamespaceBlock, EdgeKind::Ast, NodeKind::TypeDecl));
    assert!(is_allowed(NodeKind::TypeDecl, EdgeKind::Ast, NodeKind::Method));
    assert!(is_allowed(NodeKind::TypeDecl, EdgeKind::Ast, NodeKind::Member));
    assert!(is_allowed(NodeKind::Method, EdgeKind::Ast, NodeKind::MethodParameterIn));
    assert!(is_allowed(NodeKind::Method, EdgeKind::Ast, NodeKind::MethodReturn));
    assert!(is_allowed(NodeKind::Method, EdgeKind::Ast, NodeKind::Block));
    assert!(is_allowed(NodeKind::Block, EdgeKind::Ast, NodeKind::Local));
    assert!(is_allowed(NodeKind::Block, EdgeKind::Ast, NodeKind::Call));
    assert!(is_allowed(NodeKind::ControlStructure, EdgeKind::Ast, NodeKind::JumpTarget));
}

#[test]
fn nonsense_ast_triples_are_rejected() {
    assert!(!is_allowed(NodeKind::File, EdgeKind::Ast, NodeKind::Method));
    assert!(!is_allowed(NodeKind::Literal, EdgeKind::Ast, NodeKind::Call));
    assert!(!is_allowed(NodeKind::Method, EdgeKind::Ast, NodeKind::File));
    assert!(!is_allowed(NodeKind::MetaData, EdgeKind::Ast, NodeKind::File));
    assert!(!is_allowed(NodeKind::JumpTarget, EdgeKind::Ast, NodeKind::Call));
}

#[test]
fn cfg_connects_body_nodes_only() {
    assert!(is_allowed(NodeKind::Block, EdgeKind::Cfg, NodeKind::Identifier));
    assert!(is_allowed(NodeKind::Call, EdgeKind::Cfg, NodeKind::Call));
    assert!(is_allowed(NodeKind::Return, EdgeKind::Cfg, NodeKind::MethodReturn));
    assert!(is_allowed(NodeKind::ControlStructure, EdgeKind::Cfg, NodeKind::JumpTarget));
    assert!(!is_allowed(NodeKind::Method, EdgeKind::Cfg, NodeKind::Block));
    assert!(!is_allowed(NodeKind::MethodReturn, EdgeKind::Cfg, NodeKind::Call));
    assert!(!is_allowed(NodeKind::File, EdgeKind::Cfg, NodeKind::File));
}

#[test]
fn dependence_edges_have_narrow_domains() {
    assert!(is_allowed(NodeKind::Identifier, EdgeKind::Ref, NodeKind::Local));
    assert!(is_allowed(NodeKind::Identifier, EdgeKind::Ref, NodeKind::MethodParameterIn));
    assert!(is_allowed(NodeKind::FieldIdentifier, EdgeKind::Ref, NodeKind::Member));
    assert!(is_allowed(NodeKind::Binding, EdgeKind::Ref, NodeKind::Method));
    assert!(!is_allowed(NodeKind::Local, EdgeKind::Ref, NodeKind::Identifier));

    assert!(is_allowed(NodeKind::Call, EdgeKind::Argument, NodeKind::Literal));
    assert!(is_allowed(NodeKind::Return, EdgeKind::Argument, NodeKind::Identifier));
    assert!(!is_allowed(NodeKind::Call, EdgeKind::Argument, NodeKind::JumpTarget));

    assert!(is_allowed(NodeKind::Call, EdgeKind::Receiver, NodeKind::Identifier));
    assert!(!is_allowed(NodeKind::Call, EdgeKind::Receiver, NodeKind::Literal));

    assert!(is_allowed(NodeKind::Call, EdgeKind::Call, NodeKind::Method));
    assert!(!is_allowed(NodeKind::Call, EdgeKind::Call, NodeKind::TypeDecl));

    assert!(is_allowed(NodeKind::Method, EdgeKind::SourceFile, NodeKind::File));
    assert!(!is_allowed(NodeKind::TypeDecl, EdgeKind::SourceFile, NodeKind::File));

    assert!(is_allowed(NodeKind::TypeDecl, EdgeKind::Binds, NodeKind::Binding));
    assert!(is_allowed(NodeKind::TypeArgument, EdgeKind::BindsTo, NodeKind::TypeParameter));
}

#[test]
fn captured_by_is_reserved() {
    for src in NodeKind::ALL.iter() {
        for dst in NodeKind::ALL.iter() {
            assert!(!is_allowed(*src, EdgeKind::CapturedBy, *dst));
        }
    }
}

#[test]
fn node_kind_labels_round_trip() {
    for kind in NodeKind::ALL.iter() {
        let parsed: NodeKind = kind.as_str().parse().unwrap();
        assert_eq!(parsed, *kind);
    }
    let error = "NOT_A_KIND".parse::<NodeKind>().unwrap_err();
    assert_eq!(error, SchemaError::UnknownNodeKind("NOT_A_KIND".to_string()));
}

#[test]
fn edge_kind_labels_round_trip() {
    for kind in EdgeKind::ALL.iter() {
        let parsed: EdgeKind = kind.as_str().parse().unwrap();
        assert_eq!(parsed, *kind);
    }
    let error = "NOT_AN_EDGE".parse::<EdgeKind>().unwrap_err();
    assert_eq!(error, SchemaError::UnknownEdgeKind("NOT_AN_EDGE".to_string()));
}
