// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The driver contract: one abstraction over heterogeneous graph stores.
//!
//! A driver persists CPG nodes and edges and answers a small set of structural queries.  The
//! contract is synchronous; back-ends that talk to remote stores may block on I/O, so callers
//! must treat every call as potentially blocking, and every operation — including the existence
//! checks — is fallible.  No concurrent-writer safety is required of a back-end: the extractor is
//! single-writer, and exclusive access is the caller's responsibility.
//!
//! Two guarantees bind every implementation:
//!
//!   - **Schema closure.**  An edge whose `(source kind, label, destination kind)` triple the
//!     schema forbids is rejected with [`DriverError::Schema`][] _before_ any part of the
//!     operation becomes visible (fail-closed) — including the auto-insertion of endpoints.
//!   - **Call-graph stability.**  [`delete_method`][] removes the method's AST/body closure but
//!     preserves inbound `CALL` edges as dangling references, so that callers keep their symbolic
//!     link until the target is re-created.
//!
//! [`DriverError::Schema`]: enum.DriverError.html#variant.Schema
//! [`delete_method`]: trait.Driver.html#tymethod.delete_method

use std::collections::HashSet;

use fxhash::FxHashMap;
use thiserror::Error;

use crate::nodes::Node;
use crate::nodes::NodeId;
use crate::schema::EdgeKind;
use crate::schema::NodeKind;
use crate::schema::SchemaError;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("driver unavailable: {0}")]
    Unavailable(String),

    #[error("back-end error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// A directed, labelled edge between two persisted nodes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId, kind: EdgeKind) -> Edge {
        Edge {
            source,
            target,
            kind,
        }
    }
}

/// A transient read-only view over a selection of the store: the selected nodes, plus every edge
/// whose endpoints are both in the selection.
#[derive(Clone, Debug, Default)]
pub struct SubGraph {
    nodes: FxHashMap<NodeId, Node>,
    edges: Vec<Edge>,
}

impl SubGraph {
    pub fn new() -> SubGraph {
        SubGraph::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |node| node.kind() == kind)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.kind == kind)
    }

    pub fn contains_edge(&self, source: NodeId, target: NodeId, kind: EdgeKind) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.source == source && edge.target == target && edge.kind == kind)
    }

    /// The AST children of `parent`, in sibling `order`.
    pub fn ast_children(&self, parent: NodeId) -> Vec<&Node> {
        let mut children = self
            .edges_of_kind(EdgeKind::Ast)
            .filter(|edge| edge.source == parent)
            .filter_map(|edge| self.node(edge.target))
            .collect::<Vec<_>>();
        children.sort_by_key(|node| node.order);
        children
    }

    pub fn insert_node(&mut self, node: Node) {
        let id = node
            .id()
            .expect("only persisted nodes can enter a sub-graph view");
        self.nodes.insert(id, node);
    }

    pub fn push_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }
}

/// The storage-backend abstraction.  See the module docs for the contract; see
/// [`InMemoryDriver`][] for the reference implementation that other back-ends are tested against.
///
/// [`InMemoryDriver`]: ../memory/struct.InMemoryDriver.html
pub trait Driver {
    /// Persists `node`, finalising its id (written back through the `&mut`).  Re-adding a node
    /// whose id is already persisted updates its properties in place.  `FILE` nodes are
    /// deduplicated by name and `NAMESPACE_BLOCK` nodes by full name: adding a second one
    /// rewrites the builder's id to the existing node's id.
    fn add_vertex(&mut self, node: &mut Node) -> Result<NodeId>;

    /// Whether `node` (by id) is persisted in this store.
    fn vertex_exists(&self, node: &Node) -> Result<bool>;

    /// Whether an edge labelled `kind` from `source` to `target` is persisted in this store.
    fn edge_exists(&self, source: &Node, target: &Node, kind: EdgeKind) -> Result<bool>;

    /// Persists an edge, auto-inserting either endpoint that is not yet persisted.  Rejects
    /// schema-violating edges before any mutation.  Idempotent.
    fn add_edge(&mut self, source: &mut Node, target: &mut Node, kind: EdgeKind) -> Result<()>;

    /// Removes `node` and its incident edges.  Idempotent; absent nodes are not an error.
    fn delete_vertex(&mut self, node: &Node) -> Result<()>;

    /// Removes the AST/body closure of the method identified by `full_name` and `signature`,
    /// preserving inbound `CALL` edges as dangling references.  A method that does not exist is
    /// not an error.
    fn delete_method(&mut self, full_name: &str, signature: &str) -> Result<()>;

    /// The sub-graph of the matching method: its head and, when `include_body` is set, the
    /// transitive closure along `AST`, `REF`, `CFG`, `ARGUMENT`, `CAPTURED_BY`, `BINDS_TO`,
    /// `RECEIVER`, `CONDITION`, and `BINDS` edges.  Empty when no method matches.
    fn get_method(&self, full_name: &str, signature: &str, include_body: bool)
        -> Result<SubGraph>;

    /// The sub-graph induced by `FILE` and `NAMESPACE_BLOCK` nodes and the `AST` edges between
    /// them.
    fn get_program_structure(&self) -> Result<SubGraph>;

    /// The one-hop in- and out-neighbourhood of `node`, including the node itself.
    fn get_neighbours(&self, node: &Node) -> Result<SubGraph>;

    /// The full store.
    fn get_whole_graph(&self) -> Result<SubGraph>;

    /// The ids of all persisted nodes in the inclusive range `[lo, hi]`.
    fn get_vertex_ids(&self, lo: i64, hi: i64) -> Result<HashSet<NodeId>>;

    /// Empties the store.
    fn clear(&mut self) -> Result<()>;
}
