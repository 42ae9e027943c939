// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The in-memory reference driver.
//!
//! A straightforward adjacency-list store: nodes keyed by id, one outgoing and one incoming
//! half-edge list per node, and a by-kind index for the lookups the retrieval operations need.
//! This driver is the correctness oracle for every other back-end — the storage tests run the
//! same operations against both and compare the resulting views.
//!
//! Ids come from a monotonic counter.  The counter is keyed off the maximum id the store has ever
//! held, so re-inserting a node that still carries an id (for instance when replaying serialised
//! records) never collides with fresh allocations.

use std::collections::HashSet;

use fxhash::FxHashMap;
use fxhash::FxHashSet;
use smallvec::SmallVec;

use crate::drivers::Driver;
use crate::drivers::DriverError;
use crate::drivers::Edge;
use crate::drivers::Result;
use crate::drivers::SubGraph;
use crate::nodes::Node;
use crate::nodes::NodeData;
use crate::nodes::NodeId;
use crate::schema::is_allowed;
use crate::schema::EdgeKind;
use crate::schema::NodeKind;
use crate::schema::SchemaError;

/// One half of a stored edge: the label and the far endpoint.
type HalfEdges = SmallVec<[(EdgeKind, NodeId); 4]>;

/// The edge kinds [`Driver::get_method`][] traverses outward from a `METHOD` node.
///
/// [`Driver::get_method`]: ../drivers/trait.Driver.html#tymethod.get_method
pub const METHOD_TRAVERSAL: [EdgeKind; 9] = [
    EdgeKind::Ast,
    EdgeKind::Ref,
    EdgeKind::Cfg,
    EdgeKind::Argument,
    EdgeKind::CapturedBy,
    EdgeKind::BindsTo,
    EdgeKind::Receiver,
    EdgeKind::Condition,
    EdgeKind::Binds,
];

/// The edge kinds `delete_method` follows to collect a method's sub-CPG.  `REF`, `CALL`, and
/// `SOURCE_FILE` edges leave the method and must not be followed.
const METHOD_DELETION: [EdgeKind; 5] = [
    EdgeKind::Ast,
    EdgeKind::Cfg,
    EdgeKind::Argument,
    EdgeKind::Receiver,
    EdgeKind::Condition,
];

pub struct InMemoryDriver {
    nodes: FxHashMap<NodeId, Node>,
    outgoing: FxHashMap<NodeId, HalfEdges>,
    incoming: FxHashMap<NodeId, HalfEdges>,
    by_kind: FxHashMap<NodeKind, FxHashSet<NodeId>>,
    next_id: i64,
}

impl InMemoryDriver {
    pub fn new() -> InMemoryDriver {
        InMemoryDriver {
            nodes: FxHashMap::default(),
            outgoing: FxHashMap::default(),
            incoming: FxHashMap::default(),
            by_kind: FxHashMap::default(),
            next_id: 1,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing
            .iter()
            .flat_map(|(_, edges)| edges.iter())
            .filter(|(_, target)| self.nodes.contains_key(target))
            .count()
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn ids_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.by_kind.get(&kind).into_iter().flatten().copied()
    }

    /// The id of an already-stored node this builder must collapse onto, if any.  `FILE` nodes
    /// are unique by name, `NAMESPACE_BLOCK` nodes by full name, and `META_DATA` is a singleton.
    /// The second component says whether the incoming properties replace the stored ones (a
    /// re-added file refreshes its hash; a shared namespace block keeps what it has).
    fn deduplicate(&self, node: &Node) -> Option<(NodeId, bool)> {
        match node.data() {
            NodeData::File { name, .. } => self
                .ids_of_kind(NodeKind::File)
                .find(|id| {
                    matches!(self.nodes[id].data(), NodeData::File { name: stored, .. } if stored == name)
                })
                .map(|id| (id, true)),
            NodeData::NamespaceBlock { full_name, .. } => self
                .ids_of_kind(NodeKind::NamespaceBlock)
                .find(|id| {
                    matches!(
                        self.nodes[id].data(),
                        NodeData::NamespaceBlock { full_name: stored, .. } if stored == full_name
                    )
                })
                .map(|id| (id, false)),
            NodeData::MetaData { .. } => self
                .ids_of_kind(NodeKind::MetaData)
                .next()
                .map(|id| (id, true)),
            _ => None,
        }
    }

    fn store(&mut self, node: Node) {
        let id = node.id().expect("stored nodes carry an id");
        self.by_kind.entry(node.kind()).or_default().insert(id);
        self.outgoing.entry(id).or_default();
        self.incoming.entry(id).or_default();
        self.nodes.insert(id, node);
    }

    /// Removes one node and its incident edges.  When `preserve_inbound_calls` is set, inbound
    /// `CALL` half-edges are left in their sources' outgoing lists as dangling references.
    fn remove_node(&mut self, id: NodeId, preserve_inbound_calls: bool) {
        let node = match self.nodes.remove(&id) {
            Some(node) => node,
            None => return,
        };
        if let Some(ids) = self.by_kind.get_mut(&node.kind()) {
            ids.remove(&id);
        }
        if let Some(out) = self.outgoing.remove(&id) {
            for (kind, target) in out {
                if let Some(inc) = self.incoming.get_mut(&target) {
                    inc.retain(|(inc_kind, source)| !(*inc_kind == kind && *source == id));
                }
            }
        }
        if let Some(inc) = self.incoming.remove(&id) {
            for (kind, source) in inc {
                if preserve_inbound_calls && kind == EdgeKind::Call {
                    continue;
                }
                if let Some(out) = self.outgoing.get_mut(&source) {
                    out.retain(|(out_kind, target)| !(*out_kind == kind && *target == id));
                }
            }
        }
    }

    fn find_method(&self, full_name: &str, signature: &str) -> Option<NodeId> {
        self.ids_of_kind(NodeKind::Method).find(|id| {
            matches!(
                self.nodes[id].data(),
                NodeData::Method {
                    full_name: stored_full_name,
                    signature: stored_signature,
                    ..
                } if stored_full_name == full_name && stored_signature == signature
            )
        })
    }

    /// Outward BFS from `start` along the given edge kinds.
    fn closure(&self, start: NodeId, kinds: &[EdgeKind]) -> FxHashSet<NodeId> {
        let mut selected = FxHashSet::default();
        let mut frontier = vec![start];
        selected.insert(start);
        while let Some(current) = frontier.pop() {
            for (kind, target) in self.outgoing.get(&current).into_iter().flatten() {
                if !kinds.contains(kind) || !self.nodes.contains_key(target) {
                    continue;
                }
                if selected.insert(*target) {
                    frontier.push(*target);
                }
            }
        }
        selected
    }

    /// Builds the read-only view over a selection: the selected nodes plus every edge whose
    /// endpoints are both selected.  Dangling half-edges never make it into a view.
    fn view(&self, selection: &FxHashSet<NodeId>) -> SubGraph {
        let mut view = SubGraph::new();
        for id in selection {
            if let Some(node) = self.nodes.get(id) {
                view.insert_node(node.clone());
            }
        }
        for id in selection {
            for (kind, target) in self.outgoing.get(id).into_iter().flatten() {
                if selection.contains(target) && self.nodes.contains_key(target) {
                    view.push_edge(Edge::new(*id, *target, *kind));
                }
            }
        }
        view
    }

    fn ensure_persisted(&mut self, node: &mut Node) -> Result<NodeId> {
        match node.id() {
            Some(id) if self.nodes.contains_key(&id) => Ok(id),
            _ => self.add_vertex(node),
        }
    }
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for InMemoryDriver {
    fn add_vertex(&mut self, node: &mut Node) -> Result<NodeId> {
        if let Some(id) = node.id() {
            if self.nodes.contains_key(&id) {
                // Upsert: re-adding a persisted builder refreshes its properties.
                self.nodes.insert(id, node.clone());
                return Ok(id);
            }
            // A foreign id (e.g. replayed from a serialised record).  Keep it, but make sure the
            // allocator stays ahead of it.
            self.next_id = self.next_id.max(id.as_i64() + 1);
            self.store(node.clone());
            return Ok(id);
        }
        if let Some((existing, overwrite)) = self.deduplicate(node) {
            node.set_id(existing);
            if overwrite {
                self.nodes.insert(existing, node.clone());
            }
            return Ok(existing);
        }
        let id = self.allocate_id();
        node.set_id(id);
        self.store(node.clone());
        Ok(id)
    }

    fn vertex_exists(&self, node: &Node) -> Result<bool> {
        Ok(match node.id() {
            Some(id) => self.nodes.contains_key(&id),
            None => false,
        })
    }

    fn edge_exists(&self, source: &Node, target: &Node, kind: EdgeKind) -> Result<bool> {
        let (source, target) = match (source.id(), target.id()) {
            (Some(source), Some(target)) => (source, target),
            _ => return Ok(false),
        };
        Ok(self
            .outgoing
            .get(&source)
            .into_iter()
            .flatten()
            .any(|(stored_kind, stored_target)| *stored_kind == kind && *stored_target == target))
    }

    fn add_edge(&mut self, source: &mut Node, target: &mut Node, kind: EdgeKind) -> Result<()> {
        if !is_allowed(source.kind(), kind, target.kind()) {
            return Err(DriverError::Schema(SchemaError::IllegalEdge {
                src: source.kind(),
                edge: kind,
                dst: target.kind(),
            }));
        }
        let source_id = self.ensure_persisted(source)?;
        let target_id = self.ensure_persisted(target)?;
        if kind == EdgeKind::Call {
            // A re-linked call site sheds any dangling references left behind by deleted targets.
            let nodes = &self.nodes;
            if let Some(out) = self.outgoing.get_mut(&source_id) {
                out.retain(|(out_kind, out_target)| {
                    *out_kind != EdgeKind::Call || nodes.contains_key(out_target)
                });
            }
        }
        if self.edge_exists(source, target, kind)? {
            return Ok(());
        }
        self.outgoing
            .entry(source_id)
            .or_default()
            .push((kind, target_id));
        self.incoming
            .entry(target_id)
            .or_default()
            .push((kind, source_id));
        Ok(())
    }

    fn delete_vertex(&mut self, node: &Node) -> Result<()> {
        if let Some(id) = node.id() {
            self.remove_node(id, false);
        }
        Ok(())
    }

    fn delete_method(&mut self, full_name: &str, signature: &str) -> Result<()> {
        let method = match self.find_method(full_name, signature) {
            Some(method) => method,
            None => return Ok(()),
        };
        log::debug!("deleting method {} {}", full_name, signature);
        let closure = self.closure(method, &METHOD_DELETION);
        for id in closure {
            self.remove_node(id, id == method);
        }
        Ok(())
    }

    fn get_method(
        &self,
        full_name: &str,
        signature: &str,
        include_body: bool,
    ) -> Result<SubGraph> {
        let method = match self.find_method(full_name, signature) {
            Some(method) => method,
            None => return Ok(SubGraph::new()),
        };
        let selection = if include_body {
            self.closure(method, &METHOD_TRAVERSAL)
        } else {
            let mut selection = FxHashSet::default();
            selection.insert(method);
            for (kind, target) in self.outgoing.get(&method).into_iter().flatten() {
                if *kind != EdgeKind::Ast {
                    continue;
                }
                if let Some(node) = self.nodes.get(target) {
                    if matches!(
                        node.kind(),
                        NodeKind::MethodParameterIn | NodeKind::MethodReturn | NodeKind::Modifier
                    ) {
                        selection.insert(*target);
                    }
                }
            }
            selection
        };
        Ok(self.view(&selection))
    }

    fn get_program_structure(&self) -> Result<SubGraph> {
        let mut selection = FxHashSet::default();
        let mut frontier = Vec::new();
        for id in self.ids_of_kind(NodeKind::File) {
            selection.insert(id);
            frontier.push(id);
        }
        while let Some(current) = frontier.pop() {
            for (kind, target) in self.outgoing.get(&current).into_iter().flatten() {
                if *kind != EdgeKind::Ast {
                    continue;
                }
                match self.nodes.get(target) {
                    Some(node) if node.kind() == NodeKind::NamespaceBlock => {
                        if selection.insert(*target) {
                            frontier.push(*target);
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(self.view(&selection))
    }

    fn get_neighbours(&self, node: &Node) -> Result<SubGraph> {
        let id = match node.id() {
            Some(id) if self.nodes.contains_key(&id) => id,
            _ => return Ok(SubGraph::new()),
        };
        let mut selection = FxHashSet::default();
        selection.insert(id);
        for (_, target) in self.outgoing.get(&id).into_iter().flatten() {
            if self.nodes.contains_key(target) {
                selection.insert(*target);
            }
        }
        for (_, source) in self.incoming.get(&id).into_iter().flatten() {
            if self.nodes.contains_key(source) {
                selection.insert(*source);
            }
        }
        Ok(self.view(&selection))
    }

    fn get_whole_graph(&self) -> Result<SubGraph> {
        let selection = self.nodes.keys().copied().collect();
        Ok(self.view(&selection))
    }

    fn get_vertex_ids(&self, lo: i64, hi: i64) -> Result<HashSet<NodeId>> {
        Ok(self
            .nodes
            .keys()
            .copied()
            .filter(|id| lo <= id.as_i64() && id.as_i64() <= hi)
            .collect())
    }

    fn clear(&mut self) -> Result<()> {
        self.nodes.clear();
        self.outgoing.clear();
        self.incoming.clear();
        self.by_kind.clear();
        self.next_id = 1;
        Ok(())
    }
}
