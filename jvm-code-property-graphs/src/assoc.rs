// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The per-run association map.
//!
//! While one `project()` call runs, every builder needs to find the nodes that earlier builders
//! already emitted for a given IR entity — the CFG builder needs the nodes of a unit, the PDG
//! builder needs the `LOCAL` for a variable name, the call-graph builder needs the `CALL` node of
//! an invocation site — without re-traversing the store.  This map records those associations in
//! emission order.  It is process-local mutable state, owned by the pipeline and threaded through
//! the builders as an explicit argument; it is dropped when the `project()` call ends.
//!
//! Handles are persisted builder clones: their ids are final, so inserting further edges through
//! them never re-persists the node.

use code_property_graphs::nodes::Node;
use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::ir::MethodSignature;
use crate::ir::UnitId;

/// How control leaves the nodes emitted for one unit.
#[derive(Clone, Debug)]
pub enum UnitExit {
    /// Straight-line unit: one edge from the last emitted node to the next unit's entry.
    FallThrough(Node),
    /// Branch unit: the control structure fans out to its two jump targets, which then lead into
    /// the taken and fall-through units.
    Branch {
        control: Node,
        on_true: Node,
        on_false: Node,
    },
    /// Return unit: one edge from the `RETURN` node to the method's `METHOD_RETURN` sink.
    Return(Node),
}

/// The nodes emitted for one unit, in evaluation order.
#[derive(Clone, Debug)]
pub struct EmittedUnit {
    /// Evaluation-order chain; the CFG builder threads an edge between each adjacent pair.
    pub chain: Vec<Node>,
    /// The unit's root node (the AST child of the enclosing block).
    pub root: Node,
    pub exit: UnitExit,
}

impl EmittedUnit {
    pub fn entry(&self) -> &Node {
        self.chain.first().unwrap_or(&self.root)
    }
}

/// A call site's argument wiring, recorded by the AST builder and consumed by the PDG and
/// call-graph builders.
#[derive(Clone, Debug)]
pub struct CallSiteInfo {
    /// The `CALL` node (or `RETURN` node, for return-value wiring).
    pub call: Node,
    /// The receiver node for instance dispatch.
    pub receiver: Option<Node>,
    /// Positional arguments, as `(argument index, node)`.
    pub arguments: Vec<(i64, Node)>,
    /// Whether this site is a genuine invocation (operator calls are argument sites but never
    /// call-graph sources).
    pub is_invoke: bool,
}

/// Everything recorded about one built method.
#[derive(Clone, Debug, Default)]
pub struct MethodAssociation {
    pub method: Option<Node>,
    pub entry_block: Option<Node>,
    pub method_return: Option<Node>,
    /// Locals and parameters by name, in emission order.
    vars: FxHashMap<String, SmallVec<[Node; 1]>>,
    units: FxHashMap<UnitId, EmittedUnit>,
    call_sites: Vec<(UnitId, CallSiteInfo)>,
    /// Every emitted `IDENTIFIER` with the variable name it stands for.
    ident_uses: Vec<(Node, String)>,
    /// Every emitted `FIELD_IDENTIFIER` with the member name it stands for.
    field_uses: Vec<(Node, String)>,
}

impl MethodAssociation {
    pub fn add_var(&mut self, name: &str, node: Node) {
        self.vars.entry(name.to_string()).or_default().push(node);
    }

    /// All nodes emitted for a variable name, in emission order.  Callers pick the first, the
    /// last, or a typed subset.
    pub fn var(&self, name: &str) -> &[Node] {
        self.vars.get(name).map(|nodes| &nodes[..]).unwrap_or(&[])
    }

    pub fn record_unit(&mut self, unit: UnitId, emitted: EmittedUnit) {
        self.units.insert(unit, emitted);
    }

    pub fn unit(&self, unit: UnitId) -> Option<&EmittedUnit> {
        self.units.get(&unit)
    }

    pub fn record_call_site(&mut self, unit: UnitId, info: CallSiteInfo) {
        self.call_sites.push((unit, info));
    }

    pub fn call_sites(&self) -> &[(UnitId, CallSiteInfo)] {
        &self.call_sites
    }

    /// The `CALL` node of the invocation in `unit`, if one was emitted.
    pub fn invocation(&self, unit: UnitId) -> Option<&CallSiteInfo> {
        self.call_sites
            .iter()
            .find(|(site_unit, info)| *site_unit == unit && info.is_invoke)
            .map(|(_, info)| info)
    }

    pub fn record_ident_use(&mut self, node: Node, var_name: &str) {
        self.ident_uses.push((node, var_name.to_string()));
    }

    pub fn ident_uses(&self) -> &[(Node, String)] {
        &self.ident_uses
    }

    pub fn record_field_use(&mut self, node: Node, member_name: &str) {
        self.field_uses.push((node, member_name.to_string()));
    }

    pub fn field_uses(&self) -> &[(Node, String)] {
        &self.field_uses
    }
}

/// The association map for one `project()` run: one [`MethodAssociation`][] per built method.
///
/// [`MethodAssociation`]: struct.MethodAssociation.html
#[derive(Debug, Default)]
pub struct AssociationMap {
    methods: FxHashMap<MethodSignature, MethodAssociation>,
}

impl AssociationMap {
    pub fn new() -> AssociationMap {
        AssociationMap::default()
    }

    pub fn insert(&mut self, signature: MethodSignature, association: MethodAssociation) {
        self.methods.insert(signature, association);
    }

    pub fn remove(&mut self, signature: &MethodSignature) -> Option<MethodAssociation> {
        self.methods.remove(signature)
    }

    pub fn method(&self, signature: &MethodSignature) -> Option<&MethodAssociation> {
        self.methods.get(signature)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MethodSignature, &MethodAssociation)> {
        self.methods.iter()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
