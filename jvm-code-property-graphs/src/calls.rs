// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Wires `CALL` edges from call sites to their target methods.
//!
//! The targets come from an external call-graph oracle; how it resolved them is opaque here.
//! For each reported edge the builder finds the emitted `CALL` node through the association map
//! and the target `METHOD` node in the store.  A target that is declared but was never analysed
//! gets a phantom method head — a `METHOD` node with its `METHOD_RETURN` child and nothing else —
//! so the edge always has somewhere to land.  A call site the oracle never mentions keeps only
//! its symbolic `methodFullName` reference.

use code_property_graphs::drivers::Driver;
use code_property_graphs::drivers::Result;
use code_property_graphs::nodes::Node;
use code_property_graphs::nodes::NodeData;
use code_property_graphs::schema::EdgeKind;
use code_property_graphs::schema::NodeKind;
use code_property_graphs::schema::UNSET_STRING;

use crate::assoc::AssociationMap;
use crate::ir::CallGraphOracle;
use crate::ir::MethodSignature;

#[derive(Clone, Copy, Debug, Default)]
pub struct LinkStats {
    pub calls_linked: usize,
    pub phantoms_created: usize,
}

pub struct CallGraphBuilder<'a, D: Driver> {
    driver: &'a mut D,
}

impl<'a, D: Driver> CallGraphBuilder<'a, D> {
    pub fn new(driver: &'a mut D) -> CallGraphBuilder<'a, D> {
        CallGraphBuilder { driver }
    }

    /// Links every out-edge the oracle reports for the freshly built methods.
    pub fn link(
        &mut self,
        assoc: &AssociationMap,
        oracle: &dyn CallGraphOracle,
    ) -> Result<LinkStats> {
        let mut stats = LinkStats::default();
        for (signature, method_assoc) in assoc.iter() {
            for site in oracle.out_edges(signature) {
                let info = match method_assoc.invocation(site.unit) {
                    Some(info) => info,
                    None => {
                        log::warn!(
                            "call graph names unit {} of {}, but no call was emitted there",
                            site.unit,
                            signature
                        );
                        continue;
                    }
                };
                let (mut target, phantom) = self.resolve_target(&site.target)?;
                if phantom {
                    stats.phantoms_created += 1;
                }
                let mut call = info.call.clone();
                self.driver.add_edge(&mut call, &mut target, EdgeKind::Call)?;
                stats.calls_linked += 1;
            }
        }
        Ok(stats)
    }

    /// The target `METHOD` node, inserting a phantom head when the store has none.
    fn resolve_target(&mut self, target: &MethodSignature) -> Result<(Node, bool)> {
        let head = self
            .driver
            .get_method(&target.full_name, &target.signature, false)?;
        if let Some(method) = head.nodes_of_kind(NodeKind::Method).next() {
            return Ok((method.clone(), false));
        }
        log::debug!("inserting a phantom method head for {}", target);
        let declaring_type = match target.full_name.rfind('.') {
            Some(dot) => target.full_name[..dot].to_string(),
            None => UNSET_STRING.to_string(),
        };
        let mut method = Node::new(NodeData::Method {
            name: target.name().to_string(),
            full_name: target.full_name.clone(),
            signature: target.signature.clone(),
            file_name: UNSET_STRING.to_string(),
            ast_parent_full_name: declaring_type,
            ast_parent_type: "TYPE_DECL".to_string(),
        })
        .with_code(target.full_name.clone());
        self.driver.add_vertex(&mut method)?;
        let mut method_return = Node::new(NodeData::MethodReturn {
            type_full_name: UNSET_STRING.to_string(),
            evaluation_strategy: Default::default(),
        })
        .with_code("RETURN")
        .with_order(1);
        self.driver.add_vertex(&mut method_return)?;
        self.driver
            .add_edge(&mut method, &mut method_return, EdgeKind::Ast)?;
        Ok((method, true))
    }
}
