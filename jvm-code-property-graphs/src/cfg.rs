// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Threads `CFG` edges along the unit graph's successor relation.
//!
//! Within a unit, control runs down the evaluation-order chain the AST builder recorded.
//! Between units, one edge connects the last node emitted for a unit to the first node emitted
//! for its successor.  Branch units exit through their `TRUE` and `FALSE` jump targets instead;
//! units that emit no nodes (gotos) are skipped through transitively.  The method's entry `BLOCK`
//! is the single source, and the `METHOD_RETURN` is the single sink — every `RETURN` node gets
//! one edge to it, and a fall-through off the end of the body lands there as well.

use code_property_graphs::drivers::Driver;
use code_property_graphs::drivers::Result;
use code_property_graphs::nodes::Node;
use code_property_graphs::schema::EdgeKind;
use fxhash::FxHashSet;

use crate::assoc::MethodAssociation;
use crate::assoc::UnitExit;
use crate::ir::UnitGraph;
use crate::ir::UnitId;

pub struct CfgBuilder<'a, D: Driver> {
    driver: &'a mut D,
}

impl<'a, D: Driver> CfgBuilder<'a, D> {
    pub fn new(driver: &'a mut D) -> CfgBuilder<'a, D> {
        CfgBuilder { driver }
    }

    pub fn build(&mut self, graph: &UnitGraph, assoc: &MethodAssociation) -> Result<()> {
        let block = assoc
            .entry_block
            .clone()
            .expect("AST builder populates the entry block");
        let method_return = assoc
            .method_return
            .clone()
            .expect("AST builder populates the method return");

        match entry_of(graph, assoc, 0) {
            Some(first) => self.edge(&block, &first)?,
            None => self.edge(&block, &method_return)?,
        }

        for unit_id in 0..graph.units().len() {
            let emitted = match assoc.unit(unit_id) {
                Some(emitted) => emitted,
                None => continue,
            };
            for pair in emitted.chain.windows(2) {
                self.edge(&pair[0], &pair[1])?;
            }
            match &emitted.exit {
                UnitExit::FallThrough(last) => {
                    let successors = graph.successors(unit_id);
                    if successors.is_empty() {
                        self.edge(last, &method_return)?;
                    }
                    for successor in successors {
                        match entry_of(graph, assoc, *successor) {
                            Some(entry) => self.edge(last, &entry)?,
                            None => self.edge(last, &method_return)?,
                        }
                    }
                }
                UnitExit::Branch {
                    control,
                    on_true,
                    on_false,
                } => {
                    self.edge(control, on_true)?;
                    self.edge(control, on_false)?;
                    let successors = graph.successors(unit_id);
                    let taken = successors.get(0).copied();
                    let fall_through = successors.get(1).copied();
                    for (target, jump) in [(taken, on_true), (fall_through, on_false)].iter() {
                        let entry = target.and_then(|unit| entry_of(graph, assoc, unit));
                        match entry {
                            Some(entry) => self.edge(jump, &entry)?,
                            None => self.edge(jump, &method_return)?,
                        }
                    }
                }
                UnitExit::Return(node) => {
                    self.edge(node, &method_return)?;
                }
            }
        }
        Ok(())
    }

    fn edge(&mut self, source: &Node, target: &Node) -> Result<()> {
        let mut source = source.clone();
        let mut target = target.clone();
        self.driver.add_edge(&mut source, &mut target, EdgeKind::Cfg)
    }
}

/// The first node control reaches when entering `unit`, resolving through units that emitted
/// nothing.  `None` when every path out of `unit` leaves the body.
fn entry_of(graph: &UnitGraph, assoc: &MethodAssociation, unit: UnitId) -> Option<Node> {
    let mut visited = FxHashSet::default();
    let mut current = unit;
    loop {
        if current >= graph.units().len() || !visited.insert(current) {
            return None;
        }
        if let Some(emitted) = assoc.unit(current) {
            return Some(emitted.entry().clone());
        }
        current = *graph.successors(current).first()?;
    }
}
