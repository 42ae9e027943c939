// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Adds the intraprocedural program-dependence edges.
//!
//! Every `IDENTIFIER` gets a `REF` edge to the `LOCAL` or `METHOD_PARAMETER_IN` it names, every
//! `FIELD_IDENTIFIER` a `REF` edge to the `MEMBER` when the member is known, and every recorded
//! call site its `ARGUMENT` edges (positions matching `argument_index`) plus a `RECEIVER` edge
//! for instance dispatch.  All of the wiring information was recorded by the AST builder; this
//! pass only turns it into edges.

use code_property_graphs::drivers::Driver;
use code_property_graphs::drivers::Result;
use code_property_graphs::nodes::Node;
use code_property_graphs::schema::EdgeKind;
use fxhash::FxHashMap;

use crate::assoc::MethodAssociation;

pub struct PdgBuilder<'a, D: Driver> {
    driver: &'a mut D,
}

impl<'a, D: Driver> PdgBuilder<'a, D> {
    pub fn new(driver: &'a mut D) -> PdgBuilder<'a, D> {
        PdgBuilder { driver }
    }

    /// `members` maps the declaring class's field names to their persisted `MEMBER` nodes.
    pub fn build(
        &mut self,
        assoc: &MethodAssociation,
        members: &FxHashMap<String, Node>,
    ) -> Result<()> {
        for (identifier, var_name) in assoc.ident_uses() {
            if let Some(declaration) = assoc.var(var_name).first() {
                self.edge(identifier, declaration, EdgeKind::Ref)?;
            }
        }
        for (field_identifier, member_name) in assoc.field_uses() {
            if let Some(member) = members.get(member_name) {
                self.edge(field_identifier, member, EdgeKind::Ref)?;
            }
        }
        for (_, site) in assoc.call_sites() {
            for (_, argument) in &site.arguments {
                self.edge(&site.call, argument, EdgeKind::Argument)?;
            }
            if let Some(receiver) = &site.receiver {
                self.edge(&site.call, receiver, EdgeKind::Receiver)?;
            }
        }
        Ok(())
    }

    fn edge(&mut self, source: &Node, target: &Node, kind: EdgeKind) -> Result<()> {
        let mut source = source.clone();
        let mut target = target.clone();
        self.driver.add_edge(&mut source, &mut target, kind)
    }
}
