// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2023, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Serializable records for a persisted store.
//!
//! The layout is deliberately dumb: one record per node carrying `(id, label, properties)` and
//! one record per edge carrying `(source, target, label)`.  The order of records within either
//! list is not significant, and a reader tolerates any interleaving — nodes are always replayed
//! before edges, and edges resolve their endpoints against the replayed batch, so a writer may
//! emit records in whatever order its store yields them.
//!
//! Replaying assigns fresh ids (the receiving driver owns id allocation), so a round trip
//! produces a graph isomorphic to the original modulo ids.

use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::drivers::Driver;
use crate::drivers::DriverError;
use crate::nodes::Node;
use crate::nodes::PropertyBag;
use crate::schema::SchemaError;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Graph {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: i64,
    pub label: String,
    pub properties: PropertyBag,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EdgeRecord {
    pub source: i64,
    pub target: i64,
    pub label: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to locate node `{0}` in records")]
    NodeNotFound(i64),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl Graph {
    /// Snapshots the whole store of `driver` into records.
    pub fn from_driver<D: Driver + ?Sized>(driver: &D) -> Result<Graph, Error> {
        let view = driver.get_whole_graph()?;
        let nodes = view
            .iter_nodes()
            .map(|node| NodeRecord {
                id: node.id().expect("persisted nodes carry an id").as_i64(),
                label: node.kind().as_str().to_string(),
                properties: node.properties(),
            })
            .sorted_by_key(|record| record.id)
            .collect::<Vec<_>>();
        let edges = view
            .edges()
            .iter()
            .map(|edge| EdgeRecord {
                source: edge.source.as_i64(),
                target: edge.target.as_i64(),
                label: edge.kind.as_str().to_string(),
            })
            .sorted_by(|a, b| (a.source, a.target, &a.label).cmp(&(b.source, b.target, &b.label)))
            .collect::<Vec<_>>();
        Ok(Graph { nodes, edges })
    }

    /// Replays these records into `driver`.  Record ids are only used to resolve edge endpoints
    /// within this batch; the driver assigns its own.
    pub fn load_into<D: Driver + ?Sized>(&self, driver: &mut D) -> Result<(), Error> {
        let mut replayed = fxhash::FxHashMap::default();
        for record in &self.nodes {
            let kind = record.label.parse()?;
            let mut node = Node::from_parts(kind, None, &record.properties)?;
            driver.add_vertex(&mut node)?;
            replayed.insert(record.id, node);
        }
        for record in &self.edges {
            let kind = record.label.parse()?;
            let mut source = replayed
                .get(&record.source)
                .cloned()
                .ok_or(Error::NodeNotFound(record.source))?;
            let mut target = replayed
                .get(&record.target)
                .cloned()
                .ok_or(Error::NodeNotFound(record.target))?;
            driver.add_edge(&mut source, &mut target, kind)?;
        }
        Ok(())
    }
}
