// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2023, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! A disk-spilling driver backed by SQLite.
//!
//! Nodes are rows of `(id, kind, properties)` with the property bag bincode-encoded; edges are
//! rows of `(source, target, kind)` with a composite primary key, which makes edge insertion
//! naturally idempotent.  Dangling `CALL` rows (whose target node row was deleted by
//! `delete_method`) are kept, exactly as the in-memory driver keeps dangling half-edges; the
//! retrieval operations join both endpoints against the node table, so danglers never surface in
//! a view.
//!
//! Retrieval operations replay the store into a transient [`InMemoryDriver`][] and delegate,
//! which keeps the two back-ends behaviourally identical by construction.  The in-memory driver
//! is also the oracle the storage tests compare against.
//!
//! [`InMemoryDriver`]: ../memory/struct.InMemoryDriver.html

use std::collections::HashSet;
use std::path::Path;

use rusqlite::Connection;
use rusqlite::OptionalExtension;

use crate::drivers::Driver;
use crate::drivers::DriverError;
use crate::drivers::Result;
use crate::drivers::SubGraph;
use crate::nodes::Node;
use crate::nodes::NodeData;
use crate::nodes::NodeId;
use crate::nodes::PropertyBag;
use crate::schema::is_allowed;
use crate::schema::EdgeKind;
use crate::schema::NodeKind;
use crate::schema::SchemaError;

const VERSION: usize = 1;

const SCHEMA: &str = r#"
        CREATE TABLE metadata (
            version INTEGER NOT NULL
        ) STRICT;
        CREATE TABLE nodes (
            id         INTEGER PRIMARY KEY,
            kind       TEXT NOT NULL,
            properties BLOB NOT NULL
        ) STRICT;
        CREATE TABLE edges (
            source INTEGER NOT NULL,
            target INTEGER NOT NULL,
            kind   TEXT NOT NULL,
            PRIMARY KEY (source, target, kind)
        ) STRICT;
    "#;

const INDEXES: &str = r#"
        CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind);
        CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source);
        CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);
    "#;

const PRAGMAS: &str = r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = false;
        PRAGMA secure_delete = false;
    "#;

pub static BINCODE_CONFIG: bincode::config::Configuration = bincode::config::standard();

impl From<rusqlite::Error> for DriverError {
    fn from(value: rusqlite::Error) -> Self {
        DriverError::Backend(value.to_string())
    }
}

impl From<bincode::error::EncodeError> for DriverError {
    fn from(value: bincode::error::EncodeError) -> Self {
        DriverError::Backend(value.to_string())
    }
}

impl From<bincode::error::DecodeError> for DriverError {
    fn from(value: bincode::error::DecodeError) -> Self {
        DriverError::Backend(value.to_string())
    }
}

pub struct SqliteDriver {
    conn: Connection,
    next_id: i64,
}

impl SqliteDriver {
    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::init(&mut conn)?;
        init_indexes(&mut conn)?;
        let next_id = max_id(&conn)? + 1;
        Ok(Self { conn, next_id })
    }

    /// Open a file database.  If the file does not exist, it is automatically created.
    /// An error is returned if the database version is not supported.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let is_new = !path.as_ref().exists();
        let mut conn = Connection::open(path)?;
        conn.execute_batch(PRAGMAS)?;
        if is_new {
            Self::init(&mut conn)?;
        } else {
            check_version(&conn)?;
        }
        init_indexes(&mut conn)?;
        let next_id = max_id(&conn)? + 1;
        Ok(Self { conn, next_id })
    }

    fn init(conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA)?;
        tx.execute("INSERT INTO metadata (version) VALUES (?)", [VERSION])?;
        tx.commit()?;
        Ok(())
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn node_row(&self, id: NodeId) -> Result<Option<Node>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT kind, properties FROM nodes WHERE id = ?")?;
        let row = stmt
            .query_row([id.as_i64()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .optional()?;
        let (kind, blob) = match row {
            Some(row) => row,
            None => return Ok(None),
        };
        let kind: NodeKind = kind.parse().map_err(SchemaError::from)?;
        let (bag, _): (PropertyBag, usize) = bincode::serde::decode_from_slice(&blob, BINCODE_CONFIG)?;
        let node = Node::from_parts(kind, Some(id), &bag)?;
        Ok(Some(node))
    }

    fn write_node(&self, node: &Node) -> Result<()> {
        let id = node.id().expect("persisted nodes carry an id");
        let blob = bincode::serde::encode_to_vec(&node.properties(), BINCODE_CONFIG)?;
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR REPLACE INTO nodes (id, kind, properties) VALUES (?, ?, ?)")?;
        stmt.execute((id.as_i64(), node.kind().as_str(), blob))?;
        Ok(())
    }

    /// The id of an already-stored node this builder must collapse onto, if any.  `FILE` nodes
    /// are unique by name, `NAMESPACE_BLOCK` nodes by full name, and `META_DATA` is a singleton.
    /// The second component says whether the incoming properties replace the stored ones.
    fn deduplicate(&self, node: &Node) -> Result<Option<(NodeId, bool)>> {
        let (kind, wanted, overwrite) = match node.data() {
            NodeData::File { name, .. } => (NodeKind::File, Some(name.clone()), true),
            NodeData::NamespaceBlock { full_name, .. } => {
                (NodeKind::NamespaceBlock, Some(full_name.clone()), false)
            }
            NodeData::MetaData { .. } => (NodeKind::MetaData, None, true),
            _ => return Ok(None),
        };
        for (id, stored) in self.nodes_of_kind(kind)? {
            let matched = match (&wanted, stored.data()) {
                (None, _) => true,
                (Some(wanted), NodeData::File { name, .. }) => name == wanted,
                (Some(wanted), NodeData::NamespaceBlock { full_name, .. }) => full_name == wanted,
                _ => false,
            };
            if matched {
                return Ok(Some((id, overwrite)));
            }
        }
        Ok(None)
    }

    fn nodes_of_kind(&self, kind: NodeKind) -> Result<Vec<(NodeId, Node)>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, properties FROM nodes WHERE kind = ?")?;
        let rows = stmt.query_map([kind.as_str()], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        let mut nodes = Vec::new();
        for row in rows {
            let (id, blob) = row?;
            let (bag, _): (PropertyBag, usize) =
                bincode::serde::decode_from_slice(&blob, BINCODE_CONFIG)?;
            let id = NodeId::new(id);
            nodes.push((id, Node::from_parts(kind, Some(id), &bag)?));
        }
        Ok(nodes)
    }

    fn find_method(&self, full_name: &str, signature: &str) -> Result<Option<NodeId>> {
        for (id, node) in self.nodes_of_kind(NodeKind::Method)? {
            if let NodeData::Method {
                full_name: stored_full_name,
                signature: stored_signature,
                ..
            } = node.data()
            {
                if stored_full_name == full_name && stored_signature == signature {
                    return Ok(Some(id));
                }
            }
        }
        Ok(None)
    }

    /// Outward BFS over the edge table along the given edge kinds.
    fn closure(&self, start: NodeId, kinds: &[EdgeKind]) -> Result<Vec<NodeId>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT target, kind FROM edges WHERE source = ?")?;
        let mut selected = HashSet::new();
        let mut frontier = vec![start];
        selected.insert(start);
        while let Some(current) = frontier.pop() {
            let rows = stmt.query_map([current.as_i64()], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (target, kind) = row?;
                let kind: EdgeKind = kind.parse().map_err(SchemaError::from)?;
                if !kinds.contains(&kind) {
                    continue;
                }
                let target = NodeId::new(target);
                if self.node_row(target)?.is_none() {
                    continue;
                }
                if selected.insert(target) {
                    frontier.push(target);
                }
            }
        }
        Ok(selected.into_iter().collect())
    }

    /// Replays the persisted rows into a transient in-memory store, preserving ids.  Dangling
    /// edge rows are dropped by the endpoint join.
    fn snapshot(&self) -> Result<crate::memory::InMemoryDriver> {
        let mut replay = crate::memory::InMemoryDriver::new();
        let mut nodes = fxhash::FxHashMap::default();
        {
            let mut stmt = self
                .conn
                .prepare_cached("SELECT id, kind, properties FROM nodes")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?;
            for row in rows {
                let (id, kind, blob) = row?;
                let kind: NodeKind = kind.parse().map_err(SchemaError::from)?;
                let (bag, _): (PropertyBag, usize) =
                    bincode::serde::decode_from_slice(&blob, BINCODE_CONFIG)?;
                let mut node = Node::from_parts(kind, Some(NodeId::new(id)), &bag)?;
                replay.add_vertex(&mut node)?;
                nodes.insert(id, node);
            }
        }
        {
            let mut stmt = self.conn.prepare_cached(
                "SELECT e.source, e.target, e.kind FROM edges e
                 JOIN nodes s ON s.id = e.source
                 JOIN nodes t ON t.id = e.target",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            for row in rows {
                let (source, target, kind) = row?;
                let kind: EdgeKind = kind.parse().map_err(SchemaError::from)?;
                let mut source = nodes[&source].clone();
                let mut target = nodes[&target].clone();
                replay.add_edge(&mut source, &mut target, kind)?;
            }
        }
        Ok(replay)
    }

    fn ensure_persisted(&mut self, node: &mut Node) -> Result<NodeId> {
        match node.id() {
            Some(id) if self.node_row(id)?.is_some() => Ok(id),
            _ => self.add_vertex(node),
        }
    }
}

impl Driver for SqliteDriver {
    fn add_vertex(&mut self, node: &mut Node) -> Result<NodeId> {
        if let Some(id) = node.id() {
            if self.node_row(id)?.is_some() {
                self.write_node(node)?;
                return Ok(id);
            }
            self.next_id = self.next_id.max(id.as_i64() + 1);
            self.write_node(node)?;
            return Ok(id);
        }
        if let Some((existing, overwrite)) = self.deduplicate(node)? {
            node.set_id(existing);
            if overwrite {
                self.write_node(node)?;
            }
            return Ok(existing);
        }
        let id = self.allocate_id();
        node.set_id(id);
        self.write_node(node)?;
        Ok(id)
    }

    fn vertex_exists(&self, node: &Node) -> Result<bool> {
        Ok(match node.id() {
            Some(id) => self.node_row(id)?.is_some(),
            None => false,
        })
    }

    fn edge_exists(&self, source: &Node, target: &Node, kind: EdgeKind) -> Result<bool> {
        let (source, target) = match (source.id(), target.id()) {
            (Some(source), Some(target)) => (source, target),
            _ => return Ok(false),
        };
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM edges WHERE source = ? AND target = ? AND kind = ?")?;
        let found = stmt
            .query_row(
                (source.as_i64(), target.as_i64(), kind.as_str()),
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
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
            let mut stmt = self.conn.prepare_cached(
                "DELETE FROM edges WHERE source = ? AND kind = 'CALL'
                 AND target NOT IN (SELECT id FROM nodes)",
            )?;
            stmt.execute([source_id.as_i64()])?;
        }
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO edges (source, target, kind) VALUES (?, ?, ?)")?;
        stmt.execute((source_id.as_i64(), target_id.as_i64(), kind.as_str()))?;
        Ok(())
    }

    fn delete_vertex(&mut self, node: &Node) -> Result<()> {
        let id = match node.id() {
            Some(id) => id.as_i64(),
            None => return Ok(()),
        };
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM edges WHERE source = ? OR target = ?")?;
            stmt.execute([id, id])?;
            let mut stmt = tx.prepare_cached("DELETE FROM nodes WHERE id = ?")?;
            stmt.execute([id])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_method(&mut self, full_name: &str, signature: &str) -> Result<()> {
        let method = match self.find_method(full_name, signature)? {
            Some(method) => method,
            None => return Ok(()),
        };
        log::debug!("deleting method {} {}", full_name, signature);
        let closure = self.closure(
            method,
            &[
                EdgeKind::Ast,
                EdgeKind::Cfg,
                EdgeKind::Argument,
                EdgeKind::Receiver,
                EdgeKind::Condition,
            ],
        )?;
        let tx = self.conn.transaction()?;
        {
            let mut delete_out = tx.prepare_cached("DELETE FROM edges WHERE source = ?")?;
            // Inbound CALL edges into the method node itself survive as dangling rows.
            let mut delete_in = tx.prepare_cached(
                "DELETE FROM edges WHERE target = ?1 AND NOT (kind = 'CALL' AND ?1 = ?2)",
            )?;
            let mut delete_node = tx.prepare_cached("DELETE FROM nodes WHERE id = ?")?;
            for id in &closure {
                let id = id.as_i64();
                delete_out.execute([id])?;
                delete_in.execute([id, method.as_i64()])?;
                delete_node.execute([id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_method(
        &self,
        full_name: &str,
        signature: &str,
        include_body: bool,
    ) -> Result<SubGraph> {
        self.snapshot()?.get_method(full_name, signature, include_body)
    }

    fn get_program_structure(&self) -> Result<SubGraph> {
        self.snapshot()?.get_program_structure()
    }

    fn get_neighbours(&self, node: &Node) -> Result<SubGraph> {
        self.snapshot()?.get_neighbours(node)
    }

    fn get_whole_graph(&self) -> Result<SubGraph> {
        self.snapshot()?.get_whole_graph()
    }

    fn get_vertex_ids(&self, lo: i64, hi: i64) -> Result<HashSet<NodeId>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id FROM nodes WHERE id >= ? AND id <= ?")?;
        let rows = stmt.query_map([lo, hi], |row| row.get::<_, i64>(0))?;
        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(NodeId::new(row?));
        }
        Ok(ids)
    }

    fn clear(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM edges")?;
            stmt.execute([])?;
            let mut stmt = tx.prepare_cached("DELETE FROM nodes")?;
            stmt.execute([])?;
        }
        tx.commit()?;
        self.next_id = 1;
        Ok(())
    }
}

/// Check if the database has the version supported by this library version.
fn check_version(conn: &Connection) -> Result<()> {
    let version = conn.query_row("SELECT version FROM metadata", [], |r| r.get::<_, usize>(0))?;
    if version != VERSION {
        return Err(DriverError::Backend(format!(
            "unsupported database version {}",
            version
        )));
    }
    Ok(())
}

fn max_id(conn: &Connection) -> Result<i64> {
    let max = conn.query_row("SELECT COALESCE(MAX(id), 0) FROM nodes", [], |r| {
        r.get::<_, i64>(0)
    })?;
    Ok(max)
}

fn init_indexes(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(INDEXES)?;
    tx.commit()?;
    Ok(())
}
