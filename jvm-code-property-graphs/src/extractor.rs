// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The extraction pipeline.
//!
//! One `project()` call drives the full cycle: pending sources are compiled, class files are
//! read, hashed and lifted, the store is diffed against the hashes to find stale files, stale
//! sub-graphs are deleted (saving their inbound `CALL` edges), the changed classes are rebuilt
//! method by method (AST, then CFG, then PDG), and finally call edges are linked — fresh ones
//! from the oracle, saved ones replayed.
//!
//! The pipeline is single-writer: it owns the driver for its lifetime, and the association map
//! and the pending-call side table live exactly as long as one `project()` call.  A method that
//! trips a schema violation is rolled back from its staging ledger and skipped; the pipeline
//! carries on with the next one and reports the failure in the returned stats.  Compilation
//! errors abort the call before any deletion has been committed.  Cancellation is honoured
//! between classes and between methods, never inside one.

use std::path::Path;
use std::path::PathBuf;

use code_property_graphs::drivers::Driver;
use code_property_graphs::drivers::DriverError;
use code_property_graphs::nodes::Node;
use code_property_graphs::nodes::NodeData;
use code_property_graphs::nodes::NodeId;
use code_property_graphs::schema::EdgeKind;
use code_property_graphs::schema::NodeKind;
use code_property_graphs::schema::DEFAULT_LANGUAGE;
use code_property_graphs::schema::DEFAULT_LANGUAGE_VERSION;
use code_property_graphs::CancellationToken;
use fxhash::FxHashMap;
use itertools::Itertools;
use rayon::prelude::*;

use crate::assoc::AssociationMap;
use crate::assoc::MethodAssociation;
use crate::ast::AstBuilder;
use crate::calls::CallGraphBuilder;
use crate::cfg::CfgBuilder;
use crate::config::ExtractorConfig;
use crate::ir::CallGraphAlg;
use crate::ir::ClassLifter;
use crate::ir::LiftedClass;
use crate::ir::MethodSignature;
use crate::ir::UnitGraph;
use crate::loader;
use crate::loader::LoadedInput;
use crate::loader::SourceCompiler;
use crate::loader::SystemJavac;
use crate::pdg::PdgBuilder;
use crate::ExtractionError;

/// Name of the root namespace block every file hangs its package chain off.
pub const GLOBAL_NAMESPACE: &str = "<global>";

/// A method whose build was rolled back after a schema violation.
#[derive(Clone, Debug)]
pub struct MethodFailure {
    pub method: MethodSignature,
    pub reason: String,
}

/// What one `project()` call did.
#[derive(Clone, Debug, Default)]
pub struct ProjectionStats {
    pub classes_built: usize,
    pub classes_skipped: usize,
    pub methods_built: usize,
    pub calls_linked: usize,
    pub phantoms_created: usize,
    pub failures: Vec<MethodFailure>,
}

pub struct Extractor<D: Driver> {
    driver: D,
    config: ExtractorConfig,
    compiler: Box<dyn SourceCompiler>,
    pending_sources: Vec<PathBuf>,
    pending_classes: Vec<PathBuf>,
}

impl<D: Driver> Extractor<D> {
    pub fn new(driver: D, config: ExtractorConfig) -> Extractor<D> {
        Extractor {
            driver,
            config,
            compiler: Box::new(SystemJavac),
            pending_sources: Vec::new(),
            pending_classes: Vec::new(),
        }
    }

    /// Replaces the source compiler.  The default shells out to the system `javac`.
    pub fn with_compiler(mut self, compiler: Box<dyn SourceCompiler>) -> Extractor<D> {
        self.compiler = compiler;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Queues one input for the next `project()` call.  A missing path or an unsupported
    /// extension is rejected and no state changes.
    pub fn load(&mut self, path: &Path) -> Result<(), ExtractionError> {
        match loader::classify(path)? {
            LoadedInput::Source(path) => self.pending_sources.push(path),
            LoadedInput::Class(path) => self.pending_classes.push(path),
        }
        Ok(())
    }

    /// Projects everything queued since the last call into the store.
    pub fn project(
        &mut self,
        lifter: &dyn ClassLifter,
        token: &dyn CancellationToken,
    ) -> Result<ProjectionStats, ExtractionError> {
        let mut stats = ProjectionStats::default();

        let sources = std::mem::take(&mut self.pending_sources);
        let mut class_paths = std::mem::take(&mut self.pending_classes);
        if !sources.is_empty() {
            log::info!("compiling {} source file(s)", sources.len());
            class_paths.extend(self.compiler.compile(&sources, &self.config.compile_dir)?);
        }
        if class_paths.is_empty() {
            return Ok(stats);
        }

        let mut loaded = Vec::new();
        for path in &class_paths {
            token.guard("loading classes")?;
            let (bytes, hash) = loader::read_class(path)?;
            loaded.push((path.clone(), bytes, hash));
        }
        let lifted = self.lift_classes(lifter, &loaded)?;

        // Diff scan: a class whose file hash is unchanged is skipped wholesale.
        let structure = self.driver.get_program_structure()?;
        let mut existing = FxHashMap::default();
        for node in structure.nodes_of_kind(NodeKind::File) {
            if let NodeData::File { name, hash } = node.data() {
                existing.insert(name.clone(), (node.clone(), hash.clone()));
            }
        }
        let mut stale_files = Vec::new();
        let mut to_build = Vec::new();
        for (class, hash) in lifted {
            match existing.get(&class.file_name) {
                Some((_, Some(stored))) if *stored == hash => {
                    log::debug!("{} is unchanged; skipping", class.file_name);
                    stats.classes_skipped += 1;
                }
                Some((file, _)) => {
                    stale_files.push(file.clone());
                    to_build.push((class, hash));
                }
                None => to_build.push((class, hash)),
            }
        }

        if !stale_files.is_empty() {
            log::debug!(
                "stale files: {}",
                stale_files.iter().filter_map(|file| file.name()).join(", ")
            );
        }
        let mut pending_calls = Vec::new();
        for file in &stale_files {
            token.guard("deleting stale files")?;
            self.delete_stale_file(file, &mut pending_calls)?;
        }

        if !to_build.is_empty() {
            self.ensure_meta_data()?;
        }
        let mut assoc = AssociationMap::new();
        let mut order_counters = FxHashMap::default();
        for (class, hash) in &to_build {
            token.guard("building classes")?;
            self.build_class(
                class,
                hash,
                &mut assoc,
                &mut order_counters,
                &mut stats,
                token,
            )?;
        }

        if self.config.call_graph_alg != CallGraphAlg::None {
            match lifter.call_graph(self.config.call_graph_alg, &self.config.spark_options) {
                Some(oracle) => {
                    let linked =
                        CallGraphBuilder::new(&mut self.driver).link(&assoc, oracle.as_ref())?;
                    stats.calls_linked += linked.calls_linked;
                    stats.phantoms_created += linked.phantoms_created;
                }
                None => log::warn!(
                    "call graph algorithm {:?} requested, but the lifter provides no oracle",
                    self.config.call_graph_alg
                ),
            }
        }
        self.replay_pending_calls(pending_calls, &mut stats)?;

        log::info!(
            "projection done: {} built, {} skipped, {} methods, {} calls",
            stats.classes_built,
            stats.classes_skipped,
            stats.methods_built,
            stats.calls_linked
        );
        Ok(stats)
    }

    /// Lifts every loaded class, in parallel when the input count crosses the configured
    /// threshold.  Results are merged serially either way.
    fn lift_classes(
        &self,
        lifter: &dyn ClassLifter,
        loaded: &[(PathBuf, Vec<u8>, String)],
    ) -> Result<Vec<(LiftedClass, String)>, ExtractionError> {
        let lift_one = |(path, bytes, hash): &(PathBuf, Vec<u8>, String)| {
            lifter
                .lift(bytes, path)
                .map(|class| (class, hash.clone()))
                .map_err(|error| ExtractionError::Lift {
                    class: error.origin,
                    message: error.message,
                })
        };
        if loaded.len() > self.config.parallel_threshold {
            log::info!("lifting {} classes in parallel", loaded.len());
            loaded.par_iter().map(lift_one).collect()
        } else {
            loaded.iter().map(lift_one).collect()
        }
    }

    fn ensure_meta_data(&mut self) -> Result<(), DriverError> {
        let mut meta = Node::new(NodeData::MetaData {
            language: DEFAULT_LANGUAGE.to_string(),
            version: DEFAULT_LANGUAGE_VERSION.to_string(),
        });
        self.driver.add_vertex(&mut meta)?;
        Ok(())
    }

    /// Deletes the sub-graph extracted from one stale file: every method of its type
    /// declarations (saving inbound `CALL` edges for replay), the declarations themselves with
    /// their members and bindings, and finally the `FILE` node.  Namespace blocks are shared
    /// between files and stay.
    fn delete_stale_file(
        &mut self,
        file: &Node,
        pending: &mut Vec<(Node, MethodSignature)>,
    ) -> Result<(), ExtractionError> {
        let file_name = match file.data() {
            NodeData::File { name, .. } => name.clone(),
            _ => return Ok(()),
        };
        log::info!("file {} is stale; deleting its sub-graph", file_name);
        let structure = self.driver.get_program_structure()?;
        let mut type_decls = Vec::new();
        for namespace in structure.nodes_of_kind(NodeKind::NamespaceBlock) {
            let view = self.driver.get_neighbours(namespace)?;
            for type_decl in view.nodes_of_kind(NodeKind::TypeDecl) {
                if matches!(
                    type_decl.data(),
                    NodeData::TypeDecl { file_name: stored, .. } if *stored == file_name
                ) {
                    type_decls.push(type_decl.clone());
                }
            }
        }
        for type_decl in &type_decls {
            let view = self.driver.get_neighbours(type_decl)?;
            for method in view.nodes_of_kind(NodeKind::Method) {
                let (full_name, signature) = match method.data() {
                    NodeData::Method {
                        full_name,
                        signature,
                        ..
                    } => (full_name.clone(), signature.clone()),
                    _ => continue,
                };
                let method_id = method.id().expect("persisted nodes carry an id");
                let neighbours = self.driver.get_neighbours(method)?;
                for edge in neighbours.edges_of_kind(EdgeKind::Call) {
                    if edge.target != method_id {
                        continue;
                    }
                    if let Some(caller) = neighbours.node(edge.source) {
                        pending.push((
                            caller.clone(),
                            MethodSignature::new(full_name.clone(), signature.clone()),
                        ));
                    }
                }
                self.driver.delete_method(&full_name, &signature)?;
            }
            for binding in view.nodes_of_kind(NodeKind::Binding) {
                self.driver.delete_vertex(binding)?;
            }
            for member in view.nodes_of_kind(NodeKind::Member) {
                self.driver.delete_vertex(member)?;
            }
            self.driver.delete_vertex(type_decl)?;
        }
        self.driver.delete_vertex(file)?;
        Ok(())
    }

    fn build_class(
        &mut self,
        class: &LiftedClass,
        hash: &str,
        assoc: &mut AssociationMap,
        order_counters: &mut FxHashMap<NodeId, i64>,
        stats: &mut ProjectionStats,
        token: &dyn CancellationToken,
    ) -> Result<(), ExtractionError> {
        log::debug!("building class {}", class.type_full_name);
        let (file, type_decl) = self.build_structure(class, hash, order_counters)?;

        let mut members = FxHashMap::default();
        for (index, member) in class.members.iter().enumerate() {
            let mut node = Node::new(NodeData::Member {
                name: member.name.clone(),
                type_full_name: member.type_full_name.clone(),
            })
            .with_code(format!("{} {}", member.type_full_name, member.name))
            .with_order(index as i64 + 1);
            self.driver.add_vertex(&mut node)?;
            self.edge(&type_decl, &node, EdgeKind::Ast)?;
            members.insert(member.name.clone(), node);
        }

        let mut method_order = class.members.len() as i64;
        for graph in &class.methods {
            token.guard("building methods")?;
            method_order += 1;
            let signature = graph.method().method_signature();
            let mut staged = Vec::new();
            match self.build_method(graph, &type_decl, &file, method_order, &mut staged, &members)
            {
                Ok(method_assoc) => {
                    assoc.insert(signature, method_assoc);
                    stats.methods_built += 1;
                }
                Err(DriverError::Schema(error)) => {
                    log::warn!(
                        "schema violation while building {} ({}): {}; rolling the method back",
                        signature,
                        class.file_name,
                        error
                    );
                    for node in staged.iter().rev() {
                        self.driver.delete_vertex(node)?;
                    }
                    stats.failures.push(MethodFailure {
                        method: signature,
                        reason: error.to_string(),
                    });
                }
                Err(error) => return Err(error.into()),
            }
        }
        stats.classes_built += 1;
        Ok(())
    }

    /// Creates the `FILE` node and the namespace chain down to the class's type declaration.
    fn build_structure(
        &mut self,
        class: &LiftedClass,
        hash: &str,
        order_counters: &mut FxHashMap<NodeId, i64>,
    ) -> Result<(Node, Node), DriverError> {
        let mut file = Node::new(NodeData::File {
            name: class.file_name.clone(),
            hash: Some(hash.to_string()),
        })
        .with_code(class.file_name.clone());
        self.driver.add_vertex(&mut file)?;

        let mut parent = self.ensure_namespace(
            order_counters,
            &file,
            GLOBAL_NAMESPACE,
            GLOBAL_NAMESPACE,
            &class.file_name,
        )?;
        let mut prefix = String::new();
        for segment in &class.package {
            prefix = if prefix.is_empty() {
                segment.clone()
            } else {
                format!("{}.{}", prefix, segment)
            };
            parent =
                self.ensure_namespace(order_counters, &parent, segment, &prefix, &class.file_name)?;
        }

        let namespace_full_name = match parent.data() {
            NodeData::NamespaceBlock { full_name, .. } => full_name.clone(),
            _ => GLOBAL_NAMESPACE.to_string(),
        };
        let order = self.next_child_order(order_counters, &parent)?;
        let mut type_decl = Node::new(NodeData::TypeDecl {
            name: class.name.clone(),
            full_name: class.type_full_name.clone(),
            ast_parent_full_name: namespace_full_name,
            ast_parent_type: "NAMESPACE_BLOCK".to_string(),
            file_name: class.file_name.clone(),
        })
        .with_code(format!("class {}", class.name))
        .with_order(order);
        self.driver.add_vertex(&mut type_decl)?;
        self.edge(&parent, &type_decl, EdgeKind::Ast)?;
        Ok((file, type_decl))
    }

    /// Finds or creates the namespace block for `full_name` and makes sure `parent` has an `AST`
    /// edge into it.  Namespace blocks are shared: a second file in the same package reuses the
    /// chain and only contributes its own edge from its `FILE` node.
    fn ensure_namespace(
        &mut self,
        order_counters: &mut FxHashMap<NodeId, i64>,
        parent: &Node,
        name: &str,
        full_name: &str,
        file_name: &str,
    ) -> Result<Node, DriverError> {
        let structure = self.driver.get_program_structure()?;
        let found = structure
            .nodes_of_kind(NodeKind::NamespaceBlock)
            .find(|node| {
                matches!(
                    node.data(),
                    NodeData::NamespaceBlock { full_name: stored, .. } if stored == full_name
                )
            })
            .cloned();
        if let Some(existing) = found {
            self.edge(parent, &existing, EdgeKind::Ast)?;
            return Ok(existing);
        }
        let order = self.next_child_order(order_counters, parent)?;
        let mut node = Node::new(NodeData::NamespaceBlock {
            name: name.to_string(),
            full_name: full_name.to_string(),
            file_name: file_name.to_string(),
        })
        .with_code(name)
        .with_order(order);
        self.driver.add_vertex(&mut node)?;
        self.edge(parent, &node, EdgeKind::Ast)?;
        Ok(node)
    }

    /// The next sibling order under a structural parent.  Seeded once per run from the store's
    /// current maximum child order, then advanced monotonically — never recounted from edges, so
    /// concurrent-looking rebuilds within one run cannot hand out the same order twice.
    fn next_child_order(
        &mut self,
        order_counters: &mut FxHashMap<NodeId, i64>,
        parent: &Node,
    ) -> Result<i64, DriverError> {
        let id = parent.id().expect("structural parents are persisted");
        if let Some(counter) = order_counters.get_mut(&id) {
            *counter += 1;
            return Ok(*counter);
        }
        let view = self.driver.get_neighbours(parent)?;
        let max = view
            .edges_of_kind(EdgeKind::Ast)
            .filter(|edge| edge.source == id)
            .filter_map(|edge| view.node(edge.target))
            .map(|node| node.order.max(0))
            .max()
            .unwrap_or(0);
        order_counters.insert(id, max + 1);
        Ok(max + 1)
    }

    /// Runs the three sub-builders for one method, then records its binding on the declaring
    /// type.  Emission order within the method is fixed: head, AST body, CFG, PDG.
    fn build_method(
        &mut self,
        graph: &UnitGraph,
        type_decl: &Node,
        file: &Node,
        sibling_order: i64,
        staged: &mut Vec<Node>,
        members: &FxHashMap<String, Node>,
    ) -> Result<MethodAssociation, DriverError> {
        let assoc = AstBuilder::new(&mut self.driver, staged).build(
            graph,
            type_decl,
            file,
            sibling_order,
        )?;
        CfgBuilder::new(&mut self.driver).build(graph, &assoc)?;
        PdgBuilder::new(&mut self.driver).build(&assoc, members)?;

        let method = assoc
            .method
            .clone()
            .expect("AST builder populates the method head");
        let decl = graph.method();
        let mut binding = Node::new(NodeData::Binding {
            name: decl.name.clone(),
            signature: decl.signature.clone(),
        });
        self.driver.add_vertex(&mut binding)?;
        staged.push(binding.clone());
        self.edge(type_decl, &binding, EdgeKind::Binds)?;
        self.edge(&binding, &method, EdgeKind::Ref)?;
        Ok(assoc)
    }

    /// Replays the inbound `CALL` edges saved before stale methods were deleted.  A caller that
    /// was itself rebuilt no longer exists under its old id and is skipped — the call-graph
    /// oracle re-linked it.  A target that did not come back stays a dangling reference.
    fn replay_pending_calls(
        &mut self,
        pending: Vec<(Node, MethodSignature)>,
        stats: &mut ProjectionStats,
    ) -> Result<(), ExtractionError> {
        for (call, signature) in pending {
            if !self.driver.vertex_exists(&call)? {
                continue;
            }
            let head =
                self.driver
                    .get_method(&signature.full_name, &signature.signature, false)?;
            let method = head.nodes_of_kind(NodeKind::Method).next().cloned();
            if let Some(method) = method {
                let mut call = call;
                let mut method = method;
                self.driver.add_edge(&mut call, &mut method, EdgeKind::Call)?;
                stats.calls_linked += 1;
            }
        }
        Ok(())
    }

    fn edge(&mut self, source: &Node, target: &Node, kind: EdgeKind) -> Result<(), DriverError> {
        let mut source = source.clone();
        let mut target = target.clone();
        self.driver.add_edge(&mut source, &mut target, kind)
    }
}
