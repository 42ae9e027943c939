// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use std::path::PathBuf;

use crate::ir::CallGraphAlg;

/// Tunables for one extractor instance.
#[derive(Clone, Debug)]
pub struct ExtractorConfig {
    /// Which call-graph oracle to ask the lifter for.  `None` disables call linking.
    pub call_graph_alg: CallGraphAlg,
    /// Opaque options forwarded to the points-to oracle when `call_graph_alg` selects it.
    pub spark_options: Vec<(String, String)>,
    /// Input count above which per-class lifting is farmed out across threads.
    pub parallel_threshold: usize,
    /// Scratch directory for compiled class files.
    pub compile_dir: PathBuf,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            call_graph_alg: CallGraphAlg::default(),
            spark_options: Vec::new(),
            parallel_threshold: 100_000,
            compile_dir: PathBuf::from("cpg-build"),
        }
    }
}

impl ExtractorConfig {
    pub fn new() -> ExtractorConfig {
        ExtractorConfig::default()
    }

    pub fn with_call_graph_alg(mut self, algorithm: CallGraphAlg) -> ExtractorConfig {
        self.call_graph_alg = algorithm;
        self
    }

    pub fn with_spark_option<K: Into<String>, V: Into<String>>(
        mut self,
        key: K,
        value: V,
    ) -> ExtractorConfig {
        self.spark_options.push((key.into(), value.into()));
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> ExtractorConfig {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_compile_dir<P: Into<PathBuf>>(mut self, dir: P) -> ExtractorConfig {
        self.compile_dir = dir.into();
        self
    }
}
