// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Extracts code property graphs from compiled JVM bytecode.
//!
//! The pipeline accepts class files (or Java sources, which it compiles first), lifts each
//! method body into a three-address unit graph through an external [lifter][`ir::ClassLifter`],
//! and lowers every method into CPG nodes and edges — AST, then control flow, then program
//! dependence, then call edges — emitted incrementally through any
//! [driver][code_property_graphs::drivers::Driver] from the core crate.
//!
//! Extraction is incremental: every `FILE` node carries a content hash, and a `project()` call
//! skips classes whose hash is unchanged, deletes and rebuilds the ones that differ, and
//! preserves inbound call edges across the rebuild.
//!
//! ```no_run
//! use code_property_graphs::memory::InMemoryDriver;
//! use code_property_graphs::RunToCompletion;
//! use jvm_code_property_graphs::{Extractor, ExtractorConfig};
//! # use jvm_code_property_graphs::ir::{ClassLifter, LiftedClass, LiftError};
//! # struct MyLifter;
//! # impl ClassLifter for MyLifter {
//! #     fn lift(&self, _: &[u8], _: &std::path::Path) -> Result<LiftedClass, LiftError> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut extractor = Extractor::new(InMemoryDriver::new(), ExtractorConfig::default());
//! extractor.load(std::path::Path::new("Conditional1.class"))?;
//! let stats = extractor.project(&MyLifter, &RunToCompletion)?;
//! println!("built {} methods", stats.methods_built);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use code_property_graphs::drivers::DriverError;
use code_property_graphs::Interrupted;
use thiserror::Error;

pub mod assoc;
pub mod ast;
pub mod calls;
pub mod cfg;
pub mod config;
pub mod extractor;
pub mod ir;
pub mod loader;
pub mod pdg;

pub use config::ExtractorConfig;
pub use extractor::Extractor;
pub use extractor::MethodFailure;
pub use extractor::ProjectionStats;

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The source compiler failed.  Raised before any deletion is committed.
    #[error("compilation failed: {0}")]
    Compile(String),

    /// A requested input does not exist.  The failed `load()` leaves all state unchanged.
    #[error("missing input: {}", .0.display())]
    MissingInput(PathBuf),

    /// A requested input is neither a Java source nor a class file.
    #[error("unsupported input: {}", .0.display())]
    UnsupportedInput(PathBuf),

    /// The bytecode lifter rejected a class.
    #[error("failed to lift {class}: {message}")]
    Lift { class: String, message: String },

    /// The driver failed; surfaced verbatim, retries are the caller's responsibility.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The caller's cancellation token fired between two classes or methods.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}
