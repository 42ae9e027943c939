// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Input classification, source compilation, and class-file reading.
//!
//! Compilation is an external collaborator behind the [`SourceCompiler`][] seam; the bundled
//! [`SystemJavac`][] shells out to whatever `javac` is on the path.  Class bytes are hashed with
//! SHA-1 on the way in — the hash lands on the `FILE` node and is the sole input to staleness
//! detection.
//!
//! [`SourceCompiler`]: trait.SourceCompiler.html
//! [`SystemJavac`]: struct.SystemJavac.html

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use sha1::Digest;
use sha1::Sha1;

use crate::ExtractionError;

/// A path accepted by `load`: a Java source to be compiled first, or a class file taken as-is.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadedInput {
    Source(PathBuf),
    Class(PathBuf),
}

/// Classifies one input path.  Missing paths and unsupported extensions are rejected without
/// changing any state.
pub fn classify(path: &Path) -> Result<LoadedInput, ExtractionError> {
    if !path.exists() {
        return Err(ExtractionError::MissingInput(path.to_path_buf()));
    }
    match path.extension().and_then(|extension| extension.to_str()) {
        Some("java") => Ok(LoadedInput::Source(path.to_path_buf())),
        Some("class") => Ok(LoadedInput::Class(path.to_path_buf())),
        _ => Err(ExtractionError::UnsupportedInput(path.to_path_buf())),
    }
}

/// The source-to-bytecode seam.  The pipeline hands over the pending sources and a scratch
/// directory and gets back the produced class files.
pub trait SourceCompiler {
    fn compile(
        &self,
        sources: &[PathBuf],
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Compiles by invoking the system `javac`.
pub struct SystemJavac;

impl SourceCompiler for SystemJavac {
    fn compile(
        &self,
        sources: &[PathBuf],
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        fs::create_dir_all(out_dir)
            .map_err(|error| ExtractionError::Compile(error.to_string()))?;
        let output = Command::new("javac")
            .arg("-d")
            .arg(out_dir)
            .args(sources)
            .output()
            .map_err(|error| ExtractionError::Compile(error.to_string()))?;
        if !output.status.success() {
            return Err(ExtractionError::Compile(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        let mut classes = Vec::new();
        collect_class_files(out_dir, &mut classes)
            .map_err(|error| ExtractionError::Compile(error.to_string()))?;
        classes.sort();
        Ok(classes)
    }
}

fn collect_class_files(dir: &Path, classes: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_class_files(&path, classes)?;
        } else if path.extension().and_then(|extension| extension.to_str()) == Some("class") {
            classes.push(path);
        }
    }
    Ok(())
}

/// Reads a class file and computes its content hash.
pub fn read_class(path: &Path) -> Result<(Vec<u8>, String), ExtractionError> {
    let bytes =
        fs::read(path).map_err(|_| ExtractionError::MissingInput(path.to_path_buf()))?;
    let hash = content_hash(&bytes);
    Ok((bytes, hash))
}

/// SHA-1 hex digest of raw content.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}
