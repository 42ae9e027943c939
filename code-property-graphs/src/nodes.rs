// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Node builders for every kind in the schema.
//!
//! A [`Node`][] is a tagged variant (one variant per node kind, see [`NodeData`][]) behind a
//! shared header: the store-assigned id, the sibling `order`, the `argument_index`, the source
//! location, and the `code` rendering.  Builders are plain values — you construct one, hand it to
//! a driver, and the driver writes the finalised id back through the `&mut`:
//!
//! ```
//! use code_property_graphs::drivers::Driver;
//! use code_property_graphs::memory::InMemoryDriver;
//! use code_property_graphs::nodes::{Node, NodeData};
//!
//! let mut driver = InMemoryDriver::new();
//! let mut file = Node::new(NodeData::File {
//!     name: "Foo.class".to_string(),
//!     hash: Some("cafebabe".to_string()),
//! });
//! assert!(file.id().is_none());
//! let id = driver.add_vertex(&mut file).unwrap();
//! assert_eq!(file.id(), Some(id));
//! ```
//!
//! Every property that a variant does not require has a well-known default (see the sentinels in
//! [`schema`][]), so a node can always be persisted and re-read without loss.
//!
//! [`Node`]: struct.Node.html
//! [`NodeData`]: enum.NodeData.html
//! [`schema`]: ../schema/index.html

use std::fmt::Display;

use crate::schema::DispatchType;
use crate::schema::EvaluationStrategy;
use crate::schema::ModifierType;
use crate::schema::NodeKind;
use crate::schema::SchemaError;
use crate::schema::DEFAULT_SIGNATURE;
use crate::schema::UNSET_INT;
use crate::schema::UNSET_STRING;

/// Uniquely identifies a node within one store.  Assigned by the driver on first insert;
/// stable for the life of the node.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct NodeId(i64);

impl NodeId {
    #[inline(always)]
    pub fn new(value: i64) -> NodeId {
        NodeId(value)
    }

    #[inline(always)]
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The value of a single node property.  The schema only needs strings and 64-bit integers.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PropertyValue {
    String(String),
    Int(i64),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(value) => Some(value),
            PropertyValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::String(_) => None,
            PropertyValue::Int(value) => Some(*value),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> PropertyValue {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> PropertyValue {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> PropertyValue {
        PropertyValue::Int(value)
    }
}

/// An ordered bag of named properties, as persisted by back-ends.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PropertyBag {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyBag {
    pub fn new() -> PropertyBag {
        PropertyBag::default()
    }

    pub fn push<V: Into<PropertyValue>>(&mut self, name: &str, value: V) {
        self.entries.push((name.to_string(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    fn string_or(&self, name: &str, default: &str) -> String {
        match self.get(name).and_then(PropertyValue::as_str) {
            Some(value) => value.to_string(),
            None => default.to_string(),
        }
    }

    fn int_or(&self, name: &str, default: i64) -> i64 {
        self.get(name).and_then(PropertyValue::as_int).unwrap_or(default)
    }

    fn required_string(&self, kind: NodeKind, name: &'static str) -> Result<String, SchemaError> {
        self.get(name)
            .and_then(PropertyValue::as_str)
            .map(str::to_string)
            .ok_or(SchemaError::MissingProperty {
                kind,
                property: name,
            })
    }
}

// Property names as they appear in persisted stores.
pub(crate) mod property {
    pub const NAME: &str = "NAME";
    pub const FULL_NAME: &str = "FULL_NAME";
    pub const SIGNATURE: &str = "SIGNATURE";
    pub const CODE: &str = "CODE";
    pub const ORDER: &str = "ORDER";
    pub const ARGUMENT_INDEX: &str = "ARGUMENT_INDEX";
    pub const LINE_NUMBER: &str = "LINE_NUMBER";
    pub const COLUMN_NUMBER: &str = "COLUMN_NUMBER";
    pub const TYPE_FULL_NAME: &str = "TYPE_FULL_NAME";
    pub const AST_PARENT_FULL_NAME: &str = "AST_PARENT_FULL_NAME";
    pub const AST_PARENT_TYPE: &str = "AST_PARENT_TYPE";
    pub const FILENAME: &str = "FILENAME";
    pub const HASH: &str = "HASH";
    pub const METHOD_FULL_NAME: &str = "METHOD_FULL_NAME";
    pub const DISPATCH_TYPE: &str = "DISPATCH_TYPE";
    pub const EVALUATION_STRATEGY: &str = "EVALUATION_STRATEGY";
    pub const MODIFIER_TYPE: &str = "MODIFIER_TYPE";
    pub const CANONICAL_NAME: &str = "CANONICAL_NAME";
    pub const LANGUAGE: &str = "LANGUAGE";
    pub const VERSION: &str = "VERSION";
}

/// The kind-specific half of a node.  One variant per kind in the schema; each variant carries
/// exactly the properties the schema declares for that kind (shared header fields live on
/// [`Node`][]).
///
/// [`Node`]: struct.Node.html
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NodeData {
    MetaData {
        language: String,
        version: String,
    },
    File {
        name: String,
        /// Content hash of the class file this node was extracted from.  Present iff the file was
        /// loaded from a byte-addressable source; the source of truth for staleness detection.
        hash: Option<String>,
    },
    NamespaceBlock {
        name: String,
        full_name: String,
        file_name: String,
    },
    TypeDecl {
        name: String,
        full_name: String,
        ast_parent_full_name: String,
        ast_parent_type: String,
        file_name: String,
    },
    Member {
        name: String,
        type_full_name: String,
    },
    Method {
        name: String,
        full_name: String,
        signature: String,
        file_name: String,
        ast_parent_full_name: String,
        ast_parent_type: String,
    },
    MethodParameterIn {
        name: String,
        type_full_name: String,
        evaluation_strategy: EvaluationStrategy,
    },
    MethodReturn {
        type_full_name: String,
        evaluation_strategy: EvaluationStrategy,
    },
    Modifier {
        modifier_type: ModifierType,
    },
    Local {
        name: String,
        type_full_name: String,
    },
    Block {
        type_full_name: String,
    },
    Call {
        name: String,
        method_full_name: String,
        signature: String,
        dispatch_type: DispatchType,
        type_full_name: String,
    },
    Literal {
        type_full_name: String,
    },
    Identifier {
        name: String,
        type_full_name: String,
    },
    FieldIdentifier {
        canonical_name: String,
    },
    MethodRef {
        method_full_name: String,
    },
    TypeRef {
        type_full_name: String,
    },
    Return,
    JumpTarget {
        name: String,
    },
    ControlStructure,
    Unknown {
        type_full_name: String,
    },
    ArrayInitializer,
    TypeArgument,
    TypeParameter {
        name: String,
    },
    Binding {
        name: String,
        signature: String,
    },
}

impl NodeData {
    /// The kind this data belongs to.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::MetaData { .. } => NodeKind::MetaData,
            NodeData::File { .. } => NodeKind::File,
            NodeData::NamespaceBlock { .. } => NodeKind::NamespaceBlock,
            NodeData::TypeDecl { .. } => NodeKind::TypeDecl,
            NodeData::Member { .. } => NodeKind::Member,
            NodeData::Method { .. } => NodeKind::Method,
            NodeData::MethodParameterIn { .. } => NodeKind::MethodParameterIn,
            NodeData::MethodReturn { .. } => NodeKind::MethodReturn,
            NodeData::Modifier { .. } => NodeKind::Modifier,
            NodeData::Local { .. } => NodeKind::Local,
            NodeData::Block { .. } => NodeKind::Block,
            NodeData::Call { .. } => NodeKind::Call,
            NodeData::Literal { .. } => NodeKind::Literal,
            NodeData::Identifier { .. } => NodeKind::Identifier,
            NodeData::FieldIdentifier { .. } => NodeKind::FieldIdentifier,
            NodeData::MethodRef { .. } => NodeKind::MethodRef,
            NodeData::TypeRef { .. } => NodeKind::TypeRef,
            NodeData::Return => NodeKind::Return,
            NodeData::JumpTarget { .. } => NodeKind::JumpTarget,
            NodeData::ControlStructure => NodeKind::ControlStructure,
            NodeData::Unknown { .. } => NodeKind::Unknown,
            NodeData::ArrayInitializer => NodeKind::ArrayInitializer,
            NodeData::TypeArgument => NodeKind::TypeArgument,
            NodeData::TypeParameter { .. } => NodeKind::TypeParameter,
            NodeData::Binding { .. } => NodeKind::Binding,
        }
    }

    /// This node's `name` property, for the kinds that have one.
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeData::NamespaceBlock { name, .. }
            | NodeData::TypeDecl { name, .. }
            | NodeData::Member { name, .. }
            | NodeData::Method { name, .. }
            | NodeData::MethodParameterIn { name, .. }
            | NodeData::Local { name, .. }
            | NodeData::Call { name, .. }
            | NodeData::Identifier { name, .. }
            | NodeData::JumpTarget { name }
            | NodeData::TypeParameter { name }
            | NodeData::Binding { name, .. } => Some(name),
            NodeData::File { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// A node builder: the shared header plus the kind-specific [`NodeData`][].
///
/// [`NodeData`]: enum.NodeData.html
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    id: Option<NodeId>,
    /// Sibling index under this node's AST parent, 1-based.
    pub order: i64,
    /// Position when this node is an argument of a call; −1 when it is not.
    pub argument_index: i64,
    pub line_number: i64,
    pub column_number: i64,
    /// Textual source-level rendering of this node.
    pub code: String,
    data: NodeData,
}

impl Node {
    /// Creates a detached builder with every header field at its default.
    pub fn new(data: NodeData) -> Node {
        Node {
            id: None,
            order: UNSET_INT,
            argument_index: UNSET_INT,
            line_number: UNSET_INT,
            column_number: UNSET_INT,
            code: UNSET_STRING.to_string(),
            data,
        }
    }

    pub fn with_order(mut self, order: i64) -> Node {
        self.order = order;
        self
    }

    pub fn with_argument_index(mut self, argument_index: i64) -> Node {
        self.argument_index = argument_index;
        self
    }

    pub fn with_code<S: Into<String>>(mut self, code: S) -> Node {
        self.code = code.into();
        self
    }

    pub fn with_location(mut self, line_number: i64, column_number: i64) -> Node {
        self.line_number = line_number;
        self.column_number = column_number;
        self
    }

    /// The store-assigned id, or `None` while the builder is still detached.
    #[inline(always)]
    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    /// Finalises the id.  Drivers call this when they persist the builder; nothing else should.
    pub fn set_id(&mut self, id: NodeId) {
        self.id = Some(id);
    }

    #[inline(always)]
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    #[inline(always)]
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    #[inline(always)]
    pub fn data_mut(&mut self) -> &mut NodeData {
        &mut self.data
    }

    pub fn name(&self) -> Option<&str> {
        self.data.name()
    }

    /// The full property bag of this node, including header fields, in persisted spelling.
    pub fn properties(&self) -> PropertyBag {
        use property::*;
        let mut bag = PropertyBag::new();
        bag.push(ORDER, self.order);
        bag.push(ARGUMENT_INDEX, self.argument_index);
        bag.push(LINE_NUMBER, self.line_number);
        bag.push(COLUMN_NUMBER, self.column_number);
        bag.push(CODE, self.code.as_str());
        match &self.data {
            NodeData::MetaData { language, version } => {
                bag.push(LANGUAGE, language.as_str());
                bag.push(VERSION, version.as_str());
            }
            NodeData::File { name, hash } => {
                bag.push(NAME, name.as_str());
                if let Some(hash) = hash {
                    bag.push(HASH, hash.as_str());
                }
            }
            NodeData::NamespaceBlock {
                name,
                full_name,
                file_name,
            } => {
                bag.push(NAME, name.as_str());
                bag.push(FULL_NAME, full_name.as_str());
                bag.push(FILENAME, file_name.as_str());
            }
            NodeData::TypeDecl {
                name,
                full_name,
                ast_parent_full_name,
                ast_parent_type,
                file_name,
            } => {
                bag.push(NAME, name.as_str());
                bag.push(FULL_NAME, full_name.as_str());
                bag.push(AST_PARENT_FULL_NAME, ast_parent_full_name.as_str());
                bag.push(AST_PARENT_TYPE, ast_parent_type.as_str());
                bag.push(FILENAME, file_name.as_str());
            }
            NodeData::Member {
                name,
                type_full_name,
            } => {
                bag.push(NAME, name.as_str());
                bag.push(TYPE_FULL_NAME, type_full_name.as_str());
            }
            NodeData::Method {
                name,
                full_name,
                signature,
                file_name,
                ast_parent_full_name,
                ast_parent_type,
            } => {
                bag.push(NAME, name.as_str());
                bag.push(FULL_NAME, full_name.as_str());
                bag.push(SIGNATURE, signature.as_str());
                bag.push(FILENAME, file_name.as_str());
                bag.push(AST_PARENT_FULL_NAME, ast_parent_full_name.as_str());
                bag.push(AST_PARENT_TYPE, ast_parent_type.as_str());
            }
            NodeData::MethodParameterIn {
                name,
                type_full_name,
                evaluation_strategy,
            } => {
                bag.push(NAME, name.as_str());
                bag.push(TYPE_FULL_NAME, type_full_name.as_str());
                bag.push(EVALUATION_STRATEGY, evaluation_strategy.as_str());
            }
            NodeData::MethodReturn {
                type_full_name,
                evaluation_strategy,
            } => {
                bag.push(TYPE_FULL_NAME, type_full_name.as_str());
                bag.push(EVALUATION_STRATEGY, evaluation_strategy.as_str());
            }
            NodeData::Modifier { modifier_type } => {
                bag.push(MODIFIER_TYPE, modifier_type.as_str());
            }
            NodeData::Local {
                name,
                type_full_name,
            } => {
                bag.push(NAME, name.as_str());
                bag.push(TYPE_FULL_NAME, type_full_name.as_str());
            }
            NodeData::Block { type_full_name } => {
                bag.push(TYPE_FULL_NAME, type_full_name.as_str());
            }
            NodeData::Call {
                name,
                method_full_name,
                signature,
                dispatch_type,
                type_full_name,
            } => {
                bag.push(NAME, name.as_str());
                bag.push(METHOD_FULL_NAME, method_full_name.as_str());
                bag.push(SIGNATURE, signature.as_str());
                bag.push(DISPATCH_TYPE, dispatch_type.as_str());
                bag.push(TYPE_FULL_NAME, type_full_name.as_str());
            }
            NodeData::Literal { type_full_name } => {
                bag.push(TYPE_FULL_NAME, type_full_name.as_str());
            }
            NodeData::Identifier {
                name,
                type_full_name,
            } => {
                bag.push(NAME, name.as_str());
                bag.push(TYPE_FULL_NAME, type_full_name.as_str());
            }
            NodeData::FieldIdentifier { canonical_name } => {
                bag.push(CANONICAL_NAME, canonical_name.as_str());
            }
            NodeData::MethodRef { method_full_name } => {
                bag.push(METHOD_FULL_NAME, method_full_name.as_str());
            }
            NodeData::TypeRef { type_full_name } => {
                bag.push(TYPE_FULL_NAME, type_full_name.as_str());
            }
            NodeData::Return => {}
            NodeData::JumpTarget { name } => {
                bag.push(NAME, name.as_str());
            }
            NodeData::ControlStructure => {}
            NodeData::Unknown { type_full_name } => {
                bag.push(TYPE_FULL_NAME, type_full_name.as_str());
            }
            NodeData::ArrayInitializer => {}
            NodeData::TypeArgument => {}
            NodeData::TypeParameter { name } => {
                bag.push(NAME, name.as_str());
            }
            NodeData::Binding { name, signature } => {
                bag.push(NAME, name.as_str());
                bag.push(SIGNATURE, signature.as_str());
            }
        }
        bag
    }

    /// Rebuilds a node from a persisted `(kind, properties)` pair.  Properties whose absence
    /// would make the node unaddressable (a file's name, a method's full name) are required;
    /// everything else falls back to the schema defaults.
    pub fn from_parts(
        kind: NodeKind,
        id: Option<NodeId>,
        bag: &PropertyBag,
    ) -> Result<Node, SchemaError> {
        use property::*;
        let data = match kind {
            NodeKind::MetaData => NodeData::MetaData {
                language: bag.string_or(LANGUAGE, crate::schema::DEFAULT_LANGUAGE),
                version: bag.string_or(VERSION, crate::schema::DEFAULT_LANGUAGE_VERSION),
            },
            NodeKind::File => NodeData::File {
                name: bag.required_string(kind, NAME)?,
                hash: bag
                    .get(HASH)
                    .and_then(PropertyValue::as_str)
                    .map(str::to_string),
            },
            NodeKind::NamespaceBlock => NodeData::NamespaceBlock {
                name: bag.string_or(NAME, UNSET_STRING),
                full_name: bag.required_string(kind, FULL_NAME)?,
                file_name: bag.string_or(FILENAME, UNSET_STRING),
            },
            NodeKind::TypeDecl => NodeData::TypeDecl {
                name: bag.string_or(NAME, UNSET_STRING),
                full_name: bag.required_string(kind, FULL_NAME)?,
                ast_parent_full_name: bag.string_or(AST_PARENT_FULL_NAME, UNSET_STRING),
                ast_parent_type: bag.string_or(AST_PARENT_TYPE, UNSET_STRING),
                file_name: bag.string_or(FILENAME, UNSET_STRING),
            },
            NodeKind::Member => NodeData::Member {
                name: bag.string_or(NAME, UNSET_STRING),
                type_full_name: bag.string_or(TYPE_FULL_NAME, UNSET_STRING),
            },
            NodeKind::Method => NodeData::Method {
                name: bag.string_or(NAME, UNSET_STRING),
                full_name: bag.required_string(kind, FULL_NAME)?,
                signature: bag.string_or(SIGNATURE, DEFAULT_SIGNATURE),
                file_name: bag.string_or(FILENAME, UNSET_STRING),
                ast_parent_full_name: bag.string_or(AST_PARENT_FULL_NAME, UNSET_STRING),
                ast_parent_type: bag.string_or(AST_PARENT_TYPE, UNSET_STRING),
            },
            NodeKind::MethodParameterIn => NodeData::MethodParameterIn {
                name: bag.string_or(NAME, UNSET_STRING),
                type_full_name: bag.string_or(TYPE_FULL_NAME, UNSET_STRING),
                evaluation_strategy: bag
                    .string_or(EVALUATION_STRATEGY, EvaluationStrategy::default().as_str())
                    .parse()?,
            },
            NodeKind::MethodReturn => NodeData::MethodReturn {
                type_full_name: bag.string_or(TYPE_FULL_NAME, UNSET_STRING),
                evaluation_strategy: bag
                    .string_or(EVALUATION_STRATEGY, EvaluationStrategy::default().as_str())
                    .parse()?,
            },
            NodeKind::Modifier => NodeData::Modifier {
                modifier_type: bag
                    .string_or(MODIFIER_TYPE, ModifierType::Virtual.as_str())
                    .parse()?,
            },
            NodeKind::Local => NodeData::Local {
                name: bag.string_or(NAME, UNSET_STRING),
                type_full_name: bag.string_or(TYPE_FULL_NAME, UNSET_STRING),
            },
            NodeKind::Block => NodeData::Block {
                type_full_name: bag.string_or(TYPE_FULL_NAME, UNSET_STRING),
            },
            NodeKind::Call => NodeData::Call {
                name: bag.string_or(NAME, UNSET_STRING),
                method_full_name: bag.string_or(METHOD_FULL_NAME, UNSET_STRING),
                signature: bag.string_or(SIGNATURE, DEFAULT_SIGNATURE),
                dispatch_type: bag
                    .string_or(DISPATCH_TYPE, DispatchType::default().as_str())
                    .parse()?,
                type_full_name: bag.string_or(TYPE_FULL_NAME, UNSET_STRING),
            },
            NodeKind::Literal => NodeData::Literal {
                type_full_name: bag.string_or(TYPE_FULL_NAME, UNSET_STRING),
            },
            NodeKind::Identifier => NodeData::Identifier {
                name: bag.string_or(NAME, UNSET_STRING),
                type_full_name: bag.string_or(TYPE_FULL_NAME, UNSET_STRING),
            },
            NodeKind::FieldIdentifier => NodeData::FieldIdentifier {
                canonical_name: bag.string_or(CANONICAL_NAME, UNSET_STRING),
            },
            NodeKind::MethodRef => NodeData::MethodRef {
                method_full_name: bag.string_or(METHOD_FULL_NAME, UNSET_STRING),
            },
            NodeKind::TypeRef => NodeData::TypeRef {
                type_full_name: bag.string_or(TYPE_FULL_NAME, UNSET_STRING),
            },
            NodeKind::Return => NodeData::Return,
            NodeKind::JumpTarget => NodeData::JumpTarget {
                name: bag.string_or(NAME, UNSET_STRING),
            },
            NodeKind::ControlStructure => NodeData::ControlStructure,
            NodeKind::Unknown => NodeData::Unknown {
                type_full_name: bag.string_or(TYPE_FULL_NAME, UNSET_STRING),
            },
            NodeKind::ArrayInitializer => NodeData::ArrayInitializer,
            NodeKind::TypeArgument => NodeData::TypeArgument,
            NodeKind::TypeParameter => NodeData::TypeParameter {
                name: bag.string_or(NAME, UNSET_STRING),
            },
            NodeKind::Binding => NodeData::Binding {
                name: bag.string_or(NAME, UNSET_STRING),
                signature: bag.string_or(SIGNATURE, DEFAULT_SIGNATURE),
            },
        };
        let mut node = Node::new(data);
        node.id = id;
        node.order = bag.int_or(ORDER, UNSET_INT);
        node.argument_index = bag.int_or(ARGUMENT_INDEX, UNSET_INT);
        node.line_number = bag.int_or(LINE_NUMBER, UNSET_INT);
        node.column_number = bag.int_or(COLUMN_NUMBER, UNSET_INT);
        node.code = bag.string_or(CODE, UNSET_STRING);
        Ok(node)
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}({})", self.kind(), id),
            None => write!(f, "{}(detached)", self.kind()),
        }
    }
}
