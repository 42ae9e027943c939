// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The closed schema of a code property graph.
//!
//! The schema enumerates every node kind, every edge kind, and the set of legal
//! `(source kind, edge kind, destination kind)` triples.  Producers (the builders in the
//! extraction crate) consult [`is_allowed`][] before handing an edge to a driver, and every driver
//! re-checks as a defensive second line — an illegal edge must be rejected before any part of it
//! becomes visible in the store.
//!
//! Centralising the table here means producers and consumers share one source of truth.  The
//! table is static, so both sides can enumerate it at compile time.
//!
//! [`is_allowed`]: fn.is_allowed.html

use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

/// The label of a node in a code property graph.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum NodeKind {
    MetaData,
    File,
    NamespaceBlock,
    TypeDecl,
    Member,
    Method,
    MethodParameterIn,
    MethodReturn,
    Modifier,
    Local,
    Block,
    Call,
    Literal,
    Identifier,
    FieldIdentifier,
    MethodRef,
    TypeRef,
    Return,
    JumpTarget,
    ControlStructure,
    Unknown,
    ArrayInitializer,
    TypeArgument,
    TypeParameter,
    Binding,
}

impl NodeKind {
    /// All node kinds, in a fixed order.  Useful for exhaustive schema enumeration.
    pub const ALL: [NodeKind; 25] = [
        NodeKind::MetaData,
        NodeKind::File,
        NodeKind::NamespaceBlock,
        NodeKind::TypeDecl,
        NodeKind::Member,
        NodeKind::Method,
        NodeKind::MethodParameterIn,
        NodeKind::MethodReturn,
        NodeKind::Modifier,
        NodeKind::Local,
        NodeKind::Block,
        NodeKind::Call,
        NodeKind::Literal,
        NodeKind::Identifier,
        NodeKind::FieldIdentifier,
        NodeKind::MethodRef,
        NodeKind::TypeRef,
        NodeKind::Return,
        NodeKind::JumpTarget,
        NodeKind::ControlStructure,
        NodeKind::Unknown,
        NodeKind::ArrayInitializer,
        NodeKind::TypeArgument,
        NodeKind::TypeParameter,
        NodeKind::Binding,
    ];

    /// The label as it appears in a persisted store.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::MetaData => "META_DATA",
            NodeKind::File => "FILE",
            NodeKind::NamespaceBlock => "NAMESPACE_BLOCK",
            NodeKind::TypeDecl => "TYPE_DECL",
            NodeKind::Member => "MEMBER",
            NodeKind::Method => "METHOD",
            NodeKind::MethodParameterIn => "METHOD_PARAMETER_IN",
            NodeKind::MethodReturn => "METHOD_RETURN",
            NodeKind::Modifier => "MODIFIER",
            NodeKind::Local => "LOCAL",
            NodeKind::Block => "BLOCK",
            NodeKind::Call => "CALL",
            NodeKind::Literal => "LITERAL",
            NodeKind::Identifier => "IDENTIFIER",
            NodeKind::FieldIdentifier => "FIELD_IDENTIFIER",
            NodeKind::MethodRef => "METHOD_REF",
            NodeKind::TypeRef => "TYPE_REF",
            NodeKind::Return => "RETURN",
            NodeKind::JumpTarget => "JUMP_TARGET",
            NodeKind::ControlStructure => "CONTROL_STRUCTURE",
            NodeKind::Unknown => "UNKNOWN",
            NodeKind::ArrayInitializer => "ARRAY_INITIALIZER",
            NodeKind::TypeArgument => "TYPE_ARGUMENT",
            NodeKind::TypeParameter => "TYPE_PARAMETER",
            NodeKind::Binding => "BINDING",
        }
    }

    /// Whether nodes of this kind can appear inside a method body.  Body nodes carry `order`,
    /// `argumentIndex`, a source location, and a `code` rendering, and participate in `CFG` edges.
    pub fn is_body_kind(self) -> bool {
        match self {
            NodeKind::Block
            | NodeKind::Call
            | NodeKind::Literal
            | NodeKind::Identifier
            | NodeKind::FieldIdentifier
            | NodeKind::MethodRef
            | NodeKind::TypeRef
            | NodeKind::Return
            | NodeKind::JumpTarget
            | NodeKind::ControlStructure
            | NodeKind::Unknown
            | NodeKind::ArrayInitializer => true,
            _ => false,
        }
    }

    /// Whether nodes of this kind can be the value of an argument or condition position.
    fn is_expression_kind(self) -> bool {
        match self {
            NodeKind::Block
            | NodeKind::Call
            | NodeKind::Literal
            | NodeKind::Identifier
            | NodeKind::FieldIdentifier
            | NodeKind::MethodRef
            | NodeKind::TypeRef
            | NodeKind::Unknown
            | NodeKind::ArrayInitializer => true,
            _ => false,
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = SchemaError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownNodeKind(s.to_string()))
    }
}

/// The label of an edge in a code property graph.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EdgeKind {
    /// Syntactic parent-to-child edge.
    Ast,
    /// Intraprocedural control-flow successor edge.
    Cfg,
    /// Call-site-to-argument edge.
    Argument,
    /// Call-site-to-receiver edge, for instance dispatch.
    Receiver,
    /// Use-to-definition edge.
    Ref,
    /// Control-structure-to-condition edge.
    Condition,
    /// Call-site-to-target-method edge.
    Call,
    /// Type-declaration-to-binding edge.
    Binds,
    /// Type-argument-to-type-parameter edge.
    BindsTo,
    /// Method-to-source-file edge.
    SourceFile,
    /// Closure capture edge.  Reserved: no triple is currently legal.
    CapturedBy,
}

impl EdgeKind {
    /// All edge kinds, in a fixed order.
    pub const ALL: [EdgeKind; 11] = [
        EdgeKind::Ast,
        EdgeKind::Cfg,
        EdgeKind::Argument,
        EdgeKind::Receiver,
        EdgeKind::Ref,
        EdgeKind::Condition,
        EdgeKind::Call,
        EdgeKind::Binds,
        EdgeKind::BindsTo,
        EdgeKind::SourceFile,
        EdgeKind::CapturedBy,
    ];

    /// The label as it appears in a persisted store.
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Ast => "AST",
            EdgeKind::Cfg => "CFG",
            EdgeKind::Argument => "ARGUMENT",
            EdgeKind::Receiver => "RECEIVER",
            EdgeKind::Ref => "REF",
            EdgeKind::Condition => "CONDITION",
            EdgeKind::Call => "CALL",
            EdgeKind::Binds => "BINDS",
            EdgeKind::BindsTo => "BINDS_TO",
            EdgeKind::SourceFile => "SOURCE_FILE",
            EdgeKind::CapturedBy => "CAPTURED_BY",
        }
    }
}

impl Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = SchemaError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownEdgeKind(s.to_string()))
    }
}

/// Whether the schema permits an edge labelled `edge` from a node of kind `src` to a node of kind
/// `dst`.  Pure; both producers and drivers call this.
pub fn is_allowed(src: NodeKind, edge: EdgeKind, dst: NodeKind) -> bool {
    use NodeKind::*;
    match edge {
        EdgeKind::Ast => match src {
            File => dst == NamespaceBlock,
            NamespaceBlock => matches!(dst, NamespaceBlock | TypeDecl | Method),
            TypeDecl => matches!(dst, Member | Modifier | Method | TypeParameter | TypeArgument),
            Method => matches!(
                dst,
                MethodParameterIn | MethodReturn | Modifier | Block | TypeParameter
            ),
            Block => dst == Local || dst.is_body_kind(),
            Call | Return | Unknown => dst.is_expression_kind(),
            ControlStructure => dst.is_body_kind(),
            ArrayInitializer => dst.is_expression_kind(),
            _ => false,
        },
        EdgeKind::Cfg => {
            (src == Block || src.is_body_kind()) && (dst == MethodReturn || dst.is_body_kind())
        }
        EdgeKind::Argument => matches!(src, Call | Return) && dst.is_expression_kind(),
        EdgeKind::Receiver => src == Call && matches!(dst, Identifier | Call | MethodRef | Unknown),
        EdgeKind::Ref => match src {
            Identifier | FieldIdentifier => matches!(dst, Local | Member | MethodParameterIn),
            Binding => dst == Method,
            _ => false,
        },
        EdgeKind::Condition => src == ControlStructure && dst.is_expression_kind(),
        EdgeKind::Call => src == Call && dst == Method,
        EdgeKind::Binds => src == TypeDecl && dst == Binding,
        EdgeKind::BindsTo => src == TypeArgument && dst == TypeParameter,
        EdgeKind::SourceFile => src == Method && dst == File,
        EdgeKind::CapturedBy => false,
    }
}

/// How an argument or return value is passed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EvaluationStrategy {
    ByReference,
    ByValue,
}

impl EvaluationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationStrategy::ByReference => "BY_REFERENCE",
            EvaluationStrategy::ByValue => "BY_VALUE",
        }
    }
}

impl Default for EvaluationStrategy {
    fn default() -> Self {
        EvaluationStrategy::ByReference
    }
}

impl Display for EvaluationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EvaluationStrategy {
    type Err = SchemaError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BY_REFERENCE" => Ok(EvaluationStrategy::ByReference),
            "BY_VALUE" => Ok(EvaluationStrategy::ByValue),
            _ => Err(SchemaError::InvalidPropertyValue {
                property: "EVALUATION_STRATEGY",
                value: s.to_string(),
            }),
        }
    }
}

/// How a call site dispatches to its target.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DispatchType {
    StaticDispatch,
    DynamicDispatch,
}

impl DispatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchType::StaticDispatch => "STATIC_DISPATCH",
            DispatchType::DynamicDispatch => "DYNAMIC_DISPATCH",
        }
    }
}

impl Default for DispatchType {
    fn default() -> Self {
        DispatchType::StaticDispatch
    }
}

impl Display for DispatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DispatchType {
    type Err = SchemaError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STATIC_DISPATCH" => Ok(DispatchType::StaticDispatch),
            "DYNAMIC_DISPATCH" => Ok(DispatchType::DynamicDispatch),
            _ => Err(SchemaError::InvalidPropertyValue {
                property: "DISPATCH_TYPE",
                value: s.to_string(),
            }),
        }
    }
}

/// A modifier attached to a method or type declaration, derived from JVM access flags.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ModifierType {
    Public,
    Private,
    Protected,
    Static,
    Final,
    Abstract,
    Native,
    Constructor,
    Virtual,
}

impl ModifierType {
    pub fn as_str(self) -> &'static str {
        match self {
            ModifierType::Public => "PUBLIC",
            ModifierType::Private => "PRIVATE",
            ModifierType::Protected => "PROTECTED",
            ModifierType::Static => "STATIC",
            ModifierType::Final => "FINAL",
            ModifierType::Abstract => "ABSTRACT",
            ModifierType::Native => "NATIVE",
            ModifierType::Constructor => "CONSTRUCTOR",
            ModifierType::Virtual => "VIRTUAL",
        }
    }
}

impl Display for ModifierType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModifierType {
    type Err = SchemaError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLIC" => Ok(ModifierType::Public),
            "PRIVATE" => Ok(ModifierType::Private),
            "PROTECTED" => Ok(ModifierType::Protected),
            "STATIC" => Ok(ModifierType::Static),
            "FINAL" => Ok(ModifierType::Final),
            "ABSTRACT" => Ok(ModifierType::Abstract),
            "NATIVE" => Ok(ModifierType::Native),
            "CONSTRUCTOR" => Ok(ModifierType::Constructor),
            "VIRTUAL" => Ok(ModifierType::Virtual),
            _ => Err(SchemaError::InvalidPropertyValue {
                property: "MODIFIER_TYPE",
                value: s.to_string(),
            }),
        }
    }
}

/// Well-known sentinel for an unset string property.
pub const UNSET_STRING: &str = "null";
/// Well-known sentinel for an unset integer property.
pub const UNSET_INT: i64 = -1;
/// Default for an unset method signature.
pub const DEFAULT_SIGNATURE: &str = "()";
/// Default source language recorded in `META_DATA`.
pub const DEFAULT_LANGUAGE: &str = "JAVA";
/// Default language version recorded in `META_DATA`.
pub const DEFAULT_LANGUAGE_VERSION: &str = "1.8";

#[derive(Debug, Error, Eq, PartialEq)]
pub enum SchemaError {
    #[error("edge {edge} is not allowed from {src} to {dst}")]
    IllegalEdge {
        src: NodeKind,
        edge: EdgeKind,
        dst: NodeKind,
    },

    #[error("unknown node kind `{0}`")]
    UnknownNodeKind(String),

    #[error("unknown edge kind `{0}`")]
    UnknownEdgeKind(String),

    #[error("missing required property `{property}` on a {kind} node")]
    MissingProperty {
        kind: NodeKind,
        property: &'static str,
    },

    #[error("invalid value `{value}` for property `{property}`")]
    InvalidPropertyValue {
        property: &'static str,
        value: String,
    },
}
