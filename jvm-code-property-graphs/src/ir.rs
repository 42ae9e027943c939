// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! The intermediate view this crate consumes.
//!
//! The bytecode lifter itself is an external collaborator; its only contact with the extraction
//! pipeline is the [`ClassLifter`][] trait and the data types in this module.  A lifted method is
//! a [`UnitGraph`][]: the method declaration, its formal parameters and locals, an ordered list
//! of three-address [`Unit`s][`Unit`], the successor relation between them, and a source location
//! per unit.  Whatever front end produces this view — a real bytecode lifter, or the hand-built
//! fixtures in the test suite — the builders downstream treat it identically.
//!
//! [`ClassLifter`]: trait.ClassLifter.html
//! [`Unit`]: struct.Unit.html
//! [`UnitGraph`]: struct.UnitGraph.html

use std::fmt::Display;
use std::path::Path;

use code_property_graphs::schema::DispatchType;
use smallvec::SmallVec;
use thiserror::Error;

/// Identifies a method across the store and the call-graph oracle.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MethodSignature {
    /// Fully qualified name, e.g. `Conditional1.main`.
    pub full_name: String,
    /// Return type and parameter types, e.g. `void(java.lang.String[])`.
    pub signature: String,
}

impl MethodSignature {
    pub fn new<F: Into<String>, S: Into<String>>(full_name: F, signature: S) -> MethodSignature {
        MethodSignature {
            full_name: full_name.into(),
            signature: signature.into(),
        }
    }

    /// The unqualified method name.
    pub fn name(&self) -> &str {
        match self.full_name.rfind('.') {
            Some(dot) => &self.full_name[dot + 1..],
            None => &self.full_name,
        }
    }
}

impl Display for MethodSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}: {}", self.full_name, self.signature)
    }
}

/// JVM access flags, as found in a class file's `access_flags` items.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub const PUBLIC: AccessFlags = AccessFlags(0x0001);
    pub const PRIVATE: AccessFlags = AccessFlags(0x0002);
    pub const PROTECTED: AccessFlags = AccessFlags(0x0004);
    pub const STATIC: AccessFlags = AccessFlags(0x0008);
    pub const FINAL: AccessFlags = AccessFlags(0x0010);
    pub const NATIVE: AccessFlags = AccessFlags(0x0100);
    pub const ABSTRACT: AccessFlags = AccessFlags(0x0400);

    pub fn contains(self, flag: AccessFlags) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl std::ops::BitOr for AccessFlags {
    type Output = AccessFlags;
    fn bitor(self, rhs: AccessFlags) -> AccessFlags {
        AccessFlags(self.0 | rhs.0)
    }
}

/// The head of a lifted method.
#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub name: String,
    /// Fully qualified name of the declaring type, e.g. `Conditional1`.
    pub declaring_type: String,
    pub signature: String,
    pub return_type: String,
    pub flags: AccessFlags,
    pub file_name: String,
    pub line_number: i64,
    pub column_number: i64,
}

impl MethodDecl {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }

    pub fn method_signature(&self) -> MethodSignature {
        MethodSignature::new(self.full_name(), self.signature.clone())
    }
}

/// A formal parameter of a lifted method.
#[derive(Clone, Debug)]
pub struct Parameter {
    pub name: String,
    pub type_full_name: String,
    /// Zero-based source position.
    pub index: usize,
}

/// A local variable of a lifted method body.
#[derive(Clone, Debug)]
pub struct LocalDecl {
    pub name: String,
    pub type_full_name: String,
}

/// A field reference: declaring type plus member name and type.
#[derive(Clone, Debug)]
pub struct FieldRef {
    pub name: String,
    pub declaring_type: String,
    pub type_full_name: String,
}

/// A value read by a unit: a local (or parameter) or a constant.
#[derive(Clone, Debug)]
pub enum Operand {
    Local {
        name: String,
        type_full_name: String,
    },
    Constant {
        value: String,
        type_full_name: String,
    },
}

/// The left-hand side of an assignment.
#[derive(Clone, Debug)]
pub enum Place {
    Local {
        name: String,
        type_full_name: String,
    },
    Field {
        /// The receiver local for an instance field; `None` for a static field.
        base: Option<String>,
        field: FieldRef,
    },
}

/// A binary operator, rendered into the graph as the name of an operator call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl BinaryOp {
    /// The operator name, used as the lowered call's `name`.
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "ADD",
            BinaryOp::Sub => "SUB",
            BinaryOp::Mul => "MUL",
            BinaryOp::Div => "DIV",
            BinaryOp::Rem => "REM",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Xor => "XOR",
            BinaryOp::Shl => "SHL",
            BinaryOp::Shr => "SHR",
            BinaryOp::Ushr => "USHR",
            BinaryOp::Gt => "GT",
            BinaryOp::Ge => "GE",
            BinaryOp::Lt => "LT",
            BinaryOp::Le => "LE",
            BinaryOp::Eq => "EQ",
            BinaryOp::Ne => "NE",
        }
    }

    /// The source-level spelling, used for `code` renderings.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Ushr => ">>>",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        }
    }
}

/// An invocation: target, dispatch mode, optional receiver, positional arguments.
#[derive(Clone, Debug)]
pub struct InvokeExpr {
    pub name: String,
    pub declaring_type: String,
    pub signature: String,
    pub return_type: String,
    pub dispatch: DispatchType,
    pub receiver: Option<Operand>,
    pub arguments: Vec<Operand>,
}

impl InvokeExpr {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }
}

/// A right-hand-side expression.  Mostly flat, three-address style; conditions of fused branches
/// may nest boolean operators, so binary operands are themselves expressions.
#[derive(Clone, Debug)]
pub enum Expr {
    Operand(Operand),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    New {
        type_full_name: String,
    },
    FieldLoad {
        /// The receiver local for an instance field; `None` for a static field.
        base: Option<String>,
        field: FieldRef,
    },
    Invoke(InvokeExpr),
    MethodRef {
        method_full_name: String,
    },
}

impl Expr {
    pub fn local<N: Into<String>, T: Into<String>>(name: N, type_full_name: T) -> Expr {
        Expr::Operand(Operand::Local {
            name: name.into(),
            type_full_name: type_full_name.into(),
        })
    }

    pub fn constant<V: Into<String>, T: Into<String>>(value: V, type_full_name: T) -> Expr {
        Expr::Operand(Operand::Constant {
            value: value.into(),
            type_full_name: type_full_name.into(),
        })
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Index of a unit within its method's unit list.
pub type UnitId = usize;

/// One three-address unit of a method body.
#[derive(Clone, Debug)]
pub struct Unit {
    pub kind: UnitKind,
    pub line_number: i64,
    pub column_number: i64,
}

impl Unit {
    pub fn new(kind: UnitKind) -> Unit {
        Unit {
            kind,
            line_number: -1,
            column_number: -1,
        }
    }

    pub fn at(kind: UnitKind, line_number: i64, column_number: i64) -> Unit {
        Unit {
            kind,
            line_number,
            column_number,
        }
    }
}

#[derive(Clone, Debug)]
pub enum UnitKind {
    Assign {
        target: Place,
        value: Expr,
    },
    /// Conditional branch: control transfers to `target` when the condition holds, and falls
    /// through to the next unit otherwise.
    If {
        condition: Expr,
        target: UnitId,
    },
    Goto {
        target: UnitId,
    },
    Return {
        value: Option<Operand>,
    },
    Invoke(InvokeExpr),
    Nop,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum IrError {
    #[error("unit {unit} branches to non-existent unit {target}")]
    BranchTargetOutOfRange { unit: UnitId, target: UnitId },
}

/// A lifted method body: the declaration, formals, locals, and the ordered units with their
/// successor and predecessor relations.
#[derive(Clone, Debug)]
pub struct UnitGraph {
    method: MethodDecl,
    parameters: Vec<Parameter>,
    locals: Vec<LocalDecl>,
    units: Vec<Unit>,
    successors: Vec<SmallVec<[UnitId; 2]>>,
    predecessors: Vec<SmallVec<[UnitId; 2]>>,
}

impl UnitGraph {
    /// Builds the graph, deriving the successor relation from the unit kinds: straight-line units
    /// fall through, gotos jump, branches have the taken target first and the fall-through
    /// second, and returns have no successor.
    pub fn new(
        method: MethodDecl,
        parameters: Vec<Parameter>,
        locals: Vec<LocalDecl>,
        units: Vec<Unit>,
    ) -> Result<UnitGraph, IrError> {
        let count = units.len();
        let check = |unit: UnitId, target: UnitId| {
            if target < count {
                Ok(target)
            } else {
                Err(IrError::BranchTargetOutOfRange { unit, target })
            }
        };
        let mut successors: Vec<SmallVec<[UnitId; 2]>> = Vec::with_capacity(count);
        for (index, unit) in units.iter().enumerate() {
            let mut next = SmallVec::new();
            match &unit.kind {
                UnitKind::Assign { .. } | UnitKind::Invoke(_) | UnitKind::Nop => {
                    if index + 1 < count {
                        next.push(index + 1);
                    }
                }
                UnitKind::If { target, .. } => {
                    next.push(check(index, *target)?);
                    if index + 1 < count {
                        next.push(index + 1);
                    }
                }
                UnitKind::Goto { target } => {
                    next.push(check(index, *target)?);
                }
                UnitKind::Return { .. } => {}
            }
            successors.push(next);
        }
        let mut predecessors: Vec<SmallVec<[UnitId; 2]>> = vec![SmallVec::new(); count];
        for (index, next) in successors.iter().enumerate() {
            for target in next {
                predecessors[*target].push(index);
            }
        }
        Ok(UnitGraph {
            method,
            parameters,
            locals,
            units,
            successors,
            predecessors,
        })
    }

    pub fn method(&self) -> &MethodDecl {
        &self.method
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn locals(&self) -> &[LocalDecl] {
        &self.locals
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn successors(&self, unit: UnitId) -> &[UnitId] {
        &self.successors[unit]
    }

    pub fn predecessors(&self, unit: UnitId) -> &[UnitId] {
        &self.predecessors[unit]
    }
}

/// A member field of a lifted class.
#[derive(Clone, Debug)]
pub struct MemberDecl {
    pub name: String,
    pub type_full_name: String,
}

/// One class, as handed over by the bytecode lifter.
#[derive(Clone, Debug)]
pub struct LiftedClass {
    /// Fully qualified type name, e.g. `Foo.Conditional1`.
    pub type_full_name: String,
    /// Unqualified type name.
    pub name: String,
    /// Package segments, outermost first.  Empty for the default package.
    pub package: Vec<String>,
    /// The source file name recorded for this class.
    pub file_name: String,
    pub flags: AccessFlags,
    pub members: Vec<MemberDecl>,
    pub methods: Vec<UnitGraph>,
}

#[derive(Debug, Error)]
#[error("failed to lift class from {origin}: {message}")]
pub struct LiftError {
    pub origin: String,
    pub message: String,
}

/// The bytecode lifter.  Out of scope for this crate: implementations wrap whatever bytecode
/// toolkit produces the three-address view.  `Sync` so that lifting can be farmed out across
/// threads when the input set is large.
pub trait ClassLifter: Sync {
    /// Lifts one class file into its unit-graph view.
    fn lift(&self, class_bytes: &[u8], origin: &Path) -> Result<LiftedClass, LiftError>;

    /// The call-graph oracle for the chosen algorithm, computed over everything this lifter has
    /// seen.  `None` when the lifter cannot provide one, in which case no call edges are linked.
    fn call_graph(
        &self,
        algorithm: CallGraphAlg,
        options: &[(String, String)],
    ) -> Option<Box<dyn CallGraphOracle>> {
        let _ = (algorithm, options);
        None
    }
}

/// A call site reported by the call-graph oracle: the unit holding the invocation, and the
/// resolved target.
#[derive(Clone, Debug)]
pub struct CallSite {
    pub unit: UnitId,
    pub target: MethodSignature,
}

/// The call-graph oracle.  The linking builder only ever needs the out-edges of one method; how
/// they were computed (class-hierarchy analysis, points-to, anything else) is opaque to it.
pub trait CallGraphOracle {
    fn out_edges(&self, method: &MethodSignature) -> Vec<CallSite>;
}

/// Selects the call-graph oracle.  `None` disables call linking entirely.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallGraphAlg {
    None,
    Cha,
    Spark,
}

impl Default for CallGraphAlg {
    fn default() -> Self {
        CallGraphAlg::None
    }
}

/// Whether a JVM type name denotes a primitive.  Drives the parameter evaluation-strategy rule:
/// primitives are passed by value, everything else by reference.
pub fn is_primitive(type_full_name: &str) -> bool {
    matches!(
        type_full_name,
        "boolean" | "byte" | "char" | "short" | "int" | "long" | "float" | "double" | "void"
    )
}
