// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Lowers one method's unit graph into AST nodes.
//!
//! The builder emits the method head first — the `METHOD` node, its parameters, the entry
//! `BLOCK`, the `METHOD_RETURN`, and the modifiers — and then walks the units in control-flow
//! order, recursively lowering each into body nodes.  Sibling `order` is assigned pre-order,
//! left to right; `argument_index` mirrors the source argument position for call arguments and
//! equals `order` everywhere else.
//!
//! Only `AST` and `CONDITION` edges are emitted here.  Control flow is the CFG builder's job,
//! and argument/receiver/def-use wiring is the PDG builder's; this builder records what they
//! need in the method association as it goes.

use code_property_graphs::drivers::Driver;
use code_property_graphs::drivers::Result;
use code_property_graphs::nodes::Node;
use code_property_graphs::nodes::NodeData;
use code_property_graphs::schema::DispatchType;
use code_property_graphs::schema::EdgeKind;
use code_property_graphs::schema::EvaluationStrategy;
use code_property_graphs::schema::ModifierType;
use code_property_graphs::schema::DEFAULT_SIGNATURE;

use crate::assoc::CallSiteInfo;
use crate::assoc::EmittedUnit;
use crate::assoc::MethodAssociation;
use crate::assoc::UnitExit;
use crate::ir::is_primitive;
use crate::ir::AccessFlags;
use crate::ir::BinaryOp;
use crate::ir::Expr;
use crate::ir::FieldRef;
use crate::ir::InvokeExpr;
use crate::ir::MethodDecl;
use crate::ir::Operand;
use crate::ir::Place;
use crate::ir::Unit;
use crate::ir::UnitGraph;
use crate::ir::UnitId;
use crate::ir::UnitKind;

/// The assignment operator's call name.
pub const OPERATOR_ASSIGNMENT: &str = "<operator>.assignment";
/// The field access operator's call name.
pub const OPERATOR_FIELD_ACCESS: &str = "<operator>.fieldAccess";

/// Source position of the unit currently being lowered.
#[derive(Clone, Copy)]
struct UnitCx {
    unit: UnitId,
    line: i64,
    column: i64,
}

pub struct AstBuilder<'a, D: Driver> {
    driver: &'a mut D,
    /// Rollback ledger: every vertex this builder persists, in emission order.  On a schema
    /// violation the pipeline deletes these and moves on to the next method.
    staged: &'a mut Vec<Node>,
}

impl<'a, D: Driver> AstBuilder<'a, D> {
    pub fn new(driver: &'a mut D, staged: &'a mut Vec<Node>) -> AstBuilder<'a, D> {
        AstBuilder { driver, staged }
    }

    /// Emits the method head and body for `graph`, attached to `type_decl` at the given sibling
    /// order, with a `SOURCE_FILE` edge into `file`.
    pub fn build(
        &mut self,
        graph: &UnitGraph,
        type_decl: &Node,
        file: &Node,
        sibling_order: i64,
    ) -> Result<MethodAssociation> {
        let mut assoc = MethodAssociation::default();
        let decl = graph.method();

        let mut method = Node::new(NodeData::Method {
            name: decl.name.clone(),
            full_name: decl.full_name(),
            signature: decl.signature.clone(),
            file_name: decl.file_name.clone(),
            ast_parent_full_name: decl.declaring_type.clone(),
            ast_parent_type: "TYPE_DECL".to_string(),
        })
        .with_code(render_method_code(decl, graph))
        .with_order(sibling_order)
        .with_location(decl.line_number, decl.column_number);
        self.add_node(&mut method)?;
        self.add_edge(type_decl, &method, EdgeKind::Ast)?;
        self.add_edge(&method, file, EdgeKind::SourceFile)?;

        // Parameters sit at orders 1..n; the entry block, method return, and modifiers follow.
        for parameter in graph.parameters() {
            let order = parameter.index as i64 + 1;
            let strategy = if is_primitive(&parameter.type_full_name) {
                EvaluationStrategy::ByValue
            } else {
                EvaluationStrategy::ByReference
            };
            let mut node = Node::new(NodeData::MethodParameterIn {
                name: parameter.name.clone(),
                type_full_name: parameter.type_full_name.clone(),
                evaluation_strategy: strategy,
            })
            .with_code(format!("{} {}", parameter.type_full_name, parameter.name))
            .with_order(order)
            .with_argument_index(order)
            .with_location(decl.line_number, decl.column_number);
            self.add_node(&mut node)?;
            self.add_edge(&method, &node, EdgeKind::Ast)?;
            assoc.add_var(&parameter.name, node);
        }
        let mut order = graph.parameters().len() as i64 + 1;

        let mut block = Node::new(NodeData::Block {
            type_full_name: "void".to_string(),
        })
        .with_order(order)
        .with_argument_index(0)
        .with_location(decl.line_number, decl.column_number);
        self.add_node(&mut block)?;
        self.add_edge(&method, &block, EdgeKind::Ast)?;
        order += 1;

        let mut method_return = Node::new(NodeData::MethodReturn {
            type_full_name: decl.return_type.clone(),
            // Returns are passed by reference regardless of their type.
            evaluation_strategy: EvaluationStrategy::ByReference,
        })
        .with_code("RETURN")
        .with_order(order)
        .with_location(decl.line_number, decl.column_number);
        self.add_node(&mut method_return)?;
        self.add_edge(&method, &method_return, EdgeKind::Ast)?;
        order += 1;

        for modifier in modifiers_of(decl) {
            let mut node = Node::new(NodeData::Modifier {
                modifier_type: modifier,
            })
            .with_code(modifier.as_str())
            .with_order(order);
            self.add_node(&mut node)?;
            self.add_edge(&method, &node, EdgeKind::Ast)?;
            order += 1;
        }

        // Locals are the entry block's first children; unit roots continue after them.
        let mut block_order = 1;
        for local in graph.locals() {
            let mut node = Node::new(NodeData::Local {
                name: local.name.clone(),
                type_full_name: local.type_full_name.clone(),
            })
            .with_code(format!("{} {}", local.type_full_name, local.name))
            .with_order(block_order);
            self.add_node(&mut node)?;
            self.add_edge(&block, &node, EdgeKind::Ast)?;
            assoc.add_var(&local.name, node);
            block_order += 1;
        }

        for (unit_id, unit) in graph.units().iter().enumerate() {
            if let Some(emitted) = self.lower_unit(unit_id, unit, block_order, &mut assoc)? {
                self.add_edge(&block, &emitted.root, EdgeKind::Ast)?;
                assoc.record_unit(unit_id, emitted);
                block_order += 1;
            }
        }

        assoc.method = Some(method);
        assoc.entry_block = Some(block);
        assoc.method_return = Some(method_return);
        Ok(assoc)
    }

    fn add_node(&mut self, node: &mut Node) -> Result<()> {
        self.driver.add_vertex(node)?;
        self.staged.push(node.clone());
        Ok(())
    }

    fn add_edge(&mut self, source: &Node, target: &Node, kind: EdgeKind) -> Result<()> {
        let mut source = source.clone();
        let mut target = target.clone();
        self.driver.add_edge(&mut source, &mut target, kind)
    }

    /// Lowers one unit.  `Goto` and `Nop` units emit nothing and return `None`; everything else
    /// produces a root node to hang under the entry block at `root_order`.
    fn lower_unit(
        &mut self,
        unit_id: UnitId,
        unit: &Unit,
        root_order: i64,
        assoc: &mut MethodAssociation,
    ) -> Result<Option<EmittedUnit>> {
        let cx = UnitCx {
            unit: unit_id,
            line: unit.line_number,
            column: unit.column_number,
        };
        match &unit.kind {
            UnitKind::Goto { .. } | UnitKind::Nop => Ok(None),
            UnitKind::Assign { target, value } => {
                let mut chain = Vec::new();
                let (value_root, value_code) =
                    self.lower_expr(value, 2, cx, &mut chain, assoc)?;
                let (target_root, target_code, target_type) = match target {
                    Place::Local {
                        name,
                        type_full_name,
                    } => {
                        let node =
                            self.lower_local(name, type_full_name, 1, 1, cx, &mut chain, assoc)?;
                        (node, name.clone(), type_full_name.clone())
                    }
                    Place::Field { base, field } => {
                        let (node, code) =
                            self.lower_field_access(base.as_deref(), field, 1, cx, &mut chain, assoc)?;
                        (node, code, field.type_full_name.clone())
                    }
                };
                let mut assign = Node::new(NodeData::Call {
                    name: OPERATOR_ASSIGNMENT.to_string(),
                    method_full_name: OPERATOR_ASSIGNMENT.to_string(),
                    signature: DEFAULT_SIGNATURE.to_string(),
                    dispatch_type: DispatchType::StaticDispatch,
                    type_full_name: target_type,
                })
                .with_code(format!("{} = {}", target_code, value_code))
                .with_order(root_order)
                .with_location(cx.line, cx.column);
                self.add_node(&mut assign)?;
                self.add_edge(&assign, &target_root, EdgeKind::Ast)?;
                self.add_edge(&assign, &value_root, EdgeKind::Ast)?;
                assoc.record_call_site(
                    unit_id,
                    CallSiteInfo {
                        call: assign.clone(),
                        receiver: None,
                        arguments: vec![(1, target_root), (2, value_root)],
                        is_invoke: false,
                    },
                );
                chain.push(assign.clone());
                Ok(Some(EmittedUnit {
                    chain,
                    root: assign.clone(),
                    exit: UnitExit::FallThrough(assign),
                }))
            }
            UnitKind::If { condition, .. } => {
                let mut chain = Vec::new();
                let (condition_root, condition_code) =
                    self.lower_expr(condition, 1, cx, &mut chain, assoc)?;
                let mut control = Node::new(NodeData::ControlStructure)
                    .with_code("IF")
                    .with_order(root_order)
                    .with_location(cx.line, cx.column);
                self.add_node(&mut control)?;
                self.add_edge(&control, &condition_root, EdgeKind::Ast)?;
                self.add_edge(&control, &condition_root, EdgeKind::Condition)?;
                let mut on_true = Node::new(NodeData::JumpTarget {
                    name: "TRUE".to_string(),
                })
                .with_code(format!("if ({})", condition_code))
                .with_order(2)
                .with_location(cx.line, cx.column);
                self.add_node(&mut on_true)?;
                self.add_edge(&control, &on_true, EdgeKind::Ast)?;
                let mut on_false = Node::new(NodeData::JumpTarget {
                    name: "FALSE".to_string(),
                })
                .with_code(format!("if (!({}))", condition_code))
                .with_order(3)
                .with_location(cx.line, cx.column);
                self.add_node(&mut on_false)?;
                self.add_edge(&control, &on_false, EdgeKind::Ast)?;
                chain.push(control.clone());
                Ok(Some(EmittedUnit {
                    chain,
                    root: control.clone(),
                    exit: UnitExit::Branch {
                        control,
                        on_true,
                        on_false,
                    },
                }))
            }
            UnitKind::Return { value } => {
                let mut chain = Vec::new();
                let mut arguments = Vec::new();
                let mut code = "return".to_string();
                if let Some(operand) = value {
                    let (node, operand_code) =
                        self.lower_operand(operand, 1, 1, cx, &mut chain, assoc)?;
                    code = format!("return {}", operand_code);
                    arguments.push((1, node));
                }
                let mut ret = Node::new(NodeData::Return)
                    .with_code(code)
                    .with_order(root_order)
                    .with_location(cx.line, cx.column);
                self.add_node(&mut ret)?;
                for (_, argument) in &arguments {
                    self.add_edge(&ret, argument, EdgeKind::Ast)?;
                }
                if !arguments.is_empty() {
                    assoc.record_call_site(
                        unit_id,
                        CallSiteInfo {
                            call: ret.clone(),
                            receiver: None,
                            arguments,
                            is_invoke: false,
                        },
                    );
                }
                chain.push(ret.clone());
                Ok(Some(EmittedUnit {
                    chain,
                    root: ret.clone(),
                    exit: UnitExit::Return(ret),
                }))
            }
            UnitKind::Invoke(invoke) => {
                let mut chain = Vec::new();
                let (call, _) = self.lower_invoke(invoke, root_order, cx, &mut chain, assoc)?;
                Ok(Some(EmittedUnit {
                    chain,
                    root: call.clone(),
                    exit: UnitExit::FallThrough(call),
                }))
            }
        }
    }

    /// Lowers an expression, appending its nodes to `chain` in evaluation order.  Returns the
    /// root node and its `code` rendering.
    fn lower_expr(
        &mut self,
        expr: &Expr,
        order: i64,
        cx: UnitCx,
        chain: &mut Vec<Node>,
        assoc: &mut MethodAssociation,
    ) -> Result<(Node, String)> {
        match expr {
            Expr::Operand(operand) => self.lower_operand(operand, order, order, cx, chain, assoc),
            Expr::Binary { op, left, right } => {
                let (left_root, left_code) = self.lower_expr(left, 1, cx, chain, assoc)?;
                let (right_root, right_code) = self.lower_expr(right, 2, cx, chain, assoc)?;
                let mut call = Node::new(NodeData::Call {
                    name: op.as_str().to_string(),
                    method_full_name: format!("<operator>.{}", op.as_str()),
                    signature: DEFAULT_SIGNATURE.to_string(),
                    dispatch_type: DispatchType::StaticDispatch,
                    type_full_name: binary_result_type(*op, left),
                })
                .with_code(format!("{} {} {}", left_code, op.symbol(), right_code))
                .with_order(order)
                .with_argument_index(order)
                .with_location(cx.line, cx.column);
                self.add_node(&mut call)?;
                self.add_edge(&call, &left_root, EdgeKind::Ast)?;
                self.add_edge(&call, &right_root, EdgeKind::Ast)?;
                assoc.record_call_site(
                    cx.unit,
                    CallSiteInfo {
                        call: call.clone(),
                        receiver: None,
                        arguments: vec![(1, left_root), (2, right_root)],
                        is_invoke: false,
                    },
                );
                chain.push(call.clone());
                let code = format!("{} {} {}", left_code, op.symbol(), right_code);
                Ok((call, code))
            }
            Expr::New { type_full_name } => {
                let mut node = Node::new(NodeData::TypeRef {
                    type_full_name: type_full_name.clone(),
                })
                .with_code(format!("new {}", type_full_name))
                .with_order(order)
                .with_argument_index(order)
                .with_location(cx.line, cx.column);
                self.add_node(&mut node)?;
                chain.push(node.clone());
                let code = format!("new {}", type_full_name);
                Ok((node, code))
            }
            Expr::FieldLoad { base, field } => {
                self.lower_field_access(base.as_deref(), field, order, cx, chain, assoc)
            }
            Expr::Invoke(invoke) => self.lower_invoke(invoke, order, cx, chain, assoc),
            Expr::MethodRef { method_full_name } => {
                let mut node = Node::new(NodeData::MethodRef {
                    method_full_name: method_full_name.clone(),
                })
                .with_code(method_full_name.clone())
                .with_order(order)
                .with_argument_index(order)
                .with_location(cx.line, cx.column);
                self.add_node(&mut node)?;
                chain.push(node.clone());
                Ok((node, method_full_name.clone()))
            }
        }
    }

    fn lower_operand(
        &mut self,
        operand: &Operand,
        order: i64,
        argument_index: i64,
        cx: UnitCx,
        chain: &mut Vec<Node>,
        assoc: &mut MethodAssociation,
    ) -> Result<(Node, String)> {
        match operand {
            Operand::Local {
                name,
                type_full_name,
            } => {
                let node =
                    self.lower_local(name, type_full_name, order, argument_index, cx, chain, assoc)?;
                Ok((node, name.clone()))
            }
            Operand::Constant {
                value,
                type_full_name,
            } => {
                let mut node = Node::new(NodeData::Literal {
                    type_full_name: type_full_name.clone(),
                })
                .with_code(value.clone())
                .with_order(order)
                .with_argument_index(argument_index)
                .with_location(cx.line, cx.column);
                self.add_node(&mut node)?;
                chain.push(node.clone());
                Ok((node, value.clone()))
            }
        }
    }

    fn lower_local(
        &mut self,
        name: &str,
        type_full_name: &str,
        order: i64,
        argument_index: i64,
        cx: UnitCx,
        chain: &mut Vec<Node>,
        assoc: &mut MethodAssociation,
    ) -> Result<Node> {
        let mut node = Node::new(NodeData::Identifier {
            name: name.to_string(),
            type_full_name: type_full_name.to_string(),
        })
        .with_code(name)
        .with_order(order)
        .with_argument_index(argument_index)
        .with_location(cx.line, cx.column);
        self.add_node(&mut node)?;
        assoc.record_ident_use(node.clone(), name);
        chain.push(node.clone());
        Ok(node)
    }

    /// Lowers a field access into a `<operator>.fieldAccess` call with the receiver (when the
    /// field is an instance field) and the `FIELD_IDENTIFIER` as its children.
    fn lower_field_access(
        &mut self,
        base: Option<&str>,
        field: &FieldRef,
        order: i64,
        cx: UnitCx,
        chain: &mut Vec<Node>,
        assoc: &mut MethodAssociation,
    ) -> Result<(Node, String)> {
        let mut arguments = Vec::new();
        let qualifier = match base {
            Some(base) => {
                let node =
                    self.lower_local(base, &field.declaring_type, 1, 1, cx, chain, assoc)?;
                arguments.push((1, node));
                base.to_string()
            }
            None => field.declaring_type.clone(),
        };
        let field_order = arguments.len() as i64 + 1;
        let mut field_identifier = Node::new(NodeData::FieldIdentifier {
            canonical_name: field.name.clone(),
        })
        .with_code(field.name.clone())
        .with_order(field_order)
        .with_argument_index(field_order)
        .with_location(cx.line, cx.column);
        self.add_node(&mut field_identifier)?;
        assoc.record_field_use(field_identifier.clone(), &field.name);
        chain.push(field_identifier.clone());
        arguments.push((field_order, field_identifier.clone()));

        let mut call = Node::new(NodeData::Call {
            name: OPERATOR_FIELD_ACCESS.to_string(),
            method_full_name: OPERATOR_FIELD_ACCESS.to_string(),
            signature: DEFAULT_SIGNATURE.to_string(),
            dispatch_type: DispatchType::StaticDispatch,
            type_full_name: field.type_full_name.clone(),
        })
        .with_code(format!("{}.{}", qualifier, field.name))
        .with_order(order)
        .with_argument_index(order)
        .with_location(cx.line, cx.column);
        self.add_node(&mut call)?;
        for (_, argument) in &arguments {
            self.add_edge(&call, argument, EdgeKind::Ast)?;
        }
        assoc.record_call_site(
            cx.unit,
            CallSiteInfo {
                call: call.clone(),
                receiver: None,
                arguments,
                is_invoke: false,
            },
        );
        chain.push(call.clone());
        let code = format!("{}.{}", qualifier, field.name);
        Ok((call, code))
    }

    fn lower_invoke(
        &mut self,
        invoke: &InvokeExpr,
        order: i64,
        cx: UnitCx,
        chain: &mut Vec<Node>,
        assoc: &mut MethodAssociation,
    ) -> Result<(Node, String)> {
        let mut child_order = 1;
        // Receivers keep argument index 0 whatever their sibling order.
        let receiver = match &invoke.receiver {
            Some(operand) => {
                let (node, _) = self.lower_operand(operand, child_order, 0, cx, chain, assoc)?;
                child_order += 1;
                Some(node)
            }
            None => None,
        };
        let mut arguments = Vec::new();
        let mut argument_codes = Vec::new();
        for (position, operand) in invoke.arguments.iter().enumerate() {
            let argument_index = position as i64 + 1;
            let (node, code) =
                self.lower_operand(operand, child_order, argument_index, cx, chain, assoc)?;
            arguments.push((argument_index, node));
            argument_codes.push(code);
            child_order += 1;
        }
        let qualifier = match &invoke.receiver {
            Some(Operand::Local { name, .. }) => name.clone(),
            Some(Operand::Constant { value, .. }) => value.clone(),
            None => invoke.declaring_type.clone(),
        };
        let code = format!("{}.{}({})", qualifier, invoke.name, argument_codes.join(", "));
        let mut call = Node::new(NodeData::Call {
            name: invoke.name.clone(),
            method_full_name: invoke.full_name(),
            signature: invoke.signature.clone(),
            dispatch_type: invoke.dispatch,
            type_full_name: invoke.return_type.clone(),
        })
        .with_code(code.clone())
        .with_order(order)
        .with_argument_index(order)
        .with_location(cx.line, cx.column);
        self.add_node(&mut call)?;
        if let Some(receiver) = &receiver {
            self.add_edge(&call, receiver, EdgeKind::Ast)?;
        }
        for (_, argument) in &arguments {
            self.add_edge(&call, argument, EdgeKind::Ast)?;
        }
        assoc.record_call_site(
            cx.unit,
            CallSiteInfo {
                call: call.clone(),
                receiver,
                arguments,
                is_invoke: true,
            },
        );
        chain.push(call.clone());
        Ok((call, code))
    }
}

/// The modifiers a method head carries, derived from its access flags.
fn modifiers_of(decl: &MethodDecl) -> Vec<ModifierType> {
    let mut modifiers = Vec::new();
    let pairs = [
        (AccessFlags::PUBLIC, ModifierType::Public),
        (AccessFlags::PRIVATE, ModifierType::Private),
        (AccessFlags::PROTECTED, ModifierType::Protected),
        (AccessFlags::STATIC, ModifierType::Static),
        (AccessFlags::FINAL, ModifierType::Final),
        (AccessFlags::ABSTRACT, ModifierType::Abstract),
        (AccessFlags::NATIVE, ModifierType::Native),
    ];
    for (flag, modifier) in &pairs {
        if decl.flags.contains(*flag) {
            modifiers.push(*modifier);
        }
    }
    if decl.name == "<init>" || decl.name == "<clinit>" {
        modifiers.push(ModifierType::Constructor);
    }
    modifiers
}

fn render_method_code(decl: &MethodDecl, graph: &UnitGraph) -> String {
    let parameters = graph
        .parameters()
        .iter()
        .map(|parameter| format!("{} {}", parameter.type_full_name, parameter.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} {}({})", decl.return_type, decl.name, parameters)
}

/// Comparisons evaluate to `boolean`; arithmetic and bitwise operators keep their left operand's
/// type when it is known.
fn binary_result_type(op: BinaryOp, left: &Expr) -> String {
    match op {
        BinaryOp::Gt
        | BinaryOp::Ge
        | BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Eq
        | BinaryOp::Ne
        | BinaryOp::And
        | BinaryOp::Or => "boolean".to_string(),
        _ => match left {
            Expr::Operand(Operand::Local { type_full_name, .. })
            | Expr::Operand(Operand::Constant { type_full_name, .. }) => type_full_name.clone(),
            _ => "int".to_string(),
        },
    }
}
