// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2022, code-property-graphs authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

use code_property_graphs::drivers::Driver;
use code_property_graphs::nodes::Node;
use code_property_graphs::nodes::NodeData;
use code_property_graphs::schema::DispatchType;
use code_property_graphs::schema::EdgeKind;
use code_property_graphs::schema::EvaluationStrategy;

pub const SAMPLE_FULL_NAME: &str = "Sample.inc";
pub const SAMPLE_SIGNATURE: &str = "int(int)";

/// The handles of a hand-built method CPG for `int Sample.inc(int x) { int y; y = x + 1;
/// return y; }`, wired with AST, CFG, REF, and ARGUMENT edges the way the extraction builders
/// would emit them.
pub struct SampleMethod {
    pub file: Node,
    pub method: Node,
    pub parameter: Node,
    pub block: Node,
    pub method_return: Node,
    pub local: Node,
    pub assign: Node,
    pub add: Node,
    pub ident_x: Node,
    pub ident_y: Node,
    pub literal: Node,
    pub ret: Node,
}

pub fn file_node(name: &str, hash: &str) -> Node {
    Node::new(NodeData::File {
        name: name.to_string(),
        hash: Some(hash.to_string()),
    })
}

pub fn method_node(full_name: &str, signature: &str) -> Node {
    let name = full_name.rsplit('.').next().unwrap().to_string();
    Node::new(NodeData::Method {
        name,
        full_name: full_name.to_string(),
        signature: signature.to_string(),
        file_name: "Sample.class".to_string(),
        ast_parent_full_name: "Sample".to_string(),
        ast_parent_type: "TYPE_DECL".to_string(),
    })
}

pub fn call_node(name: &str) -> Node {
    Node::new(NodeData::Call {
        name: name.to_string(),
        method_full_name: format!("<operator>.{}", name),
        signature: "()".to_string(),
        dispatch_type: DispatchType::StaticDispatch,
        type_full_name: "int".to_string(),
    })
}

fn edge<D: Driver + ?Sized>(driver: &mut D, source: &Node, target: &Node, kind: EdgeKind) {
    let mut source = source.clone();
    let mut target = target.clone();
    driver.add_edge(&mut source, &mut target, kind).unwrap();
}

pub fn build_sample_method<D: Driver + ?Sized>(driver: &mut D) -> SampleMethod {
    let mut file = file_node("Sample.class", "cafebabe");
    driver.add_vertex(&mut file).unwrap();

    let mut method = method_node(SAMPLE_FULL_NAME, SAMPLE_SIGNATURE).with_code("int inc(int x)");
    driver.add_vertex(&mut method).unwrap();
    edge(driver, &method, &file, EdgeKind::SourceFile);

    let mut parameter = Node::new(NodeData::MethodParameterIn {
        name: "x".to_string(),
        type_full_name: "int".to_string(),
        evaluation_strategy: EvaluationStrategy::ByValue,
    })
    .with_code("int x")
    .with_order(1)
    .with_argument_index(1);
    driver.add_vertex(&mut parameter).unwrap();
    edge(driver, &method, &parameter, EdgeKind::Ast);

    let mut block = Node::new(NodeData::Block {
        type_full_name: "void".to_string(),
    })
    .with_order(2)
    .with_argument_index(0);
    driver.add_vertex(&mut block).unwrap();
    edge(driver, &method, &block, EdgeKind::Ast);

    let mut method_return = Node::new(NodeData::MethodReturn {
        type_full_name: "int".to_string(),
        evaluation_strategy: EvaluationStrategy::ByReference,
    })
    .with_code("RETURN")
    .with_order(3);
    driver.add_vertex(&mut method_return).unwrap();
    edge(driver, &method, &method_return, EdgeKind::Ast);

    let mut local = Node::new(NodeData::Local {
        name: "y".to_string(),
        type_full_name: "int".to_string(),
    })
    .with_code("int y")
    .with_order(1);
    driver.add_vertex(&mut local).unwrap();
    edge(driver, &block, &local, EdgeKind::Ast);

    // y = x + 1
    let mut ident_x = Node::new(NodeData::Identifier {
        name: "x".to_string(),
        type_full_name: "int".to_string(),
    })
    .with_code("x")
    .with_order(1)
    .with_argument_index(1);
    driver.add_vertex(&mut ident_x).unwrap();
    let mut literal = Node::new(NodeData::Literal {
        type_full_name: "int".to_string(),
    })
    .with_code("1")
    .with_order(2)
    .with_argument_index(2);
    driver.add_vertex(&mut literal).unwrap();
    let mut add = call_node("ADD")
        .with_code("x + 1")
        .with_order(2)
        .with_argument_index(2);
    driver.add_vertex(&mut add).unwrap();
    let mut ident_y = Node::new(NodeData::Identifier {
        name: "y".to_string(),
        type_full_name: "int".to_string(),
    })
    .with_code("y")
    .with_order(1)
    .with_argument_index(1);
    driver.add_vertex(&mut ident_y).unwrap();
    let mut assign = call_node("<operator>.assignment")
        .with_code("y = x + 1")
        .with_order(2);
    driver.add_vertex(&mut assign).unwrap();
    let mut ret = Node::new(NodeData::Return)
        .with_code("return y")
        .with_order(3);
    driver.add_vertex(&mut ret).unwrap();

    edge(driver, &block, &assign, EdgeKind::Ast);
    edge(driver, &block, &ret, EdgeKind::Ast);
    edge(driver, &assign, &ident_y, EdgeKind::Ast);
    edge(driver, &assign, &add, EdgeKind::Ast);
    edge(driver, &add, &ident_x, EdgeKind::Ast);
    edge(driver, &add, &literal, EdgeKind::Ast);

    edge(driver, &block, &ident_x, EdgeKind::Cfg);
    edge(driver, &ident_x, &literal, EdgeKind::Cfg);
    edge(driver, &literal, &add, EdgeKind::Cfg);
    edge(driver, &add, &ident_y, EdgeKind::Cfg);
    edge(driver, &ident_y, &assign, EdgeKind::Cfg);
    edge(driver, &assign, &ret, EdgeKind::Cfg);
    edge(driver, &ret, &method_return, EdgeKind::Cfg);

    edge(driver, &ident_x, &parameter, EdgeKind::Ref);
    edge(driver, &ident_y, &local, EdgeKind::Ref);
    edge(driver, &add, &ident_x, EdgeKind::Argument);
    edge(driver, &add, &literal, EdgeKind::Argument);
    edge(driver, &assign, &ident_y, EdgeKind::Argument);
    edge(driver, &assign, &add, EdgeKind::Argument);

    SampleMethod {
        file,
        method,
        parameter,
        block,
        method_return,
        local,
        assign,
        add,
        ident_x,
        ident_y,
        literal,
        ret,
    }
}
