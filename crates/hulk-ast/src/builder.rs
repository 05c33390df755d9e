//! Programmatic construction of ASTs.
//!
//! Drivers without a parser (tests, tools feeding synthetic programs) use
//! [`AstBuilder`] to allocate nodes bottom-up, the same order a parser
//! produces them. Every node is stamped with the builder's current line,
//! which [`AstBuilder::at`] moves forward.

use hulk_common::Line;

use crate::node::{BinaryOp, Branch, FunctionDecl, NodeId, NodeKind, Param, TypeDecl, UnaryOp};
use crate::Ast;

pub struct AstBuilder {
    ast: Ast,
    line: Line,
}

impl AstBuilder {
    pub fn new() -> Self {
        AstBuilder {
            ast: Ast::new(),
            line: Line(1),
        }
    }

    /// Stamp subsequently created nodes with `line`.
    pub fn at(&mut self, line: u32) -> &mut Self {
        self.line = Line(line);
        self
    }

    pub fn push(&mut self, kind: NodeKind) -> NodeId {
        self.ast.push(kind, self.line)
    }

    /// Wrap `items` in a `Program` root and return the finished tree.
    pub fn finish(mut self, items: Vec<NodeId>) -> Ast {
        let root = self.push(NodeKind::Program { items });
        self.ast.set_root(root);
        self.ast
    }

    // ── Literals and names ──────────────────────────────────────────────

    pub fn number(&mut self, value: f64) -> NodeId {
        self.push(NodeKind::Number { value })
    }

    pub fn string(&mut self, value: impl Into<String>) -> NodeId {
        self.push(NodeKind::Str {
            value: value.into(),
        })
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.push(NodeKind::Bool { value })
    }

    pub fn var(&mut self, name: impl Into<String>) -> NodeId {
        self.push(NodeKind::Var { name: name.into() })
    }

    pub fn self_ref(&mut self) -> NodeId {
        self.push(NodeKind::SelfRef)
    }

    // ── Operators ───────────────────────────────────────────────────────

    pub fn binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        self.push(NodeKind::Binary { op, left, right })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> NodeId {
        self.push(NodeKind::Unary { op, operand })
    }

    pub fn is_type(&mut self, expr: NodeId, type_name: impl Into<String>) -> NodeId {
        self.push(NodeKind::Is {
            expr,
            type_name: type_name.into(),
        })
    }

    pub fn as_type(&mut self, expr: NodeId, type_name: impl Into<String>) -> NodeId {
        self.push(NodeKind::As {
            expr,
            type_name: type_name.into(),
        })
    }

    // ── Control flow and bindings ───────────────────────────────────────

    pub fn block(&mut self, exprs: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Block { exprs })
    }

    pub fn var_decl(
        &mut self,
        name: impl Into<String>,
        annotation: Option<&str>,
        init: NodeId,
    ) -> NodeId {
        self.push(NodeKind::VarDecl {
            name: name.into(),
            annotation: annotation.map(str::to_string),
            init,
        })
    }

    pub fn let_in(&mut self, bindings: Vec<NodeId>, body: NodeId) -> NodeId {
        self.push(NodeKind::Let { bindings, body })
    }

    pub fn assign(&mut self, name: impl Into<String>, value: NodeId) -> NodeId {
        self.push(NodeKind::Assign {
            name: name.into(),
            value,
        })
    }

    /// `if (c1) b1 elif (c2) b2 ... else otherwise`
    pub fn if_else(&mut self, arms: Vec<(NodeId, NodeId)>, otherwise: NodeId) -> NodeId {
        let branches = arms
            .into_iter()
            .map(|(cond, body)| Branch { cond, body })
            .collect();
        self.push(NodeKind::If {
            branches,
            otherwise,
        })
    }

    pub fn while_loop(&mut self, cond: NodeId, body: NodeId) -> NodeId {
        self.push(NodeKind::While { cond, body })
    }

    // ── Calls ───────────────────────────────────────────────────────────

    pub fn call(&mut self, name: impl Into<String>, args: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Call {
            name: name.into(),
            args,
        })
    }

    pub fn method_call(
        &mut self,
        receiver: NodeId,
        name: impl Into<String>,
        args: Vec<NodeId>,
    ) -> NodeId {
        self.push(NodeKind::MethodCall {
            receiver,
            name: name.into(),
            args,
        })
    }

    pub fn attr_get(&mut self, receiver: NodeId, name: impl Into<String>) -> NodeId {
        self.push(NodeKind::AttrGet {
            receiver,
            name: name.into(),
        })
    }

    pub fn attr_set(&mut self, receiver: NodeId, name: impl Into<String>, value: NodeId) -> NodeId {
        self.push(NodeKind::AttrSet {
            receiver,
            name: name.into(),
            value,
        })
    }

    pub fn new_instance(&mut self, type_name: impl Into<String>, args: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::New {
            type_name: type_name.into(),
            args,
        })
    }

    pub fn base(&mut self, args: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Base { args })
    }

    // ── Declarations ────────────────────────────────────────────────────

    pub fn function(
        &mut self,
        name: impl Into<String>,
        params: Vec<Param>,
        return_type: Option<&str>,
        body: NodeId,
    ) -> NodeId {
        let decl = self.function_payload(name, params, return_type, body);
        self.push(NodeKind::FunctionDecl(decl))
    }

    pub fn method(
        &mut self,
        name: impl Into<String>,
        params: Vec<Param>,
        return_type: Option<&str>,
        body: NodeId,
    ) -> NodeId {
        let decl = self.function_payload(name, params, return_type, body);
        self.push(NodeKind::MethodDecl(decl))
    }

    pub fn attribute(
        &mut self,
        name: impl Into<String>,
        annotation: Option<&str>,
        init: NodeId,
    ) -> NodeId {
        self.push(NodeKind::AttributeDecl {
            name: name.into(),
            annotation: annotation.map(str::to_string),
            init,
        })
    }

    pub fn type_decl(&mut self, decl: TypeDecl) -> NodeId {
        self.push(NodeKind::TypeDecl(decl))
    }

    /// Stamp a parameter with the current line.
    pub fn param(&self, mut param: Param) -> Param {
        param.line = self.line;
        param
    }

    fn function_payload(
        &self,
        name: impl Into<String>,
        params: Vec<Param>,
        return_type: Option<&str>,
        body: NodeId,
    ) -> FunctionDecl {
        let params = params
            .into_iter()
            .map(|p| {
                if p.line.is_synthetic() {
                    self.param(p)
                } else {
                    p
                }
            })
            .collect();
        FunctionDecl {
            name: name.into(),
            params,
            return_type: return_type.map(str::to_string),
            body,
        }
    }
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}
