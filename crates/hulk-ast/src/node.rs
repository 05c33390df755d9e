//! Node kinds and their payloads.
//!
//! [`NodeKind`] is a closed sum type: the analyzer matches on it
//! exhaustively, so adding a kind forces every pass to handle it.

use std::fmt;

use hulk_common::Line;
use serde::{Deserialize, Serialize};

/// Index of a node in its [`Ast`](crate::Ast) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub line: Line,
}

/// A function, method or constructor parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    /// Declared type name, if annotated.
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub line: Line,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            annotation: None,
            line: Line::SYNTHETIC,
        }
    }

    pub fn typed(name: impl Into<String>, annotation: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            annotation: Some(annotation.into()),
            line: Line::SYNTHETIC,
        }
    }
}

/// Payload shared by global functions and methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    #[serde(default)]
    pub return_type: Option<String>,
    pub body: NodeId,
}

/// `type Name(params) inherits Parent(args) { attributes; methods }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    /// Constructor parameters. `None` when the declaration has no parameter
    /// list at all, in which case the parent's parameters are inherited.
    #[serde(default)]
    pub params: Option<Vec<Param>>,
    #[serde(default)]
    pub parent: Option<String>,
    /// Arguments forwarded to the parent constructor.
    #[serde(default)]
    pub parent_args: Option<Vec<NodeId>>,
    /// `AttributeDecl` nodes.
    #[serde(default)]
    pub attributes: Vec<NodeId>,
    /// `MethodDecl` nodes.
    #[serde(default)]
    pub methods: Vec<NodeId>,
}

/// One `if`/`elif` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub cond: NodeId,
    pub body: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    /// `@`
    Concat,
    /// `@@`
    ConcatSpace,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Neq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Concat => "@",
            BinaryOp::ConcatSpace => "@@",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Top-level declarations followed by the program expression(s).
    Program { items: Vec<NodeId> },
    FunctionDecl(FunctionDecl),
    TypeDecl(TypeDecl),
    /// `name: T = init;` inside a type body.
    AttributeDecl {
        name: String,
        #[serde(default)]
        annotation: Option<String>,
        init: NodeId,
    },
    MethodDecl(FunctionDecl),
    /// `{ e1; e2; ... }`, may also hold function and type declarations.
    Block { exprs: Vec<NodeId> },
    /// `let b1, b2 in body`; each binding is a `VarDecl` scoping over the
    /// following bindings and the body.
    Let { bindings: Vec<NodeId>, body: NodeId },
    VarDecl {
        name: String,
        #[serde(default)]
        annotation: Option<String>,
        init: NodeId,
    },
    /// Destructive assignment `name := value`.
    Assign { name: String, value: NodeId },
    If { branches: Vec<Branch>, otherwise: NodeId },
    While { cond: NodeId, body: NodeId },
    Binary { op: BinaryOp, left: NodeId, right: NodeId },
    Unary { op: UnaryOp, operand: NodeId },
    Call { name: String, args: Vec<NodeId> },
    MethodCall {
        receiver: NodeId,
        name: String,
        args: Vec<NodeId>,
    },
    AttrGet { receiver: NodeId, name: String },
    AttrSet {
        receiver: NodeId,
        name: String,
        value: NodeId,
    },
    New { type_name: String, args: Vec<NodeId> },
    /// `base(args)` inside a method.
    Base { args: Vec<NodeId> },
    #[serde(rename = "self")]
    SelfRef,
    Var { name: String },
    Number { value: f64 },
    Str { value: String },
    Bool { value: bool },
    Is { expr: NodeId, type_name: String },
    As { expr: NodeId, type_name: String },
}

impl NodeKind {
    /// Direct children in source order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Program { items } => items.clone(),
            NodeKind::FunctionDecl(f) | NodeKind::MethodDecl(f) => vec![f.body],
            NodeKind::TypeDecl(t) => {
                let mut out = t.parent_args.clone().unwrap_or_default();
                out.extend(t.attributes.iter().copied());
                out.extend(t.methods.iter().copied());
                out
            }
            NodeKind::AttributeDecl { init, .. } | NodeKind::VarDecl { init, .. } => vec![*init],
            NodeKind::Block { exprs } => exprs.clone(),
            NodeKind::Let { bindings, body } => {
                let mut out = bindings.clone();
                out.push(*body);
                out
            }
            NodeKind::Assign { value, .. } => vec![*value],
            NodeKind::If {
                branches,
                otherwise,
            } => {
                let mut out = Vec::with_capacity(branches.len() * 2 + 1);
                for b in branches {
                    out.push(b.cond);
                    out.push(b.body);
                }
                out.push(*otherwise);
                out
            }
            NodeKind::While { cond, body } => vec![*cond, *body],
            NodeKind::Binary { left, right, .. } => vec![*left, *right],
            NodeKind::Unary { operand, .. } => vec![*operand],
            NodeKind::Call { args, .. } | NodeKind::New { args, .. } | NodeKind::Base { args } => {
                args.clone()
            }
            NodeKind::MethodCall { receiver, args, .. } => {
                let mut out = vec![*receiver];
                out.extend(args.iter().copied());
                out
            }
            NodeKind::AttrGet { receiver, .. } => vec![*receiver],
            NodeKind::AttrSet {
                receiver, value, ..
            } => vec![*receiver, *value],
            NodeKind::Is { expr, .. } | NodeKind::As { expr, .. } => vec![*expr],
            NodeKind::SelfRef
            | NodeKind::Var { .. }
            | NodeKind::Number { .. }
            | NodeKind::Str { .. }
            | NodeKind::Bool { .. } => Vec::new(),
        }
    }

    /// Short human-readable name of the kind, used in diagnostics and logs.
    pub fn describe(&self) -> &'static str {
        match self {
            NodeKind::Program { .. } => "program",
            NodeKind::FunctionDecl(_) => "function declaration",
            NodeKind::TypeDecl(_) => "type declaration",
            NodeKind::AttributeDecl { .. } => "attribute",
            NodeKind::MethodDecl(_) => "method",
            NodeKind::Block { .. } => "block",
            NodeKind::Let { .. } => "let expression",
            NodeKind::VarDecl { .. } => "variable declaration",
            NodeKind::Assign { .. } => "assignment",
            NodeKind::If { .. } => "conditional",
            NodeKind::While { .. } => "while loop",
            NodeKind::Binary { .. } => "binary operation",
            NodeKind::Unary { .. } => "unary operation",
            NodeKind::Call { .. } => "function call",
            NodeKind::MethodCall { .. } => "method call",
            NodeKind::AttrGet { .. } => "attribute access",
            NodeKind::AttrSet { .. } => "attribute assignment",
            NodeKind::New { .. } => "instantiation",
            NodeKind::Base { .. } => "base call",
            NodeKind::SelfRef => "self",
            NodeKind::Var { .. } => "variable",
            NodeKind::Number { .. } => "number literal",
            NodeKind::Str { .. } => "string literal",
            NodeKind::Bool { .. } => "boolean literal",
            NodeKind::Is { .. } => "type test",
            NodeKind::As { .. } => "downcast",
        }
    }

    /// Whether this node is a declaration hoisted into its block's context.
    pub fn is_declaration(&self) -> bool {
        matches!(self, NodeKind::FunctionDecl(_) | NodeKind::TypeDecl(_))
    }
}
