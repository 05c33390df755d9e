//! Arena AST for HULK programs.
//!
//! The parser is an external collaborator: it produces a tree of [`Node`]s
//! stored in an [`Ast`] arena and addressed by [`NodeId`]. Each node carries
//! its kind-specific payload and the source [`Line`] it came from. The
//! analyzer never mutates the tree; its per-node results live in side tables
//! indexed by `NodeId`.
//!
//! Trees can be built programmatically with [`AstBuilder`] or loaded from
//! the JSON interchange form with [`Ast::from_json`].

pub mod builder;
pub mod error;
pub mod node;

use serde::{Deserialize, Serialize};

pub use builder::AstBuilder;
pub use error::AstError;
pub use hulk_common::Line;
pub use node::{BinaryOp, Branch, FunctionDecl, Node, NodeId, NodeKind, Param, TypeDecl, UnaryOp};

/// An arena of AST nodes with a designated `Program` root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its id.
    pub fn push(&mut self, kind: NodeKind, line: Line) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, line });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn line(&self, id: NodeId) -> Line {
        self.node(id).line
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// Iterate over all node ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Direct children of a node, in source order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.kind(id).children()
    }

    /// Check the structural invariants the analyzer relies on.
    ///
    /// The root must exist and be a `Program`, every child id must point
    /// into the arena, and no node may have two parents.
    pub fn validate(&self) -> Result<(), AstError> {
        let root = self.root.ok_or(AstError::MissingRoot)?;
        if root.index() >= self.nodes.len() {
            return Err(AstError::DanglingRoot(root));
        }
        if !matches!(self.kind(root), NodeKind::Program { .. }) {
            return Err(AstError::RootNotProgram(root));
        }
        let mut parent_of: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        for id in self.ids() {
            for child in self.children(id) {
                if child.index() >= self.nodes.len() {
                    return Err(AstError::DanglingChild { parent: id, child });
                }
                if child == root {
                    return Err(AstError::SharedNode(child));
                }
                if parent_of[child.index()].replace(id).is_some() {
                    return Err(AstError::SharedNode(child));
                }
            }
        }
        Ok(())
    }

    /// Load a tree from its JSON interchange form and validate it.
    pub fn from_json(text: &str) -> Result<Self, AstError> {
        let ast: Ast = serde_json::from_str(text).map_err(|e| AstError::Json(e.to_string()))?;
        ast.validate()?;
        Ok(ast)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("AST serialization cannot fail")
    }
}
