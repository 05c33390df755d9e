use std::fmt;

use crate::node::NodeId;

/// A structural defect in an AST handed to the analyzer.
///
/// These are internal/driver errors, not semantic diagnostics: a tree that
/// fails validation is rejected before analysis starts.
#[derive(Debug, Clone, PartialEq)]
pub enum AstError {
    /// The tree has no designated root.
    MissingRoot,
    /// The root id points outside the arena.
    DanglingRoot(NodeId),
    /// The root node is not a `Program`.
    RootNotProgram(NodeId),
    /// A node refers to a child outside the arena.
    DanglingChild { parent: NodeId, child: NodeId },
    /// A node is reachable from two parents (or is the root and a child).
    SharedNode(NodeId),
    /// The JSON interchange form could not be decoded.
    Json(String),
}

impl fmt::Display for AstError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoot => write!(f, "AST has no root node"),
            Self::DanglingRoot(id) => write!(f, "root {id} is outside the node arena"),
            Self::RootNotProgram(id) => write!(f, "root {id} is not a program node"),
            Self::DanglingChild { parent, child } => {
                write!(f, "node {parent} refers to missing child {child}")
            }
            Self::SharedNode(id) => write!(f, "node {id} has more than one parent"),
            Self::Json(msg) => write!(f, "invalid AST JSON: {msg}"),
        }
    }
}

impl std::error::Error for AstError {}
