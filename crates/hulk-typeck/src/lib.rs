//! HULK semantic analyzer: scopes, hoisted contexts and use-site type
//! inference.
//!
//! The analyzer walks an [`Ast`] once, depth-first, and assigns every node a
//! type. Parameters and variables without annotations start as `Any` and
//! are resolved from how they are used; earlier uses are repaired when a
//! later use settles the type. Everything that cannot be typed consistently
//! produces a [`TypeError`]; analysis never stops at the first error.
//!
//! # Architecture
//!
//! - [`ty`]: type table, inheritance tree queries
//! - [`builtins`]: operator rule table, built-in functions and constants
//! - [`scope`]: lexical symbol tables
//! - [`context`]: hoisted declarations and per-type member namespaces
//! - [`unify`]: resolving `Any` from usage evidence
//! - [`infer`]: the analysis session and expression visitor
//! - [`decl`]: function, method and type declaration checking
//! - [`error`], [`diagnostics`]: error taxonomy and rendering

pub mod builtins;
pub mod context;
pub mod decl;
pub mod diagnostics;
pub mod error;
pub mod infer;
pub mod scope;
pub mod ty;
pub mod unify;

use hulk_ast::{Ast, NodeId};
use rustc_hash::FxHashMap;

use crate::builtins::OperatorTable;
use crate::diagnostics::DiagnosticOptions;
use crate::error::TypeError;
use crate::scope::{Symbol, SymbolId};
use crate::ty::{TypeId, TypeTable};

/// What a name-bearing node resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    /// Variable, parameter, constant or `self`.
    Variable(SymbolId),
    /// A function; `decl` is `None` for built-ins.
    Function { name: String, decl: Option<NodeId> },
    /// The type named by `new T(..)`, `is T` or `as T`.
    Type(TypeId),
    /// The `AttributeDecl` an attribute access resolved to.
    Attribute(NodeId),
    /// The `MethodDecl` a method or `base` call resolved to.
    Method(NodeId),
}

/// Configuration for one analysis run.
#[derive(Clone, Debug, Default)]
pub struct CheckOptions {
    pub rules: OperatorTable,
}

/// The result of analyzing a HULK program.
pub struct TypeckResult {
    /// Type of every node, indexed by `NodeId`.
    pub types: Vec<TypeId>,
    /// Every type known to the run, built-ins first.
    pub table: TypeTable,
    /// Every variable, parameter and constant declared during the run.
    pub symbols: Vec<Symbol>,
    /// Resolution of every variable reference, call, member access and
    /// type reference.
    pub bindings: FxHashMap<NodeId, Binding>,
    pub errors: Vec<TypeError>,
    /// Type of the program's last expression; `None` without a root.
    pub result_type: Option<TypeId>,
}

impl TypeckResult {
    pub fn type_of(&self, node: NodeId) -> TypeId {
        self.types.get(node.index()).copied().unwrap_or(TypeId::ERROR)
    }

    pub fn type_name(&self, node: NodeId) -> &str {
        self.table.name(self.type_of(node))
    }

    /// Name of the type of the first user-declared symbol called `name`.
    pub fn symbol_type(&self, name: &str) -> Option<&str> {
        self.symbols
            .iter()
            .find(|s| s.name == name && s.origin.is_some())
            .map(|s| self.table.name(s.ty))
    }

    pub fn result_type_name(&self) -> Option<&str> {
        self.result_type.map(|t| self.table.name(t))
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Render every error with [`diagnostics::render_diagnostic`].
    pub fn render_errors(&self, source: Option<&str>, filename: &str, options: &DiagnosticOptions) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| diagnostics::render_diagnostic(e, source, filename, options))
            .collect()
    }
}

/// Analyze a program with the standard operator table.
///
/// The tree must satisfy [`Ast::validate`].
pub fn check(ast: &Ast) -> TypeckResult {
    check_with(ast, &CheckOptions::default())
}

pub fn check_with(ast: &Ast, options: &CheckOptions) -> TypeckResult {
    let _span = tracing::debug_span!("typeck", nodes = ast.len()).entered();
    infer::Session::new(ast, &options.rules).run()
}

/// Analyze a program and return the number of diagnostics produced.
pub fn analyze(ast: &Ast) -> usize {
    check(ast).errors.len()
}
