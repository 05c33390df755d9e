//! The analysis session and the expression visitor.
//!
//! A [`Session`] owns all mutable state of one run: the type table, the
//! scope and context arenas, per-node side tables and the collected errors.
//! [`Session::visit`] is an exhaustive match over node kinds. Children are
//! visited first, then the node's own rule runs: operands still `Any` are
//! handed to the unification engine before any compatibility check.

use hulk_ast::{Ast, Branch, Line, NodeId, NodeKind};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::builtins::{builtin_functions, Operator, OperatorTable, BUILTIN_CONSTANTS, BUILTIN_TYPES};
use crate::context::{ContextArena, ContextId, ContextItem, ItemId, ItemKind};
use crate::decl::TypeRef;
use crate::error::{NameKind, Operand, TypeError};
use crate::scope::{FunctionSig, ScopeArena, ScopeId, SymbolId};
use crate::ty::{TypeId, TypeTable};
use crate::{Binding, TypeckResult};

/// Resolved signature of a call target.
#[derive(Clone, Debug)]
pub(crate) struct Callee {
    pub(crate) params: Vec<TypeId>,
    pub(crate) ret: TypeId,
    /// Context item backing a user-declared callee.
    pub(crate) item: Option<ItemId>,
    pub(crate) decl: Option<NodeId>,
}

pub(crate) struct Session<'a> {
    pub(crate) ast: &'a Ast,
    pub(crate) rules: &'a OperatorTable,
    pub(crate) types: TypeTable,
    pub(crate) scopes: ScopeArena,
    pub(crate) contexts: ContextArena,
    pub(crate) errors: Vec<TypeError>,
    /// Per node: its type, `Any` until known.
    pub(crate) node_types: Vec<TypeId>,
    /// Per node: consumers to recompute once the node's type is known.
    pub(crate) dependents: Vec<Vec<NodeId>>,
    pub(crate) bindings: FxHashMap<NodeId, Binding>,
    /// `VarDecl` node -> declared symbol.
    pub(crate) decl_symbols: FxHashMap<NodeId, SymbolId>,
    /// Function, type, attribute or method declaration -> context item.
    pub(crate) decl_items: FxHashMap<NodeId, ItemId>,
    /// Declarations rejected as duplicates; checked but never registered.
    pub(crate) duplicates: FxHashSet<NodeId>,
    /// Function or method declaration -> parameter symbols.
    pub(crate) callable_params: FxHashMap<NodeId, Vec<SymbolId>>,
    /// Type declaration -> its allocated type.
    pub(crate) type_ids: FxHashMap<NodeId, TypeId>,
    /// Constructor parameter symbols of each user type.
    pub(crate) ctor_params: FxHashMap<TypeId, Vec<SymbolId>>,
    /// Names of type declarations being checked, innermost last.
    pub(crate) in_progress: Vec<String>,
    /// Enclosing methods as (owner type, method name), innermost last.
    pub(crate) method_frames: Vec<(TypeId, String)>,
    root_scope: ScopeId,
    root_context: ContextId,
}

impl<'a> Session<'a> {
    pub(crate) fn new(ast: &'a Ast, rules: &'a OperatorTable) -> Self {
        let mut scopes = ScopeArena::new();
        let root_scope = scopes.create(None);
        for &(name, ty) in BUILTIN_TYPES {
            scopes.declare_type(root_scope, name, ty);
        }
        for f in builtin_functions() {
            let sig = FunctionSig {
                name: f.name.to_string(),
                params: f.params,
                ret: f.ret,
                decl: None,
            };
            let registered = scopes.declare_function(root_scope, sig);
            debug_assert!(registered.is_ok(), "duplicate built-in {}", f.name);
        }
        for &(name, ty) in BUILTIN_CONSTANTS {
            let sym = scopes.declare(root_scope, name, ty, false, None);
            scopes.symbol_mut(sym).annotated = true;
        }
        let mut contexts = ContextArena::new();
        let root_context = contexts.create(None);

        Session {
            ast,
            rules,
            types: TypeTable::new(),
            scopes,
            contexts,
            errors: Vec::new(),
            node_types: vec![TypeId::ANY; ast.len()],
            dependents: vec![Vec::new(); ast.len()],
            bindings: FxHashMap::default(),
            decl_symbols: FxHashMap::default(),
            decl_items: FxHashMap::default(),
            duplicates: FxHashSet::default(),
            callable_params: FxHashMap::default(),
            type_ids: FxHashMap::default(),
            ctor_params: FxHashMap::default(),
            in_progress: Vec::new(),
            method_frames: Vec::new(),
            root_scope,
            root_context,
        }
    }

    pub(crate) fn run(mut self) -> TypeckResult {
        let root = self.ast.root();
        if let Some(root) = root {
            self.visit(root, self.root_scope, self.root_context);
            self.sweep(root);
        }
        tracing::debug!(errors = self.errors.len(), "semantic analysis finished");
        TypeckResult {
            result_type: root.map(|r| self.node_types[r.index()]),
            types: self.node_types,
            symbols: self.scopes.symbols().to_vec(),
            table: self.types,
            bindings: self.bindings,
            errors: self.errors,
        }
    }

    pub(crate) fn error(&mut self, err: TypeError) {
        tracing::debug!(line = %err.line(), "{}", err);
        self.errors.push(err);
    }

    pub(crate) fn type_name(&self, ty: TypeId) -> String {
        self.types.name(ty).to_string()
    }

    pub(crate) fn operand(&self, ty: TypeId) -> Operand {
        if ty.is_any() {
            Operand::Uninferred
        } else {
            Operand::Typed(self.type_name(ty))
        }
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    /// Type `node` in `scope`/`ctx`, record the result and return it.
    pub(crate) fn visit(&mut self, node: NodeId, scope: ScopeId, ctx: ContextId) -> TypeId {
        let ast = self.ast;
        let ty = match ast.kind(node) {
            NodeKind::Program { items } | NodeKind::Block { exprs: items } => {
                let inner_scope = self.scopes.create(Some(scope));
                let inner_ctx = self.contexts.create(Some(ctx));
                self.visit_sequence(node, items, inner_scope, inner_ctx)
            }
            NodeKind::FunctionDecl(_) => {
                let item = self.hoisted_item(node, scope, ctx);
                self.check_callable(item);
                self.contexts.item(item).return_type
            }
            NodeKind::TypeDecl(_) => {
                let item = self.hoisted_item(node, scope, ctx);
                self.check_type(item, ast.line(node), TypeRef::Annotation)
                    .unwrap_or(TypeId::ERROR)
            }
            // Members are checked with their type declaration.
            NodeKind::AttributeDecl { .. } | NodeKind::MethodDecl(_) => self.type_of(node),
            NodeKind::Let { bindings, body } => {
                let mut inner = scope;
                for &binding in bindings {
                    inner = self.declare_variable(binding, inner, ctx);
                }
                let ty = self.visit(*body, inner, ctx);
                self.pass_through(node, *body, ty)
            }
            NodeKind::VarDecl { .. } => {
                self.declare_variable(node, scope, ctx);
                self.type_of(node)
            }
            NodeKind::Assign { name, value } => self.visit_assign(node, name, *value, scope, ctx),
            NodeKind::If {
                branches,
                otherwise,
            } => self.visit_if(node, branches, *otherwise, scope, ctx),
            NodeKind::While { cond, body } => {
                self.visit_condition(*cond, scope, ctx);
                let ty = self.visit(*body, scope, ctx);
                self.pass_through(node, *body, ty)
            }
            NodeKind::Binary { op, left, right } => {
                self.visit(*left, scope, ctx);
                self.visit(*right, scope, ctx);
                self.check_operator(node, Operator::Binary(*op), *left, Some(*right))
            }
            NodeKind::Unary { op, operand } => {
                self.visit(*operand, scope, ctx);
                self.check_operator(node, Operator::Unary(*op), *operand, None)
            }
            NodeKind::Call { name, args } => self.visit_call(node, name, args, scope, ctx),
            NodeKind::MethodCall {
                receiver,
                name,
                args,
            } => self.visit_method_call(node, *receiver, name, args, scope, ctx),
            NodeKind::Base { args } => self.visit_base(node, args, scope, ctx),
            NodeKind::AttrGet { receiver, name } => self.visit_attr_get(node, *receiver, name, scope, ctx),
            NodeKind::AttrSet {
                receiver,
                name,
                value,
            } => self.visit_attr_set(node, *receiver, name, *value, scope, ctx),
            NodeKind::New { type_name, args } => self.visit_new(node, type_name, args, scope, ctx),
            NodeKind::SelfRef => match self.scopes.find(scope, "self") {
                Some(sym) => self.read_symbol(node, sym),
                None => {
                    self.error(TypeError::IllegalKeyword {
                        keyword: "self",
                        reason: "it is only available inside methods",
                        line: ast.line(node),
                    });
                    TypeId::ERROR
                }
            },
            NodeKind::Var { name } => match self.scopes.find(scope, name) {
                Some(sym) => self.read_symbol(node, sym),
                None => {
                    self.error(TypeError::Undefined {
                        kind: NameKind::Variable,
                        name: name.clone(),
                        line: ast.line(node),
                    });
                    TypeId::ERROR
                }
            },
            NodeKind::Number { .. } => TypeId::NUMBER,
            NodeKind::Str { .. } => TypeId::STRING,
            NodeKind::Bool { .. } => TypeId::BOOLEAN,
            NodeKind::Is { expr, type_name } => {
                self.visit(*expr, scope, ctx);
                let ty = self.resolve_annotation(type_name, scope, ctx, ast.line(node));
                if ty.is_concrete() {
                    self.bindings.insert(node, Binding::Type(ty));
                }
                TypeId::BOOLEAN
            }
            NodeKind::As { expr, type_name } => self.visit_as(node, *expr, type_name, scope, ctx),
        };
        self.node_types[node.index()] = ty;
        ty
    }

    /// A program or block: hoist its declarations, then visit in order. The
    /// value is the last non-declaration item, or `Void` if there is none.
    fn visit_sequence(&mut self, node: NodeId, items: &[NodeId], scope: ScopeId, ctx: ContextId) -> TypeId {
        self.hoist(items, scope, ctx);
        let mut last = None;
        for &item in items {
            let ty = self.visit(item, scope, ctx);
            if !self.ast.kind(item).is_declaration() {
                last = Some((item, ty));
            }
        }
        match last {
            Some((item, ty)) => self.pass_through(node, item, ty),
            None => TypeId::VOID,
        }
    }

    /// `node` takes `inner`'s type; wait for it while `inner` is `Any`.
    fn pass_through(&mut self, node: NodeId, inner: NodeId, ty: TypeId) -> TypeId {
        if ty.is_any() {
            self.depend(node, inner);
        }
        ty
    }

    /// Register every function and type declaration of a block in `ctx`.
    pub(crate) fn hoist(&mut self, items: &[NodeId], scope: ScopeId, ctx: ContextId) {
        let ast = self.ast;
        for &item in items {
            let (kind, name, arity) = match ast.kind(item) {
                NodeKind::FunctionDecl(f) => (ItemKind::Function, &f.name, f.params.len()),
                NodeKind::TypeDecl(t) => (ItemKind::Type, &t.name, 0),
                _ => continue,
            };
            let entry = ContextItem::new(kind, name, item, scope, ctx).with_arity(arity);
            let id = match self.contexts.declare_item(ctx, entry.clone()) {
                Ok(id) => id,
                Err(_) => {
                    self.error(TypeError::AlreadyDefined {
                        what: format!("{} '{}'", kind, name),
                        line: ast.line(item),
                    });
                    self.duplicates.insert(item);
                    self.contexts.alloc_detached(entry)
                }
            };
            self.decl_items.insert(item, id);
        }
    }

    /// The context item of a declaration, hoisting it if it appears
    /// somewhere no block registered it.
    fn hoisted_item(&mut self, decl: NodeId, scope: ScopeId, ctx: ContextId) -> ItemId {
        if let Some(&item) = self.decl_items.get(&decl) {
            return item;
        }
        self.hoist(&[decl], scope, ctx);
        self.decl_items[&decl]
    }

    // ── Variables ───────────────────────────────────────────────────────

    fn read_symbol(&mut self, node: NodeId, sym: SymbolId) -> TypeId {
        self.bindings.insert(node, Binding::Variable(sym));
        let symbol = self.scopes.symbol_mut(sym);
        if symbol.ty.is_any() {
            symbol.derivations.push(node);
        }
        symbol.ty
    }

    /// Check one `let` binding and return the scope that holds it.
    pub(crate) fn declare_variable(&mut self, decl: NodeId, scope: ScopeId, ctx: ContextId) -> ScopeId {
        let ast = self.ast;
        let NodeKind::VarDecl {
            name,
            annotation,
            init,
        } = ast.kind(decl)
        else {
            return scope;
        };
        let line = ast.line(decl);
        let mut ty = self.visit(*init, scope, ctx);

        if name == "self" {
            self.error(TypeError::IllegalKeyword {
                keyword: "self",
                reason: "it cannot be used as a variable name",
                line,
            });
        }
        if ty == TypeId::VOID {
            self.error(TypeError::VoidInitializer {
                name: name.clone(),
                line,
            });
            ty = TypeId::ERROR;
        }
        let declared = annotation
            .as_deref()
            .map(|a| self.resolve_annotation(a, scope, ctx, line));
        if let Some(declared) = declared {
            ty = self.check_declared(&format!("variable '{}'", name), declared, *init, ty, line);
        }

        let inner = self.scopes.create(Some(scope));
        let sym = self.scopes.declare(inner, name, ty, false, Some(decl));
        let symbol = self.scopes.symbol_mut(sym);
        symbol.annotated = declared.is_some();
        if ty.is_any() {
            symbol.source = Some(*init);
            self.depend(decl, *init);
        }
        self.decl_symbols.insert(decl, sym);
        self.node_types[decl.index()] = ty;
        inner
    }

    /// Reconcile an annotation with the inferred type of `value`; the
    /// annotation wins.
    pub(crate) fn check_declared(
        &mut self,
        what: &str,
        declared: TypeId,
        value: NodeId,
        mut inferred: TypeId,
        line: Line,
    ) -> TypeId {
        if inferred.is_any() && declared.is_concrete() {
            self.unify_node(value, declared);
            inferred = self.type_of(value);
        }
        if inferred.is_concrete() && declared.is_concrete() && !self.types.is_ancestor(declared, inferred) {
            self.error(TypeError::DeclaredInferred {
                what: what.to_string(),
                declared: self.type_name(declared),
                inferred: self.type_name(inferred),
                line,
            });
        }
        declared
    }

    fn visit_assign(&mut self, node: NodeId, name: &str, value: NodeId, scope: ScopeId, ctx: ContextId) -> TypeId {
        let line = self.ast.line(node);
        let value_ty = self.visit(value, scope, ctx);
        if name == "self" {
            self.error(TypeError::IllegalKeyword {
                keyword: "self",
                reason: "it cannot be reassigned",
                line,
            });
            return TypeId::ERROR;
        }
        let Some(sym) = self.scopes.find(scope, name) else {
            self.error(TypeError::Undefined {
                kind: NameKind::Variable,
                name: name.to_string(),
                line,
            });
            return TypeId::ERROR;
        };
        self.bindings.insert(node, Binding::Variable(sym));

        let current = self.scopes.symbol(sym).ty;
        if current.is_any() && value_ty.is_concrete() {
            self.unify_variable(sym, value_ty);
        } else if value_ty.is_any() && current.is_concrete() {
            self.unify_node(value, current);
        }
        let current = self.scopes.symbol(sym).ty;
        let value_ty = self.type_of(value);

        if value_ty == TypeId::VOID {
            self.error(TypeError::VoidInitializer {
                name: name.to_string(),
                line,
            });
            return TypeId::ERROR;
        }
        if current.is_concrete() && value_ty.is_concrete() && !self.types.is_ancestor(current, value_ty) {
            self.error(TypeError::ReassignMismatch {
                name: name.to_string(),
                initialized: self.type_name(current),
                reassigned: self.type_name(value_ty),
                line,
            });
            return TypeId::ERROR;
        }
        self.pass_through(node, value, value_ty)
    }

    // ── Control flow ────────────────────────────────────────────────────

    fn visit_condition(&mut self, cond: NodeId, scope: ScopeId, ctx: ContextId) {
        if self.visit(cond, scope, ctx).is_any() {
            self.unify_node(cond, TypeId::BOOLEAN);
        }
        let ty = self.type_of(cond);
        if ty.is_concrete() && ty != TypeId::BOOLEAN {
            self.error(TypeError::ConditionNotBoolean {
                found: self.type_name(ty),
                line: self.ast.line(cond),
            });
        }
    }

    fn visit_if(
        &mut self,
        node: NodeId,
        branches: &[Branch],
        otherwise: NodeId,
        scope: ScopeId,
        ctx: ContextId,
    ) -> TypeId {
        for branch in branches {
            self.visit_condition(branch.cond, scope, ctx);
            self.visit(branch.body, scope, ctx);
        }
        self.visit(otherwise, scope, ctx);

        let bodies = self.conditional_bodies(node);
        if let Some(ty) = self.join(&bodies) {
            return ty;
        }
        // Some branch is still unresolved: unify it against the others.
        let known: Vec<NodeId> = bodies
            .iter()
            .copied()
            .filter(|&b| !self.type_of(b).is_any())
            .collect();
        let target = self.join(&known).unwrap_or(TypeId::ANY);
        self.unify_conditional(node, target);
        self.type_of(node)
    }

    /// Every value-producing arm of a conditional.
    pub(crate) fn conditional_bodies(&self, node: NodeId) -> Vec<NodeId> {
        match self.ast.kind(node) {
            NodeKind::If {
                branches,
                otherwise,
            } => branches
                .iter()
                .map(|b| b.body)
                .chain(std::iter::once(*otherwise))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Common ancestor of the nodes' types, skipping `Error`. `None` while
    /// any of them is `Any` or when there are none.
    pub(crate) fn join(&self, nodes: &[NodeId]) -> Option<TypeId> {
        let mut joined: Option<TypeId> = None;
        let mut saw_error = false;
        for &n in nodes {
            let ty = self.type_of(n);
            if ty.is_any() {
                return None;
            }
            if ty.is_error() {
                saw_error = true;
                continue;
            }
            joined = Some(joined.map_or(ty, |acc| self.types.common_ancestor(acc, ty)));
        }
        joined.or(saw_error.then_some(TypeId::ERROR))
    }

    // ── Operators ───────────────────────────────────────────────────────

    fn check_operator(&mut self, node: NodeId, op: Operator, left: NodeId, right: Option<NodeId>) -> TypeId {
        let pending = self.type_of(left).is_any() || right.is_some_and(|r| self.type_of(r).is_any());
        if pending {
            let outcome = self.unify_operator(op, left, right);
            tracing::trace!(%op, ?outcome, "operand unification");
        }
        let left_ty = self.type_of(left);
        let right_ty = right.map(|r| self.type_of(r));
        match self.rules.match_rule(&self.types, op, left_ty, right_ty) {
            Some(ty) => ty,
            None => {
                self.error(TypeError::OperatorMismatch {
                    op: op.to_string(),
                    left: self.operand(left_ty),
                    right: right_ty.map(|t| self.operand(t)),
                    line: self.ast.line(node),
                });
                TypeId::ERROR
            }
        }
    }

    // ── Calls ───────────────────────────────────────────────────────────

    fn visit_call(&mut self, node: NodeId, name: &str, args: &[NodeId], scope: ScopeId, ctx: ContextId) -> TypeId {
        let line = self.ast.line(node);
        for &arg in args {
            self.visit(arg, scope, ctx);
        }
        let Some(callee) = self.resolve_function(name, args.len(), scope, ctx, line) else {
            return TypeId::ERROR;
        };
        self.bindings.insert(
            node,
            Binding::Function {
                name: name.to_string(),
                decl: callee.decl,
            },
        );
        self.check_arguments(&format!("function '{}'", name), args, &callee.params, line);
        self.call_result(node, &callee)
    }

    /// Resolve a call by name and arity: signatures already registered in
    /// the scope chain first, then hoisted declarations, checked on demand.
    fn resolve_function(
        &mut self,
        name: &str,
        arity: usize,
        scope: ScopeId,
        ctx: ContextId,
        line: Line,
    ) -> Option<Callee> {
        if let Some(sig) = self.scopes.find_function(scope, name, arity) {
            return Some(Callee {
                params: sig.params.clone(),
                ret: sig.ret,
                item: sig.decl.and_then(|d| self.decl_items.get(&d).copied()),
                decl: sig.decl,
            });
        }
        if let Some(item) = self.contexts.find_function(ctx, name, arity) {
            self.check_callable(item);
            return Some(self.callable_signature(item));
        }

        let expected = self
            .scopes
            .find_functions(scope, name)
            .first()
            .map(|f| f.params.len())
            .or_else(|| {
                self.contexts
                    .find_item(ctx, name, ItemKind::Function)
                    .map(|item| self.contexts.item(item).arity)
            });
        let err = match expected {
            Some(expected) => TypeError::ArityMismatch {
                callee: format!("function '{}'", name),
                expected,
                found: arity,
                line,
            },
            None => TypeError::Undefined {
                kind: NameKind::Function,
                name: name.to_string(),
                line,
            },
        };
        self.error(err);
        None
    }

    /// Current signature of a function or method item. While the item is
    /// being checked this is its raw declaration: parameters as declared
    /// so far and the annotated or provisional return type.
    pub(crate) fn callable_signature(&self, item: ItemId) -> Callee {
        let it = self.contexts.item(item);
        let params = match self.callable_params.get(&it.decl) {
            Some(syms) => syms.iter().map(|&s| self.scopes.symbol(s).ty).collect(),
            None => vec![TypeId::ANY; it.arity],
        };
        Callee {
            params,
            ret: it.return_type,
            item: Some(item),
            decl: Some(it.decl),
        }
    }

    /// Unify `Any` arguments with their parameters, then check every
    /// argument positionally.
    pub(crate) fn check_arguments(&mut self, callee: &str, args: &[NodeId], params: &[TypeId], line: Line) -> bool {
        if args.len() != params.len() {
            self.error(TypeError::ArityMismatch {
                callee: callee.to_string(),
                expected: params.len(),
                found: args.len(),
                line,
            });
            return false;
        }
        if let Err(index) = self.unify_call(args, params) {
            tracing::trace!(callee, index, "argument did not unify");
        }
        let mut ok = true;
        for (i, (&arg, &param)) in args.iter().zip(params).enumerate() {
            let arg_ty = self.type_of(arg);
            if !param.is_concrete() || !arg_ty.is_concrete() {
                continue;
            }
            if !self.types.is_ancestor(param, arg_ty) {
                self.error(TypeError::ArgumentMismatch {
                    callee: callee.to_string(),
                    expected: self.type_name(param),
                    found: self.type_name(arg_ty),
                    index: i + 1,
                    line,
                });
                ok = false;
            }
        }
        ok
    }

    /// The call's type; while the callee's return type is unknown the call
    /// waits on the callee's item.
    fn call_result(&mut self, node: NodeId, callee: &Callee) -> TypeId {
        if callee.ret.is_any() {
            if let Some(item) = callee.item {
                self.contexts.item_mut(item).derivations.push(node);
            }
        }
        callee.ret
    }

    // ── Members ─────────────────────────────────────────────────────────

    fn visit_method_call(
        &mut self,
        node: NodeId,
        receiver: NodeId,
        name: &str,
        args: &[NodeId],
        scope: ScopeId,
        ctx: ContextId,
    ) -> TypeId {
        let line = self.ast.line(node);
        let mut receiver_ty = self.visit(receiver, scope, ctx);
        for &arg in args {
            self.visit(arg, scope, ctx);
        }
        if receiver_ty.is_any() {
            self.unify_by_member(receiver, name, true, ctx, line);
            receiver_ty = self.type_of(receiver);
        }
        if receiver_ty.is_any() {
            self.error(TypeError::Uninferable {
                what: format!("the receiver of method '{}'", name),
                line,
            });
            return TypeId::ERROR;
        }
        if receiver_ty.is_error() {
            return TypeId::ERROR;
        }
        let Some(item) = self.contexts.find_member(&self.types, receiver_ty, name, true) else {
            self.error(TypeError::MissingMember {
                ty: self.type_name(receiver_ty),
                member: name.to_string(),
                is_method: true,
                line,
            });
            return TypeId::ERROR;
        };
        self.call_method(node, item, receiver_ty, args, line)
    }

    fn call_method(&mut self, node: NodeId, item: ItemId, owner: TypeId, args: &[NodeId], line: Line) -> TypeId {
        self.check_callable(item);
        let callee = self.callable_signature(item);
        self.bindings.insert(node, Binding::Method(self.contexts.item(item).decl));
        let what = format!("method '{}.{}'", self.types.name(owner), self.contexts.item(item).name);
        if !self.check_arguments(&what, args, &callee.params, line) && args.len() != callee.params.len() {
            return TypeId::ERROR;
        }
        self.call_result(node, &callee)
    }

    fn visit_base(&mut self, node: NodeId, args: &[NodeId], scope: ScopeId, ctx: ContextId) -> TypeId {
        let line = self.ast.line(node);
        for &arg in args {
            self.visit(arg, scope, ctx);
        }
        let Some((owner, method)) = self.method_frames.last().cloned() else {
            self.error(TypeError::IllegalKeyword {
                keyword: "base",
                reason: "it is only available inside methods",
                line,
            });
            return TypeId::ERROR;
        };
        let parent = self.types.parent(owner).filter(|&p| self.types.is_user_defined(p));
        let overridden = parent.and_then(|p| {
            self.contexts
                .find_member(&self.types, p, &method, true)
                .map(|item| (p, item))
        });
        let Some((parent, item)) = overridden else {
            self.error(TypeError::IllegalKeyword {
                keyword: "base",
                reason: "no parent type defines the enclosing method",
                line,
            });
            return TypeId::ERROR;
        };
        self.call_method(node, item, parent, args, line)
    }

    /// Attributes are private: the receiver must be `self`. Returns the
    /// resolved attribute, or `None` after reporting why not.
    fn resolve_attribute(&mut self, receiver: NodeId, receiver_ty: TypeId, name: &str, line: Line) -> Option<ItemId> {
        if !matches!(self.ast.kind(receiver), NodeKind::SelfRef) {
            self.error(TypeError::PrivateAttribute {
                name: name.to_string(),
                line,
            });
            return None;
        }
        if !receiver_ty.is_concrete() {
            return None;
        }
        let item = self.contexts.find_member(&self.types, receiver_ty, name, false);
        if item.is_none() {
            self.error(TypeError::MissingMember {
                ty: self.type_name(receiver_ty),
                member: name.to_string(),
                is_method: false,
                line,
            });
        }
        item
    }

    fn visit_attr_get(&mut self, node: NodeId, receiver: NodeId, name: &str, scope: ScopeId, ctx: ContextId) -> TypeId {
        let line = self.ast.line(node);
        let receiver_ty = self.visit(receiver, scope, ctx);
        let Some(item) = self.resolve_attribute(receiver, receiver_ty, name, line) else {
            return TypeId::ERROR;
        };
        let attr = self.contexts.item_mut(item);
        if attr.return_type.is_any() {
            attr.derivations.push(node);
        }
        let (decl, ty) = (attr.decl, attr.return_type);
        self.bindings.insert(node, Binding::Attribute(decl));
        ty
    }

    fn visit_attr_set(
        &mut self,
        node: NodeId,
        receiver: NodeId,
        name: &str,
        value: NodeId,
        scope: ScopeId,
        ctx: ContextId,
    ) -> TypeId {
        let line = self.ast.line(node);
        let receiver_ty = self.visit(receiver, scope, ctx);
        let value_ty = self.visit(value, scope, ctx);
        let Some(item) = self.resolve_attribute(receiver, receiver_ty, name, line) else {
            return TypeId::ERROR;
        };
        self.bindings.insert(node, Binding::Attribute(self.contexts.item(item).decl));

        let attr_ty = self.contexts.item(item).return_type;
        if attr_ty.is_any() && value_ty.is_concrete() {
            self.unify_attribute(item, value_ty);
        } else if value_ty.is_any() && attr_ty.is_concrete() {
            self.unify_node(value, attr_ty);
        }
        let attr_ty = self.contexts.item(item).return_type;
        let value_ty = self.type_of(value);
        let target = format!("self.{}", name);

        if value_ty == TypeId::VOID {
            self.error(TypeError::VoidInitializer { name: target, line });
            return TypeId::ERROR;
        }
        if attr_ty.is_concrete() && value_ty.is_concrete() && !self.types.is_ancestor(attr_ty, value_ty) {
            self.error(TypeError::ReassignMismatch {
                name: target,
                initialized: self.type_name(attr_ty),
                reassigned: self.type_name(value_ty),
                line,
            });
            return TypeId::ERROR;
        }
        self.pass_through(node, value, value_ty)
    }

    // ── Types ───────────────────────────────────────────────────────────

    fn visit_new(&mut self, node: NodeId, type_name: &str, args: &[NodeId], scope: ScopeId, ctx: ContextId) -> TypeId {
        let line = self.ast.line(node);
        for &arg in args {
            self.visit(arg, scope, ctx);
        }
        let ty = self.resolve_annotation(type_name, scope, ctx, line);
        if ty.is_error() {
            return TypeId::ERROR;
        }
        self.bindings.insert(node, Binding::Type(ty));
        if !self.types.is_user_defined(ty) {
            if ty == TypeId::OBJECT && args.is_empty() {
                return ty;
            }
            self.error(TypeError::InvalidInstantiation {
                ty: type_name.to_string(),
                line,
            });
            return TypeId::ERROR;
        }
        let params = self.ctor_param_types(ty);
        self.check_arguments(&format!("type '{}'", type_name), args, &params, line);
        ty
    }

    /// Constructor parameter types of a user type as currently known.
    pub(crate) fn ctor_param_types(&self, ty: TypeId) -> Vec<TypeId> {
        match self.ctor_params.get(&ty) {
            Some(syms) => syms.iter().map(|&s| self.scopes.symbol(s).ty).collect(),
            None => self.types.get(ty).param_types.clone(),
        }
    }

    fn visit_as(&mut self, node: NodeId, expr: NodeId, type_name: &str, scope: ScopeId, ctx: ContextId) -> TypeId {
        let line = self.ast.line(node);
        let expr_ty = self.visit(expr, scope, ctx);
        let target = self.resolve_annotation(type_name, scope, ctx, line);
        if target.is_error() {
            return TypeId::ERROR;
        }
        self.bindings.insert(node, Binding::Type(target));
        let related = self.types.is_ancestor(target, expr_ty) || self.types.is_ancestor(expr_ty, target);
        if expr_ty.is_concrete() && !related {
            self.error(TypeError::InvalidCast {
                from: self.type_name(expr_ty),
                to: self.type_name(target),
                line,
            });
            return TypeId::ERROR;
        }
        target
    }

    // ── Final sweep ─────────────────────────────────────────────────────

    /// Give every node still `Any` the `Error` type. Variables that never
    /// got a type are reported; if nothing at all was reported, the first
    /// untyped node is, so a clean run always means a fully typed tree.
    fn sweep(&mut self, root: NodeId) {
        let ast = self.ast;
        let mut untyped = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.type_of(node).is_any() {
                untyped.push(node);
            }
            stack.extend(ast.children(node));
        }
        if untyped.is_empty() {
            return;
        }
        untyped.sort();

        let before = self.errors.len();
        for &node in &untyped {
            if let NodeKind::VarDecl { name, .. } = ast.kind(node) {
                self.error(TypeError::Uninferable {
                    what: format!("variable '{}'", name),
                    line: ast.line(node),
                });
            }
        }
        if self.errors.is_empty() {
            let first = untyped[0];
            self.error(TypeError::Uninferable {
                what: format!("this {}", ast.kind(first).describe()),
                line: ast.line(first),
            });
        }
        tracing::debug!(
            untyped = untyped.len(),
            reported = self.errors.len() - before,
            "final sweep"
        );
        for node in untyped {
            self.node_types[node.index()] = TypeId::ERROR;
        }
        for sym in self.decl_symbols.values() {
            let symbol = self.scopes.symbol_mut(*sym);
            if symbol.ty.is_any() {
                symbol.ty = TypeId::ERROR;
            }
        }
    }
}
