//! Unification: resolving `Any` from usage evidence.
//!
//! Unification never narrows. A symbol that is already concrete only
//! "unifies" with a type it is related to by ancestry, and is left alone.
//! When a symbol, attribute or provisional return type first becomes
//! concrete, every node that read it while it was `Any` is settled, and
//! each settled node refreshes the consumers waiting on it (operators,
//! lets, blocks, conditionals, declarations). Each node goes from `Any` to
//! concrete at most once, so cascades terminate.
//!
//! Ambiguity never guesses: when more than one type would fit, unification
//! fails silently and the caller's ordinary check reports the problem.

use hulk_ast::{Line, NodeId, NodeKind};

use crate::builtins::Operator;
use crate::context::{CheckState, ContextId, ItemId, ItemKind};
use crate::decl::TypeRef;
use crate::error::TypeError;
use crate::infer::Session;
use crate::scope::SymbolId;
use crate::ty::TypeId;
use crate::Binding;

/// Which operands of an operator were unified.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnifyOutcome {
    None,
    Left,
    Right,
    Both,
}

impl UnifyOutcome {
    fn from_sides(left: bool, right: bool) -> Self {
        match (left, right) {
            (true, true) => UnifyOutcome::Both,
            (true, false) => UnifyOutcome::Left,
            (false, true) => UnifyOutcome::Right,
            (false, false) => UnifyOutcome::None,
        }
    }
}

impl Session<'_> {
    pub(crate) fn type_of(&self, node: NodeId) -> TypeId {
        self.node_types[node.index()]
    }

    /// Recompute `consumer` once `on` has a type.
    pub(crate) fn depend(&mut self, consumer: NodeId, on: NodeId) {
        self.dependents[on.index()].push(consumer);
    }

    /// Give `node` its final type and refresh everything waiting on it.
    pub(crate) fn settle(&mut self, node: NodeId, ty: TypeId) {
        if ty.is_any() {
            return;
        }
        self.node_types[node.index()] = ty;
        let consumers = std::mem::take(&mut self.dependents[node.index()]);
        for consumer in consumers {
            if self.type_of(consumer).is_any() {
                self.refresh(consumer);
            }
        }
    }

    /// Set a symbol's type and settle every node that read it as `Any`.
    pub(crate) fn assign_symbol(&mut self, sym: SymbolId, ty: TypeId) {
        let symbol = self.scopes.symbol_mut(sym);
        symbol.ty = ty;
        let readers = std::mem::take(&mut symbol.derivations);
        tracing::trace!(
            symbol = %self.scopes.symbol(sym).name,
            ty = %self.types.display(ty),
            readers = readers.len(),
            "symbol resolved"
        );
        for node in readers {
            if self.type_of(node).is_any() {
                self.settle(node, ty);
            }
        }
    }

    /// Set an item's type (an attribute's type or a provisional return
    /// type) and settle every node that read it as `Any`.
    fn assign_item(&mut self, item: ItemId, ty: TypeId) {
        let entry = self.contexts.item_mut(item);
        entry.return_type = ty;
        let readers = std::mem::take(&mut entry.derivations);
        for node in readers {
            if self.type_of(node).is_any() {
                self.settle(node, ty);
            }
        }
    }

    /// `Error` is compatible with everything.
    fn compatible(&self, expected: TypeId, actual: TypeId) -> bool {
        expected.is_error() || actual.is_error() || self.types.is_ancestor(expected, actual)
    }

    /// Recompute a node whose input has just become known.
    fn refresh(&mut self, node: NodeId) {
        let ast = self.ast;
        let ty = match ast.kind(node) {
            NodeKind::Var { .. } | NodeKind::SelfRef => match self.bindings.get(&node) {
                Some(Binding::Variable(sym)) => self.scopes.symbol(*sym).ty,
                _ => TypeId::ANY,
            },
            NodeKind::AttrGet { .. } | NodeKind::Call { .. } | NodeKind::MethodCall { .. } | NodeKind::Base { .. } => {
                match self.item_of(node) {
                    Some(item) => self.contexts.item(item).return_type,
                    None => TypeId::ANY,
                }
            }
            NodeKind::VarDecl { init, .. } => {
                let ty = self.type_of(*init);
                if let Some(&sym) = self.decl_symbols.get(&node) {
                    let symbol = self.scopes.symbol(sym);
                    if !ty.is_any() && symbol.ty.is_any() && !symbol.annotated {
                        self.assign_symbol(sym, ty);
                    }
                }
                ty
            }
            NodeKind::AttributeDecl { init, .. } => {
                let ty = self.type_of(*init);
                if let Some(&item) = self.decl_items.get(&node) {
                    if !ty.is_any() && self.contexts.item(item).return_type.is_any() {
                        self.assign_item(item, ty);
                    }
                }
                ty
            }
            NodeKind::Let { body, .. } | NodeKind::While { body, .. } => self.type_of(*body),
            NodeKind::Assign { value, .. } | NodeKind::AttrSet { value, .. } => self.type_of(*value),
            NodeKind::Program { items } | NodeKind::Block { exprs: items } => items
                .iter()
                .rev()
                .find(|&&i| !ast.kind(i).is_declaration())
                .map_or(TypeId::VOID, |&i| self.type_of(i)),
            NodeKind::If { .. } => {
                let bodies = self.conditional_bodies(node);
                self.join(&bodies).unwrap_or(TypeId::ANY)
            }
            NodeKind::Binary { op, left, right } => {
                self.refresh_operator(node, Operator::Binary(*op), *left, Some(*right))
            }
            NodeKind::Unary { op, operand } => self.refresh_operator(node, Operator::Unary(*op), *operand, None),
            _ => TypeId::ANY,
        };
        self.settle(node, ty);
    }

    fn refresh_operator(&mut self, node: NodeId, op: Operator, left: NodeId, right: Option<NodeId>) -> TypeId {
        let left_ty = self.type_of(left);
        let right_ty = right.map(|r| self.type_of(r));
        if left_ty.is_any() || right_ty.is_some_and(TypeId::is_any) {
            return TypeId::ANY;
        }
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

    /// The function, method or attribute item a node reads.
    fn item_of(&self, node: NodeId) -> Option<ItemId> {
        let decl = match self.bindings.get(&node)? {
            Binding::Function { decl, .. } => (*decl)?,
            Binding::Attribute(decl) | Binding::Method(decl) => *decl,
            Binding::Variable(_) | Binding::Type(_) => return None,
        };
        self.decl_items.get(&decl).copied()
    }

    // ── Entry points ────────────────────────────────────────────────────

    /// Unify a parameter or variable with `target`.
    ///
    /// An `Any` symbol takes `target`; a concrete one succeeds without
    /// change when the two types are related by ancestry and fails
    /// otherwise. Annotated symbols never change.
    pub(crate) fn unify_symbol(&mut self, sym: SymbolId, target: TypeId) -> bool {
        let symbol = self.scopes.symbol(sym);
        let current = symbol.ty;
        if current.is_any() {
            if symbol.annotated || target.is_any() {
                return false;
            }
            self.assign_symbol(sym, target);
            return true;
        }
        if current.is_error() || target.is_error() {
            return true;
        }
        self.types.is_ancestor(current, target) || self.types.is_ancestor(target, current)
    }

    /// Unify a variable, going through its initializer while it copies one.
    pub(crate) fn unify_variable(&mut self, sym: SymbolId, target: TypeId) -> bool {
        let symbol = self.scopes.symbol(sym);
        if let (true, Some(source)) = (symbol.ty.is_any(), symbol.source) {
            if !self.unify_node(source, target) {
                return false;
            }
            if self.scopes.symbol(sym).ty.is_any() {
                self.assign_symbol(sym, self.type_of(source));
            }
            return true;
        }
        self.unify_symbol(sym, target)
    }

    /// Unify an attribute through its initializer.
    pub(crate) fn unify_attribute(&mut self, item: ItemId, target: TypeId) -> bool {
        let entry = self.contexts.item(item);
        if !entry.return_type.is_any() {
            return self.compatible(target, entry.return_type);
        }
        let decl = entry.decl;
        let ast = self.ast;
        let NodeKind::AttributeDecl {
            annotation: None,
            init,
            ..
        } = ast.kind(decl)
        else {
            return false;
        };
        if !self.unify_node(*init, target) {
            return false;
        }
        if self.contexts.item(item).return_type.is_any() {
            self.assign_item(item, self.type_of(*init));
            self.settle(decl, self.type_of(*init));
        }
        true
    }

    /// Push `target` into the node that produced a value.
    pub(crate) fn unify_node(&mut self, node: NodeId, target: TypeId) -> bool {
        if !target.is_concrete() {
            return false;
        }
        let current = self.type_of(node);
        if !current.is_any() {
            return self.compatible(target, current);
        }
        let ast = self.ast;
        let unified = match ast.kind(node) {
            NodeKind::Var { .. } | NodeKind::SelfRef => match self.bindings.get(&node) {
                Some(&Binding::Variable(sym)) => self.unify_variable(sym, target),
                _ => false,
            },
            NodeKind::AttrGet { .. } => match self.item_of(node) {
                Some(item) => self.unify_attribute(item, target),
                None => false,
            },
            NodeKind::Call { .. } | NodeKind::MethodCall { .. } | NodeKind::Base { .. } => {
                match self.item_of(node) {
                    Some(item) => self.provisional_return(item, target),
                    None => false,
                }
            }
            NodeKind::Let { body, .. } | NodeKind::While { body, .. } => self.unify_node(*body, target),
            NodeKind::Block { exprs } => match exprs.iter().rev().find(|&&e| !ast.kind(e).is_declaration()) {
                Some(&last) => self.unify_node(last, target),
                None => false,
            },
            NodeKind::If { .. } => self.unify_conditional(node, target),
            _ => false,
        };
        if unified && self.type_of(node).is_any() {
            self.settle(node, target);
        }
        unified
    }

    /// A call to a function whose body is being checked fixes the
    /// function's return type provisionally.
    fn provisional_return(&mut self, item: ItemId, target: TypeId) -> bool {
        let entry = self.contexts.item(item);
        let open = entry.checked == CheckState::InProgress
            && entry.return_type.is_any()
            && matches!(entry.kind, ItemKind::Function | ItemKind::Method);
        if !open {
            return false;
        }
        tracing::trace!(
            callee = %entry.name,
            ty = %self.types.display(target),
            "provisional return type"
        );
        self.assign_item(item, target);
        true
    }

    /// Unify whichever operand is `Any` from the operator's rows.
    pub(crate) fn unify_operator(&mut self, op: Operator, left: NodeId, right: Option<NodeId>) -> UnifyOutcome {
        let left_ty = self.type_of(left);
        let Some(right) = right else {
            if !left_ty.is_any() {
                return UnifyOutcome::None;
            }
            let candidates = self.operand_candidates(op, None, true);
            let unified = matches!(candidates[..], [only] if self.unify_node(left, only));
            return UnifyOutcome::from_sides(unified, false);
        };
        let right_ty = self.type_of(right);
        match (left_ty.is_any(), right_ty.is_any()) {
            (true, false) => {
                let candidates = self.operand_candidates(op, Some(right_ty), true);
                let unified = matches!(candidates[..], [only] if self.unify_node(left, only));
                UnifyOutcome::from_sides(unified, false)
            }
            (false, true) => {
                let candidates = self.operand_candidates(op, Some(left_ty), false);
                let unified = matches!(candidates[..], [only] if self.unify_node(right, only));
                UnifyOutcome::from_sides(false, unified)
            }
            (true, true) => {
                let rows: Vec<(TypeId, Option<TypeId>)> =
                    self.rules.rules_for(op).map(|r| (r.left, r.right)).collect();
                let [(l, Some(r))] = rows[..] else {
                    return UnifyOutcome::None;
                };
                let left_ok = self.unify_node(left, l);
                let right_ok = self.unify_node(right, r);
                UnifyOutcome::from_sides(left_ok, right_ok)
            }
            (false, false) => UnifyOutcome::None,
        }
    }

    /// Distinct admissible types for the unknown operand of `op`, given the
    /// known one. Rows naming the known type exactly are preferred over rows
    /// that merely accept it through an ancestor.
    fn operand_candidates(&self, op: Operator, known: Option<TypeId>, unknown_is_left: bool) -> Vec<TypeId> {
        if known.is_some_and(|k| !k.is_concrete()) {
            return Vec::new();
        }
        let pick = |exact: bool| {
            let mut out: Vec<TypeId> = Vec::new();
            for rule in self.rules.rules_for(op) {
                let (unknown, known_row) = if unknown_is_left {
                    (Some(rule.left), rule.right)
                } else {
                    (rule.right, Some(rule.left))
                };
                let accepts = match (known_row, known) {
                    (Some(row), Some(k)) if exact => row == k,
                    (Some(row), Some(k)) => self.types.is_ancestor(row, k),
                    (None, None) => true,
                    _ => false,
                };
                if let (true, Some(unknown)) = (accepts, unknown) {
                    if !out.contains(&unknown) {
                        out.push(unknown);
                    }
                }
            }
            out
        };
        let exact = pick(true);
        if exact.is_empty() {
            pick(false)
        } else {
            exact
        }
    }

    /// Unify every `Any` argument with its parameter. Returns the unified
    /// positions, or the first position that could not be unified.
    pub(crate) fn unify_call(&mut self, args: &[NodeId], params: &[TypeId]) -> Result<Vec<usize>, usize> {
        let mut unified = Vec::new();
        for (i, (&arg, &param)) in args.iter().zip(params).enumerate() {
            if !self.type_of(arg).is_any() || !param.is_concrete() {
                continue;
            }
            if !self.unify_node(arg, param) {
                return Err(i);
            }
            unified.push(i);
        }
        Ok(unified)
    }

    /// Unify the `Any` arms of a conditional with `target`. With no target
    /// at all the conditional is widened to `Object` and its arms stay
    /// unresolved.
    pub(crate) fn unify_conditional(&mut self, node: NodeId, target: TypeId) -> bool {
        if target.is_any() {
            self.settle(node, TypeId::OBJECT);
            return true;
        }
        if !target.is_concrete() {
            return false;
        }
        let bodies = self.conditional_bodies(node);
        for &body in &bodies {
            if self.type_of(body).is_any() {
                self.unify_node(body, target);
            }
        }
        if self.type_of(node).is_any() {
            let ty = self.join(&bodies).unwrap_or(target);
            self.settle(node, ty);
        }
        true
    }

    /// Infer a receiver's type from a member it is asked for: the nearest
    /// common ancestor of every type in reach of `ctx` defining the member,
    /// provided that ancestor still defines it. Hoisted types that have not
    /// been checked yet are checked first so their members are known.
    pub(crate) fn unify_by_member(
        &mut self,
        node: NodeId,
        member: &str,
        want_method: bool,
        ctx: ContextId,
        line: Line,
    ) -> bool {
        let mut candidates = Vec::new();
        for item in self.contexts.visible_items(ctx, ItemKind::Type) {
            let entry = self.contexts.item(item);
            // Still resolving its parent: no members yet, and checking it
            // again would report a cycle.
            if entry.checked == CheckState::InProgress && entry.return_type.is_any() {
                continue;
            }
            let Some(ty) = self.check_type(item, line, TypeRef::Annotation) else {
                continue;
            };
            if self
                .contexts
                .find_member(&self.types, ty, member, want_method)
                .is_some()
            {
                candidates.push(ty);
            }
        }
        let Some((&first, rest)) = candidates.split_first() else {
            return false;
        };
        let common = rest
            .iter()
            .fold(first, |acc, &t| self.types.common_ancestor(acc, t));
        if self
            .contexts
            .find_member(&self.types, common, member, want_method)
            .is_none()
        {
            tracing::debug!(member, candidates = candidates.len(), "no common owner for member");
            return false;
        }
        self.unify_node(node, common)
    }
}
