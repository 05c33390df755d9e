//! Function, method and type declaration checking.
//!
//! Declarations are checked on demand: the first use of a hoisted function
//! or type checks it in its own declaring scope, and visiting the
//! declaration later is a no-op. A function that is used while its own body
//! is being checked (recursion) is seen through its raw declaration.

use hulk_ast::{Line, NodeId, NodeKind, Param, TypeDecl};
use rustc_hash::FxHashSet;

use crate::context::{CheckState, ContextId, ContextItem, ItemId, ItemKind};
use crate::error::{NameKind, TypeError};
use crate::infer::Session;
use crate::scope::{FunctionSig, ScopeId, SymbolId};
use crate::ty::{TypeDef, TypeId};

/// How a type name was reached, which decides how a cycle is reported.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum TypeRef {
    Annotation,
    Parent,
}

fn param_line(param: &Param, fallback: Line) -> Line {
    if param.line.is_synthetic() {
        fallback
    } else {
        param.line
    }
}

impl Session<'_> {
    // ── Functions and methods ───────────────────────────────────────────

    /// Check a function or method declaration once.
    pub(crate) fn check_callable(&mut self, id: ItemId) {
        if self.contexts.item(id).checked != CheckState::Unchecked {
            return;
        }
        self.contexts.item_mut(id).checked = CheckState::InProgress;
        let ast = self.ast;
        let item = self.contexts.item(id).clone();
        let (NodeKind::FunctionDecl(decl) | NodeKind::MethodDecl(decl)) = ast.kind(item.decl) else {
            return;
        };
        let owner = item.owner.and_then(|o| self.type_ids.get(&o).copied());
        let what = match owner {
            Some(ty) => format!("method '{}.{}'", self.types.name(ty), decl.name),
            None => format!("function '{}'", decl.name),
        };
        let _span = tracing::debug_span!("check_callable", callable = %what).entered();
        let line = ast.line(item.decl);

        let scope = self.scopes.create(Some(item.scope));
        if let Some(owner) = owner {
            let this = self.scopes.declare(scope, "self", owner, false, Some(item.decl));
            self.scopes.symbol_mut(this).annotated = true;
        }
        let params = self.declare_params(&decl.params, scope, &item, &what, line);
        self.callable_params.insert(item.decl, params.clone());
        let declared = decl
            .return_type
            .as_deref()
            .map(|r| self.resolve_annotation(r, item.scope, item.context, line));
        if let Some(declared) = declared {
            self.contexts.item_mut(id).return_type = declared;
        }

        let hidden = owner.map(|ty| self.hide_ctor_params(ty)).unwrap_or_default();
        if let Some(owner) = owner {
            self.method_frames.push((owner, decl.name.clone()));
        }
        let mut body = self.visit(decl.body, scope, item.context);
        if owner.is_some() {
            self.method_frames.pop();
        }
        self.restore_ctor_params(hidden);

        // Recursive calls may have fixed a provisional return type.
        let provisional = self.contexts.item(id).return_type;
        let mut ret = match declared {
            Some(declared) => self.check_declared(&what, declared, decl.body, body, line),
            None if provisional.is_concrete() => {
                if body.is_any() {
                    self.unify_node(decl.body, provisional);
                    body = self.type_of(decl.body);
                }
                if body.is_concrete() && !self.types.is_ancestor(provisional, body) {
                    self.error(TypeError::ConflictingUsage {
                        name: decl.name.clone(),
                        first: self.type_name(provisional),
                        second: self.type_name(body),
                        line,
                    });
                }
                if body.is_concrete() {
                    body
                } else {
                    provisional
                }
            }
            None => body,
        };

        let mut reported = false;
        for (&sym, param) in params.iter().zip(&decl.params) {
            if self.scopes.symbol(sym).ty.is_any() {
                self.error(TypeError::Uninferable {
                    what: format!("parameter '{}' of {}", param.name, what),
                    line: param_line(param, line),
                });
                self.assign_symbol(sym, TypeId::ERROR);
                reported = true;
            }
        }
        if ret.is_any() {
            ret = self.type_of(decl.body);
        }
        if ret.is_any() {
            if !reported {
                self.error(TypeError::Uninferable {
                    what: format!("the return type of {}", what),
                    line,
                });
            }
            ret = TypeId::ERROR;
        }

        let entry = self.contexts.item_mut(id);
        entry.return_type = ret;
        entry.checked = CheckState::Done;
        let waiting = std::mem::take(&mut entry.derivations);
        for node in waiting {
            if self.type_of(node).is_any() {
                self.settle(node, ret);
            }
        }
        self.node_types[item.decl.index()] = ret;

        if owner.is_none() && !self.duplicates.contains(&item.decl) {
            let sig = FunctionSig {
                name: decl.name.clone(),
                params: params.iter().map(|&s| self.scopes.symbol(s).ty).collect(),
                ret,
                decl: Some(item.decl),
            };
            if self.scopes.declare_function(item.scope, sig).is_err() {
                self.error(TypeError::AlreadyDefined { what, line });
            }
        }
    }

    /// Declare parameters in `scope`; annotations resolve where the owning
    /// declaration lives.
    fn declare_params(
        &mut self,
        params: &[Param],
        scope: ScopeId,
        owner: &ContextItem,
        what: &str,
        line: Line,
    ) -> Vec<SymbolId> {
        let mut seen = FxHashSet::default();
        let mut symbols = Vec::with_capacity(params.len());
        for param in params {
            let line = param_line(param, line);
            if param.name == "self" {
                self.error(TypeError::IllegalKeyword {
                    keyword: "self",
                    reason: "it cannot be used as a parameter name",
                    line,
                });
            }
            if !seen.insert(param.name.as_str()) {
                self.error(TypeError::AlreadyDefined {
                    what: format!("parameter '{}' of {}", param.name, what),
                    line,
                });
            }
            let ty = match param.annotation.as_deref() {
                Some(a) => self.resolve_annotation(a, owner.scope, owner.context, line),
                None => TypeId::ANY,
            };
            let sym = self.scopes.declare(scope, &param.name, ty, true, Some(owner.decl));
            self.scopes.symbol_mut(sym).annotated = param.annotation.is_some();
            symbols.push(sym);
        }
        symbols
    }

    fn hide_ctor_params(&mut self, ty: TypeId) -> Vec<(SymbolId, bool)> {
        let syms = self.ctor_params.get(&ty).cloned().unwrap_or_default();
        syms.into_iter()
            .map(|sym| {
                let symbol = self.scopes.symbol_mut(sym);
                let was = std::mem::replace(&mut symbol.is_type_param, true);
                (sym, was)
            })
            .collect()
    }

    fn restore_ctor_params(&mut self, hidden: Vec<(SymbolId, bool)>) {
        for (sym, was) in hidden {
            self.scopes.symbol_mut(sym).is_type_param = was;
        }
    }

    // ── Type names ──────────────────────────────────────────────────────

    /// Resolve a type annotation, checking a forward-referenced type
    /// declaration on demand. Failures are reported and yield `Error`.
    pub(crate) fn resolve_annotation(&mut self, name: &str, scope: ScopeId, ctx: ContextId, line: Line) -> TypeId {
        if let Some(ty) = self.scopes.find_type(scope, name) {
            return ty;
        }
        if let Some(item) = self.contexts.find_item(ctx, name, ItemKind::Type) {
            return self.check_type(item, line, TypeRef::Annotation).unwrap_or(TypeId::ERROR);
        }
        self.error(TypeError::Undefined {
            kind: NameKind::Type,
            name: name.to_string(),
            line,
        });
        TypeId::ERROR
    }

    /// Resolve a parent type. Every failure falls back to `Object`.
    fn resolve_parent(&mut self, child: &str, parent: &str, scope: ScopeId, ctx: ContextId, line: Line) -> TypeId {
        let ty = match self.scopes.find_type(scope, parent) {
            Some(ty) => ty,
            None => match self.contexts.find_item(ctx, parent, ItemKind::Type) {
                Some(item) => self
                    .check_type(item, line, TypeRef::Parent)
                    .unwrap_or(TypeId::OBJECT),
                None => {
                    self.error(TypeError::Undefined {
                        kind: NameKind::Type,
                        name: parent.to_string(),
                        line,
                    });
                    return TypeId::OBJECT;
                }
            },
        };
        if self.types.is_builtin(ty) && ty != TypeId::OBJECT {
            self.error(TypeError::InvalidParent {
                name: child.to_string(),
                parent: parent.to_string(),
                line,
            });
            return TypeId::OBJECT;
        }
        if ty.is_concrete() {
            ty
        } else {
            TypeId::OBJECT
        }
    }

    // ── Type declarations ───────────────────────────────────────────────

    /// Check a type declaration once and return its type.
    ///
    /// The type is allocated as soon as its parent is known, so attribute
    /// initializers and methods can name it. Returns `None` when the
    /// reference closes a cycle; the cycle is reported at `line`.
    pub(crate) fn check_type(&mut self, id: ItemId, line: Line, via: TypeRef) -> Option<TypeId> {
        let ast = self.ast;
        let item = self.contexts.item(id).clone();
        if let Some(&ty) = self.type_ids.get(&item.decl) {
            return Some(ty);
        }
        let NodeKind::TypeDecl(decl) = ast.kind(item.decl) else {
            return None;
        };
        if self.in_progress.contains(&decl.name) {
            let name = decl.name.clone();
            self.error(match via {
                TypeRef::Parent => TypeError::CircularInheritance { name, line },
                TypeRef::Annotation => TypeError::CircularTypeReference { name, line },
            });
            return None;
        }
        if item.checked == CheckState::Done {
            return None;
        }

        self.contexts.item_mut(id).checked = CheckState::InProgress;
        self.in_progress.push(decl.name.clone());
        let _span = tracing::debug_span!("check_type", name = %decl.name).entered();
        let decl_line = ast.line(item.decl);
        let what = format!("type '{}'", decl.name);
        let type_scope = self.scopes.create(Some(item.scope));

        let own_params = decl
            .params
            .as_ref()
            .map(|params| self.declare_params(params, type_scope, &item, &what, decl_line));
        let parent = match &decl.parent {
            Some(parent) => self.resolve_parent(&decl.name, parent, item.scope, item.context, decl_line),
            None => TypeId::OBJECT,
        };

        let ty = self.types.alloc(TypeDef::user(decl.name.clone(), parent, item.decl));
        self.type_ids.insert(item.decl, ty);
        self.contexts.item_mut(id).return_type = ty;
        tracing::debug!(parent = %self.types.display(parent), "type allocated");

        let ctor = match own_params {
            Some(params) => {
                self.check_parent_args(decl, parent, type_scope, item.context, decl_line);
                params
            }
            None if decl.parent_args.is_some() => {
                self.check_parent_args(decl, parent, type_scope, item.context, decl_line);
                Vec::new()
            }
            None => self.inherit_ctor_params(parent, type_scope, item.decl),
        };
        self.ctor_params.insert(ty, ctor.clone());

        self.register_members(decl, &item, type_scope, &what);
        for attr in &decl.attributes {
            if let Some(&attr) = self.decl_items.get(attr) {
                self.check_attribute(attr);
            }
        }
        for method in &decl.methods {
            if let Some(&method) = self.decl_items.get(method) {
                self.check_callable(method);
            }
        }
        self.check_overrides(ty, &decl.methods);

        let lines: Vec<Line> = decl
            .params
            .iter()
            .flatten()
            .map(|p| param_line(p, decl_line))
            .collect();
        for (i, &sym) in ctor.iter().enumerate() {
            if self.scopes.symbol(sym).ty.is_any() {
                self.error(TypeError::Uninferable {
                    what: format!("parameter '{}' of {}", self.scopes.symbol(sym).name, what),
                    line: lines.get(i).copied().unwrap_or(decl_line),
                });
                self.assign_symbol(sym, TypeId::ERROR);
            }
        }

        let param_types = ctor.iter().map(|&s| self.scopes.symbol(s).ty).collect();
        let param_names = ctor.iter().map(|&s| self.scopes.symbol(s).name.clone()).collect();
        let def = self.types.get_mut(ty);
        def.param_types = param_types;
        def.param_names = param_names;
        if !self.duplicates.contains(&item.decl) {
            self.scopes.declare_type(item.scope, decl.name.clone(), ty);
        }
        self.in_progress.pop();
        self.contexts.item_mut(id).checked = CheckState::Done;
        self.node_types[item.decl.index()] = ty;
        Some(ty)
    }

    /// Parent constructor arguments are checked like `new Parent(args)`.
    fn check_parent_args(&mut self, decl: &TypeDecl, parent: TypeId, scope: ScopeId, ctx: ContextId, line: Line) {
        let args: &[NodeId] = decl.parent_args.as_deref().unwrap_or(&[]);
        for &arg in args {
            self.visit(arg, scope, ctx);
        }
        let callee = format!("type '{}'", self.types.name(parent));
        if !self.types.is_user_defined(parent) {
            if !args.is_empty() {
                self.error(TypeError::ArityMismatch {
                    callee,
                    expected: 0,
                    found: args.len(),
                    line,
                });
            }
            return;
        }
        let params = self.ctor_param_types(parent);
        self.check_arguments(&callee, args, &params, line);
    }

    /// Copy the parent's constructor parameters for a type declared without
    /// a parameter list.
    fn inherit_ctor_params(&mut self, parent: TypeId, scope: ScopeId, origin: NodeId) -> Vec<SymbolId> {
        let inherited: Vec<(String, TypeId)> = self
            .ctor_params
            .get(&parent)
            .map(|syms| {
                syms.iter()
                    .map(|&s| {
                        let sym = self.scopes.symbol(s);
                        (sym.name.clone(), sym.ty)
                    })
                    .collect()
            })
            .unwrap_or_default();
        inherited
            .into_iter()
            .map(|(name, ty)| {
                let sym = self.scopes.declare(scope, name, ty, true, Some(origin));
                self.scopes.symbol_mut(sym).annotated = !ty.is_any();
                sym
            })
            .collect()
    }

    fn register_members(&mut self, decl: &TypeDecl, owner: &ContextItem, scope: ScopeId, what: &str) {
        let ast = self.ast;
        for &member in decl.attributes.iter().chain(&decl.methods) {
            let (kind, name, arity) = match ast.kind(member) {
                NodeKind::AttributeDecl { name, .. } => (ItemKind::Attribute, name, 0),
                NodeKind::MethodDecl(f) => (ItemKind::Method, &f.name, f.params.len()),
                _ => continue,
            };
            let entry = ContextItem::new(kind, name, member, scope, owner.context)
                .with_owner(owner.decl)
                .with_arity(arity);
            let id = match self.contexts.declare_item(owner.context, entry.clone()) {
                Ok(id) => id,
                Err(_) => {
                    self.error(TypeError::AlreadyDefined {
                        what: format!("{} '{}' in {}", kind, name, what),
                        line: ast.line(member),
                    });
                    self.duplicates.insert(member);
                    self.contexts.alloc_detached(entry)
                }
            };
            self.decl_items.insert(member, id);
        }
    }

    /// Attribute initializers see the constructor parameters but not `self`.
    fn check_attribute(&mut self, id: ItemId) {
        if self.contexts.item(id).checked != CheckState::Unchecked {
            return;
        }
        self.contexts.item_mut(id).checked = CheckState::InProgress;
        let ast = self.ast;
        let item = self.contexts.item(id).clone();
        let NodeKind::AttributeDecl {
            name,
            annotation,
            init,
        } = ast.kind(item.decl)
        else {
            return;
        };
        let line = ast.line(item.decl);
        let mut ty = self.visit(*init, item.scope, item.context);
        if ty == TypeId::VOID {
            self.error(TypeError::VoidInitializer {
                name: name.clone(),
                line,
            });
            ty = TypeId::ERROR;
        }
        if let Some(annotation) = annotation {
            let declared = self.resolve_annotation(annotation, item.scope, item.context, line);
            ty = self.check_declared(&format!("attribute '{}'", name), declared, *init, ty, line);
        }
        if ty.is_any() {
            self.depend(item.decl, *init);
        }
        let entry = self.contexts.item_mut(id);
        entry.return_type = ty;
        entry.checked = CheckState::Done;
        self.node_types[item.decl.index()] = ty;
    }

    /// A redefined method keeps the parent's parameter types and returns a
    /// descendant of the parent's return type.
    fn check_overrides(&mut self, ty: TypeId, methods: &[NodeId]) {
        let Some(parent) = self.types.parent(ty).filter(|&p| self.types.is_user_defined(p)) else {
            return;
        };
        for &method in methods {
            let Some(&mine) = self.decl_items.get(&method) else {
                continue;
            };
            let name = self.contexts.item(mine).name.clone();
            let Some(theirs) = self.contexts.find_member(&self.types, parent, &name, true) else {
                continue;
            };
            self.check_callable(theirs);
            let (a, b) = (self.callable_signature(mine), self.callable_signature(theirs));
            let same_params = a.params.len() == b.params.len()
                && a.params.iter().zip(&b.params).all(|(&x, &y)| {
                    !x.is_concrete() || !y.is_concrete() || self.types.type_equals(x, y)
                });
            let covariant =
                !a.ret.is_concrete() || !b.ret.is_concrete() || self.types.is_ancestor(b.ret, a.ret);
            if !(same_params && covariant) {
                self.error(TypeError::InvalidOverride {
                    ty: self.type_name(ty),
                    method: name,
                    line: self.ast.line(method),
                });
            }
        }
    }
}
