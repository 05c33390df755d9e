//! Hoisted declaration tables.
//!
//! A context is attached to every program and block. All function and type
//! declarations of a block are registered before any of its statements is
//! checked, so a declaration can be used before it appears. Attributes and
//! methods live in a per-type member namespace keyed by the owning type
//! declaration node and the member name.

use std::fmt;

use hulk_ast::NodeId;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::scope::ScopeId;
use crate::ty::{TypeId, TypeTable};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Function,
    Type,
    Attribute,
    Method,
}

impl ItemKind {
    pub fn is_member(self) -> bool {
        matches!(self, ItemKind::Attribute | ItemKind::Method)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemKind::Function => "function",
            ItemKind::Type => "type",
            ItemKind::Attribute => "attribute",
            ItemKind::Method => "method",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CheckState {
    Unchecked,
    InProgress,
    Done,
}

/// A hoisted declaration.
#[derive(Clone, Debug)]
pub struct ContextItem {
    pub kind: ItemKind,
    pub name: String,
    pub decl: NodeId,
    /// Owning type declaration, for attributes and methods.
    pub owner: Option<NodeId>,
    /// Parameter count; zero for types and attributes.
    pub arity: usize,
    /// Scope the declaration lives in.
    pub scope: ScopeId,
    pub context: ContextId,
    /// Return type of a function or method, attribute type, or the declared
    /// type itself. `Any` until known.
    pub return_type: TypeId,
    pub checked: CheckState,
    /// Nodes that read this item while `return_type` was `Any`.
    pub derivations: Vec<NodeId>,
}

impl ContextItem {
    pub fn new(kind: ItemKind, name: impl Into<String>, decl: NodeId, scope: ScopeId, context: ContextId) -> Self {
        ContextItem {
            kind,
            name: name.into(),
            decl,
            owner: None,
            arity: 0,
            scope,
            context,
            return_type: TypeId::ANY,
            checked: CheckState::Unchecked,
            derivations: Vec::new(),
        }
    }

    pub fn with_owner(mut self, owner: NodeId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }
}

/// A declaration with the same key already exists; carries the earlier item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlreadyExists(pub ItemId);

#[derive(Clone, Debug, Default)]
struct ContextData {
    parent: Option<ContextId>,
    items: Vec<ItemId>,
}

#[derive(Clone, Debug, Default)]
pub struct ContextArena {
    contexts: Vec<ContextData>,
    items: Vec<ContextItem>,
    /// Owner type declaration -> member name -> item.
    members: FxHashMap<NodeId, FxHashMap<String, ItemId>>,
}

impl ContextArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, parent: Option<ContextId>) -> ContextId {
        let id = ContextId(self.contexts.len() as u32);
        self.contexts.push(ContextData {
            parent,
            items: Vec::new(),
        });
        id
    }

    pub fn item(&self, id: ItemId) -> &ContextItem {
        &self.items[id.0 as usize]
    }

    pub fn item_mut(&mut self, id: ItemId) -> &mut ContextItem {
        &mut self.items[id.0 as usize]
    }

    /// Store an item without registering it under any key. Used for
    /// duplicate declarations, which are still checked.
    pub fn alloc_detached(&mut self, item: ContextItem) -> ItemId {
        let id = ItemId(self.items.len() as u32);
        self.items.push(item);
        id
    }

    /// Register `item` in `context`, or in its owner's member namespace.
    pub fn declare_item(&mut self, context: ContextId, item: ContextItem) -> Result<ItemId, AlreadyExists> {
        if let Some(owner) = item.owner.filter(|_| item.kind.is_member()) {
            if let Some(&existing) = self.members.get(&owner).and_then(|m| m.get(&item.name)) {
                return Err(AlreadyExists(existing));
            }
            let name = item.name.clone();
            let id = self.alloc_detached(item);
            self.members.entry(owner).or_default().insert(name, id);
            return Ok(id);
        }

        let clash = self.contexts[context.0 as usize].items.iter().copied().find(|&id| {
            let other = self.item(id);
            other.kind == item.kind
                && other.name == item.name
                && (item.kind != ItemKind::Function || other.arity == item.arity)
        });
        if let Some(existing) = clash {
            return Err(AlreadyExists(existing));
        }
        let id = self.alloc_detached(item);
        self.contexts[context.0 as usize].items.push(id);
        Ok(id)
    }

    /// Innermost item of `kind` named `name`, any arity.
    pub fn find_item(&self, context: ContextId, name: &str, kind: ItemKind) -> Option<ItemId> {
        self.find_where(context, |item| item.kind == kind && item.name == name)
    }

    pub fn find_function(&self, context: ContextId, name: &str, arity: usize) -> Option<ItemId> {
        self.find_where(context, |item| {
            item.kind == ItemKind::Function && item.name == name && item.arity == arity
        })
    }

    /// Every item of `kind` reachable from `context`. An inner declaration
    /// hides outer ones with the same name.
    pub fn visible_items(&self, context: ContextId, kind: ItemKind) -> Vec<ItemId> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut found = Vec::new();
        let mut current = Some(context);
        while let Some(ctx) = current {
            let data = &self.contexts[ctx.0 as usize];
            for &id in &data.items {
                let item = self.item(id);
                if item.kind == kind && seen.insert(item.name.as_str()) {
                    found.push(id);
                }
            }
            current = data.parent;
        }
        found
    }

    fn find_where(&self, context: ContextId, pred: impl Fn(&ContextItem) -> bool) -> Option<ItemId> {
        let mut current = Some(context);
        while let Some(ctx) = current {
            let data = &self.contexts[ctx.0 as usize];
            if let Some(id) = data.items.iter().copied().find(|&id| pred(self.item(id))) {
                return Some(id);
            }
            current = data.parent;
        }
        None
    }

    /// Resolve an attribute or method of `ty`, searching user-defined
    /// ancestors on a miss.
    pub fn find_member(&self, types: &TypeTable, ty: TypeId, name: &str, want_method: bool) -> Option<ItemId> {
        let kind = if want_method { ItemKind::Method } else { ItemKind::Attribute };
        types
            .ancestors(ty)
            .take_while(|&t| types.is_user_defined(t))
            .filter_map(|t| types.get(t).declaration)
            .find_map(|owner| {
                self.own_member(owner, name)
                    .filter(|&id| self.item(id).kind == kind)
            })
    }

    /// A member declared directly by the type declaration `owner`.
    pub fn own_member(&self, owner: NodeId, name: &str) -> Option<ItemId> {
        self.members.get(&owner)?.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::TypeDef;

    const SCOPE: ScopeId = ScopeId(0);

    fn function(ctx: ContextId, name: &str, decl: u32, arity: usize) -> ContextItem {
        ContextItem::new(ItemKind::Function, name, NodeId(decl), SCOPE, ctx).with_arity(arity)
    }

    #[test]
    fn visible_items_hide_outer_names() {
        let mut contexts = ContextArena::new();
        let root = contexts.create(None);
        let inner = contexts.create(Some(root));
        let sibling = contexts.create(Some(root));
        let ty = |ctx, name: &str, decl| ContextItem::new(ItemKind::Type, name, NodeId(decl), SCOPE, ctx);
        let outer_a = contexts.declare_item(root, ty(root, "A", 1)).unwrap();
        let b = contexts.declare_item(root, ty(root, "B", 2)).unwrap();
        let inner_a = contexts.declare_item(inner, ty(inner, "A", 3)).unwrap();
        let hidden = contexts.declare_item(sibling, ty(sibling, "C", 4)).unwrap();
        contexts.declare_item(root, function(root, "f", 5, 0)).unwrap();

        let visible = contexts.visible_items(inner, ItemKind::Type);
        assert_eq!(visible, vec![inner_a, b]);
        assert!(!visible.contains(&outer_a));
        assert!(!visible.contains(&hidden));
    }

    #[test]
    fn functions_keyed_by_arity() {
        let mut contexts = ContextArena::new();
        let root = contexts.create(None);
        let f1 = contexts.declare_item(root, function(root, "f", 1, 1)).unwrap();
        assert!(contexts.declare_item(root, function(root, "f", 2, 2)).is_ok());
        assert_eq!(
            contexts.declare_item(root, function(root, "f", 3, 1)),
            Err(AlreadyExists(f1))
        );
        assert_eq!(contexts.find_function(root, "f", 1), Some(f1));
    }

    #[test]
    fn types_keyed_by_name_only() {
        let mut contexts = ContextArena::new();
        let root = contexts.create(None);
        let ty = ContextItem::new(ItemKind::Type, "Point", NodeId(1), SCOPE, root);
        let first = contexts.declare_item(root, ty.clone()).unwrap();
        assert_eq!(contexts.declare_item(root, ty), Err(AlreadyExists(first)));
        // A function may share a type's name.
        assert!(contexts.declare_item(root, function(root, "Point", 2, 0)).is_ok());
    }

    #[test]
    fn find_walks_outward() {
        let mut contexts = ContextArena::new();
        let root = contexts.create(None);
        let inner = contexts.create(Some(root));
        let f = contexts.declare_item(root, function(root, "f", 1, 0)).unwrap();
        assert_eq!(contexts.find_item(inner, "f", ItemKind::Function), Some(f));
        assert_eq!(contexts.find_item(inner, "f", ItemKind::Type), None);
    }

    #[test]
    fn members_are_namespaced_by_owner() {
        let mut contexts = ContextArena::new();
        let root = contexts.create(None);
        let attr = |owner: u32, decl: u32| {
            ContextItem::new(ItemKind::Attribute, "x", NodeId(decl), SCOPE, root).with_owner(NodeId(owner))
        };
        let a = contexts.declare_item(root, attr(10, 1)).unwrap();
        assert!(contexts.declare_item(root, attr(20, 2)).is_ok());
        assert_eq!(contexts.declare_item(root, attr(10, 3)), Err(AlreadyExists(a)));
        // Members are not visible as top-level items.
        assert_eq!(contexts.find_item(root, "x", ItemKind::Attribute), None);
    }

    #[test]
    fn member_lookup_follows_user_defined_parents() {
        let mut types = TypeTable::new();
        let base = types.alloc(TypeDef::user("Base", TypeId::OBJECT, NodeId(10)));
        let derived = types.alloc(TypeDef::user("Derived", base, NodeId(20)));

        let mut contexts = ContextArena::new();
        let root = contexts.create(None);
        let method = ContextItem::new(ItemKind::Method, "area", NodeId(11), SCOPE, root)
            .with_owner(NodeId(10));
        let area = contexts.declare_item(root, method).unwrap();

        assert_eq!(contexts.find_member(&types, derived, "area", true), Some(area));
        assert_eq!(contexts.find_member(&types, derived, "area", false), None);
        assert_eq!(contexts.find_member(&types, TypeId::NUMBER, "area", true), None);
    }
}
