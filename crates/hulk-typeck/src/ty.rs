//! Type representation for the HULK type system.
//!
//! Types live in a [`TypeTable`] arena and are addressed by [`TypeId`].
//! `Object` is the root of a single-inheritance tree; `Any` and `Error` are
//! sentinels outside the tree: `Any` marks "not inferred yet" and `Error`
//! marks "already diagnosed".

use std::fmt;

use hulk_ast::NodeId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const OBJECT: TypeId = TypeId(0);
    pub const ANY: TypeId = TypeId(1);
    pub const ERROR: TypeId = TypeId(2);
    pub const NUMBER: TypeId = TypeId(3);
    pub const STRING: TypeId = TypeId(4);
    pub const BOOLEAN: TypeId = TypeId(5);
    pub const VOID: TypeId = TypeId(6);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_any(self) -> bool {
        self == TypeId::ANY
    }

    pub fn is_error(self) -> bool {
        self == TypeId::ERROR
    }

    /// Neither `Any` nor `Error`.
    pub fn is_concrete(self) -> bool {
        !self.is_any() && !self.is_error()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Builtin,
    UserDefined,
    /// `Any` and `Error`.
    Sentinel,
}

#[derive(Clone, Debug)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    pub parent: Option<TypeId>,
    /// Constructor parameter types, filled once the declaration is checked.
    pub param_types: Vec<TypeId>,
    pub param_names: Vec<String>,
    pub declaration: Option<NodeId>,
}

impl TypeDef {
    fn builtin(name: &str, kind: TypeKind, parent: Option<TypeId>) -> Self {
        TypeDef {
            name: name.to_string(),
            kind,
            parent,
            param_types: Vec::new(),
            param_names: Vec::new(),
            declaration: None,
        }
    }

    pub fn user(name: impl Into<String>, parent: TypeId, declaration: NodeId) -> Self {
        TypeDef {
            name: name.into(),
            kind: TypeKind::UserDefined,
            parent: Some(parent),
            param_types: Vec::new(),
            param_names: Vec::new(),
            declaration: Some(declaration),
        }
    }
}

/// Arena of every type known to one analysis run.
#[derive(Clone, Debug)]
pub struct TypeTable {
    defs: Vec<TypeDef>,
}

impl TypeTable {
    /// A table holding only the built-in types.
    pub fn new() -> Self {
        let object = Some(TypeId::OBJECT);
        let defs = vec![
            TypeDef::builtin("Object", TypeKind::Builtin, None),
            TypeDef::builtin("Any", TypeKind::Sentinel, None),
            TypeDef::builtin("Error", TypeKind::Sentinel, None),
            TypeDef::builtin("number", TypeKind::Builtin, object),
            TypeDef::builtin("string", TypeKind::Builtin, object),
            TypeDef::builtin("Boolean", TypeKind::Builtin, object),
            TypeDef::builtin("Void", TypeKind::Builtin, object),
        ];
        TypeTable { defs }
    }

    pub fn alloc(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.defs.len() as u32);
        self.defs.push(def);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeDef {
        &self.defs[id.index()]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeDef {
        &mut self.defs[id.index()]
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.get(id).name
    }

    pub fn parent(&self, id: TypeId) -> Option<TypeId> {
        self.get(id).parent
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn is_user_defined(&self, id: TypeId) -> bool {
        self.get(id).kind == TypeKind::UserDefined
    }

    pub fn is_builtin(&self, id: TypeId) -> bool {
        self.get(id).kind == TypeKind::Builtin
    }

    /// Every user-defined type, in declaration-check order.
    pub fn user_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        (0..self.defs.len() as u32)
            .map(TypeId)
            .filter(|&id| self.is_user_defined(id))
    }

    /// The type registered for a declaration node.
    pub fn by_declaration(&self, decl: NodeId) -> Option<TypeId> {
        self.defs
            .iter()
            .position(|d| d.declaration == Some(decl))
            .map(|i| TypeId(i as u32))
    }

    // ── Hierarchy queries ───────────────────────────────────────────────

    /// Structural equality by name.
    pub fn type_equals(&self, a: TypeId, b: TypeId) -> bool {
        a == b || self.name(a) == self.name(b)
    }

    /// Whether `anc` lies on `t`'s parent chain (reflexive).
    ///
    /// Sentinels are outside the tree: they are only ancestors of themselves.
    pub fn is_ancestor(&self, anc: TypeId, t: TypeId) -> bool {
        if anc == t {
            return true;
        }
        if self.get(anc).kind == TypeKind::Sentinel || self.get(t).kind == TypeKind::Sentinel {
            return false;
        }
        self.ancestors(t).any(|a| a == anc)
    }

    /// `t` followed by each of its ancestors up to `Object`.
    ///
    /// The walk is bounded by the table size, so a corrupted parent cycle
    /// cannot loop forever.
    pub fn ancestors(&self, t: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        let mut current = Some(t);
        let mut remaining = self.defs.len();
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            let here = current?;
            current = self.parent(here);
            Some(here)
        })
    }

    /// Nearest type that is an ancestor of both inputs.
    ///
    /// Callers must not pass `Any`: generalizing before inference finishes
    /// would lock in a wrong type. `Error` absorbs everything.
    pub fn common_ancestor(&self, a: TypeId, b: TypeId) -> TypeId {
        debug_assert!(!a.is_any() && !b.is_any(), "common_ancestor called with Any");
        if a.is_error() || b.is_error() {
            return TypeId::ERROR;
        }
        let chain: Vec<TypeId> = self.ancestors(a).collect();
        self.ancestors(b)
            .find(|t| chain.contains(t))
            .unwrap_or(TypeId::OBJECT)
    }

    /// Number of parent links between `t` and `Object`.
    pub fn depth(&self, t: TypeId) -> usize {
        self.ancestors(t).count().saturating_sub(1)
    }

    pub fn display(&self, id: TypeId) -> TypeName<'_> {
        TypeName { table: self, id }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Display adapter printing a type's name.
pub struct TypeName<'a> {
    table: &'a TypeTable,
    id: TypeId,
}

impl fmt::Display for TypeName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table.name(self.id))
    }
}
