//! Lexical scopes.
//!
//! Scopes form a parent-linked chain stored in a [`ScopeArena`]. Each scope
//! owns its symbols (variables and parameters), the function signatures
//! registered in it and the type names declared in it. Lookups search the
//! local entries newest-first and then delegate to the parent.

use hulk_ast::NodeId;

use crate::ty::TypeId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// A variable or parameter.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    /// `Any` until inferred; mutable only through unification.
    pub ty: TypeId,
    pub scope: ScopeId,
    pub is_param: bool,
    /// Constructor parameter currently hidden from method bodies.
    pub is_type_param: bool,
    /// Type came from an annotation and is never unified.
    pub annotated: bool,
    /// Nodes that read this symbol while it was `Any`.
    pub derivations: Vec<NodeId>,
    /// Declaring node: the `VarDecl`, or the function, method or type
    /// declaration owning a parameter. `None` for built-in constants.
    pub origin: Option<NodeId>,
    /// Initializer whose type this variable copies while it is `Any`.
    pub source: Option<NodeId>,
}

/// A callable registered in a scope once its declaration is checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionSig {
    pub name: String,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
    /// `None` for built-in functions.
    pub decl: Option<NodeId>,
}

#[derive(Clone, Debug, Default)]
struct ScopeData {
    parent: Option<ScopeId>,
    symbols: Vec<SymbolId>,
    functions: Vec<FunctionSig>,
    types: Vec<(String, TypeId)>,
}

/// A function with the same name and arity already exists in the scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlreadyDeclared;

#[derive(Clone, Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<ScopeData>,
    symbols: Vec<Symbol>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            parent,
            ..ScopeData::default()
        });
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0 as usize].parent
    }

    /// Declare a symbol at the head of `scope`. Shadowing is legal.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: impl Into<String>,
        ty: TypeId,
        is_param: bool,
        origin: Option<NodeId>,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            name: name.into(),
            ty,
            scope,
            is_param,
            is_type_param: false,
            annotated: false,
            derivations: Vec::new(),
            origin,
            source: None,
        });
        self.scopes[scope.0 as usize].symbols.push(id);
        id
    }

    /// Resolve a visible symbol by name.
    pub fn find(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.chain(scope).find_map(|s| {
            self.scopes[s.0 as usize]
                .symbols
                .iter()
                .rev()
                .copied()
                .find(|&id| {
                    let sym = self.symbol(id);
                    sym.name == name && !sym.is_type_param
                })
        })
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn declare_function(&mut self, scope: ScopeId, sig: FunctionSig) -> Result<(), AlreadyDeclared> {
        let data = &mut self.scopes[scope.0 as usize];
        if data
            .functions
            .iter()
            .any(|f| f.name == sig.name && f.params.len() == sig.params.len())
        {
            return Err(AlreadyDeclared);
        }
        data.functions.push(sig);
        Ok(())
    }

    /// Every signature named `name`, innermost scope first.
    pub fn find_functions(&self, scope: ScopeId, name: &str) -> Vec<&FunctionSig> {
        self.chain(scope)
            .flat_map(|s| self.scopes[s.0 as usize].functions.iter())
            .filter(|f| f.name == name)
            .collect()
    }

    pub fn find_function(&self, scope: ScopeId, name: &str, arity: usize) -> Option<&FunctionSig> {
        self.find_functions(scope, name)
            .into_iter()
            .find(|f| f.params.len() == arity)
    }

    pub fn declare_type(&mut self, scope: ScopeId, name: impl Into<String>, ty: TypeId) {
        self.scopes[scope.0 as usize].types.push((name.into(), ty));
    }

    pub fn find_type(&self, scope: ScopeId, name: &str) -> Option<TypeId> {
        self.chain(scope).find_map(|s| {
            self.scopes[s.0 as usize]
                .types
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|&(_, ty)| ty)
        })
    }

    /// `scope` followed by its ancestors.
    fn chain(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), move |&s| self.parent(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_in_current_scope() {
        let mut scopes = ScopeArena::new();
        let root = scopes.create(None);
        let x = scopes.declare(root, "x", TypeId::NUMBER, false, None);
        assert_eq!(scopes.find(root, "x"), Some(x));
        assert_eq!(scopes.find(root, "y"), None);
    }

    #[test]
    fn lookup_in_outer_scope() {
        let mut scopes = ScopeArena::new();
        let root = scopes.create(None);
        let x = scopes.declare(root, "x", TypeId::NUMBER, false, None);
        let inner = scopes.create(Some(root));
        assert_eq!(scopes.find(inner, "x"), Some(x));
    }

    #[test]
    fn newest_declaration_shadows() {
        let mut scopes = ScopeArena::new();
        let root = scopes.create(None);
        scopes.declare(root, "x", TypeId::NUMBER, false, None);
        let again = scopes.declare(root, "x", TypeId::STRING, false, None);
        let inner = scopes.create(Some(root));
        let inner_x = scopes.declare(inner, "x", TypeId::BOOLEAN, false, None);

        assert_eq!(scopes.find(root, "x"), Some(again));
        assert_eq!(scopes.find(inner, "x"), Some(inner_x));
    }

    #[test]
    fn hidden_symbols_are_skipped() {
        let mut scopes = ScopeArena::new();
        let root = scopes.create(None);
        let outer = scopes.declare(root, "p", TypeId::NUMBER, false, None);
        let inner = scopes.create(Some(root));
        let param = scopes.declare(inner, "p", TypeId::STRING, true, None);
        scopes.symbol_mut(param).is_type_param = true;

        assert_eq!(scopes.find(inner, "p"), Some(outer));
        scopes.symbol_mut(param).is_type_param = false;
        assert_eq!(scopes.find(inner, "p"), Some(param));
    }

    #[test]
    fn functions_keyed_by_name_and_arity() {
        let mut scopes = ScopeArena::new();
        let root = scopes.create(None);
        let sig = |n: usize| FunctionSig {
            name: "f".into(),
            params: vec![TypeId::NUMBER; n],
            ret: TypeId::NUMBER,
            decl: None,
        };
        assert_eq!(scopes.declare_function(root, sig(1)), Ok(()));
        assert_eq!(scopes.declare_function(root, sig(2)), Ok(()));
        assert_eq!(scopes.declare_function(root, sig(1)), Err(AlreadyDeclared));

        let inner = scopes.create(Some(root));
        assert_eq!(scopes.find_functions(inner, "f").len(), 2);
        assert!(scopes.find_function(inner, "f", 2).is_some());
        assert!(scopes.find_function(inner, "f", 3).is_none());
    }

    #[test]
    fn type_names_resolve_outward() {
        let mut scopes = ScopeArena::new();
        let root = scopes.create(None);
        scopes.declare_type(root, "number", TypeId::NUMBER);
        let inner = scopes.create(Some(root));
        assert_eq!(scopes.find_type(inner, "number"), Some(TypeId::NUMBER));
        assert_eq!(scopes.find_type(inner, "Point"), None);
    }
}
