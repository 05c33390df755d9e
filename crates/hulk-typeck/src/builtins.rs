//! Built-in operator rules and function signatures.
//!
//! The operator table is plain configuration: the analysis session holds a
//! reference to one and never mutates it. [`OperatorTable::standard`] is the
//! language's default table.

use std::fmt;

use hulk_ast::{BinaryOp, UnaryOp};

use crate::ty::{TypeId, TypeTable};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Binary(BinaryOp),
    Unary(UnaryOp),
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Binary(op) => write!(f, "{}", op),
            Operator::Unary(op) => write!(f, "{}", op),
        }
    }
}

/// One row of the operator table. `right` is `None` for unary operators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorRule {
    pub op: Operator,
    pub left: TypeId,
    pub right: Option<TypeId>,
    pub result: TypeId,
}

#[derive(Clone, Debug)]
pub struct OperatorTable {
    rules: Vec<OperatorRule>,
}

impl OperatorTable {
    pub fn new(rules: Vec<OperatorRule>) -> Self {
        OperatorTable { rules }
    }

    /// The language's operator rules.
    pub fn standard() -> Self {
        use BinaryOp::*;
        const N: TypeId = TypeId::NUMBER;
        const S: TypeId = TypeId::STRING;
        const B: TypeId = TypeId::BOOLEAN;
        const O: TypeId = TypeId::OBJECT;

        let mut rules = Vec::new();
        let mut binary = |op: BinaryOp, left: TypeId, right: TypeId, result: TypeId| {
            rules.push(OperatorRule {
                op: Operator::Binary(op),
                left,
                right: Some(right),
                result,
            });
        };

        for op in [Add, Sub, Mul, Div, Mod, Pow] {
            binary(op, N, N, N);
        }
        for op in [Lt, Gt, Le, Ge] {
            binary(op, N, N, B);
        }
        for op in [Eq, Neq] {
            binary(op, N, N, B);
            binary(op, S, S, B);
            binary(op, B, B, B);
            binary(op, O, O, B);
        }
        for op in [And, Or] {
            binary(op, B, B, B);
        }
        // Numbers and booleans are promoted to strings by concatenation.
        for op in [Concat, ConcatSpace] {
            binary(op, S, S, S);
            binary(op, S, N, S);
            binary(op, N, S, S);
            binary(op, S, B, S);
            binary(op, B, S, S);
        }

        rules.push(OperatorRule {
            op: Operator::Unary(UnaryOp::Not),
            left: B,
            right: None,
            result: B,
        });
        rules.push(OperatorRule {
            op: Operator::Unary(UnaryOp::Neg),
            left: N,
            right: None,
            result: N,
        });

        OperatorTable { rules }
    }

    pub fn rules(&self) -> &[OperatorRule] {
        &self.rules
    }

    pub fn rules_for(&self, op: Operator) -> impl Iterator<Item = &OperatorRule> + '_ {
        self.rules.iter().filter(move |r| r.op == op)
    }

    /// The result type shared by every row of `op`, if the rows agree.
    pub fn unique_result(&self, op: Operator) -> Option<TypeId> {
        let mut rows = self.rules_for(op);
        let first = rows.next()?.result;
        rows.all(|r| r.result == first).then_some(first)
    }

    /// First row of `op` whose operand types are ancestors of the given ones.
    ///
    /// `Error` on either side matches any row, even when the other side is
    /// `Any`: the result is the op's unique result type, or `Error` when its
    /// rows disagree. Otherwise `Any` never matches.
    pub fn match_rule(
        &self,
        types: &TypeTable,
        op: Operator,
        left: TypeId,
        right: Option<TypeId>,
    ) -> Option<TypeId> {
        let operands = std::iter::once(left).chain(right);
        if operands.clone().any(TypeId::is_error) {
            return Some(self.unique_result(op).unwrap_or(TypeId::ERROR));
        }
        if operands.clone().any(TypeId::is_any) {
            return None;
        }
        self.rules_for(op)
            .find(|r| {
                types.is_ancestor(r.left, left)
                    && match (r.right, right) {
                        (Some(rr), Some(rt)) => types.is_ancestor(rr, rt),
                        (None, None) => true,
                        _ => false,
                    }
            })
            .map(|r| r.result)
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Signature of a function available in every program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

pub fn builtin_functions() -> Vec<BuiltinFunction> {
    let unary_math = ["sqrt", "sin", "cos", "exp"].into_iter().map(|name| BuiltinFunction {
        name,
        params: vec![TypeId::NUMBER],
        ret: TypeId::NUMBER,
    });
    let mut fns = vec![BuiltinFunction {
        name: "print",
        params: vec![TypeId::OBJECT],
        ret: TypeId::VOID,
    }];
    fns.extend(unary_math);
    fns.push(BuiltinFunction {
        name: "log",
        params: vec![TypeId::NUMBER, TypeId::NUMBER],
        ret: TypeId::NUMBER,
    });
    fns.push(BuiltinFunction {
        name: "rand",
        params: Vec::new(),
        ret: TypeId::NUMBER,
    });
    fns
}

/// Global constants and their types.
pub const BUILTIN_CONSTANTS: &[(&str, TypeId)] = &[("PI", TypeId::NUMBER), ("E", TypeId::NUMBER)];

/// Type names resolvable in every program.
pub const BUILTIN_TYPES: &[(&str, TypeId)] = &[
    ("Object", TypeId::OBJECT),
    ("number", TypeId::NUMBER),
    ("string", TypeId::STRING),
    ("Boolean", TypeId::BOOLEAN),
    ("Void", TypeId::VOID),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::TypeDef;
    use hulk_ast::NodeId;

    fn bin(op: BinaryOp) -> Operator {
        Operator::Binary(op)
    }

    #[test]
    fn arithmetic_on_numbers() {
        let table = OperatorTable::standard();
        let types = TypeTable::new();
        let r = table.match_rule(&types, bin(BinaryOp::Add), TypeId::NUMBER, Some(TypeId::NUMBER));
        assert_eq!(r, Some(TypeId::NUMBER));
        let r = table.match_rule(&types, bin(BinaryOp::Add), TypeId::STRING, Some(TypeId::NUMBER));
        assert_eq!(r, None);
    }

    #[test]
    fn concatenation_promotes_numbers_and_booleans() {
        let table = OperatorTable::standard();
        let types = TypeTable::new();
        for (l, r) in [
            (TypeId::STRING, TypeId::NUMBER),
            (TypeId::NUMBER, TypeId::STRING),
            (TypeId::BOOLEAN, TypeId::STRING),
        ] {
            let got = table.match_rule(&types, bin(BinaryOp::Concat), l, Some(r));
            assert_eq!(got, Some(TypeId::STRING));
        }
        let got = table.match_rule(
            &types,
            bin(BinaryOp::ConcatSpace),
            TypeId::NUMBER,
            Some(TypeId::NUMBER),
        );
        assert_eq!(got, None);
    }

    #[test]
    fn equality_falls_back_to_object_row() {
        let table = OperatorTable::standard();
        let mut types = TypeTable::new();
        let point = types.alloc(TypeDef::user("Point", TypeId::OBJECT, NodeId(0)));
        let got = table.match_rule(&types, bin(BinaryOp::Eq), point, Some(TypeId::NUMBER));
        assert_eq!(got, Some(TypeId::BOOLEAN));
    }

    #[test]
    fn error_operands_match_and_any_never_does() {
        let table = OperatorTable::standard();
        let types = TypeTable::new();
        let add = bin(BinaryOp::Add);
        assert_eq!(
            table.match_rule(&types, add, TypeId::ERROR, Some(TypeId::STRING)),
            Some(TypeId::NUMBER)
        );
        assert_eq!(
            table.match_rule(&types, add, TypeId::ANY, Some(TypeId::NUMBER)),
            None
        );
        assert_eq!(
            table.match_rule(&types, bin(BinaryOp::Lt), TypeId::ERROR, Some(TypeId::ERROR)),
            Some(TypeId::BOOLEAN)
        );
        assert_eq!(
            table.match_rule(&types, add, TypeId::ANY, Some(TypeId::ERROR)),
            Some(TypeId::NUMBER)
        );
    }

    #[test]
    fn unary_rules() {
        let table = OperatorTable::standard();
        let types = TypeTable::new();
        let not = Operator::Unary(UnaryOp::Not);
        let neg = Operator::Unary(UnaryOp::Neg);
        assert_eq!(table.match_rule(&types, not, TypeId::BOOLEAN, None), Some(TypeId::BOOLEAN));
        assert_eq!(table.match_rule(&types, neg, TypeId::NUMBER, None), Some(TypeId::NUMBER));
        assert_eq!(table.match_rule(&types, neg, TypeId::STRING, None), None);
    }

    #[test]
    fn builtin_signatures() {
        let fns = builtin_functions();
        let log = fns.iter().find(|f| f.name == "log").unwrap();
        assert_eq!(log.params.len(), 2);
        let print = fns.iter().find(|f| f.name == "print").unwrap();
        assert_eq!(print.ret, TypeId::VOID);
        assert!(fns.iter().any(|f| f.name == "rand" && f.params.is_empty()));
    }
}
