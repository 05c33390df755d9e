//! Semantic errors.
//!
//! Every error carries the source line of the offending construct and the
//! names of the types involved. Errors are collected by the analysis session
//! and returned together; none of them aborts analysis.

use std::fmt;

use hulk_common::Line;

/// What kind of name failed to resolve.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NameKind {
    Variable,
    Function,
    Type,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NameKind::Variable => "variable",
            NameKind::Function => "function",
            NameKind::Type => "type",
        })
    }
}

/// One side of an operator application, as it appears in a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Typed(String),
    /// Its type could not be inferred from usage.
    Uninferred,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Typed(name) => write!(f, "'{}'", name),
            Operand::Uninferred => f.write_str("an uninferred value"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeError {
    /// A variable, function or type name with no visible declaration.
    Undefined { kind: NameKind, name: String, line: Line },
    /// A declaration clashing with an earlier one. `what` reads like
    /// "function 'f'" or "attribute 'x' in type 'Point'".
    AlreadyDefined { what: String, line: Line },
    /// `callee` reads like "function 'f'", "method 'Point.norm'" or "type 'Point'".
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
        line: Line,
    },
    ArgumentMismatch {
        callee: String,
        expected: String,
        found: String,
        /// 1-based.
        index: usize,
        line: Line,
    },
    /// `right` is `None` for unary operators.
    OperatorMismatch {
        op: String,
        left: Operand,
        right: Option<Operand>,
        line: Line,
    },
    DeclaredInferred {
        what: String,
        declared: String,
        inferred: String,
        line: Line,
    },
    ReassignMismatch {
        name: String,
        initialized: String,
        reassigned: String,
        line: Line,
    },
    /// A symbol used both as `first` and as an unrelated `second`.
    ConflictingUsage {
        name: String,
        first: String,
        second: String,
        line: Line,
    },
    CircularInheritance { name: String, line: Line },
    CircularTypeReference { name: String, line: Line },
    InvalidParent { name: String, parent: String, line: Line },
    PrivateAttribute { name: String, line: Line },
    MissingMember {
        ty: String,
        member: String,
        is_method: bool,
        line: Line,
    },
    IllegalKeyword {
        keyword: &'static str,
        reason: &'static str,
        line: Line,
    },
    /// Something whose type no usage determines. `what` reads like
    /// "parameter 'a' of function 'f'".
    Uninferable { what: String, line: Line },
    VoidInitializer { name: String, line: Line },
    ConditionNotBoolean { found: String, line: Line },
    InvalidOverride { ty: String, method: String, line: Line },
    InvalidCast { from: String, to: String, line: Line },
    InvalidInstantiation { ty: String, line: Line },
}

impl TypeError {
    pub fn line(&self) -> Line {
        match self {
            TypeError::Undefined { line, .. }
            | TypeError::AlreadyDefined { line, .. }
            | TypeError::ArityMismatch { line, .. }
            | TypeError::ArgumentMismatch { line, .. }
            | TypeError::OperatorMismatch { line, .. }
            | TypeError::DeclaredInferred { line, .. }
            | TypeError::ReassignMismatch { line, .. }
            | TypeError::ConflictingUsage { line, .. }
            | TypeError::CircularInheritance { line, .. }
            | TypeError::CircularTypeReference { line, .. }
            | TypeError::InvalidParent { line, .. }
            | TypeError::PrivateAttribute { line, .. }
            | TypeError::MissingMember { line, .. }
            | TypeError::IllegalKeyword { line, .. }
            | TypeError::Uninferable { line, .. }
            | TypeError::VoidInitializer { line, .. }
            | TypeError::ConditionNotBoolean { line, .. }
            | TypeError::InvalidOverride { line, .. }
            | TypeError::InvalidCast { line, .. }
            | TypeError::InvalidInstantiation { line, .. } => *line,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Undefined { kind, name, .. } => {
                write!(f, "{} '{}' is not defined", kind, name)
            }
            TypeError::AlreadyDefined { what, .. } => write!(f, "{} already exists", what),
            TypeError::ArityMismatch {
                callee,
                expected,
                found,
                ..
            } => write!(
                f,
                "{} takes {} argument(s), but {} were given",
                callee, expected, found
            ),
            TypeError::ArgumentMismatch {
                callee,
                expected,
                found,
                index,
                ..
            } => write!(
                f,
                "{} receives '{}', not '{}' as argument {}",
                callee, expected, found, index
            ),
            TypeError::OperatorMismatch {
                op,
                left,
                right: Some(right),
                ..
            } => write!(
                f,
                "operator '{}' cannot be used between {} and {}",
                op, left, right
            ),
            TypeError::OperatorMismatch {
                op,
                left,
                right: None,
                ..
            } => write!(f, "operator '{}' cannot be applied to {}", op, left),
            TypeError::DeclaredInferred {
                what,
                declared,
                inferred,
                ..
            } => write!(
                f,
                "{} is declared as '{}' but inferred as '{}'",
                what, declared, inferred
            ),
            TypeError::ReassignMismatch {
                name,
                initialized,
                reassigned,
                ..
            } => write!(
                f,
                "'{}' was initialized as '{}' but reassigned as '{}'",
                name, initialized, reassigned
            ),
            TypeError::ConflictingUsage {
                name,
                first,
                second,
                ..
            } => write!(f, "'{}' behaves both as '{}' and '{}'", name, first, second),
            TypeError::CircularInheritance { name, .. } => {
                write!(f, "circular inheritance involving type '{}'", name)
            }
            TypeError::CircularTypeReference { name, .. } => {
                write!(f, "circular type reference involving type '{}'", name)
            }
            TypeError::InvalidParent { name, parent, .. } => write!(
                f,
                "type '{}' cannot inherit from built-in type '{}'",
                name, parent
            ),
            TypeError::PrivateAttribute { name, .. } => write!(
                f,
                "attribute '{}' is private and can only be accessed through 'self'",
                name
            ),
            TypeError::MissingMember {
                ty,
                member,
                is_method,
                ..
            } => {
                let kind = if *is_method { "method" } else { "attribute" };
                write!(f, "type '{}' has no {} '{}'", ty, kind, member)
            }
            TypeError::IllegalKeyword { keyword, reason, .. } => {
                write!(f, "illegal use of '{}': {}", keyword, reason)
            }
            TypeError::Uninferable { what, .. } => write!(
                f,
                "cannot infer the type of {}; it must be type annotated",
                what
            ),
            TypeError::VoidInitializer { name, .. } => write!(
                f,
                "'{}' cannot be given a value of type 'Void'",
                name
            ),
            TypeError::ConditionNotBoolean { found, .. } => {
                write!(f, "condition must return 'Boolean', not '{}'", found)
            }
            TypeError::InvalidOverride { ty, method, .. } => write!(
                f,
                "method '{}.{}' overrides its parent method with a different signature",
                ty, method
            ),
            TypeError::InvalidCast { from, to, .. } => {
                write!(f, "cannot downcast '{}' to '{}'", from, to)
            }
            TypeError::InvalidInstantiation { ty, .. } => {
                write!(f, "built-in type '{}' cannot be instantiated", ty)
            }
        }
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_mismatch_message() {
        let err = TypeError::ArgumentMismatch {
            callee: "function 'f'".into(),
            expected: "number".into(),
            found: "string".into(),
            index: 1,
            line: Line(4),
        };
        insta::assert_snapshot!(err.to_string(), @"function 'f' receives 'number', not 'string' as argument 1");
        assert_eq!(err.line(), Line(4));
    }

    #[test]
    fn operator_messages() {
        let binary = TypeError::OperatorMismatch {
            op: "+".into(),
            left: Operand::Typed("string".into()),
            right: Some(Operand::Uninferred),
            line: Line(1),
        };
        insta::assert_snapshot!(binary.to_string(), @"operator '+' cannot be used between 'string' and an uninferred value");
        let unary = TypeError::OperatorMismatch {
            op: "!".into(),
            left: Operand::Typed("number".into()),
            right: None,
            line: Line(1),
        };
        insta::assert_snapshot!(unary.to_string(), @"operator '!' cannot be applied to 'number'");
    }

    #[test]
    fn member_messages() {
        let err = TypeError::MissingMember {
            ty: "Point".into(),
            member: "norm".into(),
            is_method: true,
            line: Line(2),
        };
        insta::assert_snapshot!(err.to_string(), @"type 'Point' has no method 'norm'");
    }

    #[test]
    fn uninferable_message() {
        let err = TypeError::Uninferable {
            what: "parameter 'a' of function 'f'".into(),
            line: Line(1),
        };
        insta::assert_snapshot!(err.to_string(), @"cannot infer the type of parameter 'a' of function 'f'; it must be type annotated");
    }
}
