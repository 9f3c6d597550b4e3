//! Contains the bound expression tree produced by the binder.
//!
//! Every node carries its canonical type and source range. Expressions are
//! pure values; side effects live in statements. The node graph is a
//! strict tree; sharing happens only through `TypeId` and `SymbolId`
//! references into the compilation's arenas.

use std::{fmt, sync::Arc};

use enum_as_inner::EnumAsInner;
use velac_base::span::Span;

use crate::{
    arena::ID,
    builtins::SystemSubroutine,
    logic::{Logic, LogicVec},
    symbol::{Subroutine, SymbolId, Variable},
    ty::{ConstantRange, TypeId, TypeTable},
    MinTypMax,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    LogicalNot,
    BitwiseNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
    Xor,
    LogicalAnd,
    LogicalOr,
    Eq,
    Ne,
    CaseEq,
    CaseNe,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    AShr,
}

impl BinaryOp {
    /// Whether both operands participate in context-determined width
    /// unification.
    #[must_use]
    pub const fn is_context_determined(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Sub
                | Self::Mul
                | Self::Div
                | Self::Mod
                | Self::And
                | Self::Or
                | Self::Xor
        )
    }

    /// Whether the operator compares its operands, producing a single bit.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::Ne
                | Self::CaseEq
                | Self::CaseNe
                | Self::Lt
                | Self::Le
                | Self::Gt
                | Self::Ge
        )
    }

    /// Whether the operator is a shift: the left operand is context
    /// determined, the right is self determined.
    #[must_use]
    pub const fn is_shift(self) -> bool {
        matches!(self, Self::Shl | Self::Shr | Self::AShr)
    }
}

/// What an implicit or explicit conversion node was inserted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConversionKind {
    /// An assignment-context conversion.
    Implicit,
    /// A cast expression written in the source.
    Explicit,
    /// A width/sign change pushed down by context-determined propagation.
    Propagated,
}

/// The resolved target of a member access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberTarget {
    /// A field of an unpacked struct, by field position.
    StructField(usize),
    /// A class property.
    ClassProperty(ID<Variable>),
}

/// The callee of a bound call.
#[derive(Clone, EnumAsInner)]
pub enum Callee {
    User(ID<Subroutine>),
    System(SystemCallInfo),
}

impl fmt::Debug for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => f.debug_tuple("User").field(id).finish(),
            Self::System(info) => {
                f.debug_tuple("System").field(&info.subroutine.name()).finish()
            }
        }
    }
}

/// A bound reference to a system subroutine or built-in method.
#[derive(Clone)]
pub struct SystemCallInfo {
    pub subroutine: Arc<dyn SystemSubroutine>,
    /// The receiver for method-style calls (`arr.size()`).
    pub receiver: Option<Box<Expression>>,
    /// The iterator introduced by a `with` clause, and the bound clause
    /// body.
    pub iterator: Option<IteratorInfo>,
}

#[derive(Debug, Clone)]
pub struct IteratorInfo {
    pub var: ID<Variable>,
    pub body: Box<Expression>,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub callee: Callee,
    /// The receiver of a class method call.
    pub receiver: Option<Box<Expression>>,
    /// Bound arguments in formal declaration order for user calls, in
    /// written order for system calls.
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct Expression {
    /// The expression's type.
    pub ty: TypeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, EnumAsInner)]
pub enum ExprKind {
    IntegerLiteral(LogicVec),
    /// `'0`, `'1`, `'x`, `'z`: fills whatever width context assigns.
    UnbasedUnsizedLiteral(Logic),
    RealLiteral(f64),
    StringLiteral(String),
    NullLiteral,

    /// A resolved reference to a value symbol. Hierarchical references
    /// disable constant folding.
    NamedValue {
        symbol: SymbolId,
        hierarchical: bool,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        true_expr: Box<Expression>,
        false_expr: Box<Expression>,
    },
    MinTypMax {
        min: Box<Expression>,
        typ: Box<Expression>,
        max: Box<Expression>,
        /// Which branch the compilation options selected at bind time.
        selected: MinTypMax,
    },
    Concat {
        operands: Vec<Expression>,
    },
    ElementSelect {
        value: Box<Expression>,
        index: Box<Expression>,
    },
    RangeSelect {
        value: Box<Expression>,
        range: ConstantRange,
    },
    MemberAccess {
        value: Box<Expression>,
        member: MemberTarget,
    },
    Call(CallExpr),
    Conversion {
        operand: Box<Expression>,
        conversion: ConversionKind,
    },
    /// An assignment. Compound operators are desugared at bind time: the
    /// right-hand side of `a += b` is `Binary { Add, LValueRef, b }`.
    Assignment {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// A type in expression position (`$bits(int)`); the type is the
    /// node's own type.
    DataType,
    /// A reference to the innermost active assignment target.
    LValueRef,

    /// The failure sentinel; short-circuits checks on the whole subtree.
    Bad {
        inner: Option<Box<Expression>>,
    },
}

impl Expression {
    /// Creates the bad sentinel, optionally wrapping the partial node.
    #[must_use]
    pub fn bad(error_type: TypeId, span: Span, inner: Option<Expression>) -> Self {
        Self {
            ty: error_type,
            span,
            kind: ExprKind::Bad { inner: inner.map(Box::new) },
        }
    }

    /// Whether this is the failure sentinel.
    #[must_use]
    pub const fn is_bad(&self) -> bool {
        matches!(self.kind, ExprKind::Bad { .. })
    }

    /// The narrowest width the expression's value needs, used for context
    /// width propagation. Literals report their natural width; everything
    /// else reports its type's width.
    #[must_use]
    pub fn effective_width(&self, types: &TypeTable) -> u32 {
        match &self.kind {
            ExprKind::IntegerLiteral(value) => value.width(),
            ExprKind::UnbasedUnsizedLiteral(_) => 1,
            _ => types.bit_width(self.ty),
        }
    }
}
