//! Expression syntax nodes.

use enum_as_inner::EnumAsInner;
use velac_base::span::{SourceElement, Span};

use crate::{data_type::DataTypeSyntax, Token};

/// The base of a sized integer literal such as `4'b10x1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LiteralBase {
    Binary,
    Octal,
    Decimal,
    Hex,
}

impl LiteralBase {
    /// The radix of the base.
    #[must_use]
    pub const fn radix(self) -> u32 {
        match self {
            Self::Binary => 2,
            Self::Octal => 8,
            Self::Decimal => 10,
            Self::Hex => 16,
        }
    }
}

/// The digit of an unbased unsized literal: `'0`, `'1`, `'x`, `'z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnbasedDigit {
    Zero,
    One,
    X,
    Z,
}

/// An integer literal, either a plain decimal (`42`) or a based vector
/// (`4'b10x1`). Digit text may contain `x`, `z`, `?` and `_` characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntegerLiteralSyntax {
    /// The explicit size prefix, if any (`4` in `4'b1010`).
    pub size: Option<u32>,

    /// Whether the literal carried the `s` signing specifier, or is a plain
    /// decimal literal (plain decimals are signed).
    pub signed: bool,

    /// The base of the digit text.
    pub base: LiteralBase,

    /// The digit text following the base specifier.
    pub digits: String,

    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct RealLiteralSyntax {
    pub value: f64,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringLiteralSyntax {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnbasedUnsizedLiteralSyntax {
    pub digit: UnbasedDigit,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd, EnumAsInner)]
pub enum LiteralSyntax {
    Integer(IntegerLiteralSyntax),
    Real(RealLiteralSyntax),
    String(StringLiteralSyntax),
    UnbasedUnsized(UnbasedUnsizedLiteralSyntax),
    Null { span: Span },
}

impl SourceElement for LiteralSyntax {
    fn span(&self) -> Span {
        match self {
            Self::Integer(literal) => literal.span,
            Self::Real(literal) => literal.span,
            Self::String(literal) => literal.span,
            Self::UnbasedUnsized(literal) => literal.span,
            Self::Null { span } => *span,
        }
    }
}

/// A simple identifier in expression position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentifierNameSyntax {
    pub identifier: Token,
}

/// A package-qualified name such as `pkg::item`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopedNameSyntax {
    pub scope: Token,
    pub name: Token,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumAsInner)]
pub enum NameSyntax {
    Identifier(IdentifierNameSyntax),
    Scoped(ScopedNameSyntax),
}

impl NameSyntax {
    /// The rightmost identifier of the name.
    #[must_use]
    pub fn last_identifier(&self) -> &Token {
        match self {
            Self::Identifier(name) => &name.identifier,
            Self::Scoped(name) => &name.name,
        }
    }
}

impl SourceElement for NameSyntax {
    fn span(&self) -> Span {
        match self {
            Self::Identifier(name) => name.identifier.span,
            Self::Scoped(name) => name.scope.span.join(name.name.span),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnaryOperator {
    Plus,
    Minus,
    LogicalNot,
    BitwiseNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Power,
    BinaryAnd,
    BinaryOr,
    BinaryXor,
    LogicalAnd,
    LogicalOr,
    Equality,
    Inequality,
    CaseEquality,
    CaseInequality,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    ShiftLeft,
    ShiftRight,
    ArithmeticShiftRight,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct UnaryExpressionSyntax {
    pub operator: UnaryOperator,
    pub operand: Box<ExpressionSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct BinaryExpressionSyntax {
    pub operator: BinaryOperator,
    pub left: Box<ExpressionSyntax>,
    pub right: Box<ExpressionSyntax>,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ConditionalExpressionSyntax {
    pub condition: Box<ExpressionSyntax>,
    pub true_expression: Box<ExpressionSyntax>,
    pub false_expression: Box<ExpressionSyntax>,
}

/// A `min : typ : max` expression.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct MinTypMaxExpressionSyntax {
    pub min: Box<ExpressionSyntax>,
    pub typ: Box<ExpressionSyntax>,
    pub max: Box<ExpressionSyntax>,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct MemberAccessExpressionSyntax {
    pub value: Box<ExpressionSyntax>,
    pub member: Token,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ElementSelectExpressionSyntax {
    pub value: Box<ExpressionSyntax>,
    pub index: Box<ExpressionSyntax>,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct RangeSelectExpressionSyntax {
    pub value: Box<ExpressionSyntax>,
    pub left: Box<ExpressionSyntax>,
    pub right: Box<ExpressionSyntax>,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ConcatenationExpressionSyntax {
    pub elements: Vec<ExpressionSyntax>,
    pub span: Span,
}

/// An ordered argument in an invocation.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct OrderedArgumentSyntax {
    pub expression: ExpressionSyntax,
}

/// A named argument in an invocation: `.name(expr)` or `.name()`.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct NamedArgumentSyntax {
    pub name: Token,
    pub expression: Option<ExpressionSyntax>,
}

/// A skipped positional argument, as in `f(1, , 3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmptyArgumentSyntax {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd, EnumAsInner)]
pub enum ArgumentSyntax {
    Ordered(OrderedArgumentSyntax),
    Named(NamedArgumentSyntax),
    Empty(EmptyArgumentSyntax),
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct InvocationExpressionSyntax {
    /// The callee: a name or a member access.
    pub callee: Box<ExpressionSyntax>,
    pub arguments: Vec<ArgumentSyntax>,
    pub span: Span,
}

/// The `with (expr)` clause of an array method, optionally introducing a
/// named iterator: `arr.sum() with (item * 2)`.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct WithClauseSyntax {
    /// The declared iterator name; `item` when omitted.
    pub iterator_name: Option<Token>,
    pub expression: Box<ExpressionSyntax>,
    pub span: Span,
}

/// An array method invocation that may carry a `with` clause.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ArrayOrRandomizeMethodExpressionSyntax {
    pub invocation: InvocationExpressionSyntax,
    pub with_clause: Option<WithClauseSyntax>,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct CastExpressionSyntax {
    pub target: Box<DataTypeSyntax>,
    pub operand: Box<ExpressionSyntax>,
    pub span: Span,
}

/// An assignment usable in statement and for-step position. A `Some`
/// operator makes this a compound assignment such as `+=`.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct AssignmentExpressionSyntax {
    pub target: Box<ExpressionSyntax>,
    pub operator: Option<BinaryOperator>,
    pub value: Box<ExpressionSyntax>,
}

#[derive(Debug, Clone, PartialEq, PartialOrd, EnumAsInner)]
pub enum ExpressionSyntax {
    Literal(LiteralSyntax),
    Name(NameSyntax),
    MemberAccess(MemberAccessExpressionSyntax),
    ElementSelect(ElementSelectExpressionSyntax),
    RangeSelect(RangeSelectExpressionSyntax),
    Unary(UnaryExpressionSyntax),
    Binary(BinaryExpressionSyntax),
    Conditional(ConditionalExpressionSyntax),
    MinTypMax(MinTypMaxExpressionSyntax),
    Concatenation(ConcatenationExpressionSyntax),
    Invocation(InvocationExpressionSyntax),
    ArrayOrRandomizeMethod(ArrayOrRandomizeMethodExpressionSyntax),
    Cast(CastExpressionSyntax),
    Assignment(AssignmentExpressionSyntax),
    DataType(Box<DataTypeSyntax>),
}

impl SourceElement for ExpressionSyntax {
    fn span(&self) -> Span {
        match self {
            Self::Literal(literal) => literal.span(),
            Self::Name(name) => name.span(),
            Self::MemberAccess(access) => {
                access.value.span().join(access.member.span)
            }
            Self::ElementSelect(select) => {
                select.value.span().join(select.index.span())
            }
            Self::RangeSelect(select) => {
                select.value.span().join(select.right.span())
            }
            Self::Unary(unary) => unary.span,
            Self::Binary(binary) => binary.left.span().join(binary.right.span()),
            Self::Conditional(conditional) => conditional
                .condition
                .span()
                .join(conditional.false_expression.span()),
            Self::MinTypMax(expression) => {
                expression.min.span().join(expression.max.span())
            }
            Self::Concatenation(concatenation) => concatenation.span,
            Self::Invocation(invocation) => invocation.span,
            Self::ArrayOrRandomizeMethod(method) => method
                .with_clause
                .as_ref()
                .map_or(method.invocation.span, |with| {
                    method.invocation.span.join(with.span)
                }),
            Self::Cast(cast) => cast.span,
            Self::Assignment(assignment) => {
                assignment.target.span().join(assignment.value.span())
            }
            Self::DataType(data_type) => data_type.span(),
        }
    }
}

impl ExpressionSyntax {
    /// Creates a plain decimal literal, signed and unsized, the way the
    /// lexer would hand over `42`.
    #[must_use]
    pub fn decimal(value: u64) -> Self {
        Self::Literal(LiteralSyntax::Integer(IntegerLiteralSyntax {
            size: None,
            signed: true,
            base: LiteralBase::Decimal,
            digits: value.to_string(),
            span: Span::default(),
        }))
    }

    /// Creates a sized based vector literal such as `4'b10x1`.
    #[must_use]
    pub fn vector(size: u32, base: LiteralBase, digits: impl Into<String>) -> Self {
        Self::Literal(LiteralSyntax::Integer(IntegerLiteralSyntax {
            size: Some(size),
            signed: false,
            base,
            digits: digits.into(),
            span: Span::default(),
        }))
    }

    /// Creates an identifier reference.
    #[must_use]
    pub fn name(identifier: impl Into<String>) -> Self {
        Self::Name(NameSyntax::Identifier(IdentifierNameSyntax {
            identifier: Token::identifier(identifier),
        }))
    }

    /// Creates a package-qualified reference `scope::name`.
    #[must_use]
    pub fn scoped_name(
        scope: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Name(NameSyntax::Scoped(ScopedNameSyntax {
            scope: Token::identifier(scope),
            name: Token::identifier(name),
        }))
    }

    /// Creates a binary expression.
    #[must_use]
    pub fn binary(operator: BinaryOperator, left: Self, right: Self) -> Self {
        Self::Binary(BinaryExpressionSyntax {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Creates a unary expression.
    #[must_use]
    pub fn unary(operator: UnaryOperator, operand: Self) -> Self {
        Self::Unary(UnaryExpressionSyntax {
            operator,
            operand: Box::new(operand),
            span: Span::default(),
        })
    }

    /// Creates an invocation of a named subroutine with ordered arguments.
    #[must_use]
    pub fn call(callee: impl Into<String>, arguments: Vec<Self>) -> Self {
        Self::Invocation(InvocationExpressionSyntax {
            callee: Box::new(Self::name(callee)),
            arguments: arguments
                .into_iter()
                .map(|expression| {
                    ArgumentSyntax::Ordered(OrderedArgumentSyntax { expression })
                })
                .collect(),
            span: Span::default(),
        })
    }
}
