//! Statement syntax nodes.

use enum_as_inner::EnumAsInner;
use velac_base::span::{SourceElement, Span};

use crate::{expression::ExpressionSyntax, item::DataDeclarationSyntax, Token};

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct SequentialBlockStatementSyntax {
    /// The label after `begin :`, if any.
    pub label: Option<Token>,
    pub statements: Vec<StatementSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ConditionalStatementSyntax {
    pub condition: ExpressionSyntax,
    pub then_branch: Box<StatementSyntax>,
    pub else_branch: Option<Box<StatementSyntax>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ForLoopStatementSyntax {
    /// Declarations or assignments run once before the loop.
    pub initializers: Vec<StatementSyntax>,
    pub stop_expression: Option<ExpressionSyntax>,
    pub step_expressions: Vec<ExpressionSyntax>,
    pub body: Box<StatementSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ExpressionStatementSyntax {
    pub expression: ExpressionSyntax,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ReturnStatementSyntax {
    pub expression: Option<ExpressionSyntax>,
    pub span: Span,
}

/// `disable label;`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisableStatementSyntax {
    pub target: Token,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd, EnumAsInner)]
pub enum StatementSyntax {
    SequentialBlock(SequentialBlockStatementSyntax),
    Conditional(ConditionalStatementSyntax),
    ForLoop(ForLoopStatementSyntax),
    Expression(ExpressionStatementSyntax),
    Return(ReturnStatementSyntax),
    Break { span: Span },
    Continue { span: Span },
    Disable(DisableStatementSyntax),
    VariableDeclaration(DataDeclarationSyntax),
    Empty { span: Span },
}

impl SourceElement for StatementSyntax {
    fn span(&self) -> Span {
        match self {
            Self::SequentialBlock(statement) => statement.span,
            Self::Conditional(statement) => statement.span,
            Self::ForLoop(statement) => statement.span,
            Self::Expression(statement) => statement.span,
            Self::Return(statement) => statement.span,
            Self::Break { span } | Self::Continue { span } | Self::Empty { span } => {
                *span
            }
            Self::Disable(statement) => statement.span,
            Self::VariableDeclaration(declaration) => declaration.span,
        }
    }
}

impl StatementSyntax {
    /// Wraps an expression as a statement.
    #[must_use]
    pub fn expression(expression: ExpressionSyntax) -> Self {
        Self::Expression(ExpressionStatementSyntax {
            expression,
            span: Span::default(),
        })
    }

    /// Creates a `return expr;` statement.
    #[must_use]
    pub fn return_(expression: ExpressionSyntax) -> Self {
        Self::Return(ReturnStatementSyntax {
            expression: Some(expression),
            span: Span::default(),
        })
    }
}
