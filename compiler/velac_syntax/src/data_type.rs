//! Data type syntax nodes.

use enum_as_inner::EnumAsInner;
use velac_base::span::{SourceElement, Span};

use crate::{
    expression::{ExpressionSyntax, NameSyntax},
    Token,
};

/// The built-in integer type keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntegerTypeKeyword {
    Bit,
    Logic,
    Reg,
    Byte,
    ShortInt,
    Int,
    LongInt,
    Integer,
    Time,
}

impl IntegerTypeKeyword {
    /// The bit width of the keyword's type before packed dimensions apply.
    #[must_use]
    pub const fn width(self) -> u32 {
        match self {
            Self::Bit | Self::Logic | Self::Reg => 1,
            Self::Byte => 8,
            Self::ShortInt => 16,
            Self::Int | Self::Integer => 32,
            Self::LongInt | Self::Time => 64,
        }
    }

    /// Whether the keyword denotes a four-state type.
    #[must_use]
    pub const fn four_state(self) -> bool {
        matches!(self, Self::Logic | Self::Reg | Self::Integer | Self::Time)
    }

    /// Whether the type is signed when no signing specifier is written.
    #[must_use]
    pub const fn default_signed(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::ShortInt | Self::Int | Self::LongInt | Self::Integer
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RealTypeKeyword {
    ShortReal,
    Real,
    RealTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signing {
    Signed,
    Unsigned,
}

/// A packed dimension `[msb:lsb]`.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct PackedDimensionSyntax {
    pub left: ExpressionSyntax,
    pub right: ExpressionSyntax,
    pub span: Span,
}

/// An unpacked dimension following a declarator name.
#[derive(Debug, Clone, PartialEq, PartialOrd, EnumAsInner)]
pub enum VariableDimensionSyntax {
    /// `[msb:lsb]`
    Range {
        left: ExpressionSyntax,
        right: ExpressionSyntax,
        span: Span,
    },

    /// `[size]`, shorthand for `[0:size-1]`
    Size { size: ExpressionSyntax, span: Span },

    /// `[]`
    Dynamic { span: Span },

    /// `[*]` or `[index_type]`
    Associative {
        index_type: Option<Box<DataTypeSyntax>>,
        span: Span,
    },

    /// `[$]` or `[$:bound]`
    Queue {
        bound: Option<ExpressionSyntax>,
        span: Span,
    },
}

impl SourceElement for VariableDimensionSyntax {
    fn span(&self) -> Span {
        match self {
            Self::Range { span, .. }
            | Self::Size { span, .. }
            | Self::Dynamic { span }
            | Self::Associative { span, .. }
            | Self::Queue { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct IntegerTypeSyntax {
    pub keyword: IntegerTypeKeyword,
    pub signing: Option<Signing>,
    pub packed_dimensions: Vec<PackedDimensionSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RealTypeSyntax {
    pub keyword: RealTypeKeyword,
    pub span: Span,
}

/// A declared type left implicit, as in `parameter P = 1` or
/// `logic signed [3:0]` written without a keyword in net declarations.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ImplicitTypeSyntax {
    pub signing: Option<Signing>,
    pub packed_dimensions: Vec<PackedDimensionSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct EnumMemberSyntax {
    pub name: Token,
    pub initializer: Option<ExpressionSyntax>,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct EnumTypeSyntax {
    /// The base type; `int` when omitted.
    pub base: Option<Box<DataTypeSyntax>>,
    pub members: Vec<EnumMemberSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct StructMemberSyntax {
    pub data_type: DataTypeSyntax,
    pub name: Token,
}

/// An unpacked struct type.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct StructTypeSyntax {
    pub members: Vec<StructMemberSyntax>,
    pub span: Span,
}

/// A reference to a named type: a typedef, an enum name, a class, or a
/// package-qualified type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamedTypeSyntax {
    pub name: NameSyntax,
}

#[derive(Debug, Clone, PartialEq, PartialOrd, EnumAsInner)]
pub enum DataTypeSyntax {
    Integer(IntegerTypeSyntax),
    Real(RealTypeSyntax),
    String { span: Span },
    Chandle { span: Span },
    Event { span: Span },
    Void { span: Span },
    Enum(EnumTypeSyntax),
    Struct(StructTypeSyntax),
    Named(NamedTypeSyntax),
    Implicit(ImplicitTypeSyntax),
}

impl SourceElement for DataTypeSyntax {
    fn span(&self) -> Span {
        match self {
            Self::Integer(ty) => ty.span,
            Self::Real(ty) => ty.span,
            Self::String { span }
            | Self::Chandle { span }
            | Self::Event { span }
            | Self::Void { span } => *span,
            Self::Enum(ty) => ty.span,
            Self::Struct(ty) => ty.span,
            Self::Named(ty) => ty.name.span(),
            Self::Implicit(ty) => ty.span,
        }
    }
}

impl DataTypeSyntax {
    /// Creates a bare integer keyword type with no signing or dimensions.
    #[must_use]
    pub fn keyword(keyword: IntegerTypeKeyword) -> Self {
        Self::Integer(IntegerTypeSyntax {
            keyword,
            signing: None,
            packed_dimensions: Vec::new(),
            span: Span::default(),
        })
    }

    /// Creates `int`.
    #[must_use]
    pub fn int() -> Self { Self::keyword(IntegerTypeKeyword::Int) }

    /// Creates `logic [msb:lsb]`.
    #[must_use]
    pub fn logic_vector(msb: u64, lsb: u64) -> Self {
        Self::Integer(IntegerTypeSyntax {
            keyword: IntegerTypeKeyword::Logic,
            signing: None,
            packed_dimensions: vec![PackedDimensionSyntax {
                left: ExpressionSyntax::decimal(msb),
                right: ExpressionSyntax::decimal(lsb),
                span: Span::default(),
            }],
            span: Span::default(),
        })
    }

    /// Creates an implicit type with no signing or dimensions.
    #[must_use]
    pub fn implicit() -> Self {
        Self::Implicit(ImplicitTypeSyntax {
            signing: None,
            packed_dimensions: Vec::new(),
            span: Span::default(),
        })
    }

    /// Creates a reference to a named type.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(NamedTypeSyntax {
            name: NameSyntax::Identifier(crate::expression::IdentifierNameSyntax {
                identifier: Token::identifier(name),
            }),
        })
    }
}
