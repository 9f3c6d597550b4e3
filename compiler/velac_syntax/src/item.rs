//! Declaration and scope member syntax nodes.

use enum_as_inner::EnumAsInner;
use velac_base::span::{SourceElement, Span};

use crate::{
    data_type::{DataTypeSyntax, VariableDimensionSyntax},
    expression::ExpressionSyntax,
    statement::StatementSyntax,
    Token, TokenKind,
};

/// A single `name [dims] [= init]` declarator.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct DeclaratorSyntax {
    pub name: Token,
    pub dimensions: Vec<VariableDimensionSyntax>,
    pub initializer: Option<ExpressionSyntax>,
}

impl DeclaratorSyntax {
    /// Creates a declarator with no dimensions.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        initializer: Option<ExpressionSyntax>,
    ) -> Self {
        Self {
            name: Token::identifier(name),
            dimensions: Vec::new(),
            initializer,
        }
    }
}

/// A variable declaration: `int x = 1, y;`
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct DataDeclarationSyntax {
    pub is_const: bool,
    pub data_type: DataTypeSyntax,
    pub declarators: Vec<DeclaratorSyntax>,
    pub span: Span,
}

/// A net declaration: `wire [7:0] w;`
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct NetDeclarationSyntax {
    /// The net kind keyword (`wire`, `tri`, ...).
    pub net_kind: Token,
    pub data_type: DataTypeSyntax,
    pub declarators: Vec<DeclaratorSyntax>,
    pub span: Span,
}

/// A `parameter` or `localparam` declaration.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ParameterDeclarationSyntax {
    /// `ParameterKeyword` or `LocalParamKeyword`.
    pub keyword: Token,
    pub data_type: DataTypeSyntax,
    pub declarators: Vec<DeclaratorSyntax>,
    pub span: Span,
}

impl ParameterDeclarationSyntax {
    /// Whether this declares local parameters.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.keyword.kind == TokenKind::LocalParamKeyword
    }
}

/// `typedef <type> <name> [dims];`
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct TypedefDeclarationSyntax {
    pub data_type: DataTypeSyntax,
    pub name: Token,
    pub dimensions: Vec<VariableDimensionSyntax>,
    pub span: Span,
}

/// One item of an import declaration; a `None` item imports the whole
/// package (`import pkg::*`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImportItemSyntax {
    pub package: Token,
    pub item: Option<Token>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImportDeclarationSyntax {
    pub items: Vec<ImportItemSyntax>,
    pub span: Span,
}

/// A formal argument of a subroutine.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct SubroutinePortSyntax {
    /// Direction keyword token; input when absent.
    pub direction: Option<Token>,
    /// Argument type; previous port's type (or logic) when absent.
    pub data_type: Option<DataTypeSyntax>,
    pub name: Token,
    pub default: Option<ExpressionSyntax>,
}

impl SubroutinePortSyntax {
    /// Creates an input port of the given type with no default.
    #[must_use]
    pub fn input(name: impl Into<String>, data_type: DataTypeSyntax) -> Self {
        Self {
            direction: None,
            data_type: Some(data_type),
            name: Token::identifier(name),
            default: None,
        }
    }
}

/// `static` or `automatic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifetimeSyntax {
    Static,
    Automatic,
}

/// Method and import qualifiers on a function declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FunctionQualifiers {
    pub is_virtual: bool,
    pub is_pure: bool,
    /// The function is a DPI import; its body is empty.
    pub is_dpi_import: bool,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct FunctionDeclarationSyntax {
    pub name: Token,
    pub lifetime: Option<LifetimeSyntax>,
    pub qualifiers: FunctionQualifiers,
    /// The declared return type; `None` means `void`.
    pub return_type: Option<DataTypeSyntax>,
    pub ports: Vec<SubroutinePortSyntax>,
    pub body: Vec<StatementSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct TaskDeclarationSyntax {
    pub name: Token,
    pub lifetime: Option<LifetimeSyntax>,
    pub ports: Vec<SubroutinePortSyntax>,
    pub body: Vec<StatementSyntax>,
    pub span: Span,
}

/// Member visibility inside a class body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ClassVisibility {
    #[default]
    Public,
    Local,
    Protected,
}

/// A class body item with its qualifiers.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ClassItemSyntax {
    pub is_static: bool,
    pub visibility: ClassVisibility,
    pub member: MemberSyntax,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ClassDeclarationSyntax {
    pub name: Token,
    /// Whether this is an `interface class`.
    pub is_interface: bool,
    pub extends: Option<Token>,
    pub implements: Vec<Token>,
    pub items: Vec<ClassItemSyntax>,
    pub span: Span,
}

/// One parameter override in an instantiation: `#(.P(3))` or `#(3)`.
#[derive(Debug, Clone, PartialEq, PartialOrd, EnumAsInner)]
pub enum ParamAssignmentSyntax {
    Ordered(ExpressionSyntax),
    Named {
        name: Token,
        expression: Option<ExpressionSyntax>,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct InstanceSyntax {
    pub name: Token,
}

/// A module instantiation: `m #(.P(3)) u1;`
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct HierarchyInstantiationSyntax {
    pub module: Token,
    pub parameters: Vec<ParamAssignmentSyntax>,
    pub instances: Vec<InstanceSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProceduralBlockKind {
    Initial,
    Always,
    Final,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ProceduralBlockSyntax {
    pub kind: ProceduralBlockKind,
    pub body: StatementSyntax,
    pub span: Span,
}

/// A generate region with a plain block body.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct GenerateBlockSyntax {
    pub label: Option<Token>,
    pub members: Vec<MemberSyntax>,
    pub span: Span,
}

/// Which design-definition keyword introduced a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DefinitionKind {
    #[default]
    Module,
    Interface,
    Program,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct ModuleDeclarationSyntax {
    pub kind: DefinitionKind,
    pub name: Token,
    /// Parameter ports declared in the `#(...)` header.
    pub parameter_ports: Vec<ParameterDeclarationSyntax>,
    pub members: Vec<MemberSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct PackageDeclarationSyntax {
    pub name: Token,
    pub members: Vec<MemberSyntax>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, PartialOrd, EnumAsInner)]
pub enum MemberSyntax {
    Module(ModuleDeclarationSyntax),
    Package(PackageDeclarationSyntax),
    Class(ClassDeclarationSyntax),
    Function(FunctionDeclarationSyntax),
    Task(TaskDeclarationSyntax),
    Data(DataDeclarationSyntax),
    Net(NetDeclarationSyntax),
    Parameter(ParameterDeclarationSyntax),
    Typedef(TypedefDeclarationSyntax),
    Import(ImportDeclarationSyntax),
    Instantiation(HierarchyInstantiationSyntax),
    ProceduralBlock(ProceduralBlockSyntax),
    GenerateBlock(GenerateBlockSyntax),
}

impl SourceElement for MemberSyntax {
    fn span(&self) -> Span {
        match self {
            Self::Module(member) => member.span,
            Self::Package(member) => member.span,
            Self::Class(member) => member.span,
            Self::Function(member) => member.span,
            Self::Task(member) => member.span,
            Self::Data(member) => member.span,
            Self::Net(member) => member.span,
            Self::Parameter(member) => member.span,
            Self::Typedef(member) => member.span,
            Self::Import(member) => member.span,
            Self::Instantiation(member) => member.span,
            Self::ProceduralBlock(member) => member.span,
            Self::GenerateBlock(member) => member.span,
        }
    }
}

/// The root node handed to the semantic core: one compilation unit per
/// source file.
#[derive(Debug, Clone, PartialEq, PartialOrd, Default)]
pub struct CompilationUnitSyntax {
    pub members: Vec<MemberSyntax>,
}

impl CompilationUnitSyntax {
    #[must_use]
    pub fn new(members: Vec<MemberSyntax>) -> Self { Self { members } }
}

impl ModuleDeclarationSyntax {
    /// Creates a module with no parameter ports.
    #[must_use]
    pub fn new(name: impl Into<String>, members: Vec<MemberSyntax>) -> Self {
        Self {
            kind: DefinitionKind::Module,
            name: Token::identifier(name),
            parameter_ports: Vec::new(),
            members,
            span: Span::default(),
        }
    }
}

impl PackageDeclarationSyntax {
    #[must_use]
    pub fn new(name: impl Into<String>, members: Vec<MemberSyntax>) -> Self {
        Self { name: Token::identifier(name), members, span: Span::default() }
    }
}

impl ParameterDeclarationSyntax {
    /// Creates a single-declarator `parameter` or `localparam`.
    #[must_use]
    pub fn single(
        local: bool,
        data_type: DataTypeSyntax,
        name: impl Into<String>,
        initializer: Option<ExpressionSyntax>,
    ) -> Self {
        Self {
            keyword: Token::keyword(if local {
                TokenKind::LocalParamKeyword
            } else {
                TokenKind::ParameterKeyword
            }),
            data_type,
            declarators: vec![DeclaratorSyntax::new(name, initializer)],
            span: Span::default(),
        }
    }
}

impl FunctionDeclarationSyntax {
    /// Creates an automatic function.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        return_type: Option<DataTypeSyntax>,
        ports: Vec<SubroutinePortSyntax>,
        body: Vec<StatementSyntax>,
    ) -> Self {
        Self {
            name: Token::identifier(name),
            lifetime: Some(LifetimeSyntax::Automatic),
            qualifiers: FunctionQualifiers::default(),
            return_type,
            ports,
            body,
            span: Span::default(),
        }
    }
}
