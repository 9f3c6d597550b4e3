//! Contains the symbol graph: one node per declaration, with parent links
//! back to the containing scope and lazily constructed children.

use std::{collections::HashMap, sync::Arc};

use enum_as_inner::EnumAsInner;
use velac_base::span::Span;
use velac_syntax::{
    data_type::DataTypeSyntax,
    expression::ExpressionSyntax,
    item::{
        ClassDeclarationSyntax, ClassVisibility, CompilationUnitSyntax,
        DefinitionKind, FunctionDeclarationSyntax, FunctionQualifiers,
        GenerateBlockSyntax, LifetimeSyntax, ModuleDeclarationSyntax,
        PackageDeclarationSyntax, ProceduralBlockKind, ProceduralBlockSyntax,
        TaskDeclarationSyntax, TypedefDeclarationSyntax,
    },
    statement::SequentialBlockStatementSyntax,
};

use crate::{
    arena::{NameId, ID},
    stmt::Statement,
    ty::TypeId,
    value::ConstantValue,
    Compilation,
};

/// The closed set of symbol kinds, used for dispatch and messaging.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::Display,
)]
pub enum SymbolKind {
    #[display("root")]
    Root,
    #[display("compilation unit")]
    CompilationUnit,
    #[display("package")]
    Package,
    #[display("module")]
    Module,
    #[display("interface")]
    Interface,
    #[display("program")]
    Program,
    #[display("instance")]
    Instance,
    #[display("generate block")]
    GenerateBlock,
    #[display("procedural block")]
    ProceduralBlock,
    #[display("sequential block")]
    SequentialBlock,
    #[display("subroutine")]
    Subroutine,
    #[display("formal argument")]
    FormalArgument,
    #[display("variable")]
    Variable,
    #[display("net")]
    Net,
    #[display("parameter")]
    Parameter,
    #[display("enum value")]
    EnumValue,
    #[display("type alias")]
    TypeAlias,
    #[display("class")]
    Class,
    #[display("import")]
    Import,
}

/// A reference to any symbol in the graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumAsInner,
)]
pub enum SymbolId {
    Root,
    Unit(ID<CompilationUnit>),
    Package(ID<Package>),
    Module(ID<ModuleDef>),
    InstanceBody(ID<InstanceBody>),
    Instance(ID<Instance>),
    Class(ID<ClassDef>),
    Subroutine(ID<Subroutine>),
    Formal(ID<FormalArgument>),
    Variable(ID<Variable>),
    Net(ID<Net>),
    Parameter(ID<Parameter>),
    EnumValue(ID<EnumValue>),
    TypeAlias(ID<TypeAlias>),
    Block(ID<Block>),
    Import(ID<Import>),
}

/// The namespaces a name can be looked up in. Auxiliary maps for
/// `Definitions` and `Package` exist on the root only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    Definitions,
    Package,
    Members,
}

/// The declaration-order position a lookup occurs at: a member whose
/// declaration index is not strictly before it is invisible unless the
/// lookup allows forward references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LookupLocation {
    pub before_index: u32,
}

impl LookupLocation {
    /// A location after every declaration in the scope.
    pub const MAX: Self = Self { before_index: u32::MAX };

    /// The location of the member with the given declaration index.
    #[must_use]
    pub const fn before(index: u32) -> Self { Self { before_index: index } }
}

/// The lazy initialization state of a scope's member list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ScopeState {
    #[default]
    Uninitialized,
    InProgress,
    Initialized,
}

/// The member storage of a scope symbol: an insertion-ordered member
/// sequence plus the name map for the `Members` namespace.
#[derive(Debug, Clone, Default)]
pub struct ScopeData {
    pub state: ScopeState,
    pub members: Vec<SymbolId>,
    pub name_map: HashMap<NameId, SymbolId>,
    pub explicit_imports: Vec<ID<Import>>,
    pub wildcard_imports: Vec<ID<Import>>,
    /// Set when initialization was abandoned because of a dependency
    /// cycle; members may be incomplete.
    pub contains_bad: bool,
}

/// The root's auxiliary namespaces and the registered units.
#[derive(Debug, Clone, Default)]
pub struct RootScope {
    pub definitions: HashMap<NameId, ID<ModuleDef>>,
    pub packages: HashMap<NameId, ID<Package>>,
    pub units: Vec<ID<CompilationUnit>>,
}

#[derive(Debug)]
pub struct CompilationUnit {
    pub span: Span,
    pub scope: ScopeData,
    pub syntax: Arc<CompilationUnitSyntax>,
}

#[derive(Debug)]
pub struct Package {
    pub name: NameId,
    pub span: Span,
    pub parent: SymbolId,
    pub scope: ScopeData,
    pub syntax: Arc<PackageDeclarationSyntax>,
}

/// A formal parameter of a module definition, cached on first use.
#[derive(Debug, Clone)]
pub struct ParameterInfo {
    pub name: NameId,
    pub span: Span,
    pub is_local: bool,
    /// Declared in the body rather than the parameter port header.
    pub is_body: bool,
    pub data_type: DataTypeSyntax,
    pub initializer: Option<ExpressionSyntax>,
}

/// A module, interface, or program definition. Definitions are registered
/// in the root's `Definitions` namespace and elaborate per parameter set
/// into shared [`InstanceBody`]s.
#[derive(Debug)]
pub struct ModuleDef {
    pub name: NameId,
    pub span: Span,
    pub kind: DefinitionKind,
    pub parent: SymbolId,
    pub syntax: Arc<ModuleDeclarationSyntax>,
    pub param_info: Option<Arc<Vec<ParameterInfo>>>,
    /// Elaborated bodies keyed by their evaluated parameter values.
    pub bodies: Vec<(Vec<ConstantValue>, ID<InstanceBody>)>,
}

/// The elaborated body of a module for one parameter value set. Multiple
/// instances with equal overrides share one body.
#[derive(Debug)]
pub struct InstanceBody {
    pub definition: ID<ModuleDef>,
    pub parent: SymbolId,
    pub scope: ScopeData,
    pub param_values: Vec<ConstantValue>,
}

#[derive(Debug)]
pub struct Instance {
    pub name: NameId,
    pub span: Span,
    pub parent: SymbolId,
    pub body: ID<InstanceBody>,
    pub decl_index: u32,
}

#[derive(Debug)]
pub struct ClassDef {
    pub name: NameId,
    pub span: Span,
    pub parent: SymbolId,
    pub is_interface: bool,
    /// Resolved base class; forced together with the scope.
    pub base: Option<ID<ClassDef>>,
    pub implements: Vec<ID<ClassDef>>,
    pub scope: ScopeData,
    pub syntax: Arc<ClassDeclarationSyntax>,
    pub decl_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubroutineKind {
    Function,
    Task,
}

/// The binding state of a subroutine: arguments first, then the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum BodyState {
    #[default]
    SyntaxOnly,
    BindingArguments,
    BindingBody,
    Ready,
}

#[derive(Debug, Clone)]
pub enum SubroutineSyntax {
    Function(Arc<FunctionDeclarationSyntax>),
    Task(Arc<TaskDeclarationSyntax>),
}

#[derive(Debug)]
pub struct Subroutine {
    pub name: NameId,
    pub span: Span,
    pub parent: SymbolId,
    pub kind: SubroutineKind,
    pub lifetime: LifetimeSyntax,
    pub qualifiers: FunctionQualifiers,
    /// Set for class methods declared `static`.
    pub is_static_method: bool,
    pub visibility: ClassVisibility,
    /// Declared under a generate block; not callable in constant
    /// expressions.
    pub in_generate: bool,
    pub syntax: SubroutineSyntax,
    pub scope: ScopeData,
    pub state: BodyState,
    pub return_type: TypeId,
    pub args: Vec<ID<FormalArgument>>,
    /// The implicit variable holding the return value during evaluation.
    pub return_var: Option<ID<Variable>>,
    pub body: Option<Arc<Statement>>,
    pub decl_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ArgDirection {
    #[default]
    In,
    Out,
    InOut,
    Ref,
}

#[derive(Debug)]
pub struct FormalArgument {
    pub name: NameId,
    pub span: Span,
    pub parent: SymbolId,
    pub direction: ArgDirection,
    pub ty: TypeId,
    pub default: Option<ExpressionSyntax>,
    pub decl_index: u32,
}

/// Distinguishes the ordinary variables from the synthesized ones the
/// evaluator treats specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum VarFlavor {
    #[default]
    Normal,
    /// The implicit return-value local of a function.
    ReturnValue,
    /// An iterator variable introduced by an array method `with` clause.
    Iterator,
}

#[derive(Debug)]
pub struct Variable {
    pub name: NameId,
    pub span: Span,
    pub parent: SymbolId,
    pub ty: TypeId,
    pub is_const: bool,
    pub is_static_member: bool,
    pub visibility: ClassVisibility,
    pub flavor: VarFlavor,
    pub initializer: Option<ExpressionSyntax>,
    pub decl_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NetKind {
    Wire,
    Tri,
}

#[derive(Debug)]
pub struct Net {
    pub name: NameId,
    pub span: Span,
    pub parent: SymbolId,
    pub kind: NetKind,
    pub ty: TypeId,
    pub decl_index: u32,
}

/// The binding state of a parameter's value.
#[derive(Debug, Clone, Default)]
pub enum ParamState {
    #[default]
    Declared,
    Evaluating,
    Bound {
        ty: TypeId,
        value: ConstantValue,
    },
}

#[derive(Debug)]
pub struct Parameter {
    pub name: NameId,
    pub span: Span,
    pub parent: SymbolId,
    pub is_local: bool,
    pub is_body: bool,
    pub data_type: DataTypeSyntax,
    pub initializer: Option<ExpressionSyntax>,
    /// An instantiation override, already evaluated in the instantiating
    /// scope, with the type the override expression had there.
    pub override_value: Option<(TypeId, ConstantValue)>,
    pub state: ParamState,
    pub decl_index: u32,
}

#[derive(Debug)]
pub struct EnumValue {
    pub name: NameId,
    pub span: Span,
    pub parent: SymbolId,
    /// The owning enum type; patched once the enum type exists.
    pub ty: TypeId,
    pub value: ConstantValue,
    pub decl_index: u32,
}

/// The resolution state of a type alias target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasState {
    #[default]
    Declared,
    Resolving,
    Resolved(TypeId),
}

#[derive(Debug)]
pub struct TypeAlias {
    pub name: NameId,
    pub span: Span,
    pub parent: SymbolId,
    pub state: AliasState,
    pub syntax: Arc<TypedefDeclarationSyntax>,
    pub decl_index: u32,
}

#[derive(Debug, Clone)]
pub enum BlockSyntax {
    Procedural(Arc<ProceduralBlockSyntax>),
    Sequential(Arc<SequentialBlockStatementSyntax>),
    Generate(Arc<GenerateBlockSyntax>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockKind {
    Procedural(ProceduralBlockKind),
    Sequential,
    Generate,
}

#[derive(Debug)]
pub struct Block {
    pub name: NameId,
    pub span: Span,
    pub parent: SymbolId,
    pub kind: BlockKind,
    pub scope: ScopeData,
    pub syntax: BlockSyntax,
    /// The bound body of a procedural block.
    pub body: Option<Arc<Statement>>,
    pub decl_index: u32,
}

/// The lazy resolution state of an explicit import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportState {
    #[default]
    Unresolved,
    Resolved(SymbolId),
    /// Resolution failed; behaves like absence for later lookups.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Explicit {
        package: NameId,
        item: NameId,
        state: ImportState,
    },
    Wildcard {
        package: NameId,
        /// The package could not be found; reported once, then the import
        /// contributes nothing.
        failed: bool,
    },
}

#[derive(Debug)]
pub struct Import {
    pub span: Span,
    pub parent: SymbolId,
    pub kind: ImportKind,
    pub decl_index: u32,
}

macro_rules! symbol_accessors {
    ($($name:ident / $field:ident: $ty:ty),* $(,)?) => {
        impl Compilation {
            paste::paste! {
                $(
                    #[doc = concat!("Returns the `", stringify!($name), "` symbol with the given id.")]
                    #[must_use]
                    pub fn $name(&self, id: ID<$ty>) -> &$ty {
                        &self.$field[id]
                    }

                    #[allow(dead_code)]
                    pub(crate) fn [<$name _mut>](&mut self, id: ID<$ty>) -> &mut $ty {
                        &mut self.$field[id]
                    }
                )*
            }
        }
    };
}

symbol_accessors! {
    unit / units: CompilationUnit,
    package / packages: Package,
    module / modules: ModuleDef,
    instance_body / instance_bodies: InstanceBody,
    instance / instances: Instance,
    class / classes: ClassDef,
    subroutine / subroutines: Subroutine,
    formal / formals: FormalArgument,
    variable / variables: Variable,
    net / nets: Net,
    parameter / parameters: Parameter,
    enum_value / enum_values: EnumValue,
    type_alias / type_aliases: TypeAlias,
    block / blocks: Block,
    import / imports: Import,
}

impl Compilation {
    /// The kind tag of any symbol.
    #[must_use]
    pub fn symbol_kind(&self, id: SymbolId) -> SymbolKind {
        match id {
            SymbolId::Root => SymbolKind::Root,
            SymbolId::Unit(_) => SymbolKind::CompilationUnit,
            SymbolId::Package(_) => SymbolKind::Package,
            SymbolId::Module(id) => match self.module(id).kind {
                DefinitionKind::Module => SymbolKind::Module,
                DefinitionKind::Interface => SymbolKind::Interface,
                DefinitionKind::Program => SymbolKind::Program,
            },
            SymbolId::InstanceBody(_) | SymbolId::Instance(_) => {
                SymbolKind::Instance
            }
            SymbolId::Class(_) => SymbolKind::Class,
            SymbolId::Subroutine(_) => SymbolKind::Subroutine,
            SymbolId::Formal(_) => SymbolKind::FormalArgument,
            SymbolId::Variable(_) => SymbolKind::Variable,
            SymbolId::Net(_) => SymbolKind::Net,
            SymbolId::Parameter(_) => SymbolKind::Parameter,
            SymbolId::EnumValue(_) => SymbolKind::EnumValue,
            SymbolId::TypeAlias(_) => SymbolKind::TypeAlias,
            SymbolId::Block(id) => match self.block(id).kind {
                BlockKind::Procedural(_) => SymbolKind::ProceduralBlock,
                BlockKind::Sequential => SymbolKind::SequentialBlock,
                BlockKind::Generate => SymbolKind::GenerateBlock,
            },
            SymbolId::Import(_) => SymbolKind::Import,
        }
    }

    /// The name of any symbol; empty for unnamed ones.
    #[must_use]
    pub fn symbol_name(&self, id: SymbolId) -> NameId {
        match id {
            SymbolId::Root | SymbolId::Unit(_) | SymbolId::Import(_) => {
                NameId::EMPTY
            }
            SymbolId::Package(id) => self.package(id).name,
            SymbolId::Module(id) => self.module(id).name,
            SymbolId::InstanceBody(id) => {
                self.module(self.instance_body(id).definition).name
            }
            SymbolId::Instance(id) => self.instance(id).name,
            SymbolId::Class(id) => self.class(id).name,
            SymbolId::Subroutine(id) => self.subroutine(id).name,
            SymbolId::Formal(id) => self.formal(id).name,
            SymbolId::Variable(id) => self.variable(id).name,
            SymbolId::Net(id) => self.net(id).name,
            SymbolId::Parameter(id) => self.parameter(id).name,
            SymbolId::EnumValue(id) => self.enum_value(id).name,
            SymbolId::TypeAlias(id) => self.type_alias(id).name,
            SymbolId::Block(id) => self.block(id).name,
        }
    }

    /// The source span of any symbol.
    #[must_use]
    pub fn symbol_span(&self, id: SymbolId) -> Span {
        match id {
            SymbolId::Root => Span::default(),
            SymbolId::Unit(id) => self.unit(id).span,
            SymbolId::Package(id) => self.package(id).span,
            SymbolId::Module(id) => self.module(id).span,
            SymbolId::InstanceBody(id) => {
                self.module(self.instance_body(id).definition).span
            }
            SymbolId::Instance(id) => self.instance(id).span,
            SymbolId::Class(id) => self.class(id).span,
            SymbolId::Subroutine(id) => self.subroutine(id).span,
            SymbolId::Formal(id) => self.formal(id).span,
            SymbolId::Variable(id) => self.variable(id).span,
            SymbolId::Net(id) => self.net(id).span,
            SymbolId::Parameter(id) => self.parameter(id).span,
            SymbolId::EnumValue(id) => self.enum_value(id).span,
            SymbolId::TypeAlias(id) => self.type_alias(id).span,
            SymbolId::Block(id) => self.block(id).span,
            SymbolId::Import(id) => self.import(id).span,
        }
    }

    /// The containing scope of any symbol. The root is its own parent.
    #[must_use]
    pub fn symbol_parent(&self, id: SymbolId) -> SymbolId {
        match id {
            SymbolId::Root | SymbolId::Unit(_) => SymbolId::Root,
            SymbolId::Package(id) => self.package(id).parent,
            SymbolId::Module(id) => self.module(id).parent,
            SymbolId::InstanceBody(id) => self.instance_body(id).parent,
            SymbolId::Instance(id) => self.instance(id).parent,
            SymbolId::Class(id) => self.class(id).parent,
            SymbolId::Subroutine(id) => self.subroutine(id).parent,
            SymbolId::Formal(id) => self.formal(id).parent,
            SymbolId::Variable(id) => self.variable(id).parent,
            SymbolId::Net(id) => self.net(id).parent,
            SymbolId::Parameter(id) => self.parameter(id).parent,
            SymbolId::EnumValue(id) => self.enum_value(id).parent,
            SymbolId::TypeAlias(id) => self.type_alias(id).parent,
            SymbolId::Block(id) => self.block(id).parent,
            SymbolId::Import(id) => self.import(id).parent,
        }
    }

    /// The declaration order index of a symbol within its scope.
    #[must_use]
    pub fn symbol_decl_index(&self, id: SymbolId) -> u32 {
        match id {
            SymbolId::Root
            | SymbolId::Unit(_)
            | SymbolId::Package(_)
            | SymbolId::Module(_)
            | SymbolId::InstanceBody(_) => 0,
            SymbolId::Instance(id) => self.instance(id).decl_index,
            SymbolId::Class(id) => self.class(id).decl_index,
            SymbolId::Subroutine(id) => self.subroutine(id).decl_index,
            SymbolId::Formal(id) => self.formal(id).decl_index,
            SymbolId::Variable(id) => self.variable(id).decl_index,
            SymbolId::Net(id) => self.net(id).decl_index,
            SymbolId::Parameter(id) => self.parameter(id).decl_index,
            SymbolId::EnumValue(id) => self.enum_value(id).decl_index,
            SymbolId::TypeAlias(id) => self.type_alias(id).decl_index,
            SymbolId::Block(id) => self.block(id).decl_index,
            SymbolId::Import(id) => self.import(id).decl_index,
        }
    }

    /// The scope storage of a scope-bearing symbol.
    #[must_use]
    pub fn scope_data(&self, id: SymbolId) -> Option<&ScopeData> {
        match id {
            SymbolId::Unit(id) => Some(&self.unit(id).scope),
            SymbolId::Package(id) => Some(&self.package(id).scope),
            SymbolId::InstanceBody(id) => Some(&self.instance_body(id).scope),
            SymbolId::Instance(id) => {
                Some(&self.instance_body(self.instance(id).body).scope)
            }
            SymbolId::Class(id) => Some(&self.class(id).scope),
            SymbolId::Subroutine(id) => Some(&self.subroutine(id).scope),
            SymbolId::Block(id) => Some(&self.block(id).scope),
            _ => None,
        }
    }

    pub(crate) fn scope_data_mut(
        &mut self,
        id: SymbolId,
    ) -> Option<&mut ScopeData> {
        match id {
            SymbolId::Unit(id) => Some(&mut self.unit_mut(id).scope),
            SymbolId::Package(id) => Some(&mut self.package_mut(id).scope),
            SymbolId::InstanceBody(id) => {
                Some(&mut self.instance_body_mut(id).scope)
            }
            SymbolId::Instance(id) => {
                let body = self.instance(id).body;
                Some(&mut self.instance_body_mut(body).scope)
            }
            SymbolId::Class(id) => Some(&mut self.class_mut(id).scope),
            SymbolId::Subroutine(id) => Some(&mut self.subroutine_mut(id).scope),
            SymbolId::Block(id) => Some(&mut self.block_mut(id).scope),
            _ => None,
        }
    }

    /// Normalizes instance references to the shared body scope.
    #[must_use]
    pub fn effective_scope(&self, id: SymbolId) -> SymbolId {
        match id {
            SymbolId::Instance(id) => {
                SymbolId::InstanceBody(self.instance(id).body)
            }
            other => other,
        }
    }
}
