//! The vela semantic core.
//!
//! Takes parsed syntax trees and produces a typed, elaborated symbol graph
//! with constant-foldable expressions. A [`Compilation`] owns every
//! allocation made along the way: symbols, types, bound expressions,
//! constant values, interned names, and the diagnostic sink. Elaboration is
//! lazy and demand-driven; asking the root for its top instances or a scope
//! for its members pulls everything the answer needs through the binder and
//! the constant evaluator.
//!
//! A compilation is strictly single-threaded; independent compilations can
//! run in parallel.

use getset::Getters;

use crate::{
    arena::{Arena, Interner, NameId},
    builtins::Registry,
    diagnostic::{Diagnostic, Diagnostics},
    symbol::{
        Block, ClassDef, CompilationUnit, EnumValue, FormalArgument, Import,
        Instance, InstanceBody, ModuleDef, Net, Package, Parameter, RootScope,
        Subroutine, TypeAlias, Variable,
    },
    ty::TypeTable,
};

pub mod arena;
pub mod bind;
pub mod builtins;
pub mod diagnostic;
pub mod elaborate;
pub mod eval;
pub mod expr;
pub mod logic;
pub mod lookup;
pub mod stmt;
pub mod symbol;
pub mod ty;
pub mod value;

#[cfg(test)]
mod tests;

/// Which branch of a `min:typ:max` expression is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum MinTypMax {
    Min,
    #[default]
    Typ,
    Max,
}

/// The configuration options recognized by the semantic core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationOptions {
    /// Which of the three branches of a min/typ/max expression is
    /// evaluated.
    pub min_typ_max: MinTypMax,

    /// Suppresses the error for hierarchical references in constant
    /// expressions (non-standard).
    pub allow_hierarchical_const: bool,

    /// Hard ceiling for constant-function recursion.
    pub max_recursion_depth: u32,

    /// Relaxes non-constant checks for interactive evaluation.
    pub script_eval: bool,

    /// Explicit list of top-level instances; empty means auto-discover.
    pub top_modules: Vec<String>,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self {
            min_typ_max: MinTypMax::default(),
            allow_hierarchical_const: false,
            max_recursion_depth: 100,
            script_eval: false,
            top_modules: Vec::new(),
        }
    }
}

/// A single owning context for all symbols, types, and diagnostics
/// produced from one set of syntax trees.
#[derive(Debug, Getters)]
pub struct Compilation {
    /// The options the compilation was created with.
    #[getset(get = "pub")]
    options: CompilationOptions,

    pub(crate) interner: Interner,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) types: TypeTable,
    pub(crate) root: RootScope,

    pub(crate) units: Arena<CompilationUnit>,
    pub(crate) packages: Arena<Package>,
    pub(crate) modules: Arena<ModuleDef>,
    pub(crate) instance_bodies: Arena<InstanceBody>,
    pub(crate) instances: Arena<Instance>,
    pub(crate) classes: Arena<ClassDef>,
    pub(crate) subroutines: Arena<Subroutine>,
    pub(crate) formals: Arena<FormalArgument>,
    pub(crate) variables: Arena<Variable>,
    pub(crate) nets: Arena<Net>,
    pub(crate) parameters: Arena<Parameter>,
    pub(crate) enum_values: Arena<EnumValue>,
    pub(crate) type_aliases: Arena<TypeAlias>,
    pub(crate) blocks: Arena<Block>,
    pub(crate) imports: Arena<Import>,

    pub(crate) builtins: Registry,

    /// The parameters currently being evaluated, used to turn re-entrant
    /// evaluation into dependency-cycle diagnostics.
    pub(crate) param_stack: Vec<arena::ID<Parameter>>,

    /// Parameters already reported as cyclic, so re-querying a poisoned
    /// parameter stays silent.
    pub(crate) param_cycle_reported: std::collections::HashSet<arena::ID<Parameter>>,

    pub(crate) tops_cache: Option<Vec<arena::ID<Instance>>>,
}

impl Default for Compilation {
    fn default() -> Self { Self::new(CompilationOptions::default()) }
}

impl Compilation {
    /// Creates an empty compilation with the given options.
    #[must_use]
    pub fn new(options: CompilationOptions) -> Self {
        Self {
            options,
            interner: Interner::default(),
            diagnostics: Diagnostics::new(),
            types: TypeTable::new(),
            root: RootScope::default(),
            units: Arena::new(),
            packages: Arena::new(),
            modules: Arena::new(),
            instance_bodies: Arena::new(),
            instances: Arena::new(),
            classes: Arena::new(),
            subroutines: Arena::new(),
            formals: Arena::new(),
            variables: Arena::new(),
            nets: Arena::new(),
            parameters: Arena::new(),
            enum_values: Arena::new(),
            type_aliases: Arena::new(),
            blocks: Arena::new(),
            imports: Arena::new(),
            builtins: Registry::new(),
            param_stack: Vec::new(),
            param_cycle_reported: std::collections::HashSet::new(),
            tops_cache: None,
        }
    }

    /// The type table holding every type in the compilation.
    #[must_use]
    pub fn types(&self) -> &TypeTable { &self.types }

    pub(crate) fn types_mut(&mut self) -> &mut TypeTable { &mut self.types }

    /// Interns a name.
    pub fn intern(&mut self, name: &str) -> NameId { self.interner.intern(name) }

    /// Resolves an interned name back to its text.
    #[must_use]
    pub fn name(&self, id: NameId) -> &str { self.interner.resolve(id) }

    /// Reports a diagnostic to the compilation's sink.
    pub(crate) fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.add(diagnostic);
    }

    /// The diagnostics collected so far, in insertion order.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> { self.diagnostics.snapshot() }

    /// Whether any collected diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool { self.diagnostics.has_errors() }

    /// Consumes the compilation and returns its diagnostics.
    #[must_use]
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_vec()
    }
}
