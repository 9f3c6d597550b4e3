//! Contains the name lookup engine.
//!
//! Search order for the `Members` namespace: the scope chain's member maps
//! innermost first, then the chain's explicit imports, then the chain's
//! wildcard imports. The `Definitions` and `Package` namespaces live on the
//! root only. Forcing a scope pulls its members through the elaborator, so
//! a lookup can trigger arbitrary amounts of lazy construction.

use crate::{
    arena::NameId,
    diagnostic::{DiagCode, Diagnostic, Related},
    symbol::{
        ImportKind, ImportState, LookupLocation, Namespace, ScopeState,
        SymbolId, SymbolKind,
    },
    Compilation,
};

/// Per-lookup knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookupOptions {
    /// Lifts the declaration-order restriction, letting a reference see
    /// members declared after it.
    pub allow_declared_after: bool,
}

/// The outcome of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookupResult {
    /// The symbol the name resolved to, if any.
    pub symbol: Option<SymbolId>,

    /// A diagnostic was already reported; the caller must not add a
    /// not-found error of its own.
    pub reported: bool,

    /// The result came from conflicting wildcard imports; the first
    /// candidate won.
    pub ambiguous: bool,
}

impl LookupResult {
    fn found(symbol: SymbolId) -> Self {
        Self { symbol: Some(symbol), reported: false, ambiguous: false }
    }

    const NOT_FOUND: Self =
        Self { symbol: None, reported: false, ambiguous: false };
}

impl Compilation {
    /// Forces lazy elaboration of the scope and returns its members in
    /// declaration order.
    pub fn members(&mut self, scope: SymbolId) -> Vec<SymbolId> {
        let scope = self.effective_scope(scope);
        self.force_scope(scope);
        self.scope_data(scope)
            .map(|data| data.members.clone())
            .unwrap_or_default()
    }

    /// Looks up a name in the given namespace, walking outward from
    /// `scope` per the search order. `at` is the referencing source range,
    /// used by the diagnostics lookup reports itself.
    pub fn lookup(
        &mut self,
        scope: SymbolId,
        name: NameId,
        namespace: Namespace,
        location: LookupLocation,
        options: LookupOptions,
        at: velac_base::span::Span,
    ) -> LookupResult {
        match namespace {
            Namespace::Definitions => {
                return self
                    .root
                    .definitions
                    .get(&name)
                    .map(|id| LookupResult::found(SymbolId::Module(*id)))
                    .unwrap_or(LookupResult::NOT_FOUND);
            }
            Namespace::Package => {
                return self
                    .root
                    .packages
                    .get(&name)
                    .map(|id| LookupResult::found(SymbolId::Package(*id)))
                    .unwrap_or(LookupResult::NOT_FOUND);
            }
            Namespace::Members => {}
        }

        // member maps, innermost scope first
        let mut current = self.effective_scope(scope);
        let mut location = location;
        loop {
            self.ensure_elaborated(current);
            if let Some(data) = self.scope_data(current) {
                if let Some(&symbol) = data.name_map.get(&name) {
                    if self.visible_at(current, symbol, location, options) {
                        return LookupResult::found(symbol);
                    }

                    self.report(
                        Diagnostic::new(
                            DiagCode::UsedBeforeDeclared,
                            at,
                            format!(
                                "`{}` is used before its declaration",
                                self.name(name)
                            ),
                        )
                        .with_related(Related::declared_here(
                            self.symbol_span(symbol),
                        )),
                    );
                    return LookupResult {
                        symbol: None,
                        reported: true,
                        ambiguous: false,
                    };
                }
            }

            if current == SymbolId::Root {
                break;
            }
            // the parent sees the reference at the child's position
            location = LookupLocation::before(
                self.symbol_decl_index(current).saturating_add(1),
            );
            current = self.effective_scope(self.symbol_parent(current));
        }

        // explicit imports, innermost scope first
        let mut current = self.effective_scope(scope);
        loop {
            let imports = self
                .scope_data(current)
                .map(|data| data.explicit_imports.clone())
                .unwrap_or_default();
            for import_id in imports {
                let ImportKind::Explicit { item, .. } =
                    self.import(import_id).kind
                else {
                    continue;
                };
                if item != name {
                    continue;
                }
                if let Some(symbol) = self.resolve_explicit_import(import_id) {
                    return LookupResult::found(symbol);
                }
            }

            if current == SymbolId::Root {
                break;
            }
            current = self.effective_scope(self.symbol_parent(current));
        }

        // wildcard imports, innermost scope first; conflicting candidates
        // at one level are ambiguous
        let mut current = self.effective_scope(scope);
        loop {
            let imports = self
                .scope_data(current)
                .map(|data| data.wildcard_imports.clone())
                .unwrap_or_default();

            let mut candidate: Option<(SymbolId, NameId)> = None;
            let mut ambiguous = false;
            for import_id in imports {
                let ImportKind::Wildcard { package, failed } =
                    self.import(import_id).kind
                else {
                    continue;
                };
                if failed {
                    continue;
                }
                let Some(package_id) = self.find_package(package, import_id)
                else {
                    continue;
                };
                let Some(symbol) =
                    self.lookup_direct(SymbolId::Package(package_id), name)
                else {
                    continue;
                };

                match candidate {
                    None => candidate = Some((symbol, package)),
                    Some((existing, first_package)) if existing != symbol => {
                        self.report(
                            Diagnostic::new(
                                DiagCode::AmbiguousWildcardImport,
                                at,
                                format!(
                                    "`{}` is imported by wildcard from both \
                                     `{}` and `{}`",
                                    self.name(name),
                                    self.name(first_package),
                                    self.name(package),
                                ),
                            )
                            .with_related(Related::previous_usage(
                                self.symbol_span(existing),
                            )),
                        );
                        ambiguous = true;
                    }
                    Some(_) => {}
                }
            }

            if let Some((symbol, _)) = candidate {
                return LookupResult {
                    symbol: Some(symbol),
                    reported: ambiguous,
                    ambiguous,
                };
            }

            if current == SymbolId::Root {
                break;
            }
            current = self.effective_scope(self.symbol_parent(current));
        }

        LookupResult::NOT_FOUND
    }

    /// Looks a name up in the scope's own member map only: no parent walk,
    /// no imports, no declaration-order restriction. Used by explicit
    /// imports and dotted names.
    pub fn lookup_direct(
        &mut self,
        scope: SymbolId,
        name: NameId,
    ) -> Option<SymbolId> {
        let scope = self.effective_scope(scope);
        self.ensure_elaborated(scope);
        self.scope_data(scope)?.name_map.get(&name).copied()
    }

    /// Forces the scope if it has never been elaborated; a scope already
    /// in progress is read as-is so elaboration-internal lookups see the
    /// partially built map.
    pub(crate) fn ensure_elaborated(&mut self, scope: SymbolId) {
        let state = self
            .scope_data(scope)
            .map(|data| data.state)
            .unwrap_or(ScopeState::Initialized);
        if state == ScopeState::Uninitialized {
            self.force_scope(scope);
        }
    }

    fn visible_at(
        &self,
        scope: SymbolId,
        symbol: SymbolId,
        location: LookupLocation,
        options: LookupOptions,
    ) -> bool {
        if options.allow_declared_after {
            return true;
        }
        // class members are hoisted: methods and properties may be
        // referenced before their declaration
        if self.symbol_kind(scope) == SymbolKind::Class {
            return true;
        }
        self.symbol_decl_index(symbol) < location.before_index
    }

    /// Resolves an explicit import on first access, caching the result. A
    /// failed resolution reports once and then behaves like absence.
    pub(crate) fn resolve_explicit_import(
        &mut self,
        import_id: crate::arena::ID<crate::symbol::Import>,
    ) -> Option<SymbolId> {
        let ImportKind::Explicit { package, item, state } =
            self.import(import_id).kind
        else {
            return None;
        };

        match state {
            ImportState::Resolved(symbol) => return Some(symbol),
            ImportState::Failed => return None,
            ImportState::Unresolved => {}
        }

        let resolved = self.find_package(package, import_id).and_then(
            |package_id| {
                let found =
                    self.lookup_direct(SymbolId::Package(package_id), item);
                if found.is_none() {
                    let span = self.import(import_id).span;
                    self.report(Diagnostic::new(
                        DiagCode::UndeclaredIdentifier,
                        span,
                        format!(
                            "package `{}` has no member named `{}`",
                            self.name(package),
                            self.name(item)
                        ),
                    ));
                }
                found
            },
        );

        let new_state = resolved
            .map_or(ImportState::Failed, ImportState::Resolved);
        if let ImportKind::Explicit { state, .. } =
            &mut self.import_mut(import_id).kind
        {
            *state = new_state;
        }
        resolved
    }

    fn find_package(
        &mut self,
        name: NameId,
        import_id: crate::arena::ID<crate::symbol::Import>,
    ) -> Option<crate::arena::ID<crate::symbol::Package>> {
        let found = self.root.packages.get(&name).copied();
        if found.is_none() {
            let span = self.import(import_id).span;
            self.report(Diagnostic::new(
                DiagCode::UnknownPackage,
                span,
                format!("unknown package `{}`", self.name(name)),
            ));
            // poison the import so the diagnostic fires once
            match &mut self.import_mut(import_id).kind {
                ImportKind::Explicit { state, .. } => {
                    *state = ImportState::Failed;
                }
                ImportKind::Wildcard { failed, .. } => *failed = true,
            }
        }
        found
    }

    /// The dotted path of a symbol, for diagnostics.
    #[must_use]
    pub fn qualified_name(&self, id: SymbolId) -> String {
        let mut parts = Vec::new();
        let mut current = id;
        loop {
            let name = self.symbol_name(current);
            if name != NameId::EMPTY {
                parts.push(self.name(name).to_owned());
            }
            let parent = self.symbol_parent(current);
            if parent == current || matches!(parent, SymbolId::Root) {
                break;
            }
            current = parent;
        }
        parts.reverse();
        parts.join(".")
    }
}
