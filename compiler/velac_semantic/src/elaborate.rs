//! Contains the elaborator: lazy, demand-driven construction of the symbol
//! graph from registered syntax trees.
//!
//! Registration is eager and cheap: every compilation unit, package, and
//! design definition lands in the root's namespaces up front. Everything
//! else happens when somebody asks: forcing a scope's members runs the
//! member construction below, which may bind types, evaluate parameters,
//! and recursively parameterize instantiated modules.

use std::sync::Arc;

use velac_base::span::{SourceElement, Span};
use velac_syntax::{
    data_type::{DataTypeSyntax, VariableDimensionSyntax},
    item::{
        ClassVisibility, CompilationUnitSyntax, DataDeclarationSyntax,
        LifetimeSyntax, MemberSyntax, NetDeclarationSyntax,
        ParamAssignmentSyntax, ParameterDeclarationSyntax,
    },
    TokenKind,
};

use crate::{
    arena::{NameId, ID},
    bind::{BindContext, BindFlags},
    diagnostic::{DiagCode, Diagnostic, Related},
    symbol::{
        AliasState, Block, BlockKind, BlockSyntax, BodyState, ClassDef,
        CompilationUnit, EnumValue, FormalArgument, Import, ImportKind,
        ImportState, Instance, InstanceBody, LookupLocation, ModuleDef, Net,
        NetKind, Package, Parameter, ParameterInfo, ParamState, ScopeData,
        ScopeState, Subroutine, SubroutineKind, SubroutineSyntax, SymbolId,
        TypeAlias, Variable, VarFlavor,
    },
    ty::{ConstantRange, TypeId},
    value::ConstantValue,
    Compilation,
};

/// Bodies deeper than this many instantiations apart are assumed to be a
/// recursive hierarchy.
const MAX_INSTANTIATION_DEPTH: usize = 128;

impl Compilation {
    /// Registers a parsed compilation unit: the unit itself, its packages,
    /// and its design definitions land in the root namespaces. Member
    /// construction inside any of them stays deferred.
    pub fn add_syntax_tree(&mut self, syntax: Arc<CompilationUnitSyntax>) {
        let unit_id = self.units.insert(CompilationUnit {
            span: Span::default(),
            scope: ScopeData::default(),
            syntax: Arc::clone(&syntax),
        });
        self.root.units.push(unit_id);

        for member in &syntax.members {
            match member {
                MemberSyntax::Package(package) => {
                    let name = self.interner.intern(package.name.value_text());
                    let package_id = self.packages.insert(Package {
                        name,
                        span: package.span,
                        parent: SymbolId::Unit(unit_id),
                        scope: ScopeData::default(),
                        syntax: Arc::new(package.clone()),
                    });
                    if let Some(existing) =
                        self.root.packages.insert(name, package_id)
                    {
                        self.report_redefinition(
                            package.span,
                            name,
                            SymbolId::Package(existing),
                        );
                        self.root.packages.insert(name, existing);
                    }
                }
                MemberSyntax::Module(module) => {
                    let name = self.interner.intern(module.name.value_text());
                    let module_id = self.modules.insert(ModuleDef {
                        name,
                        span: module.span,
                        kind: module.kind,
                        parent: SymbolId::Unit(unit_id),
                        syntax: Arc::new(module.clone()),
                        param_info: None,
                        bodies: Vec::new(),
                    });
                    if let Some(existing) =
                        self.root.definitions.insert(name, module_id)
                    {
                        self.report_redefinition(
                            module.span,
                            name,
                            SymbolId::Module(existing),
                        );
                        self.root.definitions.insert(name, existing);
                    }
                }
                _ => {}
            }
        }
    }

    /// The registered compilation units, in registration order.
    #[must_use]
    pub fn units(&self) -> Vec<ID<CompilationUnit>> { self.root.units.clone() }

    /// Returns the fully elaborated top-level instances, creating them on
    /// first call. Explicitly configured top modules win; otherwise every
    /// definition not instantiated by another definition is a top.
    pub fn tops(&mut self) -> Vec<ID<Instance>> {
        if let Some(cached) = &self.tops_cache {
            return cached.clone();
        }

        let top_defs: Vec<ID<ModuleDef>> = if self.options().top_modules.is_empty()
        {
            let mut instantiated = std::collections::HashSet::new();
            for module_id in self.modules.ids().collect::<Vec<_>>() {
                let syntax = Arc::clone(&self.module(module_id).syntax);
                collect_instantiated(&syntax.members, &mut |name| {
                    instantiated.insert(name.to_owned());
                });
            }
            self.modules
                .ids()
                .filter(|id| {
                    let name = self.name(self.module(*id).name);
                    !instantiated.contains(name)
                })
                .collect()
        } else {
            let names = self.options().top_modules.clone();
            names
                .iter()
                .filter_map(|name| {
                    let id = self.interner.intern(name);
                    let found = self.root.definitions.get(&id).copied();
                    if found.is_none() {
                        self.report(Diagnostic::new(
                            DiagCode::UnknownDefinition,
                            Span::default(),
                            format!("unknown top module `{name}`"),
                        ));
                    }
                    found
                })
                .collect()
        };

        let mut tops = Vec::new();
        for module_id in top_defs {
            let span = self.module(module_id).span;
            let Some(body) =
                self.parameterize(module_id, &[], SymbolId::Root, span)
            else {
                continue;
            };
            let name = self.module(module_id).name;
            let instance_id = self.instances.insert(Instance {
                name,
                span,
                parent: SymbolId::Root,
                body,
                decl_index: 0,
            });
            self.force_hierarchy(body, 0);
            tops.push(instance_id);
        }

        self.tops_cache = Some(tops.clone());
        tops
    }

    fn report_redefinition(
        &mut self,
        span: Span,
        name: NameId,
        existing: SymbolId,
    ) {
        let related = Related::declared_here(self.symbol_span(existing));
        self.report(
            Diagnostic::new(
                DiagCode::Redefinition,
                span,
                format!("`{}` is already defined", self.name(name)),
            )
            .with_related(related),
        );
    }

    /// Runs the lazy-init state machine of a scope: `Uninitialized ->
    /// InProgress -> Initialized`. Forcing a scope that is already in
    /// progress is a dependency cycle; the scope is finalized with a
    /// bad marker and whatever members it has so far.
    pub(crate) fn force_scope(&mut self, scope: SymbolId) {
        let scope = self.effective_scope(scope);
        let Some(data) = self.scope_data(scope) else {
            return;
        };

        match data.state {
            ScopeState::Initialized => return,
            ScopeState::InProgress => {
                let span = self.symbol_span(scope);
                let name = self.qualified_name(scope);
                self.report(Diagnostic::new(
                    DiagCode::RecursiveDefinition,
                    span,
                    format!("`{name}` depends on its own elaboration"),
                ));
                let data = self.scope_data_mut(scope).unwrap();
                data.contains_bad = true;
                data.state = ScopeState::Initialized;
                return;
            }
            ScopeState::Uninitialized => {}
        }
        self.scope_data_mut(scope).unwrap().state = ScopeState::InProgress;

        match scope {
            SymbolId::Unit(id) => {
                let syntax = Arc::clone(&self.unit(id).syntax);
                for member in &syntax.members {
                    // definitions were registered eagerly and are not
                    // members of the unit scope
                    if matches!(
                        member,
                        MemberSyntax::Module(_) | MemberSyntax::Package(_)
                    ) {
                        continue;
                    }
                    self.elaborate_member(scope, member, false);
                }
            }
            SymbolId::Package(id) => {
                let syntax = Arc::clone(&self.package(id).syntax);
                for member in &syntax.members {
                    self.elaborate_member(scope, member, false);
                }
            }
            SymbolId::InstanceBody(id) => self.elaborate_instance_body(id),
            SymbolId::Class(id) => self.elaborate_class(id),
            SymbolId::Subroutine(id) => self.force_subroutine(id),
            SymbolId::Block(id) => self.elaborate_block(id),
            _ => {}
        }

        if let Some(data) = self.scope_data_mut(scope) {
            if data.state == ScopeState::InProgress {
                data.state = ScopeState::Initialized;
            }
        }
    }

    fn elaborate_instance_body(&mut self, id: ID<InstanceBody>) {
        let definition = self.instance_body(id).definition;
        let syntax = Arc::clone(&self.module(definition).syntax);
        let scope = SymbolId::InstanceBody(id);

        for decl in &syntax.parameter_ports {
            self.elaborate_parameters(scope, decl, false);
        }
        for member in &syntax.members {
            self.elaborate_member(scope, member, true);
        }
    }

    fn elaborate_class(&mut self, id: ID<ClassDef>) {
        let syntax = Arc::clone(&self.class(id).syntax);
        let scope = SymbolId::Class(id);
        let parent = self.class(id).parent;

        // base and implemented interfaces resolve together with the scope
        if let Some(extends) = &syntax.extends {
            let name = self.interner.intern(extends.value_text());
            let result = self.lookup(
                parent,
                name,
                crate::symbol::Namespace::Members,
                LookupLocation::MAX,
                crate::lookup::LookupOptions { allow_declared_after: true },
                extends.span,
            );
            match result.symbol {
                Some(SymbolId::Class(base)) => {
                    self.class_mut(id).base = Some(base);
                }
                Some(other) => {
                    let span = extends.span;
                    let kind = self.symbol_kind(other);
                    self.report(Diagnostic::new(
                        DiagCode::NotAType,
                        span,
                        format!(
                            "`{}` is a {kind}, not a class",
                            self.name(name)
                        ),
                    ));
                }
                None if !result.reported => {
                    self.report(Diagnostic::new(
                        DiagCode::UndeclaredIdentifier,
                        extends.span,
                        format!("unknown base class `{}`", self.name(name)),
                    ));
                }
                None => {}
            }
        }
        for implements in syntax.implements.clone() {
            let name = self.interner.intern(implements.value_text());
            let result = self.lookup(
                parent,
                name,
                crate::symbol::Namespace::Members,
                LookupLocation::MAX,
                crate::lookup::LookupOptions { allow_declared_after: true },
                implements.span,
            );
            if let Some(SymbolId::Class(interface)) = result.symbol {
                self.class_mut(id).implements.push(interface);
            }
        }

        for item in &syntax.items {
            self.elaborate_class_item(
                scope,
                &item.member,
                item.is_static,
                item.visibility,
            );
        }
    }

    fn elaborate_block(&mut self, id: ID<Block>) {
        let scope = SymbolId::Block(id);
        match self.block(id).syntax.clone() {
            BlockSyntax::Generate(generate) => {
                for member in &generate.members {
                    self.elaborate_member(scope, member, false);
                }
            }
            BlockSyntax::Procedural(procedural) => {
                let ctx = BindContext::new(scope, LookupLocation::MAX)
                    .with_flags(BindFlags {
                        procedural: true,
                        ..BindFlags::default()
                    });
                let body = self.bind_statement(&procedural.body, &ctx);
                self.block_mut(id).body = Some(Arc::new(body));
            }
            BlockSyntax::Sequential(_) => {
                // populated by the statement binder that created it
            }
        }
    }

    fn elaborate_class_item(
        &mut self,
        scope: SymbolId,
        member: &MemberSyntax,
        is_static: bool,
        visibility: ClassVisibility,
    ) {
        match member {
            MemberSyntax::Function(function) => {
                let id = self.add_subroutine_symbol(
                    scope,
                    SubroutineSyntax::Function(Arc::new(function.clone())),
                );
                let subroutine = self.subroutine_mut(id);
                subroutine.is_static_method = is_static;
                subroutine.visibility = visibility;
            }
            MemberSyntax::Data(data) => {
                self.elaborate_data(scope, data, is_static, visibility);
            }
            other => self.elaborate_member(scope, other, false),
        }
    }

    /// Creates the symbols for one scope member. `allow_body_params`
    /// marks parameter declarations as body parameters (instance bodies).
    fn elaborate_member(
        &mut self,
        scope: SymbolId,
        member: &MemberSyntax,
        allow_body_params: bool,
    ) {
        match member {
            MemberSyntax::Module(_) | MemberSyntax::Package(_) => {
                // nested definitions are outside this core's scope
            }
            MemberSyntax::Class(class) => {
                let name = self.interner.intern(class.name.value_text());
                let decl_index = self.next_index(scope);
                let id = self.classes.insert(ClassDef {
                    name,
                    span: class.span,
                    parent: scope,
                    is_interface: class.is_interface,
                    base: None,
                    implements: Vec::new(),
                    scope: ScopeData::default(),
                    syntax: Arc::new(class.clone()),
                    decl_index,
                });
                self.insert_member(scope, name, SymbolId::Class(id), class.span);
            }
            MemberSyntax::Function(function) => {
                self.add_subroutine_symbol(
                    scope,
                    SubroutineSyntax::Function(Arc::new(function.clone())),
                );
            }
            MemberSyntax::Task(task) => {
                self.add_subroutine_symbol(
                    scope,
                    SubroutineSyntax::Task(Arc::new(task.clone())),
                );
            }
            MemberSyntax::Data(data) => self.elaborate_data(
                scope,
                data,
                false,
                ClassVisibility::Public,
            ),
            MemberSyntax::Net(net) => self.elaborate_net(scope, net),
            MemberSyntax::Parameter(decl) => {
                self.elaborate_parameters(scope, decl, allow_body_params);
            }
            MemberSyntax::Typedef(typedef) => {
                let name = self.interner.intern(typedef.name.value_text());
                if matches!(scope, SymbolId::InstanceBody(_))
                    && self.scope_data(scope).is_some_and(|data| {
                        data.name_map.contains_key(&name)
                    })
                {
                    return;
                }
                self.create_typedef(scope, typedef);
            }
            MemberSyntax::Import(declaration) => {
                // instance bodies create their imports before parameter
                // evaluation; see parameterize
                if !matches!(scope, SymbolId::InstanceBody(_)) {
                    self.create_imports(scope, declaration);
                }
            }
            MemberSyntax::Instantiation(instantiation) => {
                let module_name =
                    self.interner.intern(instantiation.module.value_text());
                let Some(&definition) =
                    self.root.definitions.get(&module_name)
                else {
                    self.report(Diagnostic::new(
                        DiagCode::UnknownDefinition,
                        instantiation.span,
                        format!(
                            "unknown module `{}`",
                            self.name(module_name)
                        ),
                    ));
                    return;
                };

                let body = self.parameterize(
                    definition,
                    &instantiation.parameters,
                    scope,
                    instantiation.span,
                );
                for instance in &instantiation.instances {
                    let name = self.interner.intern(instance.name.value_text());
                    let decl_index = self.next_index(scope);
                    let Some(body) = body else { continue };
                    let id = self.instances.insert(Instance {
                        name,
                        span: instance.name.span,
                        parent: scope,
                        body,
                        decl_index,
                    });
                    self.insert_member(
                        scope,
                        name,
                        SymbolId::Instance(id),
                        instance.name.span,
                    );
                }
            }
            MemberSyntax::ProceduralBlock(block) => {
                let decl_index = self.next_index(scope);
                let id = self.blocks.insert(Block {
                    name: NameId::EMPTY,
                    span: block.span,
                    parent: scope,
                    kind: BlockKind::Procedural(block.kind),
                    scope: ScopeData::default(),
                    syntax: BlockSyntax::Procedural(Arc::new(block.clone())),
                    body: None,
                    decl_index,
                });
                self.scope_data_mut(scope)
                    .unwrap()
                    .members
                    .push(SymbolId::Block(id));
            }
            MemberSyntax::GenerateBlock(generate) => {
                let name = generate
                    .label
                    .as_ref()
                    .map_or(NameId::EMPTY, |label| {
                        self.interner.intern(label.value_text())
                    });
                let decl_index = self.next_index(scope);
                let id = self.blocks.insert(Block {
                    name,
                    span: generate.span,
                    parent: scope,
                    kind: BlockKind::Generate,
                    scope: ScopeData::default(),
                    syntax: BlockSyntax::Generate(Arc::new(generate.clone())),
                    body: None,
                    decl_index,
                });
                if name == NameId::EMPTY {
                    self.scope_data_mut(scope)
                        .unwrap()
                        .members
                        .push(SymbolId::Block(id));
                } else {
                    self.insert_member(
                        scope,
                        name,
                        SymbolId::Block(id),
                        generate.span,
                    );
                }
            }
        }
    }

    fn elaborate_data(
        &mut self,
        scope: SymbolId,
        data: &DataDeclarationSyntax,
        is_static_member: bool,
        visibility: ClassVisibility,
    ) {
        for declarator in &data.declarators {
            let name = self.interner.intern(declarator.name.value_text());
            let decl_index = self.next_index(scope);
            let location = LookupLocation::before(decl_index);
            let base = self.type_from_syntax(
                &data.data_type,
                scope,
                location,
                false,
                None,
            );
            let ty = self.apply_unpacked_dims(
                base,
                &declarator.dimensions,
                scope,
                location,
            );
            let id = self.variables.insert(Variable {
                name,
                span: declarator.name.span,
                parent: scope,
                ty,
                is_const: data.is_const,
                is_static_member,
                visibility,
                flavor: VarFlavor::Normal,
                initializer: declarator.initializer.clone(),
                decl_index,
            });
            self.insert_member(
                scope,
                name,
                SymbolId::Variable(id),
                declarator.name.span,
            );
        }
    }

    fn elaborate_net(
        &mut self,
        scope: SymbolId,
        net: &NetDeclarationSyntax,
    ) {
        let kind = match net.net_kind.kind {
            TokenKind::TriKeyword => NetKind::Tri,
            _ => NetKind::Wire,
        };
        for declarator in &net.declarators {
            let name = self.interner.intern(declarator.name.value_text());
            let decl_index = self.next_index(scope);
            let location = LookupLocation::before(decl_index);
            let base = self.type_from_syntax(
                &net.data_type,
                scope,
                location,
                false,
                None,
            );
            let ty = self.apply_unpacked_dims(
                base,
                &declarator.dimensions,
                scope,
                location,
            );
            let id = self.nets.insert(Net {
                name,
                span: declarator.name.span,
                parent: scope,
                kind,
                ty,
                decl_index,
            });
            self.insert_member(
                scope,
                name,
                SymbolId::Net(id),
                declarator.name.span,
            );
        }
    }

    fn elaborate_parameters(
        &mut self,
        scope: SymbolId,
        decl: &ParameterDeclarationSyntax,
        is_body: bool,
    ) {
        for declarator in &decl.declarators {
            let name = self.interner.intern(declarator.name.value_text());

            // instance-body formals were created during parameterization;
            // the walk only accounts for their position here
            if matches!(scope, SymbolId::InstanceBody(_))
                && self
                    .scope_data(scope)
                    .is_some_and(|data| data.name_map.contains_key(&name))
            {
                continue;
            }

            self.create_parameter(
                scope,
                decl,
                declarator.name.value_text(),
                declarator.name.span,
                declarator.initializer.clone(),
                is_body,
            );
        }
    }

    fn create_parameter(
        &mut self,
        scope: SymbolId,
        decl: &ParameterDeclarationSyntax,
        name: &str,
        span: Span,
        initializer: Option<velac_syntax::expression::ExpressionSyntax>,
        is_body: bool,
    ) -> ID<Parameter> {
        let name = self.interner.intern(name);
        let decl_index = self
            .scope_data(scope)
            .map_or(0, |data| data.members.len() as u32);
        let id = self.parameters.insert(Parameter {
            name,
            span,
            parent: scope,
            is_local: decl.is_local(),
            is_body,
            data_type: decl.data_type.clone(),
            initializer,
            override_value: None,
            state: ParamState::Declared,
            decl_index,
        });
        self.insert_member(scope, name, SymbolId::Parameter(id), span);
        id
    }

    fn add_subroutine_symbol(
        &mut self,
        scope: SymbolId,
        syntax: SubroutineSyntax,
    ) -> ID<Subroutine> {
        let (name_token, lifetime, qualifiers, kind, span) = match &syntax {
            SubroutineSyntax::Function(function) => (
                function.name.clone(),
                function.lifetime,
                function.qualifiers,
                SubroutineKind::Function,
                function.span,
            ),
            SubroutineSyntax::Task(task) => (
                task.name.clone(),
                task.lifetime,
                Default::default(),
                SubroutineKind::Task,
                task.span,
            ),
        };
        let name = self.interner.intern(name_token.value_text());
        let decl_index = self.next_index(scope);
        let in_generate = self.inside_generate(scope);
        let error = self.types.error();
        let id = self.subroutines.insert(Subroutine {
            name,
            span,
            parent: scope,
            kind,
            lifetime: lifetime.unwrap_or(LifetimeSyntax::Static),
            qualifiers,
            is_static_method: false,
            visibility: ClassVisibility::Public,
            in_generate,
            syntax,
            scope: ScopeData::default(),
            state: BodyState::SyntaxOnly,
            return_type: error,
            args: Vec::new(),
            return_var: None,
            body: None,
            decl_index,
        });
        self.insert_member(scope, name, SymbolId::Subroutine(id), span);
        id
    }

    fn inside_generate(&self, mut scope: SymbolId) -> bool {
        loop {
            if let SymbolId::Block(id) = scope {
                if self.block(id).kind == BlockKind::Generate {
                    return true;
                }
            }
            if scope == SymbolId::Root {
                return false;
            }
            scope = self.symbol_parent(scope);
        }
    }

    /// Inserts a named member, reporting a redefinition when the name is
    /// taken. The first declaration wins.
    pub(crate) fn insert_member(
        &mut self,
        scope: SymbolId,
        name: NameId,
        symbol: SymbolId,
        span: Span,
    ) {
        let data = self.scope_data_mut(scope).unwrap();
        data.members.push(symbol);
        if name == NameId::EMPTY {
            return;
        }
        if let Some(&existing) = data.name_map.get(&name) {
            self.report_redefinition(span, name, existing);
            return;
        }
        self.scope_data_mut(scope).unwrap().name_map.insert(name, symbol);
    }
}

fn collect_instantiated(
    members: &[MemberSyntax],
    sink: &mut impl FnMut(&str),
) {
    for member in members {
        match member {
            MemberSyntax::Instantiation(instantiation) => {
                sink(instantiation.module.value_text());
            }
            MemberSyntax::GenerateBlock(generate) => {
                collect_instantiated(&generate.members, sink);
            }
            MemberSyntax::Module(module) => {
                collect_instantiated(&module.members, sink);
            }
            _ => {}
        }
    }
}

impl Compilation {
    fn next_index(&self, scope: SymbolId) -> u32 {
        self.scope_data(scope).map_or(0, |data| data.members.len() as u32)
    }

    /// Forces the whole hierarchy under an instance body, bounded against
    /// runaway recursive instantiation.
    pub(crate) fn force_hierarchy(&mut self, body: ID<InstanceBody>, depth: usize) {
        if depth > MAX_INSTANTIATION_DEPTH {
            let definition = self.instance_body(body).definition;
            let span = self.module(definition).span;
            let name = self.name(self.module(definition).name).to_owned();
            self.report(Diagnostic::new(
                DiagCode::RecursiveDefinition,
                span,
                format!("instantiation of `{name}` never terminates"),
            ));
            return;
        }

        let members = self.members(SymbolId::InstanceBody(body));
        for member in members {
            if let SymbolId::Instance(instance) = member {
                let child = self.instance(instance).body;
                self.force_hierarchy(child, depth + 1);
            }
        }
    }

    /// Collects the formal parameters of a definition in declaration
    /// order, caching the list on the definition. Duplicate names are
    /// reported and dropped.
    fn collect_param_info(
        &mut self,
        definition: ID<ModuleDef>,
    ) -> Arc<Vec<ParameterInfo>> {
        if let Some(info) = &self.module(definition).param_info {
            return Arc::clone(info);
        }

        let syntax = Arc::clone(&self.module(definition).syntax);
        let mut info: Vec<ParameterInfo> = Vec::new();

        let mut collect = |this: &mut Self,
                           decl: &ParameterDeclarationSyntax,
                           is_body: bool,
                           info: &mut Vec<ParameterInfo>| {
            for declarator in &decl.declarators {
                let name = this.interner.intern(declarator.name.value_text());
                if let Some(existing) =
                    info.iter().find(|entry| entry.name == name)
                {
                    let related = Related::declared_here(existing.span);
                    this.report(
                        Diagnostic::new(
                            DiagCode::DuplicateParameter,
                            declarator.name.span,
                            format!(
                                "parameter `{}` is declared more than once",
                                this.name(name)
                            ),
                        )
                        .with_related(related),
                    );
                    continue;
                }
                info.push(ParameterInfo {
                    name,
                    span: declarator.name.span,
                    is_local: decl.is_local(),
                    is_body,
                    data_type: decl.data_type.clone(),
                    initializer: declarator.initializer.clone(),
                });
            }
        };

        for decl in &syntax.parameter_ports {
            collect(self, decl, false, &mut info);
        }
        for member in &syntax.members {
            if let MemberSyntax::Parameter(decl) = member {
                collect(self, decl, true, &mut info);
            }
        }

        let info = Arc::new(info);
        self.module_mut(definition).param_info = Some(Arc::clone(&info));
        info
    }

    fn create_imports(
        &mut self,
        scope: SymbolId,
        declaration: &velac_syntax::item::ImportDeclarationSyntax,
    ) {
        for item in &declaration.items {
            let package = self.interner.intern(item.package.value_text());
            let decl_index = self.next_index(scope);
            let kind = match &item.item {
                Some(item_token) => ImportKind::Explicit {
                    package,
                    item: self.interner.intern(item_token.value_text()),
                    state: ImportState::Unresolved,
                },
                None => ImportKind::Wildcard { package, failed: false },
            };
            let id = self.imports.insert(Import {
                span: item.span,
                parent: scope,
                kind,
                decl_index,
            });
            let data = self.scope_data_mut(scope).unwrap();
            data.members.push(SymbolId::Import(id));
            match kind {
                ImportKind::Explicit { .. } => data.explicit_imports.push(id),
                ImportKind::Wildcard { .. } => data.wildcard_imports.push(id),
            }
        }
    }

    fn create_typedef(
        &mut self,
        scope: SymbolId,
        typedef: &velac_syntax::item::TypedefDeclarationSyntax,
    ) -> ID<TypeAlias> {
        let name = self.interner.intern(typedef.name.value_text());
        let decl_index = self.next_index(scope);
        let id = self.type_aliases.insert(TypeAlias {
            name,
            span: typedef.span,
            parent: scope,
            state: AliasState::Declared,
            syntax: Arc::new(typedef.clone()),
            decl_index,
        });
        self.insert_member(scope, name, SymbolId::TypeAlias(id), typedef.span);
        id
    }

    /// Produces the instance body for one parameterization of a
    /// definition. Overrides evaluate in the instantiating scope, defaults
    /// in the new body; bodies with equal evaluated parameter sequences
    /// are shared.
    pub(crate) fn parameterize(
        &mut self,
        definition: ID<ModuleDef>,
        assignments: &[ParamAssignmentSyntax],
        instance_scope: SymbolId,
        span: Span,
    ) -> Option<ID<InstanceBody>> {
        let info = self.collect_param_info(definition);

        // match overrides to formals
        let mut overrides: Vec<Option<velac_syntax::expression::ExpressionSyntax>> =
            vec![None; info.len()];
        let positional: Vec<usize> = info
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_local && !entry.is_body)
            .map(|(index, _)| index)
            .collect();

        let mut next_positional = 0;
        let mut saw_ordered = false;
        let mut saw_named = false;
        let mut mixed_reported = false;
        let mut named_seen: Vec<NameId> = Vec::new();

        for assignment in assignments {
            match assignment {
                ParamAssignmentSyntax::Ordered(expression) => {
                    saw_ordered = true;
                    if saw_named && !mixed_reported {
                        self.report(Diagnostic::new(
                            DiagCode::MixedParamAssignment,
                            span,
                            "ordered and named parameter overrides cannot be \
                             mixed"
                                .to_owned(),
                        ));
                        mixed_reported = true;
                    }
                    if next_positional >= positional.len() {
                        self.report(Diagnostic::new(
                            DiagCode::TooManyArguments,
                            span,
                            format!(
                                "too many parameter overrides; expected at \
                                 most {}",
                                positional.len()
                            ),
                        ));
                        continue;
                    }
                    overrides[positional[next_positional]] =
                        Some(expression.clone());
                    next_positional += 1;
                }
                ParamAssignmentSyntax::Named { name, expression, span: at } => {
                    saw_named = true;
                    if saw_ordered && !mixed_reported {
                        self.report(Diagnostic::new(
                            DiagCode::MixedParamAssignment,
                            *at,
                            "ordered and named parameter overrides cannot be \
                             mixed"
                                .to_owned(),
                        ));
                        mixed_reported = true;
                    }

                    let name_id = self.interner.intern(name.value_text());
                    if named_seen.contains(&name_id) {
                        self.report(Diagnostic::new(
                            DiagCode::DuplicateNamedArgument,
                            *at,
                            format!(
                                "parameter `{}` is overridden more than once",
                                self.name(name_id)
                            ),
                        ));
                        continue;
                    }
                    named_seen.push(name_id);

                    let Some(position) =
                        info.iter().position(|entry| entry.name == name_id)
                    else {
                        self.report(Diagnostic::new(
                            DiagCode::UnknownNamedArgument,
                            *at,
                            format!(
                                "`{}` has no parameter named `{}`",
                                self.name(self.module(definition).name),
                                self.name(name_id)
                            ),
                        ));
                        continue;
                    };
                    if info[position].is_local {
                        let related =
                            Related::declared_here(info[position].span);
                        self.report(
                            Diagnostic::new(
                                DiagCode::OverridingLocalParameter,
                                *at,
                                format!(
                                    "local parameter `{}` cannot be \
                                     overridden",
                                    self.name(name_id)
                                ),
                            )
                            .with_related(related),
                        );
                        continue;
                    }
                    overrides[position] = expression.clone();
                }
            }
        }

        // overrides evaluate in the instantiating scope
        let mut override_values: Vec<Option<(TypeId, ConstantValue)>> =
            vec![None; info.len()];
        for (index, expression) in overrides.iter().enumerate() {
            let Some(expression) = expression else { continue };
            let ctx = BindContext::new(instance_scope, LookupLocation::MAX)
                .constant();
            let bound = self.bind_expression(expression, &ctx);
            let value = self.eval_constant(&bound);
            override_values[index] = Some((bound.ty, value));
        }

        // stage one: a body holding only its parameters, so the sharing
        // key can be computed without elaborating anything else
        let parent = self.module(definition).parent;
        let body = self.instance_bodies.insert(InstanceBody {
            definition,
            parent,
            scope: ScopeData::default(),
            param_values: Vec::new(),
        });
        let scope = SymbolId::InstanceBody(body);
        self.scope_data_mut(scope).unwrap().state = ScopeState::InProgress;

        // imports and typedefs come first so parameter defaults resolve
        // them; the full member walk later skips these
        let module_syntax = Arc::clone(&self.module(definition).syntax);
        for member in &module_syntax.members {
            match member {
                MemberSyntax::Import(declaration) => {
                    self.create_imports(scope, declaration);
                }
                MemberSyntax::Typedef(typedef) => {
                    self.create_typedef(scope, typedef);
                }
                _ => {}
            }
        }

        let mut param_ids = Vec::with_capacity(info.len());
        for (entry, override_value) in info.iter().zip(&override_values) {
            let decl_index = self.next_index(scope);
            let id = self.parameters.insert(Parameter {
                name: entry.name,
                span: entry.span,
                parent: scope,
                is_local: entry.is_local,
                is_body: entry.is_body,
                data_type: entry.data_type.clone(),
                initializer: entry.initializer.clone(),
                override_value: override_value.clone(),
                state: ParamState::Declared,
                decl_index,
            });
            self.insert_member(scope, entry.name, SymbolId::Parameter(id), entry.span);
            param_ids.push(id);
        }

        let key: Vec<ConstantValue> =
            param_ids.iter().map(|id| self.parameter_value(*id)).collect();
        self.scope_data_mut(scope).unwrap().state = ScopeState::Uninitialized;

        if let Some((_, existing)) = self
            .module(definition)
            .bodies
            .iter()
            .find(|(existing_key, _)| *existing_key == key)
        {
            return Some(*existing);
        }

        self.instance_body_mut(body).param_values = key.clone();
        self.module_mut(definition).bodies.push((key, body));
        Some(body)
    }

    /// Forces the `Declared -> Evaluating -> Bound` state machine of a
    /// parameter and returns its value. Re-entrant evaluation reports a
    /// dependency cycle for every parameter on the active chain and binds
    /// them all to bad.
    pub fn parameter_value(&mut self, id: ID<Parameter>) -> ConstantValue {
        match &self.parameter(id).state {
            ParamState::Bound { value, .. } => return value.clone(),
            ParamState::Evaluating => {
                let position = self
                    .param_stack
                    .iter()
                    .position(|entry| *entry == id)
                    .unwrap_or(0);
                for member in self.param_stack[position..].to_vec() {
                    // each member of the cycle reports exactly once, even
                    // when the poisoned parameter is queried again
                    if !self.param_cycle_reported.insert(member) {
                        continue;
                    }
                    let parameter = self.parameter(member);
                    let (span, name) = (parameter.span, parameter.name);
                    self.report(Diagnostic::new(
                        DiagCode::RecursiveDefinition,
                        span,
                        format!(
                            "parameter `{}` depends on its own value",
                            self.name(name)
                        ),
                    ));
                }
                return ConstantValue::Bad;
            }
            ParamState::Declared => {}
        }

        self.parameter_mut(id).state = ParamState::Evaluating;
        self.param_stack.push(id);
        let (ty, value) = self.compute_parameter(id);
        self.param_stack.pop();
        self.parameter_mut(id).state =
            ParamState::Bound { ty, value: value.clone() };
        value
    }

    /// The bound type of a parameter, forcing its value first.
    pub fn parameter_type(&mut self, id: ID<Parameter>) -> TypeId {
        self.parameter_value(id);
        match &self.parameter(id).state {
            ParamState::Bound { ty, .. } => *ty,
            _ => self.types.error(),
        }
    }

    fn compute_parameter(
        &mut self,
        id: ID<Parameter>,
    ) -> (TypeId, ConstantValue) {
        let parameter = self.parameter(id);
        let scope = parameter.parent;
        let span = parameter.span;
        let location = LookupLocation::before(parameter.decl_index);
        let data_type = parameter.data_type.clone();
        let initializer = parameter.initializer.clone();
        let override_value = parameter.override_value.clone();

        // a bare untyped parameter takes the type of its value
        let inferred = matches!(
            &data_type,
            DataTypeSyntax::Implicit(implicit)
                if implicit.signing.is_none()
                    && implicit.packed_dimensions.is_empty()
        );

        if let Some((override_ty, override_value)) = override_value {
            let ty = if inferred {
                override_ty
            } else {
                self.type_from_syntax(&data_type, scope, location, false, None)
            };
            let value = self.types.coerce_value(ty, &override_value);
            return (ty, value);
        }

        let Some(initializer) = initializer else {
            let name = self.name(self.parameter(id).name).to_owned();
            self.report(Diagnostic::new(
                DiagCode::ParamHasNoValue,
                span,
                format!(
                    "parameter `{name}` has no default and no override value"
                ),
            ));
            return (self.types.error(), ConstantValue::Bad);
        };

        // parameters see each other regardless of declaration order; the
        // cycle machinery catches mutual dependence
        let ctx = BindContext::new(scope, location)
            .constant()
            .allow_declared_after();

        if inferred {
            let bound = self.bind_expression(&initializer, &ctx);
            let ty = bound.ty;
            let value = self.eval_constant(&bound);
            (ty, self.types.coerce_value(ty, &value))
        } else {
            let ty =
                self.type_from_syntax(&data_type, scope, location, false, None);
            let ctx = ctx.with_target(ty);
            let bound = self.bind_expression(&initializer, &ctx);
            let value = self.eval_constant(&bound);
            (ty, self.types.coerce_value(ty, &value))
        }
    }

    /// Runs the subroutine binding state machine: `SyntaxOnly ->
    /// BindingArguments -> BindingBody -> Ready`. Re-entry during body
    /// binding is legal; the signature is complete by then.
    pub(crate) fn force_subroutine(&mut self, id: ID<Subroutine>) {
        if self.subroutine(id).state != BodyState::SyntaxOnly {
            return;
        }
        self.subroutine_mut(id).state = BodyState::BindingArguments;

        let scope = SymbolId::Subroutine(id);
        let syntax = self.subroutine(id).syntax.clone();
        let kind = self.subroutine(id).kind;
        let (ports, return_type_syntax, body_syntax) = match &syntax {
            SubroutineSyntax::Function(function) => (
                function.ports.clone(),
                function.return_type.clone(),
                function.body.clone(),
            ),
            SubroutineSyntax::Task(task) => {
                (task.ports.clone(), None, task.body.clone())
            }
        };

        let return_type = match (kind, &return_type_syntax) {
            (SubroutineKind::Function, Some(ty)) => self.type_from_syntax(
                ty,
                scope,
                LookupLocation::MAX,
                false,
                None,
            ),
            _ => self.types.void_type(),
        };
        self.subroutine_mut(id).return_type = return_type;

        // an omitted port type inherits the previous port's type
        let mut last_type: Option<DataTypeSyntax> = None;
        let mut args = Vec::with_capacity(ports.len());
        for port in &ports {
            let direction = match port.direction.as_ref().map(|token| token.kind)
            {
                Some(TokenKind::OutputKeyword) => {
                    crate::symbol::ArgDirection::Out
                }
                Some(TokenKind::InOutKeyword) => {
                    crate::symbol::ArgDirection::InOut
                }
                Some(TokenKind::RefKeyword) => crate::symbol::ArgDirection::Ref,
                _ => crate::symbol::ArgDirection::In,
            };
            let ty_syntax = port
                .data_type
                .clone()
                .or_else(|| last_type.clone())
                .unwrap_or_else(|| {
                    DataTypeSyntax::keyword(
                        velac_syntax::data_type::IntegerTypeKeyword::Logic,
                    )
                });
            last_type = Some(ty_syntax.clone());
            let ty = self.type_from_syntax(
                &ty_syntax,
                scope,
                LookupLocation::MAX,
                false,
                None,
            );

            let name = self.interner.intern(port.name.value_text());
            let decl_index = self.next_index(scope);
            let arg = self.formals.insert(FormalArgument {
                name,
                span: port.name.span,
                parent: scope,
                direction,
                ty,
                default: port.default.clone(),
                decl_index,
            });
            self.insert_member(
                scope,
                name,
                SymbolId::Formal(arg),
                port.name.span,
            );
            args.push(arg);
        }
        self.subroutine_mut(id).args = args;

        // the return-value local carries the subroutine's own name
        if kind == SubroutineKind::Function
            && return_type != self.types.void_type()
        {
            let subroutine = self.subroutine(id);
            let (name, span) = (subroutine.name, subroutine.span);
            let decl_index = self.next_index(scope);
            let var = self.variables.insert(Variable {
                name,
                span,
                parent: scope,
                ty: return_type,
                is_const: false,
                is_static_member: false,
                visibility: ClassVisibility::Public,
                flavor: VarFlavor::ReturnValue,
                initializer: None,
                decl_index,
            });
            self.insert_member(scope, name, SymbolId::Variable(var), span);
            self.subroutine_mut(id).return_var = Some(var);
        }

        self.subroutine_mut(id).state = BodyState::BindingBody;
        let ctx = BindContext::new(scope, LookupLocation::MAX).procedural();
        let statements: Vec<crate::stmt::Statement> = body_syntax
            .iter()
            .map(|statement| self.bind_statement(statement, &ctx))
            .collect();
        self.subroutine_mut(id).body =
            Some(Arc::new(crate::stmt::Statement::Block {
                block: None,
                statements,
            }));
        self.subroutine_mut(id).state = BodyState::Ready;
    }
}

impl Compilation {
    /// Resolves a syntactic data type in the given scope context.
    ///
    /// `force_signed` turns an unsigned integral result signed (used by
    /// contexts carrying their own `signed` keyword). `typedef_target`
    /// names the alias being defined, so a self-referential typedef is
    /// caught immediately.
    pub fn type_from_syntax(
        &mut self,
        syntax: &DataTypeSyntax,
        scope: SymbolId,
        location: LookupLocation,
        force_signed: bool,
        typedef_target: Option<ID<TypeAlias>>,
    ) -> TypeId {
        match syntax {
            DataTypeSyntax::Integer(integer) => {
                let keyword = integer.keyword;
                let signed = match integer.signing {
                    Some(velac_syntax::data_type::Signing::Signed) => true,
                    Some(velac_syntax::data_type::Signing::Unsigned) => false,
                    None => keyword.default_signed(),
                } || force_signed;
                let four_state = keyword.four_state();
                let is_reg = keyword
                    == velac_syntax::data_type::IntegerTypeKeyword::Reg;

                if integer.packed_dimensions.is_empty() {
                    return self.types.get_integral(
                        keyword.width(),
                        signed,
                        four_state,
                        is_reg,
                    );
                }

                let Some(dims) = self.eval_packed_dimensions(
                    &integer.packed_dimensions,
                    scope,
                    location,
                ) else {
                    return self.types.error();
                };
                // a vector of a multi-bit keyword folds the keyword width
                // into the innermost dimension
                let mut dims = dims;
                if keyword.width() > 1 {
                    dims.push(ConstantRange {
                        left: i64::from(keyword.width()) - 1,
                        right: 0,
                    });
                }
                self.types.get_vector(signed, four_state, is_reg, dims)
            }
            DataTypeSyntax::Real(real) => {
                let kind = match real.keyword {
                    velac_syntax::data_type::RealTypeKeyword::ShortReal => {
                        crate::ty::FloatKind::ShortReal
                    }
                    velac_syntax::data_type::RealTypeKeyword::Real => {
                        crate::ty::FloatKind::Real
                    }
                    velac_syntax::data_type::RealTypeKeyword::RealTime => {
                        crate::ty::FloatKind::RealTime
                    }
                };
                self.types.get_predefined(
                    match kind {
                        crate::ty::FloatKind::ShortReal => {
                            crate::ty::PredefinedType::ShortReal
                        }
                        crate::ty::FloatKind::Real => {
                            crate::ty::PredefinedType::Real
                        }
                        crate::ty::FloatKind::RealTime => {
                            crate::ty::PredefinedType::RealTime
                        }
                    },
                    false,
                )
            }
            DataTypeSyntax::String { .. } => self.types.string_type(),
            DataTypeSyntax::Chandle { .. } => {
                self.types.get_predefined(crate::ty::PredefinedType::CHandle, false)
            }
            DataTypeSyntax::Event { .. } => {
                self.types.get_predefined(crate::ty::PredefinedType::Event, false)
            }
            DataTypeSyntax::Void { .. } => self.types.void_type(),
            DataTypeSyntax::Implicit(implicit) => {
                let signed = matches!(
                    implicit.signing,
                    Some(velac_syntax::data_type::Signing::Signed)
                ) || force_signed;
                if implicit.packed_dimensions.is_empty() {
                    return self.types.get_integral(1, signed, true, false);
                }
                let Some(dims) = self.eval_packed_dimensions(
                    &implicit.packed_dimensions,
                    scope,
                    location,
                ) else {
                    return self.types.error();
                };
                self.types.get_vector(signed, true, false, dims)
            }
            DataTypeSyntax::Enum(enumeration) => {
                self.enum_from_syntax(enumeration, scope, location)
            }
            DataTypeSyntax::Struct(structure) => {
                let mut fields = Vec::with_capacity(structure.members.len());
                for member in &structure.members {
                    let ty = self.type_from_syntax(
                        &member.data_type,
                        scope,
                        location,
                        false,
                        None,
                    );
                    fields.push(crate::ty::StructField {
                        name: self.interner.intern(member.name.value_text()),
                        ty,
                    });
                }
                self.types.get_struct(fields)
            }
            DataTypeSyntax::Named(named) => {
                self.named_type(&named.name, scope, location, typedef_target)
            }
        }
    }

    fn named_type(
        &mut self,
        name: &velac_syntax::expression::NameSyntax,
        scope: SymbolId,
        location: LookupLocation,
        typedef_target: Option<ID<TypeAlias>>,
    ) -> TypeId {
        use velac_syntax::expression::NameSyntax;

        let (symbol, reported, span, name_id) = match name {
            NameSyntax::Identifier(identifier) => {
                let name_id =
                    self.interner.intern(identifier.identifier.value_text());
                let result = self.lookup(
                    scope,
                    name_id,
                    crate::symbol::Namespace::Members,
                    location,
                    crate::lookup::LookupOptions::default(),
                    identifier.identifier.span,
                );
                (
                    result.symbol,
                    result.reported,
                    identifier.identifier.span,
                    name_id,
                )
            }
            NameSyntax::Scoped(scoped) => {
                let package_name =
                    self.interner.intern(scoped.scope.value_text());
                let name_id = self.interner.intern(scoped.name.value_text());
                let Some(&package) = self.root.packages.get(&package_name)
                else {
                    self.report(Diagnostic::new(
                        DiagCode::UnknownPackage,
                        scoped.scope.span,
                        format!(
                            "unknown package `{}`",
                            self.name(package_name)
                        ),
                    ));
                    return self.types.error();
                };
                let symbol =
                    self.lookup_direct(SymbolId::Package(package), name_id);
                (symbol, false, scoped.name.span, name_id)
            }
        };

        match symbol {
            Some(SymbolId::TypeAlias(alias)) => {
                if typedef_target == Some(alias) {
                    let span = self.type_alias(alias).span;
                    let name = self.name(self.type_alias(alias).name).to_owned();
                    self.report(Diagnostic::new(
                        DiagCode::RecursiveDefinition,
                        span,
                        format!("type alias `{name}` refers to itself"),
                    ));
                    return self.types.error();
                }
                self.resolve_alias(alias)
            }
            Some(SymbolId::Class(class)) => self.types.get_class(class),
            Some(other) => {
                let kind = self.symbol_kind(other);
                self.report(Diagnostic::new(
                    DiagCode::NotAType,
                    span,
                    format!(
                        "`{}` is a {kind}, not a type",
                        self.name(name_id)
                    ),
                ));
                self.types.error()
            }
            None => {
                if !reported {
                    self.report(Diagnostic::new(
                        DiagCode::UndeclaredIdentifier,
                        span,
                        format!("unknown type `{}`", self.name(name_id)),
                    ));
                }
                self.types.error()
            }
        }
    }

    /// Runs the `Declared -> Resolving -> Resolved` state machine of a
    /// type alias.
    pub(crate) fn resolve_alias(&mut self, id: ID<TypeAlias>) -> TypeId {
        match self.type_alias(id).state {
            AliasState::Resolved(ty) => return ty,
            AliasState::Resolving => {
                let span = self.type_alias(id).span;
                let name = self.name(self.type_alias(id).name).to_owned();
                self.report(Diagnostic::new(
                    DiagCode::RecursiveDefinition,
                    span,
                    format!("type alias `{name}` depends on itself"),
                ));
                let error = self.types.error();
                self.type_alias_mut(id).state = AliasState::Resolved(error);
                return error;
            }
            AliasState::Declared => {}
        }
        self.type_alias_mut(id).state = AliasState::Resolving;

        let syntax = Arc::clone(&self.type_alias(id).syntax);
        let alias = self.type_alias(id);
        let (scope, decl_index) = (alias.parent, alias.decl_index);
        let location = LookupLocation::before(decl_index);

        let target = self.type_from_syntax(
            &syntax.data_type,
            scope,
            location,
            false,
            Some(id),
        );
        let target =
            self.apply_unpacked_dims(target, &syntax.dimensions, scope, location);

        let ty = if self.types.is_error(target) {
            target
        } else {
            self.types.get_alias(id, target)
        };
        self.type_alias_mut(id).state = AliasState::Resolved(ty);
        ty
    }

    fn enum_from_syntax(
        &mut self,
        enumeration: &velac_syntax::data_type::EnumTypeSyntax,
        scope: SymbolId,
        location: LookupLocation,
    ) -> TypeId {
        let base = match enumeration.base.as_ref() {
            None => self.types.int_type(),
            Some(base) => {
                self.type_from_syntax(base, scope, location, false, None)
            }
        };
        if !self.types.is_integral(base) && !self.types.is_error(base) {
            self.report(Diagnostic::new(
                DiagCode::NotAType,
                enumeration.span,
                "enum base type must be integral".to_owned(),
            ));
            return self.types.error();
        }
        let width = self.types.bit_width(base).max(1);
        let signed = self.types.is_signed(base);

        let mut value_ids = Vec::with_capacity(enumeration.members.len());
        let mut previous: Option<crate::logic::LogicVec> = None;
        for member in &enumeration.members {
            let value = match &member.initializer {
                Some(initializer) => {
                    let ctx = BindContext::new(scope, location)
                        .constant()
                        .with_target(base);
                    let bound = self.bind_expression(initializer, &ctx);
                    let value = self.eval_constant(&bound);
                    match self.types.coerce_value(base, &value) {
                        ConstantValue::Integer(vector) => vector,
                        _ => crate::logic::LogicVec::all_x(width, signed),
                    }
                }
                None => match &previous {
                    Some(previous) => previous
                        .add(&crate::logic::LogicVec::from_u64(width, 1)),
                    None => {
                        crate::logic::LogicVec::from_u64(width, 0)
                            .as_signed(signed)
                    }
                },
            };
            previous = Some(value.clone());

            let name = self.interner.intern(member.name.value_text());
            let decl_index = self.next_index(scope);
            let id = self.enum_values.insert(EnumValue {
                name,
                span: member.name.span,
                parent: scope,
                ty: base,
                value: ConstantValue::Integer(value),
                decl_index,
            });
            self.insert_member(
                scope,
                name,
                SymbolId::EnumValue(id),
                member.name.span,
            );
            value_ids.push(id);
        }

        let enum_ty = self.types.get_enum(base, value_ids.clone());
        for id in value_ids {
            self.enum_value_mut(id).ty = enum_ty;
        }
        enum_ty
    }

    /// Applies unpacked dimension descriptors to an element type,
    /// producing fixed, dynamic, associative, or queue array forms.
    /// Outermost dimension first, as written.
    pub fn apply_unpacked_dims(
        &mut self,
        element: TypeId,
        dimensions: &[VariableDimensionSyntax],
        scope: SymbolId,
        location: LookupLocation,
    ) -> TypeId {
        if self.types.is_error(element) {
            return element;
        }

        // a fixed dimension after a dynamically sized one has no defined
        // memory order
        let mut seen_dynamic = false;
        for dimension in dimensions {
            match dimension {
                VariableDimensionSyntax::Range { .. }
                | VariableDimensionSyntax::Size { .. } => {
                    if seen_dynamic {
                        self.report(Diagnostic::new(
                            DiagCode::MixedDimensionOrder,
                            dimension.span(),
                            "fixed dimension after a dynamically sized one"
                                .to_owned(),
                        ));
                        return self.types.error();
                    }
                }
                _ => seen_dynamic = true,
            }
        }

        let mut result = element;
        for dimension in dimensions.iter().rev() {
            result = match dimension {
                VariableDimensionSyntax::Range { left, right, span } => {
                    let bounds = self
                        .eval_dimension_bound(left, scope, location)
                        .zip(self.eval_dimension_bound(right, scope, location));
                    let Some((left, right)) = bounds else {
                        self.report(Diagnostic::new(
                            DiagCode::InvalidDimensionRange,
                            *span,
                            "dimension bounds must be constant integers"
                                .to_owned(),
                        ));
                        return self.types.error();
                    };
                    self.types
                        .get_fixed_array(result, ConstantRange { left, right })
                }
                VariableDimensionSyntax::Size { size, span } => {
                    let size = self.eval_dimension_bound(size, scope, location);
                    let Some(size) = size.filter(|size| *size > 0) else {
                        self.report(Diagnostic::new(
                            DiagCode::InvalidDimensionRange,
                            *span,
                            "dimension size must be a positive constant"
                                .to_owned(),
                        ));
                        return self.types.error();
                    };
                    self.types.get_fixed_array(
                        result,
                        ConstantRange { left: 0, right: size - 1 },
                    )
                }
                VariableDimensionSyntax::Dynamic { .. } => {
                    self.types.get_dynamic_array(result)
                }
                VariableDimensionSyntax::Associative { index_type, span: _ } => {
                    let index = index_type.as_ref().map(|index| {
                        self.type_from_syntax(
                            index, scope, location, false, None,
                        )
                    });
                    self.types.get_associative_array(result, index)
                }
                VariableDimensionSyntax::Queue { bound, span } => {
                    let bound = match bound {
                        Some(bound) => {
                            let value = self
                                .eval_dimension_bound(bound, scope, location);
                            match value {
                                Some(value) if value >= 0 => {
                                    Some(value as u32)
                                }
                                _ => {
                                    self.report(Diagnostic::new(
                                        DiagCode::InvalidDimensionRange,
                                        *span,
                                        "queue bound must be a non-negative \
                                         constant"
                                            .to_owned(),
                                    ));
                                    return self.types.error();
                                }
                            }
                        }
                        None => None,
                    };
                    self.types.get_queue(result, bound)
                }
            };
        }
        result
    }

    fn eval_packed_dimensions(
        &mut self,
        dimensions: &[velac_syntax::data_type::PackedDimensionSyntax],
        scope: SymbolId,
        location: LookupLocation,
    ) -> Option<Vec<ConstantRange>> {
        let mut result = Vec::with_capacity(dimensions.len());
        for dimension in dimensions {
            let bounds = self
                .eval_dimension_bound(&dimension.left, scope, location)
                .zip(self.eval_dimension_bound(
                    &dimension.right,
                    scope,
                    location,
                ));
            let Some((left, right)) = bounds else {
                self.report(Diagnostic::new(
                    DiagCode::InvalidDimensionRange,
                    dimension.span,
                    "dimension bounds must be constant integers".to_owned(),
                ));
                return None;
            };
            result.push(ConstantRange { left, right });
        }
        Some(result)
    }

    pub(crate) fn eval_dimension_bound(
        &mut self,
        expression: &velac_syntax::expression::ExpressionSyntax,
        scope: SymbolId,
        location: LookupLocation,
    ) -> Option<i64> {
        let ctx = BindContext::new(scope, location).constant();
        let bound = self.bind_expression(expression, &ctx);
        if self.types.is_error(bound.ty) {
            return None;
        }
        match self.eval_constant(&bound) {
            ConstantValue::Integer(value) => value.as_i64(),
            _ => None,
        }
    }
}
