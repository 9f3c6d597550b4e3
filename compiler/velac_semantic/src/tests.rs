use std::sync::Arc;

use proptest::{prop_oneof, proptest, strategy::Strategy};
use strum::IntoEnumIterator;
use velac_syntax::{
    data_type::DataTypeSyntax,
    expression::{BinaryOperator, ExpressionSyntax, LiteralBase},
    item::{
        CompilationUnitSyntax, FunctionDeclarationSyntax,
        HierarchyInstantiationSyntax, ImportDeclarationSyntax,
        ImportItemSyntax, InstanceSyntax, MemberSyntax,
        ModuleDeclarationSyntax, PackageDeclarationSyntax,
        ParamAssignmentSyntax, ParameterDeclarationSyntax,
        SubroutinePortSyntax,
    },
    statement::{ConditionalStatementSyntax, StatementSyntax},
    Token,
};

use crate::{
    bind::BindContext,
    diagnostic::DiagCode,
    logic::LogicVec,
    symbol::{LookupLocation, Namespace, ParamState, SymbolId},
    ty::{ConstantRange, PredefinedType, TypeId},
    value::ConstantValue,
    Compilation,
};

fn compile(members: Vec<MemberSyntax>) -> Compilation {
    let mut compilation = Compilation::default();
    compilation
        .add_syntax_tree(Arc::new(CompilationUnitSyntax::new(members)));
    compilation
}

fn top_parameter(
    compilation: &mut Compilation,
    module: &str,
    parameter: &str,
) -> ConstantValue {
    let tops = compilation.tops();
    let module_name = compilation.intern(module);
    let instance = tops
        .into_iter()
        .find(|id| compilation.instance(*id).name == module_name)
        .expect("top instance");
    let body = compilation.instance(instance).body;
    let name = compilation.intern(parameter);
    let Some(SymbolId::Parameter(parameter)) =
        compilation.lookup_direct(SymbolId::InstanceBody(body), name)
    else {
        panic!("parameter `{parameter}` not found");
    };
    compilation.parameter_value(parameter)
}

fn unit_context(compilation: &Compilation) -> BindContext {
    let unit = compilation.units()[0];
    BindContext::new(SymbolId::Unit(unit), LookupLocation::MAX).constant()
}

#[test]
fn integer_parameter_evaluates() {
    let module = ModuleDeclarationSyntax::new(
        "m",
        vec![MemberSyntax::Parameter(ParameterDeclarationSyntax::single(
            false,
            DataTypeSyntax::implicit(),
            "P",
            Some(ExpressionSyntax::binary(
                BinaryOperator::Add,
                ExpressionSyntax::decimal(3),
                ExpressionSyntax::decimal(4),
            )),
        ))],
    );
    let mut compilation = compile(vec![MemberSyntax::Module(module)]);

    let value = top_parameter(&mut compilation, "m", "P");

    let ConstantValue::Integer(value) = value else {
        panic!("expected an integer parameter value");
    };
    assert_eq!(value.as_i64(), Some(7));
    assert_eq!(value.width(), 32);
    assert!(value.is_signed());
    assert!(compilation.diagnostics().is_empty());
}

#[test]
fn mutually_recursive_parameters_cycle() {
    let module = ModuleDeclarationSyntax::new(
        "t",
        vec![
            MemberSyntax::Parameter(ParameterDeclarationSyntax::single(
                true,
                DataTypeSyntax::implicit(),
                "A",
                Some(ExpressionSyntax::name("B")),
            )),
            MemberSyntax::Parameter(ParameterDeclarationSyntax::single(
                true,
                DataTypeSyntax::implicit(),
                "B",
                Some(ExpressionSyntax::name("A")),
            )),
        ],
    );
    let mut compilation = compile(vec![MemberSyntax::Module(module)]);

    assert!(top_parameter(&mut compilation, "t", "A").is_bad());
    assert!(top_parameter(&mut compilation, "t", "B").is_bad());

    let cycles: Vec<_> = compilation
        .diagnostics()
        .into_iter()
        .filter(|diagnostic| {
            diagnostic.code == DiagCode::RecursiveDefinition
        })
        .collect();
    assert_eq!(cycles.len(), 2);
}

#[test]
fn four_state_addition_poisons_the_result() {
    let mut compilation = compile(Vec::new());
    let ctx = unit_context(&compilation);

    let expr = ExpressionSyntax::binary(
        BinaryOperator::Add,
        ExpressionSyntax::vector(4, LiteralBase::Binary, "10x1"),
        ExpressionSyntax::vector(4, LiteralBase::Binary, "0001"),
    );
    let bound = compilation.bind_expression(&expr, &ctx);
    let value = compilation.eval_constant(&bound);

    let ConstantValue::Integer(value) = value else {
        panic!("expected an integer result");
    };
    assert_eq!(value.to_string(), "4'bxxxx");
    assert!(compilation.diagnostics().is_empty());
}

#[test]
fn wildcard_import_feeds_a_parameter() {
    let package = PackageDeclarationSyntax::new(
        "p",
        vec![MemberSyntax::Parameter(ParameterDeclarationSyntax::single(
            false,
            DataTypeSyntax::int(),
            "K",
            Some(ExpressionSyntax::decimal(5)),
        ))],
    );
    let module = ModuleDeclarationSyntax::new(
        "m",
        vec![
            MemberSyntax::Import(ImportDeclarationSyntax {
                items: vec![ImportItemSyntax {
                    package: Token::identifier("p"),
                    item: None,
                    span: Default::default(),
                }],
                span: Default::default(),
            }),
            MemberSyntax::Parameter(ParameterDeclarationSyntax::single(
                false,
                DataTypeSyntax::int(),
                "L",
                Some(ExpressionSyntax::binary(
                    BinaryOperator::Add,
                    ExpressionSyntax::name("K"),
                    ExpressionSyntax::decimal(1),
                )),
            )),
        ],
    );
    let mut compilation = compile(vec![
        MemberSyntax::Package(package),
        MemberSyntax::Module(module),
    ]);

    let value = top_parameter(&mut compilation, "m", "L");

    assert_eq!(
        value,
        ConstantValue::Integer(LogicVec::from_i64(32, 6)),
        "diagnostics: {:?}",
        compilation.diagnostics()
    );
    assert!(compilation.diagnostics().is_empty());
}

#[test]
fn too_few_arguments_is_reported() {
    let function = FunctionDeclarationSyntax::new(
        "f",
        Some(DataTypeSyntax::int()),
        vec![
            SubroutinePortSyntax::input("a", DataTypeSyntax::int()),
            SubroutinePortSyntax::input("b", DataTypeSyntax::int()),
        ],
        vec![StatementSyntax::return_(ExpressionSyntax::name("a"))],
    );
    let mut compilation = compile(vec![MemberSyntax::Function(function)]);
    let ctx = unit_context(&compilation);

    let call =
        ExpressionSyntax::call("f", vec![ExpressionSyntax::decimal(1)]);
    let bound = compilation.bind_expression(&call, &ctx);

    assert!(bound.is_bad());
    let diagnostics = compilation.diagnostics();
    let too_few = diagnostics
        .iter()
        .find(|diagnostic| diagnostic.code == DiagCode::TooFewArguments)
        .expect("too-few-arguments diagnostic");
    assert!(too_few.message.contains("expected 2"));
    assert!(too_few.message.contains("got 1"));
}

fn factorial_function() -> FunctionDeclarationSyntax {
    // function int fact(int n);
    //   if (n <= 1) return 1; else return n * fact(n - 1);
    // endfunction
    let recurse = ExpressionSyntax::binary(
        BinaryOperator::Multiply,
        ExpressionSyntax::name("n"),
        ExpressionSyntax::call(
            "fact",
            vec![ExpressionSyntax::binary(
                BinaryOperator::Subtract,
                ExpressionSyntax::name("n"),
                ExpressionSyntax::decimal(1),
            )],
        ),
    );
    FunctionDeclarationSyntax::new(
        "fact",
        Some(DataTypeSyntax::int()),
        vec![SubroutinePortSyntax::input("n", DataTypeSyntax::int())],
        vec![StatementSyntax::Conditional(ConditionalStatementSyntax {
            condition: ExpressionSyntax::binary(
                BinaryOperator::LessThanEqual,
                ExpressionSyntax::name("n"),
                ExpressionSyntax::decimal(1),
            ),
            then_branch: Box::new(StatementSyntax::return_(
                ExpressionSyntax::decimal(1),
            )),
            else_branch: Some(Box::new(StatementSyntax::return_(recurse))),
            span: Default::default(),
        })],
    )
}

#[test]
fn constant_function_evaluates() {
    let mut compilation =
        compile(vec![MemberSyntax::Function(factorial_function())]);
    let ctx = unit_context(&compilation);

    let call =
        ExpressionSyntax::call("fact", vec![ExpressionSyntax::decimal(5)]);
    let bound = compilation.bind_expression(&call, &ctx);
    let value = compilation.eval_constant(&bound);

    assert_eq!(
        value,
        ConstantValue::Integer(LogicVec::from_i64(32, 120)),
        "diagnostics: {:?}",
        compilation.diagnostics()
    );
    assert!(compilation.diagnostics().is_empty());
}

#[test]
fn runaway_recursion_hits_the_depth_limit() {
    // function int down(int n); return down(n - 1); endfunction
    let down = FunctionDeclarationSyntax::new(
        "down",
        Some(DataTypeSyntax::int()),
        vec![SubroutinePortSyntax::input("n", DataTypeSyntax::int())],
        vec![StatementSyntax::return_(ExpressionSyntax::call(
            "down",
            vec![ExpressionSyntax::binary(
                BinaryOperator::Subtract,
                ExpressionSyntax::name("n"),
                ExpressionSyntax::decimal(1),
            )],
        ))],
    );
    let mut compilation = compile(vec![MemberSyntax::Function(down)]);
    let ctx = unit_context(&compilation);

    let call =
        ExpressionSyntax::call("down", vec![ExpressionSyntax::decimal(0)]);
    let bound = compilation.bind_expression(&call, &ctx);
    let value = compilation.eval_constant(&bound);

    assert!(value.is_bad());
    assert!(compilation
        .diagnostics()
        .iter()
        .any(|diagnostic| diagnostic.code == DiagCode::RecursionLimitExceeded));
}

#[test]
fn lookup_is_deterministic_and_elaboration_idempotent() {
    let package = PackageDeclarationSyntax::new(
        "p",
        vec![
            MemberSyntax::Parameter(ParameterDeclarationSyntax::single(
                false,
                DataTypeSyntax::int(),
                "A",
                Some(ExpressionSyntax::decimal(1)),
            )),
            MemberSyntax::Parameter(ParameterDeclarationSyntax::single(
                false,
                DataTypeSyntax::int(),
                "B",
                Some(ExpressionSyntax::decimal(2)),
            )),
        ],
    );
    let mut compilation = compile(vec![MemberSyntax::Package(package)]);

    let package_id = *compilation
        .root
        .packages
        .values()
        .next()
        .expect("registered package");
    let scope = SymbolId::Package(package_id);

    let first = compilation.members(scope);
    let second = compilation.members(scope);
    assert_eq!(first, second);

    let name = compilation.intern("A");
    let once = compilation.lookup(
        scope,
        name,
        Namespace::Members,
        LookupLocation::MAX,
        Default::default(),
        Default::default(),
    );
    let twice = compilation.lookup(
        scope,
        name,
        Namespace::Members,
        LookupLocation::MAX,
        Default::default(),
        Default::default(),
    );
    assert_eq!(once.symbol, twice.symbol);
    assert!(once.symbol.is_some());
}

#[test]
fn equal_overrides_share_one_body() {
    let inner = ModuleDeclarationSyntax {
        kind: Default::default(),
        name: Token::identifier("leaf"),
        parameter_ports: vec![ParameterDeclarationSyntax::single(
            false,
            DataTypeSyntax::implicit(),
            "W",
            Some(ExpressionSyntax::decimal(8)),
        )],
        members: Vec::new(),
        span: Default::default(),
    };
    let instantiate = |instance: &str, value: u64| {
        MemberSyntax::Instantiation(HierarchyInstantiationSyntax {
            module: Token::identifier("leaf"),
            parameters: vec![ParamAssignmentSyntax::Ordered(
                ExpressionSyntax::decimal(value),
            )],
            instances: vec![InstanceSyntax {
                name: Token::identifier(instance),
            }],
            span: Default::default(),
        })
    };
    let outer = ModuleDeclarationSyntax::new(
        "outer",
        vec![
            instantiate("u1", 16),
            instantiate("u2", 16),
            instantiate("u3", 32),
        ],
    );
    let mut compilation = compile(vec![
        MemberSyntax::Module(inner),
        MemberSyntax::Module(outer),
    ]);

    let tops = compilation.tops();
    assert_eq!(tops.len(), 1);
    let body = compilation.instance(tops[0]).body;

    let find = |compilation: &mut Compilation, name: &str| {
        let id = compilation.intern(name);
        match compilation.lookup_direct(SymbolId::InstanceBody(body), id) {
            Some(SymbolId::Instance(instance)) => {
                compilation.instance(instance).body
            }
            other => panic!("expected instance for `{name}`, got {other:?}"),
        }
    };
    let u1 = find(&mut compilation, "u1");
    let u2 = find(&mut compilation, "u2");
    let u3 = find(&mut compilation, "u3");

    assert_eq!(u1, u2);
    assert_ne!(u1, u3);
    assert!(compilation.diagnostics().is_empty());
}

#[test]
fn overriding_a_local_parameter_is_reported() {
    let inner = ModuleDeclarationSyntax::new(
        "leaf",
        vec![MemberSyntax::Parameter(ParameterDeclarationSyntax::single(
            true,
            DataTypeSyntax::implicit(),
            "L",
            Some(ExpressionSyntax::decimal(1)),
        ))],
    );
    let outer = ModuleDeclarationSyntax::new(
        "outer",
        vec![MemberSyntax::Instantiation(HierarchyInstantiationSyntax {
            module: Token::identifier("leaf"),
            parameters: vec![ParamAssignmentSyntax::Named {
                name: Token::identifier("L"),
                expression: Some(ExpressionSyntax::decimal(3)),
                span: Default::default(),
            }],
            instances: vec![InstanceSyntax { name: Token::identifier("u") }],
            span: Default::default(),
        })],
    );
    let mut compilation = compile(vec![
        MemberSyntax::Module(inner),
        MemberSyntax::Module(outer),
    ]);

    compilation.tops();

    assert!(compilation.diagnostics().iter().any(|diagnostic| {
        diagnostic.code == DiagCode::OverridingLocalParameter
    }));
}

// type construction recipes for the relation properties
#[derive(Debug, Clone)]
enum TypeRecipe {
    Predefined(PredefinedType, bool),
    Integral { width: u32, signed: bool, four_state: bool, reg: bool },
    Fixed(Box<TypeRecipe>, i64, i64),
    Dynamic(Box<TypeRecipe>),
    Queue(Box<TypeRecipe>, Option<u32>),
}

fn build_type(compilation: &mut Compilation, recipe: &TypeRecipe) -> TypeId {
    match recipe {
        TypeRecipe::Predefined(kind, signed) => {
            compilation.types_mut().get_predefined(*kind, *signed)
        }
        TypeRecipe::Integral { width, signed, four_state, reg } => compilation
            .types_mut()
            .get_integral(*width, *signed, *four_state, *reg),
        TypeRecipe::Fixed(element, left, right) => {
            let element = build_type(compilation, element);
            compilation.types_mut().get_fixed_array(
                element,
                ConstantRange { left: *left, right: *right },
            )
        }
        TypeRecipe::Dynamic(element) => {
            let element = build_type(compilation, element);
            compilation.types_mut().get_dynamic_array(element)
        }
        TypeRecipe::Queue(element, bound) => {
            let element = build_type(compilation, element);
            compilation.types_mut().get_queue(element, *bound)
        }
    }
}

fn type_recipe() -> impl Strategy<Value = TypeRecipe> {
    let predefined = proptest::sample::select(
        PredefinedType::iter().collect::<Vec<_>>(),
    );
    let leaf = prop_oneof![
        (predefined, proptest::bool::ANY)
            .prop_map(|(kind, signed)| TypeRecipe::Predefined(kind, signed)),
        (
            1u32..96,
            proptest::bool::ANY,
            proptest::bool::ANY,
            proptest::bool::ANY
        )
            .prop_map(|(width, signed, four_state, reg)| {
                TypeRecipe::Integral { width, signed, four_state, reg }
            }),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            (inner.clone(), -8i64..8, -8i64..8).prop_map(
                |(element, left, right)| TypeRecipe::Fixed(
                    Box::new(element),
                    left,
                    right
                )
            ),
            inner
                .clone()
                .prop_map(|element| TypeRecipe::Dynamic(Box::new(element))),
            (inner, proptest::option::of(0u32..16)).prop_map(
                |(element, bound)| TypeRecipe::Queue(Box::new(element), bound)
            ),
        ]
    })
}

proptest! {
    #[test]
    fn canonicalization_is_a_fixpoint(recipe in type_recipe()) {
        let mut compilation = Compilation::default();
        let ty = build_type(&mut compilation, &recipe);

        let canonical = compilation.types().canonical(ty);
        assert_eq!(compilation.types().canonical(canonical), canonical);
    }

    #[test]
    fn matching_is_an_equivalence(
        a in type_recipe(),
        b in type_recipe(),
        c in type_recipe(),
    ) {
        let mut compilation = Compilation::default();
        let ta = build_type(&mut compilation, &a);
        let tb = build_type(&mut compilation, &b);
        let tc = build_type(&mut compilation, &c);

        // reflexive, symmetric, transitive
        assert!(compilation.is_matching(ta, ta));
        assert_eq!(
            compilation.is_matching(ta, tb),
            compilation.is_matching(tb, ta)
        );
        if compilation.is_matching(ta, tb) && compilation.is_matching(tb, tc) {
            assert!(compilation.is_matching(ta, tc));
        }
    }

    #[test]
    fn relation_implications_hold(a in type_recipe(), b in type_recipe()) {
        let mut compilation = Compilation::default();
        let ta = build_type(&mut compilation, &a);
        let tb = build_type(&mut compilation, &b);

        if compilation.is_equivalent(ta, tb) {
            assert!(compilation.is_assignment_compatible(ta, tb));
        }
        if compilation.is_assignment_compatible(ta, tb) {
            assert!(compilation.is_cast_compatible(ta, tb));
        }
    }

    #[test]
    fn integral_coercion_round_trips(
        width in 1u32..96,
        signed in proptest::bool::ANY,
        four_state in proptest::bool::ANY,
        raw in proptest::num::u64::ANY,
    ) {
        let mut compilation = Compilation::default();
        let ty = compilation
            .types_mut()
            .get_integral(width, signed, four_state, false);

        let value = compilation.types().coerce_value(
            ty,
            &ConstantValue::Integer(LogicVec::from_u64(64, raw)),
        );
        let round_tripped = compilation.types().coerce_value(ty, &value);
        assert_eq!(round_tripped, value);
    }
}

#[test]
fn parameter_state_machine_lands_in_bound() {
    let module = ModuleDeclarationSyntax::new(
        "m",
        vec![MemberSyntax::Parameter(ParameterDeclarationSyntax::single(
            false,
            DataTypeSyntax::implicit(),
            "P",
            Some(ExpressionSyntax::decimal(9)),
        ))],
    );
    let mut compilation = compile(vec![MemberSyntax::Module(module)]);

    top_parameter(&mut compilation, "m", "P");

    let bound = compilation
        .parameters
        .iter()
        .filter(|parameter| {
            matches!(parameter.state, ParamState::Bound { .. })
        })
        .count();
    assert_eq!(bound, 1);
}

#[test]
fn task_call_is_rejected_in_constant_context() {
    let task = velac_syntax::item::TaskDeclarationSyntax {
        name: Token::identifier("t"),
        lifetime: None,
        ports: Vec::new(),
        body: Vec::new(),
        span: Default::default(),
    };
    let mut compilation = compile(vec![MemberSyntax::Task(task)]);
    let ctx = unit_context(&compilation);

    let call = ExpressionSyntax::call("t", vec![]);
    let bound = compilation.bind_expression(&call, &ctx);
    let value = compilation.eval_constant(&bound);

    assert!(value.is_bad());
    assert!(compilation
        .diagnostics()
        .iter()
        .any(|diagnostic| diagnostic.code == DiagCode::ConstEvalTaskNotAllowed));
}

#[test]
fn verify_constant_flags_non_constant_reads() {
    let variable = velac_syntax::item::DataDeclarationSyntax {
        is_const: false,
        data_type: DataTypeSyntax::int(),
        declarators: vec![velac_syntax::item::DeclaratorSyntax::new("v", None)],
        span: Default::default(),
    };
    let mut compilation = compile(vec![MemberSyntax::Data(variable)]);
    let ctx = unit_context(&compilation);

    let bound =
        compilation.bind_expression(&ExpressionSyntax::name("v"), &ctx);
    let mut ev = crate::eval::EvalContext::new(&Default::default());

    assert!(!compilation.verify_constant(&mut ev, &bound));
    assert!(compilation.diagnostics().iter().any(|diagnostic| {
        diagnostic.code == DiagCode::ConstEvalNonConstVariable
    }));
}

#[test]
fn min_typ_max_selects_the_configured_branch() {
    let expr = ExpressionSyntax::MinTypMax(
        velac_syntax::expression::MinTypMaxExpressionSyntax {
            min: Box::new(ExpressionSyntax::decimal(1)),
            typ: Box::new(ExpressionSyntax::decimal(2)),
            max: Box::new(ExpressionSyntax::decimal(3)),
        },
    );

    for (selected, expected) in [
        (crate::MinTypMax::Min, 1),
        (crate::MinTypMax::Typ, 2),
        (crate::MinTypMax::Max, 3),
    ] {
        let mut compilation = Compilation::new(crate::CompilationOptions {
            min_typ_max: selected,
            ..Default::default()
        });
        compilation.add_syntax_tree(Arc::new(CompilationUnitSyntax::new(
            Vec::new(),
        )));
        let ctx = unit_context(&compilation);

        let bound = compilation.bind_expression(&expr, &ctx);
        let value = compilation.eval_constant(&bound);

        assert_eq!(
            value,
            ConstantValue::Integer(LogicVec::from_i64(32, expected))
        );
    }
}

#[test]
fn class_hierarchy_relations() {
    let base = velac_syntax::item::ClassDeclarationSyntax {
        name: Token::identifier("base"),
        is_interface: false,
        extends: None,
        implements: Vec::new(),
        items: Vec::new(),
        span: Default::default(),
    };
    let derived = velac_syntax::item::ClassDeclarationSyntax {
        name: Token::identifier("derived"),
        is_interface: false,
        extends: Some(Token::identifier("base")),
        implements: Vec::new(),
        items: Vec::new(),
        span: Default::default(),
    };
    let mut compilation = compile(vec![
        MemberSyntax::Class(base),
        MemberSyntax::Class(derived),
    ]);

    let unit = SymbolId::Unit(compilation.units()[0]);
    let find = |compilation: &mut Compilation, name: &str| {
        let id = compilation.intern(name);
        match compilation.lookup_direct(unit, id) {
            Some(SymbolId::Class(class)) => class,
            other => panic!("expected class `{name}`, got {other:?}"),
        }
    };
    let base_id = find(&mut compilation, "base");
    let derived_id = find(&mut compilation, "derived");

    // base resolution happens with the class scope
    compilation.members(SymbolId::Class(derived_id));

    assert!(compilation.is_derived_from(derived_id, base_id));
    assert!(!compilation.is_derived_from(base_id, derived_id));

    let base_ty = compilation.types_mut().get_class(base_id);
    let derived_ty = compilation.types_mut().get_class(derived_id);

    // a derived handle assigns to a base handle, not the reverse
    assert!(compilation.is_assignment_compatible(base_ty, derived_ty));
    assert!(!compilation.is_assignment_compatible(derived_ty, base_ty));
    // the explicit down-cast is allowed
    assert!(compilation.is_cast_compatible(derived_ty, base_ty));

    assert_eq!(compilation.common_base(base_ty, derived_ty), Some(base_id));
    assert_eq!(compilation.common_base(derived_ty, base_ty), Some(base_id));

    // null assigns to any class handle
    let null_ty = compilation.types().null_type();
    assert!(compilation.is_assignment_compatible(derived_ty, null_ty));
}

#[test]
fn bitstream_casts_need_matching_widths() {
    let mut compilation = Compilation::default();

    let byte = compilation.types_mut().get_integral(8, false, false, false);
    let word = compilation.types_mut().get_integral(16, false, false, false);
    let pair_of_bytes = compilation
        .types_mut()
        .get_fixed_array(byte, ConstantRange { left: 0, right: 1 });

    assert!(compilation.is_bitstream_castable(word, pair_of_bytes));
    assert!(!compilation.is_bitstream_castable(byte, pair_of_bytes));

    // associative arrays are forbidden on the destination side
    let assoc =
        compilation.types_mut().get_associative_array(byte, None);
    assert!(!compilation.is_bitstream_castable(assoc, word));
}

#[test]
fn compound_assignment_reads_through_the_lvalue_reference() {
    // function int bump(int n); int s = n; s += 5; return s; endfunction
    let body = vec![
        StatementSyntax::VariableDeclaration(
            velac_syntax::item::DataDeclarationSyntax {
                is_const: false,
                data_type: DataTypeSyntax::int(),
                declarators: vec![velac_syntax::item::DeclaratorSyntax::new(
                    "s",
                    Some(ExpressionSyntax::name("n")),
                )],
                span: Default::default(),
            },
        ),
        StatementSyntax::expression(ExpressionSyntax::Assignment(
            velac_syntax::expression::AssignmentExpressionSyntax {
                target: Box::new(ExpressionSyntax::name("s")),
                operator: Some(BinaryOperator::Add),
                value: Box::new(ExpressionSyntax::decimal(5)),
            },
        )),
        StatementSyntax::return_(ExpressionSyntax::name("s")),
    ];
    let bump = FunctionDeclarationSyntax::new(
        "bump",
        Some(DataTypeSyntax::int()),
        vec![SubroutinePortSyntax::input("n", DataTypeSyntax::int())],
        body,
    );
    let mut compilation = compile(vec![MemberSyntax::Function(bump)]);
    let ctx = unit_context(&compilation);

    let call =
        ExpressionSyntax::call("bump", vec![ExpressionSyntax::decimal(3)]);
    let bound = compilation.bind_expression(&call, &ctx);

    // the compound operator desugared into an l-value reference read
    fn finds_lvalue_ref(expr: &crate::expr::Expression) -> bool {
        match &expr.kind {
            crate::expr::ExprKind::LValueRef => true,
            crate::expr::ExprKind::Binary { left, right, .. } => {
                finds_lvalue_ref(left) || finds_lvalue_ref(right)
            }
            crate::expr::ExprKind::Conversion { operand, .. } => {
                finds_lvalue_ref(operand)
            }
            crate::expr::ExprKind::Assignment { rhs, .. } => {
                finds_lvalue_ref(rhs)
            }
            _ => false,
        }
    }
    let unit = SymbolId::Unit(compilation.units()[0]);
    let bump_name = compilation.intern("bump");
    let bump = compilation
        .lookup_direct(unit, bump_name)
        .unwrap()
        .into_subroutine()
        .unwrap();
    let body =
        compilation.subroutine(bump).body.clone().expect("bound body");
    fn statement_has_lvalue_ref(statement: &crate::stmt::Statement) -> bool {
        match statement {
            crate::stmt::Statement::Block { statements, .. } => {
                statements.iter().any(statement_has_lvalue_ref)
            }
            crate::stmt::Statement::Expression(expr) => finds_lvalue_ref(expr),
            _ => false,
        }
    }
    assert!(statement_has_lvalue_ref(&body));

    let value = compilation.eval_constant(&bound);
    assert_eq!(
        value,
        ConstantValue::Integer(LogicVec::from_i64(32, 8)),
        "diagnostics: {:?}",
        compilation.diagnostics()
    );
    assert!(compilation.diagnostics().is_empty());
}
