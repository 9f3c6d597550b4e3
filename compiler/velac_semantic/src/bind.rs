//! Contains the expression binder: syntax in, typed expression tree out.
//!
//! Binding computes each subexpression's self-determined type, then pushes
//! context-determined widths back down where the language requires operand
//! unification. All user-visible failures report a diagnostic and produce
//! the bad sentinel, which silences every downstream check on that
//! subtree.

use std::rc::Rc;

use velac_base::span::{SourceElement, Span};
use velac_syntax::expression as syntax;
use velac_syntax::expression::{ExpressionSyntax, LiteralSyntax, NameSyntax};

use crate::{
    arena::{NameId, ID},
    diagnostic::{DiagCode, Diagnostic, Related},
    expr::{
        BinaryOp, Callee, CallExpr, ConversionKind, ExprKind, Expression,
        IteratorInfo, MemberTarget, SystemCallInfo, UnaryOp,
    },
    logic::{Logic, LogicVec},
    lookup::LookupOptions,
    symbol::{
        ArgDirection, ClassDef, LookupLocation, Namespace, SymbolId, Variable,
        VarFlavor,
    },
    ty::{TypeId, TypeKind},
    Compilation,
};

/// The flag set carried by a [`BindContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindFlags {
    /// A data type may appear in expression position (`$bits(int)`).
    pub allow_data_type: bool,

    /// The expression is a min/typ/max branch the options did not select;
    /// evaluation failures in it stay silent.
    pub unevaluated_branch: bool,

    /// Binding happens inside a static initializer.
    pub static_initializer: bool,

    /// Binding happens inside procedural code.
    pub procedural: bool,

    /// The expression must be constant.
    pub constant: bool,

    /// Name lookups may see members declared after the reference point.
    pub allow_declared_after: bool,
}

/// One active iterator variable introduced by an array method `with`
/// clause; lookup searches this chain before walking scopes.
#[derive(Debug)]
pub struct IterVar {
    pub name: NameId,
    pub var: ID<Variable>,
    pub next: Option<Rc<IterVar>>,
}

/// Everything the binder needs to know about the context of an
/// expression.
#[derive(Debug, Clone)]
pub struct BindContext {
    /// The enclosing scope names resolve in.
    pub scope: SymbolId,

    /// The declaration-order position lookups occur at.
    pub location: LookupLocation,

    pub flags: BindFlags,

    /// The assignment target's type, when binding a right-hand side.
    pub target_type: Option<TypeId>,

    /// The chain of active iterator variables.
    pub iterators: Option<Rc<IterVar>>,
}

impl BindContext {
    #[must_use]
    pub fn new(scope: SymbolId, location: LookupLocation) -> Self {
        Self {
            scope,
            location,
            flags: BindFlags::default(),
            target_type: None,
            iterators: None,
        }
    }

    /// Marks the context as requiring a constant expression.
    #[must_use]
    pub fn constant(mut self) -> Self {
        self.flags.constant = true;
        self
    }

    /// Marks the context as procedural.
    #[must_use]
    pub fn procedural(mut self) -> Self {
        self.flags.procedural = true;
        self
    }

    /// Lifts the declaration-order restriction for lookups.
    #[must_use]
    pub fn allow_declared_after(mut self) -> Self {
        self.flags.allow_declared_after = true;
        self
    }

    /// Replaces the whole flag set.
    #[must_use]
    pub fn with_flags(mut self, flags: BindFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the assignment target type.
    #[must_use]
    pub fn with_target(mut self, target: TypeId) -> Self {
        self.target_type = Some(target);
        self
    }

    fn lookup_options(&self) -> LookupOptions {
        LookupOptions { allow_declared_after: self.flags.allow_declared_after }
    }

    fn find_iterator(&self, name: NameId) -> Option<ID<Variable>> {
        let mut current = self.iterators.as_ref();
        while let Some(iter) = current {
            if iter.name == name {
                return Some(iter.var);
            }
            current = iter.next.as_ref();
        }
        None
    }
}

impl Compilation {
    /// Binds a syntax expression to a typed expression tree.
    pub fn bind_expression(
        &mut self,
        syntax: &ExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let span = syntax.span();
        match syntax {
            ExpressionSyntax::Literal(literal) => self.bind_literal(literal, ctx),
            ExpressionSyntax::Name(name) => self.bind_name(name, ctx),
            ExpressionSyntax::MemberAccess(access) => {
                self.bind_member_access(access, ctx)
            }
            ExpressionSyntax::ElementSelect(select) => {
                self.bind_element_select(select, ctx)
            }
            ExpressionSyntax::RangeSelect(select) => {
                self.bind_range_select(select, ctx)
            }
            ExpressionSyntax::Unary(unary) => self.bind_unary(unary, ctx),
            ExpressionSyntax::Binary(binary) => self.bind_binary(binary, ctx),
            ExpressionSyntax::Conditional(conditional) => {
                self.bind_conditional(conditional, ctx)
            }
            ExpressionSyntax::MinTypMax(expression) => {
                self.bind_min_typ_max(expression, ctx)
            }
            ExpressionSyntax::Concatenation(concat) => {
                self.bind_concatenation(concat, ctx)
            }
            ExpressionSyntax::Invocation(invocation) => {
                self.bind_invocation(invocation, None, ctx)
            }
            ExpressionSyntax::ArrayOrRandomizeMethod(method) => self
                .bind_invocation(
                    &method.invocation,
                    method.with_clause.as_ref(),
                    ctx,
                ),
            ExpressionSyntax::Cast(cast) => self.bind_cast(cast, ctx),
            ExpressionSyntax::Assignment(assignment) => {
                self.bind_assignment(assignment, ctx)
            }
            ExpressionSyntax::DataType(data_type) => {
                if !ctx.flags.allow_data_type {
                    self.report(Diagnostic::new(
                        DiagCode::NotAValue,
                        span,
                        "a data type is not allowed here".to_owned(),
                    ));
                    return self.bad_expr(span, None);
                }
                let ty = self.type_from_syntax(
                    data_type,
                    ctx.scope,
                    ctx.location,
                    false,
                    None,
                );
                Expression { ty, span, kind: ExprKind::DataType }
            }
        }
    }

    /// Binds a right-hand side against an assignment target: binds the
    /// expression, checks compatibility, propagates the context width,
    /// and inserts the implicit conversion.
    pub fn bind_rvalue(
        &mut self,
        syntax: &ExpressionSyntax,
        target: TypeId,
        ctx: &BindContext,
    ) -> Expression {
        let ctx = ctx.clone().with_target(target);
        let bound = self.bind_expression(syntax, &ctx);
        self.convert_assignment(target, bound)
    }

    pub(crate) fn bad_expr(
        &self,
        span: Span,
        inner: Option<Expression>,
    ) -> Expression {
        Expression::bad(self.types.error(), span, inner)
    }

    fn bind_literal(
        &mut self,
        literal: &LiteralSyntax,
        _ctx: &BindContext,
    ) -> Expression {
        let span = literal.span();
        match literal {
            LiteralSyntax::Integer(integer) => {
                let parsed =
                    LogicVec::from_digits(integer.base, &integer.digits);
                let Ok(parsed) = parsed else {
                    self.report(Diagnostic::new(
                        DiagCode::InvalidOperands,
                        span,
                        "invalid digits in integer literal".to_owned(),
                    ));
                    return self.bad_expr(span, None);
                };

                // plain decimals are 32-bit signed; based unsized literals
                // widen to at least 32 bits; sized literals take their size
                let (width, signed) = match integer.size {
                    Some(size) => (size.max(1), integer.signed),
                    None => (parsed.width().max(32), integer.signed),
                };
                // a leading x/z digit extends as itself, everything else
                // zero-extends before the signedness applies
                let top_unknown = parsed.width() < width
                    && parsed.bit(parsed.width() - 1).is_unknown();
                let value = if top_unknown {
                    parsed.as_signed(true).resize(width).as_signed(signed)
                } else {
                    parsed.resize(width).as_signed(signed)
                };
                let ty = self.types.get_integral(
                    width,
                    signed,
                    value.has_unknown(),
                    false,
                );
                Expression {
                    ty,
                    span,
                    kind: ExprKind::IntegerLiteral(value),
                }
            }
            LiteralSyntax::Real(real) => Expression {
                ty: self.types.real_type(),
                span,
                kind: ExprKind::RealLiteral(real.value),
            },
            LiteralSyntax::String(string) => Expression {
                ty: self.types.string_type(),
                span,
                kind: ExprKind::StringLiteral(string.value.clone()),
            },
            LiteralSyntax::UnbasedUnsized(unbased) => {
                let digit = match unbased.digit {
                    syntax::UnbasedDigit::Zero => Logic::Zero,
                    syntax::UnbasedDigit::One => Logic::One,
                    syntax::UnbasedDigit::X => Logic::X,
                    syntax::UnbasedDigit::Z => Logic::Z,
                };
                let ty = self.types.get_integral(
                    1,
                    false,
                    digit.is_unknown(),
                    false,
                );
                Expression {
                    ty,
                    span,
                    kind: ExprKind::UnbasedUnsizedLiteral(digit),
                }
            }
            LiteralSyntax::Null { .. } => Expression {
                ty: self.types.null_type(),
                span,
                kind: ExprKind::NullLiteral,
            },
        }
    }

    fn bind_name(
        &mut self,
        name: &NameSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let span = name.span();
        match name {
            NameSyntax::Identifier(identifier) => {
                let name_id =
                    self.interner.intern(identifier.identifier.value_text());

                // iterator variables shadow everything
                if let Some(var) = ctx.find_iterator(name_id) {
                    let ty = self.variable(var).ty;
                    return Expression {
                        ty,
                        span,
                        kind: ExprKind::NamedValue {
                            symbol: SymbolId::Variable(var),
                            hierarchical: false,
                        },
                    };
                }

                let result = self.lookup(
                    ctx.scope,
                    name_id,
                    Namespace::Members,
                    ctx.location,
                    ctx.lookup_options(),
                    span,
                );
                let Some(symbol) = result.symbol else {
                    if !result.reported {
                        self.report(Diagnostic::new(
                            DiagCode::UndeclaredIdentifier,
                            span,
                            format!(
                                "use of undeclared identifier `{}`",
                                self.name(name_id)
                            ),
                        ));
                    }
                    return self.bad_expr(span, None);
                };
                self.named_value(symbol, false, span, ctx)
            }
            NameSyntax::Scoped(scoped) => {
                let package_name =
                    self.interner.intern(scoped.scope.value_text());
                let item_name = self.interner.intern(scoped.name.value_text());
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
                    return self.bad_expr(span, None);
                };
                let Some(symbol) =
                    self.lookup_direct(SymbolId::Package(package), item_name)
                else {
                    self.report(Diagnostic::new(
                        DiagCode::UndeclaredIdentifier,
                        scoped.name.span,
                        format!(
                            "package `{}` has no member named `{}`",
                            self.name(package_name),
                            self.name(item_name)
                        ),
                    ));
                    return self.bad_expr(span, None);
                };
                self.named_value(symbol, false, span, ctx)
            }
        }
    }

    /// Wraps a resolved symbol as a value expression, with class access
    /// checks for properties referenced by simple name.
    fn named_value(
        &mut self,
        symbol: SymbolId,
        hierarchical: bool,
        span: Span,
        ctx: &BindContext,
    ) -> Expression {
        let ty = match symbol {
            SymbolId::Parameter(id) => self.parameter_type(id),
            SymbolId::Variable(id) => {
                let variable = self.variable(id);
                let ty = variable.ty;
                if let SymbolId::Class(class) = variable.parent {
                    let is_static = variable.is_static_member;
                    if !is_static {
                        self.check_instance_access(class, span, ctx);
                    }
                }
                ty
            }
            SymbolId::Net(id) => self.net(id).ty,
            SymbolId::Formal(id) => self.formal(id).ty,
            SymbolId::EnumValue(id) => self.enum_value(id).ty,
            SymbolId::TypeAlias(id) => {
                if ctx.flags.allow_data_type {
                    let ty = self.resolve_alias(id);
                    return Expression { ty, span, kind: ExprKind::DataType };
                }
                self.report(Diagnostic::new(
                    DiagCode::NotAValue,
                    span,
                    "a type name is not a value".to_owned(),
                ));
                return self.bad_expr(span, None);
            }
            SymbolId::Class(id) => {
                if ctx.flags.allow_data_type {
                    let ty = self.types.get_class(id);
                    return Expression { ty, span, kind: ExprKind::DataType };
                }
                self.report(Diagnostic::new(
                    DiagCode::NotAValue,
                    span,
                    "a class name is not a value".to_owned(),
                ));
                return self.bad_expr(span, None);
            }
            other => {
                let kind = self.symbol_kind(other);
                self.report(Diagnostic::new(
                    DiagCode::NotAValue,
                    span,
                    format!("a {kind} cannot be used as a value"),
                ));
                return self.bad_expr(span, None);
            }
        };

        Expression {
            ty,
            span,
            kind: ExprKind::NamedValue { symbol, hierarchical },
        }
    }

    /// Resolves a dotted prefix that names a scope rather than a value:
    /// instance names and named generate blocks.
    fn resolve_scope_prefix(
        &mut self,
        syntax: &ExpressionSyntax,
        ctx: &BindContext,
    ) -> Option<SymbolId> {
        match syntax {
            ExpressionSyntax::Name(NameSyntax::Identifier(identifier)) => {
                let name_id =
                    self.interner.intern(identifier.identifier.value_text());
                if ctx.find_iterator(name_id).is_some() {
                    return None;
                }
                let result = self.lookup(
                    ctx.scope,
                    name_id,
                    Namespace::Members,
                    ctx.location,
                    ctx.lookup_options(),
                    identifier.identifier.span,
                );
                match result.symbol {
                    Some(symbol @ (SymbolId::Instance(_) | SymbolId::Block(_))) => {
                        Some(symbol)
                    }
                    _ => None,
                }
            }
            ExpressionSyntax::MemberAccess(access) => {
                let base = self.resolve_scope_prefix(&access.value, ctx)?;
                let name_id = self.interner.intern(access.member.value_text());
                match self.lookup_direct(base, name_id) {
                    Some(
                        symbol @ (SymbolId::Instance(_) | SymbolId::Block(_)),
                    ) => Some(symbol),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn bind_member_access(
        &mut self,
        access: &syntax::MemberAccessExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let span = access.value.span().join(access.member.span);
        let member_name = self.interner.intern(access.member.value_text());

        // a prefix naming an instance or generate block makes this a
        // hierarchical reference
        if let Some(scope) = self.resolve_scope_prefix(&access.value, ctx) {
            let Some(symbol) = self.lookup_direct(scope, member_name) else {
                self.report(Diagnostic::new(
                    DiagCode::UnknownMember,
                    access.member.span,
                    format!(
                        "`{}` has no member named `{}`",
                        self.qualified_name(scope),
                        self.name(member_name)
                    ),
                ));
                return self.bad_expr(span, None);
            };
            return self.named_value(symbol, true, span, ctx);
        }

        let value = self.bind_expression(&access.value, ctx);
        if value.is_bad() {
            return self.bad_expr(span, Some(value));
        }

        match self.types.canon_kind(value.ty).clone() {
            TypeKind::UnpackedStruct(data) => {
                let Some(index) = data
                    .fields
                    .iter()
                    .position(|field| field.name == member_name)
                else {
                    self.report(Diagnostic::new(
                        DiagCode::UnknownMember,
                        access.member.span,
                        format!(
                            "no field named `{}` in struct",
                            self.name(member_name)
                        ),
                    ));
                    return self.bad_expr(span, Some(value));
                };
                Expression {
                    ty: data.fields[index].ty,
                    span,
                    kind: ExprKind::MemberAccess {
                        value: Box::new(value),
                        member: MemberTarget::StructField(index),
                    },
                }
            }
            TypeKind::Class(class) => {
                let Some(property) =
                    self.find_class_property(class, member_name)
                else {
                    self.report(Diagnostic::new(
                        DiagCode::UnknownMember,
                        access.member.span,
                        format!(
                            "class `{}` has no property named `{}`",
                            self.name(self.class(class).name),
                            self.name(member_name)
                        ),
                    ));
                    return self.bad_expr(span, Some(value));
                };
                self.check_property_access(property, span, ctx);
                Expression {
                    ty: self.variable(property).ty,
                    span,
                    kind: ExprKind::MemberAccess {
                        value: Box::new(value),
                        member: MemberTarget::ClassProperty(property),
                    },
                }
            }
            _ => {
                self.report(Diagnostic::new(
                    DiagCode::UnknownMember,
                    access.member.span,
                    format!(
                        "`{}` has no member named `{}`",
                        self.type_to_string(value.ty),
                        self.name(member_name)
                    ),
                ));
                self.bad_expr(span, Some(value))
            }
        }
    }

    fn find_class_property(
        &mut self,
        class: ID<ClassDef>,
        name: NameId,
    ) -> Option<ID<Variable>> {
        let mut current = Some(class);
        while let Some(class) = current {
            if let Some(SymbolId::Variable(var)) =
                self.lookup_direct(SymbolId::Class(class), name)
            {
                return Some(var);
            }
            current = self.class(class).base;
        }
        None
    }

    fn find_class_method(
        &mut self,
        class: ID<ClassDef>,
        name: NameId,
    ) -> Option<ID<crate::symbol::Subroutine>> {
        let mut current = Some(class);
        while let Some(class) = current {
            if let Some(SymbolId::Subroutine(subroutine)) =
                self.lookup_direct(SymbolId::Class(class), name)
            {
                return Some(subroutine);
            }
            current = self.class(class).base;
        }
        None
    }

    /// The class lexically enclosing a scope, with whether the reference
    /// site sits inside a static method.
    fn enclosing_class(
        &self,
        mut scope: SymbolId,
    ) -> (Option<ID<ClassDef>>, bool) {
        let mut in_static_method = false;
        loop {
            match scope {
                SymbolId::Class(class) => {
                    return (Some(class), in_static_method)
                }
                SymbolId::Subroutine(id) => {
                    in_static_method |= self.subroutine(id).is_static_method;
                }
                SymbolId::Root => return (None, in_static_method),
                _ => {}
            }
            scope = self.symbol_parent(scope);
        }
    }

    /// A simple-name reference to an instance property requires an
    /// enclosing non-static method of that class.
    fn check_instance_access(
        &mut self,
        class: ID<ClassDef>,
        span: Span,
        ctx: &BindContext,
    ) {
        let (enclosing, in_static) = self.enclosing_class(ctx.scope);
        let in_class = enclosing
            .is_some_and(|enclosing| self.is_derived_from(enclosing, class));
        if !in_class {
            self.report(Diagnostic::new(
                DiagCode::InvalidClassAccess,
                span,
                "class property referenced outside its class".to_owned(),
            ));
            return;
        }
        if in_static || ctx.flags.static_initializer {
            self.report(Diagnostic::new(
                DiagCode::StaticAccessToInstance,
                span,
                "an instance property cannot be referenced from a static \
                 context"
                    .to_owned(),
            ));
        }
    }

    /// Visibility check for dotted property access.
    fn check_property_access(
        &mut self,
        property: ID<Variable>,
        span: Span,
        ctx: &BindContext,
    ) {
        use velac_syntax::item::ClassVisibility;

        let variable = self.variable(property);
        let visibility = variable.visibility;
        let SymbolId::Class(owner) = variable.parent else { return };
        if visibility == ClassVisibility::Public {
            return;
        }

        let (enclosing, _) = self.enclosing_class(ctx.scope);
        let allowed = match visibility {
            ClassVisibility::Public => true,
            ClassVisibility::Local => enclosing == Some(owner),
            ClassVisibility::Protected => enclosing
                .is_some_and(|enclosing| self.is_derived_from(enclosing, owner)),
        };
        if !allowed {
            let name = self.name(self.variable(property).name).to_owned();
            self.report(Diagnostic::new(
                DiagCode::InvalidClassAccess,
                span,
                format!("`{name}` is not accessible from this scope"),
            ));
        }
    }
}

impl Compilation {
    fn bind_unary(
        &mut self,
        unary: &syntax::UnaryExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let span = unary.span;
        let operand = self.bind_expression(&unary.operand, ctx);
        if operand.is_bad() {
            return self.bad_expr(span, Some(operand));
        }

        let op = match unary.operator {
            syntax::UnaryOperator::Plus => UnaryOp::Plus,
            syntax::UnaryOperator::Minus => UnaryOp::Minus,
            syntax::UnaryOperator::LogicalNot => UnaryOp::LogicalNot,
            syntax::UnaryOperator::BitwiseNot => UnaryOp::BitwiseNot,
        };

        let ty = match op {
            UnaryOp::LogicalNot => {
                if !self.types.is_numeric(operand.ty)
                    && self.types.canon_kind(operand.ty) != &TypeKind::Str
                {
                    return self.invalid_operands(span, operand.ty, None);
                }
                self.bool_result_type(&[&operand])
            }
            UnaryOp::Plus | UnaryOp::Minus => {
                if !self.types.is_numeric(operand.ty) {
                    return self.invalid_operands(span, operand.ty, None);
                }
                operand.ty
            }
            UnaryOp::BitwiseNot => {
                if !self.types.is_integral(operand.ty) {
                    return self.invalid_operands(span, operand.ty, None);
                }
                operand.ty
            }
        };

        Expression {
            ty,
            span,
            kind: ExprKind::Unary { op, operand: Box::new(operand) },
        }
    }

    fn bind_binary(
        &mut self,
        binary: &syntax::BinaryExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let mut left = self.bind_expression(&binary.left, ctx);
        let mut right = self.bind_expression(&binary.right, ctx);
        let span = left.span.join(right.span);
        if left.is_bad() || right.is_bad() {
            return self.bad_expr(span, None);
        }

        let op = lower_binary_op(binary.operator);

        if op.is_context_determined() || op == BinaryOp::Pow {
            // either side real makes the whole operation real
            if self.types.is_floating(left.ty) || self.types.is_floating(right.ty)
            {
                if !self.types.is_numeric(left.ty)
                    || !self.types.is_numeric(right.ty)
                {
                    return self.invalid_operands(span, left.ty, Some(right.ty));
                }
                let real = self.types.real_type();
                return Expression {
                    ty: real,
                    span,
                    kind: ExprKind::Binary {
                        op,
                        left: Box::new(self.to_real_operand(left)),
                        right: Box::new(self.to_real_operand(right)),
                    },
                };
            }

            if !self.types.is_integral(left.ty) || !self.types.is_integral(right.ty)
            {
                return self.invalid_operands(span, left.ty, Some(right.ty));
            }

            if op == BinaryOp::Pow {
                // the result takes the left operand's type; the exponent
                // stays self-determined
                let ty = self.unify_with_target(&mut left, None, ctx);
                return Expression {
                    ty,
                    span,
                    kind: ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                };
            }

            let ty = self.unify_operands(&mut left, &mut right, ctx);
            return Expression {
                ty,
                span,
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        if op.is_comparison() {
            let result = self.bool_result_type(&[&left, &right]);
            let two_state = matches!(op, BinaryOp::CaseEq | BinaryOp::CaseNe);
            let result = if two_state {
                self.types.bit_type()
            } else {
                result
            };

            if self.types.is_numeric(left.ty) && self.types.is_numeric(right.ty)
            {
                if self.types.is_integral(left.ty)
                    && self.types.is_integral(right.ty)
                {
                    // operands unify between themselves only
                    self.unify_pair(&mut left, &mut right);
                } else {
                    left = self.to_real_operand(left);
                    right = self.to_real_operand(right);
                }
            } else if !self.comparable_non_numeric(left.ty, right.ty) {
                return self.invalid_operands(span, left.ty, Some(right.ty));
            }

            return Expression {
                ty: result,
                span,
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        if op.is_shift() {
            if !self.types.is_integral(left.ty)
                || !self.types.is_integral(right.ty)
            {
                return self.invalid_operands(span, left.ty, Some(right.ty));
            }
            let ty = self.unify_with_target(&mut left, None, ctx);
            return Expression {
                ty,
                span,
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        // logical and/or
        let result = self.bool_result_type(&[&left, &right]);
        Expression {
            ty: result,
            span,
            kind: ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    fn bind_conditional(
        &mut self,
        conditional: &syntax::ConditionalExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let condition = self.bind_expression(&conditional.condition, ctx);
        let mut true_expr =
            self.bind_expression(&conditional.true_expression, ctx);
        let mut false_expr =
            self.bind_expression(&conditional.false_expression, ctx);
        let span = condition.span.join(false_expr.span);
        if condition.is_bad() || true_expr.is_bad() || false_expr.is_bad() {
            return self.bad_expr(span, None);
        }

        let ty = if self.types.is_integral(true_expr.ty)
            && self.types.is_integral(false_expr.ty)
        {
            self.unify_operands(&mut true_expr, &mut false_expr, ctx)
        } else if self.types.is_numeric(true_expr.ty)
            && self.types.is_numeric(false_expr.ty)
        {
            true_expr = self.to_real_operand(true_expr);
            false_expr = self.to_real_operand(false_expr);
            self.types.real_type()
        } else if self.is_equivalent(true_expr.ty, false_expr.ty) {
            true_expr.ty
        } else if self.is_assignment_compatible(true_expr.ty, false_expr.ty) {
            true_expr.ty
        } else if self.is_assignment_compatible(false_expr.ty, true_expr.ty) {
            false_expr.ty
        } else {
            return self.invalid_operands(span, true_expr.ty, Some(false_expr.ty));
        };

        Expression {
            ty,
            span,
            kind: ExprKind::Conditional {
                condition: Box::new(condition),
                true_expr: Box::new(true_expr),
                false_expr: Box::new(false_expr),
            },
        }
    }

    fn bind_min_typ_max(
        &mut self,
        expression: &syntax::MinTypMaxExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let selected = self.options().min_typ_max;
        let unevaluated = ctx.clone().with_flags(BindFlags {
            unevaluated_branch: true,
            ..ctx.flags
        });

        let bind_branch = |comp: &mut Self, branch, is_selected: bool| {
            if is_selected {
                comp.bind_expression(branch, ctx)
            } else {
                comp.bind_expression(branch, &unevaluated)
            }
        };

        let min =
            bind_branch(self, &expression.min, selected == crate::MinTypMax::Min);
        let typ =
            bind_branch(self, &expression.typ, selected == crate::MinTypMax::Typ);
        let max =
            bind_branch(self, &expression.max, selected == crate::MinTypMax::Max);
        let span = min.span.join(max.span);

        let chosen = match selected {
            crate::MinTypMax::Min => &min,
            crate::MinTypMax::Typ => &typ,
            crate::MinTypMax::Max => &max,
        };
        if chosen.is_bad() {
            return self.bad_expr(span, None);
        }
        let ty = chosen.ty;

        Expression {
            ty,
            span,
            kind: ExprKind::MinTypMax {
                min: Box::new(min),
                typ: Box::new(typ),
                max: Box::new(max),
                selected,
            },
        }
    }

    fn bind_concatenation(
        &mut self,
        concat: &syntax::ConcatenationExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let span = concat.span;
        let operands: Vec<Expression> = concat
            .elements
            .iter()
            .map(|element| self.bind_expression(element, ctx))
            .collect();
        if operands.iter().any(Expression::is_bad) {
            return self.bad_expr(span, None);
        }

        // all strings concatenate as a string; otherwise all operands
        // must be integral
        if operands
            .iter()
            .all(|operand| self.types.canon_kind(operand.ty) == &TypeKind::Str)
            && !operands.is_empty()
        {
            let ty = self.types.string_type();
            return Expression {
                ty,
                span,
                kind: ExprKind::Concat { operands },
            };
        }

        let mut width = 0u32;
        let mut four_state = false;
        for operand in &operands {
            if !self.types.is_integral(operand.ty) {
                let ty = operand.ty;
                return self.invalid_operands(span, ty, None);
            }
            width = width.saturating_add(self.types.bit_width(operand.ty));
            four_state |= self.types.is_four_state(operand.ty);
        }

        let ty = self.types.get_integral(width.max(1), false, four_state, false);
        Expression { ty, span, kind: ExprKind::Concat { operands } }
    }

    fn bind_element_select(
        &mut self,
        select: &syntax::ElementSelectExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let value = self.bind_expression(&select.value, ctx);
        let index = self.bind_expression(&select.index, ctx);
        let span = value.span.join(index.span);
        if value.is_bad() || index.is_bad() {
            return self.bad_expr(span, None);
        }

        let ty = match self.types.canon_kind(value.ty).clone() {
            TypeKind::Integral(data) => {
                self.types.get_integral(1, false, data.four_state, false)
            }
            TypeKind::FixedArray { element, .. }
            | TypeKind::DynamicArray { element }
            | TypeKind::Queue { element, .. }
            | TypeKind::AssociativeArray { element, .. } => element,
            TypeKind::Str => self.types.get_integral(8, false, false, false),
            _ => {
                let value_ty = value.ty;
                self.report(Diagnostic::new(
                    DiagCode::InvalidSelect,
                    span,
                    format!(
                        "cannot index a value of type `{}`",
                        self.type_to_string(value_ty)
                    ),
                ));
                return self.bad_expr(span, Some(value));
            }
        };

        Expression {
            ty,
            span,
            kind: ExprKind::ElementSelect {
                value: Box::new(value),
                index: Box::new(index),
            },
        }
    }

    fn bind_range_select(
        &mut self,
        select: &syntax::RangeSelectExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let value = self.bind_expression(&select.value, ctx);
        let span = value.span.join(select.right.span());
        if value.is_bad() {
            return self.bad_expr(span, None);
        }

        let bounds = self
            .eval_dimension_bound(&select.left, ctx.scope, ctx.location)
            .zip(self.eval_dimension_bound(
                &select.right,
                ctx.scope,
                ctx.location,
            ));
        let Some((left, right)) = bounds else {
            self.report(Diagnostic::new(
                DiagCode::InvalidSelect,
                span,
                "range select bounds must be constant integers".to_owned(),
            ));
            return self.bad_expr(span, Some(value));
        };
        let range = crate::ty::ConstantRange { left, right };

        let ty = match self.types.canon_kind(value.ty).clone() {
            TypeKind::Integral(data) => {
                let width =
                    u32::try_from(range.width()).unwrap_or(u32::MAX);
                self.types.get_integral(width, false, data.four_state, false)
            }
            TypeKind::FixedArray { element, .. } => {
                self.types.get_fixed_array(element, range)
            }
            _ => {
                let value_ty = value.ty;
                self.report(Diagnostic::new(
                    DiagCode::InvalidSelect,
                    span,
                    format!(
                        "cannot slice a value of type `{}`",
                        self.type_to_string(value_ty)
                    ),
                ));
                return self.bad_expr(span, Some(value));
            }
        };

        Expression {
            ty,
            span,
            kind: ExprKind::RangeSelect { value: Box::new(value), range },
        }
    }

    fn bind_cast(
        &mut self,
        cast: &syntax::CastExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let span = cast.span;
        let target = self.type_from_syntax(
            &cast.target,
            ctx.scope,
            ctx.location,
            false,
            None,
        );
        let operand = self.bind_expression(&cast.operand, ctx);
        if operand.is_bad() || self.types.is_error(target) {
            return self.bad_expr(span, Some(operand));
        }

        if !self.is_cast_compatible(target, operand.ty) {
            let operand_ty = operand.ty;
            self.report(Diagnostic::new(
                DiagCode::BadCast,
                span,
                format!(
                    "cannot cast `{}` to `{}`",
                    self.type_to_string(operand_ty),
                    self.type_to_string(target)
                ),
            ));
            return self.bad_expr(span, Some(operand));
        }

        Expression {
            ty: target,
            span,
            kind: ExprKind::Conversion {
                operand: Box::new(operand),
                conversion: ConversionKind::Explicit,
            },
        }
    }

    fn bind_assignment(
        &mut self,
        assignment: &syntax::AssignmentExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let lhs = self.bind_expression(&assignment.target, ctx);
        let span = assignment.target.span().join(assignment.value.span());
        if lhs.is_bad() {
            return self.bad_expr(span, None);
        }
        self.verify_assignable(&lhs, ctx);

        let rhs = match assignment.operator {
            None => self.bind_rvalue(&assignment.value, lhs.ty, ctx),
            // `a op= b` reads the target through an l-value reference:
            // the right-hand side becomes `(a ref) op b`
            Some(op) => {
                let combined = self.bind_compound_rhs(
                    lower_binary_op(op),
                    &lhs,
                    &assignment.value,
                    ctx,
                );
                self.convert_assignment(lhs.ty, combined)
            }
        };

        Expression {
            ty: lhs.ty,
            span,
            kind: ExprKind::Assignment {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    /// Builds the desugared right-hand side of a compound assignment: a
    /// binary operation whose left operand is an l-value reference to the
    /// assignment target, resolved by the evaluator's top-l-value pointer.
    fn bind_compound_rhs(
        &mut self,
        op: BinaryOp,
        lhs: &Expression,
        value: &ExpressionSyntax,
        ctx: &BindContext,
    ) -> Expression {
        let mut left = Expression {
            ty: lhs.ty,
            span: lhs.span,
            kind: ExprKind::LValueRef,
        };
        let ctx = ctx.clone().with_target(lhs.ty);
        let mut right = self.bind_expression(value, &ctx);
        let span = left.span.join(right.span);
        if right.is_bad() || self.types.is_error(left.ty) {
            return self.bad_expr(span, None);
        }

        if self.types.is_floating(left.ty) || self.types.is_floating(right.ty)
        {
            if !self.types.is_numeric(left.ty)
                || !self.types.is_numeric(right.ty)
            {
                return self.invalid_operands(span, left.ty, Some(right.ty));
            }
            let real = self.types.real_type();
            return Expression {
                ty: real,
                span,
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(self.to_real_operand(left)),
                    right: Box::new(self.to_real_operand(right)),
                },
            };
        }
        if !self.types.is_integral(left.ty) || !self.types.is_integral(right.ty)
        {
            return self.invalid_operands(span, left.ty, Some(right.ty));
        }

        let ty = if op.is_shift() || op == BinaryOp::Pow {
            self.unify_with_target(&mut left, None, &ctx)
        } else {
            self.unify_operands(&mut left, &mut right, &ctx)
        };
        Expression {
            ty,
            span,
            kind: ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    /// Checks that an expression designates an assignable location per the
    /// binding context.
    pub(crate) fn verify_assignable(
        &mut self,
        expr: &Expression,
        ctx: &BindContext,
    ) -> bool {
        match &expr.kind {
            ExprKind::NamedValue { symbol, .. } => match symbol {
                SymbolId::Parameter(_) | SymbolId::EnumValue(_) => {
                    self.report(Diagnostic::new(
                        DiagCode::AssignToParameter,
                        expr.span,
                        "cannot assign to a parameter or enum value"
                            .to_owned(),
                    ));
                    false
                }
                SymbolId::Net(_) if ctx.flags.procedural => {
                    self.report(Diagnostic::new(
                        DiagCode::AssignToNet,
                        expr.span,
                        "nets cannot be assigned in procedural code"
                            .to_owned(),
                    ));
                    false
                }
                SymbolId::Variable(id) => {
                    let is_chandle = matches!(
                        self.types.canon_kind(self.variable(*id).ty),
                        TypeKind::CHandle
                    );
                    if is_chandle && !ctx.flags.procedural {
                        self.report(Diagnostic::new(
                            DiagCode::AssignToCHandle,
                            expr.span,
                            "a chandle may only be assigned in procedural \
                             code"
                                .to_owned(),
                        ));
                        return false;
                    }
                    if self.variable(*id).is_const {
                        self.report(Diagnostic::new(
                            DiagCode::BadAssignment,
                            expr.span,
                            "cannot assign to a const variable".to_owned(),
                        ));
                        return false;
                    }
                    true
                }
                _ => true,
            },
            ExprKind::ElementSelect { value, .. }
            | ExprKind::RangeSelect { value, .. }
            | ExprKind::MemberAccess { value, .. } => {
                self.verify_assignable(value, ctx)
            }
            ExprKind::Concat { operands } => operands
                .iter()
                .all(|operand| self.verify_assignable(operand, ctx)),
            ExprKind::Bad { .. } => true,
            _ => {
                self.report(Diagnostic::new(
                    DiagCode::BadAssignment,
                    expr.span,
                    "expression is not assignable".to_owned(),
                ));
                false
            }
        }
    }

    fn comparable_non_numeric(&self, a: TypeId, b: TypeId) -> bool {
        match (self.types.canon_kind(a), self.types.canon_kind(b)) {
            (TypeKind::Str, TypeKind::Str) => true,
            (TypeKind::Class(_) | TypeKind::CHandle | TypeKind::Event, _)
            | (_, TypeKind::Class(_) | TypeKind::CHandle | TypeKind::Event) => {
                self.is_assignment_compatible(a, b)
                    || self.is_assignment_compatible(b, a)
            }
            _ => false,
        }
    }

    fn invalid_operands(
        &mut self,
        span: Span,
        left: TypeId,
        right: Option<TypeId>,
    ) -> Expression {
        let message = match right {
            Some(right) => format!(
                "invalid operands `{}` and `{}`",
                self.type_to_string(left),
                self.type_to_string(right)
            ),
            None => {
                format!("invalid operand `{}`", self.type_to_string(left))
            }
        };
        self.report(Diagnostic::new(DiagCode::InvalidOperands, span, message));
        self.bad_expr(span, None)
    }

    /// The single-bit result type of comparisons and logical operators:
    /// `bit`, or `logic` when any participant is four-state.
    fn bool_result_type(&mut self, operands: &[&Expression]) -> TypeId {
        let four_state = operands
            .iter()
            .any(|operand| self.types.is_four_state(operand.ty));
        self.types.get_integral(1, false, four_state, false)
    }

    /// Converts an integral operand to real for mixed-type arithmetic.
    fn to_real_operand(&mut self, operand: Expression) -> Expression {
        if self.types.is_floating(operand.ty) {
            return operand;
        }
        let real = self.types.real_type();
        Expression {
            ty: real,
            span: operand.span,
            kind: ExprKind::Conversion {
                operand: Box::new(operand),
                conversion: ConversionKind::Implicit,
            },
        }
    }

    /// Computes the context-determined type of two integral operands and
    /// pushes it down both: width is the maximum of both operands and the
    /// assignment target, signedness survives only if every participant
    /// is signed.
    fn unify_operands(
        &mut self,
        left: &mut Expression,
        right: &mut Expression,
        ctx: &BindContext,
    ) -> TypeId {
        let mut width = self
            .types
            .bit_width(left.ty)
            .max(self.types.bit_width(right.ty));
        let mut signed =
            self.types.is_signed(left.ty) && self.types.is_signed(right.ty);
        let four_state = self.types.is_four_state(left.ty)
            || self.types.is_four_state(right.ty);

        if let Some(target) = ctx.target_type {
            if self.types.is_integral(target) {
                width = width.max(self.types.bit_width(target));
                signed = signed && self.types.is_signed(target);
            }
        }

        let ty = self.types.get_integral(width.max(1), signed, four_state, false);
        self.propagate_type(left, ty);
        self.propagate_type(right, ty);
        ty
    }

    /// Unifies two comparison operands between themselves, without the
    /// assignment target participating.
    fn unify_pair(&mut self, left: &mut Expression, right: &mut Expression) {
        let width = self
            .types
            .bit_width(left.ty)
            .max(self.types.bit_width(right.ty));
        let signed =
            self.types.is_signed(left.ty) && self.types.is_signed(right.ty);
        let four_state = self.types.is_four_state(left.ty)
            || self.types.is_four_state(right.ty);
        let ty = self.types.get_integral(width.max(1), signed, four_state, false);
        self.propagate_type(left, ty);
        self.propagate_type(right, ty);
    }

    /// Context-determines a lone operand (shift and power left sides).
    fn unify_with_target(
        &mut self,
        operand: &mut Expression,
        _other: Option<()>,
        ctx: &BindContext,
    ) -> TypeId {
        let mut width = self.types.bit_width(operand.ty);
        let mut signed = self.types.is_signed(operand.ty);
        let four_state = self.types.is_four_state(operand.ty);

        if let Some(target) = ctx.target_type {
            if self.types.is_integral(target) {
                width = width.max(self.types.bit_width(target));
                signed = signed && self.types.is_signed(target);
            }
        }

        let ty = self.types.get_integral(width.max(1), signed, four_state, false);
        self.propagate_type(operand, ty);
        ty
    }

    /// Pushes a context-determined integral type down the operand tree,
    /// retyping the context-determined node kinds and wrapping everything
    /// else in a propagated conversion.
    pub(crate) fn propagate_type(&mut self, expr: &mut Expression, ty: TypeId) {
        if expr.ty == ty || expr.is_bad() || self.types.is_error(expr.ty) {
            return;
        }

        let width = self.types.bit_width(ty);
        let signed = self.types.is_signed(ty);

        match &mut expr.kind {
            ExprKind::IntegerLiteral(value) => {
                *value = value.clone().as_signed(signed).resize(width);
                expr.ty = ty;
            }
            ExprKind::UnbasedUnsizedLiteral(_) => {
                expr.ty = ty;
            }
            ExprKind::Unary {
                op: UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitwiseNot,
                operand,
            } => {
                expr.ty = ty;
                self.propagate_type(operand, ty);
            }
            ExprKind::Binary { op, left, right }
                if op.is_context_determined() =>
            {
                expr.ty = ty;
                self.propagate_type(left, ty);
                self.propagate_type(right, ty);
            }
            ExprKind::Binary { op, left, .. } if op.is_shift() => {
                expr.ty = ty;
                self.propagate_type(left, ty);
            }
            ExprKind::Conditional { true_expr, false_expr, .. } => {
                expr.ty = ty;
                self.propagate_type(true_expr, ty);
                self.propagate_type(false_expr, ty);
            }
            ExprKind::MinTypMax { min, typ, max, .. } => {
                expr.ty = ty;
                self.propagate_type(min, ty);
                self.propagate_type(typ, ty);
                self.propagate_type(max, ty);
            }
            _ => {
                if !self.types.is_integral(expr.ty) {
                    return;
                }
                let span = expr.span;
                let error = self.types.error();
                let inner =
                    std::mem::replace(expr, Expression::bad(error, span, None));
                *expr = Expression {
                    ty,
                    span,
                    kind: ExprKind::Conversion {
                        operand: Box::new(inner),
                        conversion: ConversionKind::Propagated,
                    },
                };
            }
        }
    }

    /// Finishes binding a right-hand side against a target type: checks
    /// assignment compatibility, extends the operand to the context
    /// width, and inserts the implicit conversion node.
    pub(crate) fn convert_assignment(
        &mut self,
        target: TypeId,
        mut expr: Expression,
    ) -> Expression {
        if expr.is_bad()
            || self.types.is_error(target)
            || self.types.is_error(expr.ty)
        {
            return expr;
        }

        if !self.is_assignment_compatible(target, expr.ty) {
            let expr_ty = expr.ty;
            self.report(Diagnostic::new(
                DiagCode::BadAssignment,
                expr.span,
                format!(
                    "cannot assign `{}` to `{}`",
                    self.type_to_string(expr_ty),
                    self.type_to_string(target)
                ),
            ));
            return self.bad_expr(expr.span, Some(expr));
        }

        if self.is_matching(target, expr.ty) {
            return expr;
        }

        // the right-hand side computes at the wider of its own and the
        // target's width before converting
        if self.types.is_integral(target) && self.types.is_integral(expr.ty) {
            let width =
                self.types.bit_width(target).max(self.types.bit_width(expr.ty));
            let signed = self.types.is_signed(expr.ty);
            let four_state = self.types.is_four_state(expr.ty)
                || self.types.is_four_state(target);
            let wide =
                self.types.get_integral(width.max(1), signed, four_state, false);
            self.propagate_type(&mut expr, wide);
        }

        Expression {
            ty: target,
            span: expr.span,
            kind: ExprKind::Conversion {
                operand: Box::new(expr),
                conversion: ConversionKind::Implicit,
            },
        }
    }
}

fn lower_binary_op(op: syntax::BinaryOperator) -> BinaryOp {
    use syntax::BinaryOperator as S;
    match op {
        S::Add => BinaryOp::Add,
        S::Subtract => BinaryOp::Sub,
        S::Multiply => BinaryOp::Mul,
        S::Divide => BinaryOp::Div,
        S::Mod => BinaryOp::Mod,
        S::Power => BinaryOp::Pow,
        S::BinaryAnd => BinaryOp::And,
        S::BinaryOr => BinaryOp::Or,
        S::BinaryXor => BinaryOp::Xor,
        S::LogicalAnd => BinaryOp::LogicalAnd,
        S::LogicalOr => BinaryOp::LogicalOr,
        S::Equality => BinaryOp::Eq,
        S::Inequality => BinaryOp::Ne,
        S::CaseEquality => BinaryOp::CaseEq,
        S::CaseInequality => BinaryOp::CaseNe,
        S::LessThan => BinaryOp::Lt,
        S::LessThanEqual => BinaryOp::Le,
        S::GreaterThan => BinaryOp::Gt,
        S::GreaterThanEqual => BinaryOp::Ge,
        S::ShiftLeft => BinaryOp::Shl,
        S::ShiftRight => BinaryOp::Shr,
        S::ArithmeticShiftRight => BinaryOp::AShr,
    }
}

impl Compilation {
    fn bind_invocation(
        &mut self,
        invocation: &syntax::InvocationExpressionSyntax,
        with_clause: Option<&syntax::WithClauseSyntax>,
        ctx: &BindContext,
    ) -> Expression {
        let span = invocation.span;

        match invocation.callee.as_ref() {
            ExpressionSyntax::Name(NameSyntax::Identifier(identifier)) => {
                let text = identifier.identifier.value_text().to_owned();
                if text.starts_with('$') {
                    return self.bind_system_call(
                        &text,
                        None,
                        with_clause,
                        &invocation.arguments,
                        span,
                        ctx,
                    );
                }

                let name_id = self.interner.intern(&text);
                let result = self.lookup(
                    ctx.scope,
                    name_id,
                    Namespace::Members,
                    ctx.location,
                    LookupOptions { allow_declared_after: true },
                    identifier.identifier.span,
                );
                match result.symbol {
                    Some(SymbolId::Subroutine(subroutine)) => self
                        .bind_user_call(
                            subroutine,
                            None,
                            &invocation.arguments,
                            span,
                            ctx,
                        ),
                    // a recursive call resolves to the function's own
                    // return-value local; redirect to the function
                    Some(SymbolId::Variable(var))
                        if self.variable(var).flavor
                            == VarFlavor::ReturnValue =>
                    {
                        let SymbolId::Subroutine(subroutine) =
                            self.variable(var).parent
                        else {
                            return self.bad_expr(span, None);
                        };
                        self.bind_user_call(
                            subroutine,
                            None,
                            &invocation.arguments,
                            span,
                            ctx,
                        )
                    }
                    Some(other) => {
                        let kind = self.symbol_kind(other);
                        self.report(Diagnostic::new(
                            DiagCode::NotASubroutine,
                            span,
                            format!("`{text}` is a {kind}, not a subroutine"),
                        ));
                        self.bad_expr(span, None)
                    }
                    None => {
                        if !result.reported {
                            self.report(Diagnostic::new(
                                DiagCode::UndeclaredIdentifier,
                                span,
                                format!(
                                    "use of undeclared identifier `{text}`"
                                ),
                            ));
                        }
                        self.bad_expr(span, None)
                    }
                }
            }
            ExpressionSyntax::Name(NameSyntax::Scoped(scoped)) => {
                let package_name =
                    self.interner.intern(scoped.scope.value_text());
                let item_name = self.interner.intern(scoped.name.value_text());
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
                    return self.bad_expr(span, None);
                };
                match self.lookup_direct(SymbolId::Package(package), item_name)
                {
                    Some(SymbolId::Subroutine(subroutine)) => self
                        .bind_user_call(
                            subroutine,
                            None,
                            &invocation.arguments,
                            span,
                            ctx,
                        ),
                    _ => {
                        self.report(Diagnostic::new(
                            DiagCode::NotASubroutine,
                            span,
                            format!(
                                "`{}::{}` is not a subroutine",
                                self.name(package_name),
                                self.name(item_name)
                            ),
                        ));
                        self.bad_expr(span, None)
                    }
                }
            }
            ExpressionSyntax::MemberAccess(access) => {
                let method_name = access.member.value_text().to_owned();
                let receiver = self.bind_expression(&access.value, ctx);
                if receiver.is_bad() {
                    return self.bad_expr(span, Some(receiver));
                }

                if let TypeKind::Class(class) =
                    *self.types.canon_kind(receiver.ty)
                {
                    let name_id = self.interner.intern(&method_name);
                    let Some(method) = self.find_class_method(class, name_id)
                    else {
                        self.report(Diagnostic::new(
                            DiagCode::UnknownMember,
                            access.member.span,
                            format!(
                                "class `{}` has no method named \
                                 `{method_name}`",
                                self.name(self.class(class).name)
                            ),
                        ));
                        return self.bad_expr(span, Some(receiver));
                    };
                    return self.bind_user_call(
                        method,
                        Some(receiver),
                        &invocation.arguments,
                        span,
                        ctx,
                    );
                }

                self.bind_system_call(
                    &method_name,
                    Some(receiver),
                    with_clause,
                    &invocation.arguments,
                    span,
                    ctx,
                )
            }
            other => {
                let _ = other;
                self.report(Diagnostic::new(
                    DiagCode::NotASubroutine,
                    span,
                    "expression cannot be called".to_owned(),
                ));
                self.bad_expr(span, None)
            }
        }
    }

    /// Binds a call to a user-declared subroutine: matches ordered and
    /// named arguments against the formals, applies defaults, and
    /// re-binds every argument with the formal's type and direction.
    fn bind_user_call(
        &mut self,
        subroutine: ID<crate::symbol::Subroutine>,
        receiver: Option<Expression>,
        arguments: &[syntax::ArgumentSyntax],
        span: Span,
        ctx: &BindContext,
    ) -> Expression {
        self.force_subroutine(subroutine);
        let formals = self.subroutine(subroutine).args.clone();
        let return_type = self.subroutine(subroutine).return_type;

        #[derive(Clone)]
        enum Slot {
            Missing,
            /// An explicitly skipped argument: use the default.
            Empty(Span),
            Expr(ExpressionSyntax),
        }

        let mut slots = vec![Slot::Missing; formals.len()];
        let mut saw_ordered = false;
        let mut saw_named = false;
        let mut mixed_reported = false;
        let mut named_seen: Vec<NameId> = Vec::new();
        let mut next_ordered = 0usize;
        let mut provided = 0usize;
        let mut bad = false;

        for argument in arguments {
            match argument {
                syntax::ArgumentSyntax::Ordered(ordered) => {
                    saw_ordered = true;
                    if saw_named && !mixed_reported {
                        self.report(Diagnostic::new(
                            DiagCode::MixedOrderedNamed,
                            span,
                            "ordered and named arguments cannot be mixed"
                                .to_owned(),
                        ));
                        mixed_reported = true;
                        bad = true;
                    }
                    provided += 1;
                    if next_ordered >= formals.len() {
                        continue;
                    }
                    slots[next_ordered] =
                        Slot::Expr(ordered.expression.clone());
                    next_ordered += 1;
                }
                syntax::ArgumentSyntax::Empty(empty) => {
                    saw_ordered = true;
                    provided += 1;
                    if next_ordered >= formals.len() {
                        continue;
                    }
                    slots[next_ordered] = Slot::Empty(empty.span);
                    next_ordered += 1;
                }
                syntax::ArgumentSyntax::Named(named) => {
                    saw_named = true;
                    if saw_ordered && !mixed_reported {
                        self.report(Diagnostic::new(
                            DiagCode::MixedOrderedNamed,
                            named.name.span,
                            "ordered and named arguments cannot be mixed"
                                .to_owned(),
                        ));
                        mixed_reported = true;
                        bad = true;
                    }

                    let name_id = self.interner.intern(named.name.value_text());
                    if named_seen.contains(&name_id) {
                        self.report(Diagnostic::new(
                            DiagCode::DuplicateNamedArgument,
                            named.name.span,
                            format!(
                                "argument `{}` is given more than once",
                                self.name(name_id)
                            ),
                        ));
                        bad = true;
                        continue;
                    }
                    named_seen.push(name_id);

                    let Some(position) = formals
                        .iter()
                        .position(|formal| self.formal(*formal).name == name_id)
                    else {
                        let callee =
                            self.name(self.subroutine(subroutine).name)
                                .to_owned();
                        self.report(Diagnostic::new(
                            DiagCode::UnknownNamedArgument,
                            named.name.span,
                            format!(
                                "`{callee}` has no argument named `{}`",
                                self.name(name_id)
                            ),
                        ));
                        bad = true;
                        continue;
                    };
                    provided += 1;
                    slots[position] = match &named.expression {
                        Some(expression) => Slot::Expr(expression.clone()),
                        None => Slot::Empty(named.name.span),
                    };
                }
            }
        }

        if provided > formals.len() {
            self.report(Diagnostic::new(
                DiagCode::TooManyArguments,
                span,
                format!(
                    "too many arguments: expected {}, got {provided}",
                    formals.len()
                ),
            ));
            return self.bad_expr(span, None);
        }

        let mut args = Vec::with_capacity(formals.len());
        let mut missing = 0usize;
        for (formal_id, slot) in formals.iter().zip(slots) {
            let formal = self.formal(*formal_id);
            let formal_ty = formal.ty;
            let direction = formal.direction;
            let default = formal.default.clone();
            let formal_scope = formal.parent;
            let formal_span = formal.span;

            let bound = match slot {
                Slot::Expr(expression) => {
                    let bound =
                        self.bind_rvalue(&expression, formal_ty, ctx);
                    if direction != ArgDirection::In && !bound.is_bad() {
                        self.verify_assignable(&bound, ctx);
                    }
                    bound
                }
                Slot::Empty(empty_span) => match default {
                    Some(default) => {
                        // defaults bind in the callee's own scope
                        let callee_ctx = BindContext::new(
                            formal_scope,
                            LookupLocation::MAX,
                        );
                        self.bind_rvalue(&default, formal_ty, &callee_ctx)
                    }
                    None => {
                        self.report(
                            Diagnostic::new(
                                DiagCode::MissingArgumentDefault,
                                empty_span,
                                "argument is omitted but the formal has no \
                                 default"
                                    .to_owned(),
                            )
                            .with_related(Related::declared_here(formal_span)),
                        );
                        bad = true;
                        self.bad_expr(empty_span, None)
                    }
                },
                Slot::Missing => match default {
                    Some(default) => {
                        let callee_ctx = BindContext::new(
                            formal_scope,
                            LookupLocation::MAX,
                        );
                        self.bind_rvalue(&default, formal_ty, &callee_ctx)
                    }
                    None => {
                        missing += 1;
                        self.bad_expr(span, None)
                    }
                },
            };
            args.push(bound);
        }

        if missing > 0 {
            self.report(Diagnostic::new(
                DiagCode::TooFewArguments,
                span,
                format!(
                    "too few arguments: expected {}, got {provided}",
                    formals.len()
                ),
            ));
            return self.bad_expr(span, None);
        }
        if bad {
            return self.bad_expr(span, None);
        }

        Expression {
            ty: return_type,
            span,
            kind: ExprKind::Call(CallExpr {
                callee: Callee::User(subroutine),
                receiver: receiver.map(Box::new),
                args,
            }),
        }
    }

    /// Binds a system subroutine or built-in method call through the
    /// dispatch table keyed by receiver type kind and name.
    fn bind_system_call(
        &mut self,
        name: &str,
        receiver: Option<Expression>,
        with_clause: Option<&syntax::WithClauseSyntax>,
        arguments: &[syntax::ArgumentSyntax],
        span: Span,
        ctx: &BindContext,
    ) -> Expression {
        let subroutine = match &receiver {
            Some(receiver_expr) => {
                let kind =
                    crate::builtins::receiver_kind(&self.types, receiver_expr.ty);
                kind.and_then(|kind| self.builtins.get_method(kind, name))
            }
            None => self.builtins.get_free(name),
        };
        let Some(subroutine) = subroutine else {
            self.report(Diagnostic::new(
                DiagCode::UnknownSystemSubroutine,
                span,
                match &receiver {
                    Some(receiver_expr) => format!(
                        "`{}` has no method named `{name}`",
                        self.type_to_string(receiver_expr.ty)
                    ),
                    None => format!("unknown system subroutine `{name}`"),
                },
            ));
            return self.bad_expr(span, None);
        };

        // system subroutines take ordered arguments, and may take types
        let arg_ctx = ctx.clone().with_flags(BindFlags {
            allow_data_type: true,
            ..ctx.flags
        });
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument {
                syntax::ArgumentSyntax::Ordered(ordered) => {
                    args.push(
                        self.bind_expression(&ordered.expression, &arg_ctx),
                    );
                }
                syntax::ArgumentSyntax::Named(named) => {
                    self.report(Diagnostic::new(
                        DiagCode::MixedOrderedNamed,
                        named.name.span,
                        "system subroutines take ordered arguments only"
                            .to_owned(),
                    ));
                    return self.bad_expr(span, None);
                }
                syntax::ArgumentSyntax::Empty(empty) => {
                    self.report(Diagnostic::new(
                        DiagCode::MissingArgumentDefault,
                        empty.span,
                        "system subroutine arguments cannot be omitted"
                            .to_owned(),
                    ));
                    return self.bad_expr(span, None);
                }
            }
        }
        if args.iter().any(Expression::is_bad) {
            return self.bad_expr(span, None);
        }

        // a with clause introduces an iterator over the receiver's
        // elements into a child bind context
        let iterator = match (with_clause, &receiver) {
            (Some(clause), Some(receiver_expr)) => {
                let Some(element) = self.types.array_element(receiver_expr.ty)
                else {
                    self.report(Diagnostic::new(
                        DiagCode::InvalidOperands,
                        clause.span,
                        "a with clause requires an array receiver".to_owned(),
                    ));
                    return self.bad_expr(span, None);
                };

                let iter_name = clause
                    .iterator_name
                    .as_ref()
                    .map_or("item", |token| token.value_text());
                let iter_name = self.interner.intern(iter_name);
                let var = self.variables.insert(Variable {
                    name: iter_name,
                    span: clause.span,
                    parent: ctx.scope,
                    ty: element,
                    is_const: false,
                    is_static_member: false,
                    visibility: Default::default(),
                    flavor: VarFlavor::Iterator,
                    initializer: None,
                    decl_index: 0,
                });

                let mut child = ctx.clone();
                child.iterators = Some(Rc::new(IterVar {
                    name: iter_name,
                    var,
                    next: ctx.iterators.clone(),
                }));
                let body = self.bind_expression(&clause.expression, &child);
                if body.is_bad() {
                    return self.bad_expr(span, None);
                }
                Some(IteratorInfo { var, body: Box::new(body) })
            }
            (Some(clause), None) => {
                self.report(Diagnostic::new(
                    DiagCode::InvalidOperands,
                    clause.span,
                    "a with clause requires a method receiver".to_owned(),
                ));
                return self.bad_expr(span, None);
            }
            (None, _) => None,
        };

        let ty = subroutine.check_arguments(
            self,
            &args,
            receiver.as_ref(),
            iterator.as_ref(),
            span,
        );
        if self.types.is_error(ty) {
            return self.bad_expr(span, None);
        }

        Expression {
            ty,
            span,
            kind: ExprKind::Call(CallExpr {
                callee: Callee::System(SystemCallInfo {
                    subroutine,
                    receiver: receiver.map(Box::new),
                    iterator,
                }),
                receiver: None,
                args,
            }),
        }
    }
}
