//! Contains the system subroutine dispatch table.
//!
//! System subroutines and built-in methods resolve by name against a
//! registry keyed by receiver type kind and method name. Each entry is a
//! [`SystemSubroutine`] descriptor exposing argument checking, constant
//! evaluation, and constant verification behind one interface.

use std::{collections::HashMap, sync::Arc};

use num_traits::One;
use velac_base::span::Span;

use crate::{
    diagnostic::{DiagCode, Diagnostic},
    eval::EvalContext,
    expr::{Callee, CallExpr, Expression, IteratorInfo},
    logic::LogicVec,
    symbol::SymbolId,
    ty::{TypeId, TypeKind, TypeTable},
    value::ConstantValue,
    Compilation,
};

/// The behavior of one system subroutine or built-in method.
pub trait SystemSubroutine: Send + Sync {
    /// The name the subroutine is registered under.
    fn name(&self) -> &'static str;

    /// Validates the bound arguments and returns the call's type, or the
    /// error type after reporting.
    fn check_arguments(
        &self,
        comp: &mut Compilation,
        args: &[Expression],
        receiver: Option<&Expression>,
        iterator: Option<&IteratorInfo>,
        span: Span,
    ) -> TypeId;

    /// Evaluates the call as a constant.
    fn eval(
        &self,
        comp: &mut Compilation,
        ev: &mut EvalContext,
        call: &CallExpr,
        span: Span,
    ) -> ConstantValue;

    /// Whether the call could evaluate as a constant.
    fn verify_constant(
        &self,
        _comp: &mut Compilation,
        _ev: &mut EvalContext,
        _call: &CallExpr,
        _span: Span,
    ) -> bool {
        true
    }
}

/// The receiver classification built-in methods dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReceiverKind {
    Integral,
    Enum,
    Str,
    FixedArray,
    DynamicArray,
    AssociativeArray,
    Queue,
}

/// Classifies a type for method dispatch.
#[must_use]
pub fn receiver_kind(types: &TypeTable, ty: TypeId) -> Option<ReceiverKind> {
    match types.canon_kind(ty) {
        TypeKind::Integral(_) => Some(ReceiverKind::Integral),
        TypeKind::Enum(_) => Some(ReceiverKind::Enum),
        TypeKind::Str => Some(ReceiverKind::Str),
        TypeKind::FixedArray { .. } => Some(ReceiverKind::FixedArray),
        TypeKind::DynamicArray { .. } => Some(ReceiverKind::DynamicArray),
        TypeKind::AssociativeArray { .. } => {
            Some(ReceiverKind::AssociativeArray)
        }
        TypeKind::Queue { .. } => Some(ReceiverKind::Queue),
        _ => None,
    }
}

/// The dispatch table: free system subroutines by name, methods by
/// receiver kind and name.
pub struct Registry {
    free: HashMap<&'static str, Arc<dyn SystemSubroutine>>,
    methods: HashMap<(ReceiverKind, &'static str), Arc<dyn SystemSubroutine>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("free", &self.free.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        let mut registry =
            Self { free: HashMap::new(), methods: HashMap::new() };

        registry.register_free(Arc::new(BitsFunction));
        registry.register_free(Arc::new(Clog2Function));
        registry.register_free(Arc::new(SignednessFunction { signed: true }));
        registry.register_free(Arc::new(SignednessFunction { signed: false }));

        let size: Arc<dyn SystemSubroutine> = Arc::new(SizeMethod);
        for kind in [
            ReceiverKind::FixedArray,
            ReceiverKind::DynamicArray,
            ReceiverKind::AssociativeArray,
            ReceiverKind::Queue,
        ] {
            registry.methods.insert((kind, "size"), Arc::clone(&size));
        }
        registry
            .methods
            .insert((ReceiverKind::AssociativeArray, "num"), Arc::clone(&size));

        let sum: Arc<dyn SystemSubroutine> = Arc::new(SumMethod);
        for kind in [
            ReceiverKind::FixedArray,
            ReceiverKind::DynamicArray,
            ReceiverKind::Queue,
        ] {
            registry.methods.insert((kind, "sum"), Arc::clone(&sum));
        }

        registry.methods.insert((ReceiverKind::Enum, "name"), Arc::new(EnumNameMethod));

        registry
    }

    fn register_free(&mut self, subroutine: Arc<dyn SystemSubroutine>) {
        self.free.insert(subroutine.name(), subroutine);
    }

    /// Looks up a free system subroutine (`$bits`, `$clog2`, ...).
    #[must_use]
    pub fn get_free(&self, name: &str) -> Option<Arc<dyn SystemSubroutine>> {
        self.free.get(name).cloned()
    }

    /// Looks up a built-in method by receiver kind and name.
    #[must_use]
    pub fn get_method(
        &self,
        kind: ReceiverKind,
        name: &str,
    ) -> Option<Arc<dyn SystemSubroutine>> {
        self.methods.get(&(kind, name)).cloned()
    }
}

impl Default for Registry {
    fn default() -> Self { Self::new() }
}

fn integer_result(comp: &mut Compilation) -> TypeId {
    comp.types_mut().get_integral(32, true, true, false)
}

fn check_exact_args(
    comp: &mut Compilation,
    args: &[Expression],
    expected: usize,
    span: Span,
) -> bool {
    if args.len() == expected {
        return true;
    }
    let code = if args.len() < expected {
        DiagCode::TooFewArguments
    } else {
        DiagCode::TooManyArguments
    };
    comp.report(Diagnostic::new(
        code,
        span,
        format!("expected {expected} arguments, got {}", args.len()),
    ));
    false
}

fn system_info(call: &CallExpr) -> &crate::expr::SystemCallInfo {
    match &call.callee {
        Callee::System(info) => info,
        Callee::User(_) => unreachable!("system eval on a user call"),
    }
}

/// `$bits(expr_or_type)`: the bitstream width of its argument.
struct BitsFunction;

impl SystemSubroutine for BitsFunction {
    fn name(&self) -> &'static str { "$bits" }

    fn check_arguments(
        &self,
        comp: &mut Compilation,
        args: &[Expression],
        _receiver: Option<&Expression>,
        _iterator: Option<&IteratorInfo>,
        span: Span,
    ) -> TypeId {
        if !check_exact_args(comp, args, 1, span) {
            return comp.types().error();
        }
        if comp.types().bitstream_width(args[0].ty).is_none() {
            comp.report(Diagnostic::new(
                DiagCode::DynamicNotAllowed,
                span,
                "argument has no statically known bit width".to_owned(),
            ));
            return comp.types().error();
        }
        integer_result(comp)
    }

    fn eval(
        &self,
        comp: &mut Compilation,
        _ev: &mut EvalContext,
        call: &CallExpr,
        _span: Span,
    ) -> ConstantValue {
        let width = comp.types().bitstream_width(call.args[0].ty);
        match width {
            Some(width) => ConstantValue::Integer(
                LogicVec::from_u64(32, width).as_signed(true),
            ),
            None => ConstantValue::Bad,
        }
    }
}

/// `$clog2(n)`: the ceiling of the base-two logarithm.
struct Clog2Function;

impl SystemSubroutine for Clog2Function {
    fn name(&self) -> &'static str { "$clog2" }

    fn check_arguments(
        &self,
        comp: &mut Compilation,
        args: &[Expression],
        _receiver: Option<&Expression>,
        _iterator: Option<&IteratorInfo>,
        span: Span,
    ) -> TypeId {
        if !check_exact_args(comp, args, 1, span) {
            return comp.types().error();
        }
        if !comp.types().is_integral(args[0].ty) {
            comp.report(Diagnostic::new(
                DiagCode::BadArgumentType,
                span,
                "$clog2 takes an integral argument".to_owned(),
            ));
            return comp.types().error();
        }
        integer_result(comp)
    }

    fn eval(
        &self,
        comp: &mut Compilation,
        ev: &mut EvalContext,
        call: &CallExpr,
        _span: Span,
    ) -> ConstantValue {
        let value = comp.eval_expr(ev, &call.args[0]);
        let ConstantValue::Integer(vector) = value else {
            return ConstantValue::Bad;
        };
        let Some(magnitude) = vector.to_biguint() else {
            return ConstantValue::Integer(LogicVec::all_x(32, true));
        };
        let result = if magnitude <= num_bigint::BigUint::one() {
            0
        } else {
            (magnitude - 1u8).bits()
        };
        ConstantValue::Integer(LogicVec::from_u64(32, result).as_signed(true))
    }
}

/// `$signed(x)` / `$unsigned(x)`: the same bits with flipped signedness.
struct SignednessFunction {
    signed: bool,
}

impl SystemSubroutine for SignednessFunction {
    fn name(&self) -> &'static str {
        if self.signed {
            "$signed"
        } else {
            "$unsigned"
        }
    }

    fn check_arguments(
        &self,
        comp: &mut Compilation,
        args: &[Expression],
        _receiver: Option<&Expression>,
        _iterator: Option<&IteratorInfo>,
        span: Span,
    ) -> TypeId {
        if !check_exact_args(comp, args, 1, span) {
            return comp.types().error();
        }
        let Some(data) = comp.types().integral_data(args[0].ty).cloned() else {
            comp.report(Diagnostic::new(
                DiagCode::BadArgumentType,
                span,
                format!("{} takes an integral argument", self.name()),
            ));
            return comp.types().error();
        };
        comp.types_mut().get_integral(
            data.width,
            self.signed,
            data.four_state,
            false,
        )
    }

    fn eval(
        &self,
        comp: &mut Compilation,
        ev: &mut EvalContext,
        call: &CallExpr,
        _span: Span,
    ) -> ConstantValue {
        match comp.eval_expr(ev, &call.args[0]) {
            ConstantValue::Integer(vector) => {
                ConstantValue::Integer(vector.as_signed(self.signed))
            }
            _ => ConstantValue::Bad,
        }
    }
}

/// `arr.size()` and `assoc.num()`: the element count.
struct SizeMethod;

impl SystemSubroutine for SizeMethod {
    fn name(&self) -> &'static str { "size" }

    fn check_arguments(
        &self,
        comp: &mut Compilation,
        args: &[Expression],
        _receiver: Option<&Expression>,
        _iterator: Option<&IteratorInfo>,
        span: Span,
    ) -> TypeId {
        if !check_exact_args(comp, args, 0, span) {
            return comp.types().error();
        }
        comp.types_mut().int_type()
    }

    fn eval(
        &self,
        comp: &mut Compilation,
        ev: &mut EvalContext,
        call: &CallExpr,
        _span: Span,
    ) -> ConstantValue {
        let info = system_info(call);
        let receiver = info.receiver.clone();
        let Some(receiver) = receiver else { return ConstantValue::Bad };
        let count = match comp.eval_expr(ev, &receiver) {
            ConstantValue::Elements(elements) => elements.len(),
            ConstantValue::Map(map) => map.len(),
            ConstantValue::Queue(queue) => queue.elements.len(),
            _ => return ConstantValue::Bad,
        };
        ConstantValue::Integer(
            LogicVec::from_u64(32, count as u64).as_signed(true),
        )
    }
}

/// `arr.sum()` with an optional `with` clause mapping each element
/// through an iterator expression before accumulating.
struct SumMethod;

impl SystemSubroutine for SumMethod {
    fn name(&self) -> &'static str { "sum" }

    fn check_arguments(
        &self,
        comp: &mut Compilation,
        args: &[Expression],
        receiver: Option<&Expression>,
        iterator: Option<&IteratorInfo>,
        span: Span,
    ) -> TypeId {
        if !check_exact_args(comp, args, 0, span) {
            return comp.types().error();
        }
        if let Some(iterator) = iterator {
            return iterator.body.ty;
        }
        let element = receiver
            .and_then(|receiver| comp.types().array_element(receiver.ty));
        match element {
            Some(element) if comp.types().is_numeric(element) => element,
            _ => {
                comp.report(Diagnostic::new(
                    DiagCode::BadArgumentType,
                    span,
                    "sum requires numeric elements".to_owned(),
                ));
                comp.types().error()
            }
        }
    }

    fn eval(
        &self,
        comp: &mut Compilation,
        ev: &mut EvalContext,
        call: &CallExpr,
        _span: Span,
    ) -> ConstantValue {
        let info = system_info(call);
        let receiver = info.receiver.clone();
        let iterator = info.iterator.clone();
        let Some(receiver) = receiver else { return ConstantValue::Bad };

        let elements = match comp.eval_expr(ev, &receiver) {
            ConstantValue::Elements(elements) => elements,
            ConstantValue::Queue(queue) => queue.elements,
            _ => return ConstantValue::Bad,
        };

        let mut sum: Option<ConstantValue> = None;
        for element in elements {
            let term = match &iterator {
                Some(iterator) => {
                    ev.set_local(SymbolId::Variable(iterator.var), element);
                    comp.eval_expr(ev, &iterator.body)
                }
                None => element,
            };
            if term.is_bad() {
                return ConstantValue::Bad;
            }

            sum = Some(match (sum, term) {
                (None, term) => term,
                (
                    Some(ConstantValue::Integer(accumulated)),
                    ConstantValue::Integer(term),
                ) => {
                    let term = term.resize(accumulated.width());
                    ConstantValue::Integer(accumulated.add(&term))
                }
                (Some(ConstantValue::Real(accumulated)), term) => {
                    match term.to_real() {
                        Some(term) => ConstantValue::Real(accumulated + term),
                        None => return ConstantValue::Bad,
                    }
                }
                _ => return ConstantValue::Bad,
            });
        }

        sum.unwrap_or(ConstantValue::Integer(LogicVec::from_u64(32, 0)))
    }
}

/// `enum_value.name()`: the declared name of the value, or the empty
/// string when the value matches no member.
struct EnumNameMethod;

impl SystemSubroutine for EnumNameMethod {
    fn name(&self) -> &'static str { "name" }

    fn check_arguments(
        &self,
        comp: &mut Compilation,
        args: &[Expression],
        _receiver: Option<&Expression>,
        _iterator: Option<&IteratorInfo>,
        span: Span,
    ) -> TypeId {
        if !check_exact_args(comp, args, 0, span) {
            return comp.types().error();
        }
        comp.types().string_type()
    }

    fn eval(
        &self,
        comp: &mut Compilation,
        ev: &mut EvalContext,
        call: &CallExpr,
        _span: Span,
    ) -> ConstantValue {
        let info = system_info(call);
        let receiver = info.receiver.clone();
        let Some(receiver) = receiver else { return ConstantValue::Bad };

        let TypeKind::Enum(data) = comp.types().canon_kind(receiver.ty).clone()
        else {
            return ConstantValue::Bad;
        };
        let value = comp.eval_expr(ev, &receiver);
        if value.is_bad() {
            return ConstantValue::Bad;
        }

        for member in data.values {
            if comp.enum_value(member).value == value {
                let name =
                    comp.name(comp.enum_value(member).name).to_owned();
                return ConstantValue::Str(name);
            }
        }
        ConstantValue::Str(String::new())
    }
}
