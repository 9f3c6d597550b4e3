//! Contains the constant evaluator: folding over bound expression trees
//! with a call-stack model for constant functions.
//!
//! Control flow inside statement evaluation is an explicit [`EvalResult`]
//! sum propagated upward; nothing unwinds. Every failure produces the bad
//! sentinel after reporting at most one primary diagnostic.

use std::{collections::HashMap, sync::Arc};

use velac_base::span::Span;

use crate::{
    arena::ID,
    diagnostic::{DiagCode, Diagnostic},
    expr::{
        BinaryOp, Callee, CallExpr, ExprKind, Expression, MemberTarget,
        UnaryOp,
    },
    logic::LogicVec,
    stmt::Statement,
    symbol::{ArgDirection, Block, LookupLocation, Subroutine, SymbolId},
    ty::TypeKind,
    value::ConstantValue,
    Compilation, CompilationOptions,
};

/// The result status a statement evaluation propagates upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalResult {
    Success,
    Return,
    Fail,
    Disable(Option<ID<Block>>),
    Break,
    Continue,
}

/// One frame of the constant-function call stack.
#[derive(Debug, Default)]
pub struct Frame {
    /// The subroutine this frame executes, absent for the root frame.
    pub subroutine: Option<ID<Subroutine>>,

    /// Locals of the frame: formal arguments, block variables, and the
    /// return-value local.
    pub locals: HashMap<SymbolId, ConstantValue>,

    /// Where the call happened, for diagnostics.
    pub call_span: Span,

    /// The lookup location of the call site.
    pub lookup_location: LookupLocation,
}

/// The mutable state of one constant evaluation.
#[derive(Debug)]
pub struct EvalContext {
    frames: Vec<Frame>,

    /// Relaxes must-be-constant checks for interactive evaluation.
    pub script_eval: bool,

    /// Hard ceiling for the call stack depth.
    pub max_depth: u32,

    /// The l-value of the innermost assignment being evaluated, read by
    /// l-value reference expressions.
    top_lvalue: Option<LValuePath>,

    /// Subroutines currently being verified, to cut recursion.
    verify_stack: Vec<ID<Subroutine>>,
}

impl EvalContext {
    #[must_use]
    pub fn new(options: &CompilationOptions) -> Self {
        Self {
            frames: vec![Frame::default()],
            script_eval: options.script_eval,
            max_depth: options.max_recursion_depth,
            top_lvalue: None,
            verify_stack: Vec::new(),
        }
    }

    fn frame(&self) -> &Frame { self.frames.last().unwrap() }

    fn frame_mut(&mut self) -> &mut Frame { self.frames.last_mut().unwrap() }

    /// Finds a local in the active frame.
    #[must_use]
    pub fn find_local(&self, symbol: SymbolId) -> Option<&ConstantValue> {
        self.frame().locals.get(&symbol)
    }

    /// Creates or overwrites a local in the active frame.
    pub fn set_local(&mut self, symbol: SymbolId, value: ConstantValue) {
        self.frame_mut().locals.insert(symbol, value);
    }

    /// The current call depth, the root frame excluded.
    #[must_use]
    pub fn depth(&self) -> usize { self.frames.len() - 1 }
}

/// An l-value handle: a frame-local root plus a chain of aggregate
/// selections into it.
#[derive(Debug, Clone, PartialEq)]
pub struct LValuePath {
    pub root: SymbolId,
    pub path: Vec<PathElem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathElem {
    /// A zero-based element offset into an unpacked aggregate or queue.
    Element(usize),
    /// A key into an associative array.
    Key(ConstantValue),
    /// A field of an unpacked struct, by position.
    Field(usize),
    /// A bit range `[high:low]` of an integral value.
    Bits(u32, u32),
}

impl Compilation {
    /// Evaluates a bound expression as a constant using a fresh context
    /// configured from the compilation options.
    pub fn eval_constant(&mut self, expr: &Expression) -> ConstantValue {
        let mut ev = EvalContext::new(self.options());
        self.eval_expr(&mut ev, expr)
    }

    /// Folds a bound expression in the given evaluation context.
    pub fn eval_expr(
        &mut self,
        ev: &mut EvalContext,
        expr: &Expression,
    ) -> ConstantValue {
        match &expr.kind {
            ExprKind::IntegerLiteral(value) => {
                ConstantValue::Integer(value.clone())
            }
            ExprKind::UnbasedUnsizedLiteral(digit) => {
                let width = self.types.bit_width(expr.ty).max(1);
                ConstantValue::Integer(LogicVec::filled(width, false, *digit))
            }
            ExprKind::RealLiteral(value) => ConstantValue::Real(*value),
            ExprKind::StringLiteral(value) => {
                ConstantValue::Str(value.clone())
            }
            ExprKind::NullLiteral => ConstantValue::Null,

            ExprKind::NamedValue { symbol, hierarchical } => {
                self.eval_named(ev, *symbol, *hierarchical, expr.span)
            }

            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(ev, operand);
                if value.is_bad() {
                    return ConstantValue::Bad;
                }
                self.eval_unary(*op, &value, expr)
            }

            ExprKind::Binary { op, left, right } => {
                self.eval_binary(ev, *op, left, right, expr)
            }

            ExprKind::Conditional { condition, true_expr, false_expr } => {
                let condition_value = self.eval_expr(ev, condition);
                if condition_value.is_bad() {
                    return ConstantValue::Bad;
                }
                let taken = match condition_value.truthy() {
                    Some(taken) => taken,
                    None => {
                        self.report(Diagnostic::new(
                            DiagCode::ConstEvalUnknownCondition,
                            condition.span,
                            "condition is unknown; treating it as false"
                                .to_owned(),
                        ));
                        false
                    }
                };
                if taken {
                    self.eval_expr(ev, true_expr)
                } else {
                    self.eval_expr(ev, false_expr)
                }
            }

            ExprKind::MinTypMax { min, typ, max, selected } => {
                let chosen = match selected {
                    crate::MinTypMax::Min => min,
                    crate::MinTypMax::Typ => typ,
                    crate::MinTypMax::Max => max,
                };
                self.eval_expr(ev, chosen)
            }

            ExprKind::Concat { operands } => self.eval_concat(ev, operands),

            ExprKind::ElementSelect { value, index } => {
                self.eval_element_select(ev, value, index, expr)
            }

            ExprKind::RangeSelect { value, range } => {
                let base = self.eval_expr(ev, value);
                match base {
                    ConstantValue::Integer(vector) => {
                        let (high, low) = (
                            range.upper().max(0) as u32,
                            range.lower().max(0) as u32,
                        );
                        if high >= vector.width() {
                            return ConstantValue::Integer(LogicVec::all_x(
                                (high - low + 1).max(1),
                                false,
                            ));
                        }
                        ConstantValue::Integer(vector.extract(high, low))
                    }
                    ConstantValue::Elements(elements) => {
                        let low = range.lower().max(0) as usize;
                        let high = range.upper().max(0) as usize;
                        ConstantValue::Elements(
                            elements
                                .get(low..=high.min(elements.len().saturating_sub(1)))
                                .unwrap_or(&[])
                                .to_vec(),
                        )
                    }
                    ConstantValue::Bad => ConstantValue::Bad,
                    _ => ConstantValue::Bad,
                }
            }

            ExprKind::MemberAccess { value, member } => {
                let base = self.eval_expr(ev, value);
                match (base, member) {
                    (
                        ConstantValue::Elements(elements),
                        MemberTarget::StructField(index),
                    ) => elements
                        .get(*index)
                        .cloned()
                        .unwrap_or(ConstantValue::Bad),
                    (ConstantValue::Bad, _) => ConstantValue::Bad,
                    (_, MemberTarget::ClassProperty(_)) => {
                        self.report(Diagnostic::new(
                            DiagCode::ConstEvalNonConstVariable,
                            expr.span,
                            "class properties are not constant".to_owned(),
                        ));
                        ConstantValue::Bad
                    }
                    _ => ConstantValue::Bad,
                }
            }

            ExprKind::Call(call) => self.eval_call(ev, call, expr.span),

            ExprKind::Conversion { operand, .. } => {
                let value = self.eval_expr(ev, operand);
                if value.is_bad() {
                    return ConstantValue::Bad;
                }
                self.types.coerce_value(expr.ty, &value)
            }

            ExprKind::Assignment { lhs, rhs } => {
                self.eval_assignment(ev, lhs, rhs)
            }

            ExprKind::DataType => ConstantValue::Bad,

            ExprKind::LValueRef => match ev.top_lvalue.clone() {
                Some(lvalue) => self.load_lvalue(ev, &lvalue),
                None => ConstantValue::Bad,
            },

            ExprKind::Bad { .. } => ConstantValue::Bad,
        }
    }

    fn eval_named(
        &mut self,
        ev: &mut EvalContext,
        symbol: SymbolId,
        hierarchical: bool,
        span: Span,
    ) -> ConstantValue {
        if hierarchical
            && !self.options().allow_hierarchical_const
            && !ev.script_eval
        {
            self.report(Diagnostic::new(
                DiagCode::ConstEvalHierarchical,
                span,
                "hierarchical references are not allowed in constant \
                 expressions"
                    .to_owned(),
            ));
            return ConstantValue::Bad;
        }

        match symbol {
            SymbolId::Parameter(id) => self.parameter_value(id),
            SymbolId::EnumValue(id) => self.enum_value(id).value.clone(),
            SymbolId::Variable(id) => {
                if let Some(value) =
                    ev.find_local(SymbolId::Variable(id)).cloned()
                {
                    return value;
                }
                let variable = self.variable(id);
                if variable.is_const {
                    if let Some(initializer) = variable.initializer.clone() {
                        let ty = variable.ty;
                        let scope = variable.parent;
                        let location =
                            LookupLocation::before(variable.decl_index);
                        let ctx =
                            crate::bind::BindContext::new(scope, location)
                                .constant();
                        let bound = self.bind_rvalue(&initializer, ty, &ctx);
                        return self.eval_expr(ev, &bound);
                    }
                }
                if ev.script_eval {
                    return self.types.default_value(self.variable(id).ty);
                }
                let name = self.name(self.variable(id).name).to_owned();
                self.report(Diagnostic::new(
                    DiagCode::ConstEvalNonConstVariable,
                    span,
                    format!(
                        "`{name}` is not constant and cannot be read here"
                    ),
                ));
                ConstantValue::Bad
            }
            SymbolId::Formal(id) => {
                if let Some(value) = ev.find_local(SymbolId::Formal(id)) {
                    return value.clone();
                }
                let name = self.name(self.formal(id).name).to_owned();
                self.report(Diagnostic::new(
                    DiagCode::ConstEvalNonConstVariable,
                    span,
                    format!("argument `{name}` is not a constant here"),
                ));
                ConstantValue::Bad
            }
            SymbolId::Net(_) => {
                self.report(Diagnostic::new(
                    DiagCode::ConstEvalNonConstVariable,
                    span,
                    "nets are never constant".to_owned(),
                ));
                ConstantValue::Bad
            }
            _ => ConstantValue::Bad,
        }
    }

    fn eval_unary(
        &mut self,
        op: UnaryOp,
        value: &ConstantValue,
        expr: &Expression,
    ) -> ConstantValue {
        match (op, value) {
            (UnaryOp::Plus, _) => value.clone(),
            (UnaryOp::Minus, ConstantValue::Integer(vector)) => {
                ConstantValue::Integer(vector.negate())
            }
            (UnaryOp::Minus, ConstantValue::Real(real)) => {
                ConstantValue::Real(-real)
            }
            (UnaryOp::BitwiseNot, ConstantValue::Integer(vector)) => {
                ConstantValue::Integer(vector.not())
            }
            (UnaryOp::LogicalNot, _) => {
                let width = self.types.bit_width(expr.ty).max(1);
                match value.truthy() {
                    Some(truth) => ConstantValue::Integer(LogicVec::from_u64(
                        width,
                        u64::from(!truth),
                    )),
                    None => ConstantValue::Integer(LogicVec::all_x(
                        width, false,
                    )),
                }
            }
            _ => ConstantValue::Bad,
        }
    }

    fn eval_binary(
        &mut self,
        ev: &mut EvalContext,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        expr: &Expression,
    ) -> ConstantValue {
        // logical gates short-circuit on a decided left operand
        if matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) {
            let left_value = self.eval_expr(ev, left);
            if left_value.is_bad() {
                return ConstantValue::Bad;
            }
            let left_truth = left_value.truthy();
            match (op, left_truth) {
                (BinaryOp::LogicalAnd, Some(false)) => {
                    return self.bool_value(expr, Some(false));
                }
                (BinaryOp::LogicalOr, Some(true)) => {
                    return self.bool_value(expr, Some(true));
                }
                _ => {}
            }
            let right_value = self.eval_expr(ev, right);
            if right_value.is_bad() {
                return ConstantValue::Bad;
            }
            let result = match (op, left_truth, right_value.truthy()) {
                (BinaryOp::LogicalAnd, Some(true), other) => other,
                (BinaryOp::LogicalOr, Some(false), other) => other,
                (BinaryOp::LogicalAnd, None, Some(false)) => Some(false),
                (BinaryOp::LogicalOr, None, Some(true)) => Some(true),
                _ => None,
            };
            return self.bool_value(expr, result);
        }

        let left_value = self.eval_expr(ev, left);
        let right_value = self.eval_expr(ev, right);
        if left_value.is_bad() || right_value.is_bad() {
            return ConstantValue::Bad;
        }

        match (&left_value, &right_value) {
            (ConstantValue::Integer(lhs), ConstantValue::Integer(rhs)) => {
                self.eval_integer_binary(op, lhs, rhs, expr)
            }
            (ConstantValue::Real(_), _) | (_, ConstantValue::Real(_)) => {
                let (Some(lhs), Some(rhs)) =
                    (left_value.to_real(), right_value.to_real())
                else {
                    return ConstantValue::Bad;
                };
                self.eval_real_binary(op, lhs, rhs, expr)
            }
            (ConstantValue::Str(lhs), ConstantValue::Str(rhs)) => {
                let result = match op {
                    BinaryOp::Eq | BinaryOp::CaseEq => Some(lhs == rhs),
                    BinaryOp::Ne | BinaryOp::CaseNe => Some(lhs != rhs),
                    BinaryOp::Lt => Some(lhs < rhs),
                    BinaryOp::Le => Some(lhs <= rhs),
                    BinaryOp::Gt => Some(lhs > rhs),
                    BinaryOp::Ge => Some(lhs >= rhs),
                    _ => return ConstantValue::Bad,
                };
                self.bool_value(expr, result)
            }
            (ConstantValue::Null, ConstantValue::Null) => {
                self.bool_value(expr, Some(matches!(op, BinaryOp::Eq | BinaryOp::CaseEq)))
            }
            (ConstantValue::Null, ConstantValue::ClassHandle(_))
            | (ConstantValue::ClassHandle(_), ConstantValue::Null) => {
                self.bool_value(expr, Some(matches!(op, BinaryOp::Ne | BinaryOp::CaseNe)))
            }
            (ConstantValue::ClassHandle(lhs), ConstantValue::ClassHandle(rhs)) => {
                let equal = lhs == rhs;
                let result = match op {
                    BinaryOp::Eq | BinaryOp::CaseEq => equal,
                    BinaryOp::Ne | BinaryOp::CaseNe => !equal,
                    _ => return ConstantValue::Bad,
                };
                self.bool_value(expr, Some(result))
            }
            _ => ConstantValue::Bad,
        }
    }

    fn eval_integer_binary(
        &mut self,
        op: BinaryOp,
        lhs: &LogicVec,
        rhs: &LogicVec,
        expr: &Expression,
    ) -> ConstantValue {
        use BinaryOp::*;

        if matches!(op, Div | Mod) && rhs.is_zero() {
            self.report(Diagnostic::new(
                DiagCode::ConstEvalDivByZero,
                expr.span,
                "division by zero in constant expression".to_owned(),
            ));
            return ConstantValue::Integer(LogicVec::all_x(
                lhs.width().max(1),
                lhs.is_signed() && rhs.is_signed(),
            ));
        }

        let value = match op {
            Add => lhs.add(rhs),
            Sub => lhs.sub(rhs),
            Mul => lhs.mul(rhs),
            Div => lhs.div(rhs),
            Mod => lhs.rem(rhs),
            Pow => lhs.pow(rhs),
            And => lhs.and(rhs),
            Or => lhs.or(rhs),
            Xor => lhs.xor(rhs),
            Shl => lhs.shl(rhs),
            Shr => lhs.lshr(rhs),
            AShr => lhs.ashr(rhs),
            Eq => return self.bool_value(expr, lhs.logical_eq(rhs)),
            Ne => {
                return self
                    .bool_value(expr, lhs.logical_eq(rhs).map(|b| !b));
            }
            CaseEq => return self.bool_value(expr, Some(lhs.case_eq(rhs))),
            CaseNe => return self.bool_value(expr, Some(!lhs.case_eq(rhs))),
            Lt => return self.bool_value(expr, lhs.less_than(rhs)),
            Le => {
                let result = match (lhs.less_than(rhs), lhs.logical_eq(rhs)) {
                    (Some(lt), Some(eq)) => Some(lt || eq),
                    _ => None,
                };
                return self.bool_value(expr, result);
            }
            Gt => return self.bool_value(expr, rhs.less_than(lhs)),
            Ge => {
                let result = match (rhs.less_than(lhs), lhs.logical_eq(rhs)) {
                    (Some(gt), Some(eq)) => Some(gt || eq),
                    _ => None,
                };
                return self.bool_value(expr, result);
            }
            LogicalAnd | LogicalOr => unreachable!("short-circuited above"),
        };
        ConstantValue::Integer(value)
    }

    fn eval_real_binary(
        &mut self,
        op: BinaryOp,
        lhs: f64,
        rhs: f64,
        expr: &Expression,
    ) -> ConstantValue {
        use BinaryOp::*;
        let value = match op {
            Add => lhs + rhs,
            Sub => lhs - rhs,
            Mul => lhs * rhs,
            Div => {
                if rhs == 0.0 {
                    self.report(Diagnostic::new(
                        DiagCode::ConstEvalDivByZero,
                        expr.span,
                        "division by zero in constant expression".to_owned(),
                    ));
                }
                lhs / rhs
            }
            Pow => lhs.powf(rhs),
            Eq => return self.bool_value(expr, Some(lhs == rhs)),
            Ne => return self.bool_value(expr, Some(lhs != rhs)),
            Lt => return self.bool_value(expr, Some(lhs < rhs)),
            Le => return self.bool_value(expr, Some(lhs <= rhs)),
            Gt => return self.bool_value(expr, Some(lhs > rhs)),
            Ge => return self.bool_value(expr, Some(lhs >= rhs)),
            _ => return ConstantValue::Bad,
        };
        ConstantValue::Real(value)
    }

    fn bool_value(
        &self,
        expr: &Expression,
        value: Option<bool>,
    ) -> ConstantValue {
        let width = self.types.bit_width(expr.ty).max(1);
        match value {
            Some(truth) => ConstantValue::Integer(LogicVec::from_u64(
                width,
                u64::from(truth),
            )),
            None => ConstantValue::Integer(LogicVec::all_x(width, false)),
        }
    }

    fn eval_concat(
        &mut self,
        ev: &mut EvalContext,
        operands: &[Expression],
    ) -> ConstantValue {
        let mut strings = Vec::new();
        let mut vectors = Vec::new();
        for operand in operands {
            match self.eval_expr(ev, operand) {
                ConstantValue::Str(value) => strings.push(value),
                ConstantValue::Integer(value) => vectors.push(value),
                _ => return ConstantValue::Bad,
            }
        }

        if !strings.is_empty() && vectors.is_empty() {
            return ConstantValue::Str(strings.concat());
        }
        let mut result: Option<LogicVec> = None;
        for vector in vectors {
            result = Some(match result {
                Some(accumulated) => accumulated.concat(&vector),
                None => vector,
            });
        }
        result.map_or(ConstantValue::Bad, ConstantValue::Integer)
    }

    fn eval_element_select(
        &mut self,
        ev: &mut EvalContext,
        value: &Expression,
        index: &Expression,
        expr: &Expression,
    ) -> ConstantValue {
        let base = self.eval_expr(ev, value);
        let index_value = self.eval_expr(ev, index);
        if base.is_bad() || index_value.is_bad() {
            return ConstantValue::Bad;
        }

        // associative arrays key on the constant itself
        if let (
            TypeKind::AssociativeArray { element, .. },
            ConstantValue::Map(map),
        ) = (self.types.canon_kind(value.ty).clone(), &base)
        {
            return map
                .get(&index_value)
                .cloned()
                .unwrap_or_else(|| self.types.default_value(element));
        }

        let Some(offset) = index_value
            .as_integer()
            .and_then(LogicVec::as_i64)
        else {
            let width = self.types.bit_width(expr.ty).max(1);
            return ConstantValue::Integer(LogicVec::all_x(width, false));
        };

        match (self.types.canon_kind(value.ty).clone(), base) {
            (TypeKind::Integral(_), ConstantValue::Integer(vector)) => {
                if offset < 0 || offset as u32 >= vector.width() {
                    return ConstantValue::Integer(LogicVec::all_x(1, false));
                }
                let bit = offset as u32;
                ConstantValue::Integer(vector.extract(bit, bit))
            }
            (
                TypeKind::FixedArray { element, range },
                ConstantValue::Elements(elements),
            ) => range
                .offset_of(offset)
                .and_then(|position| elements.get(position).cloned())
                .unwrap_or_else(|| self.types.default_value(element)),
            (
                TypeKind::DynamicArray { element },
                ConstantValue::Elements(elements),
            ) => usize::try_from(offset)
                .ok()
                .and_then(|position| elements.get(position).cloned())
                .unwrap_or_else(|| self.types.default_value(element)),
            (
                TypeKind::Queue { element, .. },
                ConstantValue::Queue(queue),
            ) => usize::try_from(offset)
                .ok()
                .and_then(|position| queue.elements.get(position).cloned())
                .unwrap_or_else(|| self.types.default_value(element)),
            (TypeKind::Str, ConstantValue::Str(string)) => usize::try_from(
                offset,
            )
            .ok()
            .and_then(|position| string.as_bytes().get(position).copied())
            .map_or(
                ConstantValue::Integer(LogicVec::from_u64(8, 0)),
                |byte| {
                    ConstantValue::Integer(LogicVec::from_u64(
                        8,
                        u64::from(byte),
                    ))
                },
            ),
            _ => ConstantValue::Bad,
        }
    }

    fn eval_assignment(
        &mut self,
        ev: &mut EvalContext,
        lhs: &Expression,
        rhs: &Expression,
    ) -> ConstantValue {
        let Some(lvalue) = self.eval_lvalue(ev, lhs) else {
            return ConstantValue::Bad;
        };

        // the innermost assignment target backs any l-value references
        // inside the right-hand side
        let saved = ev.top_lvalue.replace(lvalue.clone());
        let value = self.eval_expr(ev, rhs);
        ev.top_lvalue = saved;

        if value.is_bad() {
            return ConstantValue::Bad;
        }

        let value = self.types.coerce_value(lhs.ty, &value);
        self.store_lvalue(ev, &lvalue, value.clone());
        value
    }

    /// Resolves an expression to an l-value handle that can load and
    /// store through aggregate index chains.
    pub fn eval_lvalue(
        &mut self,
        ev: &mut EvalContext,
        expr: &Expression,
    ) -> Option<LValuePath> {
        match &expr.kind {
            ExprKind::NamedValue { symbol, .. } => {
                if ev.find_local(*symbol).is_none() {
                    if !ev.script_eval {
                        self.report(Diagnostic::new(
                            DiagCode::ConstEvalNonConstVariable,
                            expr.span,
                            "cannot assign to a value outside the constant \
                             function"
                                .to_owned(),
                        ));
                        return None;
                    }
                    let default = match symbol {
                        SymbolId::Variable(id) => {
                            self.types.default_value(self.variable(*id).ty)
                        }
                        _ => ConstantValue::Bad,
                    };
                    ev.set_local(*symbol, default);
                }
                Some(LValuePath { root: *symbol, path: Vec::new() })
            }
            ExprKind::ElementSelect { value, index } => {
                let mut base = self.eval_lvalue(ev, value)?;
                let index_value = self.eval_expr(ev, index);
                match self.types.canon_kind(value.ty) {
                    TypeKind::AssociativeArray { .. } => {
                        base.path.push(PathElem::Key(index_value));
                    }
                    TypeKind::FixedArray { range, .. } => {
                        let offset = index_value
                            .as_integer()
                            .and_then(LogicVec::as_i64)
                            .and_then(|index| range.offset_of(index))?;
                        base.path.push(PathElem::Element(offset));
                    }
                    TypeKind::Integral(_) => {
                        let bit = index_value
                            .as_integer()
                            .and_then(LogicVec::as_i64)
                            .filter(|bit| *bit >= 0)? as u32;
                        base.path.push(PathElem::Bits(bit, bit));
                    }
                    _ => {
                        let offset = index_value
                            .as_integer()
                            .and_then(LogicVec::as_i64)
                            .filter(|index| *index >= 0)?
                            as usize;
                        base.path.push(PathElem::Element(offset));
                    }
                }
                Some(base)
            }
            ExprKind::RangeSelect { value, range } => {
                let mut base = self.eval_lvalue(ev, value)?;
                base.path.push(PathElem::Bits(
                    range.upper().max(0) as u32,
                    range.lower().max(0) as u32,
                ));
                Some(base)
            }
            ExprKind::MemberAccess {
                value,
                member: MemberTarget::StructField(index),
            } => {
                let mut base = self.eval_lvalue(ev, value)?;
                base.path.push(PathElem::Field(*index));
                Some(base)
            }
            _ => {
                self.report(Diagnostic::new(
                    DiagCode::BadAssignment,
                    expr.span,
                    "expression is not assignable in a constant context"
                        .to_owned(),
                ));
                None
            }
        }
    }

    fn load_lvalue(
        &mut self,
        ev: &mut EvalContext,
        lvalue: &LValuePath,
    ) -> ConstantValue {
        let Some(mut current) = ev.find_local(lvalue.root).cloned() else {
            return ConstantValue::Bad;
        };
        for elem in &lvalue.path {
            current = match (elem, current) {
                (PathElem::Element(index), ConstantValue::Elements(elements)) => {
                    elements.get(*index).cloned().unwrap_or(ConstantValue::Bad)
                }
                (PathElem::Element(index), ConstantValue::Queue(queue)) => {
                    queue
                        .elements
                        .get(*index)
                        .cloned()
                        .unwrap_or(ConstantValue::Bad)
                }
                (PathElem::Field(index), ConstantValue::Elements(elements)) => {
                    elements.get(*index).cloned().unwrap_or(ConstantValue::Bad)
                }
                (PathElem::Key(key), ConstantValue::Map(map)) => {
                    map.get(key).cloned().unwrap_or(ConstantValue::Bad)
                }
                (PathElem::Bits(high, low), ConstantValue::Integer(vector)) => {
                    if *high >= vector.width() {
                        ConstantValue::Bad
                    } else {
                        ConstantValue::Integer(vector.extract(*high, *low))
                    }
                }
                _ => ConstantValue::Bad,
            };
        }
        current
    }

    fn store_lvalue(
        &mut self,
        ev: &mut EvalContext,
        lvalue: &LValuePath,
        value: ConstantValue,
    ) {
        let Some(root) = ev.find_local(lvalue.root).cloned() else {
            return;
        };
        let updated = store_path(root, &lvalue.path, value);
        ev.set_local(lvalue.root, updated);
    }

    fn eval_call(
        &mut self,
        ev: &mut EvalContext,
        call: &CallExpr,
        span: Span,
    ) -> ConstantValue {
        match &call.callee {
            Callee::System(info) => {
                let subroutine = Arc::clone(&info.subroutine);
                subroutine.eval(self, ev, call, span)
            }
            Callee::User(subroutine) => {
                self.eval_user_call(ev, *subroutine, call, span)
            }
        }
    }

    /// The constant function calling convention: arguments evaluate in
    /// the caller's frame, a new frame binds formals in declaration
    /// order, the body runs as a statement tree, and the return-value
    /// local carries the result out.
    fn eval_user_call(
        &mut self,
        ev: &mut EvalContext,
        subroutine: ID<Subroutine>,
        call: &CallExpr,
        span: Span,
    ) -> ConstantValue {
        if !self.check_const_subroutine(subroutine, span, ev) {
            return ConstantValue::Bad;
        }

        if ev.depth() as u32 >= ev.max_depth {
            let name = self.name(self.subroutine(subroutine).name).to_owned();
            self.report(Diagnostic::new(
                DiagCode::RecursionLimitExceeded,
                span,
                format!(
                    "`{name}` exceeded the maximum constant recursion depth \
                     of {}",
                    ev.max_depth
                ),
            ));
            return ConstantValue::Bad;
        }

        // arguments evaluate in the caller's frame
        let mut argument_values = Vec::with_capacity(call.args.len());
        for argument in &call.args {
            let value = self.eval_expr(ev, argument);
            if value.is_bad() {
                return ConstantValue::Bad;
            }
            argument_values.push(value);
        }

        let formals = self.subroutine(subroutine).args.clone();
        let return_var = self.subroutine(subroutine).return_var;
        let return_type = self.subroutine(subroutine).return_type;
        let body = self.subroutine(subroutine).body.clone();
        let Some(body) = body else {
            return ConstantValue::Bad;
        };

        // the binder guarantees one bound argument per formal; a mismatch
        // here is unrecoverable
        assert_eq!(
            call.args.len(),
            formals.len(),
            "bound argument count diverged from the subroutine signature"
        );

        let mut frame = Frame {
            subroutine: Some(subroutine),
            locals: HashMap::new(),
            call_span: span,
            lookup_location: LookupLocation::MAX,
        };
        for (formal, value) in formals.iter().zip(argument_values) {
            frame.locals.insert(SymbolId::Formal(*formal), value);
        }
        if let Some(return_var) = return_var {
            frame.locals.insert(
                SymbolId::Variable(return_var),
                self.types.default_value(return_type),
            );
        }
        ev.frames.push(frame);

        let result = self.eval_stmt(ev, &body);

        let value = match result {
            EvalResult::Success | EvalResult::Return => return_var
                .and_then(|var| {
                    ev.find_local(SymbolId::Variable(var)).cloned()
                })
                .unwrap_or(ConstantValue::Bad),
            EvalResult::Disable(_) => {
                // reported before the frame pops so the stack is intact
                self.report(Diagnostic::new(
                    DiagCode::DisableTargetNotActive,
                    span,
                    "disable targeted a block that is not executing"
                        .to_owned(),
                ));
                ConstantValue::Bad
            }
            EvalResult::Fail | EvalResult::Break | EvalResult::Continue => {
                ConstantValue::Bad
            }
        };

        ev.frames.pop();
        value
    }

    /// Executes a bound statement, propagating the result status.
    pub fn eval_stmt(
        &mut self,
        ev: &mut EvalContext,
        stmt: &Statement,
    ) -> EvalResult {
        match stmt {
            Statement::Block { block, statements } => {
                for statement in statements {
                    match self.eval_stmt(ev, statement) {
                        EvalResult::Success => {}
                        EvalResult::Disable(target)
                            if target.is_some() && target == *block =>
                        {
                            return EvalResult::Success;
                        }
                        other => return other,
                    }
                }
                EvalResult::Success
            }
            Statement::VarDecl { var, init } => {
                let value = match init {
                    Some(init) => {
                        let value = self.eval_expr(ev, init);
                        if value.is_bad() {
                            return EvalResult::Fail;
                        }
                        value
                    }
                    None => self.types.default_value(self.variable(*var).ty),
                };
                ev.set_local(SymbolId::Variable(*var), value);
                EvalResult::Success
            }
            Statement::Expression(expr) => {
                if self.eval_expr(ev, expr).is_bad() {
                    EvalResult::Fail
                } else {
                    EvalResult::Success
                }
            }
            Statement::Conditional { condition, then_branch, else_branch } => {
                let value = self.eval_expr(ev, condition);
                if value.is_bad() {
                    return EvalResult::Fail;
                }
                let taken = match value.truthy() {
                    Some(taken) => taken,
                    None => {
                        self.report(Diagnostic::new(
                            DiagCode::ConstEvalUnknownCondition,
                            condition.span,
                            "condition is unknown; treating it as false"
                                .to_owned(),
                        ));
                        false
                    }
                };
                if taken {
                    self.eval_stmt(ev, then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.eval_stmt(ev, else_branch)
                } else {
                    EvalResult::Success
                }
            }
            Statement::For { initializers, stop, steps, body } => {
                for initializer in initializers {
                    match self.eval_stmt(ev, initializer) {
                        EvalResult::Success => {}
                        other => return other,
                    }
                }
                loop {
                    if let Some(stop) = stop {
                        let value = self.eval_expr(ev, stop);
                        if value.is_bad() {
                            return EvalResult::Fail;
                        }
                        let keep_going = match value.truthy() {
                            Some(truth) => truth,
                            None => {
                                self.report(Diagnostic::new(
                                    DiagCode::ConstEvalUnknownCondition,
                                    stop.span,
                                    "loop condition is unknown; treating it \
                                     as false"
                                        .to_owned(),
                                ));
                                false
                            }
                        };
                        if !keep_going {
                            break;
                        }
                    }
                    match self.eval_stmt(ev, body) {
                        EvalResult::Success | EvalResult::Continue => {}
                        EvalResult::Break => break,
                        other => return other,
                    }
                    for step in steps {
                        if self.eval_expr(ev, step).is_bad() {
                            return EvalResult::Fail;
                        }
                    }
                }
                EvalResult::Success
            }
            Statement::Return { expr, .. } => {
                if let Some(expr) = expr {
                    let value = self.eval_expr(ev, expr);
                    if value.is_bad() {
                        return EvalResult::Fail;
                    }
                    let return_var = ev
                        .frame()
                        .subroutine
                        .and_then(|id| self.subroutine(id).return_var);
                    if let Some(return_var) = return_var {
                        ev.set_local(SymbolId::Variable(return_var), value);
                    }
                }
                EvalResult::Return
            }
            Statement::Break { .. } => EvalResult::Break,
            Statement::Continue { .. } => EvalResult::Continue,
            Statement::Disable { target, .. } => {
                EvalResult::Disable(*target)
            }
            Statement::Empty => EvalResult::Success,
        }
    }
}

/// Rebuilds an aggregate constant with the element at the end of `path`
/// replaced by `value`.
fn store_path(
    current: ConstantValue,
    path: &[PathElem],
    value: ConstantValue,
) -> ConstantValue {
    let Some((first, rest)) = path.split_first() else {
        return value;
    };

    match (first, current) {
        (
            PathElem::Element(index) | PathElem::Field(index),
            ConstantValue::Elements(mut elements),
        ) => {
            if let Some(slot) = elements.get_mut(*index) {
                let previous = std::mem::take(slot);
                *slot = store_path(previous, rest, value);
            }
            ConstantValue::Elements(elements)
        }
        (PathElem::Element(index), ConstantValue::Queue(mut queue)) => {
            if let Some(slot) = queue.elements.get_mut(*index) {
                let previous = std::mem::take(slot);
                *slot = store_path(previous, rest, value);
            }
            ConstantValue::Queue(queue)
        }
        (PathElem::Key(key), ConstantValue::Map(mut map)) => {
            let previous =
                map.get(key).cloned().unwrap_or(ConstantValue::Bad);
            map.insert(key.clone(), store_path(previous, rest, value));
            ConstantValue::Map(map)
        }
        (PathElem::Bits(high, low), ConstantValue::Integer(vector)) => {
            // splice the stored bits into [high:low]
            let ConstantValue::Integer(bits) = store_path(
                ConstantValue::Integer(vector.extract(
                    (*high).min(vector.width().saturating_sub(1)),
                    *low,
                )),
                rest,
                value,
            ) else {
                return ConstantValue::Integer(vector);
            };
            let width = vector.width();
            if *high >= width {
                return ConstantValue::Integer(vector);
            }
            let mut result = if *high + 1 < width {
                vector.extract(width - 1, *high + 1)
            } else {
                LogicVec::from_u64(0, 0)
            };
            result = result.concat(&bits.resize(*high - *low + 1));
            if *low > 0 {
                result = result.concat(&vector.extract(*low - 1, 0));
            }
            ConstantValue::Integer(
                result.resize(width).as_signed(vector.is_signed()),
            )
        }
        (_, other) => other,
    }
}

impl Compilation {
    /// Checks whether a subroutine may be called in a constant context,
    /// reporting the reason when it may not.
    pub(crate) fn check_const_subroutine(
        &mut self,
        id: ID<Subroutine>,
        span: Span,
        ev: &EvalContext,
    ) -> bool {
        if ev.script_eval {
            return true;
        }
        self.force_subroutine(id);
        let subroutine = self.subroutine(id);
        let name = self.interner.resolve(subroutine.name).to_owned();

        let code = if subroutine.kind == crate::symbol::SubroutineKind::Task {
            Some((
                DiagCode::ConstEvalTaskNotAllowed,
                format!("task `{name}` cannot be called in a constant expression"),
            ))
        } else if subroutine.qualifiers.is_dpi_import {
            Some((
                DiagCode::ConstEvalDpiNotAllowed,
                format!(
                    "DPI import `{name}` cannot be called in a constant \
                     expression"
                ),
            ))
        } else if subroutine.qualifiers.is_virtual || subroutine.qualifiers.is_pure
        {
            Some((
                DiagCode::ConstEvalVirtualNotAllowed,
                format!(
                    "virtual method `{name}` cannot be called in a constant \
                     expression"
                ),
            ))
        } else if subroutine.return_type == self.types.void_type() {
            Some((
                DiagCode::ConstEvalVoidNotAllowed,
                format!(
                    "void function `{name}` cannot be called in a constant \
                     expression"
                ),
            ))
        } else if subroutine.in_generate {
            Some((
                DiagCode::ConstEvalGenerateFunction,
                format!(
                    "`{name}` is declared inside a generate block and cannot \
                     be called in a constant expression"
                ),
            ))
        } else {
            let bad_formal = subroutine
                .args
                .iter()
                .copied()
                .find(|arg| self.formal(*arg).direction != ArgDirection::In);
            bad_formal.map(|arg| {
                let arg_name = self.interner.resolve(self.formal(arg).name);
                (
                    DiagCode::ConstEvalOutputArgNotAllowed,
                    format!(
                        "`{name}` has a non-input argument `{arg_name}` and \
                         cannot be called in a constant expression"
                    ),
                )
            })
        };

        match code {
            Some((code, message)) => {
                self.report(Diagnostic::new(code, span, message));
                false
            }
            None => true,
        }
    }

    /// Checks whether an expression could evaluate as a constant, without
    /// evaluating it. Reports the first offending construct.
    pub fn verify_constant(
        &mut self,
        ev: &mut EvalContext,
        expr: &Expression,
    ) -> bool {
        match &expr.kind {
            ExprKind::IntegerLiteral(_)
            | ExprKind::UnbasedUnsizedLiteral(_)
            | ExprKind::RealLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::NullLiteral
            | ExprKind::DataType
            | ExprKind::LValueRef => true,

            ExprKind::Bad { .. } => false,

            ExprKind::NamedValue { symbol, hierarchical } => {
                if *hierarchical
                    && !self.options().allow_hierarchical_const
                    && !ev.script_eval
                {
                    self.report(Diagnostic::new(
                        DiagCode::ConstEvalHierarchical,
                        expr.span,
                        "hierarchical references are not allowed in constant \
                         expressions"
                            .to_owned(),
                    ));
                    return false;
                }
                match symbol {
                    SymbolId::Parameter(_) | SymbolId::EnumValue(_) => true,
                    SymbolId::Variable(id) => {
                        ev.find_local(*symbol).is_some()
                            || self.variable(*id).is_const
                            || ev.script_eval
                            || {
                                let name = self
                                    .interner
                                    .resolve(self.variable(*id).name)
                                    .to_owned();
                                self.report(Diagnostic::new(
                                    DiagCode::ConstEvalNonConstVariable,
                                    expr.span,
                                    format!("`{name}` is not constant"),
                                ));
                                false
                            }
                    }
                    SymbolId::Formal(_) => ev.find_local(*symbol).is_some(),
                    _ => false,
                }
            }

            ExprKind::Unary { operand, .. } => self.verify_constant(ev, operand),
            ExprKind::Binary { left, right, .. } => {
                self.verify_constant(ev, left) && self.verify_constant(ev, right)
            }
            ExprKind::Conditional { condition, true_expr, false_expr } => {
                self.verify_constant(ev, condition)
                    && self.verify_constant(ev, true_expr)
                    && self.verify_constant(ev, false_expr)
            }
            ExprKind::MinTypMax { min, typ, max, selected } => {
                // only the selected branch must be constant
                let chosen = match selected {
                    crate::MinTypMax::Min => min,
                    crate::MinTypMax::Typ => typ,
                    crate::MinTypMax::Max => max,
                };
                self.verify_constant(ev, chosen)
            }
            ExprKind::Concat { operands } => operands
                .iter()
                .all(|operand| self.verify_constant(ev, operand)),
            ExprKind::ElementSelect { value, index } => {
                self.verify_constant(ev, value)
                    && self.verify_constant(ev, index)
            }
            ExprKind::RangeSelect { value, .. }
            | ExprKind::MemberAccess { value, .. }
            | ExprKind::Conversion { operand: value, .. } => {
                self.verify_constant(ev, value)
            }
            ExprKind::Assignment { lhs, rhs } => {
                self.verify_constant(ev, lhs) && self.verify_constant(ev, rhs)
            }

            ExprKind::Call(call) => {
                if !call
                    .args
                    .iter()
                    .all(|argument| self.verify_constant(ev, argument))
                {
                    return false;
                }
                match &call.callee {
                    Callee::System(info) => {
                        let subroutine = Arc::clone(&info.subroutine);
                        subroutine.verify_constant(self, ev, call, expr.span)
                    }
                    Callee::User(subroutine) => {
                        if !self.check_const_subroutine(
                            *subroutine,
                            expr.span,
                            ev,
                        ) {
                            return false;
                        }
                        if ev.verify_stack.contains(subroutine) {
                            return true;
                        }
                        ev.verify_stack.push(*subroutine);
                        let body = self.subroutine(*subroutine).body.clone();
                        let ok = body.is_some_and(|body| {
                            self.verify_constant_stmt(ev, &body)
                        });
                        ev.verify_stack.pop();
                        ok
                    }
                }
            }
        }
    }

    fn verify_constant_stmt(
        &mut self,
        ev: &mut EvalContext,
        stmt: &Statement,
    ) -> bool {
        match stmt {
            Statement::Block { statements, .. } => statements
                .iter()
                .all(|statement| self.verify_constant_stmt(ev, statement)),
            Statement::VarDecl { var, init } => {
                // locals of the callee are fine to read later
                ev.set_local(SymbolId::Variable(*var), ConstantValue::Bad);
                init.as_ref()
                    .is_none_or(|init| self.verify_constant(ev, init))
            }
            Statement::Expression(expr) => self.verify_constant(ev, expr),
            Statement::Conditional { condition, then_branch, else_branch } => {
                self.verify_constant(ev, condition)
                    && self.verify_constant_stmt(ev, then_branch)
                    && else_branch.as_ref().is_none_or(|branch| {
                        self.verify_constant_stmt(ev, branch)
                    })
            }
            Statement::For { initializers, stop, steps, body } => {
                initializers.iter().all(|initializer| {
                    self.verify_constant_stmt(ev, initializer)
                }) && stop
                    .as_ref()
                    .is_none_or(|stop| self.verify_constant(ev, stop))
                    && steps.iter().all(|step| self.verify_constant(ev, step))
                    && self.verify_constant_stmt(ev, body)
            }
            Statement::Return { expr, .. } => expr
                .as_ref()
                .is_none_or(|expr| self.verify_constant(ev, expr)),
            Statement::Break { .. }
            | Statement::Continue { .. }
            | Statement::Disable { .. }
            | Statement::Empty => true,
        }
    }
}
