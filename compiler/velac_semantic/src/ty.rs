//! Contains the type representation and the [`TypeTable`].
//!
//! Every type lives in the table's arena and knows its canonical type: an
//! alias points at the fully unwrapped target's canonical, everything else
//! points at itself. Identity queries always drill down to the canonical
//! type; the alias layer only matters for rendering and for the `matching`
//! relation's nominal cases.

use std::collections::HashMap;

use crate::{
    arena::{Arena, Interner, NameId, ID},
    logic::{Logic, LogicVec},
    symbol::{ClassDef, EnumValue, TypeAlias},
    value::{AssocArray, ConstantValue, QueueValue},
    Compilation,
};

pub type TypeId = ID<Type>;

/// An inclusive `[left:right]` dimension range. `left` is the index of the
/// most significant element; either bound may be the smaller one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstantRange {
    pub left: i64,
    pub right: i64,
}

impl ConstantRange {
    /// The number of elements covered by the range.
    #[must_use]
    pub const fn width(self) -> u64 {
        self.left.abs_diff(self.right) + 1
    }

    /// The smaller bound.
    #[must_use]
    pub const fn lower(self) -> i64 {
        if self.left < self.right {
            self.left
        } else {
            self.right
        }
    }

    /// The larger bound.
    #[must_use]
    pub const fn upper(self) -> i64 {
        if self.left > self.right {
            self.left
        } else {
            self.right
        }
    }

    /// Whether the index falls inside the range.
    #[must_use]
    pub const fn contains(self, index: i64) -> bool {
        index >= self.lower() && index <= self.upper()
    }

    /// Translates a user index into a zero-based offset, counting from the
    /// `left` bound.
    #[must_use]
    pub fn offset_of(self, index: i64) -> Option<usize> {
        if !self.contains(index) {
            return None;
        }
        let offset = index.abs_diff(self.left);
        usize::try_from(offset).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FloatKind {
    ShortReal,
    Real,
    RealTime,
}

/// The data of an integral type: scalars, predefined integers, and packed
/// arrays all share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntegralData {
    /// Total width in bits, the product of all packed dimensions.
    pub width: u32,
    pub signed: bool,
    pub four_state: bool,
    /// Declared with the `reg` keyword; semantically identical to `logic`
    /// but preserved for messaging.
    pub is_reg: bool,
    /// Packed dimensions, outermost first. Empty for keyword types.
    pub packed_dims: Vec<ConstantRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumData {
    /// The integral base type.
    pub base: TypeId,
    /// The enum's value members in declaration order.
    pub values: Vec<ID<EnumValue>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: NameId,
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructData {
    pub fields: Vec<StructField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// The error sentinel type; compatible with nothing, silences
    /// cascading diagnostics.
    Error,
    Void,
    /// The type of the `null` literal.
    Null,
    CHandle,
    Event,
    Str,
    Floating(FloatKind),
    Integral(IntegralData),
    Enum(EnumData),
    FixedArray {
        element: TypeId,
        range: ConstantRange,
    },
    DynamicArray {
        element: TypeId,
    },
    AssociativeArray {
        element: TypeId,
        /// `None` for a wildcard index `[*]`.
        index: Option<TypeId>,
    },
    Queue {
        element: TypeId,
        bound: Option<u32>,
    },
    UnpackedStruct(StructData),
    Class(ID<ClassDef>),
    Alias {
        alias: ID<TypeAlias>,
        target: TypeId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub kind: TypeKind,
    /// The fully unwrapped form used for identity comparison.
    pub canonical: TypeId,
}

/// The built-in types reachable through [`TypeTable::get_predefined`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::EnumIter,
)]
pub enum PredefinedType {
    Bit,
    Logic,
    Reg,
    Byte,
    ShortInt,
    Int,
    LongInt,
    Integer,
    Time,
    ShortReal,
    Real,
    RealTime,
    Str,
    Event,
    Void,
    Null,
    CHandle,
}

/// Canonicalizes and de-duplicates types and caches the built-ins.
#[derive(Debug)]
pub struct TypeTable {
    types: Arena<Type>,
    error: TypeId,
    void_type: TypeId,
    null_type: TypeId,
    chandle: TypeId,
    event: TypeId,
    string_type: TypeId,
    floats: HashMap<FloatKind, TypeId>,
    integral_cache: HashMap<(u32, bool, bool, bool), TypeId>,
    class_cache: HashMap<ID<ClassDef>, TypeId>,
}

impl Default for TypeTable {
    fn default() -> Self { Self::new() }
}

impl TypeTable {
    #[must_use]
    pub fn new() -> Self {
        let mut types = Arena::new();
        let mut intern_simple = |kind: TypeKind| {
            let id = ID::new(types.len());
            types.insert(Type { kind, canonical: id })
        };

        let error = intern_simple(TypeKind::Error);
        let void_type = intern_simple(TypeKind::Void);
        let null_type = intern_simple(TypeKind::Null);
        let chandle = intern_simple(TypeKind::CHandle);
        let event = intern_simple(TypeKind::Event);
        let string_type = intern_simple(TypeKind::Str);

        let mut floats = HashMap::new();
        for kind in [FloatKind::ShortReal, FloatKind::Real, FloatKind::RealTime]
        {
            floats.insert(kind, intern_simple(TypeKind::Floating(kind)));
        }

        Self {
            types,
            error,
            void_type,
            null_type,
            chandle,
            event,
            string_type,
            floats,
            integral_cache: HashMap::new(),
            class_cache: HashMap::new(),
        }
    }

    /// Returns the type data for the given id.
    #[must_use]
    pub fn get(&self, id: TypeId) -> &Type { &self.types[id] }

    /// Returns the canonical type id: the fixpoint of alias unwrapping.
    #[must_use]
    pub fn canonical(&self, id: TypeId) -> TypeId { self.types[id].canonical }

    /// Returns the kind of the canonical type.
    #[must_use]
    pub fn canon_kind(&self, id: TypeId) -> &TypeKind {
        &self.types[self.canonical(id)].kind
    }

    /// The error sentinel type.
    #[must_use]
    pub fn error(&self) -> TypeId { self.error }

    /// Returns the canonical singleton for a built-in type. The `signed`
    /// flag only matters for the integral kinds.
    pub fn get_predefined(
        &mut self,
        kind: PredefinedType,
        signed: bool,
    ) -> TypeId {
        use PredefinedType::*;

        match kind {
            Bit => self.get_integral(1, signed, false, false),
            Logic => self.get_integral(1, signed, true, false),
            Reg => self.get_integral(1, signed, true, true),
            Byte => self.get_integral(8, signed, false, false),
            ShortInt => self.get_integral(16, signed, false, false),
            Int => self.get_integral(32, signed, false, false),
            LongInt => self.get_integral(64, signed, false, false),
            Integer => self.get_integral(32, signed, true, false),
            Time => self.get_integral(64, signed, true, false),
            ShortReal => self.floats[&FloatKind::ShortReal],
            Real => self.floats[&FloatKind::Real],
            RealTime => self.floats[&FloatKind::RealTime],
            Str => self.string_type,
            Event => self.event,
            Void => self.void_type,
            Null => self.null_type,
            CHandle => self.chandle,
        }
    }

    /// `int`: the default type of unsized decimal literals and parameters.
    pub fn int_type(&mut self) -> TypeId {
        self.get_predefined(PredefinedType::Int, true)
    }

    /// `logic`: the single four-state scalar.
    pub fn logic_type(&mut self) -> TypeId {
        self.get_predefined(PredefinedType::Logic, false)
    }

    /// One-bit unsigned `bit`, the result type of comparisons.
    pub fn bit_type(&mut self) -> TypeId {
        self.get_predefined(PredefinedType::Bit, false)
    }

    /// `string`.
    #[must_use]
    pub fn string_type(&self) -> TypeId { self.string_type }

    /// `void`.
    #[must_use]
    pub fn void_type(&self) -> TypeId { self.void_type }

    /// The type of the `null` literal.
    #[must_use]
    pub fn null_type(&self) -> TypeId { self.null_type }

    /// `real`.
    #[must_use]
    pub fn real_type(&self) -> TypeId { self.floats[&FloatKind::Real] }

    /// Returns the cached keyword-shaped integral type for the given
    /// width/signedness/state/reg key.
    pub fn get_integral(
        &mut self,
        width: u32,
        signed: bool,
        four_state: bool,
        is_reg: bool,
    ) -> TypeId {
        let key = (width, signed, four_state, is_reg);
        if let Some(id) = self.integral_cache.get(&key) {
            return *id;
        }

        let id = self.intern(TypeKind::Integral(IntegralData {
            width,
            signed,
            four_state,
            is_reg,
            packed_dims: Vec::new(),
        }));
        self.integral_cache.insert(key, id);
        id
    }

    /// Creates an integral type with an explicit packed dimension list.
    pub fn get_vector(
        &mut self,
        signed: bool,
        four_state: bool,
        is_reg: bool,
        packed_dims: Vec<ConstantRange>,
    ) -> TypeId {
        let width = packed_dims
            .iter()
            .map(|dim| dim.width())
            .product::<u64>()
            .try_into()
            .unwrap_or(u32::MAX);
        self.intern(TypeKind::Integral(IntegralData {
            width,
            signed,
            four_state,
            is_reg,
            packed_dims,
        }))
    }

    pub fn get_fixed_array(
        &mut self,
        element: TypeId,
        range: ConstantRange,
    ) -> TypeId {
        self.intern(TypeKind::FixedArray { element, range })
    }

    pub fn get_dynamic_array(&mut self, element: TypeId) -> TypeId {
        self.intern(TypeKind::DynamicArray { element })
    }

    pub fn get_associative_array(
        &mut self,
        element: TypeId,
        index: Option<TypeId>,
    ) -> TypeId {
        self.intern(TypeKind::AssociativeArray { element, index })
    }

    pub fn get_queue(
        &mut self,
        element: TypeId,
        bound: Option<u32>,
    ) -> TypeId {
        self.intern(TypeKind::Queue { element, bound })
    }

    pub fn get_enum(
        &mut self,
        base: TypeId,
        values: Vec<ID<EnumValue>>,
    ) -> TypeId {
        self.intern(TypeKind::Enum(EnumData { base, values }))
    }

    pub fn get_struct(&mut self, fields: Vec<StructField>) -> TypeId {
        self.intern(TypeKind::UnpackedStruct(StructData { fields }))
    }

    /// Returns the canonical class type for the given class symbol.
    pub fn get_class(&mut self, class: ID<ClassDef>) -> TypeId {
        if let Some(id) = self.class_cache.get(&class) {
            return *id;
        }
        let id = self.intern(TypeKind::Class(class));
        self.class_cache.insert(class, id);
        id
    }

    /// Creates an alias type forwarding to the target's canonical type.
    pub fn get_alias(
        &mut self,
        alias: ID<TypeAlias>,
        target: TypeId,
    ) -> TypeId {
        let canonical = self.canonical(target);
        self.types.insert(Type {
            kind: TypeKind::Alias { alias, target },
            canonical,
        })
    }

    fn intern(&mut self, kind: TypeKind) -> TypeId {
        let id = ID::new(self.types.len());
        self.types.insert(Type { kind, canonical: id })
    }

    /// Whether the type is integral (scalars, vectors, enums).
    #[must_use]
    pub fn is_integral(&self, id: TypeId) -> bool {
        match self.canon_kind(id) {
            TypeKind::Integral(_) => true,
            TypeKind::Enum(data) => {
                matches!(self.canon_kind(data.base), TypeKind::Integral(_))
            }
            _ => false,
        }
    }

    /// Whether the type is a floating type.
    #[must_use]
    pub fn is_floating(&self, id: TypeId) -> bool {
        matches!(self.canon_kind(id), TypeKind::Floating(_))
    }

    /// Whether the type is integral or floating.
    #[must_use]
    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.is_integral(id) || self.is_floating(id)
    }

    /// Whether the type is the error sentinel.
    #[must_use]
    pub fn is_error(&self, id: TypeId) -> bool {
        matches!(self.canon_kind(id), TypeKind::Error)
    }

    /// Whether the type is a class type.
    #[must_use]
    pub fn is_class(&self, id: TypeId) -> bool {
        matches!(self.canon_kind(id), TypeKind::Class(_))
    }

    /// Whether the type is any unpacked array form.
    #[must_use]
    pub fn is_unpacked_array(&self, id: TypeId) -> bool {
        matches!(
            self.canon_kind(id),
            TypeKind::FixedArray { .. }
                | TypeKind::DynamicArray { .. }
                | TypeKind::AssociativeArray { .. }
                | TypeKind::Queue { .. }
        )
    }

    /// The integral shape of the type, unwrapping enums to their base.
    #[must_use]
    pub fn integral_data(&self, id: TypeId) -> Option<&IntegralData> {
        match self.canon_kind(id) {
            TypeKind::Integral(data) => Some(data),
            TypeKind::Enum(data) => match self.canon_kind(data.base) {
                TypeKind::Integral(base) => Some(base),
                _ => None,
            },
            _ => None,
        }
    }

    /// The bit width of an integral type, zero otherwise.
    #[must_use]
    pub fn bit_width(&self, id: TypeId) -> u32 {
        self.integral_data(id).map_or(0, |data| data.width)
    }

    /// Whether an integral type is signed; false for everything else.
    #[must_use]
    pub fn is_signed(&self, id: TypeId) -> bool {
        self.integral_data(id).is_some_and(|data| data.signed)
    }

    /// Whether the type can hold `x`/`z` bits, drilling into aggregates.
    #[must_use]
    pub fn is_four_state(&self, id: TypeId) -> bool {
        match self.canon_kind(id) {
            TypeKind::Integral(data) => data.four_state,
            TypeKind::Enum(data) => self.is_four_state(data.base),
            TypeKind::FixedArray { element, .. }
            | TypeKind::DynamicArray { element }
            | TypeKind::AssociativeArray { element, .. }
            | TypeKind::Queue { element, .. } => self.is_four_state(*element),
            TypeKind::UnpackedStruct(data) => {
                data.fields.iter().any(|field| self.is_four_state(field.ty))
            }
            _ => false,
        }
    }

    /// The element type of any array form.
    #[must_use]
    pub fn array_element(&self, id: TypeId) -> Option<TypeId> {
        match self.canon_kind(id) {
            TypeKind::FixedArray { element, .. }
            | TypeKind::DynamicArray { element }
            | TypeKind::AssociativeArray { element, .. }
            | TypeKind::Queue { element, .. } => Some(*element),
            _ => None,
        }
    }

    /// The statically known bitstream width, or `None` for dynamically
    /// sized or non-bitstream types.
    #[must_use]
    pub fn bitstream_width(&self, id: TypeId) -> Option<u64> {
        match self.canon_kind(id) {
            TypeKind::Integral(data) => Some(u64::from(data.width)),
            TypeKind::Enum(data) => self.bitstream_width(data.base),
            TypeKind::FixedArray { element, range } => {
                Some(self.bitstream_width(*element)? * range.width())
            }
            TypeKind::UnpackedStruct(data) => {
                data.fields.iter().try_fold(0u64, |total, field| {
                    Some(total + self.bitstream_width(field.ty)?)
                })
            }
            _ => None,
        }
    }

    /// Whether the type can appear in a bitstream cast at all. With
    /// `destination` set, associative arrays are rejected.
    #[must_use]
    pub fn is_bitstream_type(&self, id: TypeId, destination: bool) -> bool {
        match self.canon_kind(id) {
            TypeKind::Integral(_) | TypeKind::Str => true,
            TypeKind::Enum(data) => self.is_bitstream_type(data.base, destination),
            TypeKind::FixedArray { element, .. }
            | TypeKind::DynamicArray { element }
            | TypeKind::Queue { element, .. } => {
                self.is_bitstream_type(*element, destination)
            }
            TypeKind::AssociativeArray { element, .. } => {
                !destination && self.is_bitstream_type(*element, destination)
            }
            TypeKind::UnpackedStruct(data) => data
                .fields
                .iter()
                .all(|field| self.is_bitstream_type(field.ty, destination)),
            _ => false,
        }
    }

    /// The value an uninitialized variable of the type holds: all-`x` for
    /// four-state integrals, zero for two-state, empty for dynamic shapes.
    #[must_use]
    pub fn default_value(&self, id: TypeId) -> ConstantValue {
        match self.canon_kind(id) {
            TypeKind::Integral(data) => {
                let digit = if data.four_state { Logic::X } else { Logic::Zero };
                ConstantValue::Integer(LogicVec::filled(
                    data.width,
                    data.signed,
                    digit,
                ))
            }
            TypeKind::Enum(data) => self.default_value(data.base),
            TypeKind::Floating(_) => ConstantValue::Real(0.0),
            TypeKind::Str => ConstantValue::Str(String::new()),
            TypeKind::FixedArray { element, range } => {
                let element = self.default_value(*element);
                let count = usize::try_from(range.width()).unwrap_or(0);
                ConstantValue::Elements(vec![element; count])
            }
            TypeKind::UnpackedStruct(data) => ConstantValue::Elements(
                data.fields
                    .iter()
                    .map(|field| self.default_value(field.ty))
                    .collect(),
            ),
            TypeKind::DynamicArray { .. } => {
                ConstantValue::Elements(Vec::new())
            }
            TypeKind::AssociativeArray { .. } => {
                ConstantValue::Map(AssocArray::default())
            }
            TypeKind::Queue { bound, .. } => ConstantValue::Queue(QueueValue {
                elements: Vec::new(),
                bound: *bound,
            }),
            TypeKind::Class(_) | TypeKind::CHandle | TypeKind::Event
            | TypeKind::Null => ConstantValue::Null,
            TypeKind::Error | TypeKind::Void => ConstantValue::Bad,
            TypeKind::Alias { .. } => unreachable!("canonical is never an alias"),
        }
    }

    /// Coerces a constant into the shape of the type: integrals resize and
    /// take the type's signedness, reals narrow, everything else passes
    /// through when already shaped right.
    #[must_use]
    pub fn coerce_value(
        &self,
        id: TypeId,
        value: &ConstantValue,
    ) -> ConstantValue {
        if value.is_bad() {
            return ConstantValue::Bad;
        }
        if let Some(data) = self.integral_data(id) {
            return match value {
                ConstantValue::Integer(integer) => {
                    let mut resized = integer
                        .clone()
                        .as_signed(integer.is_signed())
                        .resize(data.width)
                        .as_signed(data.signed);
                    if !data.four_state && resized.has_unknown() {
                        resized =
                            LogicVec::from_u64(data.width, 0).as_signed(data.signed);
                    }
                    ConstantValue::Integer(resized)
                }
                ConstantValue::Real(real) => {
                    let rounded = real.round() as i64;
                    ConstantValue::Integer(
                        LogicVec::from_i64(data.width, rounded)
                            .as_signed(data.signed),
                    )
                }
                _ => ConstantValue::Bad,
            };
        }

        match (self.canon_kind(id), value) {
            (TypeKind::Floating(_), _) => value
                .to_real()
                .map_or(ConstantValue::Bad, ConstantValue::Real),
            (TypeKind::Str, ConstantValue::Str(_)) => value.clone(),
            _ => value.clone(),
        }
    }
}

impl Compilation {
    /// Determines whether two types match: for most intents and purposes,
    /// matching types are completely identical.
    #[must_use]
    pub fn is_matching(&self, a: TypeId, b: TypeId) -> bool {
        let table = &self.types;
        let (ca, cb) = (table.canonical(a), table.canonical(b));
        if ca == cb {
            return true;
        }

        match (table.canon_kind(a), table.canon_kind(b)) {
            (TypeKind::Integral(da), TypeKind::Integral(db)) => {
                da.width == db.width
                    && da.signed == db.signed
                    && da.four_state == db.four_state
                    && da.is_reg == db.is_reg
                    && da.packed_dims == db.packed_dims
            }
            (
                TypeKind::FixedArray { element: ea, range: ra },
                TypeKind::FixedArray { element: eb, range: rb },
            ) => ra.width() == rb.width() && self.is_matching(*ea, *eb),
            (
                TypeKind::DynamicArray { element: ea },
                TypeKind::DynamicArray { element: eb },
            ) => self.is_matching(*ea, *eb),
            (
                TypeKind::Queue { element: ea, bound: ba },
                TypeKind::Queue { element: eb, bound: bb },
            ) => ba == bb && self.is_matching(*ea, *eb),
            (
                TypeKind::AssociativeArray { element: ea, index: ia },
                TypeKind::AssociativeArray { element: eb, index: ib },
            ) => {
                self.is_matching(*ea, *eb)
                    && match (ia, ib) {
                        (None, None) => true,
                        (Some(ia), Some(ib)) => self.is_matching(*ia, *ib),
                        _ => false,
                    }
            }
            _ => false,
        }
    }

    /// Determines whether two types are equivalent: implicit conversion is
    /// permitted between equivalent types.
    #[must_use]
    pub fn is_equivalent(&self, a: TypeId, b: TypeId) -> bool {
        if self.is_matching(a, b) {
            return true;
        }
        let table = &self.types;

        // integral types are equivalent on shape alone, ignoring the
        // reg/logic distinction and the dimension layout
        if let (Some(da), Some(db)) =
            (table.integral_data(a), table.integral_data(b))
        {
            return da.width == db.width
                && da.signed == db.signed
                && da.four_state == db.four_state;
        }

        match (table.canon_kind(a), table.canon_kind(b)) {
            (
                TypeKind::FixedArray { element: ea, range: ra },
                TypeKind::FixedArray { element: eb, range: rb },
            ) => ra.width() == rb.width() && self.is_equivalent(*ea, *eb),
            (
                TypeKind::DynamicArray { element: ea },
                TypeKind::DynamicArray { element: eb },
            )
            | (
                TypeKind::Queue { element: ea, .. },
                TypeKind::Queue { element: eb, .. },
            ) => self.is_equivalent(*ea, *eb),
            (
                TypeKind::AssociativeArray { element: ea, index: ia },
                TypeKind::AssociativeArray { element: eb, index: ib },
            ) => {
                self.is_equivalent(*ea, *eb)
                    && match (ia, ib) {
                        (None, None) => true,
                        (Some(ia), Some(ib)) => self.is_matching(*ia, *ib),
                        _ => false,
                    }
            }
            _ => false,
        }
    }

    /// Determines whether `rhs` is assignment compatible to `lhs`. This
    /// includes all equivalent types plus the implicit conversion rules;
    /// the relation is not symmetric.
    #[must_use]
    pub fn is_assignment_compatible(&self, lhs: TypeId, rhs: TypeId) -> bool {
        if self.is_equivalent(lhs, rhs) {
            return true;
        }
        let table = &self.types;

        // numeric types convert with implicit truncation/extension
        if table.is_numeric(lhs) && table.is_numeric(rhs) {
            // enums only accept their own kind implicitly
            return !matches!(table.canon_kind(lhs), TypeKind::Enum(_));
        }

        match (table.canon_kind(lhs), table.canon_kind(rhs)) {
            // string <-> unpacked array of bytes
            (TypeKind::Str, _) if self.is_byte_array(rhs) => true,
            (_, TypeKind::Str) if self.is_byte_array(lhs) => true,

            // null -> class handle, chandle, event, string
            (
                TypeKind::Class(_)
                | TypeKind::CHandle
                | TypeKind::Event
                | TypeKind::Str,
                TypeKind::Null,
            ) => true,

            // derived class handle -> base class handle
            (TypeKind::Class(base), TypeKind::Class(derived)) => {
                self.is_derived_from(*derived, *base)
            }
            _ => false,
        }
    }

    /// Determines whether `rhs` may be cast to `lhs` explicitly.
    #[must_use]
    pub fn is_cast_compatible(&self, lhs: TypeId, rhs: TypeId) -> bool {
        if self.is_assignment_compatible(lhs, rhs)
            || self.is_assignment_compatible(rhs, lhs)
        {
            return true;
        }
        let table = &self.types;

        match (table.canon_kind(lhs), table.canon_kind(rhs)) {
            // enum <-> integral of the same width
            (TypeKind::Enum(_), _) if table.is_integral(rhs) => {
                table.bit_width(lhs) == table.bit_width(rhs)
            }

            // explicit class down-cast, checked at run time downstream
            (TypeKind::Class(derived), TypeKind::Class(base)) => {
                self.is_derived_from(*derived, *base)
            }
            _ => false,
        }
    }

    /// Determines whether `src` can be bitstream cast to `dst`: both sides
    /// must have computable bitstream widths and the widths must agree.
    #[must_use]
    pub fn is_bitstream_castable(&self, dst: TypeId, src: TypeId) -> bool {
        let table = &self.types;
        if !table.is_bitstream_type(dst, true)
            || !table.is_bitstream_type(src, false)
        {
            return false;
        }
        match (table.bitstream_width(dst), table.bitstream_width(src)) {
            (Some(dst_width), Some(src_width)) => dst_width == src_width,
            // dynamically sized destination adapts to any fixed source
            (None, Some(_)) | (Some(_), None) | (None, None) => true,
        }
    }

    /// Whether `derived` is `base` or transitively extends it.
    #[must_use]
    pub fn is_derived_from(
        &self,
        derived: ID<ClassDef>,
        base: ID<ClassDef>,
    ) -> bool {
        let mut current = Some(derived);
        while let Some(class) = current {
            if class == base {
                return true;
            }
            current = self.classes[class].base;
        }
        false
    }

    /// If both types are class types with a common base class somewhere in
    /// their inheritance chains, returns the deepest such class type.
    #[must_use]
    pub fn common_base(&self, a: TypeId, b: TypeId) -> Option<ID<ClassDef>> {
        let TypeKind::Class(mut left) = *self.types.canon_kind(a) else {
            return None;
        };
        let TypeKind::Class(right) = *self.types.canon_kind(b) else {
            return None;
        };

        loop {
            if self.is_derived_from(right, left) {
                return Some(left);
            }
            left = self.classes[left].base?;
        }
    }

    /// Whether the type is an unpacked array of byte-shaped elements.
    #[must_use]
    pub fn is_byte_array(&self, id: TypeId) -> bool {
        let table = &self.types;
        let element = match table.canon_kind(id) {
            TypeKind::FixedArray { element, .. }
            | TypeKind::DynamicArray { element }
            | TypeKind::Queue { element, .. } => *element,
            _ => return false,
        };
        table
            .integral_data(element)
            .is_some_and(|data| data.width == 8)
    }

    /// Renders a type for diagnostics.
    #[must_use]
    pub fn type_to_string(&self, id: TypeId) -> String {
        render_type(&self.types, &self.interner, id)
    }
}

fn render_type(table: &TypeTable, interner: &Interner, id: TypeId) -> String {
    match &table.get(id).kind {
        TypeKind::Error => "<error>".to_owned(),
        TypeKind::Void => "void".to_owned(),
        TypeKind::Null => "null".to_owned(),
        TypeKind::CHandle => "chandle".to_owned(),
        TypeKind::Event => "event".to_owned(),
        TypeKind::Str => "string".to_owned(),
        TypeKind::Floating(FloatKind::ShortReal) => "shortreal".to_owned(),
        TypeKind::Floating(FloatKind::Real) => "real".to_owned(),
        TypeKind::Floating(FloatKind::RealTime) => "realtime".to_owned(),
        TypeKind::Integral(data) => {
            let mut text = String::new();
            text.push_str(match (data.four_state, data.is_reg) {
                (true, true) => "reg",
                (true, false) => "logic",
                (false, _) => "bit",
            });
            if data.signed {
                text.push_str(" signed");
            }
            if data.packed_dims.is_empty() && data.width > 1 {
                text.push_str(&format!("[{}:0]", data.width - 1));
            }
            for dim in &data.packed_dims {
                text.push_str(&format!("[{}:{}]", dim.left, dim.right));
            }
            text
        }
        TypeKind::Enum(_) => "enum".to_owned(),
        TypeKind::FixedArray { element, range } => format!(
            "{}$[{}:{}]",
            render_type(table, interner, *element),
            range.left,
            range.right
        ),
        TypeKind::DynamicArray { element } => {
            format!("{}$[]", render_type(table, interner, *element))
        }
        TypeKind::AssociativeArray { element, index } => format!(
            "{}$[{}]",
            render_type(table, interner, *element),
            index.as_ref().map_or_else(
                || "*".to_owned(),
                |index| render_type(table, interner, *index)
            )
        ),
        TypeKind::Queue { element, .. } => {
            format!("{}$[$]", render_type(table, interner, *element))
        }
        TypeKind::UnpackedStruct(_) => "struct".to_owned(),
        TypeKind::Class(_) => "class".to_owned(),
        TypeKind::Alias { target, .. } => render_type(table, interner, *target),
    }
}
