//! Contains [`ConstantValue`], the result model of constant evaluation.

use std::{cmp::Ordering, fmt};

use enum_as_inner::EnumAsInner;

use crate::logic::LogicVec;

/// An elaboration-time constant.
///
/// `Bad` is the sentinel produced when evaluation fails; it short-circuits
/// every further check on the owning subtree so a single defect produces a
/// single diagnostic.
#[derive(Debug, Clone, PartialEq, EnumAsInner, Default)]
pub enum ConstantValue {
    /// The `null` literal value.
    Null,

    /// A four-state integer.
    Integer(LogicVec),

    /// An IEEE-754 double.
    Real(f64),

    /// A byte string.
    Str(String),

    /// An unpacked aggregate: fixed-size unpacked arrays and structs.
    Elements(Vec<ConstantValue>),

    /// An associative array, keyed by constants in key order.
    Map(AssocArray),

    /// A queue with an optional maximum bound.
    Queue(QueueValue),

    /// A non-null class handle.
    ClassHandle(u64),

    /// The failure sentinel.
    #[default]
    Bad,
}

impl ConstantValue {
    /// The truth value used by conditions: unknown integers with no known
    /// one bit have no truth value.
    #[must_use]
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Self::Null => Some(false),
            Self::Integer(value) => value.truthy(),
            Self::Real(value) => Some(*value != 0.0),
            Self::Str(value) => Some(!value.is_empty()),
            Self::ClassHandle(_) => Some(true),
            Self::Elements(_) | Self::Map(_) | Self::Queue(_) | Self::Bad => None,
        }
    }

    /// Converts an integer or real constant to a real number.
    #[must_use]
    pub fn to_real(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => {
                if value.has_unknown() {
                    return None;
                }
                if value.is_signed() {
                    value.as_i64().map(|v| v as f64)
                } else {
                    value.as_u64().map(|v| v as f64)
                }
            }
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    /// A total order over constants, used to keep associative arrays
    /// sorted by key. Different value shapes order by their tag; integers
    /// order numerically with the rendered form breaking ties between
    /// distinct `x`/`z` patterns.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        fn rank(value: &ConstantValue) -> u8 {
            match value {
                ConstantValue::Null => 0,
                ConstantValue::Integer(_) => 1,
                ConstantValue::Real(_) => 2,
                ConstantValue::Str(_) => 3,
                ConstantValue::Elements(_) => 4,
                ConstantValue::Map(_) => 5,
                ConstantValue::Queue(_) => 6,
                ConstantValue::ClassHandle(_) => 7,
                ConstantValue::Bad => 8,
            }
        }

        fn cmp_elements(a: &[ConstantValue], b: &[ConstantValue]) -> Ordering {
            for (left, right) in a.iter().zip(b) {
                let ordering = left.total_cmp(right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.len().cmp(&b.len())
        }

        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a
                .to_bigint()
                .cmp(&b.to_bigint())
                .then_with(|| a.to_string().cmp(&b.to_string())),
            (Self::Real(a), Self::Real(b)) => a.total_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::Elements(a), Self::Elements(b)) => cmp_elements(a, b),
            (Self::Queue(a), Self::Queue(b)) => {
                cmp_elements(&a.elements, &b.elements)
                    .then_with(|| a.bound.cmp(&b.bound))
            }
            (Self::Map(a), Self::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ordering =
                        ka.total_cmp(kb).then_with(|| va.total_cmp(vb));
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Self::ClassHandle(a), Self::ClassHandle(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "\"{value}\""),
            Self::Elements(elements) => {
                write!(f, "'{{")?;
                for (index, element) in elements.iter().enumerate() {
                    if index != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "}}")
            }
            Self::Map(map) => {
                write!(f, "'{{")?;
                for (index, (key, value)) in map.iter().enumerate() {
                    if index != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Self::Queue(queue) => {
                write!(f, "'{{")?;
                for (index, element) in queue.elements.iter().enumerate() {
                    if index != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "}}")
            }
            Self::ClassHandle(id) => write!(f, "handle#{id}"),
            Self::Bad => write!(f, "<bad>"),
        }
    }
}

impl From<LogicVec> for ConstantValue {
    fn from(value: LogicVec) -> Self { Self::Integer(value) }
}

impl From<f64> for ConstantValue {
    fn from(value: f64) -> Self { Self::Real(value) }
}

impl From<String> for ConstantValue {
    fn from(value: String) -> Self { Self::Str(value) }
}

/// An associative array value: key/value pairs with unique keys, kept
/// sorted by [`ConstantValue::total_cmp`] so iteration visits keys in
/// order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssocArray {
    entries: Vec<(ConstantValue, ConstantValue)>,
}

impl AssocArray {
    /// The number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether the array holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Iterates the entries in key order.
    pub fn iter(
        &self,
    ) -> impl ExactSizeIterator<Item = &(ConstantValue, ConstantValue)> {
        self.entries.iter()
    }

    /// Looks up the value stored under the given key.
    #[must_use]
    pub fn get(&self, key: &ConstantValue) -> Option<&ConstantValue> {
        self.entries
            .binary_search_by(|(stored, _)| stored.total_cmp(key))
            .ok()
            .map(|index| &self.entries[index].1)
    }

    /// Inserts or replaces the value stored under the given key.
    pub fn insert(&mut self, key: ConstantValue, value: ConstantValue) {
        match self
            .entries
            .binary_search_by(|(stored, _)| stored.total_cmp(&key))
        {
            Ok(index) => self.entries[index].1 = value,
            Err(index) => self.entries.insert(index, (key, value)),
        }
    }
}

/// A queue value with an optional maximum bound.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueueValue {
    pub elements: Vec<ConstantValue>,
    pub bound: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::ConstantValue;
    use crate::logic::LogicVec;

    #[test]
    fn truthiness_follows_the_value_shape() {
        assert_eq!(ConstantValue::Null.truthy(), Some(false));
        assert_eq!(ConstantValue::Real(0.5).truthy(), Some(true));
        assert_eq!(ConstantValue::Str(String::new()).truthy(), Some(false));
        assert_eq!(
            ConstantValue::Integer(LogicVec::from_u64(8, 3)).truthy(),
            Some(true)
        );
        assert_eq!(ConstantValue::Bad.truthy(), None);
    }

    #[test]
    fn assoc_array_replaces_on_duplicate_key() {
        let mut map = super::AssocArray::default();
        let key = ConstantValue::Integer(LogicVec::from_u64(32, 1));

        map.insert(key.clone(), ConstantValue::Real(1.0));
        map.insert(key.clone(), ConstantValue::Real(2.0));

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&key), Some(&ConstantValue::Real(2.0)));
    }

    #[test]
    fn assoc_array_iterates_in_key_order() {
        let mut map = super::AssocArray::default();
        for raw in [7u64, 2, 9, 4] {
            map.insert(
                ConstantValue::Integer(LogicVec::from_u64(32, raw)),
                ConstantValue::Real(raw as f64),
            );
        }

        let keys: Vec<i64> = map
            .iter()
            .map(|(key, _)| key.as_integer().unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(keys, vec![2, 4, 7, 9]);
    }
}
