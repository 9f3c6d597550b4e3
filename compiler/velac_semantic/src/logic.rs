//! Contains [`LogicVec`], the arbitrary-precision four-state integer used
//! by the constant evaluator.
//!
//! A vector is stored as two bit planes over [`BigUint`]: `val` holds the
//! known value bits, `unk` marks the positions holding `x` or `z`. For a
//! position with the `unk` bit set, the `val` bit distinguishes `z` (set)
//! from `x` (clear). Both planes are always masked to `width` bits.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive, Zero};
use velac_syntax::expression::LiteralBase;

/// One four-state digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Logic {
    Zero,
    One,
    X,
    Z,
}

impl Logic {
    /// Whether the digit is `x` or `z`.
    #[must_use]
    pub const fn is_unknown(self) -> bool { matches!(self, Self::X | Self::Z) }
}

/// An arbitrary-precision four-state integer with a fixed bit width and a
/// signedness used by arithmetic and comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicVec {
    width: u32,
    signed: bool,
    val: BigUint,
    unk: BigUint,
}

fn mask(width: u32) -> BigUint { (BigUint::one() << width) - 1u8 }

impl LogicVec {
    /// Creates a vector from raw planes, masking them to the width.
    #[must_use]
    pub fn from_planes(
        width: u32,
        signed: bool,
        val: BigUint,
        unk: BigUint,
    ) -> Self {
        let m = mask(width);
        Self { width, signed, val: val & &m, unk: unk & m }
    }

    /// Creates an unsigned vector holding the given value.
    #[must_use]
    pub fn from_u64(width: u32, value: u64) -> Self {
        Self::from_planes(width, false, BigUint::from(value), BigUint::zero())
    }

    /// Creates a signed vector holding the given value in two's complement.
    #[must_use]
    pub fn from_i64(width: u32, value: i64) -> Self {
        let val = if value < 0 {
            let magnitude = BigUint::from(value.unsigned_abs());
            (mask(width) + 1u8 - (magnitude & mask(width))) & mask(width)
        } else {
            BigUint::from(value.unsigned_abs())
        };
        Self::from_planes(width, true, val, BigUint::zero())
    }

    /// Creates a vector with every bit set to the given digit.
    #[must_use]
    pub fn filled(width: u32, signed: bool, digit: Logic) -> Self {
        let m = mask(width);
        let (val, unk) = match digit {
            Logic::Zero => (BigUint::zero(), BigUint::zero()),
            Logic::One => (m.clone(), BigUint::zero()),
            Logic::X => (BigUint::zero(), m.clone()),
            Logic::Z => (m.clone(), m.clone()),
        };
        Self { width, signed, val, unk }
    }

    /// Creates the all-`x` vector of the given width.
    #[must_use]
    pub fn all_x(width: u32, signed: bool) -> Self {
        Self::filled(width, signed, Logic::X)
    }

    /// Parses digit text in the given base, as written after the base
    /// specifier of a literal. Digits may include `x`, `z`, `?` and `_`.
    ///
    /// Returns the parsed vector at its natural width (the number of bits
    /// the digit text denotes, at least one).
    pub fn from_digits(base: LiteralBase, digits: &str) -> Result<Self, InvalidDigit> {
        let bits_per_digit = match base {
            LiteralBase::Binary => 1,
            LiteralBase::Octal => 3,
            LiteralBase::Hex => 4,
            LiteralBase::Decimal => 0,
        };

        if bits_per_digit == 0 {
            // decimal: either all value digits or a single x/z
            let text: String =
                digits.chars().filter(|c| *c != '_').collect();
            if text.is_empty() {
                return Err(InvalidDigit { digit: ' ' });
            }
            if let Some(first) = text.chars().next() {
                if matches!(first, 'x' | 'X' | 'z' | 'Z' | '?') && text.len() == 1 {
                    let digit = if matches!(first, 'x' | 'X') {
                        Logic::X
                    } else {
                        Logic::Z
                    };
                    return Ok(Self::filled(1, false, digit));
                }
            }

            let mut val = BigUint::zero();
            for c in text.chars() {
                let digit =
                    c.to_digit(10).ok_or(InvalidDigit { digit: c })?;
                val = val * 10u8 + digit;
            }
            let width = val.bits().max(1) as u32;
            return Ok(Self { width, signed: false, val, unk: BigUint::zero() });
        }

        let mut val = BigUint::zero();
        let mut unk = BigUint::zero();
        let mut count = 0u32;
        for c in digits.chars() {
            if c == '_' {
                continue;
            }
            val <<= bits_per_digit;
            unk <<= bits_per_digit;
            match c {
                'x' | 'X' => unk += mask(bits_per_digit),
                'z' | 'Z' | '?' => {
                    val += mask(bits_per_digit);
                    unk += mask(bits_per_digit);
                }
                _ => {
                    let digit = c
                        .to_digit(base.radix())
                        .ok_or(InvalidDigit { digit: c })?;
                    val += digit;
                }
            }
            count += bits_per_digit;
        }

        if count == 0 {
            return Err(InvalidDigit { digit: ' ' });
        }
        Ok(Self { width: count, signed: false, val, unk })
    }

    /// The width of the vector in bits.
    #[must_use]
    pub const fn width(&self) -> u32 { self.width }

    /// Whether arithmetic treats the vector as two's complement.
    #[must_use]
    pub const fn is_signed(&self) -> bool { self.signed }

    /// Whether any bit is `x` or `z`.
    #[must_use]
    pub fn has_unknown(&self) -> bool { !self.unk.is_zero() }

    /// Whether the value is a known zero.
    #[must_use]
    pub fn is_zero(&self) -> bool { self.val.is_zero() && self.unk.is_zero() }

    /// Returns the digit at the given bit position.
    #[must_use]
    pub fn bit(&self, index: u32) -> Logic {
        let val = self.val.bit(u64::from(index));
        let unk = self.unk.bit(u64::from(index));
        match (unk, val) {
            (false, false) => Logic::Zero,
            (false, true) => Logic::One,
            (true, false) => Logic::X,
            (true, true) => Logic::Z,
        }
    }

    /// Returns a copy with the given signedness.
    #[must_use]
    pub fn as_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    /// Resizes to the given width: truncating from the top, or extending
    /// with the sign digit (signed) or zero (unsigned). An unknown sign
    /// digit extends as itself.
    #[must_use]
    pub fn resize(&self, width: u32) -> Self {
        if width == self.width {
            return self.clone();
        }
        if width < self.width {
            let m = mask(width);
            return Self {
                width,
                signed: self.signed,
                val: &self.val & &m,
                unk: &self.unk & m,
            };
        }

        let extension = if self.signed && self.width > 0 {
            self.bit(self.width - 1)
        } else {
            Logic::Zero
        };
        let ext_bits = mask(width) ^ mask(self.width);
        let (mut val, mut unk) = (self.val.clone(), self.unk.clone());
        match extension {
            Logic::Zero => {}
            Logic::One => val |= &ext_bits,
            Logic::X => unk |= &ext_bits,
            Logic::Z => {
                val |= &ext_bits;
                unk |= &ext_bits;
            }
        }
        Self { width, signed: self.signed, val, unk }
    }

    /// Interprets the vector as an unsigned integer if fully known.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        if self.has_unknown() {
            return None;
        }
        self.val.to_u64()
    }

    /// Interprets the vector as a signed integer if fully known.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        if self.has_unknown() {
            return None;
        }
        self.to_bigint().to_i64()
    }

    /// The raw value plane as an unsigned integer, if fully known.
    #[must_use]
    pub fn to_biguint(&self) -> Option<BigUint> {
        if self.has_unknown() {
            return None;
        }
        Some(self.val.clone())
    }

    /// The two's complement interpretation of the value plane.
    #[must_use]
    pub fn to_bigint(&self) -> BigInt {
        if self.signed && self.width > 0 && self.val.bit(u64::from(self.width - 1))
        {
            BigInt::from(self.val.clone()) - (BigInt::one() << self.width)
        } else {
            BigInt::from(self.val.clone())
        }
    }

    /// The truth value: true if any bit is a known one, unknown if no bit
    /// is a known one but some are `x`/`z`, false otherwise.
    #[must_use]
    pub fn truthy(&self) -> Option<bool> {
        let known = self.complement(&self.unk);
        if !(&self.val & known).is_zero() {
            return Some(true);
        }
        if self.has_unknown() {
            return None;
        }
        Some(false)
    }

    fn complement(&self, plane: &BigUint) -> BigUint { mask(self.width) ^ plane }

    fn result_signed(&self, rhs: &Self) -> bool { self.signed && rhs.signed }

    /// Wrapping addition at `self`'s width. Any unknown operand bit makes
    /// the whole result unknown.
    #[must_use]
    pub fn add(&self, rhs: &Self) -> Self {
        let signed = self.result_signed(rhs);
        if self.has_unknown() || rhs.has_unknown() {
            return Self::all_x(self.width, signed);
        }
        Self::from_planes(
            self.width,
            signed,
            &self.val + &rhs.val,
            BigUint::zero(),
        )
    }

    /// Wrapping subtraction at `self`'s width.
    #[must_use]
    pub fn sub(&self, rhs: &Self) -> Self {
        let signed = self.result_signed(rhs);
        if self.has_unknown() || rhs.has_unknown() {
            return Self::all_x(self.width, signed);
        }
        let modulus = mask(self.width) + 1u8;
        let val = (&self.val + &modulus) - (&rhs.val & mask(self.width));
        Self::from_planes(self.width, signed, val, BigUint::zero())
    }

    /// Wrapping multiplication at `self`'s width.
    #[must_use]
    pub fn mul(&self, rhs: &Self) -> Self {
        let signed = self.result_signed(rhs);
        if self.has_unknown() || rhs.has_unknown() {
            return Self::all_x(self.width, signed);
        }
        Self::from_planes(
            self.width,
            signed,
            &self.val * &rhs.val,
            BigUint::zero(),
        )
    }

    /// Division truncating toward zero. Division by zero yields all-`x`;
    /// the caller is responsible for the diagnostic.
    #[must_use]
    pub fn div(&self, rhs: &Self) -> Self {
        let signed = self.result_signed(rhs);
        if self.has_unknown() || rhs.has_unknown() || rhs.val.is_zero() {
            return Self::all_x(self.width, signed);
        }
        if signed {
            let quotient = self.to_bigint() / rhs.to_bigint();
            Self::from_bigint(self.width, true, &quotient)
        } else {
            Self::from_planes(
                self.width,
                false,
                &self.val / &rhs.val,
                BigUint::zero(),
            )
        }
    }

    /// Remainder taking the sign of the left operand. Zero divisor yields
    /// all-`x`.
    #[must_use]
    pub fn rem(&self, rhs: &Self) -> Self {
        let signed = self.result_signed(rhs);
        if self.has_unknown() || rhs.has_unknown() || rhs.val.is_zero() {
            return Self::all_x(self.width, signed);
        }
        if signed {
            let remainder = self.to_bigint() % rhs.to_bigint();
            Self::from_bigint(self.width, true, &remainder)
        } else {
            Self::from_planes(
                self.width,
                false,
                &self.val % &rhs.val,
                BigUint::zero(),
            )
        }
    }

    /// The power operator with the standard integer special cases for
    /// negative exponents.
    #[must_use]
    pub fn pow(&self, rhs: &Self) -> Self {
        let signed = self.result_signed(rhs);
        if self.has_unknown() || rhs.has_unknown() {
            return Self::all_x(self.width, signed);
        }

        let base = self.to_bigint();
        let negative_exponent = rhs.signed && rhs.to_bigint() < BigInt::zero();
        if negative_exponent {
            let result: i64 = if base == BigInt::one() {
                1
            } else if base == BigInt::from(-1) {
                let even = !rhs.val.bit(0);
                if even {
                    1
                } else {
                    -1
                }
            } else if base.is_zero() {
                return Self::all_x(self.width, signed);
            } else {
                0
            };
            return Self::from_i64(self.width, result).as_signed(signed);
        }

        let modulus = mask(self.width) + 1u8;
        let val = self.val.modpow(&rhs.val, &modulus);
        Self::from_planes(self.width, signed, val, BigUint::zero())
    }

    /// Two's complement negation.
    #[must_use]
    pub fn negate(&self) -> Self {
        if self.has_unknown() {
            return Self::all_x(self.width, self.signed);
        }
        let modulus = mask(self.width) + 1u8;
        Self::from_planes(
            self.width,
            self.signed,
            modulus - &self.val,
            BigUint::zero(),
        )
    }

    /// Bitwise AND with per-bit four-state rules: a known zero on either
    /// side forces zero, two known ones make one, everything else is `x`.
    #[must_use]
    pub fn and(&self, rhs: &Self) -> Self {
        let ones = (&self.val & self.complement(&self.unk))
            & (&rhs.val & rhs.complement(&rhs.unk));
        let zeros = (self.complement(&self.val) & self.complement(&self.unk))
            | (rhs.complement(&rhs.val) & rhs.complement(&rhs.unk));
        let unk = mask(self.width) ^ (&ones | zeros);
        Self::from_planes(self.width, self.result_signed(rhs), ones, unk)
    }

    /// Bitwise OR with per-bit four-state rules.
    #[must_use]
    pub fn or(&self, rhs: &Self) -> Self {
        let ones = (&self.val & self.complement(&self.unk))
            | (&rhs.val & rhs.complement(&rhs.unk));
        let zeros = (self.complement(&self.val) & self.complement(&self.unk))
            & (rhs.complement(&rhs.val) & rhs.complement(&rhs.unk));
        let unk = mask(self.width) ^ (&ones | zeros);
        Self::from_planes(self.width, self.result_signed(rhs), ones, unk)
    }

    /// Bitwise XOR; any unknown bit in either operand is unknown in the
    /// result.
    #[must_use]
    pub fn xor(&self, rhs: &Self) -> Self {
        let unk = &self.unk | &rhs.unk;
        let val = (&self.val ^ &rhs.val) & (mask(self.width) ^ &unk);
        Self::from_planes(self.width, self.result_signed(rhs), val, unk)
    }

    /// Bitwise NOT; unknown bits stay `x`.
    #[must_use]
    pub fn not(&self) -> Self {
        let known = self.complement(&self.unk);
        let val = self.complement(&self.val) & known;
        Self::from_planes(self.width, self.signed, val, self.unk.clone())
    }

    /// Logical shift left by a known amount; an unknown amount yields
    /// all-`x`.
    #[must_use]
    pub fn shl(&self, rhs: &Self) -> Self {
        let Some(amount) = rhs.as_u64() else {
            return Self::all_x(self.width, self.signed);
        };
        if amount >= u64::from(self.width) {
            return Self::from_planes(
                self.width,
                self.signed,
                BigUint::zero(),
                BigUint::zero(),
            );
        }
        Self::from_planes(
            self.width,
            self.signed,
            &self.val << amount,
            &self.unk << amount,
        )
    }

    /// Logical shift right.
    #[must_use]
    pub fn lshr(&self, rhs: &Self) -> Self {
        let Some(amount) = rhs.as_u64() else {
            return Self::all_x(self.width, self.signed);
        };
        if amount >= u64::from(self.width) {
            return Self::from_planes(
                self.width,
                self.signed,
                BigUint::zero(),
                BigUint::zero(),
            );
        }
        Self::from_planes(
            self.width,
            self.signed,
            &self.val >> amount,
            &self.unk >> amount,
        )
    }

    /// Arithmetic shift right: fills with the sign digit when signed.
    #[must_use]
    pub fn ashr(&self, rhs: &Self) -> Self {
        if !self.signed {
            return self.lshr(rhs);
        }
        let Some(amount) = rhs.as_u64() else {
            return Self::all_x(self.width, self.signed);
        };
        let amount = amount.min(u64::from(self.width)) as u32;
        let shifted = Self::from_planes(
            self.width,
            self.signed,
            &self.val >> amount,
            &self.unk >> amount,
        );
        if amount == 0 || self.width == 0 {
            return shifted;
        }
        let fill = mask(self.width) ^ mask(self.width - amount);
        let (mut val, mut unk) = (shifted.val, shifted.unk);
        match self.bit(self.width - 1) {
            Logic::Zero => {}
            Logic::One => val |= &fill,
            Logic::X => unk |= &fill,
            Logic::Z => {
                val |= &fill;
                unk |= &fill;
            }
        }
        Self { width: self.width, signed: self.signed, val, unk }
    }

    /// Logical equality; unknown when either operand has `x`/`z` bits.
    #[must_use]
    pub fn logical_eq(&self, rhs: &Self) -> Option<bool> {
        if self.has_unknown() || rhs.has_unknown() {
            return None;
        }
        Some(self.val == rhs.val)
    }

    /// Case equality: exact per-digit comparison, `x`/`z` included.
    #[must_use]
    pub fn case_eq(&self, rhs: &Self) -> bool {
        self.val == rhs.val && self.unk == rhs.unk
    }

    /// Less-than under the common signedness; unknown when either operand
    /// has `x`/`z` bits.
    #[must_use]
    pub fn less_than(&self, rhs: &Self) -> Option<bool> {
        if self.has_unknown() || rhs.has_unknown() {
            return None;
        }
        if self.result_signed(rhs) {
            Some(self.to_bigint() < rhs.to_bigint())
        } else {
            Some(self.val < rhs.val)
        }
    }

    /// Concatenates `self` above `rhs` (self occupies the high bits).
    #[must_use]
    pub fn concat(&self, rhs: &Self) -> Self {
        let width = self.width + rhs.width;
        let val = (&self.val << rhs.width) | &rhs.val;
        let unk = (&self.unk << rhs.width) | &rhs.unk;
        Self { width, signed: false, val, unk }
    }

    /// Extracts the bit range `[high:low]` as an unsigned vector.
    #[must_use]
    pub fn extract(&self, high: u32, low: u32) -> Self {
        let width = high - low + 1;
        Self::from_planes(
            width,
            false,
            &self.val >> low,
            &self.unk >> low,
        )
    }

    fn from_bigint(width: u32, signed: bool, value: &BigInt) -> Self {
        let modulus = BigInt::one() << width;
        let wrapped = ((value % &modulus) + &modulus) % &modulus;
        let (_, val) = wrapped.into_parts();
        Self::from_planes(width, signed, val, BigUint::zero())
    }
}

impl fmt::Display for LogicVec {
    /// Renders as a decimal number when fully known, or as a based binary
    /// literal (`4'b10x1`) when any digit is `x`/`z`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_unknown() {
            if self.signed {
                return write!(f, "{}", self.to_bigint());
            }
            return write!(f, "{}", self.val);
        }

        write!(f, "{}'b", self.width)?;
        for index in (0..self.width).rev() {
            let digit = match self.bit(index) {
                Logic::Zero => '0',
                Logic::One => '1',
                Logic::X => 'x',
                Logic::Z => 'z',
            };
            write!(f, "{digit}")?;
        }
        Ok(())
    }
}

/// The error returned by [`LogicVec::from_digits`] for a character outside
/// the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid digit `{digit}` in literal")]
pub struct InvalidDigit {
    /// The offending character.
    pub digit: char,
}

#[cfg(test)]
mod tests {
    use velac_syntax::expression::LiteralBase;

    use super::{Logic, LogicVec};

    #[test]
    fn digits_round_trip_through_planes() {
        let vec = LogicVec::from_digits(LiteralBase::Binary, "10x1").unwrap();

        assert_eq!(vec.width(), 4);
        assert_eq!(vec.bit(3), Logic::One);
        assert_eq!(vec.bit(2), Logic::Zero);
        assert_eq!(vec.bit(1), Logic::X);
        assert_eq!(vec.bit(0), Logic::One);
        assert!(vec.has_unknown());
    }

    #[test]
    fn unknown_operand_poisons_arithmetic() {
        let lhs = LogicVec::from_digits(LiteralBase::Binary, "10x1").unwrap();
        let rhs = LogicVec::from_u64(4, 1);

        let sum = lhs.add(&rhs);

        assert_eq!(sum.to_string(), "4'bxxxx");
    }

    #[test]
    fn and_or_have_per_bit_dominance() {
        let x = LogicVec::from_digits(LiteralBase::Binary, "xx").unwrap();
        let zero_one = LogicVec::from_digits(LiteralBase::Binary, "01").unwrap();

        // 0 dominates AND, 1 dominates OR
        let and = x.and(&zero_one);
        assert_eq!(and.bit(1), Logic::Zero);
        assert_eq!(and.bit(0), Logic::X);

        let or = x.or(&zero_one);
        assert_eq!(or.bit(1), Logic::X);
        assert_eq!(or.bit(0), Logic::One);
    }

    #[test]
    fn signed_division_truncates_toward_zero() {
        let lhs = LogicVec::from_i64(32, -7);
        let rhs = LogicVec::from_i64(32, 2);

        assert_eq!(lhs.div(&rhs).as_i64(), Some(-3));
        assert_eq!(lhs.rem(&rhs).as_i64(), Some(-1));
    }

    #[test]
    fn division_by_zero_is_all_unknown() {
        let lhs = LogicVec::from_u64(8, 42);
        let rhs = LogicVec::from_u64(8, 0);

        assert!(lhs.div(&rhs).has_unknown());
        assert_eq!(lhs.div(&rhs).to_string(), "8'bxxxxxxxx");
    }

    #[test]
    fn resize_extends_with_sign_digit() {
        let negative = LogicVec::from_i64(4, -2);
        assert_eq!(negative.resize(8).as_i64(), Some(-2));

        let unsigned = LogicVec::from_u64(4, 0b1110);
        assert_eq!(unsigned.resize(8).as_u64(), Some(0b1110));

        let z_top = LogicVec::from_digits(LiteralBase::Binary, "z0").unwrap();
        let extended = z_top.as_signed(true).resize(4);
        assert_eq!(extended.bit(3), Logic::Z);
        assert_eq!(extended.bit(2), Logic::Z);
        assert_eq!(extended.bit(0), Logic::Zero);
    }

    #[test]
    fn truthiness_needs_a_known_one() {
        let some_one = LogicVec::from_digits(LiteralBase::Binary, "1x").unwrap();
        assert_eq!(some_one.truthy(), Some(true));

        let only_unknowns =
            LogicVec::from_digits(LiteralBase::Binary, "0x").unwrap();
        assert_eq!(only_unknowns.truthy(), None);

        assert_eq!(LogicVec::from_u64(4, 0).truthy(), Some(false));
    }

    #[test]
    fn comparisons_yield_unknown_with_xz() {
        let known = LogicVec::from_u64(4, 5);
        let unknown = LogicVec::from_digits(LiteralBase::Binary, "01x1").unwrap();

        assert_eq!(known.logical_eq(&unknown), None);
        assert_eq!(known.less_than(&unknown), None);
        assert!(unknown.case_eq(&unknown));
        assert!(!unknown.case_eq(&known));
    }

    #[test]
    fn power_handles_negative_exponents() {
        let two = LogicVec::from_i64(32, 2);
        let ten = LogicVec::from_i64(32, 10);
        assert_eq!(two.pow(&ten).as_i64(), Some(1024));

        let minus_one = LogicVec::from_i64(32, -1);
        let minus_three = LogicVec::from_i64(32, -3);
        assert_eq!(minus_one.pow(&minus_three).as_i64(), Some(-1));
        assert_eq!(two.pow(&minus_three).as_i64(), Some(0));

        let zero = LogicVec::from_i64(32, 0);
        assert!(zero.pow(&minus_three).has_unknown());
    }

    #[test]
    fn concat_puts_left_operand_on_top() {
        let high = LogicVec::from_u64(4, 0b1010);
        let low = LogicVec::from_u64(4, 0b0101);

        let joined = high.concat(&low);

        assert_eq!(joined.width(), 8);
        assert_eq!(joined.as_u64(), Some(0b1010_0101));
        assert_eq!(joined.extract(7, 4).as_u64(), Some(0b1010));
    }
}
