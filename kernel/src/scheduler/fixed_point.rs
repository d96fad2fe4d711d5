//! 17.14 fixed-point arithmetic for the BSD scheduler
//!
//! Values are signed 32-bit integers scaled by 2^14. Multiplication and
//! division go through 64-bit intermediates and truncate toward zero; the
//! MLFQS formulas depend on this exact rounding.

use core::fmt;
use core::ops::{Add, Div, Mul, Sub};
use static_assertions::assert_eq_size;

/// Number of fractional bits
pub const FRACTION_BITS: u32 = 14;

/// Scale factor (1.0)
const F: i32 = 1 << FRACTION_BITS;

/// Signed 17.14 fixed-point number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct FixedPoint(i32);

assert_eq_size!(FixedPoint, i32);

impl FixedPoint {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(F);

    /// Convert an integer
    pub const fn from_int(n: i32) -> Self {
        Self(n * F)
    }

    /// Build from the raw scaled representation
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw scaled representation
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Convert to integer, rounding toward zero
    pub const fn to_int_trunc(self) -> i32 {
        self.0 / F
    }

    /// Convert to integer, rounding to nearest (halves away from zero)
    pub const fn to_int_round(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + F / 2) / F
        } else {
            (self.0 - F / 2) / F
        }
    }

    pub const fn add_int(self, n: i32) -> Self {
        Self(self.0 + n * F)
    }

    pub const fn mul_int(self, n: i32) -> Self {
        Self(self.0 * n)
    }

    pub const fn div_int(self, n: i32) -> Self {
        Self(self.0 / n)
    }

    pub const fn mul_fp(self, other: Self) -> Self {
        Self(((self.0 as i64) * (other.0 as i64) / F as i64) as i32)
    }

    pub const fn div_fp(self, other: Self) -> Self {
        Self(((self.0 as i64) * F as i64 / other.0 as i64) as i32)
    }

    /// `self * n` as an integer, rounded to nearest
    ///
    /// The product is formed in 64 bits: it may not fit in 17.14 even when
    /// the integer result does.
    pub const fn scale_round(self, n: i32) -> i64 {
        let product = self.0 as i64 * n as i64;
        let half = F as i64 / 2;
        if product >= 0 {
            (product + half) / F as i64
        } else {
            (product - half) / F as i64
        }
    }

    /// `self * n` as an integer, rounded toward zero
    pub const fn scale_trunc(self, n: i32) -> i64 {
        self.0 as i64 * n as i64 / F as i64
    }
}

impl Add for FixedPoint {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for FixedPoint {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul for FixedPoint {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        self.mul_fp(rhs)
    }
}

impl Div for FixedPoint {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        self.div_fp(rhs)
    }
}

impl Mul<i32> for FixedPoint {
    type Output = Self;
    fn mul(self, rhs: i32) -> Self {
        self.mul_int(rhs)
    }
}

impl Div<i32> for FixedPoint {
    type Output = Self;
    fn div(self, rhs: i32) -> Self {
        self.div_int(rhs)
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Two decimals, enough for diagnostics
        let hundredths = self.scale_trunc(100);
        let sign = if hundredths < 0 { "-" } else { "" };
        let abs = hundredths.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}
