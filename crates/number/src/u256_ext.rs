//! Extension trait for U256 arithmetic operations.

use primitive_types::{U256, U512};

/// Basis points denominator: 10000 bps = 100%.
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Extension trait for U256 to add utility methods.
pub trait U256Ext: Sized {
    /// Ceiling division: (self + other - 1) / other
    fn checked_ceil_div(&self, other: &Self) -> Option<Self>;

    /// Floor of `self * factor / divisor`.
    ///
    /// The product is computed over 512 bits so the only failure modes are a
    /// zero divisor or a quotient that does not fit back into 256 bits.
    fn checked_mul_div_floor(&self, factor: &Self, divisor: &Self) -> Option<Self>;

    /// Floor of the given basis-point share of `self`.
    fn checked_bps(&self, bps: u16) -> Option<Self>;
}

impl U256Ext for U256 {
    fn checked_ceil_div(&self, other: &Self) -> Option<Self> {
        self.checked_add(other.checked_sub(U256::one())?)?
            .checked_div(*other)
    }

    fn checked_mul_div_floor(&self, factor: &Self, divisor: &Self) -> Option<Self> {
        if divisor.is_zero() {
            return None;
        }
        let product = self.full_mul(*factor);
        let quotient = product / U512::from(*divisor);
        U256::try_from(quotient).ok()
    }

    fn checked_bps(&self, bps: u16) -> Option<Self> {
        self.checked_mul_div_floor(&U256::from(bps), &U256::from(BPS_DENOMINATOR))
    }
}
