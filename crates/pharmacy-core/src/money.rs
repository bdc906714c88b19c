//! # Money Module
//!
//! Provides `Money` and `Percent` for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    Prices are stored in the smallest currency unit (1 đồng for VND).    │
//! │    Percentages round half-up exactly once, per line.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pharmacy_core::money::{Money, Percent};
//!
//! let price = Money::from_minor(100_000);
//! let line = price * 2;
//! let off = line.percentage(Percent::new(20).unwrap());
//! assert_eq!(off.minor(), 40_000);
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate totals may dip below zero before flooring
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Saturating operators**: `+`, `-` and `*` stop at the i64 bounds
///   instead of wrapping. Catalog validation keeps real totals far below them.
///
/// ## Where Money is Used
/// ```text
/// UnitDefinition.price ──► CartLine.unit_price ──► PricedLine ──► subtotal
///                                                                    │
///        promotion % / storefront % ──► direct discount ◄────────────┤
///        voucher ─────────────────────► voucher discount ◄───────────┘
///                                            │
///                          final total = subtotal − discounts + shipping
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from the smallest currency unit.
    ///
    /// ```rust
    /// use pharmacy_core::money::Money;
    ///
    /// let price = Money::from_minor(45_000);
    /// assert_eq!(price.minor(), 45_000);
    /// ```
    #[inline]
    pub const fn from_minor(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the value in the smallest currency unit.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity, saturating at the i64 bounds.
    ///
    /// ```rust
    /// use pharmacy_core::money::Money;
    ///
    /// let line_total = Money::from_minor(12_500).multiply_quantity(3);
    /// assert_eq!(line_total.minor(), 37_500);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Multiplies money by a quantity, or `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Adds two amounts, or `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Returns `pct` percent of this amount, rounded half-up.
    ///
    /// ## Implementation
    /// Integer math: `(amount × pct + 50) / 100`, widened to i128 so large
    /// order totals cannot overflow.
    ///
    /// ```rust
    /// use pharmacy_core::money::{Money, Percent};
    ///
    /// let amount = Money::from_minor(12_345);
    /// // 12,345 × 10% = 1,234.5 → 1,235
    /// assert_eq!(amount.percentage(Percent::new(10).unwrap()).minor(), 1_235);
    /// ```
    pub fn percentage(&self, pct: Percent) -> Money {
        let scaled = (self.0 as i128 * pct.value() as i128 + 50) / 100;
        Money(scaled.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Floors the value at zero.
    #[inline]
    pub fn floor_at_zero(self) -> Money {
        Money(self.0.max(0))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display groups thousands with dots and appends the đồng sign.
///
/// For logs and receipts only; localised display belongs to the frontend.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}đ", sign, grouped)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Percent
// =============================================================================

/// A whole-number percentage in `0..=100`.
///
/// Campaigns and vouchers further require `1..=100`; that rule lives with
/// them, this type only rules out nonsense like 140%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
#[ts(export)]
pub struct Percent(u8);

impl Percent {
    /// Creates a percentage, rejecting values above 100.
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if value > 100 {
            return Err(ValidationError::OutOfRange {
                field: "percent".to_string(),
                min: 0,
                max: 100,
            });
        }
        Ok(Percent(value))
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    /// Returns the whole-number percentage.
    #[inline]
    pub const fn value(&self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<u8> for Percent {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Percent::new(value)
    }
}

impl From<Percent> for u8 {
    fn from(pct: Percent) -> u8 {
        pct.0
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Percent::new(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(45_000);
        assert_eq!(money.minor(), 45_000);
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::from_minor(200_000).to_string(), "200.000đ");
        assert_eq!(Money::from_minor(1_234_567).to_string(), "1.234.567đ");
        assert_eq!(Money::from_minor(999).to_string(), "999đ");
        assert_eq!(Money::from_minor(0).to_string(), "0đ");
        assert_eq!(Money::from_minor(-50_000).to_string(), "-50.000đ");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((a * 3).minor(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.minor(), 2000);
    }

    #[test]
    fn test_arithmetic_saturates_instead_of_wrapping() {
        let huge = Money::from_minor(i64::MAX / 2);

        assert_eq!(huge.multiply_quantity(3).minor(), i64::MAX);
        assert_eq!((huge * 3).minor(), i64::MAX);
        assert_eq!((huge + huge + huge).minor(), i64::MAX);
        assert_eq!((Money::from_minor(i64::MIN) - huge).minor(), i64::MIN);

        let mut acc = huge;
        acc += huge;
        acc += huge;
        assert_eq!(acc.minor(), i64::MAX);

        let total: Money = vec![huge, huge, huge].into_iter().sum();
        assert_eq!(total.minor(), i64::MAX);
    }

    #[test]
    fn test_checked_variants_report_overflow() {
        let huge = Money::from_minor(i64::MAX / 2);
        assert_eq!(huge.checked_multiply_quantity(3), None);
        assert_eq!(huge.checked_add(huge).map(|m| m.minor()), Some(i64::MAX - 1));
        assert_eq!(huge.checked_add(huge + Money::from_minor(2)), None);
        assert_eq!(
            Money::from_minor(12_500).checked_multiply_quantity(3),
            Some(Money::from_minor(37_500))
        );
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        let pct = Percent::new(20).unwrap();
        assert_eq!(Money::from_minor(200_000).percentage(pct).minor(), 40_000);

        // 5 × 10% = 0.5 → 1
        let ten = Percent::new(10).unwrap();
        assert_eq!(Money::from_minor(5).percentage(ten).minor(), 1);
        // 4 × 10% = 0.4 → 0
        assert_eq!(Money::from_minor(4).percentage(ten).minor(), 0);
    }

    #[test]
    fn test_percentage_bounds() {
        let full = Percent::new(100).unwrap();
        assert_eq!(Money::from_minor(77_777).percentage(full).minor(), 77_777);
        assert_eq!(Money::from_minor(77_777).percentage(Percent::zero()).minor(), 0);
    }

    #[test]
    fn test_percent_rejects_over_100() {
        assert!(Percent::new(100).is_ok());
        assert!(Percent::new(101).is_err());
        assert!(serde_json::from_str::<Percent>("150").is_err());
        assert_eq!(serde_json::from_str::<Percent>("15").unwrap().value(), 15);
    }

    #[test]
    fn test_floor_and_min() {
        assert_eq!(Money::from_minor(-10).floor_at_zero(), Money::zero());
        assert_eq!(Money::from_minor(10).floor_at_zero().minor(), 10);
        assert_eq!(Money::from_minor(3).min(Money::from_minor(7)).minor(), 3);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());
        assert!(Money::from_minor(-1).is_negative());
    }
}
