//! Fixed-point arithmetic
//!
//! Two precisions are used throughout the pool:
//! - [`Wad`]: currency amounts, 18 decimal places
//! - [`Ray`]: rates, ratios and scale factors, 27 decimal places
//!
//! Sums and differences are exact. Every product or quotient is rounded
//! half away from zero back to the precision of its result type, so the same
//! inputs always produce the same rounded value.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places carried by [`Wad`]
pub const WAD_DECIMALS: u32 = 18;

/// Decimal places carried by [`Ray`]
pub const RAY_DECIMALS: u32 = 27;

/// Seconds in a day
pub const DAY: i64 = 24 * 60 * 60;

/// Seconds in a week
pub const WEEK: i64 = 7 * DAY;

/// Seconds in the 365-day year used for every interest computation
pub const SECONDS_PER_YEAR: i64 = 365 * DAY;

#[inline]
fn quantize(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Currency amount with 18 decimal places
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Wad(Decimal);

/// Rate, ratio or scale factor with 27 decimal places
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Ray(Decimal);

impl Wad {
    pub const ZERO: Wad = Wad(Decimal::ZERO);

    /// Quantize a decimal into a currency amount
    pub fn new(value: Decimal) -> Self {
        Wad(quantize(value, WAD_DECIMALS))
    }

    /// Whole currency units
    pub fn from_units(units: i64) -> Self {
        Wad(Decimal::from(units))
    }

    #[inline]
    pub fn raw(self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(self) -> Self {
        Wad(self.0.abs())
    }

    /// Clamp negative values to zero
    pub fn max_zero(self) -> Self {
        self.max(Wad::ZERO)
    }

    /// Product of two amounts
    pub fn wad_mul(self, other: Wad) -> Wad {
        Wad::new(self.0 * other.0)
    }

    /// Quotient of two amounts
    pub fn wad_div(self, other: Wad) -> Wad {
        Wad::new(self.0 / other.0)
    }

    /// Scale an amount by a rate
    pub fn mul_ray(self, rate: Ray) -> Wad {
        Wad::new(self.0 * rate.0)
    }

    /// Divide an amount by a rate
    pub fn div_ray(self, rate: Ray) -> Wad {
        Wad::new(self.0 / rate.0)
    }

    /// [`Wad::mul_ray`], or `None` on overflow
    pub fn checked_mul_ray(self, rate: Ray) -> Option<Wad> {
        self.0.checked_mul(rate.0).map(Wad::new)
    }

    /// [`Wad::div_ray`], or `None` on overflow or a zero rate
    pub fn checked_div_ray(self, rate: Ray) -> Option<Wad> {
        self.0.checked_div(rate.0).map(Wad::new)
    }

    /// `self / denominator` as a high-precision ratio
    pub fn ratio(self, denominator: Wad) -> Ray {
        Ray::new(self.0 / denominator.0)
    }

    /// `self * numerator / denominator` rounded toward zero.
    ///
    /// Proportional splits use this so no part ever exceeds its exact share.
    pub fn mul_div_down(self, numerator: Wad, denominator: Wad) -> Wad {
        Wad((self.0 * numerator.0 / denominator.0).round_dp_with_strategy(
            WAD_DECIMALS,
            RoundingStrategy::ToZero,
        ))
    }

    pub fn to_ray(self) -> Ray {
        Ray::new(self.0)
    }
}

impl Ray {
    pub const ZERO: Ray = Ray(Decimal::ZERO);
    pub const ONE: Ray = Ray(Decimal::ONE);

    /// Quantize a decimal into a rate
    pub fn new(value: Decimal) -> Self {
        Ray(quantize(value, RAY_DECIMALS))
    }

    /// `numerator / denominator` as a rate
    pub fn from_ratio(numerator: Decimal, denominator: Decimal) -> Self {
        Ray::new(numerator / denominator)
    }

    #[inline]
    pub fn raw(self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn ray_mul(self, other: Ray) -> Ray {
        Ray::new(self.0 * other.0)
    }

    pub fn ray_div(self, other: Ray) -> Ray {
        Ray::new(self.0 / other.0)
    }

    /// Real-valued power, used for compounding over fractional years
    pub fn powd(self, exponent: Decimal) -> Ray {
        Ray::new(self.0.powd(exponent))
    }

    pub fn to_wad(self) -> Wad {
        Wad::new(self.0)
    }
}

/// Interest earned by `principal` at `annual_rate` over `elapsed` seconds.
///
/// `principal * annual_rate * elapsed / SECONDS_PER_YEAR`, rounded once.
/// Non-positive elapsed time earns nothing.
pub fn simple_interest(principal: Wad, annual_rate: Ray, elapsed: i64) -> Wad {
    if elapsed <= 0 {
        return Wad::ZERO;
    }
    Wad::new(
        principal.0 * annual_rate.0 * Decimal::from(elapsed) / Decimal::from(SECONDS_PER_YEAR),
    )
}

impl From<Decimal> for Wad {
    fn from(value: Decimal) -> Self {
        Wad::new(value)
    }
}

impl From<Wad> for Decimal {
    fn from(value: Wad) -> Self {
        value.0
    }
}

impl From<Decimal> for Ray {
    fn from(value: Decimal) -> Self {
        Ray::new(value)
    }
}

impl From<Ray> for Decimal {
    fn from(value: Ray) -> Self {
        value.0
    }
}

impl Add for Wad {
    type Output = Wad;
    fn add(self, rhs: Wad) -> Wad {
        Wad(self.0 + rhs.0)
    }
}

impl Sub for Wad {
    type Output = Wad;
    fn sub(self, rhs: Wad) -> Wad {
        Wad(self.0 - rhs.0)
    }
}

impl Neg for Wad {
    type Output = Wad;
    fn neg(self) -> Wad {
        Wad(-self.0)
    }
}

impl AddAssign for Wad {
    fn add_assign(&mut self, rhs: Wad) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Wad {
    fn sub_assign(&mut self, rhs: Wad) {
        self.0 -= rhs.0;
    }
}

impl Sum for Wad {
    fn sum<I: Iterator<Item = Wad>>(iter: I) -> Wad {
        iter.fold(Wad::ZERO, |acc, w| acc + w)
    }
}

impl<'a> Sum<&'a Wad> for Wad {
    fn sum<I: Iterator<Item = &'a Wad>>(iter: I) -> Wad {
        iter.fold(Wad::ZERO, |acc, w| acc + *w)
    }
}

impl Add for Ray {
    type Output = Ray;
    fn add(self, rhs: Ray) -> Ray {
        Ray(self.0 + rhs.0)
    }
}

impl Sub for Ray {
    type Output = Ray;
    fn sub(self, rhs: Ray) -> Ray {
        Ray(self.0 - rhs.0)
    }
}

impl Neg for Ray {
    type Output = Ray;
    fn neg(self) -> Ray {
        Ray(-self.0)
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl fmt::Display for Ray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}
