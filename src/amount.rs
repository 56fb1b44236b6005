//! # Fixed-precision amounts
//!
//! [`Amount`] wraps a [`rust_decimal::Decimal`] and keeps it truncated toward
//! zero to [`DEFAULT_PRECISION`] fractional digits. Every constructor and every
//! arithmetic operation truncates its result, so precision loss is always a
//! deterministic round-down and never floating-point drift.
//!
//! ```rust
//! use bitbanker_sdk::amount::Amount;
//!
//! let price: Amount = "0.1234567890123456".parse().unwrap();
//! assert_eq!(price.to_string(), "0.123456789012");
//!
//! let total = price.multiply(3).unwrap();
//! assert_eq!(total.to_string(), "0.370370367036");
//! ```
//!
//! [`AmountConstraints`] carries the optional bounds (`gt`, `ge`, `lt`, `le`,
//! `max_digits`, `decimal_places`, `multiple_of`) used when an amount field of
//! a request must satisfy a range.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of fractional digits every [`Amount`] is truncated to.
pub const DEFAULT_PRECISION: u32 = 12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AmountError {
    #[error("Invalid amount: {0:?}")]
    Invalid(String),
    #[error("Amount is not a finite number: {0}")]
    NotFinite(f64),
    #[error("Amount {0} overflowed")]
    Overflow(&'static str),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Rounding is not available for an amount without a context")]
    MissingContext,
}

/// Exchange/market pair an amount is rounded for.
///
/// The identifiers are carried for callers that track them; rounding itself
/// does not depend on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    pub exchange_id: i64,
    pub market_id: i64,
}

impl Context {
    pub fn new(exchange_id: i64, market_id: i64) -> Self {
        Self {
            exchange_id,
            market_id,
        }
    }
}

/// Semantic label for a rounding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionKind {
    Amount,
    Price,
    Cost,
}

impl PrecisionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PrecisionKind::Amount => "amount",
            PrecisionKind::Price => "price",
            PrecisionKind::Cost => "cost",
        }
    }

    /// Fractional digits kept when rounding a value of this kind.
    pub fn precision(self) -> u32 {
        match self {
            PrecisionKind::Amount | PrecisionKind::Price | PrecisionKind::Cost => DEFAULT_PRECISION,
        }
    }
}

/// Decimal value truncated to [`DEFAULT_PRECISION`] fractional digits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

fn truncate(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::ToZero)
}

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Amount(truncate(value, DEFAULT_PRECISION))
    }

    /// The underlying decimal, already truncated.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_sign_negative(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }

    /// Plain floating-point form used on the wire.
    pub fn to_f64(&self) -> f64 {
        // Parsing the rendered literal gives the nearest float; the direct
        // conversion is only a fallback.
        self.to_string()
            .parse()
            .ok()
            .or_else(|| ToPrimitive::to_f64(&self.0))
            .unwrap_or(f64::NAN)
    }

    /// Adds `other` after coercing it to an `Amount`.
    ///
    /// # Errors
    ///
    /// Returns an error if `other` cannot be coerced or the sum overflows.
    pub fn add(&self, other: impl IntoAmount) -> Result<Amount, AmountError> {
        let other = other.into_amount()?;
        self.0
            .checked_add(other.0)
            .map(Amount::new)
            .ok_or(AmountError::Overflow("addition"))
    }

    /// Subtracts `other` after coercing it to an `Amount`.
    ///
    /// # Errors
    ///
    /// Returns an error if `other` cannot be coerced or the difference overflows.
    pub fn subtract(&self, other: impl IntoAmount) -> Result<Amount, AmountError> {
        let other = other.into_amount()?;
        self.0
            .checked_sub(other.0)
            .map(Amount::new)
            .ok_or(AmountError::Overflow("subtraction"))
    }

    /// Multiplies by `other`, truncating the product.
    ///
    /// # Errors
    ///
    /// Returns an error if `other` cannot be coerced or the product overflows.
    pub fn multiply(&self, other: impl IntoAmount) -> Result<Amount, AmountError> {
        let other = other.into_amount()?;
        self.0
            .checked_mul(other.0)
            .map(Amount::new)
            .ok_or(AmountError::Overflow("multiplication"))
    }

    /// Divides by `other`, truncating the quotient.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::DivisionByZero`] when `other` is zero.
    pub fn divide(&self, other: impl IntoAmount) -> Result<Amount, AmountError> {
        let other = other.into_amount()?;
        if other.is_zero() {
            return Err(AmountError::DivisionByZero);
        }
        self.0
            .checked_div(other.0)
            .map(Amount::new)
            .ok_or(AmountError::Overflow("division"))
    }

    /// Compares against `other` after coercing it to an `Amount`.
    ///
    /// # Errors
    ///
    /// Returns an error if `other` cannot be coerced.
    pub fn compare(&self, other: impl IntoAmount) -> Result<Ordering, AmountError> {
        let other = other.into_amount()?;
        Ok(self.0.cmp(&other.0))
    }

    pub fn negate(&self) -> Amount {
        Amount::new(-self.0)
    }

    /// Truncates to `precision` fractional digits (never more than
    /// [`DEFAULT_PRECISION`]).
    pub fn round(&self, precision: u32) -> Amount {
        Amount(truncate(self.0, precision.min(DEFAULT_PRECISION)))
    }

    /// Rounds for a given market context.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::MissingContext`] when `ctx` is `None`.
    pub fn round_with_context(
        &self,
        ctx: Option<&Context>,
        kind: PrecisionKind,
    ) -> Result<Amount, AmountError> {
        match ctx {
            Some(ctx) => Ok(self.round_for(ctx, kind)),
            None => Err(AmountError::MissingContext),
        }
    }

    pub fn round_amount(&self, ctx: &Context) -> Amount {
        self.round_for(ctx, PrecisionKind::Amount)
    }

    pub fn round_price(&self, ctx: &Context) -> Amount {
        self.round_for(ctx, PrecisionKind::Price)
    }

    pub fn round_cost(&self, ctx: &Context) -> Amount {
        self.round_for(ctx, PrecisionKind::Cost)
    }

    fn round_for(&self, _ctx: &Context, kind: PrecisionKind) -> Amount {
        self.round(kind.precision())
    }

    /// Number of significant digits and of fractional digits, ignoring
    /// trailing zeros.
    fn digit_counts(&self) -> (u32, u32) {
        let normalized = self.0.normalize();
        let scale = normalized.scale();
        let mantissa = normalized.mantissa().unsigned_abs();
        let significant = if mantissa == 0 {
            1
        } else {
            mantissa.ilog10() + 1
        };
        if scale == 0 {
            (significant, 0)
        } else if scale > significant {
            (scale, scale)
        } else {
            (significant, scale)
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_zero() {
            return f.write_str("0");
        }
        fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount(\"{self}\")")
    }
}

/// Integer digits beyond this cannot fit a `Decimal` mantissa.
const MAX_INTEGER_DIGITS: usize = 29;

/// Rewrites a decimal literal, optionally in scientific notation, as a plain
/// literal keeping at most `precision` fractional digits. Dropped digits are
/// discarded, never rounded.
fn truncate_literal(literal: &str, precision: u32) -> Result<String, AmountError> {
    let invalid = || AmountError::Invalid(literal.to_string());

    let (sign, unsigned) = match literal.as_bytes().first() {
        Some(b'-') => ("-", &literal[1..]),
        Some(b'+') => ("", &literal[1..]),
        _ => ("", literal),
    };
    let (mantissa, exponent) = match unsigned.find(|c: char| c == 'e' || c == 'E') {
        Some(at) => (
            &unsigned[..at],
            unsigned[at + 1..].parse::<i64>().map_err(|_| invalid())?,
        ),
        None => (unsigned, 0),
    };
    let (int_digits, frac_digits) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_digits.is_empty() && frac_digits.is_empty() {
        return Err(invalid());
    }
    if !int_digits
        .bytes()
        .chain(frac_digits.bytes())
        .all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let digits = format!("{int_digits}{frac_digits}");
    let digits = digits.trim_start_matches('0');
    let leading_zeros = int_digits.len() + frac_digits.len() - digits.len();
    if digits.is_empty() {
        return Ok("0".to_string());
    }

    // Position of the decimal point relative to the first significant digit.
    let point = i64::try_from(int_digits.len())
        .ok()
        .and_then(|len| len.checked_sub(i64::try_from(leading_zeros).ok()?))
        .and_then(|len| len.checked_add(exponent))
        .ok_or(AmountError::Overflow("parsing"))?;
    let precision = i64::from(precision);
    if point <= -precision {
        return Ok("0".to_string());
    }
    if point > MAX_INTEGER_DIGITS as i64 {
        return Err(AmountError::Overflow("parsing"));
    }

    let (int_part, frac_part) = if point <= 0 {
        let zeros = "0".repeat(usize::try_from(-point).unwrap_or_default());
        ("0".to_string(), format!("{zeros}{digits}"))
    } else {
        let point = usize::try_from(point).unwrap_or_default();
        if point >= digits.len() {
            (format!("{digits}{}", "0".repeat(point - digits.len())), String::new())
        } else {
            (digits[..point].to_string(), digits[point..].to_string())
        }
    };
    let kept = usize::try_from(precision).unwrap_or_default().min(frac_part.len());
    if kept == 0 {
        Ok(format!("{sign}{int_part}"))
    } else {
        Ok(format!("{sign}{int_part}.{}", &frac_part[..kept]))
    }
}

/// Parses a plain literal, dropping trailing fractional digits until the
/// value fits a `Decimal` exactly.
fn parse_exact(plain: &str) -> Result<Decimal, AmountError> {
    let mut candidate = plain;
    loop {
        match Decimal::from_str_exact(candidate) {
            Ok(value) => return Ok(value),
            Err(_) if candidate.contains('.') => {
                candidate = candidate[..candidate.len() - 1].trim_end_matches('.');
            }
            Err(_) => return Err(AmountError::Overflow("parsing")),
        }
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Accepts plain and scientific decimal literals of any length. Digits
    /// past [`DEFAULT_PRECISION`] are cut off before the value is built, so
    /// long inputs are never rounded up.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let plain = truncate_literal(s.trim(), DEFAULT_PRECISION).map_err(|e| match e {
            AmountError::Invalid(_) => AmountError::Invalid(s.to_string()),
            other => other,
        })?;
        parse_exact(&plain).map(Amount::new)
    }
}

impl TryFrom<f64> for Amount {
    type Error = AmountError;

    /// Goes through the shortest decimal rendering of `value` so binary
    /// artifacts such as `0.1 + 0.2` do not leak into the amount.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(AmountError::NotFinite(value));
        }
        value.to_string().parse()
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Amount {
                fn from(value: $ty) -> Self {
                    Amount::new(Decimal::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64);

/// Coercion of an operand into an [`Amount`] before arithmetic or comparison.
pub trait IntoAmount {
    fn into_amount(self) -> Result<Amount, AmountError>;
}

impl IntoAmount for Amount {
    fn into_amount(self) -> Result<Amount, AmountError> {
        Ok(self)
    }
}

impl IntoAmount for &Amount {
    fn into_amount(self) -> Result<Amount, AmountError> {
        Ok(*self)
    }
}

impl IntoAmount for Decimal {
    fn into_amount(self) -> Result<Amount, AmountError> {
        Ok(Amount::new(self))
    }
}

impl IntoAmount for f64 {
    fn into_amount(self) -> Result<Amount, AmountError> {
        Amount::try_from(self)
    }
}

impl IntoAmount for &str {
    fn into_amount(self) -> Result<Amount, AmountError> {
        self.parse()
    }
}

impl IntoAmount for String {
    fn into_amount(self) -> Result<Amount, AmountError> {
        self.parse()
    }
}

macro_rules! impl_into_amount_integer {
    ($($ty:ty),*) => {
        $(
            impl IntoAmount for $ty {
                fn into_amount(self) -> Result<Amount, AmountError> {
                    Ok(Amount::from(self))
                }
            }
        )*
    };
}

impl_into_amount_integer!(i32, i64, u32, u64);

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a number or a numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Amount::try_from(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

/// A bound an [`Amount`] failed to satisfy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    #[error("ensure this value is greater than {limit}")]
    GreaterThan { limit: Amount },
    #[error("ensure this value is greater than or equal to {limit}")]
    GreaterThanOrEqual { limit: Amount },
    #[error("ensure this value is less than {limit}")]
    LessThan { limit: Amount },
    #[error("ensure this value is less than or equal to {limit}")]
    LessThanOrEqual { limit: Amount },
    #[error("ensure this value is a multiple of {multiple_of}")]
    MultipleOf { multiple_of: Amount },
    #[error("ensure that there are no more than {max_digits} digits in total")]
    MaxDigits { max_digits: u32 },
    #[error("ensure that there are no more than {decimal_places} decimal places")]
    DecimalPlaces { decimal_places: u32 },
    #[error("ensure that there are no more than {whole_digits} digits before the decimal point")]
    WholeDigits { whole_digits: u32 },
}

impl ConstraintViolation {
    /// Name of the violated constraint.
    pub fn constraint(&self) -> &'static str {
        match self {
            ConstraintViolation::GreaterThan { .. } => "gt",
            ConstraintViolation::GreaterThanOrEqual { .. } => "ge",
            ConstraintViolation::LessThan { .. } => "lt",
            ConstraintViolation::LessThanOrEqual { .. } => "le",
            ConstraintViolation::MultipleOf { .. } => "multiple_of",
            ConstraintViolation::MaxDigits { .. } | ConstraintViolation::WholeDigits { .. } => {
                "max_digits"
            }
            ConstraintViolation::DecimalPlaces { .. } => "decimal_places",
        }
    }
}

/// Optional bounds checked by [`AmountConstraints::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmountConstraints {
    pub gt: Option<Amount>,
    pub ge: Option<Amount>,
    pub lt: Option<Amount>,
    pub le: Option<Amount>,
    pub max_digits: Option<u32>,
    pub decimal_places: Option<u32>,
    pub multiple_of: Option<Amount>,
}

impl AmountConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gt(mut self, limit: Amount) -> Self {
        self.gt = Some(limit);
        self
    }

    pub fn ge(mut self, limit: Amount) -> Self {
        self.ge = Some(limit);
        self
    }

    pub fn lt(mut self, limit: Amount) -> Self {
        self.lt = Some(limit);
        self
    }

    pub fn le(mut self, limit: Amount) -> Self {
        self.le = Some(limit);
        self
    }

    pub fn max_digits(mut self, max_digits: u32) -> Self {
        self.max_digits = Some(max_digits);
        self
    }

    pub fn decimal_places(mut self, decimal_places: u32) -> Self {
        self.decimal_places = Some(decimal_places);
        self
    }

    pub fn multiple_of(mut self, multiple_of: Amount) -> Self {
        self.multiple_of = Some(multiple_of);
        self
    }

    /// Checks `amount` against every configured bound.
    ///
    /// Range bounds are checked first, then `multiple_of`, then the digit
    /// limits; the first violation found is returned.
    pub fn validate(&self, amount: Amount) -> Result<Amount, ConstraintViolation> {
        if let Some(limit) = self.gt {
            if amount <= limit {
                return Err(ConstraintViolation::GreaterThan { limit });
            }
        }
        if let Some(limit) = self.ge {
            if amount < limit {
                return Err(ConstraintViolation::GreaterThanOrEqual { limit });
            }
        }
        if let Some(limit) = self.lt {
            if amount >= limit {
                return Err(ConstraintViolation::LessThan { limit });
            }
        }
        if let Some(limit) = self.le {
            if amount > limit {
                return Err(ConstraintViolation::LessThanOrEqual { limit });
            }
        }
        if let Some(multiple_of) = self.multiple_of {
            let is_multiple = amount
                .0
                .checked_rem(multiple_of.0)
                .map_or(false, |rem| rem.is_zero());
            if !is_multiple {
                return Err(ConstraintViolation::MultipleOf { multiple_of });
            }
        }

        let (digits, decimals) = amount.digit_counts();
        if let Some(max_digits) = self.max_digits {
            if digits > max_digits {
                return Err(ConstraintViolation::MaxDigits { max_digits });
            }
        }
        if let Some(decimal_places) = self.decimal_places {
            if decimals > decimal_places {
                return Err(ConstraintViolation::DecimalPlaces { decimal_places });
            }
        }
        if let (Some(max_digits), Some(decimal_places)) = (self.max_digits, self.decimal_places) {
            let whole_digits = max_digits.saturating_sub(decimal_places);
            if digits - decimals > whole_digits {
                return Err(ConstraintViolation::WholeDigits { whole_digits });
            }
        }

        Ok(amount)
    }
}
