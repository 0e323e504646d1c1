//! Exact decimal values.
//!
//! A `ScaledDecimal` is an arbitrary-precision unscaled integer plus a count
//! of fractional digits: `34.01` is `(3401, 2)`. The sign lives in the
//! unscaled integer. Values are never limited or rounded here; a value only
//! has to fit once it is encoded for a column.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Widest NUMERIC precision the server supports.
pub const MAX_DIGITS: u32 = 38;

/// Largest decimal exponent accepted in `1.5e2` notation.
pub const MAX_EXPONENT: u32 = 4096;

/// Exact decimal value `unscaled / 10^scale`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScaledDecimal {
    unscaled: BigInt,
    scale: u32,
}

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

impl ScaledDecimal {
    /// Create a value from its unscaled integer and scale.
    pub fn new(unscaled: impl Into<BigInt>, scale: u32) -> Self {
        Self {
            unscaled: unscaled.into(),
            scale,
        }
    }

    /// Zero with scale 0.
    pub fn zero() -> Self {
        Self::new(0, 0)
    }

    /// The unscaled integer.
    pub fn unscaled(&self) -> &BigInt {
        &self.unscaled
    }

    /// Number of fractional digits.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.unscaled.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.unscaled.is_negative()
    }

    /// Number of significant digits in the unscaled integer (zero counts as one).
    pub fn digits(&self) -> u32 {
        self.unscaled.magnitude().to_string().len() as u32
    }

    /// Rescale to `target` fractional digits.
    ///
    /// Increasing the scale pads with zeros. Reducing it rounds half-up: a
    /// discarded part of exactly one half moves away from zero.
    pub fn rescale(&self, target: u32) -> Self {
        if target >= self.scale {
            return Self::new(&self.unscaled * pow10(target - self.scale), target);
        }

        let discarded = self.scale - target;
        if discarded > self.digits() {
            // The whole value is below one half of the last kept digit.
            return Self::new(0, target);
        }
        let divisor = pow10(discarded);
        let quotient = &self.unscaled / &divisor;
        let remainder = (&self.unscaled % &divisor).abs();
        let rounded = if remainder * 2u32 >= divisor {
            quotient + self.unscaled.signum()
        } else {
            quotient
        };
        Self::new(rounded, target)
    }

    /// Lossy conversion to f64.
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }

    /// Compare by numeric value regardless of scale.
    pub fn same_value(&self, other: &ScaledDecimal) -> bool {
        let scale = self.scale.max(other.scale);
        self.rescale(scale).unscaled == other.rescale(scale).unscaled
    }

    /// Convert to i64 when the value is integral.
    pub fn to_i64(&self) -> Option<i64> {
        let divisor = pow10(self.scale);
        if !(&self.unscaled % &divisor).is_zero() {
            return None;
        }
        (&self.unscaled / &divisor).to_i64()
    }
}

impl fmt::Display for ScaledDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.unscaled);
        }

        let digits = self.unscaled.magnitude().to_string();
        let scale = self.scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);

        if self.is_negative() {
            f.write_str("-")?;
        }
        write!(f, "{}.{}", int_part, frac_part)
    }
}

impl FromStr for ScaledDecimal {
    type Err = Error;

    /// Parse `[-+]digits[.digits][e[-+]digits]`. Any number of digits is kept.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidDecimal {
            input: s.to_string(),
        };
        let text = s.trim();

        let (mantissa, exponent) = match text.find(|c: char| c == 'e' || c == 'E') {
            Some(pos) => {
                let exp: i64 = text[pos + 1..].parse().map_err(|_| invalid())?;
                if exp.unsigned_abs() > u64::from(MAX_EXPONENT) {
                    return Err(invalid());
                }
                (&text[..pos], exp)
            }
            None => (text, 0),
        };

        let (negative, mantissa) = match mantissa.as_bytes().first() {
            Some(b'-') => (true, &mantissa[1..]),
            Some(b'+') => (false, &mantissa[1..]),
            _ => (false, mantissa),
        };

        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part
            .bytes()
            .chain(frac_part.bytes())
            .all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let digits = format!("{}{}", int_part, frac_part);
        let mut unscaled = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(invalid)?;
        if negative {
            unscaled = -unscaled;
        }

        let scale = frac_part.len() as i64 - exponent;
        if scale >= 0 {
            let scale = u32::try_from(scale).map_err(|_| invalid())?;
            Ok(Self::new(unscaled, scale))
        } else {
            let shift = u32::try_from(-scale).map_err(|_| invalid())?;
            Ok(Self::new(unscaled * pow10(shift), 0))
        }
    }
}

impl From<i64> for ScaledDecimal {
    fn from(value: i64) -> Self {
        Self::new(value, 0)
    }
}

impl From<i32> for ScaledDecimal {
    fn from(value: i32) -> Self {
        Self::new(value, 0)
    }
}

impl From<Decimal> for ScaledDecimal {
    fn from(value: Decimal) -> Self {
        Self::new(value.mantissa(), value.scale())
    }
}

impl TryFrom<ScaledDecimal> for Decimal {
    type Error = Error;

    fn try_from(value: ScaledDecimal) -> Result<Self> {
        value
            .unscaled
            .to_i128()
            .and_then(|unscaled| Decimal::try_from_i128_with_scale(unscaled, value.scale).ok())
            .ok_or_else(|| Error::Overflow {
                column: None,
                value: value.to_string(),
                target: "rust_decimal::Decimal".to_string(),
            })
    }
}
