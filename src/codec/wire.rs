//! Scaled integer wire form for NUMERIC/DECIMAL columns.
//!
//! The server stores a `NUMERIC(p, s)` as a plain integer holding
//! `value * 10^s`. The integer width follows from the precision:
//!
//! | Precision | Width |
//! |-----------|-------|
//! | 1-4       | 16 bit |
//! | 5-9       | 32 bit |
//! | 10-18, unspecified | 64 bit |
//! | 19-38     | 128 bit |
//!
//! On the wire the integer is big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_traits::ToPrimitive;

use super::decimal::{ScaledDecimal, MAX_DIGITS};
use crate::error::{Error, Result};

/// Integer width carrying a scaled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireWidth {
    Int16,
    Int32,
    Int64,
    Int128,
}

impl WireWidth {
    /// Width implied by a declared precision (0 means unspecified).
    pub fn for_precision(precision: u8) -> Self {
        match precision {
            1..=4 => WireWidth::Int16,
            5..=9 => WireWidth::Int32,
            0 | 10..=18 => WireWidth::Int64,
            _ => WireWidth::Int128,
        }
    }

    /// Size in bytes.
    pub fn byte_len(self) -> usize {
        match self {
            WireWidth::Int16 => 2,
            WireWidth::Int32 => 4,
            WireWidth::Int64 => 8,
            WireWidth::Int128 => 16,
        }
    }

    /// Whether `value` is representable at this width.
    pub fn fits(self, value: i128) -> bool {
        match self {
            WireWidth::Int16 => i16::try_from(value).is_ok(),
            WireWidth::Int32 => i32::try_from(value).is_ok(),
            WireWidth::Int64 => i64::try_from(value).is_ok(),
            WireWidth::Int128 => true,
        }
    }
}

/// A rescaled value ready for the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledInteger {
    unscaled: i128,
    scale: u32,
    width: WireWidth,
}

impl ScaledInteger {
    /// Create a scaled integer, checking that it fits `width`.
    pub fn new(unscaled: i128, scale: u32, width: WireWidth) -> Result<Self> {
        if !width.fits(unscaled) {
            return Err(Error::Overflow {
                column: None,
                value: ScaledDecimal::new(unscaled, scale).to_string(),
                target: format!("{:?}", width),
            });
        }
        Ok(Self {
            unscaled,
            scale,
            width,
        })
    }

    pub fn unscaled(&self) -> i128 {
        self.unscaled
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn width(&self) -> WireWidth {
        self.width
    }

    /// Big-endian fixed-width encoding.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.width.byte_len());
        // Range was checked in `new`.
        match self.width {
            WireWidth::Int16 => buf.put_i16(self.unscaled as i16),
            WireWidth::Int32 => buf.put_i32(self.unscaled as i32),
            WireWidth::Int64 => buf.put_i64(self.unscaled as i64),
            WireWidth::Int128 => buf.put_i128(self.unscaled),
        }
        buf.freeze()
    }

    /// Read a value of a `NUMERIC(precision, scale)` column from the wire.
    #[track_caller]
    pub fn from_wire(mut data: &[u8], precision: u8, scale: u32) -> Result<Self> {
        let width = WireWidth::for_precision(precision);
        if data.len() < width.byte_len() {
            return Err(Error::BufferTooSmall {
                needed: width.byte_len(),
                available: data.len(),
                location: std::panic::Location::caller(),
            });
        }
        let unscaled = match width {
            WireWidth::Int16 => i128::from(data.get_i16()),
            WireWidth::Int32 => i128::from(data.get_i32()),
            WireWidth::Int64 => i128::from(data.get_i64()),
            WireWidth::Int128 => data.get_i128(),
        };
        Ok(Self {
            unscaled,
            scale,
            width,
        })
    }
}

fn overflow(value: &ScaledDecimal, precision: u8, scale: u32) -> Error {
    Error::Overflow {
        column: None,
        value: value.to_string(),
        target: format!("NUMERIC({},{})", precision, scale),
    }
}

/// Encode `value` for a `NUMERIC(precision, scale)` column.
///
/// This is the only place a fixed-point value is rounded. The input may
/// carry any number of digits; only the rounded result has to fit the
/// precision and the wire width.
pub fn encode(value: &ScaledDecimal, precision: u8, scale: u32) -> Result<ScaledInteger> {
    let rescaled = value.rescale(scale);

    let limit = if precision == 0 {
        MAX_DIGITS
    } else {
        u32::from(precision)
    };
    if rescaled.digits() > limit {
        return Err(overflow(value, precision, scale));
    }

    let unscaled = rescaled
        .unscaled()
        .to_i128()
        .ok_or_else(|| overflow(value, precision, scale))?;
    ScaledInteger::new(unscaled, scale, WireWidth::for_precision(precision))
        .map_err(|_| overflow(value, precision, scale))
}

/// Decode a scaled integer. Exact.
pub fn decode(raw: &ScaledInteger) -> ScaledDecimal {
    ScaledDecimal::new(raw.unscaled, raw.scale)
}
