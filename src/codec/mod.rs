//! Fixed-point codec for NUMERIC/DECIMAL columns.
//!
//! | Piece | Module |
//! |-------|--------|
//! | Exact decimal value | `decimal` |
//! | Scaled integer, wire width, encode/decode | `wire` |
//!
//! Values supplied with more fractional digits than the column's scale are
//! rounded half-up by [`encode`]; [`decode`] never rounds.

mod decimal;
mod wire;

pub use decimal::{ScaledDecimal, MAX_DIGITS, MAX_EXPONENT};
pub use wire::{decode, encode, ScaledInteger, WireWidth};
