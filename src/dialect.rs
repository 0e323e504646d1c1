//! SQL dialect policy.
//!
//! Dialect 1 (legacy) has no delimited identifiers: a double-quoted token is
//! a string literal, and bare identifiers are matched case-insensitively.
//! Dialect 3 (standard) treats double-quoted tokens as identifiers, which
//! preserves case and allows non-standard characters. Every statement this
//! crate emits asks this module how to write an identifier or a numeric
//! literal; no other module decides quoting on its own.

use std::fmt;

use crate::codec::ScaledDecimal;
use crate::error::{Error, Result};

/// Active SQL dialect of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Dialect 1.
    Legacy,
    /// Dialect 3.
    Standard,
}

/// Rules attached to a dialect.
#[derive(Debug)]
pub struct DialectPolicy {
    /// Dialect number as used in connection properties.
    pub number: u16,
    /// Whether identifiers are wrapped in delimiters.
    pub quote_identifiers: bool,
    /// Whether a decimal literal such as `1.5` denotes an exact NUMERIC.
    /// When false, such literals are double precision and exact values must
    /// be written with an explicit CAST.
    pub exact_decimal_literals: bool,
}

const LEGACY: DialectPolicy = DialectPolicy {
    number: 1,
    quote_identifiers: false,
    exact_decimal_literals: false,
};

const STANDARD: DialectPolicy = DialectPolicy {
    number: 3,
    quote_identifiers: true,
    exact_decimal_literals: true,
};

impl Dialect {
    /// Look up a dialect by number.
    pub fn from_number(number: u16) -> Result<Self> {
        [Dialect::Legacy, Dialect::Standard]
            .into_iter()
            .find(|d| d.policy().number == number)
            .ok_or(Error::UnsupportedDialect { dialect: number })
    }

    /// The policy table entry for this dialect.
    pub fn policy(self) -> &'static DialectPolicy {
        match self {
            Dialect::Legacy => &LEGACY,
            Dialect::Standard => &STANDARD,
        }
    }

    pub fn number(self) -> u16 {
        self.policy().number
    }

    pub fn should_quote(self) -> bool {
        self.policy().quote_identifiers
    }

    /// Write an identifier for this dialect.
    pub fn quote(self, identifier: &str) -> String {
        if self.should_quote() {
            format!("\"{}\"", identifier.replace('"', "\"\""))
        } else {
            identifier.to_string()
        }
    }

    /// Write an exact numeric literal for a `NUMERIC(precision, scale)` column.
    pub fn numeric_literal(self, value: &ScaledDecimal, precision: u8, scale: u8) -> String {
        if value.scale() == 0 || self.policy().exact_decimal_literals {
            value.to_string()
        } else {
            format!("CAST({} AS NUMERIC({},{}))", value, precision, scale)
        }
    }

    /// Write a string literal. Single quotes delimit strings in every dialect.
    pub fn string_literal(self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dialect {}", self.number())
    }
}
