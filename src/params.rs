//! Session parameters.

use crate::dialect::Dialect;
use crate::error::{Error, Result};

/// Session parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    /// SQL dialect of the session.
    pub dialect: Dialect,
    /// Whether each statement commits on its own.
    pub autocommit: bool,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionParams {
    /// Create parameters with the defaults: dialect 3, autocommit on.
    pub fn new() -> Self {
        Self {
            dialect: Dialect::Standard,
            autocommit: true,
        }
    }

    /// Set the SQL dialect.
    ///
    /// # Example
    ///
    /// ```
    /// use fb_updatable_rs::{Dialect, SessionParams};
    ///
    /// let params = SessionParams::new().with_dialect(Dialect::Legacy);
    /// assert_eq!(params.dialect.number(), 1);
    /// ```
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// Parse a property string like "sql_dialect=1;autocommit=false".
    ///
    /// Keys are case-insensitive; unspecified keys keep their defaults.
    pub fn parse(props: &str) -> Result<Self> {
        let mut params = Self::new();

        for entry in props.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| Error::InvalidParams {
                    message: format!("Expected key=value, got {:?}", entry),
                })?;
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "sql_dialect" | "dialect" => {
                    let number = value.parse::<u16>().map_err(|_| Error::InvalidParams {
                        message: format!("Invalid dialect: {}", value),
                    })?;
                    params.dialect = Dialect::from_number(number)?;
                }
                "autocommit" => {
                    params.autocommit = match value.to_ascii_lowercase().as_str() {
                        "true" | "1" | "on" | "yes" => true,
                        "false" | "0" | "off" | "no" => false,
                        _ => {
                            return Err(Error::InvalidParams {
                                message: format!("Invalid autocommit value: {}", value),
                            })
                        }
                    };
                }
                other => {
                    return Err(Error::InvalidParams {
                        message: format!("Unknown parameter: {}", other),
                    })
                }
            }
        }

        Ok(params)
    }
}
