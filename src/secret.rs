//! A string wrapper for passwords that keeps them out of logs and wipes
//! them from memory on drop.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Password or other credential collected from the operator.
///
/// `Debug` and `Display` never print the value. Call [`Secret::expose`] at the
/// single point where the value is handed to an external program. The
/// buffer is zeroed when the secret is dropped.
#[derive(Clone, Default, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Wraps `value`, trimming surrounding whitespace.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let mut raw: String = value.into();
        let trimmed = raw.trim().to_owned();
        raw.zeroize();
        Self(trimmed)
    }

    /// Returns the wrapped value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the secret is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("[REDACTED]")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
