//! Instrument symbols.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::SymbolError;

/// An upper-case instrument identifier such as `EURUSD`.
///
/// Symbols are opaque to the pipeline; the only rule enforced is that they
/// consist of ASCII letters and digits, since they are embedded verbatim in
/// request URLs and checkpoint file names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Creates a symbol, upper-casing the input.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol is empty or contains characters other
    /// than ASCII letters and digits.
    pub fn new(symbol: impl AsRef<str>) -> Result<Self, SymbolError> {
        let upper = symbol.as_ref().trim().to_ascii_uppercase();
        if upper.is_empty() {
            return Err(SymbolError::Empty);
        }
        if !upper.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            return Err(SymbolError::InvalidFormat(symbol.as_ref().to_string()));
        }
        Ok(Self(upper))
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_uppercases() {
        let symbol = Symbol::new("eurusd").unwrap();
        assert_eq!(symbol.as_str(), "EURUSD");
    }

    #[test]
    fn test_symbol_rejects_separators() {
        assert!(matches!(
            Symbol::new("EUR/USD"),
            Err(SymbolError::InvalidFormat(_))
        ));
        assert_eq!(Symbol::new("  "), Err(SymbolError::Empty));
    }

    #[test]
    fn test_symbol_serde() {
        let symbol: Symbol = serde_json::from_str("\"xauusd\"").unwrap();
        assert_eq!(symbol.as_str(), "XAUUSD");
        assert!(serde_json::from_str::<Symbol>("\"bad-symbol\"").is_err());
    }
}
