//! Instrument metadata.

use serde::{Deserialize, Serialize};

/// Market category, which determines the trading calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Foreign exchange currency pairs.
    #[default]
    Forex,
    /// Cryptocurrencies.
    Crypto,
    /// Stock indices.
    Index,
    /// Individual stocks.
    Stock,
    /// Commodities (metals, energy, agriculture).
    Commodity,
    /// Exchange-traded funds.
    Etf,
    /// Government bonds.
    Bond,
}

impl Category {
    /// Returns the category as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Forex => "forex",
            Self::Crypto => "crypto",
            Self::Index => "index",
            Self::Stock => "stock",
            Self::Commodity => "commodity",
            Self::Etf => "etf",
            Self::Bond => "bond",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tradable instrument and the precision its prices are quoted at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Upper-case identifier (e.g. "EURUSD").
    id: String,
    /// Human-readable name (e.g. "EUR/USD").
    name: String,
    /// Market category.
    category: Category,
    /// Raw price points per unit, always a power of ten.
    decimal_factor: u32,
}

impl Instrument {
    /// Creates a new instrument.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        decimal_factor: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            decimal_factor,
        }
    }

    /// Returns the instrument identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the market category.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Returns the decimal factor used to scale raw prices.
    #[must_use]
    pub const fn decimal_factor(&self) -> u32 {
        self.decimal_factor
    }

    /// Returns the number of decimal places prices are quoted at.
    ///
    /// A decimal factor of 100 000 gives a scale of 5. Factors that are not a
    /// power of ten round down.
    #[must_use]
    pub const fn price_scale(&self) -> u32 {
        match self.decimal_factor.checked_ilog10() {
            Some(scale) => scale,
            None => 0,
        }
    }

    /// Returns true if the instrument trades every day of the week.
    #[must_use]
    pub const fn is_crypto(&self) -> bool {
        matches!(self.category, Category::Crypto)
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
