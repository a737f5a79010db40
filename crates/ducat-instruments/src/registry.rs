//! Embedded instrument registry.

use std::collections::HashMap;
use std::sync::OnceLock;

use ducat_types::{Category, Instrument, Symbol};

/// The instrument metadata JSON embedded at compile time.
const INSTRUMENTS_JSON: &str = include_str!("../data/instruments.json");

/// Decimal factor assumed for symbols missing from the registry.
pub const DEFAULT_DECIMAL_FACTOR: u32 = 100_000;

/// Global instrument registry instance.
static REGISTRY: OnceLock<InstrumentRegistry> = OnceLock::new();

/// Registry of known instruments, keyed by upper-case symbol.
#[derive(Debug, Default)]
pub struct InstrumentRegistry {
    instruments: HashMap<String, Instrument>,
}

impl InstrumentRegistry {
    /// Returns the global instrument registry.
    ///
    /// The registry is initialized lazily on first access.
    #[must_use]
    pub fn global() -> &'static Self {
        REGISTRY.get_or_init(Self::load)
    }

    /// Loads instruments from the embedded JSON data.
    fn load() -> Self {
        match Self::from_json(INSTRUMENTS_JSON) {
            Ok(registry) => registry,
            Err(err) => {
                tracing::error!(error = %err, "embedded instrument table is invalid");
                Self::default()
            }
        }
    }

    /// Builds a registry from a JSON object mapping symbols to instruments.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a map of instruments.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let parsed: HashMap<String, Instrument> = serde_json::from_str(json)?;
        let instruments = parsed
            .into_iter()
            .map(|(id, instrument)| (id.to_ascii_uppercase(), instrument))
            .collect();
        Ok(Self { instruments })
    }

    /// Looks up an instrument by ID (case-insensitive).
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Instrument> {
        self.instruments.get(&id.to_ascii_uppercase())
    }

    /// Returns the instrument for `symbol`, or a forex instrument with the
    /// default decimal factor if the symbol is unknown.
    #[must_use]
    pub fn resolve(&self, symbol: &Symbol) -> Instrument {
        self.get(symbol.as_str()).cloned().unwrap_or_else(|| {
            tracing::debug!(%symbol, "unknown symbol, assuming default forex precision");
            Instrument::new(
                symbol.as_str(),
                symbol.as_str(),
                Category::Forex,
                DEFAULT_DECIMAL_FACTOR,
            )
        })
    }

    /// Returns all instruments as an iterator.
    pub fn all(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }

    /// Returns the total number of instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Returns instruments matching the given category.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Instrument> {
        self.instruments
            .values()
            .filter(move |i| i.category() == category)
    }
}
