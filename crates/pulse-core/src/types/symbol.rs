//! Tracked symbol set and per-symbol display precision.
//!
//! The feed watches a small, fixed list of symbols. [`TrackedSymbols`] keeps
//! the configured order (used for fetch cycles and subscriptions) alongside a
//! hash set for the membership checks done on every trade.

use ahash::AHashSet;

/// Display precision class of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceClass {
    /// Regular instruments, 2 decimal places.
    #[default]
    Standard,
    /// Low-price, high-volatility instruments, 4 decimal places.
    HighPrecision,
}

impl PriceClass {
    /// Number of decimal places used for price, open and range fields.
    #[inline]
    pub fn decimals(self) -> usize {
        match self {
            Self::Standard => 2,
            Self::HighPrecision => 4,
        }
    }
}

/// The fixed set of symbols this process tracks.
#[derive(Debug, Clone, Default)]
pub struct TrackedSymbols {
    ordered: Vec<String>,
    lookup: AHashSet<String>,
    high_precision: AHashSet<String>,
}

impl TrackedSymbols {
    /// Build the set from the configured symbol list and the high-precision
    /// class. Duplicate symbols are dropped, keeping the first occurrence.
    pub fn new<I, J>(symbols: I, high_precision: J) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        J: IntoIterator,
        J::Item: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut lookup = AHashSet::new();
        for s in symbols {
            let s = s.into();
            if lookup.insert(s.clone()) {
                ordered.push(s);
            }
        }
        Self {
            ordered,
            lookup,
            high_precision: high_precision.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn contains(&self, symbol: &str) -> bool {
        self.lookup.contains(symbol)
    }

    /// Precision class used when formatting `symbol`'s summary fields.
    #[inline]
    pub fn price_class(&self, symbol: &str) -> PriceClass {
        if self.high_precision.contains(symbol) {
            PriceClass::HighPrecision
        } else {
            PriceClass::Standard
        }
    }

    /// Symbols in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
