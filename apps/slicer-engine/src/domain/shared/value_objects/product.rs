//! Trading product identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::errors::DomainError;

/// A tradeable product in `BASE-QUOTE` form, e.g. `BTC-USD`.
///
/// The base currency is what the order buys or sells; the quote currency is
/// what it is priced in. The SELL-side balance check resolves against the
/// base currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Parse and validate a product identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let valid = matches!(
            value.split_once('-'),
            Some((base, quote)) if !base.is_empty() && !quote.is_empty()
        );
        if !valid {
            return Err(DomainError::InvalidProduct { value });
        }
        Ok(Self(value))
    }

    /// Full identifier, e.g. `"BTC-USD"`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base currency, e.g. `"BTC"`.
    #[must_use]
    pub fn base(&self) -> &str {
        self.0.split_once('-').map_or(self.0.as_str(), |(b, _)| b)
    }

    /// Quote currency, e.g. `"USD"`.
    #[must_use]
    pub fn quote(&self) -> &str {
        self.0.split_once('-').map_or("", |(_, q)| q)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base_and_quote() {
        let product = ProductId::new("BTC-USD").unwrap();
        assert_eq!(product.base(), "BTC");
        assert_eq!(product.quote(), "USD");
        assert_eq!(product.as_str(), "BTC-USD");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!(ProductId::new("BTCUSD").is_err());
        assert!(ProductId::new("-USD").is_err());
        assert!(ProductId::new("BTC-").is_err());
        assert!(ProductId::new("").is_err());
    }

    #[test]
    fn keeps_extra_segments_in_base_split() {
        // Some venues use multi-segment quotes; split on the first dash.
        let product = ProductId::new("ETH-BTC-PERP").unwrap();
        assert_eq!(product.base(), "ETH");
        assert_eq!(product.quote(), "BTC-PERP");
    }

    #[test]
    fn serde_is_transparent() {
        let product = ProductId::new("SOL-USD").unwrap();
        let json = serde_json::to_string(&product).unwrap();
        assert_eq!(json, "\"SOL-USD\"");
    }
}
