//! Strongly-typed identifiers for domain entities.
//!
//! These prevent mixing up IDs from different contexts.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a new unique identifier using UUID v4.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(
    ExecutionId,
    "Unique identifier for one strategy execution (TWAP/VWAP/Scaled run)."
);
define_id!(OrderId, "Exchange-assigned identifier for a child order.");
define_id!(
    ClientOrderId,
    "Locally generated client identifier attached to an outbound order."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_id_generate_is_unique() {
        let a = ExecutionId::generate();
        let b = ExecutionId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn order_id_new_and_display() {
        let id = OrderId::new("exch-7f3a");
        assert_eq!(id.as_str(), "exch-7f3a");
        assert_eq!(format!("{id}"), "exch-7f3a");
    }

    #[test]
    fn order_id_from_string() {
        let id: OrderId = "exch-1".into();
        assert_eq!(id.as_str(), "exch-1");

        let id: OrderId = String::from("exch-2").into();
        assert_eq!(id.into_inner(), "exch-2");
    }

    #[test]
    fn serde_is_transparent() {
        let id = ClientOrderId::new("cli-9");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"cli-9\"");

        let parsed: ClientOrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn order_id_usable_as_map_key() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(OrderId::new("a"));
        set.insert(OrderId::new("b"));
        set.insert(OrderId::new("a"));
        assert_eq!(set.len(), 2);
    }
}
