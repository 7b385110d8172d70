//! Newtype wrappers for timer identifiers and partition keys.
//!
//! These prevent accidentally passing a store domain where a timer ID is
//! expected (both travel as plain strings in URLs and JSON).

use serde::{Deserialize, Serialize};

/// Macro to define a newtype wrapping a `String` inner type.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new value from the given string.
            #[inline]
            #[must_use]
            pub const fn new(value: String) -> Self {
                Self(value)
            }

            /// Returns a reference to the inner string.
            #[inline]
            #[must_use]
            pub fn as_inner(&self) -> &str {
                &self.0
            }

            /// Consumes the wrapper and returns the inner string.
            #[inline]
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

define_string_id! {
    /// Opaque unique identifier of a timer, assigned by the store.
    TimerId
}

define_string_id! {
    /// Domain of the merchant storefront that owns a timer
    /// (e.g. `my-shop.myshopify.com`). Sole partition key for retrieval.
    StoreDomain
}

impl TimerId {
    /// Generates a fresh random identifier (32 lowercase hex digits).
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_id_serde_is_transparent() {
        let id = TimerId::new("66c1f0a2b9e4".to_owned());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""66c1f0a2b9e4""#);
        let deserialized: TimerId = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, id);
    }

    #[test]
    fn store_domain_display() {
        let store = StoreDomain::from("shop.myshopify.com");
        assert_eq!(store.to_string(), "shop.myshopify.com");
    }

    #[test]
    fn generated_ids_are_unique_hex() {
        let first = TimerId::generate();
        let second = TimerId::generate();
        assert_ne!(first, second);
        assert_eq!(first.as_inner().len(), 32);
        assert!(first.as_inner().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn id_into_inner() {
        let id: TimerId = "t-1".to_owned().into();
        assert_eq!(id.into_inner(), "t-1");
    }
}
