//! NewType wrappers for strong typing around credentials.
//!
//! These keep the opaque wire token, the identity a token asserts and the
//! issuer tag from being passed for one another.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Opaque signed bearer token as it travels in `Authorization: Bearer`.
    ///
    /// The string is never inspected outside the token codec.
    AccessToken
);

newtype_string!(
    /// User identity asserted by a verified token, in its string form
    /// (e.g. `"7"`).
    ///
    /// Whether it is a usable user id is decided by the request context,
    /// not by the codec.
    SubjectId
);

newtype_string!(
    /// Issuer tag stamped into every token (`iss` claim).
    Issuer
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_creation() {
        let token = AccessToken::new("eyJhbGciOiJIUzI1NiJ9.e30.sig");
        assert_eq!(token.as_str(), "eyJhbGciOiJIUzI1NiJ9.e30.sig");
        assert_eq!(token.to_string(), "eyJhbGciOiJIUzI1NiJ9.e30.sig");
    }

    #[test]
    fn test_subject_id_from_string() {
        let id: SubjectId = "7".into();
        assert_eq!(id.as_str(), "7");

        let id: SubjectId = String::from("42").into();
        assert_eq!(id.into_inner(), "42");
    }

    #[test]
    fn test_access_token_serde_is_transparent() {
        let token = AccessToken::new("abc.def.ghi");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"abc.def.ghi\"");

        let parsed: AccessToken = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_type_equality() {
        assert_eq!(Issuer::new("papernet"), Issuer::new("papernet"));
        assert_ne!(SubjectId::new("1"), SubjectId::new("2"));
    }

    #[test]
    fn test_borrow() {
        use std::borrow::Borrow;
        let id = SubjectId::new("7");
        let s: &str = id.borrow();
        assert_eq!(s, "7");
    }
}
