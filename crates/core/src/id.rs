// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifier newtypes.
//!
//! Every identifier that crosses a wire boundary (`trace_id`, `error_id`) is a
//! server-generated UUID per the protocol's external interface. [`define_uuid_id!`]
//! generates a newtype wrapper around [`uuid::Uuid`] with the `Display`/
//! `Serialize`/`Deserialize` behavior callers expect: a bare UUID string, no
//! wrapping object.

/// Define a newtype ID wrapper around [`uuid::Uuid`].
///
/// Generates `new()` (random v4), `from_uuid()`, `parse()`, `Display`,
/// `Serialize`/`Deserialize` (transparent, as a plain UUID string), and
/// `From<uuid::Uuid>`.
///
/// ```ignore
/// define_uuid_id! {
///     /// Doc comment for the ID type.
///     pub struct TraceId;
/// }
/// ```
#[macro_export]
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Generate a new random (v4) id.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Wrap an existing UUID (e.g. one echoed back from a peer).
            pub fn from_uuid(id: uuid::Uuid) -> Self {
                Self(id)
            }

            /// Parse from a UUID string.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(id: uuid::Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_uuid_id! {
    /// Server-generated id for one request's lifetime, logged and returned on every response.
    pub struct TraceId;
}

define_uuid_id! {
    /// Server-generated id linking an outward `ErrorEnvelope` to its full internal log record.
    pub struct ErrorId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
