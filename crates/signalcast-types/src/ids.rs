//! Type-safe identifier wrappers around `u64`.
//!
//! Connections carry two identifiers that must never be mixed up: the
//! transport's opaque [`ConnectionHandle`] (identity of a live socket) and
//! the registry's [`ConnectionId`] (a monotonically assigned sequence
//! number used in diagnostics). Both are plain `u64` newtypes so the
//! compiler keeps them apart.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Return the inner `u64` value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Opaque identity of one accepted socket, minted by the transport.
    ///
    /// The transport owns the socket; the core only uses the handle to
    /// address writes and to compare identity.
    ConnectionHandle
}

define_id! {
    /// Sequence number assigned by the connection registry when a client
    /// is established. Never reused within a process.
    ConnectionId
}
