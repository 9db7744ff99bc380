//! Opaque identifiers for diagram shapes.
//!
//! Frames and connectors are only ever referenced by id; nothing outside the
//! diagram holds a direct reference to a shape.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

macro_rules! shape_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Allocate a fresh id that is unique within this process and
            /// practically unique across sessions.
            pub fn generate() -> Self {
                Self(format!("{}:{}", $prefix, unique_suffix()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First eight characters, for log lines and tree views.
            pub fn short(&self) -> &str {
                let end = self
                    .0
                    .char_indices()
                    .nth(8)
                    .map(|(i, _)| i)
                    .unwrap_or(self.0.len());
                &self.0[..end]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

shape_id!(
    /// Identifier of a frame shape.
    FrameId,
    "frame"
);

shape_id!(
    /// Identifier of a connector (arrow) shape.
    ConnectorId,
    "arrow"
);

fn unique_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:012x}{:04x}", nanos & 0xFFFF_FFFF_FFFF, seq & 0xFFFF)
}
