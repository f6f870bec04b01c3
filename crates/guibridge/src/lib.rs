//! Drive a GUI toolkit from another process over framed JSON.
//!
//! # Crate Structure
//!
//! - [`frame`]: Length-prefixed, CRC-checked message framing
//! - [`bridge`]: Object registry, outbound channel, dispatcher and lifecycle
//! - [`schema`]: Optional per-verb payload validation (behind `schema` feature)

/// Re-export frame types.
pub mod frame {
    pub use guibridge_frame::*;
}

/// Re-export bridge types.
pub mod bridge {
    pub use guibridge_bridge::*;
}

/// Re-export schema types (requires `schema` feature).
#[cfg(feature = "schema")]
pub mod schema {
    pub use guibridge_schema::*;
}
