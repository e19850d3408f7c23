//! Shared primitives for the engine session core.
//!
//! This crate contains the small building blocks used by every layer:
//! error source locations and log redaction. It has no business logic -
//! just data and pure functions that can be passed between layers.
//!
//! ## Architecture
//!
//! - **common** (this crate): shared primitives
//! - **engine-core**: session/transport logic built on them

pub mod error;
pub mod redact;

pub use error::error_location::ErrorLocation;

#[cfg(test)]
mod tests;
