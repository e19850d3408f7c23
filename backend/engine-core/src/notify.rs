//! Collaborator seams injected into a session at construction.
//!
//! The core never talks to the user or to the rest of the application
//! directly; it goes through these traits. No ambient globals.

use serde_json::Value;

/// Error type a downstream consumer may surface; the session logs it and
/// moves on.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Receives blocking, user-visible notifications: transport failures,
/// engine-reported errors, negotiation warnings.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Downstream consumer of every successfully parsed inbound message.
///
/// The session forwards messages opaquely; it does not interpret analysis
/// results. A delivery failure is caught and logged, never allowed to tear
/// down the connection.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &Value) -> Result<(), SinkError>;
}
