//! Integration tests for the engine session core.
//!
//! These run the full session - real WebSocket connection, reader/writer
//! tasks - against a scripted fake analysis proxy on a loopback port.

mod helpers;
mod session;
