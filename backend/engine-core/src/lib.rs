pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod query;
pub mod session;
pub mod version;

mod traffic;
#[cfg(test)]
mod tests;

pub const PROXY_HOSTNAME: &str = "127.0.0.1";
pub const PROXY_PORT: u16 = 41949;
pub const DEFAULT_PROXY_ENDPOINT: &str =
    const_format::concatcp!("ws://", PROXY_HOSTNAME, ":", PROXY_PORT);
