//! Engine version negotiation.
//!
//! Right after connecting, the session sends two fixed probes: an
//! identification request and an oversized-board capability probe. The
//! responses drive the version-dependent parts of the query protocol and a
//! pair of user-facing warnings (known-bad releases, slow large-board
//! builds).

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::str::FromStr;

use serde_json::{Value, json};
use thiserror::Error as ThisError;

/// Identifier (and action) of the identification probe.
pub const VERSION_PROBE_ID: &str = "query_version";

/// Identifier of the oversized-board capability probe.
pub const CAPABILITY_PROBE_ID: &str = "test_bs29";

/// Releases with known protocol defects, matched exactly.
pub const KNOWN_BAD_VERSIONS: &[EngineVersion] = &[EngineVersion::new(1, 9, 0)];

/// First release whose protocol accepts an avoid-moves list.
pub const AVOID_MOVES_MIN_VERSION: EngineVersion = EngineVersion::new(1, 3, 0);

#[derive(Debug, ThisError)]
#[error("unparseable engine version '{0}'")]
pub struct VersionParseError(pub String);

/// Engine version as a numeric `major.minor.patch` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl EngineVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Exact match against the denylist. Non-fatal: the connection stays
    /// usable, the user just gets warned.
    pub fn is_known_bad(&self) -> bool {
        KNOWN_BAD_VERSIONS.contains(self)
    }

    pub fn supports_avoid_moves(&self) -> bool {
        *self >= AVOID_MOVES_MIN_VERSION
    }
}

impl FromStr for EngineVersion {
    type Err = VersionParseError;

    fn from_str(reported: &str) -> Result<Self, Self::Err> {
        let unparseable = || VersionParseError(reported.to_string());

        let mut parts = reported.trim().split('.');
        let major = parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or_else(unparseable)?;
        let minor = parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or_else(unparseable)?;
        let patch = match parts.next() {
            Some(part) => part.parse().map_err(|_| unparseable())?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(unparseable());
        }

        Ok(Self::new(major, minor, patch))
    }
}

impl Display for EngineVersion {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Identification probe, sent first after the queue flush.
pub fn version_probe() -> Value {
    json!({
        "id": VERSION_PROBE_ID,
        "action": VERSION_PROBE_ID,
    })
}

/// Oversized-board probe. A size-limited engine build answers with an
/// error (the healthy outcome); a build that accepts 29x29 analyses every
/// position noticeably slower, which the user must hear about.
pub fn capability_probe() -> Value {
    json!({
        "id": CAPABILITY_PROBE_ID,
        "rules": "Chinese",
        "boardXSize": 29,
        "boardYSize": 29,
        "maxVisits": 1,
        "moves": [],
    })
}
