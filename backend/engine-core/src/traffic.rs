//! Redacted traffic logging.
//!
//! Every sent and received message can be recorded for diagnosis, with the
//! bulky analysis fields replaced by a marker first. Messages queued while
//! disconnected are logged as if sent, so the trace stays complete. Purely
//! observational: never affects control flow.

use common::redact::redact_fields;

use log::debug;
use serde_json::Value;

/// Inbound fields too bulky to log verbatim.
const INBOUND_REDACTED_FIELDS: &[&str] = &["moveInfos", "ownership", "policy"];

/// Outbound fields too bulky to log verbatim.
const OUTBOUND_REDACTED_FIELDS: &[&str] = &["moves"];

pub(crate) fn log_outbound(enabled: bool, message: &Value) {
    if !enabled {
        return;
    }
    debug!("sent: {}", redact_fields(message, OUTBOUND_REDACTED_FIELDS));
}

pub(crate) fn log_inbound(enabled: bool, message: &Value) {
    if !enabled {
        return;
    }
    debug!(
        "received: {}",
        redact_fields(message, INBOUND_REDACTED_FIELDS)
    );
}
