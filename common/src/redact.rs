//! Log redaction for bulky or sensitive message fields.
//!
//! Engine analysis messages carry payloads that must never reach the log
//! verbatim: move-info lists run to hundreds of entries, ownership maps and
//! policy vectors to hundreds of floats. Redaction produces a copy of the
//! message with those values replaced by a marker, leaving every other
//! field intact for diagnosis.

use serde_json::Value;

/// Marker substituted for a redacted field value.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Return a copy of `message` with the values of the named top-level
/// fields replaced by [`REDACTION_MARKER`].
///
/// Fields absent from the message are ignored. Non-object messages are
/// returned unchanged.
pub fn redact_fields(message: &Value, fields: &[&str]) -> Value {
    let mut copy = message.clone();

    if let Some(object) = copy.as_object_mut() {
        for field in fields {
            if let Some(slot) = object.get_mut(*field) {
                *slot = Value::String(REDACTION_MARKER.to_string());
            }
        }
    }

    copy
}
