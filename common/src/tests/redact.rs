// Unit tests for the redact module
// Cover field replacement, untouched fields, and non-object payloads

use crate::redact::{REDACTION_MARKER, redact_fields};
use serde_json::json;

/// **VALUE**: Verifies the named fields are replaced and nothing else moves.
///
/// **BUG THIS CATCHES**: Redacting the wrong field, or mutating the
/// original message instead of a copy.
#[test]
fn given_named_fields_when_redact_fields_then_values_replaced() {
    let message = json!({
        "id": "q1",
        "moveInfos": [{"move": "D4", "visits": 500}],
        "ownership": [0.1, -0.2],
        "winrate": 0.53
    });

    let redacted = redact_fields(&message, &["moveInfos", "ownership"]);

    assert_eq!(redacted["moveInfos"], REDACTION_MARKER);
    assert_eq!(redacted["ownership"], REDACTION_MARKER);
    assert_eq!(redacted["id"], "q1");
    assert_eq!(redacted["winrate"], 0.53);

    // Original untouched
    assert!(message["moveInfos"].is_array());
}

/// Fields absent from the message are skipped silently.
#[test]
fn given_missing_field_when_redact_fields_then_message_unchanged() {
    let message = json!({"id": "q2", "action": "terminate"});

    let redacted = redact_fields(&message, &["moveInfos", "policy"]);

    assert_eq!(redacted, message);
}

/// Non-object payloads pass through as-is.
#[test]
fn given_non_object_when_redact_fields_then_returns_copy() {
    let message = json!("not an object");

    let redacted = redact_fields(&message, &["moves"]);

    assert_eq!(redacted, message);
}
