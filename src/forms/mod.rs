//! Request payloads accepted by the JSON API and their conversion into
//! domain types.

pub mod analytics;
pub mod approval_flows;
pub mod approvals;
pub mod customers;
pub mod ledgers;
pub mod orders;

/// Trim the input, collapse runs of whitespace and drop control characters.
pub(crate) fn sanitize_plain_text(input: &str) -> String {
    let mut sanitized = String::with_capacity(input.len());
    let mut previous_whitespace = false;

    for ch in input.trim().chars() {
        if ch.is_whitespace() {
            if !previous_whitespace {
                sanitized.push(' ');
                previous_whitespace = true;
            }
        } else if ch.is_control() {
            continue;
        } else {
            sanitized.push(ch);
            previous_whitespace = false;
        }
    }

    sanitized
}

/// Sanitize an optional field, treating blank input as absent.
pub(crate) fn sanitize_optional(input: Option<String>) -> Option<String> {
    input
        .map(|value| sanitize_plain_text(&value))
        .filter(|value| !value.is_empty())
}
