//! Contact-point normalisation.
//!
//! Emails are compared case-insensitively and phones exactly (after trimming).
//! Every value is normalised before it is stored so that equality checks in the
//! store and in memory agree.

/// Trim and lowercase an email address. Returns `None` for blank input.
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}

/// Trim a phone number. Returns `None` for blank input.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_owned())
}

/// Case-insensitive email equality.
pub fn emails_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
