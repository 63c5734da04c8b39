//! Input validation helpers.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email regex is valid")
});

/// Whether `email` looks like a deliverable address.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_addresses() {
        assert!(is_valid_email("billing@acme.test"));
        assert!(is_valid_email("first.last+tag@sub.example.com"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("@acme.test"));
        assert!(!is_valid_email("a b@acme.test"));
        assert!(!is_valid_email(""));
    }
}
