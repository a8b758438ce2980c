//! Email and phone-number mining

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

// Deliberately loose: also matches dates and ID numbers with 10+ digits
static CONTACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[+(]?[1-9][0-9 .\-()]{8,}[0-9]").expect("valid contact regex")
});

/// Identifiers found in one document's text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifiers {
    pub email: String,
    pub contact: String,
}

/// Find the first email address and first phone-like string in `text`.
///
/// Missing identifiers come back as empty strings.
pub fn mine(text: &str) -> Identifiers {
    Identifiers {
        email: first_match(&EMAIL_RE, text),
        contact: first_match(&CONTACT_RE, text),
    }
}

fn first_match(re: &Regex, text: &str) -> String {
    re.find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
