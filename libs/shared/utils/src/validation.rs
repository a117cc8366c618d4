use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
});

// Optional leading +, then digits with common separators
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9 ()\-.]{7,24}$").expect("phone pattern compiles")
});

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email) && email.len() <= 254
}

pub fn validate_phone(phone: &str) -> bool {
    let digits = normalize_phone(phone);
    PHONE_RE.is_match(phone.trim()) && (7..=15).contains(&digits.len())
}

/// Strips everything but digits, the form messaging providers expect.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
