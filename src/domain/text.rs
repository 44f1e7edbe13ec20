//! Free-text sanitizing and email shape checks.

use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]*>").ok());
static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Longest stored review comment.
pub const MAX_COMMENT_CHARS: usize = 5000;
/// Longest stored decision reason.
pub const MAX_REASON_CHARS: usize = 2000;

/// Strips HTML tags, trims, and truncates to `max` characters.
///
/// Returns `None` when nothing is left.
#[must_use]
pub fn clean_text(input: &str, max: usize) -> Option<String> {
    let stripped = match TAG.as_ref() {
        Some(re) => re.replace_all(input, ""),
        None => input.into(),
    };
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(max).collect())
}

/// [`clean_text`] over an optional input.
#[must_use]
pub fn clean_opt(input: Option<&str>, max: usize) -> Option<String> {
    input.and_then(|s| clean_text(s, max))
}

/// Loose `local@domain.tld` shape check.
#[must_use]
pub fn is_email(candidate: &str) -> bool {
    candidate.len() <= 254 && EMAIL.as_ref().is_some_and(|re| re.is_match(candidate))
}

/// Lowercases and trims an email, dropping it when malformed.
#[must_use]
pub fn normalize_email(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim().to_lowercase();
    is_email(&trimmed).then_some(trimmed)
}
