// Listing-failure classification by case-insensitive keyword match over the error text.
// Upstream errors expose no reliable structured code, so the text is all there is.

use crate::error::MonitorError;

/// Matched as substrings of the lowercased error chain.
pub const AUTH_ERROR_KEYWORDS: &[&str] = &[
    "security token",
    "expired",
    "signature",
    "credentials",
    "access denied",
    "accessdenied",
    "not authorized",
    "unauthorized",
];

pub const INVALID_CREDENTIALS_MESSAGE: &str =
    "Credentials were rejected or have expired. Check the selected profile.";

/// Decides whether listing-error text means the credentials were rejected.
pub type AuthErrorMatcher = fn(&str) -> bool;

pub fn is_auth_error(text: &str) -> bool {
    let lowered = text.to_lowercase();
    AUTH_ERROR_KEYWORDS.iter().any(|k| lowered.contains(k))
}

pub fn classify_listing_error(err: &anyhow::Error, matcher: AuthErrorMatcher) -> MonitorError {
    let text = format!("{:#}", err);
    if matcher(&text) {
        MonitorError::CredentialsInvalid(INVALID_CREDENTIALS_MESSAGE.to_string())
    } else {
        MonitorError::Unclassified(text)
    }
}
