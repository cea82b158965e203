//! Utility functions for name and domain processing.
//!
//! Helpers for turning a free-form company name into a handle, and for
//! validating and splitting domain names before any network call is made.

use crate::error::NameVetError;

/// Turn a company name into the label used for domains and handles.
///
/// Lowercases and keeps only ASCII letters and digits, so "Acme Co." becomes
/// "acmeco".
///
/// # Errors
///
/// Returns `NameVetError::InvalidName` if nothing usable remains.
pub fn normalize_handle(name: &str) -> Result<String, NameVetError> {
    let handle: String = name
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if handle.is_empty() {
        return Err(NameVetError::invalid_name(
            name,
            "name must contain alphanumeric characters",
        ));
    }

    if handle.len() > 63 {
        return Err(NameVetError::invalid_name(
            name,
            "name is longer than a DNS label allows (63 characters)",
        ));
    }

    Ok(handle)
}

/// Validate a fully qualified domain name and split it into label and TLD.
///
/// `acme.io` becomes `("acme", "io")`. Multi-label names keep everything but
/// the last label on the left: `shop.acme.io` becomes `("shop.acme", "io")`.
///
/// # Errors
///
/// Returns `NameVetError::InvalidDomain` for anything that is not a
/// syntactically valid domain name.
pub fn split_domain(domain: &str) -> Result<(String, String), NameVetError> {
    let domain = domain.trim().trim_end_matches('.').to_lowercase();
    validate_domain(&domain)?;

    match domain.rsplit_once('.') {
        Some((name, tld)) => Ok((name.to_string(), tld.to_string())),
        None => Err(NameVetError::invalid_domain(
            &domain,
            "Domain must contain at least one dot",
        )),
    }
}

/// Validate a domain name format.
///
/// Checks overall length, that there are at least two labels, and that
/// every label is 1-63 characters of letters, digits and inner hyphens.
pub fn validate_domain(domain: &str) -> Result<(), NameVetError> {
    if domain.is_empty() {
        return Err(NameVetError::invalid_domain(
            domain,
            "Domain name cannot be empty",
        ));
    }

    if domain.len() > 253 {
        return Err(NameVetError::invalid_domain(
            domain,
            "Domain name longer than 253 characters",
        ));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(NameVetError::invalid_domain(
            domain,
            "Domain must contain at least one dot",
        ));
    }

    for label in &labels {
        if !is_valid_label(label) {
            return Err(NameVetError::invalid_domain(
                domain,
                format!("Invalid label '{}'", label),
            ));
        }
    }

    // TLDs are never all-numeric
    if labels
        .last()
        .is_some_and(|tld| tld.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(NameVetError::invalid_domain(domain, "TLD cannot be numeric"));
    }

    Ok(())
}

/// Validate a single DNS label.
pub(crate) fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }

    // Cannot start or end with hyphen
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }

    label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Truncate a string to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
