//! Sensitive-field denylist.
//!
//! An element whose `type`, `name`, `id` or accessible label contains any of
//! these terms (case-insensitive) is never captured.

use rafael_core::page::SemanticElement;

/// Substrings marking a field as sensitive.
pub const PII_TERMS: &[&str] = &[
    "password",
    "ssn",
    "social-security",
    "credit-card",
    "cc-number",
    "cvv",
    "bank-account",
    "routing-number",
];

/// Whether `value` contains a denylisted term.
pub fn contains_pii_term(value: &str) -> bool {
    let lower = value.to_lowercase();
    PII_TERMS.iter().any(|term| lower.contains(term))
}

/// Whether a captured element describes a sensitive field.
pub fn is_pii_element(el: &SemanticElement) -> bool {
    [&el.input_type, &el.name, &el.id, &el.label]
        .into_iter()
        .flatten()
        .any(|v| contains_pii_term(v))
}
