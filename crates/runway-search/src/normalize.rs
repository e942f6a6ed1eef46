//! Query normalization.

/// Strip every `" Airport"` / `" airport"` occurrence, then trim.
///
/// Only the two exact casings preceded by a space are removed, so a bare
/// `"Airport"` query survives and `"AIRPORT"` is left alone. The same rule
/// is applied to airport names before they are embedded.
#[must_use]
pub fn normalize_query(raw: &str) -> String {
    raw.replace(" Airport", "")
        .replace(" airport", "")
        .trim()
        .to_string()
}
