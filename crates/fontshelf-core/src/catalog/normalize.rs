//! Label normalization for tags, genres and instrument types.
//!
//! Index lookups and set comparisons only work if every stored label has
//! passed through [`normalize_label`].

use crate::config::CatalogConfig;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Regex for runs of whitespace.
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalize a single label.
///
/// # Rules Applied
/// 1. Replace the CSV list delimiter with a space
/// 2. Convert to lowercase
/// 3. Collapse whitespace runs to a single space
/// 4. Trim
///
/// Returns `None` when nothing is left.
///
/// # Examples
///
/// ```
/// use fontshelf_core::catalog::normalize_label;
///
/// assert_eq!(normalize_label("  Grand  Piano "), Some("grand piano".to_string()));
/// assert_eq!(normalize_label("   "), None);
/// ```
pub fn normalize_label(label: &str) -> Option<String> {
    let replaced = label.replace(CatalogConfig::LIST_DELIMITER, " ");
    let lowered = replaced.to_lowercase();
    let collapsed = WHITESPACE_RUN.replace_all(&lowered, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Normalize and deduplicate a collection of labels.
pub fn normalize_labels<I, S>(labels: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .filter_map(|label| normalize_label(label.as_ref()))
        .collect()
}

/// Split a delimited list (as typed by a user or stored in CSV) into labels.
pub fn split_labels(joined: &str) -> BTreeSet<String> {
    normalize_labels(joined.split(CatalogConfig::LIST_DELIMITER))
}

/// Join labels for CSV output; the inverse of [`split_labels`].
pub fn join_labels(labels: &BTreeSet<String>) -> String {
    labels
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(&CatalogConfig::LIST_DELIMITER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Piano"), Some("piano".into()));
        assert_eq!(normalize_label("\tNew   Age\n"), Some("new age".into()));
        assert_eq!(normalize_label("rock,metal"), Some("rock metal".into()));
        assert_eq!(normalize_label(""), None);
        assert_eq!(normalize_label(" , "), None);
    }

    #[test]
    fn test_normalize_labels_dedupes() {
        let labels = normalize_labels(["Bright", "bright ", "DARK", ""]);
        assert_eq!(labels.len(), 2);
        assert!(labels.contains("bright"));
        assert!(labels.contains("dark"));
    }

    #[test]
    fn test_split_and_join_are_inverse() {
        let labels = split_labels("piano, Bright ,hip hop,,");
        assert_eq!(join_labels(&labels), "bright,hip hop,piano");
        assert_eq!(split_labels(&join_labels(&labels)), labels);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_labels("").is_empty());
        assert_eq!(join_labels(&BTreeSet::new()), "");
    }
}
