//! Column-name canonicalization for incoming upstream payloads.
//!
//! Upstream field names arrive as e.g. `"1. open"`, `"5. volume (USD)"` or
//! `"6. Last Refreshed"`. Normalization strips the numeric prefix and any
//! parenthesized unit, lower-cases, and joins words with underscores.
//! Collisions after normalization are resolved order-preservingly: the first
//! occurrence keeps the base name, later ones get `_dup1`, `_dup2`, ... in
//! encounter order.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static NUMERIC_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[a-z]?\.\s*").expect("static pattern"));

/// Canonical form of one raw column name.
pub fn normalize_name(raw: &str) -> String {
    let without_unit = raw.split(" (").next().unwrap_or(raw);
    let without_prefix = NUMERIC_PREFIX.replace(without_unit.trim(), "");
    without_prefix
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Resolves duplicate names deterministically, keeping encounter order.
pub fn dedup_names(names: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        if seen.insert(name.clone()) {
            out.push(name.clone());
            continue;
        }
        let mut counter = 1;
        let mut candidate = format!("{}_dup{}", name, counter);
        while seen.contains(&candidate) {
            counter += 1;
            candidate = format!("{}_dup{}", name, counter);
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

/// Normalize then deduplicate a raw header in one pass.
pub fn canonical_names(raw: &[String]) -> Vec<String> {
    let normalized: Vec<String> = raw.iter().map(|n| normalize_name(n)).collect();
    dedup_names(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_strips_prefix_and_unit() {
        assert_eq!(normalize_name("1. open"), "open");
        assert_eq!(normalize_name("5. volume (USD)"), "volume");
        assert_eq!(normalize_name("1b. open (USD)"), "open");
        assert_eq!(normalize_name("6. Last Refreshed"), "last_refreshed");
        assert_eq!(normalize_name("  Exchange Rate  "), "exchange_rate");
        assert_eq!(normalize_name("close"), "close");
    }

    #[test]
    fn test_dedup_first_keeps_base_name() {
        let out = dedup_names(&strings(&["open", "close", "open", "open"]));
        assert_eq!(out, strings(&["open", "close", "open_dup1", "open_dup2"]));
    }

    #[test]
    fn test_dedup_is_order_preserving() {
        let out = dedup_names(&strings(&["a", "b", "a", "b", "a"]));
        assert_eq!(out, strings(&["a", "b", "a_dup1", "b_dup1", "a_dup2"]));
    }

    #[test]
    fn test_dedup_avoids_existing_suffixed_name() {
        // A literal "open_dup1" already present must not be shadowed.
        let out = dedup_names(&strings(&["open", "open_dup1", "open"]));
        assert_eq!(out, strings(&["open", "open_dup1", "open_dup2"]));
    }

    #[test]
    fn test_canonical_names_end_to_end() {
        // "1. open" and "1b. open (USD)" collide after normalization.
        let out = canonical_names(&strings(&["1. open", "1b. open (USD)", "2. high"]));
        assert_eq!(out, strings(&["open", "open_dup1", "high"]));
    }
}
