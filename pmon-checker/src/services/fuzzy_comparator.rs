//! Fuzzy comparison of parsed vs. live ingredient lines
//!
//! Scores are whole percentages (0-100) derived from normalized Levenshtein
//! similarity of the lowercased strings. The alerting threshold of the
//! weekly report (90 by default) is calibrated against this scale.

/// Similarity of two strings as a whole percentage
///
/// Case-insensitive and symmetric; 100 means identical after lowercasing.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    (strsim::normalized_levenshtein(&a, &b) * 100.0).round()
}

/// Mean best-match score of `parsed` against `live`
///
/// Each parsed line is scored against every live line and keeps its best
/// score, so neither list's order matters. Returns 0 when either list is
/// empty: no comparison was possible, and callers must not fold that into
/// an accuracy mean.
pub fn compare_ingredients<P, L>(parsed: &[P], live: &[L]) -> f64
where
    P: AsRef<str>,
    L: AsRef<str>,
{
    if parsed.is_empty() || live.is_empty() {
        return 0.0;
    }

    let total: f64 = parsed
        .iter()
        .map(|p| {
            live.iter()
                .map(|l| similarity_ratio(p.as_ref(), l.as_ref()))
                .fold(0.0, f64::max)
        })
        .sum();

    total / parsed.len() as f64
}
