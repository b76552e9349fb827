//! Priority-tiered completion of citation keys.
//!
//! Each candidate lands in the first tier it satisfies; tiers are emitted in
//! order and, within a tier, candidates keep their incoming order.

use serde::Serialize;

use crate::reference::Reference;

/// Author summaries longer than this many characters are shortened for
/// display.
pub const AUTHOR_DISPLAY_LIMIT: usize = 40;

/// One completion line: citation key, author summary, `(year) title`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub citation_key: String,
    pub author_summary: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    KeyPrefix,
    AuthorInitial,
    TitlePrefix,
    KeyContains,
    AuthorContains,
    TitleContains,
}

const TIERS: usize = 6;

/// Rank `candidates` against `pattern` (case-insensitive).
pub fn complete<'a>(
    candidates: impl IntoIterator<Item = &'a Reference>,
    pattern: &str,
) -> Vec<Completion> {
    let pattern = pattern.to_lowercase();
    let mut tiers: [Vec<Completion>; TIERS] = Default::default();

    for reference in candidates {
        if let Some(tier) = classify(reference, &pattern) {
            tiers[tier as usize].push(completion_line(reference));
        }
    }

    tiers.into_iter().flatten().collect()
}

fn classify(reference: &Reference, pattern: &str) -> Option<Tier> {
    let key = reference
        .citation_key
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let author = first_author(reference).map(str::to_lowercase);
    let author = author.as_deref();
    let title = reference.title.to_lowercase();

    if key.starts_with(pattern) {
        Some(Tier::KeyPrefix)
    // Only the initial of the first author, so this tier needs a
    // single-character pattern.
    } else if author
        .and_then(|a| a.chars().next())
        .is_some_and(|c| c.to_string().starts_with(pattern))
    {
        Some(Tier::AuthorInitial)
    } else if title.starts_with(pattern) {
        Some(Tier::TitlePrefix)
    } else if key.contains(pattern) {
        Some(Tier::KeyContains)
    } else if author.is_some_and(|a| a.contains(pattern)) {
        Some(Tier::AuthorContains)
    } else if title.contains(pattern) {
        Some(Tier::TitleContains)
    } else {
        None
    }
}

/// First name component of the author summary, `None` when it is empty.
fn first_author(reference: &Reference) -> Option<&str> {
    if reference.author_summary.is_empty() {
        return None;
    }
    reference.author_summary.split(", ").next()
}

fn completion_line(reference: &Reference) -> Completion {
    Completion {
        citation_key: reference.citation_key.clone().unwrap_or_default(),
        author_summary: truncate_for_display(&reference.author_summary),
        label: format!("({}) {}", reference.year, reference.title),
    }
}

fn truncate_for_display(summary: &str) -> String {
    if summary.chars().count() <= AUTHOR_DISPLAY_LIMIT {
        return summary.to_string();
    }
    let mut short: String =
        summary.chars().take(AUTHOR_DISPLAY_LIMIT).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{Creator, CreatorRole};

    fn reference(
        key: &str,
        authors: &[&str],
        title: &str,
        year: &str,
    ) -> Reference {
        let cite = Some(key.to_string());
        let mut r = Reference::new(0, key.to_uppercase(), cite);
        for last in authors {
            r.add_creator(
                CreatorRole::Author,
                Creator {
                    last_name: last.to_string(),
                    first_name: String::new(),
                },
            );
        }
        r.title = title.to_string();
        r.year = year.to_string();
        r
    }

    fn keys(lines: &[Completion]) -> Vec<&str> {
        lines.iter().map(|c| c.citation_key.as_str()).collect()
    }

    #[test]
    fn key_prefix_beats_title_containment() {
        let a = reference("lee2019", &["Lee"], "Graph theory", "2019");
        let b = reference("xlee99", &["Park"], "Lee's algorithm", "1999");

        let out = complete([&b, &a], "lee");
        assert_eq!(keys(&out), vec!["lee2019", "xlee99"]);
        assert_eq!(
            out[0],
            Completion {
                citation_key: "lee2019".to_string(),
                author_summary: "Lee".to_string(),
                label: "(2019) Graph theory".to_string(),
            }
        );
    }

    #[test]
    fn tiers_are_ordered_regardless_of_input_order() {
        let title_contains = reference("q6", &["Zed"], "About smiths", "");
        let author_contains = reference("q5", &["Nasmith"], "x", "");
        let key_contains = reference("q4smi", &["Zed"], "x", "");
        let title_prefix = reference("q3", &["Zed"], "Smiling", "");
        let author_prefix = reference("q2", &["Smithson"], "x", "");
        let key_prefix = reference("smith2020", &["Zed"], "x", "");
        let nothing = reference("q0", &["Zed"], "x", "");

        let out = complete(
            [
                &nothing,
                &title_contains,
                &author_contains,
                &key_contains,
                &title_prefix,
                &author_prefix,
                &key_prefix,
            ],
            "SMI",
        );
        assert_eq!(
            keys(&out),
            vec!["smith2020", "q3", "q4smi", "q5", "q2", "q6"]
        );
    }

    #[test]
    fn author_initial_tier_needs_single_character_pattern() {
        let title_prefix = reference("k2", &["Zed"], "Sorting", "");
        let author_initial = reference("k1", &["Smithson"], "x", "");

        let out = complete([&title_prefix, &author_initial], "s");
        assert_eq!(keys(&out), vec!["k1", "k2"]);

        let title_prefix = reference("k2", &["Zed"], "Smiling", "");
        let out = complete([&author_initial, &title_prefix], "smi");
        assert_eq!(keys(&out), vec!["k2", "k1"]);
    }

    #[test]
    fn only_first_author_is_compared() {
        let r = reference("k1", &["Adams", "Smith"], "x", "");
        assert!(complete([&r], "smi").is_empty());
    }

    #[test]
    fn empty_summary_skips_author_tiers() {
        let mut r = reference("k1", &[], "Untitled", "");
        r.author_summary.clear();
        assert!(complete([&r], "zzz").is_empty());
        assert_eq!(keys(&complete([&r], "unt")), vec!["k1"]);
    }

    #[test]
    fn stable_order_within_a_tier() {
        let a = reference("lee2001", &["Lee"], "a", "");
        let b = reference("lee2002", &["Lee"], "b", "");
        let c = reference("lee2000", &["Lee"], "c", "");
        let out = complete([&a, &b, &c], "lee");
        assert_eq!(keys(&out), vec!["lee2001", "lee2002", "lee2000"]);
    }

    #[test]
    fn long_author_summary_is_truncated_for_display() {
        let authors = ["Abernathy", "Bartholomew", "Castellanos", "Dimitriou"];
        let r = reference("k1", &authors, "t", "2000");
        assert!(r.author_summary.chars().count() > AUTHOR_DISPLAY_LIMIT);

        let out = complete([&r], "k1");
        let shown = &out[0].author_summary;
        assert!(shown.ends_with('…'));
        assert_eq!(shown.chars().count(), AUTHOR_DISPLAY_LIMIT + 1);
        assert!(r.author_summary.starts_with(shown.trim_end_matches('…')));
    }

    #[test]
    fn missing_year_renders_empty_parentheses() {
        let r = reference("k1", &["Lee"], "Untimed", "");
        assert_eq!(complete([&r], "k1")[0].label, "() Untimed");
    }
}
