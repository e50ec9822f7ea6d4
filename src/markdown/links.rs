use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static WIKILINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!?\[\[([^\]|#\n]+)(?:[#|][^\]\n]*)?\]\]").expect("valid regex"));

/// Targets of the `[[...]]` links in `body`, lowercased and without a
/// trailing `.md`. Aliases and heading anchors are dropped.
pub fn wikilink_targets(body: &str) -> BTreeSet<String> {
    WIKILINK
        .captures_iter(body)
        .map(|c| normalize_target(&c[1]))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Obsidian resolves link targets case-insensitively.
pub fn normalize_target(target: &str) -> String {
    let target = target.trim();
    target.strip_suffix(".md").unwrap_or(target).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wikilink_targets() {
        let body = "See [[Citrus]], [[fruit/Apples|apples]] and [[Quantum#Intro]].\n![[diagram.png]]\n";
        let targets = wikilink_targets(body);
        assert_eq!(
            targets.into_iter().collect::<Vec<_>>(),
            vec!["citrus", "diagram.png", "fruit/apples", "quantum"]
        );
    }

    #[test]
    fn test_ignores_broken_links() {
        assert!(wikilink_targets("[[ ]] and [[unclosed\n]]").is_empty());
        assert!(wikilink_targets("plain [text](link.md)").is_empty());
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target(" Notes/Citrus.md "), "notes/citrus");
    }
}
