//! Leading `---` property block of a note.
//!
//! This is a line-oriented reader, not a YAML parser: it only needs to
//! know where properties start and end so that one of them can be
//! replaced without touching the bytes of the others. Values are handed
//! to `serde_yml` when someone actually asks for one.

use super::line_ending;

const DELIMITER: &str = "---";
const ALT_CLOSING_DELIMITER: &str = "...";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrontmatterError {
    #[error("frontmatter block opened on the first line is never closed")]
    Unclosed,
}

/// Byte offsets of a frontmatter block inside the raw note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontmatterSpan {
    /// First byte after the opening delimiter line
    pub content_start: usize,
    /// First byte of the closing delimiter line
    pub content_end: usize,
    /// First byte after the closing delimiter line
    pub end: usize,
}

/// One `key: value` entry. `raw` keeps the value text as written,
/// continuation lines included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub key: String,
    pub raw: String,
}

/// Ordered property mapping. Unknown keys are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    properties: Vec<Property>,
}

impl Frontmatter {
    /// Parse the text between the delimiters.
    pub fn parse(content: &str) -> Self {
        let mut properties: Vec<Property> = Vec::new();

        for line in content.lines() {
            match property_key(line) {
                Some((key, value)) => properties.push(Property {
                    key: key.to_string(),
                    raw: value.trim().to_string(),
                }),
                None => {
                    if line.trim().is_empty() || line.trim_start().starts_with('#') {
                        continue;
                    }
                    if let Some(last) = properties.last_mut() {
                        if !last.raw.is_empty() {
                            last.raw.push('\n');
                        }
                        last.raw.push_str(line.trim_end());
                    }
                }
            }
        }

        Self { properties }
    }

    /// Raw value text of the first property named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.raw.as_str())
    }

    /// Scalar value of `key` as a string. Sequences and mappings yield `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        let raw = self.get(key)?;
        if raw.is_empty() {
            return None;
        }

        match serde_yml::from_str::<serde_yml::Value>(raw) {
            Ok(serde_yml::Value::String(s)) => Some(s),
            Ok(serde_yml::Value::Number(n)) => Some(n.to_string()),
            Ok(serde_yml::Value::Bool(b)) => Some(b.to_string()),
            Ok(_) => None,
            Err(_) if raw.contains('\n') => None,
            Err(_) => Some(raw.to_string()),
        }
    }
}

#[cfg(test)]
impl Frontmatter {
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.key.as_str())
    }
}

/// Split a top-level `key: value` line. Indented lines, list items and
/// comments are not property lines.
fn property_key(line: &str) -> Option<(&str, &str)> {
    let first = line.chars().next()?;
    if first.is_whitespace() || first == '-' || first == '#' {
        return None;
    }

    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Find the frontmatter block, if the note has one.
pub fn locate(raw: &str) -> Result<Option<FrontmatterSpan>, FrontmatterError> {
    let mut lines = raw.split_inclusive('\n');

    let first = match lines.next() {
        Some(line) => line,
        None => return Ok(None),
    };

    if first.trim_start_matches('\u{feff}').trim_end() != DELIMITER {
        return Ok(None);
    }

    let content_start = first.len();
    let mut offset = content_start;

    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == DELIMITER || trimmed == ALT_CLOSING_DELIMITER {
            return Ok(Some(FrontmatterSpan {
                content_start,
                content_end: offset,
                end: offset + line.len(),
            }));
        }
        offset += line.len();
    }

    Err(FrontmatterError::Unclosed)
}

/// Set `key` to `value` inside the frontmatter, creating the block when the
/// note has none. Other properties keep their bytes and their order; later
/// duplicates of `key` are dropped so the note ends up with one value.
pub fn set_property(raw: &str, key: &str, value: &str) -> Result<String, FrontmatterError> {
    let nl = line_ending(raw);
    let line = format!("{key}: {value}{nl}");

    let span = match locate(raw)? {
        Some(span) => span,
        None => {
            // the byte order mark stays the first thing in the file
            let (bom, rest) = match raw.strip_prefix('\u{feff}') {
                Some(rest) => ("\u{feff}", rest),
                None => ("", raw),
            };
            return Ok(format!("{bom}{DELIMITER}{nl}{line}{DELIMITER}{nl}{rest}"));
        }
    };

    let content = &raw[span.content_start..span.content_end];
    let mut offset = span.content_start;
    // byte ranges of every `key` entry, continuation lines included
    let mut found: Vec<(usize, usize)> = Vec::new();
    let mut in_match = false;

    for content_line in content.split_inclusive('\n') {
        let line_start = offset;
        offset += content_line.len();

        if in_match && is_continuation(content_line) {
            if let Some(last) = found.last_mut() {
                last.1 = offset;
            }
            continue;
        }

        in_match = matches!(property_key(content_line), Some((k, _)) if k == key);
        if in_match {
            found.push((line_start, offset));
        }
    }

    let out = match found.split_first() {
        Some((&(start, end), duplicates)) => {
            let mut out = String::with_capacity(raw.len() + line.len());
            out.push_str(&raw[..start]);
            out.push_str(&line);
            let mut cursor = end;
            for &(dup_start, dup_end) in duplicates {
                out.push_str(&raw[cursor..dup_start]);
                cursor = dup_end;
            }
            out.push_str(&raw[cursor..]);
            out
        }
        None => {
            let at = span.content_end;
            // the closing delimiter is on its own line, so `at` starts a line
            format!("{}{}{}", &raw[..at], line, &raw[at..])
        }
    };

    Ok(out)
}

fn is_continuation(line: &str) -> bool {
    let trimmed = line.trim_end();
    if trimmed.is_empty() {
        return false;
    }
    line.starts_with(' ') || line.starts_with('\t') || line.starts_with("- ") || trimmed == "-"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_none_without_delimiter() {
        assert_eq!(locate("# Title\nbody\n").unwrap(), None);
        assert_eq!(locate("").unwrap(), None);
    }

    #[test]
    fn test_locate_span() {
        let raw = "---\ntags: [a]\n---\nbody\n";
        let span = locate(raw).unwrap().unwrap();
        assert_eq!(&raw[span.content_start..span.content_end], "tags: [a]\n");
        assert_eq!(&raw[span.end..], "body\n");
    }

    #[test]
    fn test_locate_dots_close_and_crlf() {
        let raw = "---\r\na: 1\r\n...\r\nbody";
        let span = locate(raw).unwrap().unwrap();
        assert_eq!(&raw[span.content_start..span.content_end], "a: 1\r\n");
        assert_eq!(&raw[span.end..], "body");
    }

    #[test]
    fn test_locate_unclosed() {
        assert_eq!(locate("---\ntitle: x\nbody\n"), Err(FrontmatterError::Unclosed));
    }

    #[test]
    fn test_parse_keeps_order_and_continuations() {
        let fm = Frontmatter::parse("zeta: 1\ntags:\n  - rust\n  - notes\nalpha: \"quoted\"\n# comment\n");
        let keys: Vec<&str> = fm.keys().collect();
        assert_eq!(keys, vec!["zeta", "tags", "alpha"]);
        assert_eq!(fm.get("tags"), Some("  - rust\n  - notes"));
        assert_eq!(fm.get_str("alpha"), Some("quoted".to_string()));
        assert_eq!(fm.get_str("zeta"), Some("1".to_string()));
        assert_eq!(fm.get_str("tags"), None);
        assert_eq!(fm.get_str("missing"), None);
    }

    #[test]
    fn test_set_property_replaces_in_place() {
        let raw = "---\ntitle: A\nnote-quality: 3\naliases:\n  - x\n---\nbody\n";
        let out = set_property(raw, "note-quality", "8").unwrap();
        assert_eq!(out, "---\ntitle: A\nnote-quality: 8\naliases:\n  - x\n---\nbody\n");
    }

    #[test]
    fn test_set_property_replaces_multiline_value() {
        let raw = "---\nnote-quality:\n  - 3\nz: 1\n---\n";
        let out = set_property(raw, "note-quality", "5").unwrap();
        assert_eq!(out, "---\nnote-quality: 5\nz: 1\n---\n");
    }

    #[test]
    fn test_set_property_appends_to_block() {
        let raw = "---\ntitle: A\n---\nbody\n";
        let out = set_property(raw, "note-quality", "7").unwrap();
        assert_eq!(out, "---\ntitle: A\nnote-quality: 7\n---\nbody\n");
    }

    #[test]
    fn test_set_property_creates_block() {
        let out = set_property("body\n", "note-quality", "7").unwrap();
        assert_eq!(out, "---\nnote-quality: 7\n---\nbody\n");
    }

    #[test]
    fn test_set_property_after_bom() {
        let out = set_property("\u{feff}# Title\nbody\n", "note-quality", "7").unwrap();
        assert_eq!(out, "\u{feff}---\nnote-quality: 7\n---\n# Title\nbody\n");
        assert!(locate(&out).unwrap().is_some());

        let again = set_property(&out, "note-quality", "8").unwrap();
        assert_eq!(again, "\u{feff}---\nnote-quality: 8\n---\n# Title\nbody\n");
    }

    #[test]
    fn test_set_property_drops_duplicate_keys() {
        let raw = "---\nnote-quality: 3\ntitle: A\nnote-quality:\n  - 4\nz: 1\nnote-quality: 5\n---\nbody\n";
        let out = set_property(raw, "note-quality", "8").unwrap();
        assert_eq!(out, "---\nnote-quality: 8\ntitle: A\nz: 1\n---\nbody\n");

        let fm = Frontmatter::parse(&out[4..out.find("---\nbody").unwrap()]);
        assert_eq!(fm.get("note-quality"), Some("8"));
        assert_eq!(fm.len(), 3);
    }

    #[test]
    fn test_set_property_is_idempotent() {
        let raw = "---\ntitle: A\n---\nbody\n";
        let once = set_property(raw, "note-quality", "7").unwrap();
        let twice = set_property(&once, "note-quality", "7").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_set_property_does_not_match_prefix_keys() {
        let raw = "---\nnote-quality-old: 2\n---\n";
        let out = set_property(raw, "note-quality", "9").unwrap();
        assert_eq!(out, "---\nnote-quality-old: 2\nnote-quality: 9\n---\n");
    }

    #[test]
    fn test_set_property_unclosed_is_error() {
        assert_eq!(
            set_property("---\ntitle: A\n", "note-quality", "1"),
            Err(FrontmatterError::Unclosed)
        );
    }
}
