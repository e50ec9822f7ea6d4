//! Tool-owned blocks inside notes.
//!
//! A generated section is everything between a start and an end marker
//! line. Markers are HTML comments so they stay invisible in rendered
//! Markdown. Their text must never change between releases, otherwise
//! older output stops being recognised and gets duplicated.

use serde::Serialize;

use super::line_ending;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    RelatedNotes,
    NoteQuality,
}

impl SectionKind {
    pub const ALL: [SectionKind; 2] = [SectionKind::RelatedNotes, SectionKind::NoteQuality];

    pub fn start_marker(&self) -> &'static str {
        match self {
            SectionKind::RelatedNotes => "<!-- vaultlink:related-notes:start -->",
            SectionKind::NoteQuality => "<!-- vaultlink:note-quality:start -->",
        }
    }

    pub fn end_marker(&self) -> &'static str {
        match self {
            SectionKind::RelatedNotes => "<!-- vaultlink:related-notes:end -->",
            SectionKind::NoteQuality => "<!-- vaultlink:note-quality:end -->",
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionKind::RelatedNotes => write!(f, "related-notes"),
            SectionKind::NoteQuality => write!(f, "note-quality"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SectionError {
    #[error("{kind} section starting at byte {offset} has no end marker")]
    Unterminated { kind: SectionKind, offset: usize },
}

/// Byte offsets of one marker-delimited block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    /// Start of the start-marker line
    start: usize,
    /// First byte after the start-marker line
    inner_start: usize,
    /// Start of the end-marker line
    inner_end: usize,
    /// First byte after the end-marker line
    end: usize,
}

/// Position of `needle` at the beginning of a line, searching from `from`.
fn find_at_line_start(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let mut cursor = from;
    while let Some(rel) = haystack[cursor..].find(needle) {
        let pos = cursor + rel;
        if pos == 0 || haystack.as_bytes()[pos - 1] == b'\n' {
            return Some(pos);
        }
        cursor = pos + needle.len();
    }
    None
}

/// First byte after the line containing `pos`.
fn end_of_line(haystack: &str, pos: usize) -> usize {
    haystack[pos..]
        .find('\n')
        .map(|rel| pos + rel + 1)
        .unwrap_or(haystack.len())
}

fn find_blocks(raw: &str, kind: SectionKind) -> Result<Vec<Block>, SectionError> {
    let start_marker = kind.start_marker();
    let end_marker = kind.end_marker();

    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(start) = find_at_line_start(raw, start_marker, cursor) {
        let inner_start = end_of_line(raw, start);
        let inner_end = find_at_line_start(raw, end_marker, inner_start).ok_or(
            SectionError::Unterminated {
                kind,
                offset: start,
            },
        )?;
        let end = end_of_line(raw, inner_end);

        blocks.push(Block {
            start,
            inner_start,
            inner_end,
            end,
        });
        cursor = end;
    }

    Ok(blocks)
}

/// Section text with a single trailing line ending, in the note's own
/// line-ending style. Empty text stays empty.
fn normalize_inner(text: &str, nl: &str) -> String {
    let trimmed = text.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(trimmed.len() + 2);
    for (idx, line) in trimmed.split('\n').enumerate() {
        if idx > 0 {
            out.push_str(nl);
        }
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
    }
    out.push_str(nl);
    out
}

/// Whether `raw` already holds a section of this kind.
pub fn has_section(raw: &str, kind: SectionKind) -> Result<bool, SectionError> {
    Ok(!find_blocks(raw, kind)?.is_empty())
}

/// Replace the contents of the `kind` section with `text`, or append a new
/// section at the end of the note. Bytes outside the markers are kept.
pub fn rewrite(raw: &str, kind: SectionKind, text: &str) -> Result<String, SectionError> {
    let nl = line_ending(raw);
    let inner = normalize_inner(text, nl);
    let blocks = find_blocks(raw, kind)?;

    let first = match blocks.first() {
        Some(block) => *block,
        None => return Ok(append(raw, kind, &inner, nl)),
    };

    let mut out = String::with_capacity(raw.len() + inner.len());
    out.push_str(&raw[..first.inner_start]);
    out.push_str(&inner);

    // duplicates of the same kind are dropped
    let mut cursor = first.inner_end;
    for block in &blocks[1..] {
        out.push_str(&raw[cursor..block.start]);
        cursor = block.end;
    }
    out.push_str(&raw[cursor..]);

    Ok(out)
}

fn append(raw: &str, kind: SectionKind, inner: &str, nl: &str) -> String {
    let block = format!("{}{nl}{inner}{}{nl}", kind.start_marker(), kind.end_marker());

    if raw.is_empty() {
        return block;
    }

    let separator = if raw.ends_with(&format!("{nl}{nl}")) || raw.ends_with("\n\n") {
        String::new()
    } else if raw.ends_with('\n') {
        nl.to_string()
    } else {
        format!("{nl}{nl}")
    };

    format!("{raw}{separator}{block}")
}

/// Remove every generated section of every kind.
pub fn strip_sections(raw: &str) -> Result<String, SectionError> {
    let mut out = raw.to_string();

    for kind in SectionKind::ALL {
        let blocks = find_blocks(&out, kind)?;
        if blocks.is_empty() {
            continue;
        }

        let mut stripped = String::with_capacity(out.len());
        let mut cursor = 0;
        for block in &blocks {
            stripped.push_str(&out[cursor..block.start]);
            cursor = block.end;
        }
        stripped.push_str(&out[cursor..]);
        out = stripped;
    }

    Ok(out)
}
