//! Note text handling: property block, generated sections and the clean
//! body that gets embedded or rated.
//!
//! # Architecture
//!
//! - `frontmatter`: locate, read and update the leading property block
//! - `sections`: find, replace and strip tool-owned marker blocks
//! - `extract`: split a raw note into properties and clean body
//! - `links`: wikilink targets already present in a body

mod extract;
mod frontmatter;
mod links;
mod sections;

pub use extract::extract;
pub use frontmatter::{set_property, Frontmatter};
pub use links::{normalize_target, wikilink_targets};
pub use sections::{has_section, rewrite, SectionKind};

/// Property written by quality mode.
pub const QUALITY_PROPERTY: &str = "note-quality";

/// Line ending used by the note, so generated lines match it.
pub(crate) fn line_ending(raw: &str) -> &'static str {
    if raw.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}
