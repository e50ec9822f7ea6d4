use super::frontmatter::{locate, Frontmatter, FrontmatterError};
use super::sections::{strip_sections, SectionError};

/// A note split into its property block and its prose.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub frontmatter: Frontmatter,
    /// Body without frontmatter and without generated sections
    pub body: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),

    #[error(transparent)]
    Section(#[from] SectionError),
}

/// Split `raw` into frontmatter and body. Previously generated sections
/// never reach the body, so they are not fed back into embeddings or
/// ratings.
pub fn extract(raw: &str) -> Result<Extracted, ExtractError> {
    let (frontmatter, rest) = match locate(raw)? {
        Some(span) => (
            Frontmatter::parse(&raw[span.content_start..span.content_end]),
            &raw[span.end..],
        ),
        None => (Frontmatter::default(), raw),
    };

    let body = strip_sections(rest)?;

    Ok(Extracted { frontmatter, body })
}
