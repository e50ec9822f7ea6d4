use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{fmt::Display, ops::Deref};

use crate::markdown::Frontmatter;

/// Vault-relative path of a note, `/`-separated, extension included.
///
/// Ordering is plain string ordering, which is what ranking uses to
/// break ties.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteId(String);

impl Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for NoteId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for NoteId {
    fn from(fr: &str) -> Self {
        NoteId(fr.replace('\\', "/"))
    }
}

impl From<String> for NoteId {
    fn from(fr: String) -> Self {
        NoteId::from(fr.as_str())
    }
}

impl From<NoteId> for String {
    fn from(fr: NoteId) -> Self {
        fr.0
    }
}

impl NoteId {
    /// Build an id from a path below `root`.
    pub fn from_path(root: &Path, path: &Path) -> Option<NoteId> {
        let rel = path.strip_prefix(root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();

        if parts.is_empty() {
            return None;
        }

        Some(NoteId(parts.join("/")))
    }

    /// Link target as written inside `[[...]]`: the id without `.md`.
    pub fn link_target(&self) -> &str {
        self.0.strip_suffix(".md").unwrap_or(&self.0)
    }

    /// File name without directory and extension.
    pub fn stem(&self) -> &str {
        let name = self.0.rsplit('/').next().unwrap_or(&self.0);
        name.strip_suffix(".md").unwrap_or(name)
    }
}

/// A note as loaded for one run.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: NoteId,
    pub raw: String,
}

/// A note after frontmatter and generated sections were split off.
#[derive(Debug, Clone)]
pub struct ExtractedNote {
    pub title: String,
    pub body: String,
}

impl ExtractedNote {
    /// Title from the `title` property, falling back to the file stem.
    pub fn derive_title(id: &NoteId, frontmatter: &Frontmatter) -> String {
        frontmatter
            .get_str("title")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| id.stem().to_string())
    }
}
