use std::io::Write;
use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::{DirEntry, WalkDir};

use crate::note::NoteId;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("vault root {0} does not exist or is not a directory")]
    NotADirectory(PathBuf),

    #[error("invalid exclude pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where notes come from and go back to.
pub trait VaultStore: Send + Sync {
    /// Markdown notes of the vault, sorted by id.
    fn list_notes(&self) -> Result<Vec<NoteId>, VaultError>;
    fn read_note(&self, id: &NoteId) -> std::io::Result<String>;
    /// Replace the note's content in one step; readers never see a
    /// partially written file.
    fn write_note(&self, id: &NoteId, raw: &str) -> std::io::Result<()>;
}

/// A vault directory on the local filesystem.
#[derive(Debug)]
pub struct FsVault {
    root: PathBuf,
    exclude: Vec<Regex>,
}

impl FsVault {
    pub fn open(root: &Path, exclude: &[String]) -> Result<Self, VaultError> {
        if !root.is_dir() {
            return Err(VaultError::NotADirectory(root.to_path_buf()));
        }
        let root = root.canonicalize()?;

        let exclude = exclude
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { root, exclude })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, id: &NoteId) -> PathBuf {
        id.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }

    fn is_excluded(&self, id: &NoteId) -> bool {
        self.exclude.iter().any(|re| re.is_match(id))
    }
}

/// Dot-directories (`.obsidian`, `.trash`, `.git`) and dot-files are not
/// part of the vault. The root itself is always walked.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "md")
        .unwrap_or(false)
}

impl VaultStore for FsVault {
    fn list_notes(&self) -> Result<Vec<NoteId>, VaultError> {
        let mut ids = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("skipping unreadable vault entry: {err}");
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_markdown(entry.path()) {
                continue;
            }

            let id = match NoteId::from_path(&self.root, entry.path()) {
                Some(id) => id,
                None => continue,
            };

            if self.is_excluded(&id) {
                log::debug!("{id}: excluded by pattern");
                continue;
            }

            ids.push(id);
        }

        ids.sort();
        Ok(ids)
    }

    fn read_note(&self, id: &NoteId) -> std::io::Result<String> {
        let bytes = std::fs::read(self.path_of(id))?;
        String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn write_note(&self, id: &NoteId, raw: &str) -> std::io::Result<()> {
        let path = self.path_of(id);
        let dir = path.parent().unwrap_or(&self.root);

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(raw.as_bytes())?;
        temp.flush()?;

        // keep the note's permissions instead of the temp file's 0600
        if let Ok(metadata) = std::fs::metadata(&path) {
            let _ = std::fs::set_permissions(temp.path(), metadata.permissions());
        }

        temp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }
}
