//! Pipeline scenarios against an in-memory vault and fake providers.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::note::NoteId;
use crate::provider::{CompletionProvider, EmbeddingProvider, ProviderError};
use crate::vault::{VaultError, VaultStore};

mod fs_vault;

/// Vault kept in memory. Every write is recorded.
#[derive(Default)]
pub struct MemoryVault {
    notes: Mutex<BTreeMap<NoteId, String>>,
    unreadable: HashSet<NoteId>,
    writes: Mutex<Vec<NoteId>>,
}

impl MemoryVault {
    pub fn with(notes: &[(&str, &str)]) -> Self {
        let vault = Self::default();
        {
            let mut map = vault.notes.lock().unwrap();
            for (id, raw) in notes {
                map.insert(NoteId::from(*id), raw.to_string());
            }
        }
        vault
    }

    pub fn unreadable(mut self, id: &str) -> Self {
        self.notes
            .lock()
            .unwrap()
            .insert(NoteId::from(id), String::new());
        self.unreadable.insert(NoteId::from(id));
        self
    }

    pub fn get(&self, id: &str) -> String {
        self.notes.lock().unwrap()[&NoteId::from(id)].clone()
    }

    pub fn snapshot(&self) -> BTreeMap<NoteId, String> {
        self.notes.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|id| id.to_string())
            .collect()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }
}

impl VaultStore for MemoryVault {
    fn list_notes(&self) -> Result<Vec<NoteId>, VaultError> {
        Ok(self.notes.lock().unwrap().keys().cloned().collect())
    }

    fn read_note(&self, id: &NoteId) -> std::io::Result<String> {
        if self.unreadable.contains(id) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            ));
        }
        self.notes
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such note"))
    }

    fn write_note(&self, id: &NoteId, raw: &str) -> std::io::Result<()> {
        self.notes.lock().unwrap().insert(id.clone(), raw.to_string());
        self.writes.lock().unwrap().push(id.clone());
        Ok(())
    }
}

pub const VOCABULARY: [&str; 13] = [
    "apple", "apples", "fruit", "orchard", "sweet", "citrus", "orange", "oranges", "juice",
    "quantum", "physics", "particle", "mechanics",
];

/// Deterministic embedding: word counts over `VOCABULARY`.
pub struct BagOfWords {
    pub calls: AtomicUsize,
    /// Text containing this word fails with a server error
    pub fail_on: Option<&'static str>,
    /// Text containing this word gets one extra dimension
    pub widen_on: Option<&'static str>,
    pub unreachable: bool,
}

impl BagOfWords {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
            widen_on: None,
            unreachable: false,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

impl EmbeddingProvider for BagOfWords {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unreachable {
            return Err(ProviderError::Unreachable("connection refused".to_string()));
        }
        if let Some(word) = self.fail_on {
            if words(text).any(|w| w == word) {
                return Err(ProviderError::Status {
                    status: 500,
                    body: "model crashed".to_string(),
                });
            }
        }

        let mut vector = vec![0.0f32; VOCABULARY.len()];
        for word in words(text) {
            if let Some(idx) = VOCABULARY.iter().position(|v| *v == word) {
                vector[idx] += 1.0;
            }
        }

        if let Some(word) = self.widen_on {
            if words(text).any(|w| w == word) {
                vector.push(1.0);
            }
        }

        Ok(vector)
    }

    fn model(&self) -> &str {
        "bag-of-words"
    }
}

/// Answers with the response of the first rule whose keyword appears in
/// the prompt.
pub struct Scripted {
    pub rules: Vec<(&'static str, &'static str)>,
    pub calls: AtomicUsize,
    pub unreachable: bool,
}

impl Scripted {
    pub fn new(rules: &[(&'static str, &'static str)]) -> Self {
        Self {
            rules: rules.to_vec(),
            calls: AtomicUsize::new(0),
            unreachable: false,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CompletionProvider for Scripted {
    fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unreachable {
            return Err(ProviderError::Unreachable("connection refused".to_string()));
        }

        self.rules
            .iter()
            .find(|(keyword, _)| prompt.contains(keyword))
            .map(|(_, response)| response.to_string())
            .ok_or_else(|| ProviderError::InvalidResponse("no scripted answer".to_string()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
