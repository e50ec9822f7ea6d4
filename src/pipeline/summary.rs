use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Serialize;

use crate::note::NoteId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Linker,
    Quality,
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Linker => write!(f, "linker"),
            Mode::Quality => write!(f, "quality"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Extract,
    Embed,
    Rank,
    Rate,
    Render,
    Write,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Extract => "extract",
            Stage::Embed => "embed",
            Stage::Rank => "rank",
            Stage::Rate => "rate",
            Stage::Render => "render",
            Stage::Write => "write",
        };
        f.pad(name)
    }
}

/// Why a note dropped out of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    ParseError,
    EmbeddingFailed,
    RatingFailed,
    RatingParseError,
    IoFailure,
}

impl Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureCategory::ParseError => "parse-error",
            FailureCategory::EmbeddingFailed => "embedding-failed",
            FailureCategory::RatingFailed => "rating-failed",
            FailureCategory::RatingParseError => "rating-parse-error",
            FailureCategory::IoFailure => "io-failure",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteFailure {
    pub note: NoteId,
    pub stage: Stage,
    pub category: FailureCategory,
    pub reason: String,
}

/// What happened during one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub mode: Mode,
    pub notes_found: usize,
    pub stages: BTreeMap<Stage, StageCounts>,
    pub failures: Vec<NoteFailure>,
    /// Notes rewritten, or that would be rewritten in a dry run
    pub written: Vec<NoteId>,
    pub unchanged: usize,
    pub dry_run: bool,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn new(mode: Mode, dry_run: bool) -> Self {
        Self {
            mode,
            notes_found: 0,
            stages: BTreeMap::new(),
            failures: Vec::new(),
            written: Vec::new(),
            unchanged: 0,
            dry_run,
            cancelled: false,
        }
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut StageCounts {
        self.stages.entry(stage).or_default()
    }

    pub fn processed(&mut self, stage: Stage) {
        self.stage_mut(stage).processed += 1;
    }

    pub fn skipped(&mut self, stage: Stage) {
        self.stage_mut(stage).skipped += 1;
    }

    pub fn failed(
        &mut self,
        stage: Stage,
        note: &NoteId,
        category: FailureCategory,
        reason: impl Into<String>,
    ) {
        let reason = reason.into();
        log::warn!("{note}: {category} during {stage}: {reason}");
        self.stage_mut(stage).failed += 1;
        self.failures.push(NoteFailure {
            note: note.clone(),
            stage,
            category,
            reason,
        });
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
impl RunSummary {
    pub fn counts(&self, stage: Stage) -> StageCounts {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    /// Failed notes of one category.
    pub fn failed_notes(&self, category: FailureCategory) -> Vec<&NoteId> {
        self.failures
            .iter()
            .filter(|f| f.category == category)
            .map(|f| &f.note)
            .collect()
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = if self.dry_run { "would write" } else { "written" };
        writeln!(
            f,
            "{} run {}: {} notes, {} {verb}, {} unchanged, {} failed",
            self.mode,
            if self.cancelled { "cancelled" } else { "finished" },
            self.notes_found,
            self.written.len(),
            self.unchanged,
            self.failures.len(),
        )?;

        for (stage, counts) in &self.stages {
            writeln!(
                f,
                "  {stage:<8} processed {:>5}  skipped {:>5}  failed {:>5}",
                counts.processed, counts.skipped, counts.failed
            )?;
        }

        if self.dry_run && !self.written.is_empty() {
            writeln!(f, "notes that would change:")?;
            for note in &self.written {
                writeln!(f, "  {note}")?;
            }
        }

        if !self.failures.is_empty() {
            writeln!(f, "failed notes:")?;
            for failure in &self.failures {
                writeln!(
                    f,
                    "  {} [{}] {}: {}",
                    failure.note, failure.category, failure.stage, failure.reason
                )?;
            }
        }

        Ok(())
    }
}
