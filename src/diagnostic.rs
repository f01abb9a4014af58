//! Pipeline diagnostics and the final verdict.
//!
//! Every stage reports through a [`Diagnostics`] sink. The sink keeps
//! insertion order, and the verdict is derived from it alone: a run fails
//! if and only if at least one [`Severity::Error`] entry was recorded.

use colored::*;
use serde::Serialize;
use std::fmt;

/// Pipeline phase that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Clean,
    Provision,
    Analyze,
    Doc,
    Build,
    Test,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::Provision => "provision",
            Stage::Analyze => "analyze",
            Stage::Doc => "doc",
            Stage::Build => "build",
            Stage::Test => "test",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
}

/// One reportable unit of pipeline output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    /// File or target the message is about.
    pub subject: String,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn error(stage: Stage, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            subject: subject.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn info(stage: Stage, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            subject: subject.into(),
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error:".red().bold(),
            Severity::Info => "info:".dimmed(),
        };
        write!(
            f,
            "{} [{}] {}: {}",
            tag,
            self.stage,
            self.subject.bold(),
            self.message
        )
    }
}

/// Terminal pass/fail determination of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure,
}

impl Verdict {
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Success => 0,
            Verdict::Failure => 1,
        }
    }
}

/// Ordered, pipeline-wide diagnostic sequence.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn error(&mut self, stage: Stage, subject: impl Into<String>, message: impl Into<String>) {
        self.push(Diagnostic::error(stage, subject, message));
    }

    pub fn info(&mut self, stage: Stage, subject: impl Into<String>, message: impl Into<String>) {
        self.push(Diagnostic::info(stage, subject, message));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|d| d.is_error()).count()
    }

    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.stage == stage)
    }

    pub fn verdict(&self) -> Verdict {
        if self.entries.iter().any(Diagnostic::is_error) {
            Verdict::Failure
        } else {
            Verdict::Success
        }
    }

    /// Print every entry to stderr, in recording order.
    pub fn print(&self) {
        for diagnostic in &self.entries {
            eprintln!("{}", diagnostic);
        }
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
