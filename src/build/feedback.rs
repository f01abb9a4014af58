//! Build-log classification.
//!
//! CMake and the native toolchains it drives have no structured output, so
//! deciding which log lines are failures is a heuristic. It sits behind
//! [`LineClassifier`] so the build runner never hard-codes it.

use crate::diagnostic::Severity;
use anyhow::{Context, Result};
use colored::*;
use regex::Regex;

pub trait LineClassifier: Send + Sync {
    fn classify(&self, line: &str) -> Severity;
}

impl<F> LineClassifier for F
where
    F: Fn(&str) -> Severity + Send + Sync,
{
    fn classify(&self, line: &str) -> Severity {
        self(line)
    }
}

/// Lines matching `marker` are errors, everything else is info.
#[derive(Debug, Clone)]
pub struct RegexClassifier {
    marker: Regex,
}

impl RegexClassifier {
    pub fn new(pattern: &str) -> Result<Self> {
        let marker = Regex::new(pattern)
            .with_context(|| format!("Invalid failure marker: {}", pattern))?;
        Ok(Self { marker })
    }
}

impl LineClassifier for RegexClassifier {
    fn classify(&self, line: &str) -> Severity {
        if self.marker.is_match(line) {
            Severity::Error
        } else {
            Severity::Info
        }
    }
}

pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    /// A hint for well-known failure shapes in a failed build's output.
    pub fn analyze(output: &str) -> Option<String> {
        if output.contains("does not appear to contain CMakeLists.txt") {
            return Some(format!(
                "The project root has no {}.",
                "CMakeLists.txt".bold().yellow()
            ));
        }

        if output.contains("No CMAKE_C_COMPILER could be found")
            || output.contains("No CMAKE_CXX_COMPILER could be found")
        {
            return Some(format!(
                "CMake could not find a {}. Install one or pass a toolchain file through {}.",
                "C/C++ compiler".bold().red(),
                "build.configure_args".bold().yellow()
            ));
        }

        if output.contains("LNK2019") || output.contains("undefined reference to") {
            return Some(format!(
                "It looks like a {} error. A library may be missing from target_link_libraries.",
                "Linker".bold().red()
            ));
        }

        if output.contains("fatal error: ") && output.contains("No such file or directory")
            || output.contains("cannot open include file")
        {
            return Some(format!(
                "It looks like a {} error. Check target_include_directories.",
                "Missing Header".bold().red()
            ));
        }

        None
    }
}
