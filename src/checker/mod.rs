//! Analysis stage: clang-tidy and clang-format over every source file.
//!
//! Both checks are advisory. Nothing here ever rewrites a source file; a
//! formatting difference is reported, not fixed.

use crate::config::AnalysisConfig;
use crate::diagnostic::{Diagnostic, Diagnostics, Stage};
use crate::process::{Invocation, ProcessRunner, StdioRoute};
use crate::toolchain::ResolvedToolPaths;
use crate::ui;
use colored::*;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const TIDY: &str = "clang-tidy";
pub const FORMAT: &str = "clang-format";

/// Source files under `root` with one of `extensions`, in a stable order.
pub fn discover_sources(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| extensions.iter().any(|want| ext == want.as_str()))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect()
}

/// True when the formatter's output is byte-identical to the file.
pub fn format_matches(on_disk: &[u8], formatted: &[u8]) -> bool {
    on_disk == formatted
}

pub struct Analyzer<'a> {
    pub source_root: &'a Path,
    pub paths: &'a ResolvedToolPaths,
    pub runner: &'a ProcessRunner,
    pub config: &'a AnalysisConfig,
}

impl Analyzer<'_> {
    pub fn analyze(&self, files: &[PathBuf]) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        let tidy = self.paths.usable(TIDY);
        let format = self.paths.usable(FORMAT);

        for (name, path) in [(TIDY, tidy), (FORMAT, format)] {
            if path.is_none() {
                diagnostics.info(
                    Stage::Analyze,
                    name,
                    format!("skipped: {} is not provisioned", name),
                );
            }
        }
        if files.is_empty() || (tidy.is_none() && format.is_none()) {
            return diagnostics;
        }

        println!(
            "{} Analyzing {} files...",
            "🔍".magenta(),
            files.len()
        );
        let pb = ui::file_bar(files.len());
        let check = |file: &PathBuf| {
            let subject = self.subject(file);
            pb.set_message(subject.clone());
            let mut found = Vec::new();
            if let Some(tidy) = tidy {
                found.extend(self.tidy(tidy, file, &subject));
            }
            if let Some(format) = format {
                found.extend(self.format(format, file, &subject));
            }
            pb.inc(1);
            found
        };

        // Collecting a parallel iterator keeps discovery order.
        let per_file: Vec<Vec<Diagnostic>> = if self.config.jobs > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()
            {
                Ok(pool) => pool.install(|| files.par_iter().map(check).collect()),
                Err(e) => {
                    warn!("falling back to sequential analysis: {}", e);
                    files.iter().map(check).collect()
                }
            }
        } else {
            files.iter().map(check).collect()
        };
        pb.finish_and_clear();

        diagnostics.extend(per_file.into_iter().flatten());
        diagnostics
    }

    /// Path relative to the source root, `/`-separated.
    fn subject(&self, file: &Path) -> String {
        file.strip_prefix(self.source_root)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn tidy(&self, tidy: &Path, file: &Path, subject: &str) -> Option<Diagnostic> {
        let invocation = Invocation::new(tidy)
            .args(self.config.tidy_args.iter().cloned())
            .arg(subject)
            .current_dir(self.source_root)
            .stderr(StdioRoute::Ignore);
        let Some(result) = self.runner.run(&invocation) else {
            return Some(Diagnostic::error(
                Stage::Analyze,
                subject,
                format!("{} could not be launched", TIDY),
            ));
        };
        let report = result.stdout_text();
        let report = report.trim_end();
        if report.is_empty() {
            debug!("{} clean: {}", TIDY, file.display());
            None
        } else {
            Some(Diagnostic::error(Stage::Analyze, subject, report))
        }
    }

    fn format(&self, format: &Path, file: &Path, subject: &str) -> Option<Diagnostic> {
        let on_disk = match fs::read(file) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Some(Diagnostic::error(
                    Stage::Analyze,
                    subject,
                    format!("could not read file: {}", e),
                ));
            }
        };
        let invocation = Invocation::new(format)
            .arg(subject)
            .current_dir(self.source_root);
        let result = match self.runner.run(&invocation) {
            Some(result) => result,
            None => {
                return Some(Diagnostic::error(
                    Stage::Analyze,
                    subject,
                    format!("{} could not be launched", FORMAT),
                ));
            }
        };
        if !result.success {
            return Some(Diagnostic::error(
                Stage::Analyze,
                subject,
                format!(
                    "{} failed with {}: {}",
                    FORMAT,
                    result.exit_label(),
                    result.stderr_text().trim()
                ),
            ));
        }

        if format_matches(&on_disk, &result.stdout) {
            None
        } else {
            Some(Diagnostic::error(
                Stage::Analyze,
                subject,
                "file was not formatted",
            ))
        }
    }
}
