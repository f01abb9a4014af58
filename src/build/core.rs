use super::feedback::{FeedbackAnalyzer, LineClassifier};
use crate::config::BuildConfig;
use crate::diagnostic::{Diagnostics, Severity, Stage};
use crate::layout::DirectoryLayout;
use crate::process::{Invocation, ProcessRunner};
use crate::toolchain::{Platform, ResolvedToolPaths};
use crate::ui;
use anyhow::Result;
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

pub const CMAKE: &str = "cmake";

/// Where the build leaves `target` for `configuration`.
///
/// Visual Studio generators are multi-config and nest outputs per
/// configuration; single-config generators put them at the build root.
pub fn binary_path(
    layout: &DirectoryLayout,
    platform: Platform,
    configuration: &str,
    target: &str,
) -> PathBuf {
    match platform {
        Platform::Windows => layout
            .build
            .join(configuration)
            .join(format!("{}{}", target, platform.exe_suffix())),
        _ => layout.build.join(target),
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

pub struct BuildRunner<'a> {
    pub layout: &'a DirectoryLayout,
    pub config: &'a BuildConfig,
    pub platform: Platform,
    pub paths: &'a ResolvedToolPaths,
    pub runner: &'a ProcessRunner,
    pub classifier: &'a dyn LineClassifier,
}

impl BuildRunner<'_> {
    /// Configure, build, and return the test binaries that were produced.
    ///
    /// Never fails outright: every problem becomes a diagnostic and an empty
    /// or partial binary list, which is what gates the test stage.
    pub fn configure_and_build(&self, diagnostics: &mut Diagnostics) -> Vec<PathBuf> {
        let Some(cmake) = self.paths.usable(CMAKE) else {
            diagnostics.info(Stage::Build, CMAKE, "skipped: cmake is not provisioned");
            return Vec::new();
        };
        let start_time = Instant::now();

        let root = self.layout.root.to_string_lossy().to_string();
        let configure = Invocation::new(cmake)
            .arg(root)
            .args(self.config.configure_args.iter().cloned())
            .current_dir(&self.layout.build);
        if !self.step("configure", "Configuring...", configure, diagnostics) {
            return Vec::new();
        }

        let build = Invocation::new(cmake)
            .args(["--build", ".", "--config"])
            .arg(self.config.configuration.as_str())
            .current_dir(&self.layout.build);
        if !self.step("build", "Building...", build, diagnostics) {
            return Vec::new();
        }

        println!(
            "{} Built {} in {:.2}s",
            "✓".green(),
            self.config.configuration,
            start_time.elapsed().as_secs_f64()
        );
        self.collect_binaries(diagnostics)
    }

    /// Run one cmake step and classify its output. Returns whether it succeeded.
    fn step(
        &self,
        name: &str,
        message: &str,
        invocation: Invocation,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        let pb = ui::spinner(message);
        let result = self.runner.run(&invocation);
        pb.finish_and_clear();

        let Some(result) = result else {
            diagnostics.error(Stage::Build, name, "cmake could not be launched");
            return false;
        };

        // Per stream: stdout may lack a trailing newline.
        let (stdout, stderr) = (result.stdout_text(), result.stderr_text());
        for line in stdout.lines().chain(stderr.lines()) {
            if line.trim().is_empty() {
                continue;
            }
            match self.classifier.classify(line) {
                Severity::Error => diagnostics.error(Stage::Build, name, line),
                Severity::Info => info!("{}", line),
            }
        }

        if result.success {
            return true;
        }
        diagnostics.error(
            Stage::Build,
            name,
            format!("cmake {} failed with {}", name, result.exit_label()),
        );
        if let Some(hint) = FeedbackAnalyzer::analyze(&format!("{}\n{}", stdout, stderr)) {
            diagnostics.info(Stage::Build, name, hint);
        }
        false
    }

    fn collect_binaries(&self, diagnostics: &mut Diagnostics) -> Vec<PathBuf> {
        let mut binaries = Vec::new();
        for target in &self.config.test_targets {
            let path = binary_path(
                self.layout,
                self.platform,
                &self.config.configuration,
                target,
            );
            if !path.is_file() {
                diagnostics.error(
                    Stage::Build,
                    target,
                    format!("expected test binary at {}", path.display()),
                );
                continue;
            }
            if let Err(e) = make_executable(&path) {
                diagnostics.error(
                    Stage::Build,
                    target,
                    format!("could not mark {} executable: {:#}", path.display(), e),
                );
                continue;
            }
            binaries.push(path);
        }
        binaries
    }
}
