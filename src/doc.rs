use crate::diagnostic::{Diagnostics, Stage};
use crate::process::{Invocation, ProcessRunner};
use crate::toolchain::ResolvedToolPaths;
use crate::ui;
use colored::*;
use std::path::Path;

pub const DOXYGEN: &str = "doxygen";

/// Run doxygen against `<root>/<doxyfile>`.
///
/// A missing Doxyfile or missing doxygen is a skip, not a failure. Warnings
/// doxygen prints on a successful run are kept as info diagnostics.
pub fn generate_docs(
    root: &Path,
    doxyfile: &str,
    paths: &ResolvedToolPaths,
    runner: &ProcessRunner,
) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();

    if !root.join(doxyfile).is_file() {
        diagnostics.info(Stage::Doc, doxyfile, "skipped: no Doxyfile in project root");
        return diagnostics;
    }
    let Some(doxygen) = paths.usable(DOXYGEN) else {
        diagnostics.info(Stage::Doc, DOXYGEN, "skipped: doxygen is not provisioned");
        return diagnostics;
    };

    println!("{} Generating documentation...", "📚".magenta());
    let pb = ui::spinner("Running Doxygen...");
    let result = runner.run(&Invocation::new(doxygen).arg(doxyfile).current_dir(root));
    pb.finish_and_clear();

    match result {
        None => diagnostics.error(Stage::Doc, DOXYGEN, "doxygen could not be launched"),
        Some(result) if !result.success => diagnostics.error(
            Stage::Doc,
            DOXYGEN,
            format!(
                "doxygen failed with {}:\n{}",
                result.exit_label(),
                result.stderr_text().trim_end()
            ),
        ),
        Some(result) => {
            for line in result.stderr_text().lines().filter(|l| !l.trim().is_empty()) {
                diagnostics.info(Stage::Doc, DOXYGEN, line);
            }
            println!("{} Documentation generated", "✓".green());
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Launcher, ProcessResult};
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;

    struct FakeDoxygen {
        success: bool,
        stderr: &'static str,
    }

    impl Launcher for FakeDoxygen {
        fn launch(&self, invocation: &Invocation) -> std::io::Result<ProcessResult> {
            assert_eq!(invocation.args, ["Doxyfile"]);
            Ok(ProcessResult {
                code: Some(if self.success { 0 } else { 1 }),
                success: self.success,
                stdout: Vec::new(),
                stderr: self.stderr.as_bytes().to_vec(),
            })
        }
    }

    fn setup(with_doxyfile: bool) -> (tempfile::TempDir, ResolvedToolPaths) {
        let dir = tempfile::tempdir().unwrap();
        if with_doxyfile {
            fs::write(dir.path().join("Doxyfile"), "INPUT = packages\n").unwrap();
        }
        let exe = dir.path().join("doxygen");
        fs::write(&exe, b"").unwrap();
        let mut paths = ResolvedToolPaths::default();
        paths.insert(DOXYGEN, exe);
        (dir, paths)
    }

    fn runner(success: bool, stderr: &'static str) -> ProcessRunner {
        ProcessRunner::new(Arc::new(FakeDoxygen { success, stderr }), 1, Duration::ZERO)
    }

    #[test]
    fn test_missing_doxyfile_is_skipped() {
        let (dir, paths) = setup(false);
        let diagnostics = generate_docs(dir.path(), "Doxyfile", &paths, &runner(true, ""));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.error_count(), 0);
    }

    #[test]
    fn test_warnings_are_info() {
        let (dir, paths) = setup(true);
        let diagnostics = generate_docs(
            dir.path(),
            "Doxyfile",
            &paths,
            &runner(true, "warning: a is not documented\n\nwarning: b is not documented\n"),
        );
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.error_count(), 0);
    }

    #[test]
    fn test_failure_is_one_error() {
        let (dir, paths) = setup(true);
        let diagnostics =
            generate_docs(dir.path(), "Doxyfile", &paths, &runner(false, "error: bad tag\n"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.iter().next().unwrap().message.contains("bad tag"));
    }
}
