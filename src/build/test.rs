//! Test stage: run each built binary against the fixed input file.
//!
//! The pass condition is that the input text ends with whatever the binary
//! wrote to stdout. That relation matches how the current `test_core`
//! behaves and is not a general contract for test binaries.

use crate::diagnostic::{Diagnostics, Stage};
use crate::process::{Invocation, ProcessRunner, StdioRoute};
use colored::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Whether `output` is an accepted result for `input`.
pub fn output_matches(input: &str, output: &str) -> bool {
    input.ends_with(output)
}

pub struct TestRunner<'a> {
    /// Fixed stdin for every binary.
    pub input: &'a Path,
    /// Working directory and home of the `<target>.out` files.
    pub output_dir: &'a Path,
    pub args: &'a [String],
    pub runner: &'a ProcessRunner,
}

impl TestRunner<'_> {
    pub fn run_tests(&self, binaries: &[PathBuf]) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        if binaries.is_empty() {
            return diagnostics;
        }

        let expected = match fs::read(self.input) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            Err(e) => {
                diagnostics.error(
                    Stage::Test,
                    self.input.display().to_string(),
                    format!("could not read test input: {}", e),
                );
                return diagnostics;
            }
        };

        println!("{} Running tests...", "🧪".magenta());
        let mut passed = 0;
        for binary in binaries {
            let target = binary
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| binary.display().to_string());
            print!("   TEST {} ... ", target.bold());

            let before = diagnostics.error_count();
            self.run_one(binary, &target, &expected, &mut diagnostics);
            if diagnostics.error_count() == before {
                passed += 1;
                println!("{}", "PASS".green());
            } else {
                println!("{}", "FAIL".red());
            }
        }

        let summary = format!("{}/{} tests passed", passed, binaries.len());
        if passed == binaries.len() {
            println!("{} {}", "✓".green(), summary);
        } else {
            println!("{} {}", "x".red(), summary);
        }
        diagnostics
    }

    fn run_one(&self, binary: &Path, target: &str, expected: &str, diagnostics: &mut Diagnostics) {
        let output_path = self.output_dir.join(format!("{}.out", target));

        // Both handles are dropped at the end of this block, whatever happens.
        let result = {
            let input = match File::open(self.input) {
                Ok(f) => f,
                Err(e) => {
                    diagnostics.error(Stage::Test, target, format!("could not open input: {}", e));
                    return;
                }
            };
            let output = match File::create(&output_path) {
                Ok(f) => f,
                Err(e) => {
                    diagnostics.error(
                        Stage::Test,
                        target,
                        format!("could not create {}: {}", output_path.display(), e),
                    );
                    return;
                }
            };
            let invocation = Invocation::new(binary)
                .args(self.args.iter().cloned())
                .current_dir(self.output_dir)
                .stdin(StdioRoute::File(input))
                .stdout(StdioRoute::File(output));
            self.runner.run(&invocation)
        };

        let Some(result) = result else {
            diagnostics.error(Stage::Test, target, "test binary could not be launched");
            return;
        };
        if !result.success {
            diagnostics.error(
                Stage::Test,
                target,
                format!(
                    "exited with {}: {}",
                    result.exit_label(),
                    result.stderr_text().trim()
                ),
            );
        }

        let observed = match fs::read(&output_path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            Err(e) => {
                diagnostics.error(Stage::Test, target, format!("could not read output: {}", e));
                return;
            }
        };
        if !output_matches(expected, &observed) {
            diagnostics.error(
                Stage::Test,
                target,
                format!("unexpected output: {:?}", observed),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Launcher, ProcessResult};
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    /// Writes a fixed body to whatever file stdout is bound to.
    struct Echo {
        body: &'static str,
        exit: i32,
    }

    impl Launcher for Echo {
        fn launch(&self, invocation: &Invocation) -> std::io::Result<ProcessResult> {
            assert_eq!(invocation.args, ["--simulated_environment"]);
            assert!(matches!(invocation.stdin, StdioRoute::File(_)));
            if let StdioRoute::File(file) = &invocation.stdout {
                file.try_clone()?.write_all(self.body.as_bytes())?;
            }
            Ok(ProcessResult {
                code: Some(self.exit),
                success: self.exit == 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        }
    }

    fn run(body: &'static str, exit: i32) -> (tempfile::TempDir, Diagnostics) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "AB\nC\n").unwrap();
        let binary = dir.path().join("test_core");
        fs::write(&binary, b"").unwrap();

        let args = vec!["--simulated_environment".to_string()];
        let runner = ProcessRunner::new(Arc::new(Echo { body, exit }), 1, Duration::ZERO);
        let diagnostics = TestRunner {
            input: &input,
            output_dir: dir.path(),
            args: &args,
            runner: &runner,
        }
        .run_tests(&[binary]);
        (dir, diagnostics)
    }

    #[test]
    fn test_suffix_relation() {
        assert!(output_matches("AB\nC\n", "C\n"));
        assert!(output_matches("AB\nC\n", ""));
        assert!(output_matches("AB\nC\n", "AB\nC\n"));
        assert!(!output_matches("AB\nC\n", "XC\n"));
        assert!(!output_matches("AB\nC\n", "AB\n"));
    }

    #[test]
    fn test_genuine_suffix_passes() {
        let (dir, diagnostics) = run("C\n", 0);
        assert!(diagnostics.is_empty());
        assert_eq!(fs::read_to_string(dir.path().join("test_core.out")).unwrap(), "C\n");
    }

    #[test]
    fn test_non_suffix_is_one_mismatch() {
        let (_dir, diagnostics) = run("XC\n", 0);
        assert_eq!(diagnostics.len(), 1);
        let d = diagnostics.iter().next().unwrap();
        assert!(d.is_error());
        assert!(d.message.contains("XC\\n"));
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let (_dir, diagnostics) = run("C\n", 3);
        assert_eq!(diagnostics.error_count(), 1);
        assert!(diagnostics.iter().next().unwrap().message.contains("exit code 3"));
    }

    #[test]
    fn test_no_binaries_no_diagnostics() {
        let runner = ProcessRunner::system();
        let args = Vec::new();
        let diagnostics = TestRunner {
            input: Path::new("/nonexistent/input.txt"),
            output_dir: Path::new("/nonexistent"),
            args: &args,
            runner: &runner,
        }
        .run_tests(&[]);
        assert!(diagnostics.is_empty());
    }
}
