use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "nebuild.toml";

/// Contents of `nebuild.toml`. Every section is optional.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub layout: LayoutConfig,
    pub analysis: AnalysisConfig,
    pub doc: DocConfig,
    pub build: BuildConfig,
    pub test: TestConfig,
    pub process: ProcessConfig,
    pub tools: HashMap<String, ToolOverride>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LayoutConfig {
    pub source_dir: String,
    pub temp_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            source_dir: "packages".to_string(),
            temp_dir: "temp".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub extensions: Vec<String>,
    pub tidy_args: Vec<String>,
    pub jobs: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["c".into(), "cpp".into(), "h".into()],
            tidy_args: vec!["-checks=*".into(), "-header-filter=.*".into()],
            jobs: 1,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DocConfig {
    pub doxyfile: String,
}

impl Default for DocConfig {
    fn default() -> Self {
        Self {
            doxyfile: "Doxyfile".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BuildConfig {
    pub configuration: String,
    pub configure_args: Vec<String>,
    /// Regex; matching build-log lines are reported as errors.
    pub failure_marker: String,
    pub test_targets: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            configuration: "Release".to_string(),
            configure_args: Vec::new(),
            failure_marker: crate::build::DEFAULT_FAILURE_MARKER.to_string(),
            test_targets: vec!["test_core".to_string()],
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TestConfig {
    /// Relative to the source directory.
    pub input: String,
    pub args: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            input: "test_core/input.txt".to_string(),
            args: vec!["--simulated_environment".to_string()],
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ProcessConfig {
    pub launch_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            launch_attempts: crate::process::DEFAULT_LAUNCH_ATTEMPTS,
            retry_delay_ms: crate::process::DEFAULT_RETRY_DELAY.as_millis() as u64,
        }
    }
}

/// Per-tool adjustments to the built-in descriptors.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ToolOverride {
    /// Replaces the download URL for the host platform.
    pub url: Option<String>,
    pub sha256: Option<String>,
    /// Version string expected in `--version` output.
    pub version: Option<String>,
    /// Absolute directory holding pre-installed executables.
    pub bin_dir: Option<String>,
}

impl PipelineConfig {
    /// Load `nebuild.toml` from `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let config_str = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&config_str)
            .with_context(|| format!("Failed to parse {} - check for syntax errors", path.display()))
    }

    pub fn parse(config_str: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(config_str)?;
        regex::Regex::new(&config.build.failure_marker)
            .context("build.failure_marker is not a valid regular expression")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load(dir.path()).unwrap();
        assert_eq!(config.layout.source_dir, "packages");
        assert_eq!(config.layout.temp_dir, "temp");
        assert_eq!(config.analysis.extensions, ["c", "cpp", "h"]);
        assert_eq!(config.build.configuration, "Release");
        assert_eq!(config.process.launch_attempts, 10);
        assert!(config.tools.is_empty());
    }

    #[test]
    fn test_partial_file() {
        let config = PipelineConfig::parse(
            r#"
[analysis]
extensions = ["c", "cpp", "h", "hpp"]
jobs = 4

[tools.cmake]
bin_dir = "/opt/cmake/bin"
version = "3.27.0"
"#,
        )
        .unwrap();
        assert_eq!(config.analysis.jobs, 4);
        assert!(config.analysis.extensions.contains(&"hpp".to_string()));
        // Untouched sections keep their defaults.
        assert_eq!(config.analysis.tidy_args, ["-checks=*", "-header-filter=.*"]);
        assert_eq!(config.test.args, ["--simulated_environment"]);
        let cmake = &config.tools["cmake"];
        assert_eq!(cmake.bin_dir.as_deref(), Some("/opt/cmake/bin"));
        assert!(cmake.url.is_none());
    }

    #[test]
    fn test_rejects_bad_failure_marker() {
        let err = PipelineConfig::parse("[build]\nfailure_marker = \"(unclosed\"\n").unwrap_err();
        assert!(err.to_string().contains("failure_marker"));
    }

    #[test]
    fn test_reports_syntax_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[build\n").unwrap();
        let err = PipelineConfig::load(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(CONFIG_FILE));
    }
}
