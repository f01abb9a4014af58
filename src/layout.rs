//! Fixed on-disk layout of a pipeline run.
//!
//! All transient state lives below one temp root, which is safe to delete at
//! any time:
//!
//! ```text
//! <root>/temp/download   fetched archives and installers
//! <root>/temp/build      CMake build tree
//! <root>/temp/test       test binary output files
//! <root>/temp/tools/<t>  isolated, version-pinned tool installs
//! ```

use crate::config::LayoutConfig;
use crate::toolchain::download::BestEffort;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    pub root: PathBuf,
    pub packages: PathBuf,
    pub temp: PathBuf,
    pub download: PathBuf,
    pub build: PathBuf,
    pub test: PathBuf,
    pub tools: PathBuf,
}

impl DirectoryLayout {
    pub fn new(root: &Path, config: &LayoutConfig) -> Result<Self> {
        let root = std::path::absolute(root)
            .with_context(|| format!("Failed to resolve project root {}", root.display()))?;
        let temp = root.join(&config.temp_dir);
        Ok(Self {
            packages: root.join(&config.source_dir),
            download: temp.join("download"),
            build: temp.join("build"),
            test: temp.join("test"),
            tools: temp.join("tools"),
            temp,
            root,
        })
    }

    /// Install root of one provisioned tool.
    pub fn tool_root(&self, tool: &str) -> PathBuf {
        self.tools.join(tool)
    }

    /// Create every transient directory. The only place directories are made.
    pub fn bootstrap(&self) -> Result<()> {
        for dir in [&self.download, &self.build, &self.test, &self.tools] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    /// Remove the temp root. Missing directories are not an error.
    pub fn clean(&self) -> BestEffort {
        match fs::remove_dir_all(&self.temp) {
            Ok(()) => BestEffort::ok(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BestEffort::ok(),
            Err(e) => BestEffort::warned(format!(
                "Failed to remove {}: {}",
                self.temp.display(),
                e
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_absolute_and_nested() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::new(dir.path(), &LayoutConfig::default()).unwrap();
        assert!(layout.root.is_absolute());
        assert_eq!(layout.packages, layout.root.join("packages"));
        assert!(layout.download.starts_with(&layout.temp));
        assert!(layout.tools.starts_with(&layout.temp));
        assert_eq!(layout.tool_root("cmake"), layout.temp.join("tools").join("cmake"));
    }

    #[test]
    fn test_bootstrap_then_clean() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::new(dir.path(), &LayoutConfig::default()).unwrap();
        layout.bootstrap().unwrap();
        assert!(layout.build.is_dir());
        assert!(layout.test.is_dir());

        assert!(layout.clean().warning.is_none());
        assert!(!layout.temp.exists());
        // Cleaning twice is fine.
        assert!(layout.clean().warning.is_none());
    }
}
