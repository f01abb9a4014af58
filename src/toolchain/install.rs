//! Idempotent toolchain provisioning.
//!
//! `ensure` is run on every pipeline invocation, so the common case is the
//! probe succeeding and nothing else happening. Only when the probe fails is
//! the host platform's source downloaded and installed, after which the probe
//! is re-run as the real success check.

use super::archive;
use super::download::{self, BestEffort, Downloader};
use super::types::{InstallProcedure, Platform, ResolvedToolPaths, ToolDescriptor, ToolSource};
use crate::diagnostic::{Diagnostics, Stage};
use crate::layout::DirectoryLayout;
use crate::process::{Invocation, ProcessRunner, StdioRoute};
use anyhow::{Result, bail};
use colored::*;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Side-effecting half of provisioning, swappable in tests.
pub trait Acquirer: Send + Sync {
    fn download(&self, url: &str, dest: &Path) -> BestEffort;
    fn unpack(&self, archive: &Path, source: &ToolSource, extract_dir: &Path) -> Result<()>;
    fn run_installer(&self, installer: &Path, args: &[String]) -> Result<()>;
}

/// Real network + filesystem + installer-process acquirer.
pub struct NetworkAcquirer {
    downloader: Downloader,
    runner: ProcessRunner,
}

impl NetworkAcquirer {
    pub fn new(downloader: Downloader, runner: ProcessRunner) -> Self {
        Self { downloader, runner }
    }
}

impl Acquirer for NetworkAcquirer {
    fn download(&self, url: &str, dest: &Path) -> BestEffort {
        self.downloader.download(url, dest)
    }

    fn unpack(&self, archive: &Path, source: &ToolSource, extract_dir: &Path) -> Result<()> {
        match &source.procedure {
            InstallProcedure::Archive(kind) => archive::install_kind(archive, *kind, extract_dir),
            InstallProcedure::NativeInstaller { .. } => {
                bail!("{} is an installer, not an archive", archive.display())
            }
        }
    }

    fn run_installer(&self, installer: &Path, args: &[String]) -> Result<()> {
        let invocation = Invocation::new(installer)
            .args(args.iter().cloned())
            .stdout(StdioRoute::Ignore)
            .stderr(StdioRoute::Capture);
        match self.runner.run(&invocation) {
            Some(result) if result.success => Ok(()),
            Some(result) => bail!(
                "installer {} failed with {}: {}",
                installer.display(),
                result.exit_label(),
                result.stderr_text().trim()
            ),
            None => bail!("installer {} could not be launched", installer.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// Probe passed without doing anything.
    Ready,
    /// Downloaded/installed and the probe now passes.
    Installed,
    /// No source for this platform; nothing attempted.
    Unsupported,
    /// Provisioning attempted but the tool is still unusable.
    Failed,
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolStatus::Ready => "ready",
            ToolStatus::Installed => "installed",
            ToolStatus::Unsupported => "unsupported",
            ToolStatus::Failed => "failed",
        })
    }
}

pub struct Provisioner<'a> {
    pub layout: &'a DirectoryLayout,
    pub platform: Option<Platform>,
    pub paths: &'a ResolvedToolPaths,
    pub runner: &'a ProcessRunner,
    pub acquirer: &'a dyn Acquirer,
}

impl Provisioner<'_> {
    fn probe(&self, tool: &ToolDescriptor) -> Option<bool> {
        tool.probe
            .as_ref()
            .map(|probe| probe.is_usable(tool, self.paths, self.runner))
    }

    pub fn ensure(&self, tool: &ToolDescriptor, diagnostics: &mut Diagnostics) -> ToolStatus {
        if self.probe(tool) == Some(true) {
            debug!("{} {} already usable", tool.name, tool.version);
            return ToolStatus::Ready;
        }

        let Some(platform) = self.platform else {
            diagnostics.info(
                Stage::Provision,
                &tool.name,
                "skipped: unsupported host platform",
            );
            return ToolStatus::Unsupported;
        };
        let Some(source) = tool.source_for(platform) else {
            diagnostics.info(
                Stage::Provision,
                &tool.name,
                format!("skipped: no download defined for {}", platform),
            );
            return ToolStatus::Unsupported;
        };

        println!(
            "{} Provisioning {} {}...",
            "📦".cyan(),
            tool.name.bold(),
            tool.version
        );

        if let Err(e) = self.acquire(tool, source) {
            diagnostics.error(Stage::Provision, &tool.name, format!("{:#}", e));
            return ToolStatus::Failed;
        }

        match self.probe(tool) {
            Some(false) => {
                diagnostics.error(
                    Stage::Provision,
                    &tool.name,
                    format!(
                        "{} {} is still unusable after installation",
                        tool.name, tool.version
                    ),
                );
                ToolStatus::Failed
            }
            _ => {
                println!("{} {} {} installed", "✓".green(), tool.name, tool.version);
                ToolStatus::Installed
            }
        }
    }

    fn acquire(&self, tool: &ToolDescriptor, source: &ToolSource) -> Result<()> {
        let downloaded = self.layout.download.join(&source.file_name);
        let install_root = self.layout.tool_root(&tool.name);

        if let Some(url) = &source.url {
            info!("fetching {} from {}", tool.name, url);
            if let Some(warning) = self.acquirer.download(url, &downloaded).warning {
                println!("{} {}", "!".yellow(), warning);
            }
            if !downloaded.is_file() {
                bail!("download of {} produced no file", url);
            }
            if let Some(expected) = &source.sha256 {
                download::verify_sha256(&downloaded, expected)?;
            }
        }

        match &source.procedure {
            InstallProcedure::Archive(_) => {
                self.acquirer.unpack(&downloaded, source, &install_root)
            }
            InstallProcedure::NativeInstaller { args } => {
                let install_dir = install_root.to_string_lossy();
                let args: Vec<String> = args
                    .iter()
                    .map(|a| a.replace("{install_dir}", &install_dir))
                    .collect();
                self.acquirer.run_installer(&downloaded, &args)
            }
        }
    }
}
