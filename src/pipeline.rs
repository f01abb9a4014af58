//! Pipeline executor.
//!
//! Steps run in the fixed order given by the selected [`Command`]. A failing
//! step never stops the ones after it; the one exception is that the test
//! step only runs binaries the build step actually produced. The verdict is
//! computed here and nowhere else.

use crate::build::{self, BuildRunner, LineClassifier, RegexClassifier, TestRunner};
use crate::checker::{self, Analyzer};
use crate::config::PipelineConfig;
use crate::diagnostic::{Diagnostics, Stage, Verdict};
use crate::doc;
use crate::layout::DirectoryLayout;
use crate::process::{ProcessRunner, SystemLauncher};
use crate::toolchain::download::Downloader;
use crate::toolchain::{
    self, Acquirer, NetworkAcquirer, Platform, Provisioner, ResolvedToolPaths, ToolDescriptor,
    ToolStatus,
};
use crate::ui::Table;
use anyhow::Result;
use colored::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Clean,
    Provision,
    Analyze,
    Doc,
    Build,
    Test,
}

/// A named set of steps selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// No command given.
    Default,
    Clean,
    Provision,
    Analyze,
    Doc,
    Build,
    Test,
    All,
}

impl Command {
    pub fn steps(&self) -> &'static [Step] {
        use Step::*;
        match self {
            Command::Default => &[Clean, Provision, Build],
            Command::Clean => &[Clean],
            Command::Provision => &[Provision],
            Command::Analyze => &[Provision, Analyze],
            Command::Doc => &[Provision, Doc],
            Command::Build => &[Provision, Build],
            Command::Test => &[Provision, Build, Test],
            Command::All => &[Provision, Analyze, Doc, Build, Test],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolReport {
    pub name: String,
    pub version: String,
    pub status: ToolStatus,
}

/// Everything a run produced, as written by `--report`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub verdict: Verdict,
    pub diagnostics: Diagnostics,
    pub tools: Vec<ToolReport>,
}

pub struct Pipeline {
    layout: DirectoryLayout,
    config: PipelineConfig,
    platform: Option<Platform>,
    tools: Vec<ToolDescriptor>,
    runner: ProcessRunner,
    acquirer: Box<dyn Acquirer>,
    classifier: Box<dyn LineClassifier>,
}

impl Pipeline {
    pub fn new(layout: DirectoryLayout, config: PipelineConfig) -> Result<Self> {
        let platform = Platform::current();
        let runner = ProcessRunner::new(
            Arc::new(SystemLauncher),
            config.process.launch_attempts,
            Duration::from_millis(config.process.retry_delay_ms),
        );
        let classifier = RegexClassifier::new(&config.build.failure_marker)?;
        Ok(Self {
            tools: toolchain::builtin_tools(platform, &config.tools)?,
            acquirer: Box::new(NetworkAcquirer::new(Downloader::default(), runner.clone())),
            classifier: Box::new(classifier),
            layout,
            config,
            platform,
            runner,
        })
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_acquirer(mut self, acquirer: impl Acquirer + 'static) -> Self {
        self.acquirer = Box::new(acquirer);
        self
    }

    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_platform(mut self, platform: Option<Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_classifier(mut self, classifier: impl LineClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    pub fn resolved_paths(&self) -> ResolvedToolPaths {
        match self.platform {
            Some(platform) => ResolvedToolPaths::resolve(&self.layout, platform, &self.tools),
            None => ResolvedToolPaths::default(),
        }
    }

    pub fn run(&self, steps: &[Step]) -> RunReport {
        let mut diagnostics = Diagnostics::new();
        let mut tools = Vec::new();
        let paths = self.resolved_paths();

        if let Err(e) = self.layout.bootstrap() {
            diagnostics.error(
                Stage::Clean,
                self.layout.temp.display().to_string(),
                format!("{:#}", e),
            );
        }

        let mut binaries: Vec<PathBuf> = Vec::new();
        for step in steps {
            info!("step {:?}", step);
            match step {
                Step::Clean => diagnostics.extend(build::clean(&self.layout)),
                Step::Provision => tools = self.provision(&paths, &mut diagnostics),
                Step::Analyze => diagnostics.extend(self.analyze(&paths)),
                Step::Doc => diagnostics.extend(doc::generate_docs(
                    &self.layout.root,
                    &self.config.doc.doxyfile,
                    &paths,
                    &self.runner,
                )),
                Step::Build => {
                    binaries = self.build_runner(&paths).configure_and_build(&mut diagnostics);
                }
                Step::Test => {
                    if binaries.is_empty() {
                        info!("no test binaries; skipping tests");
                        continue;
                    }
                    let input = self.layout.packages.join(&self.config.test.input);
                    diagnostics.extend(
                        TestRunner {
                            input: &input,
                            output_dir: &self.layout.test,
                            args: &self.config.test.args,
                            runner: &self.runner,
                        }
                        .run_tests(&binaries),
                    );
                }
            }
        }

        RunReport {
            verdict: diagnostics.verdict(),
            diagnostics,
            tools,
        }
    }

    fn provision(&self, paths: &ResolvedToolPaths, diagnostics: &mut Diagnostics) -> Vec<ToolReport> {
        let provisioner = Provisioner {
            layout: &self.layout,
            platform: self.platform,
            paths,
            runner: &self.runner,
            acquirer: self.acquirer.as_ref(),
        };

        let mut table = Table::new(&["Tool", "Version", "Status", "Location"]);
        let mut reports = Vec::new();
        for tool in &self.tools {
            let status = provisioner.ensure(tool, diagnostics);
            let location = match self.platform {
                Some(platform) => tool.bin_dir(&self.layout, platform).display().to_string(),
                None => "-".to_string(),
            };
            let shown = match status {
                ToolStatus::Ready | ToolStatus::Installed => status.to_string().green(),
                ToolStatus::Unsupported => status.to_string().yellow(),
                ToolStatus::Failed => status.to_string().red(),
            };
            table.add_row(vec![
                tool.name.clone(),
                tool.version.clone(),
                shown.to_string(),
                location,
            ]);
            reports.push(ToolReport {
                name: tool.name.clone(),
                version: tool.version.clone(),
                status,
            });
        }
        table.print();
        reports
    }

    fn analyze(&self, paths: &ResolvedToolPaths) -> Diagnostics {
        let root = &self.layout.packages;
        if !root.is_dir() {
            let mut diagnostics = Diagnostics::new();
            diagnostics.info(
                Stage::Analyze,
                root.display().to_string(),
                "skipped: source directory does not exist",
            );
            return diagnostics;
        }
        let files = checker::discover_sources(root, &self.config.analysis.extensions);
        info!("discovered {} source files", files.len());
        Analyzer {
            source_root: root,
            paths,
            runner: &self.runner,
            config: &self.config.analysis,
        }
        .analyze(&files)
    }

    fn build_runner<'a>(&'a self, paths: &'a ResolvedToolPaths) -> BuildRunner<'a> {
        BuildRunner {
            layout: &self.layout,
            config: &self.config.build,
            // Only consulted once cmake resolved, which needs a platform.
            platform: self.platform.unwrap_or(Platform::Linux),
            paths,
            runner: &self.runner,
            classifier: self.classifier.as_ref(),
        }
    }
}
