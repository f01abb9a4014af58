use crate::config::ToolOverride;
use crate::layout::DirectoryLayout;
use crate::process::{Invocation, ProcessRunner};
use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// Build-host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    pub fn current() -> Option<Platform> {
        if cfg!(windows) {
            Some(Platform::Windows)
        } else if cfg!(target_os = "macos") {
            Some(Platform::MacOs)
        } else if cfg!(target_os = "linux") {
            Some(Platform::Linux)
        } else {
            None
        }
    }

    pub fn exe_suffix(&self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            _ => "",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    TarXz,
    Tar,
}

impl ArchiveKind {
    pub fn from_path(path: &Path) -> Option<ArchiveKind> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(ArchiveKind::TarXz)
        } else if name.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallProcedure {
    /// Unpack into the tool root.
    Archive(ArchiveKind),
    /// Run the downloaded installer. `{install_dir}` in the arguments is
    /// replaced with the tool root.
    NativeInstaller { args: Vec<String> },
}

/// Where to get a tool on one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSource {
    pub url: Option<String>,
    /// File name inside the download directory.
    pub file_name: String,
    pub sha256: Option<String>,
    pub procedure: InstallProcedure,
    /// Executable directory, relative to the tool root.
    pub bin_dir: String,
}

impl ToolSource {
    /// Archive source; the archive kind comes from the URL's file name.
    pub fn archive(url: &str, bin_dir: &str) -> Self {
        let file_name = url.rsplit('/').next().unwrap_or(url).to_string();
        let kind = ArchiveKind::from_path(Path::new(&file_name)).unwrap_or(ArchiveKind::Zip);
        Self {
            url: Some(url.to_string()),
            file_name,
            sha256: None,
            procedure: InstallProcedure::Archive(kind),
            bin_dir: bin_dir.to_string(),
        }
    }

    pub fn installer(url: &str, args: &[&str], bin_dir: &str) -> Self {
        let file_name = url.rsplit('/').next().unwrap_or(url).to_string();
        Self {
            url: Some(url.to_string()),
            file_name,
            sha256: None,
            procedure: InstallProcedure::NativeInstaller {
                args: args.iter().map(|s| s.to_string()).collect(),
            },
            bin_dir: bin_dir.to_string(),
        }
    }
}

/// Answers "is this tool installed and usable?".
pub trait CapabilityProbe: Send + Sync {
    fn is_usable(&self, tool: &ToolDescriptor, paths: &ResolvedToolPaths, runner: &ProcessRunner)
    -> bool;
}

impl<F> CapabilityProbe for F
where
    F: Fn(&ToolDescriptor, &ResolvedToolPaths, &ProcessRunner) -> bool + Send + Sync,
{
    fn is_usable(
        &self,
        tool: &ToolDescriptor,
        paths: &ResolvedToolPaths,
        runner: &ProcessRunner,
    ) -> bool {
        self(tool, paths, runner)
    }
}

/// Every executable exists, runs `--version` successfully and reports the
/// pinned version.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionProbe;

impl CapabilityProbe for VersionProbe {
    fn is_usable(
        &self,
        tool: &ToolDescriptor,
        paths: &ResolvedToolPaths,
        runner: &ProcessRunner,
    ) -> bool {
        tool.executables.iter().all(|exe| {
            let Some(path) = paths.usable(exe) else {
                return false;
            };
            match runner.run(&Invocation::new(path).arg("--version")) {
                Some(result) if result.success => {
                    tool.version.is_empty() || result.stdout_text().contains(&tool.version)
                }
                _ => false,
            }
        })
    }
}

/// Immutable description of one provisioned tool.
pub struct ToolDescriptor {
    pub name: String,
    pub version: String,
    pub executables: Vec<String>,
    pub probe: Option<Box<dyn CapabilityProbe>>,
    pub sources: BTreeMap<Platform, ToolSource>,
    /// Pre-installed executable directory; bypasses the isolated root.
    pub bin_dir_override: Option<PathBuf>,
}

impl ToolDescriptor {
    pub fn new(name: &str, version: &str, executables: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            executables: executables.iter().map(|s| s.to_string()).collect(),
            probe: Some(Box::new(VersionProbe)),
            sources: BTreeMap::new(),
            bin_dir_override: None,
        }
    }

    pub fn source(mut self, platform: Platform, source: ToolSource) -> Self {
        self.sources.insert(platform, source);
        self
    }

    pub fn with_probe(mut self, probe: impl CapabilityProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    pub fn without_probe(mut self) -> Self {
        self.probe = None;
        self
    }

    pub fn source_for(&self, platform: Platform) -> Option<&ToolSource> {
        self.sources.get(&platform)
    }

    /// Apply a config override to the host platform's entry.
    ///
    /// A replacement URL for an archive source also re-derives the archive
    /// kind from its file name.
    pub fn apply_override(&mut self, platform: Platform, over: &ToolOverride) -> Result<()> {
        if let Some(version) = &over.version {
            self.version = version.clone();
        }
        if let Some(bin_dir) = &over.bin_dir {
            let dir = PathBuf::from(bin_dir);
            if !dir.is_absolute() {
                bail!("tools.{}.bin_dir must be an absolute path, got {:?}", self.name, bin_dir);
            }
            self.bin_dir_override = Some(dir);
        }
        if let Some(source) = self.sources.get_mut(&platform) {
            if let Some(url) = &over.url {
                let Some(name) = url.rsplit('/').next().filter(|n| !n.is_empty()) else {
                    bail!("tools.{}.url has no file name: {}", self.name, url);
                };
                if let InstallProcedure::Archive(_) = source.procedure {
                    let Some(kind) = ArchiveKind::from_path(Path::new(name)) else {
                        bail!("tools.{}.url is not a recognized archive: {}", self.name, name);
                    };
                    source.procedure = InstallProcedure::Archive(kind);
                }
                source.url = Some(url.clone());
                source.file_name = name.to_string();
            }
            if over.sha256.is_some() {
                source.sha256 = over.sha256.clone();
            }
        }
        Ok(())
    }

    /// Absolute directory the executables are expected in.
    pub fn bin_dir(&self, layout: &DirectoryLayout, platform: Platform) -> PathBuf {
        if let Some(dir) = &self.bin_dir_override {
            return dir.clone();
        }
        let root = layout.tool_root(&self.name);
        match self.source_for(platform) {
            Some(source) if !source.bin_dir.is_empty() => root.join(&source.bin_dir),
            Some(_) => root,
            None => root.join("bin"),
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("executables", &self.executables)
            .field("has_probe", &self.probe.is_some())
            .field("sources", &self.sources)
            .finish()
    }
}

/// Executable name → absolute path below the isolated install root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedToolPaths {
    paths: HashMap<String, PathBuf>,
}

impl ResolvedToolPaths {
    pub fn resolve(layout: &DirectoryLayout, platform: Platform, tools: &[ToolDescriptor]) -> Self {
        let mut paths = HashMap::new();
        for tool in tools {
            let bin_dir = tool.bin_dir(layout, platform);
            for exe in &tool.executables {
                let file = format!("{}{}", exe, platform.exe_suffix());
                paths.insert(exe.clone(), bin_dir.join(file));
            }
        }
        Self { paths }
    }

    /// Resolved path, whether or not it exists yet.
    pub fn get(&self, executable: &str) -> Option<&Path> {
        self.paths.get(executable).map(PathBuf::as_path)
    }

    /// Resolved path, only when the file is present.
    pub fn usable(&self, executable: &str) -> Option<&Path> {
        self.get(executable).filter(|p| p.is_file())
    }

    pub fn insert(&mut self, executable: &str, path: PathBuf) {
        self.paths.insert(executable.to_string(), path);
    }
}
