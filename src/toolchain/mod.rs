//! Toolchain provisioning
//!
//! The pipeline never looks tools up on PATH. Each tool is pinned to a
//! version and installed into its own directory under `temp/tools`, so two
//! checkouts can never disagree about which clang-format they ran.

pub mod archive;
pub mod download;
pub mod install;
pub mod types;

pub use install::{Acquirer, NetworkAcquirer, Provisioner, ToolStatus};
pub use types::{Platform, ResolvedToolPaths, ToolDescriptor, ToolSource};

use crate::config::ToolOverride;
use anyhow::Result;
use std::collections::HashMap;

pub const LLVM_VERSION: &str = "17.0.6";
pub const DOXYGEN_VERSION: &str = "1.9.8";
pub const CMAKE_VERSION: &str = "3.28.1";

const LLVM_RELEASES: &str = "https://github.com/llvm/llvm-project/releases/download";
const CMAKE_RELEASES: &str = "https://github.com/Kitware/CMake/releases/download";

pub fn llvm() -> ToolDescriptor {
    let base = format!("{}/llvmorg-{}", LLVM_RELEASES, LLVM_VERSION);
    ToolDescriptor::new("llvm", LLVM_VERSION, &["clang-tidy", "clang-format"])
        .source(
            Platform::Linux,
            ToolSource::archive(
                &format!(
                    "{}/clang+llvm-{}-x86_64-linux-gnu-ubuntu-22.04.tar.xz",
                    base, LLVM_VERSION
                ),
                "bin",
            ),
        )
        .source(
            Platform::MacOs,
            ToolSource::archive(
                &format!("{}/clang+llvm-{}-arm64-apple-darwin22.0.tar.xz", base, LLVM_VERSION),
                "bin",
            ),
        )
        .source(
            Platform::Windows,
            ToolSource::installer(
                &format!("{}/LLVM-{}-win64.exe", base, LLVM_VERSION),
                &["/S", "/D={install_dir}"],
                "bin",
            ),
        )
}

/// No macOS download; users there point `tools.doxygen.bin_dir` at a local install.
pub fn doxygen() -> ToolDescriptor {
    let base = "https://www.doxygen.nl/files";
    ToolDescriptor::new("doxygen", DOXYGEN_VERSION, &["doxygen"])
        .source(
            Platform::Linux,
            ToolSource::archive(
                &format!("{}/doxygen-{}.linux.bin.tar.gz", base, DOXYGEN_VERSION),
                "bin",
            ),
        )
        .source(
            Platform::Windows,
            ToolSource::archive(
                &format!("{}/doxygen-{}.windows.x64.bin.zip", base, DOXYGEN_VERSION),
                "",
            ),
        )
}

pub fn cmake() -> ToolDescriptor {
    let base = format!("{}/v{}", CMAKE_RELEASES, CMAKE_VERSION);
    ToolDescriptor::new("cmake", CMAKE_VERSION, &["cmake"])
        .source(
            Platform::Linux,
            ToolSource::archive(
                &format!("{}/cmake-{}-linux-x86_64.tar.gz", base, CMAKE_VERSION),
                "bin",
            ),
        )
        .source(
            Platform::MacOs,
            ToolSource::archive(
                &format!("{}/cmake-{}-macos-universal.tar.gz", base, CMAKE_VERSION),
                "CMake.app/Contents/bin",
            ),
        )
        .source(
            Platform::Windows,
            ToolSource::archive(
                &format!("{}/cmake-{}-windows-x86_64.zip", base, CMAKE_VERSION),
                "bin",
            ),
        )
}

/// The three built-in tools, with `[tools.<name>]` overrides applied.
pub fn builtin_tools(
    platform: Option<Platform>,
    overrides: &HashMap<String, ToolOverride>,
) -> Result<Vec<ToolDescriptor>> {
    let mut tools = vec![llvm(), doxygen(), cmake()];
    if let Some(platform) = platform {
        for tool in &mut tools {
            if let Some(over) = overrides.get(&tool.name) {
                tool.apply_override(platform, over)?;
            }
        }
    }
    Ok(tools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::layout::DirectoryLayout;
    use std::path::Path;

    #[test]
    fn test_builtin_catalog() {
        let tools = builtin_tools(Some(Platform::Linux), &HashMap::new()).unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["llvm", "doxygen", "cmake"]);
        assert!(tools.iter().all(|t| t.probe.is_some()));
        assert!(doxygen().source_for(Platform::MacOs).is_none());
    }

    #[test]
    fn test_llvm_windows_uses_installer() {
        let llvm = llvm();
        let source = llvm.source_for(Platform::Windows).unwrap();
        assert_eq!(source.file_name, "LLVM-17.0.6-win64.exe");
        assert!(matches!(
            source.procedure,
            types::InstallProcedure::NativeInstaller { .. }
        ));
    }

    #[test]
    fn test_cmake_macos_bin_dir_is_inside_app_bundle() {
        let layout = DirectoryLayout::new(Path::new("/p"), &LayoutConfig::default()).unwrap();
        let paths = ResolvedToolPaths::resolve(&layout, Platform::MacOs, &[cmake()]);
        assert!(paths
            .get("cmake")
            .unwrap()
            .ends_with("tools/cmake/CMake.app/Contents/bin/cmake"));
    }

    #[test]
    fn test_overrides_are_keyed_by_tool_name() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "doxygen".to_string(),
            ToolOverride {
                version: Some("1.10.0".into()),
                ..Default::default()
            },
        );
        let tools = builtin_tools(Some(Platform::Linux), &overrides).unwrap();
        assert_eq!(tools[1].version, "1.10.0");
        assert_eq!(tools[0].version, LLVM_VERSION);
    }

    #[test]
    fn test_mirror_url_for_llvm_switches_to_gzip() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "llvm".to_string(),
            ToolOverride {
                url: Some("https://mirror.example/llvm-17.0.6.tar.gz".into()),
                ..Default::default()
            },
        );
        let tools = builtin_tools(Some(Platform::Linux), &overrides).unwrap();
        assert_eq!(
            tools[0].source_for(Platform::Linux).unwrap().procedure,
            types::InstallProcedure::Archive(types::ArchiveKind::TarGz)
        );
    }

    #[test]
    fn test_invalid_override_fails_catalog() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "cmake".to_string(),
            ToolOverride {
                bin_dir: Some("relative/bin".into()),
                ..Default::default()
            },
        );
        assert!(builtin_tools(Some(Platform::Linux), &overrides).is_err());
    }
}
