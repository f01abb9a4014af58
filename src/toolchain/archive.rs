//! Archive extraction with single-root hoisting.
//!
//! Release archives usually wrap everything in one version-named folder
//! (`cmake-3.28.1-linux-x86_64/bin/cmake`). When the extracted tree has
//! exactly one directory and no files at its top level, that directory's
//! contents become the install root.

use super::types::ArchiveKind;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extract `archive` into `extract_dir`, replacing whatever was there.
pub fn install(archive: &Path, extract_dir: &Path) -> Result<()> {
    let kind = ArchiveKind::from_path(archive)
        .with_context(|| format!("Unrecognized archive format: {}", archive.display()))?;
    install_kind(archive, kind, extract_dir)
}

pub fn install_kind(archive: &Path, kind: ArchiveKind, extract_dir: &Path) -> Result<()> {
    let scratch = scratch_dir_for(extract_dir);
    remove_dir_if_present(&scratch)?;
    fs::create_dir_all(&scratch)
        .with_context(|| format!("Failed to create {}", scratch.display()))?;

    let result = extract(archive, kind, &scratch).and_then(|()| promote(&scratch, extract_dir));

    if let Err(e) = remove_dir_if_present(&scratch) {
        warn!("leaving scratch directory behind: {:#}", e);
    }
    result
}

fn scratch_dir_for(extract_dir: &Path) -> PathBuf {
    let name = extract_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());
    extract_dir.with_file_name(format!(".{}.scratch", name))
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", dir.display())),
    }
}

fn extract(archive: &Path, kind: ArchiveKind, target_dir: &Path) -> Result<()> {
    debug!("extracting {} ({:?})", archive.display(), kind);
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    let reader = BufReader::new(file);

    match kind {
        ArchiveKind::Zip => extract_zip(reader, target_dir),
        ArchiveKind::TarGz => extract_tar(flate2::read::GzDecoder::new(reader), target_dir),
        ArchiveKind::TarXz => extract_tar(xz2::read::XzDecoder::new(reader), target_dir),
        ArchiveKind::Tar => extract_tar(reader, target_dir),
    }
    .with_context(|| format!("Failed to extract {}", archive.display()))
}

fn extract_tar<R: Read>(reader: R, target_dir: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.unpack(target_dir)?;
    Ok(())
}

fn extract_zip<R: Read + std::io::Seek>(reader: R, target_dir: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(reader)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let outpath = match file.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => continue,
        };

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(p) = outpath.parent() {
            fs::create_dir_all(p)?;
        }
        let mut outfile = File::create(&outpath)?;
        std::io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

/// The directory whose contents should become the install root.
fn content_root(scratch: &Path) -> Result<PathBuf> {
    let mut dirs = Vec::new();
    let mut files = 0usize;
    for entry in fs::read_dir(scratch)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        } else {
            files += 1;
        }
    }

    if dirs.len() == 1 && files == 0 {
        Ok(dirs.remove(0))
    } else {
        Ok(scratch.to_path_buf())
    }
}

fn promote(scratch: &Path, extract_dir: &Path) -> Result<()> {
    let root = content_root(scratch)?;
    if root != scratch {
        debug!("hoisting single root {}", root.display());
    }

    remove_dir_if_present(extract_dir)?;
    if let Some(parent) = extract_dir.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(&root, extract_dir).with_context(|| {
        format!(
            "Failed to move {} to {}",
            root.display(),
            extract_dir.display()
        )
    })
}
