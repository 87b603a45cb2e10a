//! Archive extraction and build-descriptor discovery.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::InstallError;

/// Files that make a directory installable by the package manager.
pub const BUILD_DESCRIPTORS: &[&str] = &["pyproject.toml", "setup.py"];

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a file name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }
}

/// Extract `archive` into `dest`. Entries escaping `dest` are rejected.
pub fn extract(archive: &Path, format: ArchiveFormat, dest: &Path) -> Result<(), InstallError> {
    fs::create_dir_all(dest)?;
    match format {
        ArchiveFormat::TarGz => extract_tar_gz(archive, dest),
        ArchiveFormat::Zip => extract_zip(archive, dest),
    }
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<(), InstallError> {
    use flate2::read::GzDecoder;

    let file = fs::File::open(archive)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    for entry in archive
        .entries()
        .map_err(|e| InstallError::Archive(format!("Failed to read archive entries: {}", e)))?
    {
        let mut entry = entry
            .map_err(|e| InstallError::Archive(format!("Failed to read archive entry: {}", e)))?;
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| InstallError::Archive(format!("Failed to extract file: {}", e)))?;
        if !unpacked {
            let path = entry.path().map(|p| p.display().to_string()).unwrap_or_default();
            return Err(InstallError::Archive(format!(
                "Entry escapes destination: {}",
                path
            )));
        }
    }

    Ok(())
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<(), InstallError> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| InstallError::Archive(format!("Failed to open zip: {}", e)))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| InstallError::Archive(format!("Failed to read zip entry: {}", e)))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(InstallError::Archive(format!(
                "Entry escapes destination: {}",
                entry.name()
            )));
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out_file = fs::File::create(&out_path)?;
            io::copy(&mut entry, &mut out_file)?;
        }
    }

    Ok(())
}

/// The shallowest directory under `root` holding a build descriptor.
pub fn find_build_root(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|name| BUILD_DESCRIPTORS.contains(&name))
        })
        .min_by_key(|e| e.depth())
        .and_then(|e| e.path().parent().map(Path::to_path_buf))
}

/// The directory whose contents should be installed directly.
///
/// A single top-level directory is unwrapped unless it is itself a package.
pub fn content_root(root: &Path) -> Result<PathBuf, InstallError> {
    let entries: Vec<_> = fs::read_dir(root)?.filter_map(Result::ok).collect();
    if entries.len() == 1 {
        let only = entries[0].path();
        if only.is_dir() && !only.join("__init__.py").exists() {
            return Ok(only);
        }
    }
    Ok(root.to_path_buf())
}

/// Recursively copy the contents of `from` into `to`, overwriting files.
pub fn copy_tree(from: &Path, to: &Path) -> Result<(), InstallError> {
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(|e| InstallError::Archive(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| InstallError::Archive(e.to_string()))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
