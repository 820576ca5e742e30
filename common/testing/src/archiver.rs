// Licensed under the Apache-2.0 license

//! Per-test artifact collection and zip bundling.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Collects artifacts (update logs, journal dumps) under one directory,
/// keyed by test id, and bundles them into a zip at the end of a run.
pub struct Archiver {
    root: PathBuf,
}

impl Archiver {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create archive dir {}", root.display()))?;
        Ok(Archiver { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies `path` into the archive under `id`, keeping its file name.
    pub fn add(&self, id: &str, path: &Path) -> Result<PathBuf> {
        let name = path
            .file_name()
            .with_context(|| format!("{} has no file name", path.display()))?;
        let dest_dir = self.root.join(id);
        fs::create_dir_all(&dest_dir)?;
        let dest = dest_dir.join(name);
        fs::copy(path, &dest)
            .with_context(|| format!("failed to archive {}", path.display()))?;
        Ok(dest)
    }

    /// Stores raw contents as `name` under `id`.
    pub fn add_bytes(&self, id: &str, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let dest_dir = self.root.join(id);
        fs::create_dir_all(&dest_dir)?;
        let dest = dest_dir.join(name);
        fs::write(&dest, contents)
            .with_context(|| format!("failed to write artifact {}", dest.display()))?;
        Ok(dest)
    }

    /// Bundles everything collected so far into a zip at `output`.
    pub fn archive(&self, output: &Path) -> Result<()> {
        let file = File::create(output)
            .with_context(|| format!("failed to create {}", output.display()))?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .expect("walked path outside archive root");
            zip.start_file(rel.to_string_lossy(), options)?;
            let mut reader = File::open(entry.path())?;
            io::copy(&mut reader, &mut zip)?;
        }
        zip.finish()?;
        Ok(())
    }
}
