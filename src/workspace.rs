//! Per-evaluation scratch space
//!
//! Each evaluation owns one scratch root; each run (reference, candidate)
//! gets its own directory under it, populated with the same input bytes.
//! A run is judged only on the files it produced itself.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::shuffle::shuffle_file;

/// Display text for a file that does not exist
pub const MISSING_FILE: &str = "[NO EXISTE]";

/// Marker appended to text cut at the display limit
pub const TRUNCATION_MARKER: &str = "\n...[TRUNCADO]...";

/// Scratch root for one evaluation, removed on drop
pub struct Workspace {
    root: TempDir,
}

impl Workspace {
    /// Create a scratch root under `scratch_root` (or the system temp dir),
    /// namespaced by worker ID
    pub fn create(scratch_root: Option<&Path>, worker_id: u32) -> Result<Self> {
        let prefix = format!("judge-w{}-", worker_id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let root = match scratch_root {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create scratch root {:?}", dir))?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
        .context("Failed to create evaluation workspace")?;

        debug!("Created workspace {:?}", root.path());
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Fresh, empty directory for one run
    pub fn run_dir(&self, label: &str) -> Result<PathBuf> {
        let dir = self.root.path().join(label);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to clear run directory {:?}", dir))?;
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create run directory {:?}", dir))?;
        Ok(dir)
    }

    /// Copy attachments into a staging directory, shuffle them once, and
    /// return their final bytes. Missing attachments are skipped.
    pub fn stage_attachments(
        &self,
        names: &[String],
        attachments_dir: &Path,
        seed: u32,
        shuffle: bool,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let staging = self.run_dir("attachments")?;
        let mut staged = BTreeMap::new();

        for name in names {
            let (Some(src), Some(dst)) = (resolve(attachments_dir, name), resolve(&staging, name))
            else {
                warn!("Skipping attachment with unsafe name: {}", name);
                continue;
            };
            if !src.is_file() {
                warn!("Attachment {:?} not found, skipping", src);
                continue;
            }
            if let Some(parent) = dst.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&src, &dst)
                .with_context(|| format!("Failed to stage attachment {:?}", src))?;
            if shuffle {
                shuffle_file(&dst, seed)?;
            }
            let bytes = std::fs::read(&dst)
                .with_context(|| format!("Failed to read staged attachment {:?}", dst))?;
            staged.insert(name.clone(), bytes);
        }

        Ok(staged)
    }
}

/// Write input files into a run directory and make sure none of the
/// declared output files exist before the run
pub fn populate(
    run_dir: &Path,
    inputs: &BTreeMap<String, Vec<u8>>,
    output_files: &[String],
) -> Result<()> {
    for (name, content) in inputs {
        let Some(path) = resolve(run_dir, name) else {
            warn!("Skipping input file with unsafe name: {}", name);
            continue;
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write input file {:?}", path))?;
    }

    for name in output_files {
        if let Some(path) = resolve(run_dir, name) {
            if path.is_file() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove stale output {:?}", path))?;
            }
        }
    }

    Ok(())
}

/// Raw bytes of each named file in a run directory, `None` if absent
pub fn snapshot(run_dir: &Path, names: &[String]) -> BTreeMap<String, Option<Vec<u8>>> {
    names
        .iter()
        .map(|name| {
            let bytes = resolve(run_dir, name).and_then(|p| std::fs::read(p).ok());
            (name.clone(), bytes)
        })
        .collect()
}

/// Text shown in the report for a file's content
pub fn display_bytes(bytes: Option<&[u8]>, limit: usize) -> String {
    match bytes {
        None => MISSING_FILE.to_string(),
        Some(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => truncate_for_display(text, limit),
            Err(_) => truncate_for_display(
                &format!("[BINARIO base64] {}", general_purpose::STANDARD.encode(bytes)),
                limit,
            ),
        },
    }
}

/// Cut `text` to `limit` characters, appending the truncation marker
pub fn truncate_for_display(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}{}", &text[..idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Join a relative file name onto `dir`, refusing absolute or escaping paths
fn resolve(dir: &Path, name: &str) -> Option<PathBuf> {
    let rel = Path::new(name);
    let safe = !name.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
    safe.then(|| dir.join(rel))
}
