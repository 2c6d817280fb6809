//! Attachment shuffling
//!
//! Permutes each column of a comma-separated file independently with a
//! seeded generator. Rows are padded to a rectangle first; columns are
//! shuffled left to right, each consuming the same generator in turn.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Shuffle CSV content with a generator freshly seeded from `seed`
pub fn shuffle_content(content: &str, seed: u32) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(u64::from(seed));
    shuffle_content_with(content, &mut rng)
}

/// Shuffle CSV content drawing from `rng`.
///
/// Empty input, or input with only blank rows, produces empty output.
pub fn shuffle_content_with<R: Rng + ?Sized>(content: &str, rng: &mut R) -> String {
    let mut rows: Vec<&str> = content.lines().map(str::trim_end).collect();
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }

    let mut table: Vec<Vec<String>> = rows
        .iter()
        .filter(|r| !r.is_empty())
        .map(|r| r.split(',').map(str::to_string).collect())
        .collect();

    let Some(width) = table.iter().map(Vec::len).max() else {
        return String::new();
    };
    for row in table.iter_mut() {
        row.resize(width, String::new());
    }

    let mut columns: Vec<Vec<String>> = (0..width)
        .map(|c| table.iter().map(|row| row[c].clone()).collect())
        .collect();
    for column in columns.iter_mut() {
        column.shuffle(&mut *rng);
    }

    let mut out = String::new();
    for r in 0..table.len() {
        let row: Vec<&str> = columns.iter().map(|col| col[r].as_str()).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Shuffle a file in place, replacing it atomically
pub fn shuffle_file(path: &Path, seed: u32) -> Result<()> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let content = String::from_utf8_lossy(&raw);
    let shuffled = shuffle_content(&content, seed);

    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file next to {:?}", path))?;
    tmp.write_all(shuffled.as_bytes())?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace {:?}", path))?;

    debug!("Shuffled {:?} with seed {}", path, seed);
    Ok(())
}
