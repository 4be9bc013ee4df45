/// Union of per-criterion slices
use crate::config::types::{PipelineError, Result};
use log::{info, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Output of unification, consumed by the slice extractor
pub const UNIFICATION_FILE: &str = "unification.txt";

/// Parse a slice file: one decimal line number per line. Anything else is ignored.
pub fn parse_slice(content: &str) -> Vec<u32> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && l.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|l| l.parse::<u32>().ok())
        .filter(|&n| n > 0)
        .collect()
}

pub fn read_slice(path: &Path) -> Result<Vec<u32>> {
    Ok(parse_slice(&fs::read_to_string(path)?))
}

/// Write line numbers one per line
pub fn write_slice(path: &Path, lines: &[u32]) -> Result<()> {
    let mut text = String::new();
    for line in lines {
        text.push_str(&line.to_string());
        text.push('\n');
    }
    fs::write(path, text)?;
    Ok(())
}

/// Merge slice files into `output`, ascending.
///
/// Unreadable files are skipped. Fails without writing if no file was given, none could
/// be read, or the union is empty.
pub fn unify(slice_files: &[PathBuf], output: &Path) -> Result<BTreeSet<u32>> {
    if slice_files.is_empty() {
        return Err(PipelineError::Unification("no slice files to unify".to_string()));
    }

    info!("Unifying {} slices...", slice_files.len());
    let mut union = BTreeSet::new();
    let mut available = 0usize;
    for file in slice_files {
        match read_slice(file) {
            Ok(lines) => {
                available += 1;
                union.extend(lines);
            }
            Err(e) => warn!("Skipping slice {}: {}", file.display(), e),
        }
    }

    if available == 0 {
        return Err(PipelineError::Unification("no slice file could be read".to_string()));
    }
    if union.is_empty() {
        return Err(PipelineError::Unification("union of slices is empty".to_string()));
    }

    let ordered: Vec<u32> = union.iter().copied().collect();
    write_slice(output, &ordered)?;
    info!("Done, the result has been stored in '{}'.", output.display());
    Ok(union)
}
