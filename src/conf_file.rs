use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use vhost_scanner::{join_lines, split_lines};

/// Read a configuration file into newline-preserving lines.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(split_lines(&content))
}

/// Overwrite `path` with `lines`.
pub fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    fs::write(path, join_lines(lines)).with_context(|| format!("failed to write {}", path.display()))
}
