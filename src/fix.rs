//! Duplicate `server` block cleanup across the vhost directory.

use crate::ToolEnv;
use crate::backup::Backup;
use crate::conf_file::{read_lines, write_lines};
use crate::validator::check_syntax;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use vhost_scanner::dedupe_servers;

pub const BACKUP_SUFFIX: &str = "dedup";

#[derive(Debug, Default)]
pub struct SweepReport {
    /// 已去重并重写的文件
    pub fixed: Vec<PathBuf>,
    /// 无法读取或解析而跳过的文件
    pub skipped: Vec<PathBuf>,
}

/// 删除单个文件中重复的 server 块，返回文件是否被修改
pub fn fix_file(path: &Path) -> Result<bool> {
    let lines = read_lines(path)?;
    let report = dedupe_servers(&lines).with_context(|| format!("cannot scan {}", path.display()))?;
    if !report.changed() {
        return Ok(false);
    }

    for removed in &report.removed {
        let (first, last) = removed.region.display_lines();
        info!(
            "Removing duplicate server block {} (lines {first}-{last}) from {}",
            removed.label(),
            path.display()
        );
    }

    Backup::new(path, BACKUP_SUFFIX).create()?;
    write_lines(path, &report.lines)?;
    Ok(true)
}

fn vhost_files(vhost_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(vhost_dir)
        .with_context(|| format!("failed to list {}", vhost_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "conf"))
        .collect();
    files.sort();
    Ok(files)
}

/// 逐个处理 `vhost_dir` 下的 `*.conf` 文件，目录不存在不算错误
pub fn sweep(vhost_dir: &Path) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    if !vhost_dir.is_dir() {
        info!("vhost directory {} does not exist, nothing to fix", vhost_dir.display());
        return Ok(report);
    }

    for file in vhost_files(vhost_dir)? {
        match fix_file(&file) {
            Ok(true) => report.fixed.push(file),
            Ok(false) => {}
            Err(e) => {
                warn!("Skipping {}: {e:#}", file.display());
                report.skipped.push(file);
            }
        }
    }

    if report.fixed.is_empty() {
        info!("No duplicate server blocks found");
    } else {
        info!("Fixed duplicate server blocks in {} file(s)", report.fixed.len());
    }
    Ok(report)
}

/// 每次 `add` 前执行的去重，失败只打印警告
pub fn sweep_before_add(vhost_dir: &Path) {
    if let Err(e) = sweep(vhost_dir) {
        warn!("Duplicate server check failed: {e:#}");
    }
}

/// `config-fix fix`: sweep, then check syntax when anything changed.
pub fn run_fix(env: &ToolEnv, vhost_dir: &Path) -> Result<SweepReport> {
    let report = sweep(vhost_dir)?;
    if !report.fixed.is_empty() && env.validate {
        check_syntax(env.checker)?;
    }
    Ok(report)
}
