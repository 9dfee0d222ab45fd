//! Hotlink (referer) protection for the SSL server block of a vhost.

use crate::ToolEnv;
use crate::backup::Backup;
use crate::conf_file::read_lines;
use crate::fix::sweep_before_add;
use crate::rules::hotlink_rule;
use crate::status::RuleStatus;
use anyhow::{Result, bail};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};
use vhost_scanner::{
    find_marker_block, find_server_blocks, first_block_matching, insert_lines, insertion_point,
    remove_region,
};

pub const BACKUP_SUFFIX: &str = "hotlink";

static SSL_LISTEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"listen\s+443\s+ssl;").expect("static regex"));

/// Drop the first hotlink block, if any.
pub fn strip_hotlink(lines: &[String], marker: &str) -> Result<Vec<String>> {
    Ok(match find_marker_block(lines, marker)? {
        Some(region) => remove_region(lines, region),
        None => lines.to_vec(),
    })
}

/// Replace any existing hotlink block with a fresh one in the first SSL
/// server block, before its first `location`.
pub fn apply_hotlink(lines: &[String], marker: &str, referers: &str) -> Result<Vec<String>> {
    let lines = strip_hotlink(lines, marker)?;
    let blocks = find_server_blocks(&lines)?;
    let Some(ssl) = first_block_matching(&lines, &blocks, &SSL_LISTEN) else {
        bail!("no SSL server block found (listen 443 ssl;), cannot add hotlink protection");
    };
    let rule = hotlink_rule(marker, referers)?;
    Ok(insert_lines(&lines, insertion_point(&lines, ssl), &rule))
}

pub fn add(env: &ToolEnv, conf: &Path, referers: &str) -> Result<()> {
    info!("Adding hotlink protection to {}", conf.display());
    sweep_before_add(&env.settings.vhost_dir);

    let marker = &env.settings.markers.hotlink;
    let backup = Backup::new(conf, BACKUP_SUFFIX);
    backup.create()?;

    let lines = read_lines(conf)?;
    if find_marker_block(&lines, marker)?.is_some() {
        info!("Existing hotlink protection found, replacing it");
    }
    let new_lines = apply_hotlink(&lines, marker, referers)?;
    env.commit(conf, &new_lines, &[&backup])
}

/// Returns false when no hotlink block was configured.
pub fn remove(env: &ToolEnv, conf: &Path) -> Result<bool> {
    info!("Removing hotlink protection from {}", conf.display());
    let backup = Backup::new(conf, BACKUP_SUFFIX);
    backup.create()?;

    let lines = read_lines(conf)?;
    let Some(region) = find_marker_block(&lines, &env.settings.markers.hotlink)? else {
        return Ok(false);
    };
    env.commit(conf, &remove_region(&lines, region), &[&backup])?;
    Ok(true)
}

/// A marker whose block cannot be delimited counts as not enabled.
pub fn status(env: &ToolEnv, conf: &Path) -> Result<RuleStatus> {
    let lines = read_lines(conf)?;
    let region = find_marker_block(&lines, &env.settings.markers.hotlink).unwrap_or_else(|e| {
        warn!("Hotlink marker in {} is not a complete block: {e}", conf.display());
        None
    });
    Ok(RuleStatus::from_region(&lines, region))
}
