use crate::model::{BlockRegion, ScanError};
use crate::{find_server_blocks, remove_regions};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static SERVER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"server_name\s+([^;]+);").expect("static regex"));
static LISTEN_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"listen\s+(\d+)(?:\s+ssl)?;").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedServer {
    pub server_name: Option<String>,
    pub port: Option<String>,
    pub region: BlockRegion,
}

impl RemovedServer {
    pub fn label(&self) -> String {
        format!(
            "{}:{}",
            self.server_name.as_deref().unwrap_or(""),
            self.port.as_deref().unwrap_or("")
        )
    }
}

#[derive(Debug, Clone)]
pub struct DedupReport {
    pub lines: Vec<String>,
    pub removed: Vec<RemovedServer>,
}

impl DedupReport {
    pub fn changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

fn server_name(block: &[String]) -> Option<String> {
    block
        .iter()
        .find_map(|l| SERVER_NAME.captures(l).map(|c| c[1].trim().to_string()))
        .filter(|n| !n.is_empty())
}

fn listen_port(block: &[String]) -> Option<String> {
    block
        .iter()
        .find_map(|l| LISTEN_PORT.captures(l).map(|c| c[1].to_string()))
}

/// `server_name:port`, or the whole block text when either is missing.
pub fn identity_key(block: &[String]) -> String {
    match (server_name(block), listen_port(block)) {
        (Some(name), Some(port)) => format!("{name}:{port}"),
        _ => block.concat(),
    }
}

/// Outermost server blocks only; a `server {` nested in another is skipped.
fn outer_server_blocks(lines: &[String]) -> Result<Vec<BlockRegion>, ScanError> {
    let mut outer: Vec<BlockRegion> = Vec::new();
    for block in find_server_blocks(lines)? {
        if outer.last().is_some_and(|prev| prev.contains(block.start)) {
            continue;
        }
        outer.push(block);
    }
    Ok(outer)
}

/// Keep the first server block of each identity key, drop the rest.
pub fn dedupe_servers(lines: &[String]) -> Result<DedupReport, ScanError> {
    let mut seen = HashSet::new();
    let mut removed = Vec::new();

    for block in outer_server_blocks(lines)? {
        let text = &lines[block.start..=block.end];
        if !seen.insert(identity_key(text)) {
            removed.push(RemovedServer {
                server_name: server_name(text),
                port: listen_port(text),
                region: block,
            });
        }
    }

    let regions: Vec<BlockRegion> = removed.iter().map(|r| r.region).collect();
    Ok(DedupReport {
        lines: remove_regions(lines, &regions),
        removed,
    })
}

/// 服务器块自身（不含嵌套的 location 等子块）的行号
fn server_level_lines(lines: &[String], block: BlockRegion) -> Vec<usize> {
    let mut depth = 0usize;
    let mut own = Vec::new();
    for i in block.interior() {
        let line = &lines[i];
        if depth == 0 && !line.contains('{') {
            own.push(i);
        }
        if line.contains('{') {
            depth += 1;
        }
        if line.contains('}') {
            depth = depth.saturating_sub(1);
        }
    }
    own
}

/// Inside each server block keep only the first line mentioning `directive`.
/// Nested blocks such as `location` are separate contexts and are left alone.
/// Returns the new lines and how many were dropped.
pub fn dedupe_directive(lines: &[String], directive: &str) -> Result<(Vec<String>, usize), ScanError> {
    let mut dropped = Vec::new();
    for block in outer_server_blocks(lines)? {
        let mut hits = server_level_lines(lines, block)
            .into_iter()
            .filter(|&i| lines[i].contains(directive));
        hits.next();
        dropped.extend(hits.map(|i| BlockRegion::new(i, i)));
    }

    let count = dropped.len();
    Ok((remove_regions(lines, &dropped), count))
}
