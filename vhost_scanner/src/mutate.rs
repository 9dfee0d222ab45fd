//! Pure line-sequence transforms. Nothing here edits its input in place.

use crate::model::BlockRegion;
use regex::Regex;
use std::sync::LazyLock;

static LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*location\s").expect("static regex"));

pub fn insert_lines(lines: &[String], at: usize, new: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len() + new.len());
    out.extend_from_slice(&lines[..at]);
    out.extend_from_slice(new);
    out.extend_from_slice(&lines[at..]);
    out
}

pub fn remove_region(lines: &[String], region: BlockRegion) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len() - region.len());
    out.extend_from_slice(&lines[..region.start]);
    out.extend_from_slice(&lines[region.end + 1..]);
    out
}

/// Drop every line covered by any of `regions`. Regions must not overlap.
pub fn remove_regions(lines: &[String], regions: &[BlockRegion]) -> Vec<String> {
    lines
        .iter()
        .enumerate()
        .filter(|(i, _)| !regions.iter().any(|r| r.contains(*i)))
        .map(|(_, l)| l.clone())
        .collect()
}

/// Where a rule goes inside `block`: before the first `location`, or before
/// the closing line when the block has none.
pub fn insertion_point(lines: &[String], block: BlockRegion) -> usize {
    block
        .interior()
        .find(|&i| LOCATION.is_match(&lines[i]))
        .unwrap_or(block.end)
}

/// Insert one rule per block, right after the block's first `server_name`
/// line (or after the opener). `make_rule` sees the original lines of the
/// block it is generating for.
pub fn insert_into_servers<F>(lines: &[String], blocks: &[BlockRegion], mut make_rule: F) -> Vec<String>
where
    F: FnMut(&[String]) -> Vec<String>,
{
    let mut out = lines.to_vec();
    let mut offset = 0;

    for block in blocks {
        let at = block
            .interior()
            .find(|&i| lines[i].contains("server_name"))
            .map_or(block.start + 1, |i| i + 1);
        let rule = make_rule(&lines[block.start..=block.end]);
        out = insert_lines(&out, at + offset, &rule);
        offset += rule.len();
    }

    out
}
