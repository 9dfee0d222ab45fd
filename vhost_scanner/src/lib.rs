mod dedup;
mod model;
mod mutate;

pub use crate::dedup::{DedupReport, RemovedServer, dedupe_directive, dedupe_servers, identity_key};
pub use crate::model::{BlockRegion, RunDirective, ScanError};
pub use crate::mutate::{
    insert_into_servers, insert_lines, insertion_point, remove_region, remove_regions,
};
use regex::Regex;

/// 按行切分，保留每行末尾的换行符
pub fn split_lines(content: &str) -> Vec<String> {
    content.split_inclusive('\n').map(str::to_string).collect()
}

pub fn join_lines(lines: &[String]) -> String {
    lines.concat()
}

/// 判断该行是否以 `<keyword> {` 开启一个块
pub fn opens_block(line: &str, keyword: &str) -> bool {
    line.trim_start()
        .strip_prefix(keyword)
        .is_some_and(|rest| rest.trim_start().starts_with('{'))
}

struct OpenBrace {
    line: usize,
    tracked: bool,
}

/// 查找所有 `<keyword> { ... }` 块，按文件顺序返回
///
/// 花括号按子串匹配。同一行同时含 `{` 和 `}` 时先开后关，
/// 单行块不返回。
pub fn find_blocks(lines: &[String], keyword: &str) -> Result<Vec<BlockRegion>, ScanError> {
    let mut stack: Vec<OpenBrace> = Vec::new();
    let mut blocks = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if line.contains('{') {
            stack.push(OpenBrace {
                line: i,
                tracked: opens_block(line, keyword),
            });
        }
        if line.contains('}') {
            let open = stack
                .pop()
                .ok_or(ScanError::UnmatchedCloser { line: i + 1 })?;
            if open.tracked && open.line < i {
                blocks.push(BlockRegion::new(open.line, i));
            }
        }
    }

    if let Some(open) = stack.first() {
        return Err(ScanError::UnclosedBlock {
            line: open.line + 1,
        });
    }

    // 内层块先闭合，按起始行重新排序
    blocks.sort_by_key(|b| b.start);
    Ok(blocks)
}

pub fn find_server_blocks(lines: &[String]) -> Result<Vec<BlockRegion>, ScanError> {
    find_blocks(lines, "server")
}

/// 第一个包含匹配 `pattern` 的行的块
pub fn first_block_matching(
    lines: &[String],
    blocks: &[BlockRegion],
    pattern: &Regex,
) -> Option<BlockRegion> {
    blocks
        .iter()
        .find(|b| lines[b.start..=b.end].iter().any(|l| pattern.is_match(l)))
        .copied()
}

/// 从第一个包含 `marker` 的行开始的块
///
/// 深度从标记行的 0 开始计数，回到 0 处即块结束；之后的标记忽略。
pub fn find_marker_block(lines: &[String], marker: &str) -> Result<Option<BlockRegion>, ScanError> {
    let Some(start) = lines.iter().position(|l| l.contains(marker)) else {
        return Ok(None);
    };

    let mut depth = 0usize;
    for (i, line) in lines.iter().enumerate().skip(start) {
        if line.contains('{') {
            depth += 1;
        }
        if line.contains('}') {
            if depth == 0 {
                return Err(ScanError::UnmatchedCloser { line: i + 1 });
            }
            depth -= 1;
            if depth == 0 {
                return Ok(Some(BlockRegion::new(start, i)));
            }
        }
    }

    Err(ScanError::UnclosedBlock { line: start + 1 })
}

/// Every marker line followed by the directives of `layout`, in order.
///
/// Optional directives may be missing; the run stops at the first required
/// directive that does not match. A marker with no directive after it is
/// not a run.
pub fn find_marker_runs(lines: &[String], marker: &str, layout: &[RunDirective]) -> Vec<BlockRegion> {
    let mut runs = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !lines[i].contains(marker) {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i;
        for directive in layout {
            match lines.get(end + 1) {
                Some(line) if directive.matches(line) => end += 1,
                _ if directive.optional => {}
                _ => break,
            }
        }

        if end > start {
            runs.push(BlockRegion::new(start, end));
        }
        i = end + 1;
    }

    runs
}
