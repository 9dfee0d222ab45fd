//! Directive blocks inserted into vhost and main configuration files.

use crate::contexts::{HotlinkContext, RateLimitContext, ZonesContext};
use crate::render::render;
use crate::templates::{HOTLINK, RATE_LIMIT, RATE_LIMIT_ZONES};
use anyhow::Result;
use vhost_scanner::{RunDirective, split_lines};

pub const DEFAULT_BODY_SIZE_KB: u32 = 1024;

/// Directives following the rate-limit marker, in the order rendered.
pub const RATE_LIMIT_LAYOUT: [RunDirective; 5] = [
    RunDirective::optional("client_max_body_size"),
    RunDirective::required("limit_req"),
    RunDirective::required("limit_conn"),
    RunDirective::required("limit_req_status"),
    RunDirective::required("limit_conn_status"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitParams {
    /// Requests per second per client address.
    pub req_limit: u32,
    /// Concurrent connections per client address.
    pub conn_limit: u32,
    pub body_size_kb: u32,
}

/// Stricter limits get a smaller burst.
pub fn burst_for(req_limit: u32) -> u32 {
    match req_limit {
        0..=2 => 3,
        3..=5 => 10,
        _ => 20,
    }
}

pub fn hotlink_rule(marker: &str, referers: &str) -> Result<Vec<String>> {
    let ctx = HotlinkContext { marker, referers };
    Ok(split_lines(&render(HOTLINK, &ctx)?))
}

/// `include_body_size` is false when the target server block already sets
/// `client_max_body_size`.
pub fn rate_limit_rule(marker: &str, params: &RateLimitParams, include_body_size: bool) -> Result<Vec<String>> {
    let ctx = RateLimitContext {
        marker,
        include_body_size,
        body_size_kb: params.body_size_kb,
        burst: burst_for(params.req_limit),
        conn_limit: params.conn_limit,
    };
    Ok(split_lines(&render(RATE_LIMIT, &ctx)?))
}

pub fn rate_limit_zones(marker: &str, req_limit: u32) -> Result<Vec<String>> {
    let ctx = ZonesContext { marker, req_limit };
    Ok(split_lines(&render(RATE_LIMIT_ZONES, &ctx)?))
}
