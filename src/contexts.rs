use serde::Serialize;

#[derive(Serialize)]
pub struct HotlinkContext<'a> {
    pub marker: &'a str,
    pub referers: &'a str,
}

#[derive(Serialize)]
pub struct RateLimitContext<'a> {
    pub marker: &'a str,
    pub include_body_size: bool,
    pub body_size_kb: u32,
    pub burst: u32,
    pub conn_limit: u32,
}

#[derive(Serialize)]
pub struct ZonesContext<'a> {
    pub marker: &'a str,
    pub req_limit: u32,
}
