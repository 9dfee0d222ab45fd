pub const HOTLINK: &str = include_str!("templates/hotlink.conf.tmpl");
pub const RATE_LIMIT: &str = include_str!("templates/rate_limit.conf.tmpl");
pub const RATE_LIMIT_ZONES: &str = include_str!("templates/rate_limit_zones.conf.tmpl");
