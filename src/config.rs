use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_NGINX_CONF: &str = "/usr/local/nginx/conf/nginx.conf";
pub const DEFAULT_VHOST_DIR: &str = "/usr/local/nginx/conf/vhost";

/// Comment lines tagging inserted blocks. The defaults match files written
/// by the earlier shell tooling so existing blocks are still found.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Markers {
    pub hotlink: String,
    pub rate_limit: String,
    pub rate_limit_zones: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            hotlink: "# 防盗链配置".into(),
            rate_limit: "# 流量限制配置".into(),
            rate_limit_zones: "# 流量限制区域定义".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 主配置文件
    pub nginx_conf: PathBuf,
    /// 虚拟主机目录
    pub vhost_dir: PathBuf,
    pub nginx_bin: String,
    pub check_args: Vec<String>,
    pub check_timeout_secs: u64,
    pub markers: Markers,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            nginx_conf: PathBuf::from(DEFAULT_NGINX_CONF),
            vhost_dir: PathBuf::from(DEFAULT_VHOST_DIR),
            nginx_bin: "nginx".into(),
            check_args: vec!["-t".into()],
            check_timeout_secs: 10,
            markers: Markers::default(),
        }
    }
}

impl Settings {
    /// Hardcoded defaults, overridden by the TOML file when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid settings file {}", path.display()))
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}
