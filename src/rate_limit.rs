//! Per-server rate limiting plus the shared zones in the main config.

use crate::ToolEnv;
use crate::backup::{Backup, restore_all};
use crate::conf_file::{read_lines, write_lines};
use crate::fix::sweep_before_add;
use crate::rules::{RATE_LIMIT_LAYOUT, RateLimitParams, rate_limit_rule, rate_limit_zones};
use crate::status::RuleStatus;
use anyhow::{Result, anyhow, bail};
use std::path::Path;
use tracing::{info, warn};
use vhost_scanner::{
    find_blocks, find_marker_runs, find_server_blocks, insert_into_servers, insert_lines,
    remove_regions,
};

pub const BACKUP_SUFFIX: &str = "ratelimit";

pub fn zones_defined(lines: &[String]) -> bool {
    lines.iter().any(|l| l.contains("limit_req_zone")) && lines.iter().any(|l| l.contains("limit_conn_zone"))
}

/// Main config with the zone definitions added at the top of the `http`
/// block, or `None` when both zones already exist.
pub fn apply_zones(lines: &[String], marker: &str, req_limit: u32) -> Result<Option<Vec<String>>> {
    if zones_defined(lines) {
        return Ok(None);
    }
    let http = find_blocks(lines, "http")?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no http block found in the main config, cannot define rate limit zones"))?;
    let zones = rate_limit_zones(marker, req_limit)?;
    Ok(Some(insert_lines(lines, http.start + 1, &zones)))
}

/// Drop every rate-limit run.
pub fn strip_rate_limits(lines: &[String], marker: &str) -> Vec<String> {
    remove_regions(lines, &find_marker_runs(lines, marker, &RATE_LIMIT_LAYOUT))
}

/// Replace existing rate limits with one run per server block.
pub fn apply_rate_limit(lines: &[String], marker: &str, params: &RateLimitParams) -> Result<Vec<String>> {
    let lines = strip_rate_limits(lines, marker);
    let blocks = find_server_blocks(&lines)?;
    if blocks.is_empty() {
        bail!("no server block found, cannot add rate limiting");
    }

    let with_body_size = rate_limit_rule(marker, params, true)?;
    let without_body_size = rate_limit_rule(marker, params, false)?;
    Ok(insert_into_servers(&lines, &blocks, |block| {
        if block.iter().any(|l| l.contains("client_max_body_size")) {
            without_body_size.clone()
        } else {
            with_body_size.clone()
        }
    }))
}

pub fn add(env: &ToolEnv, conf: &Path, params: &RateLimitParams) -> Result<()> {
    info!("Adding rate limiting to {}", conf.display());
    sweep_before_add(&env.settings.vhost_dir);

    let markers = &env.settings.markers;
    let backup = Backup::new(conf, BACKUP_SUFFIX);
    backup.create()?;

    let main_conf = env.settings.nginx_conf.as_path();
    let main_lines = read_lines(main_conf)?;
    let new_main = apply_zones(&main_lines, &markers.rate_limit_zones, params.req_limit)?;

    let lines = read_lines(conf)?;
    if !find_marker_runs(&lines, &markers.rate_limit, &RATE_LIMIT_LAYOUT).is_empty() {
        info!("Existing rate limiting found, replacing it");
    }
    let new_lines = apply_rate_limit(&lines, &markers.rate_limit, params)?;

    let main_backup = Backup::new(main_conf, BACKUP_SUFFIX);
    let mut backups = vec![&backup];
    match new_main {
        Some(new_main) => {
            main_backup.create()?;
            if let Err(e) = write_lines(main_conf, &new_main) {
                restore_all(&[&main_backup]);
                return Err(e);
            }
            info!("Defined rate limit zones in {}", main_conf.display());
            backups.push(&main_backup);
        }
        None => info!("Rate limit zones already defined in {}", main_conf.display()),
    }

    env.commit(conf, &new_lines, &backups)
}

/// Returns false when no rate limiting was configured.
pub fn remove(env: &ToolEnv, conf: &Path) -> Result<bool> {
    info!("Removing rate limiting from {}", conf.display());
    let backup = Backup::new(conf, BACKUP_SUFFIX);
    backup.create()?;

    let lines = read_lines(conf)?;
    let runs = find_marker_runs(&lines, &env.settings.markers.rate_limit, &RATE_LIMIT_LAYOUT);
    if runs.is_empty() {
        return Ok(false);
    }
    info!("Removing {} rate limit block(s)", runs.len());
    env.commit(conf, &remove_regions(&lines, &runs), &[&backup])?;
    Ok(true)
}

pub fn status(env: &ToolEnv, conf: &Path) -> Result<RuleStatus> {
    let lines = read_lines(conf)?;
    let first = find_marker_runs(&lines, &env.settings.markers.rate_limit, &RATE_LIMIT_LAYOUT)
        .into_iter()
        .next();
    let status = RuleStatus::from_region(&lines, first);
    if !status.enabled {
        return Ok(status);
    }

    let zones = match read_lines(&env.settings.nginx_conf) {
        Ok(main_lines) => zones_defined(&main_lines),
        Err(e) => {
            warn!("{e:#}");
            false
        }
    };
    Ok(status.with_zones(zones))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::testing::ScriptedChecker;
    use std::fs;
    use vhost_scanner::split_lines;

    const MARKER: &str = "# 流量限制配置";
    const PARAMS: RateLimitParams = RateLimitParams {
        req_limit: 2,
        conn_limit: 10,
        body_size_kb: 1024,
    };

    const SITE: &str = "\
server {
    listen 80;
    server_name example.com;
    location / {
    }
}
server {
    listen 443 ssl;
    client_max_body_size 8m;
    location / {
    }
}
";

    const MAIN: &str = "\
worker_processes 1;
http {
    include mime.types;
    include vhost/*.conf;
}
";

    #[test]
    fn one_run_per_server_block() {
        let lines = split_lines(SITE);
        let out = apply_rate_limit(&lines, MARKER, &PARAMS).unwrap();
        let text = out.concat();
        assert_eq!(text.matches(MARKER).count(), 2);
        assert_eq!(text.matches("burst=3 nodelay").count(), 2);
        // 第二个 server 已有 client_max_body_size
        assert_eq!(text.matches("client_max_body_size 1024k;").count(), 1);
        assert_eq!(out[3], format!("    {MARKER}\n"));
        assert_eq!(out[13], format!("    {MARKER}\n"));
        assert_eq!(out.len(), lines.len() + 11);
    }

    #[test]
    fn insert_then_strip_is_identity() {
        let lines = split_lines(SITE);
        let out = apply_rate_limit(&lines, MARKER, &PARAMS).unwrap();
        assert_eq!(strip_rate_limits(&out, MARKER), lines);
    }

    #[test]
    fn apply_twice_equals_once() {
        let lines = split_lines(SITE);
        let once = apply_rate_limit(&lines, MARKER, &PARAMS).unwrap();
        let twice = apply_rate_limit(&once, MARKER, &PARAMS).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn no_server_blocks() {
        let lines = split_lines("# empty\n");
        assert!(apply_rate_limit(&lines, MARKER, &PARAMS).is_err());
    }

    #[test]
    fn zones_go_after_http_opener() {
        let lines = split_lines(MAIN);
        let out = apply_zones(&lines, "# zones", 2).unwrap().unwrap();
        assert_eq!(out[2], "    # zones\n");
        assert!(out[3].contains("rate=2r/s"));
        assert!(zones_defined(&out));
        assert!(apply_zones(&out, "# zones", 2).unwrap().is_none());
    }

    #[test]
    fn zones_need_http_block() {
        let lines = split_lines("events {\n}\n");
        let err = apply_zones(&lines, "# zones", 2).unwrap_err();
        assert!(err.to_string().contains("no http block"));
    }

    fn setup(dir: &tempfile::TempDir) -> (Settings, std::path::PathBuf) {
        let settings = Settings {
            nginx_conf: dir.path().join("nginx.conf"),
            vhost_dir: dir.path().join("vhost"),
            ..Settings::default()
        };
        fs::write(&settings.nginx_conf, MAIN).unwrap();
        let conf = dir.path().join("site.conf");
        fs::write(&conf, SITE).unwrap();
        (settings, conf)
    }

    #[test]
    fn add_status_remove_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, conf) = setup(&dir);
        let checker = ScriptedChecker::passing();
        let env = ToolEnv::new(&settings, &checker, true);

        add(&env, &conf, &PARAMS).unwrap();
        let after_once = fs::read_to_string(&conf).unwrap();
        add(&env, &conf, &PARAMS).unwrap();
        assert_eq!(fs::read_to_string(&conf).unwrap(), after_once);

        let main = fs::read_to_string(&settings.nginx_conf).unwrap();
        assert_eq!(main.matches("limit_req_zone").count(), 1);

        let st = status(&env, &conf).unwrap();
        assert!(st.enabled);
        assert_eq!(st.first_line, Some(4));
        assert_eq!(st.last_line, Some(9));
        assert_eq!(st.zones_defined, Some(true));

        assert!(remove(&env, &conf).unwrap());
        assert_eq!(fs::read_to_string(&conf).unwrap(), SITE);
        assert!(!remove(&env, &conf).unwrap());
    }

    #[test]
    fn failed_validation_restores_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, conf) = setup(&dir);
        let checker = ScriptedChecker::failing("nginx: [emerg] zero size shared memory zone");
        let env = ToolEnv::new(&settings, &checker, true);

        assert!(add(&env, &conf, &PARAMS).is_err());
        assert_eq!(fs::read_to_string(&conf).unwrap(), SITE);
        assert_eq!(fs::read_to_string(&settings.nginx_conf).unwrap(), MAIN);
    }

    #[test]
    fn existing_body_size_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, conf) = setup(&dir);
        fs::write(
            &conf,
            "server {\n    server_name a;\n    client_max_body_size 2m;\n}\n",
        )
        .unwrap();
        let checker = ScriptedChecker::passing();
        let env = ToolEnv::new(&settings, &checker, true);

        add(&env, &conf, &PARAMS).unwrap();
        let text = fs::read_to_string(&conf).unwrap();
        assert_eq!(text.matches("client_max_body_size").count(), 1);
        assert!(text.contains("client_max_body_size 2m;"));
    }
}
