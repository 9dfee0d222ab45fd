//! End-to-end runs of the three binaries against temporary files.
//!
//! The nginx check is replaced by `true` / `false` through a settings file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const SITE: &str = "\
server {
    listen 80;
    server_name example.com;
    return 301 https://$host$request_uri;
}
server {
    listen 443 ssl;
    server_name example.com;
    location / {
        root /var/www/example;
    }
}
";

const MAIN: &str = "\
events {
}
http {
    include vhost/*.conf;
}
";

struct Fixture {
    dir: TempDir,
    settings: PathBuf,
}

impl Fixture {
    /// `checker` is the command standing in for `nginx -t`.
    fn new(checker: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let vhost = dir.path().join("vhost");
        fs::create_dir(&vhost).unwrap();
        fs::write(dir.path().join("nginx.conf"), MAIN).unwrap();
        fs::write(vhost.join("site.conf"), SITE).unwrap();

        let settings = dir.path().join("settings.toml");
        fs::write(
            &settings,
            format!(
                "nginx_conf = \"{}\"\nvhost_dir = \"{}\"\nnginx_bin = \"{checker}\"\ncheck_args = []\ncheck_timeout_secs = 5\n",
                dir.path().join("nginx.conf").display(),
                vhost.display()
            ),
        )
        .unwrap();
        Self { dir, settings }
    }

    fn site(&self) -> PathBuf {
        self.dir.path().join("vhost").join("site.conf")
    }

    fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    fn run(&self, bin: &str, args: &[&str]) -> Output {
        Command::new(bin)
            .args(args)
            .arg("--config")
            .arg(&self.settings)
            .output()
            .expect("failed to run binary")
    }
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}

const HOTLINK: &str = env!("CARGO_BIN_EXE_hotlink-manager");
const RATE_LIMIT: &str = env!("CARGO_BIN_EXE_rate-limit-manager");
const CONFIG_FIX: &str = env!("CARGO_BIN_EXE_config-fix");

#[test]
fn hotlink_add_status_remove() {
    let fx = Fixture::new("true");
    let site = fx.site();
    let site_arg = site.to_str().unwrap();

    let out = fx.run(HOTLINK, &[site_arg, "add", "none blocked *.example.com"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let added = fx.read(&site);
    assert!(added.contains("valid_referers none blocked *.example.com;"));

    let again = fx.run(HOTLINK, &[site_arg, "add", "none blocked *.example.com"]);
    assert!(again.status.success());
    assert_eq!(fx.read(&site), added);

    let status = fx.run(HOTLINK, &[site_arg, "status"]);
    assert!(status.status.success());
    assert!(stdout(&status).contains("is enabled (lines 9-15)"));

    let json = fx.run(HOTLINK, &[site_arg, "status", "--json"]);
    let value: serde_json::Value = serde_json::from_slice(&json.stdout).unwrap();
    assert_eq!(value["enabled"], true);
    assert_eq!(value["first_line"], 9);

    let removed = fx.run(HOTLINK, &[site_arg, "remove"]);
    assert!(removed.status.success());
    assert_eq!(fx.read(&site), SITE);

    let status = fx.run(HOTLINK, &[site_arg, "status"]);
    assert!(status.status.success());
    assert!(stdout(&status).contains("is not enabled"));
}

#[test]
fn hotlink_without_ssl_block_fails_cleanly() {
    let fx = Fixture::new("true");
    let site = fx.site();
    let plain = "server {\n    listen 80;\n    server_name a;\n}\n";
    fs::write(&site, plain).unwrap();

    let out = fx.run(HOTLINK, &[site.to_str().unwrap(), "add", "none"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("no SSL server block found"));
    assert_eq!(fx.read(&site), plain);
}

#[test]
fn unbalanced_file_is_left_alone() {
    let fx = Fixture::new("true");
    let site = fx.site();
    let broken = "server {\n    listen 443 ssl;\n}\n}\n";
    fs::write(&site, broken).unwrap();

    let out = fx.run(HOTLINK, &[site.to_str().unwrap(), "add", "none"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("line 4"));
    assert_eq!(fx.read(&site), broken);
}

#[test]
fn status_of_stale_marker_exits_zero() {
    let fx = Fixture::new("true");
    let site = fx.site();
    fs::write(&site, "server {\n    listen 443 ssl;\n    # 防盗链配置\n}\n").unwrap();

    let out = fx.run(HOTLINK, &[site.to_str().unwrap(), "status"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stdout(&out).contains("is not enabled"));
}

#[test]
fn failed_check_restores_backup() {
    let fx = Fixture::new("false");
    let site = fx.site();

    let out = fx.run(HOTLINK, &[site.to_str().unwrap(), "add", "none"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(fx.read(&site), SITE);
}

#[test]
fn no_validate_skips_check() {
    let fx = Fixture::new("false");
    let site = fx.site();

    let out = fx.run(HOTLINK, &[site.to_str().unwrap(), "add", "none", "--no-validate"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(fx.read(&site).contains("valid_referers none;"));
}

#[test]
fn usage_errors_exit_with_one() {
    let fx = Fixture::new("true");
    let site = fx.site();
    let site_arg = site.to_str().unwrap();

    assert_eq!(fx.run(HOTLINK, &[site_arg, "add"]).status.code(), Some(1));
    assert_eq!(fx.run(HOTLINK, &[site_arg, "enable"]).status.code(), Some(1));
    assert_eq!(fx.run(RATE_LIMIT, &[site_arg, "add", "5"]).status.code(), Some(1));
    assert_eq!(fx.run(HOTLINK, &["/nonexistent.conf", "status"]).status.code(), Some(1));
    assert_eq!(fx.read(&site), SITE);

    let help = Command::new(HOTLINK).arg("--help").output().unwrap();
    assert!(help.status.success());
}

#[test]
fn rate_limit_add_is_idempotent() {
    let fx = Fixture::new("true");
    let site = fx.site();
    let site_arg = site.to_str().unwrap();

    let out = fx.run(RATE_LIMIT, &[site_arg, "add", "6", "20", "512"]);
    assert!(out.status.success(), "{}", stderr(&out));
    let once = fx.read(&site);
    assert_eq!(once.matches("burst=20 nodelay").count(), 2);
    assert_eq!(once.matches("client_max_body_size 512k;").count(), 2);

    assert!(fx.run(RATE_LIMIT, &[site_arg, "add", "6", "20", "512"]).status.success());
    assert_eq!(fx.read(&site), once);

    let main = fx.read(&fx.dir.path().join("nginx.conf"));
    assert_eq!(main.matches("limit_req_zone").count(), 1);
    assert!(main.contains("rate=6r/s"));

    let status = fx.run(RATE_LIMIT, &[site_arg, "status"]);
    assert!(stdout(&status).contains("rate limiting is enabled (lines 4-9)"));
    assert!(stdout(&status).contains("zones are defined"));

    assert!(fx.run(RATE_LIMIT, &[site_arg, "remove"]).status.success());
    assert_eq!(fx.read(&site), SITE);
}

#[test]
fn config_fix_removes_duplicates() {
    let fx = Fixture::new("true");
    let site = fx.site();
    let dup = format!("{SITE}server {{\n    listen 80;\n    server_name example.com;\n}}\n");
    fs::write(&site, &dup).unwrap();

    let out = fx.run(CONFIG_FIX, &["fix"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stdout(&out).contains("site.conf"));
    assert_eq!(fx.read(&site), SITE);
    assert_eq!(fx.read(&fx.dir.path().join("vhost/site.conf.dedup.bak")), dup);
}

#[test]
fn config_fix_check_reports_checker_result() {
    assert!(Fixture::new("true").run(CONFIG_FIX, &["check"]).status.success());
    assert_eq!(Fixture::new("false").run(CONFIG_FIX, &["check"]).status.code(), Some(1));
}
