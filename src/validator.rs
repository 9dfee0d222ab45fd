//! nginx syntax check, behind a trait so tests can swap in a fake.

use crate::config::Settings;
use crate::conf_file::{read_lines, write_lines};
use anyhow::{Context, Result, anyhow, bail};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use vhost_scanner::dedupe_directive;

#[cfg(test)]
use mockall::automock;

/// Substring of nginx's `"..." directive is duplicate` diagnostic.
pub const DUPLICATE_SIGNATURE: &str = "duplicate";

/// Directive deduplicated by the repair pass.
pub const REPAIRED_DIRECTIVE: &str = "client_max_body_size";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    /// Diagnostic text from the checker.
    Failed(String),
}

#[cfg_attr(test, automock)]
pub trait SyntaxChecker {
    /// Check the globally active configuration. `Err` means the checker
    /// itself could not run to completion.
    fn check(&self) -> Result<CheckOutcome>;
}

/// Runs `nginx -t` (or the configured command) with a timeout.
#[derive(Debug, Clone)]
pub struct NginxChecker {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl NginxChecker {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.nginx_bin.clone(),
            settings.check_args.clone(),
            settings.check_timeout(),
        )
    }
}

impl SyntaxChecker for NginxChecker {
    fn check(&self) -> Result<CheckOutcome> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute {}", self.program))?;

        // 子进程退出前持续读取 stderr，避免管道写满后阻塞
        let reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                pipe.read_to_end(&mut buf).map(|_| buf)
            })
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                bail!("{} did not finish within {:?}", self.program, self.timeout);
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stderr = match reader {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("stderr reader for {} panicked", self.program))?
                .with_context(|| format!("failed to read output of {}", self.program))?,
            None => Vec::new(),
        };

        if status.success() {
            return Ok(CheckOutcome::Passed);
        }
        let diagnostic = String::from_utf8_lossy(&stderr).trim_end().to_string();
        if diagnostic.is_empty() {
            Ok(CheckOutcome::Failed(format!("{} exited with {status}", self.program)))
        } else {
            Ok(CheckOutcome::Failed(diagnostic))
        }
    }
}

pub fn is_duplicate_directive(diagnostic: &str) -> bool {
    diagnostic.contains(DUPLICATE_SIGNATURE)
}

/// Keep only the first `client_max_body_size` of each server block in
/// `conf`. Returns whether the file changed.
pub fn repair_duplicate_directives(conf: &Path) -> Result<bool> {
    let lines = read_lines(conf)?;
    let (repaired, dropped) = dedupe_directive(&lines, REPAIRED_DIRECTIVE)
        .with_context(|| format!("cannot repair {}", conf.display()))?;
    if dropped == 0 {
        return Ok(false);
    }
    write_lines(conf, &repaired)?;
    info!("Removed {dropped} duplicate {REPAIRED_DIRECTIVE} line(s) from {}", conf.display());
    Ok(true)
}

fn run_check(checker: &dyn SyntaxChecker) -> CheckOutcome {
    match checker.check() {
        Ok(outcome) => outcome,
        Err(e) => CheckOutcome::Failed(format!("{e:#}")),
    }
}

/// Run the checker. When it reports a duplicate directive and `conf` is
/// given, repair `conf` and check exactly once more.
pub fn validate_with_repair(checker: &dyn SyntaxChecker, conf: Option<&Path>) -> Result<CheckOutcome> {
    let outcome = run_check(checker);
    let CheckOutcome::Failed(diagnostic) = &outcome else {
        info!("nginx syntax check passed");
        return Ok(outcome);
    };
    warn!("nginx syntax check failed:\n{diagnostic}");

    let Some(conf) = conf else {
        return Ok(outcome);
    };
    if !is_duplicate_directive(diagnostic) || !repair_duplicate_directives(conf)? {
        return Ok(outcome);
    }

    info!("Re-running nginx syntax check after repair");
    let retry = run_check(checker);
    match &retry {
        CheckOutcome::Passed => info!("nginx syntax check passed"),
        CheckOutcome::Failed(diagnostic) => warn!("nginx syntax check still failing:\n{diagnostic}"),
    }
    Ok(retry)
}

/// `validate` action of the vhost tools.
pub fn validate_conf(checker: &dyn SyntaxChecker, conf: &Path) -> Result<()> {
    match validate_with_repair(checker, Some(conf))? {
        CheckOutcome::Passed => Ok(()),
        CheckOutcome::Failed(diagnostic) => bail!("nginx configuration is invalid:\n{diagnostic}"),
    }
}

/// Plain check with no repair.
pub fn check_syntax(checker: &dyn SyntaxChecker) -> Result<()> {
    match validate_with_repair(checker, None)? {
        CheckOutcome::Passed => Ok(()),
        CheckOutcome::Failed(diagnostic) => bail!("nginx configuration is invalid:\n{diagnostic}"),
    }
}
