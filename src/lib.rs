//! Tools that edit nginx vhost files: hotlink protection, rate limiting
//! and duplicate `server` block cleanup.
//!
//! Block scanning and line-sequence edits live in the `vhost_scanner`
//! crate; this crate adds file I/O, backups, directive templates and the
//! `nginx -t` check.

pub mod backup;
pub mod cli;
pub mod conf_file;
pub mod config;
pub mod contexts;
pub mod fix;
pub mod hotlink;
pub mod rate_limit;
pub mod render;
pub mod rules;
pub mod status;
pub mod templates;
pub mod validator;

use crate::backup::{Backup, restore_all};
use crate::conf_file::write_lines;
use crate::config::Settings;
use crate::validator::{CheckOutcome, SyntaxChecker, validate_with_repair};
use anyhow::{Result, bail};
use std::path::Path;

/// What every tool operation needs besides its own arguments.
pub struct ToolEnv<'a> {
    pub settings: &'a Settings,
    pub checker: &'a dyn SyntaxChecker,
    /// Run the syntax check after writing.
    pub validate: bool,
}

impl<'a> ToolEnv<'a> {
    pub fn new(settings: &'a Settings, checker: &'a dyn SyntaxChecker, validate: bool) -> Self {
        Self {
            settings,
            checker,
            validate,
        }
    }

    /// Write `lines` to `conf` and validate. Every backup in `backups` is
    /// restored when either step fails.
    pub fn commit(&self, conf: &Path, lines: &[String], backups: &[&Backup]) -> Result<()> {
        if let Err(e) = write_lines(conf, lines) {
            restore_all(backups);
            return Err(e);
        }
        if !self.validate {
            return Ok(());
        }

        match validate_with_repair(self.checker, Some(conf)) {
            Ok(CheckOutcome::Passed) => Ok(()),
            Ok(CheckOutcome::Failed(diagnostic)) => {
                restore_all(backups);
                bail!("nginx rejected the change, backup restored:\n{diagnostic}")
            }
            Err(e) => {
                restore_all(backups);
                Err(e.context("validation failed, backup restored"))
            }
        }
    }
}
