use anyhow::Result;
use nginx_guard::cli::{ConfigFixCli, FixCommand, parse_or_exit};
use nginx_guard::validator::{NginxChecker, check_syntax};
use nginx_guard::{ToolEnv, fix};
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli: ConfigFixCli = parse_or_exit();
    if let Err(e) = cli.global.init_logging() {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &ConfigFixCli) -> Result<()> {
    let settings = cli.global.settings()?;
    let checker = NginxChecker::from_settings(&settings);
    let env = ToolEnv::new(&settings, &checker, !cli.global.no_validate);

    match cli.command {
        FixCommand::Fix => {
            let vhost_dir = cli.vhost_dir.as_deref().unwrap_or(settings.vhost_dir.as_path());
            let report = fix::run_fix(&env, vhost_dir)?;
            for path in &report.fixed {
                println!("fixed {}", path.display());
            }
            for path in &report.skipped {
                println!("skipped {}", path.display());
            }
        }
        FixCommand::Check => {
            check_syntax(&checker)?;
            println!("nginx configuration syntax check passed");
        }
    }
    Ok(())
}
