use anyhow::{Result, bail};
use nginx_guard::cli::{Action, RateLimitCli, parse_or_exit};
use nginx_guard::rules::{DEFAULT_BODY_SIZE_KB, RateLimitParams};
use nginx_guard::validator::{NginxChecker, validate_conf};
use nginx_guard::{ToolEnv, rate_limit};
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli: RateLimitCli = parse_or_exit();
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

fn run(cli: &RateLimitCli) -> Result<()> {
    let settings = cli.global.settings()?;
    let conf = cli.conf_file.as_path();
    if !conf.is_file() {
        bail!("config file does not exist: {}", conf.display());
    }

    let checker = NginxChecker::from_settings(&settings);
    let env = ToolEnv::new(&settings, &checker, !cli.global.no_validate);

    match cli.action {
        Action::Add => {
            let (Some(req_limit), Some(conn_limit)) = (cli.req_limit, cli.conn_limit) else {
                bail!("`add` needs <req_limit> and <conn_limit> arguments");
            };
            let params = RateLimitParams {
                req_limit,
                conn_limit,
                body_size_kb: cli.body_size_kb.unwrap_or(DEFAULT_BODY_SIZE_KB),
            };
            rate_limit::add(&env, conf, &params)?;
            println!("rate limiting added to {}", conf.display());
        }
        Action::Remove => {
            if rate_limit::remove(&env, conf)? {
                println!("rate limiting removed from {}", conf.display());
            } else {
                println!("rate limiting is not configured in {}", conf.display());
            }
        }
        Action::Status => rate_limit::status(&env, conf)?.print("rate limiting", cli.json)?,
        Action::Validate => {
            validate_conf(&checker, conf)?;
            println!("nginx configuration syntax check passed");
        }
    }
    Ok(())
}
