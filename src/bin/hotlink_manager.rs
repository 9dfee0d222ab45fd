use anyhow::{Result, bail};
use nginx_guard::cli::{Action, HotlinkCli, parse_or_exit};
use nginx_guard::validator::{NginxChecker, validate_conf};
use nginx_guard::{ToolEnv, hotlink};
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli: HotlinkCli = parse_or_exit();
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

fn run(cli: &HotlinkCli) -> Result<()> {
    let settings = cli.global.settings()?;
    let conf = cli.conf_file.as_path();
    if !conf.is_file() {
        bail!("config file does not exist: {}", conf.display());
    }

    let checker = NginxChecker::from_settings(&settings);
    let env = ToolEnv::new(&settings, &checker, !cli.global.no_validate);

    match cli.action {
        Action::Add => {
            let Some(referers) = cli.referers.as_deref() else {
                bail!("`add` needs a referers argument, e.g. \"none blocked *.example.com\"");
            };
            hotlink::add(&env, conf, referers)?;
            println!("hotlink protection added to {}", conf.display());
        }
        Action::Remove => {
            if hotlink::remove(&env, conf)? {
                println!("hotlink protection removed from {}", conf.display());
            } else {
                println!("hotlink protection is not configured in {}", conf.display());
            }
        }
        Action::Status => hotlink::status(&env, conf)?.print("hotlink protection", cli.json)?,
        Action::Validate => {
            validate_conf(&checker, conf)?;
            println!("nginx configuration syntax check passed");
        }
    }
    Ok(())
}
