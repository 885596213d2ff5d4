// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;

use anyhow::{Context, Result};
use config::Config;
use leadsync_api::{Client, LeadsApi};
use leadsync_app::{Session, ViewScope};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `leadsync --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let log_path = logging::init(&config)?;
    info!(config = %options.config_path.display(), log = %log_path.display(), "starting leadsync");

    let client = Client::new(
        config.base_url(),
        config.session().as_deref(),
        config.timeout()?,
    )
    .with_context(|| {
        format!(
            "invalid [server] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    if !client.has_session() {
        warn!("no session cookie configured; the backend may reject requests");
    }

    if options.check_only {
        println!("{}", check_backend(&client)?);
        return Ok(());
    }

    let mut session = Session::new();
    leadsync_tui::run_app(client, &mut session)
}

/// One dashboard fetch, so `--check` proves the URL, the session and the
/// payload shape in a single round trip.
fn check_backend<A: LeadsApi>(api: &A) -> Result<String> {
    let leads = api
        .fetch_leads(ViewScope::Dashboard)
        .context("fetch dashboard leads")?;
    Ok(format!("ok: {} dashboard leads", leads.len()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("leadsync");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and reach the backend once");
    println!("  --help                   Show this help");
}
