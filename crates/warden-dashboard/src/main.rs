//! `warden` command-line tool
//!
//! Reads the persisted snapshot into a fresh context, applies one command and
//! saves the result.

use anyhow::{anyhow, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use warden_dashboard::{init_tracing, AppContext, DashboardConfig};
use warden_state::{SetOptions, StatePath, WriteOutcome};

fn cli() -> Command {
    Command::new("warden")
        .version(warden_dashboard::VERSION)
        .about("Inspect and edit the persisted Warden dashboard state")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Snapshot file (overrides persist.path)"),
        )
        .subcommand(
            Command::new("show")
                .about("Print the state, or the value at a path")
                .arg(Arg::new("path").help("Dotted path, e.g. ui.theme")),
        )
        .subcommand(
            Command::new("set")
                .about("Write a JSON value at a path")
                .arg(Arg::new("path").required(true).help("Dotted path"))
                .arg(
                    Arg::new("value")
                        .required(true)
                        .help("JSON value, e.g. '\"light\"' or '{\"a\":1}'"),
                )
                .arg(
                    Arg::new("merge")
                        .long("merge")
                        .action(ArgAction::SetTrue)
                        .help("Shallow-merge objects instead of replacing"),
                ),
        )
        .subcommand(Command::new("reset").about("Restore the default state and save it"))
}

fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(state) = matches.get_one::<PathBuf>("state") {
        config = config.with_persist_path(state);
    }
    let config = config.with_persistence(true);
    config.validate()?;

    init_tracing(&config.log_filter, config.log_format);
    let ctx = AppContext::bootstrap(&config)?;

    match matches.subcommand() {
        Some(("show", args)) => show(&ctx, args),
        Some(("set", args)) => set(&ctx, args),
        Some(("reset", _)) => {
            ctx.reset()?;
            println!("state reset to defaults");
            Ok(())
        }
        _ => Ok(()),
    }
}

fn show(ctx: &AppContext, args: &ArgMatches) -> anyhow::Result<()> {
    let value = match args.get_one::<String>("path") {
        Some(raw) => {
            let path = StatePath::parse(raw)?;
            ctx.store()
                .get_state(&path)
                .ok_or_else(|| anyhow!("no value at '{path}'"))?
        }
        None => ctx.store().state(),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn set(ctx: &AppContext, args: &ArgMatches) -> anyhow::Result<()> {
    let raw_path = args
        .get_one::<String>("path")
        .ok_or_else(|| anyhow!("missing path"))?;
    let raw_value = args
        .get_one::<String>("value")
        .ok_or_else(|| anyhow!("missing value"))?;

    let path = StatePath::parse(raw_path)?;
    let value: serde_json::Value = serde_json::from_str(raw_value)
        .with_context(|| format!("value for '{path}' is not valid JSON: {raw_value}"))?;

    let options = if args.get_flag("merge") {
        SetOptions::new().merge()
    } else {
        SetOptions::new()
    };

    let covered = ctx.snapshots().is_some_and(|snapshots| snapshots.covers(&path));
    if !covered {
        eprintln!("warning: '{path}' is not a persisted path; the change will not be kept");
    }

    match ctx.store().set_state(&path, value, options)? {
        WriteOutcome::Vetoed => Err(anyhow!("write to '{path}' was rejected")),
        WriteOutcome::Committed | WriteOutcome::Queued => {
            ctx.save()?;
            let stored = ctx.store().get_state(&path).unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&stored)?);
            Ok(())
        }
    }
}
