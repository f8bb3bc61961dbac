//! Command line front end for the accrete engine
//!
//! ```text
//! accrete check <manifest>
//! accrete apply <manifest> [--state FILE] [--output FILE] [--force] [--extension-dir DIR]
//! accrete show <state> [--rendered]
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod commands;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use commands::ApplyOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the command line definition
#[must_use]
pub fn cli() -> Command {
    Command::new("accrete")
        .version(accrete_core::VERSION)
        .about("Validate, fetch and compose optional homeserver capabilities")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Log filter used when RUST_LOG is unset"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("check")
                .about("Validate required settings of every enabled capability")
                .arg(manifest_arg()),
        )
        .subcommand(
            Command::new("apply")
                .about("Fetch artifacts and compose configuration")
                .arg(manifest_arg())
                .arg(
                    Arg::new("state")
                        .long("state")
                        .value_parser(value_parser!(PathBuf))
                        .help("Snapshot file to resume from and update"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write rendered configuration here instead of stdout"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Re-download every artifact"),
                )
                .arg(
                    Arg::new("extension-dir")
                        .long("extension-dir")
                        .value_parser(value_parser!(PathBuf))
                        .help("Override the manifest's extension directory"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print a persisted snapshot")
                .arg(
                    Arg::new("state")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Snapshot file"),
                )
                .arg(
                    Arg::new("rendered")
                        .long("rendered")
                        .action(ArgAction::SetTrue)
                        .help("Print the flattened configuration"),
                ),
        )
}

fn manifest_arg() -> Arg {
    Arg::new("manifest")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Manifest file (.yaml, .yml, .json or .toml)")
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `--log-level`.
pub fn init_tracing(matches: &ArgMatches) {
    let level = matches
        .get_one::<String>("log-level")
        .map_or("info", String::as_str);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Logs go to stderr so stdout stays machine-readable
    if matches.get_flag("log-json") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn path_arg(matches: &ArgMatches, name: &str) -> Result<PathBuf> {
    matches
        .get_one::<PathBuf>(name)
        .cloned()
        .with_context(|| format!("missing argument <{name}>"))
}

/// Dispatch parsed arguments to a subcommand
///
/// # Errors
/// Propagates subcommand failures
pub async fn execute(matches: &ArgMatches) -> Result<ExitCode> {
    let mut stdout = std::io::stdout().lock();

    match matches.subcommand() {
        Some(("check", args)) => commands::check(&path_arg(args, "manifest")?, &mut stdout),
        Some(("apply", args)) => {
            let options = ApplyOptions {
                manifest: path_arg(args, "manifest")?,
                state: args.get_one::<PathBuf>("state").cloned(),
                output: args.get_one::<PathBuf>("output").cloned(),
                force: args.get_flag("force"),
                extension_dir: args.get_one::<PathBuf>("extension-dir").cloned(),
            };
            commands::apply(&options, &mut stdout).await
        }
        Some(("show", args)) => {
            commands::show(&path_arg(args, "state")?, args.get_flag("rendered"), &mut stdout).await
        }
        _ => Ok(ExitCode::FAILURE),
    }
}
