//! `rowmap` entity enhancer CLI.
//!
//! ```text
//! rowmap -entity Manager -table manager -path src/embed
//! rowmap --config rowmap.json --path src/embed
//! rowmap version
//! ```

use clap::{Parser, Subcommand};
use log::error;
use rowmap_cli::{Config, EntityOption, ModuleSpec};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

/// Long flags also accepted with a single leading dash.
const LONG_FLAGS: [&str; 5] = ["entity", "table", "path", "config", "log-level"];

/// Generate table metadata and change-tracking wrappers for entities
#[derive(Debug, Parser)]
#[command(name = "rowmap")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Entity struct to enhance
    #[arg(long)]
    entity: Option<String>,

    /// Table the entity maps
    #[arg(long)]
    table: Option<String>,

    /// Directory holding the entity's source file
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// JSON file listing entities to enhance
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the version
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    if let Some(Command::Version) = cli.command {
        println!("rowmap {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    if let Err(err) = rowmap_core::init_stderr_logging(&cli.log_level) {
        eprintln!("rowmap: {err}");
        return ExitCode::FAILURE;
    }

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(message) => {
            error!("event=cli_start module=cli status=error reason={message}");
            return ExitCode::FAILURE;
        }
    };

    let result = ModuleSpec::discover_from(&cli.path)
        .map_err(rowmap_cli::EnhanceError::from)
        .and_then(|mod_spec| rowmap_cli::run(&mod_spec, &cli.path, &config));
    match result {
        Ok(written) if written.is_empty() => {
            error!(
                "event=enhance module=cli status=error reason=no_entity_enhanced path={}",
                cli.path.display()
            );
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=enhance module=cli status=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn build_config(cli: &Cli) -> Result<Config, String> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path).map_err(|err| err.to_string())?,
        None => Config::default(),
    };

    match (&cli.entity, &cli.table) {
        (Some(entity), Some(table)) => config.push(EntityOption::new(entity, table)),
        (None, None) if !config.is_empty() => {}
        _ => return Err("missing_entity_or_table".to_string()),
    }
    Ok(config)
}

/// Rewrites `-entity` style flags into `--entity`.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(flag) = text.strip_prefix('-').filter(|rest| !rest.starts_with('-')) else {
                return arg;
            };
            let name = flag.split_once('=').map_or(flag, |(name, _)| name);
            if LONG_FLAGS.contains(&name) {
                OsString::from(format!("-{text}"))
            } else {
                arg
            }
        })
        .collect()
}
