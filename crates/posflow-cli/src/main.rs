//! posflow: record and replay desktop input macros.

mod logging;
mod record;
mod report;
mod run;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use posflow_core::ports::MonitorSource;
use posflow_core::{load_path, validate_sequence, ActionSequence, MacroStore, Settings};
use posflow_platform::SystemMonitors;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "posflow", version, about = "Record and replay desktop input macros")]
struct Cli {
    /// Settings file (defaults to settings.yaml in the config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Debug-level console logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a saved macro (by name) or a macro file (by path)
    Run(run::RunArgs),
    /// Record a new macro using the start/stop and pause/resume hotkeys
    Record(record::RecordArgs),
    /// List saved macros
    List,
    /// Print a macro and report validation problems
    Show { target: String },
    /// Delete a saved macro
    Delete { name: String },
    /// List attached monitors with the ids macros refer to
    Monitors,
    /// Print the effective settings
    Config {
        /// Write the defaults to the settings file if it does not exist
        #[arg(long)]
        init: bool,
    },
}

fn macros_dir(settings: &Settings) -> PathBuf {
    settings
        .macros_dir
        .clone()
        .unwrap_or_else(|| posflow_core::data_dir().join("macros"))
}

pub(crate) fn macro_store(settings: &Settings) -> MacroStore {
    MacroStore::open(macros_dir(settings))
}

/// A name of a saved macro, or a path to a macro file.
pub(crate) fn load_macro(store: &MacroStore, target: &str) -> Result<ActionSequence> {
    let path = Path::new(target);
    if path.is_file() {
        return load_path(path).with_context(|| format!("failed to load {}", path.display()));
    }
    store
        .load(target)
        .with_context(|| format!("failed to load macro `{target}`"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: invalid settings: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::setup(&settings.logging, cli.verbose);

    match dispatch(cli, settings) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli, settings: Settings) -> Result<ExitCode> {
    match cli.command {
        Command::Run(args) => run::execute(args, settings),
        Command::Record(args) => record::execute(args, settings),
        Command::List => {
            let store = macro_store(&settings);
            for name in store.list().context("failed to list macros")? {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { target } => {
            let store = macro_store(&settings);
            let sequence = load_macro(&store, &target)?;
            println!("{}", serde_json::to_string_pretty(&sequence)?);
            match validate_sequence(&sequence) {
                Ok(()) => Ok(ExitCode::SUCCESS),
                Err(errors) => {
                    for e in &errors {
                        eprintln!("invalid: {e}");
                    }
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Delete { name } => {
            macro_store(&settings)
                .delete(&name)
                .with_context(|| format!("failed to delete macro `{name}`"))?;
            println!("deleted {name}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Monitors => {
            let geometry = SystemMonitors::new()
                .enumerate_monitors()
                .context("failed to enumerate monitors")?;
            for (id, b) in geometry.iter() {
                let primary = if id == 1 { " (primary)" } else { "" };
                println!("{id}: {}x{} at ({}, {}){primary}", b.width, b.height, b.left, b.top);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { init } => {
            let path = cli.settings.unwrap_or_else(Settings::default_path);
            if init && !path.exists() {
                Settings::default()
                    .save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("# wrote {}", path.display());
            }
            println!("# {}", path.display());
            print!("{}", serde_yaml::to_string(&settings)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use posflow_core::{Action, ActionKind};
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::parse_from([
            "posflow", "run", "login", "--loops", "3", "--dry-run", "--seed", "7",
        ]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.target, "login");
                assert_eq!(args.loops, Some(3));
                assert!(args.dry_run);
                assert_eq!(args.seed, Some(7));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_load_macro_by_name_or_path() {
        let dir = tempdir().unwrap();
        let store = MacroStore::open(dir.path());
        let sequence = ActionSequence::new(
            "greet",
            vec![Action::new(ActionKind::TypeText {
                text: "hi".into(),
                press_enter: false,
            })],
        );
        let path = store.save(&sequence).unwrap();

        assert_eq!(load_macro(&store, "greet").unwrap().actions.len(), 1);
        let by_path = load_macro(&store, path.to_str().unwrap()).unwrap();
        assert_eq!(by_path.meta.name, "greet");
        assert!(load_macro(&store, "missing").is_err());
    }
}
