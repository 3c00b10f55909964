#![deny(unsafe_code)]

mod autostart;
mod commands;
mod common;
mod config;
mod engine;
mod monitor;
mod switcher;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::commands::App;
use crate::common::constants;
use crate::config::ConfigStore;

#[derive(Parser)]
#[command(name = "display-layout-switcher")]
#[command(version)]
#[command(about = "Switch desktop layouts when the monitor setup changes", long_about = None)]
struct Cli {
    /// Directory holding settings.json (overrides the per-user config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the monitor topology and switch layouts (default)
    Run {
        /// Do not print observed fingerprints to stdout
        #[arg(long)]
        minimized: bool,
    },
    /// Print the fingerprint of the connected monitors
    Fingerprint,
    /// List layouts under the layouts root
    Layouts,
    /// List fingerprint to layout bindings
    Bindings,
    /// Bind a layout to a fingerprint (the current one by default)
    Bind {
        #[arg(long)]
        fingerprint: Option<String>,
        layout: String,
    },
    /// Remove a binding
    Unbind {
        #[arg(long)]
        fingerprint: Option<String>,
    },
    /// Show the variables of a layout's active skins and overrides in effect
    Skins {
        layout: String,
        #[arg(long)]
        fingerprint: Option<String>,
    },
    /// Override one skin variable; an empty value removes the override
    SetOverride {
        #[arg(long)]
        fingerprint: Option<String>,
        skin: String,
        variable: String,
        value: String,
    },
    /// Remove every override of a binding
    ClearOverrides {
        #[arg(long)]
        fingerprint: Option<String>,
    },
    /// Evaluate the current topology once and switch if needed
    Apply,
    /// Show or change the layouts and skins root directories
    Paths {
        #[arg(long)]
        layouts: Option<PathBuf>,
        #[arg(long)]
        skins: Option<PathBuf>,
    },
    /// Start automatically with the desktop session
    Autostart {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Archive the current settings file
    Backup,
    /// List settings archives
    Backups,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // stderr, so command output on stdout stays scriptable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings_path = match cli.config_dir {
        Some(dir) => dir.join(constants::config::FILENAME),
        None => ConfigStore::default_path(),
    };
    let app = App::new(ConfigStore::load(settings_path));

    match cli.command.unwrap_or(Command::Run { minimized: false }) {
        Command::Run { minimized } => commands::run(&app, minimized),
        Command::Fingerprint => {
            commands::print_fingerprint(&app);
            Ok(())
        }
        Command::Layouts => {
            commands::list_layouts(&app);
            Ok(())
        }
        Command::Bindings => {
            commands::list_bindings(&app);
            Ok(())
        }
        Command::Bind {
            fingerprint,
            layout,
        } => commands::bind(&app, fingerprint, &layout),
        Command::Unbind { fingerprint } => commands::unbind(&app, fingerprint),
        Command::Skins {
            layout,
            fingerprint,
        } => {
            commands::show_skins(&app, &layout, fingerprint);
            Ok(())
        }
        Command::SetOverride {
            fingerprint,
            skin,
            variable,
            value,
        } => commands::set_override(&app, fingerprint, &skin, &variable, &value),
        Command::ClearOverrides { fingerprint } => commands::clear_overrides(&app, fingerprint),
        Command::Apply => {
            commands::apply(&app);
            Ok(())
        }
        Command::Paths { layouts, skins } => commands::paths(&app, layouts, skins),
        Command::Autostart { state } => commands::set_autostart(&app, matches!(state, Toggle::On)),
        Command::Backup => commands::backup(&app),
        Command::Backups => commands::list_backups(&app),
    }
}
