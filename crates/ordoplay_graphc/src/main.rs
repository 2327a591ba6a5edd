// SPDX-License-Identifier: MIT OR Apache-2.0
//! `graphc` - compile `OrdoPlay` render and material graphs from the command line.
//!
//! ```bash
//! graphc pipeline forward.graph.ron
//! graphc material water.graph.ron --settings water.settings.ron --stage fragment
//! graphc settings > default.settings.ron
//! ```
//!
//! Artifacts go to stdout, logs to stderr (filtered through `RUST_LOG`).

use clap::{Parser, Subcommand, ValueEnum};
use ordoplay_render_graph::{
    persist, CompileError, Compiler, CompilerSettings, PersistError, SettingsError, ShaderStage,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Parser)]
#[command(version, about = "Compile OrdoPlay render and material graphs")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a render graph and print its operation list
    Pipeline {
        /// Graph document (RON)
        graph: PathBuf,

        /// Compiler settings (RON)
        #[arg(long, short)]
        settings: Option<PathBuf>,

        /// Trace every operation as it is transferred
        #[arg(long)]
        trace: bool,
    },

    /// Generate program source for a material graph
    Material {
        /// Graph document (RON)
        graph: PathBuf,

        /// Compiler settings (RON)
        #[arg(long, short)]
        settings: Option<PathBuf>,

        /// Material name, overriding the settings
        #[arg(long, short)]
        name: Option<String>,

        /// Program stage, overriding the settings
        #[arg(long, value_enum)]
        stage: Option<StageArg>,
    },

    /// Print the default compiler settings
    Settings,
}

#[derive(Clone, Copy, ValueEnum)]
enum StageArg {
    Fragment,
    Vertex,
}

impl From<StageArg> for ShaderStage {
    fn from(stage: StageArg) -> Self {
        match stage {
            StageArg::Fragment => Self::Fragment,
            StageArg::Vertex => Self::Vertex,
        }
    }
}

/// Error ending a `graphc` run
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Graph document could not be loaded
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Settings could not be loaded
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Graph failed to compile
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Artifact could not be printed
    #[error("Failed to serialize output: {0}")]
    Output(#[from] ron::Error),
}

fn load_settings(path: Option<&Path>) -> Result<CompilerSettings, CliError> {
    match path {
        Some(path) => Ok(CompilerSettings::load(path)?),
        None => Ok(CompilerSettings::default()),
    }
}

fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Pipeline {
            graph,
            settings,
            trace,
        } => {
            let mut settings = load_settings(settings.as_deref())?;
            settings.trace_operations |= trace;

            let mut graph = persist::load(&graph)?;
            let pipeline = Compiler::new(settings).compile_pipeline(&mut graph)?;
            println!(
                "{}",
                ron::ser::to_string_pretty(&pipeline, ron::ser::PrettyConfig::default())?
            );
        }
        Command::Material {
            graph,
            settings,
            name,
            stage,
        } => {
            let mut settings = load_settings(settings.as_deref())?;
            if let Some(name) = name {
                settings.material_name = name;
            }
            if let Some(stage) = stage {
                settings.stage = stage.into();
            }

            let mut graph = persist::load(&graph)?;
            let source = Compiler::new(settings).generate_material_source(&mut graph)?;
            print!("{}", source.text);
        }
        Command::Settings => {
            println!("{}", CompilerSettings::default().to_ron()?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ordoplay_render_graph=info,graphc=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if let CliError::Compile(compile) = &error {
                if let Some(node) = compile.node() {
                    tracing::error!(%node, "Compilation failed");
                }
            }
            tracing::error!("{error}");
            ExitCode::FAILURE
        }
    }
}
