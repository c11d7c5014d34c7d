mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use brainstem::BrainSpec;

#[derive(Parser)]
#[command(
    name = "brainstem",
    version,
    about = "Validate and inspect brainstem brain specs"
)]
struct Cli {
    /// Log at debug level (otherwise RUST_LOG, default warn).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and validate a spec file.
    Validate { file: PathBuf },

    /// Print the state hierarchy with defaults and transitions.
    Tree { file: PathBuf },

    /// Print the channel table.
    Channels { file: PathBuf },

    /// Re-emit the normalized spec.
    Export {
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Print the JSON schema of spec files.
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Validate { file } => {
            let spec = load(&file)?;
            println!("{}", render::summary(&spec));
        }
        Command::Tree { file } => {
            let spec = load(&file)?;
            let Some(machine) = spec.machine.as_ref() else {
                bail!("brain '{}' has no state machine", spec.name);
            };
            print!("{}", render::state_tree(machine));
        }
        Command::Channels { file } => {
            let spec = load(&file)?;
            print!("{}", render::channel_table(&spec.channels)?);
        }
        Command::Export { file, format } => {
            let spec = load(&file)?;
            let out = match format {
                Format::Json => spec.to_json_string()?,
                Format::Yaml => spec.to_yaml_string()?,
            };
            println!("{}", out.trim_end());
        }
        Command::Schema => {
            let schema = BrainSpec::json_schema()?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<BrainSpec> {
    let spec = BrainSpec::from_file(path)
        .with_context(|| format!("failed to load brain spec {}", path.display()))?;
    info!(path = %path.display(), name = %spec.name, "Loaded brain spec");
    Ok(spec)
}
