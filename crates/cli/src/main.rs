use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{IntegrateRequest, ScanRequest, UnparseRequest};
use settings::Settings;
use std::path::PathBuf;

mod commands;
mod settings;

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Annotation-driven rewriting of Python source files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Settings file (default: ./scribe.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Marker prefix, overriding the settings file
    #[arg(long, global = true)]
    prefix: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect directives and print the task prompt sections per group
    Scan(ScanArgs),

    /// Print a file or one of its entities with transformations applied
    Unparse(UnparseArgs),

    /// Splice a response into the annotated entities and save the file
    Integrate(IntegrateArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Python file to scan
    file: PathBuf,

    /// Remove markers and write the file back
    #[arg(long)]
    strip_markers: bool,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct UnparseArgs {
    /// Python file to render
    file: PathBuf,

    /// Class or function to render instead of the whole file
    #[arg(long)]
    entity: Option<String>,

    /// Remove directive markers
    #[arg(long)]
    drop_markers: bool,

    /// Reduce function bodies to their docstrings
    #[arg(long)]
    drop_implementation: bool,

    /// Function whose body survives --drop-implementation (repeatable)
    #[arg(long = "keep", value_name = "FUNCTION")]
    keep: Vec<String>,

    /// Prepend the file's import block
    #[arg(long)]
    with_imports: bool,

    /// Render the outermost enclosing declaration of the entity
    #[arg(long)]
    include_ancestor: bool,
}

#[derive(Args)]
struct IntegrateArgs {
    /// Python file holding the annotated entities
    file: PathBuf,

    /// File with the replacement source
    #[arg(long)]
    response: PathBuf,

    /// Only integrate this task group
    #[arg(long)]
    group: Option<String>,

    /// Write the result here instead of back to FILE
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(prefix) = cli.prefix {
        settings.engine.prefix = prefix;
        settings
            .engine
            .validate()
            .map_err(anyhow::Error::msg)?;
    }

    match cli.command {
        Commands::Scan(args) => {
            let output = commands::scan(
                &settings,
                &ScanRequest {
                    file: args.file,
                    strip_markers: args.strip_markers,
                    json: args.json,
                },
            )?;
            println!("{output}");
        }
        Commands::Unparse(args) => {
            let output = commands::unparse(
                &settings,
                &UnparseRequest {
                    file: args.file,
                    entity: args.entity,
                    drop_markers: args.drop_markers,
                    drop_implementation: args.drop_implementation,
                    keep: args.keep,
                    with_imports: args.with_imports,
                    include_ancestor: args.include_ancestor,
                },
            )?;
            println!("{output}");
        }
        Commands::Integrate(args) => {
            let target = commands::integrate(
                &settings,
                &IntegrateRequest {
                    file: args.file,
                    response: args.response,
                    group: args.group,
                    output: args.output,
                },
            )?;
            log::info!("Wrote {}", target.display());
        }
    }

    Ok(())
}
