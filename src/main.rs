use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use tsumiki::utils::init_logging;
use tsumiki::{Config, Env, pipeline};

#[derive(Parser)]
#[command(name = "tsumiki")]
#[command(about = "Asset pipeline and live-reload development server for Hugo websites")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the config file (defaults to tsumiki.toml when present)
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site with Hugo
    Hugo,
    /// Build everything, then serve the site and rebuild on changes
    Server,
    /// Production build of the whole site
    Build,
    /// Compile stylesheets
    Sass,
    /// Bundle scripts
    Js,
    /// Copy fonts into the output directory
    Fonts,
    /// Print the task graph as a Mermaid diagram
    Graph,
}

impl Command {
    fn task(&self) -> Option<&'static str> {
        match self {
            Command::Hugo => Some("hugo"),
            Command::Server => Some("server"),
            Command::Build => Some("build"),
            Command::Sass => Some("sass"),
            Command::Js => Some("js"),
            Command::Fonts => Some("fonts"),
            Command::Graph => None,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    init_logging(cli.verbose)?;

    let pipeline = pipeline::standard()?;

    let Some(task) = cli.command.task() else {
        println!("{pipeline}");
        return Ok(());
    };

    let config = Config::load(cli.config.as_deref())?;
    let env = Env::new(config);
    let pipeline = Arc::new(pipeline);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(pipeline.run_named(task, &env))?;

    Ok(())
}
