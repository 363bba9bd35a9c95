use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use scidev_resman::{ResourceManager, ResourceManagerConfig};

mod inspect;
mod resources;

/// Inspects the resource archives of SCI games.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Log debugging output. `RUST_LOG` overrides this.
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

impl Cli {
    pub(crate) fn init_logging(&self) {
        let default_level = if self.verbose { "debug" } else { "warn" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .init();
    }

    pub(crate) fn run(&self) -> anyhow::Result<()> {
        match &self.command {
            Command::Detect(detect) => detect.run(),
            Command::Info(info) => info.run(),
            Command::List(list) => list.run(),
            Command::Dump(dump) => dump.run(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Prints the detected index and volume layouts.
    Detect(inspect::Detect),

    /// Prints the sources of an archive and facts derived from its resources.
    Info(inspect::Info),

    /// Lists the resources in an archive.
    List(resources::List),

    /// Writes out the decoded bytes of one resource.
    Dump(resources::Dump),
}

/// Options shared by every command that opens an archive.
#[derive(Args)]
pub(crate) struct ArchiveArgs {
    /// Path to the game's root directory.
    root_dir: PathBuf,

    /// A TOML file with resource manager settings.
    #[clap(long)]
    config: Option<PathBuf>,
}

impl ArchiveArgs {
    pub(crate) fn open(&self) -> anyhow::Result<ResourceManager> {
        let config = match &self.config {
            Some(path) => ResourceManagerConfig::from_toml_file(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?,
            None => ResourceManagerConfig::default(),
        };
        ResourceManager::open_dir(self.root_dir.clone(), config)
            .with_context(|| format!("Failed to open {}", self.root_dir.display()))
    }
}
