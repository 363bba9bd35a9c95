use std::{io::Write as _, path::PathBuf};

use anyhow::Context as _;
use clap::Parser;
use scidev_resman::{ResourceId, ResourceType, utils::debug::hex_dump};

use super::ArchiveArgs;

#[derive(Parser)]
pub(crate) struct List {
    #[clap(flatten)]
    archive: ArchiveArgs,

    /// Only list resources of this type (e.g. view, script, audio36).
    #[clap(long = "type", short = 't')]
    res_type: Option<ResourceType>,

    /// Only list resources with this number.
    #[clap(long = "map", short = 'm')]
    number: Option<u16>,

    /// Also print where each resource is stored.
    #[clap(short, long)]
    long: bool,
}

impl List {
    pub(crate) fn run(&self) -> anyhow::Result<()> {
        let manager = self.archive.open()?;
        let mut ids: Vec<ResourceId> = match self.res_type {
            Some(res_type) => manager
                .list_resources(res_type, self.number)
                .into_iter()
                .collect(),
            None => manager
                .catalog()
                .ids()
                .filter(|id| self.number.is_none_or(|number| id.number() == number))
                .copied()
                .collect(),
        };
        ids.sort();

        for id in ids {
            if !self.long {
                println!("{id}");
                continue;
            }
            let Some(entry) = manager.lookup(id) else {
                continue;
            };
            let location = entry.location();
            let source = manager.sources().get(location.source());
            println!(
                "{:<28} {:>10} {:>8}  {}",
                id.to_string(),
                format!("{:#x}", location.offset()),
                location.size(),
                source.location()
            );
        }
        Ok(())
    }
}

#[derive(Parser)]
pub(crate) struct Dump {
    #[clap(flatten)]
    archive: ArchiveArgs,

    /// The resource type (e.g. view, script).
    res_type: ResourceType,

    /// The resource number.
    number: u16,

    /// Print a hex dump instead of the raw bytes.
    #[clap(long, conflicts_with = "out")]
    hex: bool,

    /// Write the bytes to this file instead of standard output.
    #[clap(short, long)]
    out: Option<PathBuf>,
}

impl Dump {
    pub(crate) fn run(&self) -> anyhow::Result<()> {
        let mut manager = self.archive.open()?;
        let id = ResourceId::new(self.res_type, self.number);
        let data = manager
            .resolve(id, false)?
            .with_context(|| format!("Resource {id} not found"))?;

        if let Some(path) = &self.out {
            std::fs::write(path, &data)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {} bytes of {id} to {}", data.len(), path.display());
        } else if self.hex {
            print!("{}", hex_dump(&data, 0));
        } else {
            std::io::stdout().lock().write_all(&data)?;
        }
        Ok(())
    }
}
