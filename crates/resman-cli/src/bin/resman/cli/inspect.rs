use clap::Parser;
use itertools::Itertools as _;
use scidev_resman::sources::SourceKind;

use super::ArchiveArgs;

#[derive(Parser)]
pub(crate) struct Detect {
    #[clap(flatten)]
    archive: ArchiveArgs,
}

impl Detect {
    pub(crate) fn run(&self) -> anyhow::Result<()> {
        let manager = self.archive.open()?;
        let version = manager.detected_version();
        println!("Index layout:  {}", version.map().description());
        println!("Volume layout: {}", version.volume().description());
        println!("Compression:   {:?}", version.era());
        Ok(())
    }
}

#[derive(Parser)]
pub(crate) struct Info {
    #[clap(flatten)]
    archive: ArchiveArgs,

    /// Also list every source the archive was read from.
    #[clap(short, long)]
    sources: bool,
}

impl Info {
    pub(crate) fn run(&self) -> anyhow::Result<()> {
        let mut manager = self.archive.open()?;
        let version = manager.detected_version();
        println!(
            "Layout:           {} index, {} volumes",
            version.map().description(),
            version.volume().description()
        );
        println!("Resources:        {}", manager.catalog().len());
        println!("Sources:          {}", manager.sources().len());
        println!("Macintosh:        {}", manager.is_platform_variant());
        println!("View colors:      {:?}", manager.view_color_depth());
        println!("Extended font:    {}", manager.has_extended_font());

        let counts = manager
            .catalog()
            .ids()
            .map(|id| id.res_type())
            .counts()
            .into_iter()
            .sorted();
        for (res_type, count) in counts {
            println!("  {:<16}{count}", res_type.name());
        }

        if self.sources {
            println!();
            for (id, source) in manager.sources().iter() {
                match source.kind() {
                    SourceKind::AudioVolume {
                        compression: Some(compression),
                        ..
                    } => println!("{:>5} {source} ({:?})", id.to_string(), compression.codec()),
                    _ => println!("{:>5} {source}", id.to_string()),
                }
            }
        }
        Ok(())
    }
}
