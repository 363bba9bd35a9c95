use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    args.init_logging();
    args.run()?;
    Ok(())
}
