use anyhow::Result;
use clap::Parser;
use quotelens::cli::Cli;
use quotelens::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(logging::default_level(cli.verbose));
    cli.run()
}
