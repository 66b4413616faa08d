use clap::Parser;
use sct_report::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    simple_logger::SimpleLogger::new()
        .with_level(cli.log_level)
        .env()
        .init()?;
    cli.run()
}
