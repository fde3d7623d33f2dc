use anyhow::{Context, bail};
use clap::Parser;
use txt2xlsx::{cli::Cli, prompt::TerminalPrompter, session::Session};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .format_timestamp(None)
        .init();

    if !cli.dir.is_dir() {
        bail!("{} is not a directory", cli.dir.display());
    }

    let mut session = Session::new(TerminalPrompter, &cli.dir);
    session.run().context("terminal input failed")?;
    Ok(())
}
