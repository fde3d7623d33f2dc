use clap::{ArgAction, Parser};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "txt2xlsx", version)]
#[command(
    about = "Export rows of a whitespace-delimited test log to xlsx sheets",
    long_about = "Interactively searches a .txt test log for a test number, test name or \
                  PASS/FAIL marker and writes the matching rows as a new sheet of an .xlsx \
                  workbook. Type e at any prompt to exit, r to start over."
)]
pub struct Cli {
    /// Directory holding the text logs; workbooks are written here too
    #[arg(short = 'C', long = "dir", default_value = ".")]
    pub dir: PathBuf,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["txt2xlsx"]);
        assert_eq!(cli.dir, PathBuf::from("."));
        assert_eq!(cli.log_level(), LevelFilter::Warn);
    }

    #[test]
    fn verbosity_and_dir() {
        let cli = Cli::parse_from(["txt2xlsx", "-vv", "--dir", "logs"]);
        assert_eq!(cli.dir, PathBuf::from("logs"));
        assert_eq!(cli.log_level(), LevelFilter::Debug);
        let cli = Cli::parse_from(["txt2xlsx", "-C", "x", "-vvvv"]);
        assert_eq!(cli.log_level(), LevelFilter::Trace);
    }
}
