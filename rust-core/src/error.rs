use std::{io, path::PathBuf};
use thiserror::Error;

/// Typed failures of the extractor and of sheet-name validation.
///
/// Workbook archive operations report through `anyhow` instead, with context
/// attached at every step.
#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot open source file {}: {source}", path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read source file {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid sheet name `{name}`: {reason}")]
    InvalidSheetName { name: String, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
