use crate::error::{Error, Result};
use crate::table::Table;
use log::{debug, trace};
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

/// Which field of a record the query is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Only the first token (the test number).
    ByIdentifier,
    /// Any token of the record (a test name, `PASS`, `FAIL`, ...).
    ByMembership,
}

impl MatchMode {
    /// Mode the interactive driver uses for a query: all-digit queries are
    /// test numbers, everything else is looked up anywhere in the record.
    pub fn for_query(query: &str) -> Self {
        if !query.is_empty() && query.bytes().all(|b| b.is_ascii_digit()) {
            MatchMode::ByIdentifier
        } else {
            MatchMode::ByMembership
        }
    }

    fn selects(self, tokens: &[&str], query: &str) -> bool {
        match self {
            MatchMode::ByIdentifier => tokens.first() == Some(&query),
            MatchMode::ByMembership => tokens.contains(&query),
        }
    }
}

/// Result of one extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub table: Table,
    /// `false` when no line matched; `table` is then empty.
    pub found: bool,
}

/// Selects the lines whose tokens match `query` and shapes them into a table.
///
/// Blank lines are skipped. Matching is exact and case-sensitive: a query of
/// `"100"` never selects a record numbered `"1000"`.
///
/// # Arguments
/// * `lines` - Raw lines of the source, read lazily.
/// * `query` - The string to look for.
/// * `mode` - Whether to compare the first token only or every token.
///
/// # Returns
/// The extraction, or the first read error of `lines`.
pub fn extract<I>(lines: I, query: &str, mode: MatchMode) -> io::Result<Extraction>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    let mut records = Vec::new();
    let mut scanned = 0usize;

    for line in lines {
        let line = line?;
        scanned += 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if mode.selects(&tokens, query) {
            trace!("line {scanned} selected");
            records.push(tokens.into_iter().map(str::to_owned).collect::<Vec<_>>());
        }
    }

    debug!(
        "{} of {} lines matched `{}` ({:?})",
        records.len(),
        scanned,
        query,
        mode
    );

    let found = !records.is_empty();
    Ok(Extraction {
        table: Table::from_records(records),
        found,
    })
}

/// Opens `path` and runs [`extract`] over its lines.
///
/// A source that cannot be opened or read is an error; a source without
/// matches is not.
pub fn extract_file<P: AsRef<Path>>(path: P, query: &str, mode: MatchMode) -> Result<Extraction> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::SourceOpen {
        path: path.to_path_buf(),
        source,
    })?;

    extract(BufReader::new(file).lines(), query, mode).map_err(|source| Error::SourceRead {
        path: path.to_path_buf(),
        source,
    })
}
