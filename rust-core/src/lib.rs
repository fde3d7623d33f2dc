//! Extract matching records from whitespace-delimited test logs and write them
//! as sheets of an xlsx workbook.
//!
//! The two halves are independent: [`extract`] / [`extract_file`] turn text
//! lines into a [`Table`], [`write_sheet`] puts a table into a new sheet of a
//! new or existing workbook.

mod error;
mod extract_part;
mod files_part;
pub mod sheet_name;
pub mod table;

pub use error::{Error, Result};
pub use extract_part::{Extraction, MatchMode, extract, extract_file};
pub use files_part::{WorkbookState, probe_workbook, sheet_exists, sheet_names, write_sheet};
pub use sheet_name::{sheet_name_from_query, validate_sheet_name};
pub use table::{Cell, Column, Table};
