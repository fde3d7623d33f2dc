//! Interactive front end of txt2xlsx: argument parsing, the prompt seam and
//! the session loop driving [`txt2xlsx_core`].

pub mod cli;
pub mod prompt;
pub mod session;
mod test;
