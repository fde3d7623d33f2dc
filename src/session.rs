//! Interactive prompt sequence around the extractor and the workbook writer.

use crate::prompt::Prompter;
use log::{info, warn};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use txt2xlsx_core::{
    MatchMode, WorkbookState, extract_file, probe_workbook, sheet_exists, sheet_name_from_query,
    validate_sheet_name, write_sheet,
};

/// Typed at any prompt: leave the program.
pub const EXIT: &str = "e";
/// Typed at any prompt: forget everything entered and start over.
pub const RESTART: &str = "r";

const BANNER: &str = "\n.txt to .xlsx export. Follow the provided prompts. \
                      At any point, type e to exit or r to re-enter parameters.";

/// Why a run stopped before reaching its end.
#[derive(Debug)]
pub enum Interrupt {
    Exit,
    Restart,
    /// The terminal itself failed (closed input, broken pipe).
    Terminal(io::Error),
}

impl From<io::Error> for Interrupt {
    fn from(e: io::Error) -> Self {
        Interrupt::Terminal(e)
    }
}

/// How a completed run continues.
#[derive(Debug, PartialEq, Eq)]
enum RunOutcome {
    /// Next run writes a new sheet into this workbook.
    Chain(PathBuf),
    StartOver,
    /// Nothing matched; ask again, keeping a chained workbook.
    Retry,
    /// Extraction or writing failed; partial output was removed.
    Failed,
    Exit,
}

/// State carried from one run to the next.
#[derive(Debug, Default)]
struct SessionState {
    chained: Option<PathBuf>,
}

pub struct Session<P> {
    prompter: P,
    dir: PathBuf,
}

impl<P: Prompter> Session<P> {
    /// `dir` is where source names are looked up and workbooks are written.
    pub fn new(prompter: P, dir: impl Into<PathBuf>) -> Self {
        Self {
            prompter,
            dir: dir.into(),
        }
    }

    pub fn into_prompter(self) -> P {
        self.prompter
    }

    /// Runs prompt sequences until the user exits.
    ///
    /// Returns an error only when the terminal fails.
    pub fn run(&mut self) -> io::Result<()> {
        self.prompter.say(BANNER);
        let mut state = SessionState::default();

        loop {
            match self.run_once(&state) {
                Ok(RunOutcome::Chain(workbook)) => state.chained = Some(workbook),
                Ok(RunOutcome::Retry) => {}
                Ok(RunOutcome::StartOver | RunOutcome::Failed) => state = SessionState::default(),
                Ok(RunOutcome::Exit) | Err(Interrupt::Exit) => return Ok(()),
                Err(Interrupt::Restart) => {
                    self.prompter.say("Starting over.\n");
                    state = SessionState::default();
                }
                Err(Interrupt::Terminal(e)) => return Err(e),
            }
        }
    }

    fn run_once(&mut self, state: &SessionState) -> Result<RunOutcome, Interrupt> {
        let source = self.ask_required("Enter the .txt filename to search")?;
        let source = self.dir.join(with_extension(&source, "txt"));

        let workbook = match &state.chained {
            Some(path) => path.clone(),
            None => self.ask_workbook()?,
        };

        let sheet = loop {
            match self.ask_optional("(Optional, may leave this blank) Enter the sheet name to export to")? {
                None => break None,
                Some(name) if self.sheet_name_usable(&workbook, &name) => break Some(name),
                Some(_) => {}
            }
        };

        let query = self.ask_required(
            "Enter the term (test number, test name or PASS/FAIL) you would like to search for",
        )?;

        let sheet = match sheet {
            Some(name) => name,
            None => {
                let mut name = sheet_name_from_query(&query);
                while !self.sheet_name_usable(&workbook, &name) {
                    name = self.ask_required("Enter a different sheet name")?;
                }
                name
            }
        };

        let mode = MatchMode::for_query(&query);
        let extraction = match extract_file(&source, &query, mode) {
            Ok(extraction) => extraction,
            Err(e) => return Ok(self.fail(e.into(), None)),
        };

        if !extraction.found {
            let retry = self.ask("Item not found. Type y to run again or anything else to exit")?;
            return Ok(if retry.trim() == "y" {
                RunOutcome::Retry
            } else {
                RunOutcome::Exit
            });
        }

        self.prompter.say(&format!(
            "\nFound the following data, exporting it to sheet `{}` of {}:\n",
            sheet,
            workbook.display()
        ));
        self.prompter.say(&extraction.table.to_string());

        let existed = workbook.exists();
        if let Err(e) = write_sheet(&extraction.table, &workbook, &sheet) {
            let created = (!existed).then_some(workbook.as_path());
            return Ok(self.fail(e, created));
        }
        info!(
            "{} rows for `{}` written to {}",
            extraction.table.len(),
            query,
            workbook.display()
        );

        let again = self.ask(
            "\nWould you like to export another term into the same workbook, into a new sheet? \
             Type y to do so or anything else to start over",
        )?;
        Ok(if again.trim() == "y" {
            RunOutcome::Chain(workbook)
        } else {
            RunOutcome::StartOver
        })
    }

    /// Asks for the workbook until the name points at a new file or a
    /// readable workbook.
    fn ask_workbook(&mut self) -> Result<PathBuf, Interrupt> {
        loop {
            let name = self.ask_required("Enter the .xlsx filename to export to")?;
            let path = self.dir.join(with_extension(&name, "xlsx"));
            match probe_workbook(&path) {
                WorkbookState::Unreadable(e) => self.prompter.say(&format!(
                    "{} exists but is not a readable workbook ({e:#}). Choose another name.",
                    path.display()
                )),
                WorkbookState::Absent | WorkbookState::Present(_) => return Ok(path),
            }
        }
    }

    fn sheet_name_usable(&mut self, workbook: &Path, name: &str) -> bool {
        if let Err(e) = validate_sheet_name(name) {
            self.prompter.say(&e.to_string());
            false
        } else if sheet_exists(workbook, name) {
            self.prompter.say(&format!(
                "Sheet `{}` already exists in {}.",
                name,
                workbook.display()
            ));
            false
        } else {
            true
        }
    }

    /// Reports a failed run and removes the workbook if this run created it.
    fn fail(&mut self, err: anyhow::Error, created: Option<&Path>) -> RunOutcome {
        warn!("run failed: {err:#}");
        self.prompter.say(&format!(
            "Error: {err:#}\nOne of the supplied parameters may have been incorrect? Retrying...\n"
        ));

        if let Some(path) = created.filter(|p| p.exists()) {
            match fs::remove_file(path) {
                Ok(()) => info!("removed partial workbook {}", path.display()),
                Err(e) => warn!("cannot remove {}: {}", path.display(), e),
            }
        }
        RunOutcome::Failed
    }

    /// One answer, with the exit and restart sentinels applied.
    fn ask(&mut self, prompt: &str) -> Result<String, Interrupt> {
        let answer = self.prompter.ask(prompt)?;
        match answer.trim() {
            EXIT => Err(Interrupt::Exit),
            RESTART => Err(Interrupt::Restart),
            _ => Ok(answer),
        }
    }

    /// Re-asks until the answer is not blank; returns it trimmed.
    fn ask_required(&mut self, prompt: &str) -> Result<String, Interrupt> {
        loop {
            let answer = self.ask(prompt)?;
            let answer = answer.trim();
            if !answer.is_empty() {
                return Ok(answer.to_owned());
            }
        }
    }

    fn ask_optional(&mut self, prompt: &str) -> Result<Option<String>, Interrupt> {
        let answer = self.ask(prompt)?;
        let answer = answer.trim();
        Ok((!answer.is_empty()).then(|| answer.to_owned()))
    }
}

/// Appends `.ext` unless `name` already carries it.
pub fn with_extension(name: &str, ext: &str) -> String {
    let has_ext = Path::new(name)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ext));
    if has_ext {
        name.to_owned()
    } else {
        format!("{name}.{ext}")
    }
}
