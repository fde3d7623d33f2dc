#[cfg(test)]
use crate::{prompt::Prompter, session::Session};
#[cfg(test)]
use anyhow::Result;
#[cfg(test)]
use calamine::{Reader, Xlsx, open_workbook};
#[cfg(test)]
use std::{collections::VecDeque, io, path::Path};
#[cfg(test)]
use tempfile::TempDir;
#[cfg(test)]
use txt2xlsx_core::sheet_names;

#[cfg(test)]
const LOG: &str = "100 A PASS gain\n200 B FAIL offset 3 4 5\n300 C PASS gain\n";

/// Answers prompts from a fixed list and records everything shown.
#[cfg(test)]
#[derive(Default)]
struct Script {
    answers: VecDeque<String>,
    asked: Vec<String>,
    said: Vec<String>,
}

#[cfg(test)]
impl Prompter for Script {
    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        self.asked.push(prompt.to_owned());
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }

    fn say(&mut self, message: &str) {
        self.said.push(message.to_owned());
    }
}

#[cfg(test)]
impl Script {
    fn answering(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }

    fn said_contains(&self, needle: &str) -> bool {
        self.said.iter().any(|m| m.contains(needle))
    }

    fn times_asked(&self, needle: &str) -> usize {
        self.asked.iter().filter(|p| p.contains(needle)).count()
    }
}

/// Temp dir with `log.txt` in it.
#[cfg(test)]
fn workdir() -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("log.txt"), LOG)?;
    Ok(dir)
}

/// Runs a whole session; the script must be used up exactly.
#[cfg(test)]
fn run(dir: &Path, answers: &[&str]) -> Script {
    let mut session = Session::new(Script::answering(answers), dir);
    session.run().unwrap();
    let script = session.into_prompter();
    assert!(script.answers.is_empty(), "unused answers: {:?}", script.answers);
    script
}

#[cfg(test)]
fn read_sheet(path: &Path, name: &str) -> Result<Vec<Vec<String>>> {
    let mut wb: Xlsx<_> = open_workbook(path)?;
    let range = wb.worksheet_range(name)?;
    Ok(range
        .rows()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect())
}

#[test]
fn export_then_start_over() -> Result<()> {
    let dir = workdir()?;
    let script = run(dir.path(), &["log", "out", "", "100", "n", "e"]);

    let out = dir.path().join("out.xlsx");
    assert_eq!(sheet_names(&out)?, ["100"]);
    assert_eq!(
        read_sheet(&out, "100")?,
        [
            ["Number", "Site", "Result", "Test Name"],
            ["100", "A", "PASS", "gain"]
        ]
    );
    assert!(script.said_contains("| Number | Site | Result | Test Name |"));
    assert!(script.said_contains("| 100    | A    | PASS   | gain      |"));
    assert_eq!(script.times_asked(".xlsx filename"), 1);
    Ok(())
}

#[test]
fn chained_runs_reuse_the_workbook() -> Result<()> {
    let dir = workdir()?;
    let script = run(
        dir.path(),
        &["log", "out", "S1", "100", "y", "log", "S2", "PASS", "n", "e"],
    );

    let out = dir.path().join("out.xlsx");
    assert_eq!(sheet_names(&out)?, ["S1", "S2"]);
    assert_eq!(read_sheet(&out, "S2")?.len(), 3);
    assert_eq!(script.times_asked(".xlsx filename"), 1);
    assert_eq!(script.times_asked(".txt filename"), 3);
    Ok(())
}

#[test]
fn existing_sheet_is_asked_again() -> Result<()> {
    let dir = workdir()?;
    let script = run(
        dir.path(),
        &["log", "out", "S1", "100", "y", "log", "s1", "S2", "200", "n", "e"],
    );

    assert!(script.said_contains("already exists"));
    assert_eq!(sheet_names(dir.path().join("out.xlsx"))?, ["S1", "S2"]);
    Ok(())
}

#[test]
fn default_sheet_name_collision_is_asked_again() -> Result<()> {
    let dir = workdir()?;
    let script = run(
        dir.path(),
        &["log", "out", "", "100", "y", "log", "", "100", "again", "n", "e"],
    );

    assert_eq!(script.times_asked("different sheet name"), 1);
    assert_eq!(sheet_names(dir.path().join("out.xlsx"))?, ["100", "again"]);
    Ok(())
}

#[test]
fn invalid_sheet_names_are_refused() -> Result<()> {
    let dir = workdir()?;
    let long = "x".repeat(32);
    let script = run(
        dir.path(),
        &["log", "out", "a/b", "History", long.as_str(), "ok", "100", "n", "e"],
    );

    assert_eq!(script.times_asked("sheet name to export to"), 4);
    assert_eq!(sheet_names(dir.path().join("out.xlsx"))?, ["ok"]);
    Ok(())
}

#[test]
fn not_found_then_retry() -> Result<()> {
    let dir = workdir()?;
    let script = run(
        dir.path(),
        &["log", "out", "", "999", "y", "log", "out", "", "100", "n", "e"],
    );

    assert_eq!(script.times_asked("Item not found"), 1);
    assert_eq!(sheet_names(dir.path().join("out.xlsx"))?, ["100"]);
    Ok(())
}

#[test]
fn not_found_retry_keeps_chained_workbook() -> Result<()> {
    let dir = workdir()?;
    let script = run(
        dir.path(),
        &["log", "out", "", "100", "y", "log", "", "999", "y", "log", "", "200", "n", "e"],
    );

    assert_eq!(script.times_asked(".xlsx filename"), 1);
    assert_eq!(sheet_names(dir.path().join("out.xlsx"))?, ["100", "200"]);
    Ok(())
}

#[test]
fn not_found_then_exit() -> Result<()> {
    let dir = workdir()?;
    run(dir.path(), &["log", "out", "", "999", "n"]);
    assert!(!dir.path().join("out.xlsx").exists());
    Ok(())
}

#[test]
fn exit_at_first_prompt() -> Result<()> {
    let dir = workdir()?;
    let script = run(dir.path(), &["e"]);
    assert_eq!(script.asked.len(), 1);
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
    Ok(())
}

#[test]
fn restart_discards_entered_values() -> Result<()> {
    let dir = workdir()?;
    let script = run(dir.path(), &["log", "r", "log", "out", "", "200", "n", "e"]);

    assert!(script.said_contains("Starting over."));
    assert_eq!(script.times_asked(".txt filename"), 3);
    assert_eq!(sheet_names(dir.path().join("out.xlsx"))?, ["200"]);
    Ok(())
}

#[test]
fn restart_forgets_chained_workbook() -> Result<()> {
    let dir = workdir()?;
    let script = run(
        dir.path(),
        &["log", "out", "", "100", "y", "r", "log", "other", "", "200", "n", "e"],
    );

    assert_eq!(script.times_asked(".xlsx filename"), 2);
    assert_eq!(sheet_names(dir.path().join("out.xlsx"))?, ["100"]);
    assert_eq!(sheet_names(dir.path().join("other.xlsx"))?, ["200"]);
    Ok(())
}

#[test]
fn blank_answers_are_asked_again() -> Result<()> {
    let dir = workdir()?;
    let script = run(
        dir.path(),
        &["", "  ", "log", "", "out", "", "", "100", "n", "e"],
    );

    assert_eq!(script.times_asked(".txt filename"), 4);
    assert_eq!(script.times_asked(".xlsx filename"), 2);
    assert_eq!(sheet_names(dir.path().join("out.xlsx"))?, ["100"]);
    Ok(())
}

#[test]
fn extensions_are_not_doubled() -> Result<()> {
    let dir = workdir()?;
    run(dir.path(), &["log.txt", "out.xlsx", "", "100", "n", "e"]);
    assert!(dir.path().join("out.xlsx").exists());
    assert!(!dir.path().join("out.xlsx.xlsx").exists());
    Ok(())
}

#[test]
fn missing_source_restarts() -> Result<()> {
    let dir = workdir()?;
    let script = run(dir.path(), &["nope", "out", "", "100", "e"]);

    assert!(script.said_contains("Error:"));
    assert!(!dir.path().join("out.xlsx").exists());
    Ok(())
}

#[test]
fn failed_write_leaves_nothing_behind() -> Result<()> {
    let dir = workdir()?;
    let script = run(dir.path(), &["log", "missing/out", "", "100", "e"]);

    assert!(script.said_contains("Error:"));
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
    Ok(())
}

#[test]
fn unreadable_workbook_is_asked_again() -> Result<()> {
    let dir = workdir()?;
    let broken = dir.path().join("broken.xlsx");
    std::fs::write(&broken, b"junk")?;
    let script = run(dir.path(), &["log", "broken", "good", "", "100", "n", "e"]);

    assert!(script.said_contains("not a readable workbook"));
    assert_eq!(std::fs::read(&broken)?, b"junk");
    assert_eq!(sheet_names(dir.path().join("good.xlsx"))?, ["100"]);
    Ok(())
}

#[test]
fn closed_input_is_an_error() -> Result<()> {
    let dir = workdir()?;
    let mut session = Session::new(Script::answering(&["log"]), dir.path());
    let err = session.run().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    Ok(())
}
