use dialoguer::Input;
use std::io::{self, BufRead, IsTerminal, Write};

/// Terminal seam of the interactive session.
pub trait Prompter {
    /// Shows `prompt` and returns the raw line the user typed.
    fn ask(&mut self, prompt: &str) -> io::Result<String>;

    /// Shows a message to the user.
    fn say(&mut self, message: &str);
}

/// Reads answers from the terminal.
///
/// Uses `dialoguer` line editing when stdin is a terminal and falls back to
/// plain line reads when input is piped.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        if io::stdin().is_terminal() {
            return Input::<String>::new()
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()
                .map_err(|e| io::Error::other(e.to_string()));
        }

        print!("{prompt}: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_owned())
    }

    fn say(&mut self, message: &str) {
        println!("{message}");
    }
}
