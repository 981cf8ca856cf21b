//! Operator interaction.
//!
//! Everything that asks the operator a question goes through [`Prompt`],
//! so that resolution and lookup logic can be driven by a script in tests
//! and by a terminal in the binary.

use std::io::{self, BufRead, Write};

use crate::error::{Error, Result};

/// A channel to the human operator.
pub trait Prompt {
    /// Shows a message.
    fn message(&mut self, text: &str) -> Result<()>;

    /// Asks for a numeric selection. An empty answer yields `default`.
    fn select(&mut self, question: &str, default: usize) -> Result<usize>;

    /// Asks a yes/no question. An empty answer yields `default`.
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;
}

/// A [`Prompt`] reading answers line by line from `input`.
pub struct Terminal<R, W> {
    input: R,
    output: W,
}

impl Terminal<io::StdinLock<'static>, io::Stderr> {
    /// Prompts on stderr and reads from stdin, keeping stdout free for
    /// data such as exported keys.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question} ").map_err(Error::Prompt)?;
        self.output.flush().map_err(Error::Prompt)?;

        let mut answer = String::new();
        let read = self.input.read_line(&mut answer).map_err(Error::Prompt)?;
        if read == 0 {
            return Err(Error::Prompt(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            )));
        }
        Ok(answer.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Prompt for Terminal<R, W> {
    fn message(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}").map_err(Error::Prompt)
    }

    fn select(&mut self, question: &str, default: usize) -> Result<usize> {
        let answer = self.ask(&format!("{question} [{default}]:"))?;
        if answer.is_empty() {
            return Ok(default);
        }
        answer.parse().map_err(|_| {
            Error::Prompt(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected a number, got '{answer}'"),
            ))
        })
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let answer = self.ask(&format!("{question} {hint}"))?;
            match answer.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer yes or no.").map_err(Error::Prompt)?,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use super::*;

    /// Scripted answers, recording everything shown.
    #[derive(Default)]
    pub(crate) struct Scripted {
        pub selections: VecDeque<usize>,
        pub confirmations: VecDeque<bool>,
        pub shown: Vec<String>,
    }

    impl Scripted {
        pub(crate) fn new(selections: &[usize], confirmations: &[bool]) -> Self {
            Self {
                selections: selections.iter().copied().collect(),
                confirmations: confirmations.iter().copied().collect(),
                shown: Vec::new(),
            }
        }
    }

    impl Prompt for Scripted {
        fn message(&mut self, text: &str) -> Result<()> {
            self.shown.push(text.to_string());
            Ok(())
        }

        fn select(&mut self, _question: &str, default: usize) -> Result<usize> {
            Ok(self.selections.pop_front().unwrap_or(default))
        }

        fn confirm(&mut self, _question: &str, default: bool) -> Result<bool> {
            Ok(self.confirmations.pop_front().unwrap_or(default))
        }
    }
}
