//! Operand grammar for commands such as
//! `encrypt FILE with ID to OUT` or `get ID from SERVER`.
//!
//! The trailing words of a command are parsed once into [`Operands`];
//! nothing consumes them positionally afterwards.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::Payload;

/// Structured operands of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operands {
    /// First bare word: a file, identifier or the start of a message.
    pub target: Option<String>,
    /// Value after `with`: the key to act with.
    pub keyspec: Option<String>,
    /// Value after `to`: an output file, or a keyserver for `send`.
    pub output: Option<String>,
    /// Value after `from`: a keyserver.
    pub source: Option<String>,
    /// Remaining bare words, joined by single spaces.
    pub message: Option<String>,
}

#[derive(Clone, Copy)]
enum Keyword {
    With,
    To,
    From,
}

impl Keyword {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "with" => Some(Keyword::With),
            "to" => Some(Keyword::To),
            "from" => Some(Keyword::From),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Keyword::With => "with",
            Keyword::To => "to",
            Keyword::From => "from",
        }
    }
}

impl Operands {
    /// Parses operand words.
    ///
    /// `with`, `to` and `from` each take the following word as their value
    /// and may appear once. The first other word is the target; any later
    /// ones form the message.
    pub fn parse<S: AsRef<str>>(words: &[S]) -> Result<Self> {
        let mut operands = Operands::default();
        let mut message: Vec<&str> = Vec::new();
        let mut words = words.iter().map(|w| AsRef::<str>::as_ref(w));

        while let Some(word) = words.next() {
            let Some(keyword) = Keyword::parse(word) else {
                if operands.target.is_none() && message.is_empty() {
                    operands.target = Some(word.to_string());
                } else {
                    message.push(word);
                }
                continue;
            };

            let value = words.next().ok_or_else(|| {
                Error::InvalidOperands(format!("'{}' needs a value", keyword.as_str()))
            })?;
            let slot = match keyword {
                Keyword::With => &mut operands.keyspec,
                Keyword::To => &mut operands.output,
                Keyword::From => &mut operands.source,
            };
            if slot.replace(value.to_string()).is_some() {
                return Err(Error::InvalidOperands(format!(
                    "'{}' given more than once",
                    keyword.as_str()
                )));
            }
        }

        if !message.is_empty() {
            operands.message = Some(message.join(" "));
        }
        Ok(operands)
    }

    /// Decides what the command operates on.
    ///
    /// A target naming an existing file (as judged by `is_file`) is read
    /// from that file; otherwise the target and message words together are
    /// the message.
    pub fn payload(&self, is_file: impl Fn(&Path) -> bool) -> Payload {
        match &self.target {
            Some(target) if is_file(Path::new(target)) => Payload::File(PathBuf::from(target)),
            Some(target) => {
                let mut text = target.clone();
                if let Some(message) = &self.message {
                    text.push(' ');
                    text.push_str(message);
                }
                Payload::Message(text)
            }
            None => Payload::Message(self.message.clone().unwrap_or_default()),
        }
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref().map(Path::new)
    }
}
