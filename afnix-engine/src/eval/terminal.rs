//! Prompted line input for the interactive loop.
//!
//! The engine only needs one operation from a terminal; the CLI supplies a
//! line-editing implementation, and the plain stdin fallback keeps the
//! interactive loop usable without one.

use std::io::{BufRead, Write};

use crate::error::Result;

pub trait Terminal: Send {
    /// Reads one line, returning `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

pub struct StdinTerminal;

impl StdinTerminal {
    pub fn new() -> StdinTerminal {
        StdinTerminal
    }
}

impl Default for StdinTerminal {
    fn default() -> Self {
        StdinTerminal::new()
    }
}

impl Terminal for StdinTerminal {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        let mut stdout = std::io::stdout();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;
        let mut line = String::new();
        let count = std::io::stdin().lock().read_line(&mut line)?;
        if count == 0 {
            Ok(None)
        } else {
            Ok(Some(line))
        }
    }
}
