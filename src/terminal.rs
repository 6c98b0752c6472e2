// MacOS KVM Menu Implementation
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! Line-oriented prompt/render interface used by the menu.

use std::io::{self, BufRead, Write};

use crate::KvmResult;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Blocking text terminal
pub trait Terminal {
    /// Print one line of text
    fn write_line(&mut self, line: &str) -> KvmResult<()>;

    /// Show `prompt` and read one line, `None` at end of input
    fn prompt(&mut self, prompt: &str) -> KvmResult<Option<String>>;

    /// Clear the screen
    fn clear(&mut self) -> KvmResult<()>;
}

/// [`Terminal`] over any buffered reader and writer
pub struct LineTerminal<R, W> {
    input: R,
    output: W,
    clear_screen: bool,
}

impl<R: BufRead, W: Write> LineTerminal<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            clear_screen: true,
        }
    }

    pub fn with_clear_screen(mut self, enabled: bool) -> Self {
        self.clear_screen = enabled;
        self
    }

    /// Consume the terminal, returning the writer
    pub fn into_output(self) -> W {
        self.output
    }
}

impl LineTerminal<io::StdinLock<'static>, io::Stdout> {
    /// Terminal bound to the process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Terminal for LineTerminal<R, W> {
    fn write_line(&mut self, line: &str) -> KvmResult<()> {
        writeln!(self.output, "{}", line)?;
        Ok(())
    }

    fn prompt(&mut self, prompt: &str) -> KvmResult<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn clear(&mut self) -> KvmResult<()> {
        if self.clear_screen {
            write!(self.output, "{}", CLEAR_SCREEN)?;
            self.output.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn prompt_reads_lines_then_eof() {
        let mut term = LineTerminal::new(Cursor::new("hs\r\nsnap 1\n"), Vec::new());
        assert_eq!(term.prompt("? ").unwrap().as_deref(), Some("hs"));
        assert_eq!(term.prompt("Snapshot name? ").unwrap().as_deref(), Some("snap 1"));
        assert_eq!(term.prompt("? ").unwrap(), None);

        let out = String::from_utf8(term.into_output()).unwrap();
        assert_eq!(out, "? Snapshot name? ? ");
    }

    #[test]
    fn clear_can_be_disabled() {
        let mut term = LineTerminal::new(Cursor::new(""), Vec::new()).with_clear_screen(false);
        term.clear().unwrap();
        term.write_line("q) Quit").unwrap();
        assert_eq!(term.into_output(), b"q) Quit\n");

        let mut term = LineTerminal::new(Cursor::new(""), Vec::new());
        term.clear().unwrap();
        assert_eq!(term.into_output(), CLEAR_SCREEN.as_bytes());
    }
}
