//! ui::prompts
//!
//! Interactive prompts and confirmations.
//!
//! # Design
//!
//! Prompts are only shown in interactive mode. In non-interactive mode,
//! operations requiring user input must either have defaults or fail
//! with a clear error message.

use std::io::{self, BufRead, Write};

use thiserror::Error;

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt cancelled by user")]
    Cancelled,

    #[error("not in interactive mode")]
    NotInteractive,

    #[error("IO error: {0}")]
    IoError(String),
}

/// Prompt for confirmation (yes/no) on the terminal.
///
/// Returns `Ok(true)` if the user confirms, `Ok(false)` if they decline.
/// Returns `Err(PromptError::NotInteractive)` if not in interactive mode.
pub fn confirm(message: &str, default: bool, interactive: bool) -> Result<bool, PromptError> {
    if !interactive {
        return Err(PromptError::NotInteractive);
    }
    let stdin = io::stdin();
    let mut stderr = io::stderr();
    confirm_with(message, default, &mut stdin.lock(), &mut stderr)
}

/// Prompt for confirmation using the given reader and writer.
///
/// An empty answer picks `default`. End of input cancels.
pub fn confirm_with<R: BufRead, W: Write>(
    message: &str,
    default: bool,
    reader: &mut R,
    writer: &mut W,
) -> Result<bool, PromptError> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    loop {
        write!(writer, "{} {} ", message, hint).map_err(|e| PromptError::IoError(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| PromptError::IoError(e.to_string()))?;

        let mut answer = String::new();
        let read = reader
            .read_line(&mut answer)
            .map_err(|e| PromptError::IoError(e.to_string()))?;
        if read == 0 {
            return Err(PromptError::Cancelled);
        }

        match answer.trim().to_ascii_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => {
                writeln!(writer, "please answer yes or no")
                    .map_err(|e| PromptError::IoError(e.to_string()))?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answer(input: &str, default: bool) -> Result<bool, PromptError> {
        let mut out = Vec::new();
        confirm_with("Ready?", default, &mut Cursor::new(input), &mut out)
    }

    #[test]
    fn yes_and_no() {
        assert!(answer("yes\n", false).unwrap());
        assert!(!answer("N\n", true).unwrap());
    }

    #[test]
    fn empty_takes_default() {
        assert!(answer("\n", true).unwrap());
        assert!(!answer("\n", false).unwrap());
    }

    #[test]
    fn asks_again_on_garbage() {
        assert!(answer("maybe\ny\n", false).unwrap());
    }

    #[test]
    fn eof_cancels() {
        assert!(matches!(answer("", true), Err(PromptError::Cancelled)));
    }

    #[test]
    fn non_interactive() {
        assert!(matches!(
            confirm("Ready?", true, false),
            Err(PromptError::NotInteractive)
        ));
    }
}
