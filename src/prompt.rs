//! Interactive prompts on the controlling terminal.

use crate::error::{BitbucketError, Result};
use std::io::{self, BufRead, Write};

/// Print `label` and read one trimmed line from stdin.
pub fn line(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{label}")?;
    stdout.flush()?;

    let mut input = String::new();
    let read = io::stdin().lock().read_line(&mut input)?;
    if read == 0 {
        return Err(BitbucketError::Prompt(format!(
            "no input for '{}'",
            label.trim().trim_end_matches(':')
        )));
    }
    Ok(input.trim().to_string())
}

/// Like [`line`], but fails when the answer is empty.
pub fn required_line(label: &str) -> Result<String> {
    let value = line(label)?;
    if value.is_empty() {
        return Err(BitbucketError::Prompt(format!(
            "'{}' is required",
            label.trim().trim_end_matches(':')
        )));
    }
    Ok(value)
}

/// Prompt for a secret without echoing it.
pub fn secret(label: &str) -> Result<String> {
    rpassword::prompt_password(label).map_err(|e| BitbucketError::Prompt(e.to_string()))
}

/// Wait for the operator to press enter.
///
/// Returns `false` when stdin is closed, so callers can stop instead of failing.
pub fn pause(label: &str) -> Result<bool> {
    let mut stdout = io::stdout();
    write!(stdout, "{label}")?;
    stdout.flush()?;
    wait_for_enter(io::stdin().lock())
}

fn wait_for_enter(mut input: impl BufRead) -> Result<bool> {
    let mut buf = String::new();
    Ok(input.read_line(&mut buf)? > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_enter_continues() {
        assert!(wait_for_enter(Cursor::new("\n")).unwrap());
    }

    #[test]
    fn test_closed_input_stops() {
        assert!(!wait_for_enter(Cursor::new("")).unwrap());
    }
}
