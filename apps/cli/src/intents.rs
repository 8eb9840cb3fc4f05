//! Parsing of typed user intents into controller calls.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Submit { handle: String },
    Download,
    Share,
    Reset,
    State,
    Help,
    Quit,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Submit { .. } => "submit",
            Intent::Download => "download",
            Intent::Share => "share",
            Intent::Reset => "reset",
            Intent::State => "state",
            Intent::Help => "help",
            Intent::Quit => "quit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIntent(pub String);

impl fmt::Display for UnknownIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command '{}'; type 'help' for a list", self.0)
    }
}

pub const HELP: &str = "\
commands:
  submit <handle>   generate a fortune card for a GitHub handle
  download          save the hosted card locally
  share             print the share link for the hosted card
  reset             start over
  state             show the current session
  quit              exit";

/// Blank lines yield `Ok(None)`. The handle is passed through untrimmed so the
/// controller owns validation.
pub fn parse_line(line: &str) -> Result<Option<Intent>, UnknownIntent> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest),
        None => (trimmed, ""),
    };

    let intent = match word.to_ascii_lowercase().as_str() {
        "submit" | "peek" => Intent::Submit {
            handle: rest.to_string(),
        },
        "download" => Intent::Download,
        "share" => Intent::Share,
        "reset" | "again" => Intent::Reset,
        "state" | "status" => Intent::State,
        "help" | "?" => Intent::Help,
        "quit" | "exit" => Intent::Quit,
        other => return Err(UnknownIntent(other.to_string())),
    };
    Ok(Some(intent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_submit_with_handle() {
        assert_eq!(
            parse_line("submit torvalds\n"),
            Ok(Some(Intent::Submit {
                handle: "torvalds".into()
            }))
        );
    }

    #[test]
    fn bare_submit_carries_empty_handle_for_validation() {
        assert_eq!(
            parse_line("submit"),
            Ok(Some(Intent::Submit {
                handle: String::new()
            }))
        );
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse_line("   \r\n"), Ok(None));
    }

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(parse_line("RESET"), Ok(Some(Intent::Reset)));
        assert_eq!(parse_line("Download"), Ok(Some(Intent::Download)));
    }

    #[test]
    fn unknown_commands_are_reported() {
        let err = parse_line("tweet now").expect_err("unknown");
        assert_eq!(err, UnknownIntent("tweet".into()));
        assert!(err.to_string().contains("help"));
    }
}
