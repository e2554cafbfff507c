//! Line commands for driving a tracker from a terminal.
//!
//! Every line counts as activity; an empty line is activity and nothing else.

use std::path::PathBuf;

use thiserror::Error;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Empty line: the user is still here.
    Activity,
    Status,
    NewSession,
    Comment(String),
    ResetCurrent,
    /// `confirmed` is false unless `--yes` was given.
    ResetAll { confirmed: bool },
    ClearBreaks,
    Report,
    SaveAs(PathBuf),
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{command}' needs an argument: {usage}")]
    MissingArgument {
        command: &'static str,
        usage: &'static str,
    },
}

pub const HELP: &str = "\
commands:
  <empty line>      mark activity
  status            show tracked time
  new               end the current session and start a new one
  comment <text>    set the current session's comment
  reset             restart the current session's clock
  reset-all --yes   discard every session and break
  clear-breaks      empty the break history
  report            print a Markdown report
  save-as <path>    copy the document to <path> and track it there
  quit              end the session, save and exit";

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head {
            "" => Ok(Self::Activity),
            "status" | "s" => Ok(Self::Status),
            "new" => Ok(Self::NewSession),
            "comment" => Ok(Self::Comment(rest.to_string())),
            "reset" => Ok(Self::ResetCurrent),
            "reset-all" => Ok(Self::ResetAll {
                confirmed: rest == "--yes",
            }),
            "clear-breaks" => Ok(Self::ClearBreaks),
            "report" => Ok(Self::Report),
            "save-as" if rest.is_empty() => Err(ConsoleError::MissingArgument {
                command: "save-as",
                usage: "save-as <path>",
            }),
            "save-as" => Ok(Self::SaveAs(PathBuf::from(rest))),
            "help" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => Err(ConsoleError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_line_is_activity() {
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), ConsoleCommand::Activity);
    }

    #[test]
    fn test_comment_keeps_inner_spaces() {
        assert_eq!(
            ConsoleCommand::parse("comment  rig the  arm ").unwrap(),
            ConsoleCommand::Comment("rig the  arm".to_string())
        );
        assert_eq!(
            ConsoleCommand::parse("comment").unwrap(),
            ConsoleCommand::Comment(String::new())
        );
    }

    #[test]
    fn test_reset_all_requires_confirmation_flag() {
        assert_eq!(
            ConsoleCommand::parse("reset-all").unwrap(),
            ConsoleCommand::ResetAll { confirmed: false }
        );
        assert_eq!(
            ConsoleCommand::parse("reset-all --yes").unwrap(),
            ConsoleCommand::ResetAll { confirmed: true }
        );
    }

    #[test]
    fn test_save_as_needs_path() {
        assert!(matches!(
            ConsoleCommand::parse("save-as"),
            Err(ConsoleError::MissingArgument { .. })
        ));
        assert_eq!(
            ConsoleCommand::parse("save-as /tmp/b.blend").unwrap(),
            ConsoleCommand::SaveAs(PathBuf::from("/tmp/b.blend"))
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            ConsoleCommand::parse("frobnicate now"),
            Err(ConsoleError::Unknown("frobnicate".to_string()))
        );
    }
}
