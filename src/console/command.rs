//! Console command parsing

use super::ConsoleError;

/// Command names offered at the first word
pub const COMMANDS: [&str; 6] = ["event", "help", "state", "value", "test", "quit"];

pub const HELP_TEXT: &str = "\
state [name]: list or change states
value [name] [value]: list values or change value
event [name]: list events or send event
test [name] [args]: run automated test
quit: quit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Blank line
    Nothing,
    Help,
    ListStates,
    SetState(String),
    ListValues,
    SetValue { name: String, value: String },
    ListEvents,
    SendEvent(String),
    ListTests,
    RunTest { name: String, args: Vec<String> },
    Quit,
}

impl ConsoleCommand {
    /// Parse a console line; words are separated by whitespace
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            return Ok(ConsoleCommand::Nothing);
        };
        let args: Vec<&str> = words.collect();

        let command = match (cmd, args.as_slice()) {
            ("help", _) => ConsoleCommand::Help,
            ("q" | "quit", _) => ConsoleCommand::Quit,

            ("state", []) => ConsoleCommand::ListStates,
            ("state", [name, ..]) => ConsoleCommand::SetState(name.to_string()),

            ("value", []) => ConsoleCommand::ListValues,
            ("value", [name, value]) => ConsoleCommand::SetValue {
                name: name.to_string(),
                value: value.to_string(),
            },
            ("value", _) => return Err(ConsoleError::Usage("value [name] [value]")),

            ("event", []) => ConsoleCommand::ListEvents,
            ("event", [name]) => ConsoleCommand::SendEvent(name.to_string()),
            ("event", _) => return Err(ConsoleError::Usage("event [name]")),

            ("test", []) => ConsoleCommand::ListTests,
            ("test", [name, rest @ ..]) => ConsoleCommand::RunTest {
                name: name.to_string(),
                args: rest.iter().map(|s| s.to_string()).collect(),
            },

            (other, _) => return Err(ConsoleError::UnknownCommand(other.to_string())),
        };

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_commands() {
        assert_eq!(ConsoleCommand::parse("").unwrap(), ConsoleCommand::Nothing);
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), ConsoleCommand::Nothing);
        assert_eq!(ConsoleCommand::parse("help").unwrap(), ConsoleCommand::Help);
        assert_eq!(ConsoleCommand::parse("state").unwrap(), ConsoleCommand::ListStates);
        assert_eq!(ConsoleCommand::parse("value").unwrap(), ConsoleCommand::ListValues);
        assert_eq!(ConsoleCommand::parse("event").unwrap(), ConsoleCommand::ListEvents);
        assert_eq!(ConsoleCommand::parse("test").unwrap(), ConsoleCommand::ListTests);
        assert_eq!(ConsoleCommand::parse("q").unwrap(), ConsoleCommand::Quit);
        assert_eq!(ConsoleCommand::parse("quit").unwrap(), ConsoleCommand::Quit);
    }

    #[test]
    fn test_parse_with_arguments() {
        assert_eq!(
            ConsoleCommand::parse("state  ARM").unwrap(),
            ConsoleCommand::SetState("ARM".into())
        );
        assert_eq!(
            ConsoleCommand::parse("value rotations 12").unwrap(),
            ConsoleCommand::SetValue {
                name: "rotations".into(),
                value: "12".into()
            }
        );
        assert_eq!(
            ConsoleCommand::parse("event moveArm").unwrap(),
            ConsoleCommand::SendEvent("moveArm".into())
        );
        assert_eq!(
            ConsoleCommand::parse("test lift 3 fast").unwrap(),
            ConsoleCommand::RunTest {
                name: "lift".into(),
                args: vec!["3".into(), "fast".into()]
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ConsoleCommand::parse("value rotations"),
            Err(ConsoleError::Usage(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("event a b"),
            Err(ConsoleError::Usage(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("jump"),
            Err(ConsoleError::UnknownCommand(cmd)) if cmd == "jump"
        ));
    }
}
