//! Slash commands typed at the prompt.

use parley_protocol::events::ConversationType;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send {
        conversation_type: ConversationType,
        target_id: String,
        text: String,
    },
    Typing {
        conversation_type: ConversationType,
        target_id: String,
        is_typing: bool,
    },
    Delivered {
        message_id: String,
    },
    Status,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("commands start with '/', try /help")]
    NotACommand,

    #[error("unknown command: /{0}")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
/dm <user_id> <text>             send a direct message
/group <group_id> <text>         send a group message
/typing <dm|group> <id> <on|off> start or stop the typing indicator
/delivered <message_id>          acknowledge a message
/status                          show connection state
/help                            show this help
/quit                            disconnect and exit";

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Err(CommandError::NotACommand);
    };

    let (name, args) = split_word(rest);
    let command = match name {
        "dm" | "group" => {
            let usage = if name == "dm" {
                "/dm <user_id> <text>"
            } else {
                "/group <group_id> <text>"
            };
            let (target_id, text) = split_word(args);
            if target_id.is_empty() || text.is_empty() {
                return Err(CommandError::Usage(usage));
            }
            Command::Send {
                conversation_type: conversation_type(name).ok_or(CommandError::Usage(usage))?,
                target_id: target_id.to_string(),
                text: text.to_string(),
            }
        }
        "typing" => {
            const USAGE: &str = "/typing <dm|group> <id> <on|off>";
            let mut words = args.split_whitespace();
            let (Some(kind), Some(target_id), Some(flag), None) =
                (words.next(), words.next(), words.next(), words.next())
            else {
                return Err(CommandError::Usage(USAGE));
            };
            let is_typing = match flag {
                "on" => true,
                "off" => false,
                _ => return Err(CommandError::Usage(USAGE)),
            };
            Command::Typing {
                conversation_type: conversation_type(kind).ok_or(CommandError::Usage(USAGE))?,
                target_id: target_id.to_string(),
                is_typing,
            }
        }
        "delivered" => {
            let mut words = args.split_whitespace();
            let (Some(message_id), None) = (words.next(), words.next()) else {
                return Err(CommandError::Usage("/delivered <message_id>"));
            };
            Command::Delivered {
                message_id: message_id.to_string(),
            }
        }
        "status" => Command::Status,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn conversation_type(word: &str) -> Option<ConversationType> {
    match word.to_ascii_lowercase().as_str() {
        "dm" => Some(ConversationType::Dm),
        "group" => Some(ConversationType::Group),
        _ => None,
    }
}

/// Splits off the first whitespace-delimited word; the rest keeps its spacing.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse(""), Ok(None));
        assert_eq!(parse("   \t"), Ok(None));
    }

    #[test]
    fn dm_keeps_message_spacing() {
        assert_eq!(
            parse("/dm u-42   hello   there "),
            Ok(Some(Command::Send {
                conversation_type: ConversationType::Dm,
                target_id: "u-42".into(),
                text: "hello   there".into(),
            }))
        );
    }

    #[test]
    fn group_message() {
        assert_eq!(
            parse("/group g-1 hi all"),
            Ok(Some(Command::Send {
                conversation_type: ConversationType::Group,
                target_id: "g-1".into(),
                text: "hi all".into(),
            }))
        );
    }

    #[test]
    fn send_requires_text() {
        assert_eq!(parse("/dm u-42"), Err(CommandError::Usage("/dm <user_id> <text>")));
        assert_eq!(parse("/group"), Err(CommandError::Usage("/group <group_id> <text>")));
    }

    #[test]
    fn typing_on_and_off() {
        assert_eq!(
            parse("/typing GROUP g-1 on"),
            Ok(Some(Command::Typing {
                conversation_type: ConversationType::Group,
                target_id: "g-1".into(),
                is_typing: true,
            }))
        );
        assert_eq!(
            parse("/typing dm u-2 off"),
            Ok(Some(Command::Typing {
                conversation_type: ConversationType::Dm,
                target_id: "u-2".into(),
                is_typing: false,
            }))
        );
    }

    #[test]
    fn typing_rejects_bad_arguments() {
        for line in ["/typing dm u-2", "/typing dm u-2 maybe", "/typing chan x on", "/typing dm a on x"] {
            assert!(matches!(parse(line), Err(CommandError::Usage(_))), "{line}");
        }
    }

    #[test]
    fn delivered_takes_one_id() {
        assert_eq!(
            parse("/delivered m-1"),
            Ok(Some(Command::Delivered {
                message_id: "m-1".into()
            }))
        );
        assert!(parse("/delivered").is_err());
        assert!(parse("/delivered a b").is_err());
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse("/status"), Ok(Some(Command::Status)));
        assert_eq!(parse("/help"), Ok(Some(Command::Help)));
        assert_eq!(parse("/quit"), Ok(Some(Command::Quit)));
        assert_eq!(parse("/exit"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn help_lists_every_command_it_parses() {
        let listed: Vec<&str> = HELP
            .lines()
            .filter_map(|l| l.split_whitespace().next())
            .collect();
        for name in listed.iter().map(|c| c.trim_start_matches('/')) {
            assert!(!matches!(parse(&format!("/{name}")), Err(CommandError::Unknown(_))), "{name}");
        }
        for name in ["dm", "group", "typing", "delivered", "status", "help", "quit"] {
            assert!(listed.contains(&format!("/{name}").as_str()), "/{name} missing from help");
        }
    }

    #[test]
    fn unknown_and_plain_text() {
        assert_eq!(parse("/shout x"), Err(CommandError::Unknown("shout".into())));
        assert_eq!(parse("hello"), Err(CommandError::NotACommand));
    }
}
