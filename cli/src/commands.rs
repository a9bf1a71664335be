use std::path::PathBuf;

/// A line typed at the interactive prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// `/image <path>`
    AttachImage(PathBuf),
    /// `/url <url>`
    AttachUrl(String),
    /// `/clear`
    ClearAttachments,
    /// `/id`
    ShowId,
    /// `/new`
    NewConversation,
    /// `/help`
    Help,
    /// `quit`, `exit` or `q`
    Quit,
    /// A command we don't recognise, or one missing its argument
    Invalid(String),
    /// Anything else is sent as a message
    Message(String),
}

impl ChatCommand {
    /// Parses a line of input; blank lines yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        let input = line.trim();
        if input.is_empty() {
            return None;
        }

        let lower = input.to_lowercase();
        if matches!(lower.as_str(), "quit" | "exit" | "q") {
            return Some(Self::Quit);
        }
        if !input.starts_with('/') {
            return Some(Self::Message(input.to_string()));
        }

        let (name, arg) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name.to_lowercase(), rest.trim()),
            None => (lower, ""),
        };

        let command = match (name.as_str(), arg) {
            ("/image", "") | ("/url", "") => Self::Invalid(format!("Usage: {} <value>", name)),
            ("/image", path) => Self::AttachImage(PathBuf::from(path)),
            ("/url", url) => Self::AttachUrl(url.to_string()),
            ("/clear", _) => Self::ClearAttachments,
            ("/id", _) => Self::ShowId,
            ("/new", _) | ("/reset", _) => Self::NewConversation,
            ("/help", _) | ("/?", _) => Self::Help,
            _ => Self::Invalid(format!("Unknown command: {}", name)),
        };
        Some(command)
    }
}

pub const HELP: &[(&str, &str)] = &[
    ("/image <path>", "Attach a local image"),
    ("/url <url>", "Attach an image URL"),
    ("/clear", "Clear pending attachments"),
    ("/id", "Show current response ID"),
    ("/new, /reset", "Start a new conversation"),
    ("/help, /?", "Show this help"),
    ("quit/exit/q", "End session"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lines_ignored() {
        assert_eq!(ChatCommand::parse(""), None);
        assert_eq!(ChatCommand::parse("   \t"), None);
    }

    #[test]
    fn test_quit_words() {
        for word in ["quit", "EXIT", " q "] {
            assert_eq!(ChatCommand::parse(word), Some(ChatCommand::Quit));
        }
    }

    #[test]
    fn test_attachments() {
        assert_eq!(
            ChatCommand::parse("/image  ~/Pictures/cat photo.png "),
            Some(ChatCommand::AttachImage(PathBuf::from("~/Pictures/cat photo.png")))
        );
        assert_eq!(
            ChatCommand::parse("/URL https://x/y.png"),
            Some(ChatCommand::AttachUrl("https://x/y.png".to_string()))
        );
        assert!(matches!(
            ChatCommand::parse("/image"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(ChatCommand::parse("/clear"), Some(ChatCommand::ClearAttachments));
        assert_eq!(ChatCommand::parse("/ID"), Some(ChatCommand::ShowId));
        assert_eq!(ChatCommand::parse("/new"), Some(ChatCommand::NewConversation));
        assert_eq!(ChatCommand::parse("/help"), Some(ChatCommand::Help));
        assert!(matches!(
            ChatCommand::parse("/frobnicate"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn test_help_lists_every_command() {
        let listed: Vec<&str> = HELP
            .iter()
            .flat_map(|(usage, _)| usage.split(", "))
            .filter_map(|usage| usage.split_whitespace().next())
            .collect();
        for command in ["/image", "/url", "/clear", "/id", "/new", "/reset", "/help", "/?"] {
            assert!(listed.contains(&command), "{} missing from help", command);
            assert!(!matches!(
                ChatCommand::parse(&format!("{} x", command)),
                Some(ChatCommand::Invalid(_))
            ));
        }
    }

    #[test]
    fn test_messages_pass_through() {
        assert_eq!(
            ChatCommand::parse("  What should I do next?  "),
            Some(ChatCommand::Message("What should I do next?".to_string()))
        );
        assert_eq!(
            ChatCommand::parse("quit smoking tips"),
            Some(ChatCommand::Message("quit smoking tips".to_string()))
        );
    }
}
