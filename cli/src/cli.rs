use clap::{Args, Parser, Subcommand, ValueEnum};
use saver_core::{ReasoningEffort, ResponseId};
use std::path::PathBuf;

/// Values accepted in place of a response id to start a new conversation
const NEW_CONVERSATION: &[&str] = &["new", "none", "-"];

/// Continue OpenAI conversations from a previous response ID
#[derive(Parser, Debug)]
#[command(name = "saver", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file (default: ~/.config/playground-saver/config.toml)
    #[arg(long, global = true, env = "SAVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// API key, overriding the config file
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message continuing from a response ID
    Send(SendArgs),

    /// Interactive chat continuing from a response ID
    Chat(ChatArgs),

    /// List chat-capable models available to the API key
    Models,

    /// Browse and export the local history log
    #[command(subcommand)]
    History(HistoryCommand),

    /// Work with server-side conversation containers
    #[command(subcommand)]
    Conversation(ConversationCommand),
}

/// Request settings shared by `send` and `chat`
#[derive(Args, Debug, Clone, Default)]
pub struct TurnArgs {
    /// Model to use; use the same model as the original conversation for best results
    #[arg(short, long)]
    pub model: Option<String>,

    /// Reasoning effort for reasoning models (low, medium, high)
    #[arg(short = 'r', long)]
    pub reasoning_effort: Option<ReasoningEffort>,

    /// System instructions to add or override
    #[arg(long)]
    pub instructions: Option<String>,

    /// Do not record this exchange in the history log
    #[arg(long, default_value_t = false)]
    pub no_history: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// The previous response ID (e.g. resp_0a6e586e...), or `new` to start fresh
    pub response_id: String,

    /// Your message to continue the conversation
    pub message: String,

    /// Path to a local image file (repeatable)
    #[arg(short = 'i', long = "image")]
    pub images: Vec<PathBuf>,

    /// URL of an image (repeatable)
    #[arg(short = 'u', long = "image-url")]
    pub image_urls: Vec<String>,

    #[command(flatten)]
    pub turn: TurnArgs,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// The response ID to continue from; omit to start a new conversation
    pub response_id: Option<String>,

    #[command(flatten)]
    pub turn: TurnArgs,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    #[command(flatten)]
    Local(LocalHistoryCommand),

    /// Fetch a conversation's messages from the provider
    Remote { response_id: String },
}

/// History subcommands served from the local log alone
#[derive(Subcommand, Debug)]
pub enum LocalHistoryCommand {
    /// List recorded exchanges, newest last
    List {
        /// Only show the last N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show one recorded exchange
    Show { response_id: String },

    /// Export the history log, or one conversation chain
    Export {
        /// Only export the conversation ending at this response ID
        response_id: Option<String>,

        #[arg(long, value_enum, default_value_t = ExportFormat::Text)]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConversationCommand {
    /// Create a conversation, optionally seeded with a response's history
    Create {
        /// Copy the messages leading up to this response ID
        #[arg(long = "from")]
        from_response_id: Option<String>,

        /// Name stored in the conversation metadata
        #[arg(long)]
        name: Option<String>,
    },

    /// Send a message inside a conversation
    Continue {
        /// Conversation ID (e.g. conv_68a1...)
        conversation_id: String,

        message: String,

        #[command(flatten)]
        turn: TurnArgs,
    },

    /// Show a conversation's messages, oldest first
    Items { conversation_id: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
}

/// Interprets a response-id argument, mapping the "new conversation" sentinels to `None`
pub fn parse_prior_id(raw: &str) -> Option<ResponseId> {
    let trimmed = raw.trim();
    if NEW_CONVERSATION
        .iter()
        .any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
    {
        return None;
    }
    ResponseId::parse(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_start_new_conversation() {
        assert!(parse_prior_id("new").is_none());
        assert!(parse_prior_id("NONE").is_none());
        assert!(parse_prior_id("-").is_none());
        assert!(parse_prior_id("").is_none());
        assert_eq!(parse_prior_id("resp_abc").unwrap().as_str(), "resp_abc");
    }

    #[test]
    fn test_send_args_parse() {
        let cli = Cli::try_parse_from([
            "saver", "send", "resp_1", "What's in this image?", "-i", "a.png", "--image", "b.jpg",
            "-u", "https://x/y.png", "-m", "o3", "-r", "high",
        ])
        .unwrap();

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.response_id, "resp_1");
                assert_eq!(args.images, vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
                assert_eq!(args.image_urls, vec!["https://x/y.png".to_string()]);
                assert_eq!(args.turn.model.as_deref(), Some("o3"));
                assert_eq!(args.turn.reasoning_effort, Some(ReasoningEffort::High));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bad_reasoning_effort_rejected() {
        assert!(Cli::try_parse_from(["saver", "send", "resp_1", "hi", "-r", "extreme"]).is_err());
    }

    #[test]
    fn test_chat_without_id() {
        let cli = Cli::try_parse_from(["saver", "chat", "--instructions", "Be brief"]).unwrap();
        match cli.command {
            Command::Chat(args) => {
                assert!(args.response_id.is_none());
                assert_eq!(args.turn.instructions.as_deref(), Some("Be brief"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_history_export_defaults() {
        let cli = Cli::try_parse_from(["saver", "history", "export"]).unwrap();
        match cli.command {
            Command::History(HistoryCommand::Local(LocalHistoryCommand::Export {
                response_id,
                format,
                output,
            })) => {
                assert!(response_id.is_none());
                assert_eq!(format, ExportFormat::Text);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_history_remote_and_local_share_namespace() {
        let cli = Cli::try_parse_from(["saver", "history", "remote", "resp_5"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::History(HistoryCommand::Remote { ref response_id }) if response_id == "resp_5"
        ));

        let cli = Cli::try_parse_from(["saver", "history", "list", "-n", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::History(HistoryCommand::Local(LocalHistoryCommand::List { limit: Some(3) }))
        ));
    }

    #[test]
    fn test_conversation_commands_parse() {
        let cli = Cli::try_parse_from([
            "saver", "conversation", "create", "--from", "resp_1", "--name", "Research",
        ])
        .unwrap();
        match cli.command {
            Command::Conversation(ConversationCommand::Create {
                from_response_id,
                name,
            }) => {
                assert_eq!(from_response_id.as_deref(), Some("resp_1"));
                assert_eq!(name.as_deref(), Some("Research"));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from([
            "saver", "conversation", "continue", "conv_1", "Go on", "-r", "low",
        ])
        .unwrap();
        match cli.command {
            Command::Conversation(ConversationCommand::Continue {
                conversation_id,
                message,
                turn,
            }) => {
                assert_eq!(conversation_id, "conv_1");
                assert_eq!(message, "Go on");
                assert_eq!(turn.reasoning_effort, Some(ReasoningEffort::Low));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
