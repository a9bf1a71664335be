use anyhow::{Context, Result};
use colored::*;
use log::{debug, warn};
use saver_core::{
    ConversationClient, ConversationId, HistoryEntry, HistoryLog, ImageRef, OpenAiClient,
    ResponseId, ResponseRecord, SaverConfig, SaverResult, SessionState, TurnOptions,
};
use std::fs;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::cli::{
    parse_prior_id, ChatArgs, ConversationCommand, ExportFormat, LocalHistoryCommand, SendArgs,
    TurnArgs,
};
use crate::commands::ChatCommand;
use crate::output::{self, spinner};

/// Everything a command needs: resolved config, a provider-backed client and
/// the history log when recording is enabled
pub struct App {
    config: SaverConfig,
    client: ConversationClient,
    history: Option<HistoryLog>,
}

impl App {
    /// Builds the OpenAI-backed client from configuration
    pub fn connect(config: SaverConfig) -> SaverResult<Self> {
        let api = OpenAiClient::new(&config)?;
        let history = open_history(&config);
        Ok(Self::with_client(config, ConversationClient::new(Arc::new(api)), history))
    }

    pub fn with_client(
        config: SaverConfig,
        client: ConversationClient,
        history: Option<HistoryLog>,
    ) -> Self {
        Self {
            config,
            client,
            history,
        }
    }

    fn turn_options(&self, args: &TurnArgs) -> TurnOptions {
        let mut options = TurnOptions::from_config(&self.config);
        if let Some(model) = &args.model {
            options.model = model.clone();
        }
        if args.reasoning_effort.is_some() {
            options.reasoning_effort = args.reasoning_effort;
        }
        if args.instructions.is_some() {
            options.instructions = args.instructions.clone();
        }
        options
    }

    /// Appends a completed turn to the history log; failures only warn
    fn record(&mut self, previous: Option<ResponseId>, message: &str, record: &ResponseRecord) {
        let Some(history) = self.history.as_mut() else {
            return;
        };
        history.append(HistoryEntry::from_record(record, previous, message));
        if let Err(e) = history.save() {
            warn!("Failed to save history to {}: {}", history.path().display(), e);
        }
    }

    /// One-shot send: continue from `args.response_id` with one message
    pub async fn run_send(&mut self, args: SendArgs) -> Result<()> {
        if args.turn.no_history {
            self.history = None;
        }
        let options = self.turn_options(&args.turn);
        let mut session = match parse_prior_id(&args.response_id) {
            Some(id) => SessionState::resume(id),
            None => SessionState::new(),
        };

        output::print_send_header(
            session.current_response_id().map(ResponseId::as_str),
            &options.model,
            &args.message,
        );
        for path in args.images {
            println!("  📎 Attached: {}", path.display());
            session.queue_attachment(ImageRef::Path(path));
        }
        for url in args.image_urls {
            println!("  🔗 Attached URL: {}", url);
            session.queue_attachment(ImageRef::Url(url));
        }

        let previous = session.current_response_id().cloned();
        let progress = spinner("Waiting for response...");
        let result = self.client.advance(&mut session, &args.message, &options).await;
        progress.finish_and_clear();

        match result {
            Ok(record) => {
                output::print_send_result(&record);
                self.record(previous, &args.message, &record);
                Ok(())
            }
            Err(e) => Err(e).context("Failed to continue the conversation"),
        }
    }

    /// Interactive chat on stdin
    pub async fn run_chat(&mut self, args: ChatArgs) -> Result<()> {
        if args.turn.no_history {
            self.history = None;
        }
        let options = self.turn_options(&args.turn);
        let mut session = match args.response_id.as_deref().and_then(parse_prior_id) {
            Some(id) => SessionState::resume(id),
            None => SessionState::new(),
        };

        output::print_chat_banner(
            session.current_response_id().map(ResponseId::as_str),
            &options.model,
            options.reasoning_effort.as_ref().map(|e| e.as_str()),
        );

        let stdin = io::stdin();
        self.chat_loop(&mut session, &options, stdin.lock()).await
    }

    /// Reads lines from `input` until EOF or a quit command
    pub async fn chat_loop<R: BufRead>(
        &mut self,
        session: &mut SessionState,
        options: &TurnOptions,
        mut input: R,
    ) -> Result<()> {
        loop {
            let (images, urls) = session.pending_counts();
            if images + urls > 0 {
                println!("  📎 Pending: {} image(s), {} URL(s)", images, urls);
            }

            print!("\n{}: ", "You".green().bold());
            io::stdout().flush().context("Failed to flush stdout")?;

            let mut line = String::new();
            if input.read_line(&mut line).context("Failed to read input")? == 0 {
                println!("\nGoodbye!");
                break;
            }

            let Some(command) = ChatCommand::parse(&line) else {
                continue;
            };

            match command {
                ChatCommand::Quit => {
                    println!(
                        "\nFinal response ID: {}",
                        session
                            .current_response_id()
                            .map(ResponseId::as_str)
                            .unwrap_or("(none)")
                    );
                    break;
                }
                ChatCommand::ShowId => println!(
                    "Current response ID: {}",
                    session
                        .current_response_id()
                        .map(ResponseId::as_str)
                        .unwrap_or("(none, next message starts a new conversation)")
                ),
                ChatCommand::ClearAttachments => {
                    session.clear_attachments();
                    println!("Attachments cleared.");
                }
                ChatCommand::AttachImage(path) => {
                    if path.exists() {
                        println!("  {} Queued: {}", "✓".green(), path.display());
                        session.queue_attachment(ImageRef::Path(path));
                    } else {
                        println!("  {} File not found: {}", "✗".red(), path.display());
                    }
                }
                ChatCommand::AttachUrl(url) => {
                    println!("  {} Queued URL: {}", "✓".green(), url);
                    session.queue_attachment(ImageRef::Url(url));
                }
                ChatCommand::NewConversation => {
                    session.reset();
                    println!("Starting a new conversation with the next message.");
                }
                ChatCommand::Help => output::print_chat_help(),
                ChatCommand::Invalid(reason) => println!("{}", reason.yellow()),
                ChatCommand::Message(message) => self.chat_turn(session, &message, options).await,
            }
        }

        Ok(())
    }

    async fn chat_turn(&mut self, session: &mut SessionState, message: &str, options: &TurnOptions) {
        let pending = session.pending_attachments().len();
        if pending > 0 {
            println!("  Sending with {} attachment(s)...", pending);
        }

        let previous = session.current_response_id().cloned();
        let progress = spinner("Thinking...");
        let result = self.client.advance(session, message, options).await;
        progress.finish_and_clear();

        match result {
            Ok(record) => {
                debug!("Conversation advanced to {}", record.response_id);
                output::print_assistant(&record.assistant_text);
                self.record(previous, message, &record);
            }
            Err(e) => {
                output::print_error(&e);
                println!("(Conversation state preserved, try again)");
            }
        }
    }

    pub async fn run_models(&self) -> Result<()> {
        let progress = spinner("Fetching models...");
        let result = self.client.list_models().await;
        progress.finish_and_clear();

        match result {
            Ok(models) => {
                output::print_models(&models);
                Ok(())
            }
            Err(e) => Err(e).context("Failed to list models"),
        }
    }

    pub async fn run_remote(&self, response_id: &str) -> Result<()> {
        let id = ResponseId::parse(response_id).context("Response ID is required")?;
        let progress = spinner("Fetching conversation...");
        let result = self.client.fetch_thread(&id).await;
        progress.finish_and_clear();

        match result {
            Ok(thread) => {
                output::print_thread(&thread);
                Ok(())
            }
            Err(e) => Err(e).context("Failed to fetch conversation history"),
        }
    }

    pub async fn run_conversation(&mut self, command: ConversationCommand) -> Result<()> {
        match command {
            ConversationCommand::Create {
                from_response_id,
                name,
            } => {
                let from = from_response_id.as_deref().and_then(ResponseId::parse);
                let progress = spinner("Creating conversation...");
                let result = self
                    .client
                    .convert_to_conversation(from.as_ref(), name.as_deref())
                    .await;
                progress.finish_and_clear();
                let converted = result.context("Failed to create conversation")?;
                output::print_conversion(&converted);
            }
            ConversationCommand::Continue {
                conversation_id,
                message,
                turn,
            } => {
                if turn.no_history {
                    self.history = None;
                }
                let id = ConversationId::parse(conversation_id)
                    .context("Conversation ID is required")?;
                let options = self.turn_options(&turn);
                let progress = spinner("Waiting for response...");
                let result = self.client.continue_conversation(&id, &message, &options).await;
                progress.finish_and_clear();
                let record = result.context("Failed to continue the conversation")?;
                output::print_conversation_reply(&id, &record);
                self.record(None, &message, &record);
            }
            ConversationCommand::Items { conversation_id } => {
                let id = ConversationId::parse(conversation_id)
                    .context("Conversation ID is required")?;
                let progress = spinner("Fetching conversation...");
                let result = self.client.conversation_messages(&id).await;
                progress.finish_and_clear();
                let messages = result.context("Failed to fetch conversation items")?;
                output::print_conversation(&id, &messages);
            }
        }
        Ok(())
    }
}

/// Opens the history log when recording is enabled
pub fn open_history(config: &SaverConfig) -> Option<HistoryLog> {
    if !config.save_history() {
        return None;
    }
    match config.history_path() {
        Ok(path) => Some(HistoryLog::load(&path)),
        Err(e) => {
            warn!("History disabled: {}", e);
            None
        }
    }
}

/// Local history subcommands; these never touch the network
pub fn run_history(config: &SaverConfig, command: &LocalHistoryCommand) -> Result<()> {
    let path = config.history_path()?;
    let log = HistoryLog::load(&path);

    match command {
        LocalHistoryCommand::List { limit } => {
            if log.is_empty() {
                println!("No history recorded yet ({}).", path.display());
                return Ok(());
            }
            let entries = log.entries();
            let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
            for entry in &entries[skip..] {
                println!("{}", output::history_line(entry));
            }
        }
        LocalHistoryCommand::Show { response_id } => {
            let entry = log
                .find(response_id.trim())
                .with_context(|| format!("No history entry for {}", response_id))?;
            output::print_history_entry(entry);
        }
        LocalHistoryCommand::Export {
            response_id,
            format,
            output: destination,
        } => {
            let rendered = export(&log, response_id.as_deref(), *format)?;
            match destination {
                Some(file) => {
                    fs::write(file, rendered)
                        .with_context(|| format!("Failed to write {}", file.display()))?;
                    println!("Exported history to {}", file.display());
                }
                None => print!("{}", rendered),
            }
        }
    }
    Ok(())
}

/// Renders the whole log, or the chain ending at `response_id`
pub fn export(log: &HistoryLog, response_id: Option<&str>, format: ExportFormat) -> Result<String> {
    let entries: Vec<&HistoryEntry> = match response_id {
        Some(id) => {
            let chain = log.chain(id.trim());
            anyhow::ensure!(!chain.is_empty(), "No history entry for {}", id);
            chain
        }
        None => log.entries().iter().collect(),
    };

    match format {
        ExportFormat::Text => Ok(saver_core::history::render_text(entries)),
        ExportFormat::Json => {
            serde_json::to_string_pretty(&entries).context("Failed to serialize history")
        }
    }
}
