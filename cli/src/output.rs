use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use saver_core::{
    ConversationId, ConversationThread, ConvertedConversation, HistoryEntry, ResponseRecord,
    SaverError, ThreadMessage,
};
use std::time::Duration;

use crate::commands::HELP;

const RULE_WIDTH: usize = 60;

pub fn rule(ch: char) -> String {
    ch.to_string().repeat(RULE_WIDTH)
}

/// Spinner shown while a request is in flight
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Header printed before a one-shot send
pub fn print_send_header(prior: Option<&str>, model: &str, message: &str) {
    println!(
        "{} {}",
        "Continuing from:".cyan(),
        prior.unwrap_or("(new conversation)")
    );
    println!("{} {}", "Model:".cyan(), model);
    println!("{} {}", "User:".green().bold(), message);
    println!("{}", rule('-').dimmed());
}

pub fn print_send_result(record: &ResponseRecord) {
    println!();
    println!("{} {}", "Response ID:".cyan(), record.response_id);
    println!("{} {}", "Model:".cyan(), record.model);
    println!("{}", rule('-').dimmed());
    println!();
    println!("{}\n{}", "Assistant:".blue().bold(), record.assistant_text);
    println!();
    println!("{}", rule('=').dimmed());
    println!(
        "{} {}",
        "New response ID (for continuing):".yellow().bold(),
        record.response_id.to_string().bold()
    );
}

pub fn print_assistant(text: &str) {
    println!("{}: {}", "Assistant".blue().bold(), text);
}

pub fn print_chat_banner(prior: Option<&str>, model: &str, effort: Option<&str>) {
    println!("{}", rule('='));
    match prior {
        Some(id) => println!("Continuing conversation from: {}", id.cyan()),
        None => println!("Starting a new conversation"),
    }
    println!("Model: {}", model);
    if let Some(effort) = effort {
        println!("Reasoning effort: {}", effort);
    }
    println!("{}", rule('='));
    print_chat_help();
    println!("{}", rule('-'));
}

pub fn print_chat_help() {
    println!("{}", "Commands:".yellow().bold());
    for (command, description) in HELP {
        println!("  {:<15}- {}", command, description);
    }
}

/// Error line plus a hint for the error kinds a user can act on
pub fn print_error(err: &SaverError) {
    eprintln!("{} {}", "Error:".red().bold(), err);
    if let Some(hint) = hint_for(err) {
        eprintln!("{}", hint.yellow());
    }
}

/// Message and hint for a failure that ends the command
pub fn describe_failure(err: &anyhow::Error) -> (String, Option<&'static str>) {
    let hint = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<SaverError>())
        .and_then(hint_for);
    (format!("{:#}", err), hint)
}

/// Prints a failure once, with a hint when the cause is one the user can act on
pub fn print_failure(err: &anyhow::Error) {
    let (message, hint) = describe_failure(err);
    eprintln!("{} {}", "Error:".red().bold(), message);
    if let Some(hint) = hint {
        eprintln!("{}", hint.yellow());
    }
}

pub fn hint_for(err: &SaverError) -> Option<&'static str> {
    match err {
        SaverError::Auth(_) => Some("Run: export OPENAI_API_KEY='your-key-here'"),
        SaverError::Attachment(_) => Some("Check the image path or URL and try again."),
        SaverError::Provider {
            status: Some(400) | Some(404),
            ..
        } => Some("The response ID may have expired; start a new conversation with `new`."),
        err if err.is_transient() => Some("Temporary failure; try again."),
        _ => None,
    }
}

pub fn print_models(models: &[String]) {
    if models.is_empty() {
        println!("{}", "No chat models available for this API key.".yellow());
        return;
    }
    for model in models {
        println!("  {}", model);
    }
}

/// One-line summary of a history entry
pub fn history_line(entry: &HistoryEntry) -> String {
    let preview: String = entry.message.chars().take(50).collect();
    let ellipsis = if entry.message.chars().count() > 50 { "…" } else { "" };
    format!(
        "{}  {}  {}  {}{}",
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.response_id,
        entry.model,
        preview.replace('\n', " "),
        ellipsis
    )
}

pub fn print_history_entry(entry: &HistoryEntry) {
    println!("{} {}", "Response ID:".cyan(), entry.response_id);
    if let Some(prev) = &entry.previous_response_id {
        println!("{} {}", "Continues:".cyan(), prev);
    }
    println!("{} {}", "Model:".cyan(), entry.model);
    println!("{} {}", "When:".cyan(), entry.timestamp.to_rfc3339());
    println!("{}", rule('-').dimmed());
    println!("{}: {}", "You".green().bold(), entry.message);
    print_assistant(&entry.assistant_text);
}

pub fn print_thread(thread: &ConversationThread) {
    println!("{} {}", "Response ID:".cyan(), thread.response_id);
    println!("{} {}", "Model:".cyan(), thread.model);
    if let Some(created) = thread.created_at {
        println!("{} {}", "Created:".cyan(), created.to_rfc3339());
    }
    println!("{}", rule('-').dimmed());
    print_messages(&thread.messages);
    if !thread.output.is_empty() {
        print_assistant(&thread.output);
    }
}

fn print_messages(messages: &[ThreadMessage]) {
    for message in messages {
        let role = match message.role.as_str() {
            "user" => "You".green().bold(),
            "assistant" => "Assistant".blue().bold(),
            other => other.normal().bold(),
        };
        println!("{}: {}", role, message.content);
        println!();
    }
}

pub fn print_conversion(converted: &ConvertedConversation) {
    println!("{} {}", "Conversation ID:".cyan(), converted.conversation_id.to_string().bold());
    if let Some(name) = &converted.name {
        println!("{} {}", "Name:".cyan(), name);
    }
    if let Some(from) = &converted.from_response_id {
        println!(
            "{} {} ({} item(s) copied)",
            "Seeded from:".cyan(),
            from,
            converted.items_added
        );
    }
}

pub fn print_conversation_reply(conversation: &ConversationId, record: &ResponseRecord) {
    println!("{} {}", "Conversation:".cyan(), conversation);
    println!("{} {}", "Response ID:".cyan(), record.response_id);
    println!("{}", rule('-').dimmed());
    print_assistant(&record.assistant_text);
}

pub fn print_conversation(conversation: &ConversationId, messages: &[ThreadMessage]) {
    println!("{} {}", "Conversation:".cyan(), conversation);
    println!("{}", rule('-').dimmed());
    if messages.is_empty() {
        println!("{}", "No messages yet.".yellow());
    }
    print_messages(messages);
}
