//! Terminal rendering for the chat REPL: notes, the conversation list, and
//! token-by-token output.

use std::io::Write;

use chatbox_core::{Conversation, Role};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM")
                .map(|t| t != "dumb")
                .unwrap_or(false))
}

fn styled(style: &str, text: &str) -> String {
    if supports_color() {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

pub fn note_info(msg: &str) {
    println!("{} {msg}", styled(CYAN, "ℹ"));
}

pub fn note_warn(msg: &str) {
    println!("{} {msg}", styled(YELLOW, "⚠"));
}

pub fn note_error(msg: &str) {
    eprintln!("{} {msg}", styled(RED, "✗"));
}

pub fn note_success(msg: &str) {
    println!("{} {msg}", styled(GREEN, "✓"));
}

/// The REPL input marker.
pub fn prompt_marker() -> String {
    styled(BOLD, "you › ")
}

/// Marker printed before a streamed reply.
pub fn reply_marker() -> String {
    styled(DIM, "bot › ")
}

/// Print a whole transcript, e.g. after switching conversations.
pub fn print_transcript(conversation: &Conversation) {
    println!("{}", styled(BOLD, &format!("── {} ──", conversation.title)));
    for message in &conversation.messages {
        let marker = match message.role {
            Role::User => prompt_marker(),
            Role::Assistant => reply_marker(),
            Role::System => styled(DIM, "sys › "),
        };
        println!("{marker}{}", message.content);
    }
}

/// One line per conversation, active one marked, newest first.
pub fn render_conversation_list(
    conversations: &[Conversation],
    active: Option<uuid::Uuid>,
) -> String {
    let width = conversations
        .iter()
        .map(|c| c.title.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (index, conversation) in conversations.iter().enumerate() {
        let marker = if Some(conversation.id) == active { "*" } else { " " };
        let pad = width - conversation.title.chars().count();
        out.push_str(&format!(
            "{marker} {:>2}. {}{}  {} messages\n",
            index + 1,
            conversation.title,
            " ".repeat(pad),
            conversation.messages.len()
        ));
    }
    out
}

/// Write one chunk and flush so it shows up immediately.
pub fn stream_write(writer: &mut impl Write, chunk: &str) -> std::io::Result<()> {
    writer.write_all(chunk.as_bytes())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbox_core::Message;

    #[test]
    fn renders_conversation_list() {
        let mut first = Conversation::new("Trip");
        first.push(Message::user("hi"));
        let second = Conversation::new("Groceries");

        let out = render_conversation_list(&[first.clone(), second], Some(first.id));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "*  1. Trip       1 messages");
        assert_eq!(lines[1], "   2. Groceries  0 messages");
    }

    #[test]
    fn stream_write_passes_text_through() {
        let mut buf = Vec::new();
        stream_write(&mut buf, "Hel").unwrap();
        stream_write(&mut buf, "lo").unwrap();
        assert_eq!(buf, b"Hello");
    }
}
