#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    /// Switch to the chat with the given id, or a fresh one when absent.
    Chat(Option<String>),
    Retry,
    Cancel,
    Quit,
    Unknown(String),
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.split_whitespace();
    let command = parts.next().unwrap_or(trimmed).to_string();

    let parsed = match command.as_str() {
        "/help" => SlashCommand::Help,
        "/chat" => SlashCommand::Chat(parts.next().map(ToString::to_string)),
        "/retry" => SlashCommand::Retry,
        "/cancel" => SlashCommand::Cancel,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}
