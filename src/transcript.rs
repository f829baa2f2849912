//! Terminal rendering of the chat transcript.

use chrono::Local;
use crossterm::style::Stylize;

use crate::conversation::{Role, Turn};

fn label(role: Role) -> &'static str {
    match role {
        Role::User => "👤 You:",
        Role::Assistant => "🌾 AgroGPT:",
        Role::System => "⚙ System:",
    }
}

/// One turn as a labelled block. `color` adds ANSI styling.
pub fn render_turn(turn: &Turn, color: bool) -> String {
    let time = turn.timestamp.with_timezone(&Local).format("%H:%M");
    let header = format!("{} [{}]", label(turn.role), time);

    if !color {
        return format!("{}\n{}\n", header, turn.content);
    }

    match turn.role {
        Role::User => format!("{}\n{}\n", header.blue().bold(), turn.content.as_str().blue()),
        Role::Assistant => format!("{}\n{}\n", header.green().bold(), turn.content.as_str().green()),
        Role::System => format!("{}\n{}\n", header.dark_grey(), turn.content.as_str().dark_grey()),
    }
}

/// Every turn in order, separated by blank lines.
pub fn render_transcript(turns: &[Turn], color: bool) -> String {
    if turns.is_empty() {
        return "No messages yet.\n".to_string();
    }
    turns
        .iter()
        .map(|t| render_turn(t, color))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_count(count: usize) -> String {
    format!("📊 Total messages: {}", count)
}
