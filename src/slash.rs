use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Send one of the canned quick questions
    Quick,
    /// Show example questions
    Examples,
    /// Show agricultural tips
    Tips,
    /// Show how many messages are in the conversation
    Count,
    /// Print the whole transcript
    History,
    /// Clear the chat history
    Clear,
    /// Provide the API token for this session
    Token,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// 1-based question number given to `/quick`.
    pub fn quick_number(&self) -> Option<usize> {
        if self.command != SlashCommand::Quick {
            return None;
        }
        self.argument()?.trim().parse().ok()
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Quick => "list quick questions, or send one with /quick N",
            SlashCommand::Examples => "show example questions",
            SlashCommand::Tips => "show agricultural tips",
            SlashCommand::Count => "show the total number of messages",
            SlashCommand::History => "print the full chat transcript",
            SlashCommand::Clear => "clear the chat history",
            SlashCommand::Token => "set your Hugging Face API token for this session",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Help lines: `/command  description`.
pub fn help_lines() -> Vec<String> {
    SlashCommand::iter()
        .map(|c| format!("/{:<10} {}", c.command(), c.description()))
        .collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (head, argument) = match rest.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, Some(tail.trim().to_string())),
        None => (rest, None),
    };
    let argument = argument.filter(|a| !a.is_empty());

    let command = SlashCommand::from_str(head).ok().or_else(|| {
        match head.to_lowercase().as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            "h" | "?" => Some(SlashCommand::Help),
            "stats" => Some(SlashCommand::Count),
            "key" => Some(SlashCommand::Token),
            _ => None,
        }
    })?;

    Some(ParsedCommand { command, argument })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_slash_command("What about wheat?"), None);
        assert_eq!(parse_slash_command("/unknown"), None);
    }

    #[test]
    fn parses_command_and_argument() {
        let parsed = parse_slash_command("/quick 3").unwrap();
        assert_eq!(parsed.command, SlashCommand::Quick);
        assert_eq!(parsed.quick_number(), Some(3));

        let parsed = parse_slash_command("  /token   hf_abc  ").unwrap();
        assert_eq!(parsed.command, SlashCommand::Token);
        assert_eq!(parsed.argument(), Some("hf_abc"));

        let parsed = parse_slash_command("/clear").unwrap();
        assert_eq!(parsed.command, SlashCommand::Clear);
        assert_eq!(parsed.argument(), None);
    }

    #[test]
    fn aliases() {
        assert_eq!(parse_slash_command("/quit").unwrap().command, SlashCommand::Bye);
        assert_eq!(parse_slash_command("/stats").unwrap().command, SlashCommand::Count);
    }

    #[test]
    fn quick_number_needs_a_number() {
        assert_eq!(parse_slash_command("/quick").unwrap().quick_number(), None);
        assert_eq!(parse_slash_command("/quick two").unwrap().quick_number(), None);
        assert_eq!(parse_slash_command("/tips 2").unwrap().quick_number(), None);
    }

    #[test]
    fn help_lists_every_command() {
        let lines = help_lines();
        assert_eq!(lines.len(), SlashCommand::iter().count());
        assert!(lines.iter().any(|l| l.starts_with("/clear")));
    }
}
