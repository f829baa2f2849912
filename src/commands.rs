use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::config::{Config, CredentialSource};
use crate::llm::CompletionFailure;
use crate::prompts::{EXAMPLE_QUESTIONS, QUICK_QUESTIONS, TIPS, quick_question};
use crate::session::{SessionError, SessionId, SessionManager};
use crate::slash::{ParsedCommand, SlashCommand, help_lines, parse_slash_command};
use crate::transcript::{render_count, render_transcript, render_turn};

/// What the chat loop should do after handling a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub fn list_quick_questions(out: &mut impl Write) -> Result<()> {
    writeln!(out, "🚀 Quick Questions:")?;
    for (i, question) in QUICK_QUESTIONS.iter().enumerate() {
        writeln!(out, "  {}. {}", i + 1, question)?;
    }
    Ok(())
}

pub fn show_examples(out: &mut impl Write) -> Result<()> {
    writeln!(out, "💡 Example Questions:")?;
    for question in EXAMPLE_QUESTIONS {
        writeln!(out, "  • {}", question)?;
    }
    Ok(())
}

pub fn show_tips(out: &mut impl Write) -> Result<()> {
    writeln!(out, "📚 Agricultural Tips:")?;
    for (topic, advice) in TIPS {
        writeln!(out, "  • {}: {}", topic, advice)?;
    }
    Ok(())
}

/// Save `config` to `path`, or to `~/.agrogpt/config.toml` when none is given.
pub fn write_config(config: &Config, path: Option<&Path>, out: &mut impl Write) -> Result<()> {
    match path {
        Some(path) => {
            config.save_to(path)?;
            writeln!(out, "📝 Settings written to {}", path.display())?;
        }
        None => {
            config.save()?;
            writeln!(out, "📝 Settings written to {}", Config::default_path()?.display())?;
        }
    }
    Ok(())
}

/// Ask a single question in a fresh session and print the reply.
pub async fn ask_once(
    manager: &SessionManager,
    id: SessionId,
    question: &str,
    out: &mut impl Write,
) -> Result<()> {
    let reply = match manager.submit(id, question).await {
        Ok(reply) => reply,
        Err(SessionError::Completion(CompletionFailure::MissingCredential)) => {
            anyhow::bail!(
                "API token not provided: set {} or use the interactive chat",
                manager.config().token_env
            )
        }
        Err(e) => return Err(e.into()),
    };
    writeln!(out, "{}", reply)?;
    Ok(())
}

/// Interactive chat on one session until EOF or `/bye`.
pub async fn run_chat<R, W>(
    manager: &SessionManager,
    id: SessionId,
    input: R,
    out: &mut W,
    color: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "🌾 AgroGPT - Your AI-Powered Agricultural Assistant")?;
    writeln!(
        out,
        "Get expert advice on farming, crops, seasons, and agricultural practices."
    )?;
    writeln!(out, "Type /help for commands.")?;
    writeln!(out)?;
    print_token_status(manager, id, out).await?;

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        let flow = match parse_slash_command(&line) {
            Some(command) => handle_command(manager, id, &command, out, color).await?,
            None if line.trim().starts_with('/') => {
                writeln!(out, "Unknown command. Type /help for commands.")?;
                Flow::Continue
            }
            None => {
                ask(manager, id, &line, out, color).await?;
                Flow::Continue
            }
        };

        if flow == Flow::Exit {
            break;
        }
    }

    writeln!(out, "👋 Happy farming!")?;
    Ok(())
}

async fn print_token_status<W: Write>(
    manager: &SessionManager,
    id: SessionId,
    out: &mut W,
) -> Result<()> {
    let session = manager.get(id)?;
    let source = session
        .lock()
        .await
        .credential_with_source()
        .map(|(_, source)| source);

    match source {
        Some(CredentialSource::Environment) => {
            writeln!(out, "✅ API Token loaded from environment")?
        }
        Some(CredentialSource::Entered) => writeln!(out, "✅ API Token set for this session")?,
        None => writeln!(
            out,
            "🔑 No API token found. Enter one with /token <value> (get it from https://huggingface.co/settings/tokens)."
        )?,
    }
    Ok(())
}

async fn handle_command<W: Write>(
    manager: &SessionManager,
    id: SessionId,
    command: &ParsedCommand,
    out: &mut W,
    color: bool,
) -> Result<Flow> {
    debug!("Slash command: {}", command.command.as_ref());

    match command.command {
        SlashCommand::Quick => match (command.argument(), command.quick_number()) {
            (None, _) => list_quick_questions(out)?,
            (Some(arg), None) => writeln!(
                out,
                "'{}' is not a question number. Use /quick N with N between 1 and {}.",
                arg,
                QUICK_QUESTIONS.len()
            )?,
            (Some(_), Some(number)) => match quick_question(number) {
                Some(question) => {
                    writeln!(out, "{}", question)?;
                    ask(manager, id, question, out, color).await?;
                }
                None => writeln!(
                    out,
                    "There are {} quick questions; pick one between 1 and {}.",
                    QUICK_QUESTIONS.len(),
                    QUICK_QUESTIONS.len()
                )?,
            },
        },
        SlashCommand::Examples => show_examples(out)?,
        SlashCommand::Tips => show_tips(out)?,
        SlashCommand::Count => {
            let count = manager.message_count(id).await?;
            writeln!(out, "{}", render_count(count))?;
        }
        SlashCommand::History => {
            let session = manager.get(id)?;
            let session = session.lock().await;
            write!(out, "{}", render_transcript(session.conversation().turns(), color))?;
        }
        SlashCommand::Clear => match manager.clear(id).await {
            Ok(()) => writeln!(out, "🗑️ Chat history cleared.")?,
            Err(e) => writeln!(out, "Error: {}", e)?,
        },
        SlashCommand::Token => match command.argument() {
            Some(token) => {
                manager.set_entered_token(id, token).await?;
                print_token_status(manager, id, out).await?;
            }
            None => writeln!(out, "Usage: /token <value>")?,
        },
        SlashCommand::Help => {
            for line in help_lines() {
                writeln!(out, "  {}", line)?;
            }
        }
        SlashCommand::Bye => return Ok(Flow::Exit),
    }

    Ok(Flow::Continue)
}

/// Submit a question and print either the reply or an error notice.
async fn ask<W: Write>(
    manager: &SessionManager,
    id: SessionId,
    question: &str,
    out: &mut W,
    color: bool,
) -> Result<()> {
    if question.trim().is_empty() {
        return Ok(());
    }

    writeln!(out, "🤔 AgroGPT is thinking...")?;
    out.flush()?;

    match manager.submit(id, question).await {
        Ok(_) => {
            let session = manager.get(id)?;
            let session = session.lock().await;
            if let Some(turn) = session.conversation().last() {
                writeln!(out, "{}", render_turn(turn, color))?;
            }
        }
        Err(e) => writeln!(out, "{}", failure_notice(&e))?,
    }
    Ok(())
}

/// Message shown to the user for a failed submission.
fn failure_notice(err: &SessionError) -> String {
    match err {
        SessionError::Completion(CompletionFailure::MissingCredential) => {
            "Please provide your Hugging Face API token with /token <value>.".to_string()
        }
        other => format!("Error: {}", other),
    }
}
