//! AgroGPT: a terminal agricultural assistant that keeps a short conversation
//! history and forwards it to a hosted chat-completion endpoint.

pub mod commands;
pub mod config;
pub mod conversation;
pub mod llm;
pub mod prompts;
pub mod session;
pub mod slash;
pub mod transcript;

pub use config::{Config, Credential, CredentialSource};
pub use conversation::{Conversation, DEFAULT_CONTEXT_TURNS, Role, Turn};
pub use llm::{
    ChatMessage, CompletionClient, CompletionFailure, CompletionRequest, HttpReply,
    ReqwestTransport, Transport, TransportError,
};
pub use session::{ChatSession, SessionError, SessionId, SessionManager, SubmissionState};
