use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, Credential, CredentialSource, resolve_credential};
use crate::conversation::{Conversation, Turn};
use crate::llm::{CompletionClient, CompletionFailure, CompletionRequest};
use crate::prompts::SYSTEM_PROMPT;

pub type SessionId = Uuid;

/// Errors surfaced to the user for a single submission. None of them end the
/// session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("A request is already in flight for this session")]
    Busy,

    #[error("Unknown session {0}")]
    UnknownSession(SessionId),

    #[error(transparent)]
    Completion(#[from] CompletionFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Sending,
}

/// Holds a session's in-flight flag and clears it on drop, including when the
/// submitting future is cancelled.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    /// Fails with `Busy` if the flag is already set.
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SessionError> {
        if flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(SessionError::Busy);
        }
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A registered session plus the flag that is set while it has a call in flight.
struct SessionSlot {
    session: Arc<Mutex<ChatSession>>,
    busy: AtomicBool,
}

/// Everything one user owns: transcript, credential and sampling settings.
pub struct ChatSession {
    id: SessionId,
    created_at: DateTime<Utc>,
    conversation: Conversation,
    env_credential: Option<Credential>,
    entered_credential: Option<Credential>,
    system_prompt: String,
    max_tokens: u32,
    temperature: f64,
    client: Arc<CompletionClient>,
}

impl ChatSession {
    pub fn new(client: Arc<CompletionClient>, env_credential: Option<Credential>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            conversation: Conversation::new(),
            env_credential,
            entered_credential: None,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_tokens: crate::llm::DEFAULT_MAX_TOKENS,
            temperature: crate::llm::DEFAULT_TEMPERATURE,
            client,
        }
    }

    /// Session with context length and sampling taken from `config`.
    pub fn from_config(
        config: &Config,
        client: Arc<CompletionClient>,
        env_credential: Option<Credential>,
    ) -> Self {
        let mut session = Self::new(client, env_credential);
        session.conversation = Conversation::with_context_limit(config.context_turns);
        session.max_tokens = config.max_tokens;
        session.temperature = config.temperature;
        session
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }

    /// Store a token typed in by the user. Blank input removes it.
    pub fn set_entered_token(&mut self, token: &str) {
        self.entered_credential = Credential::new(token);
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential_with_source().map(|(c, _)| c)
    }

    pub fn credential_with_source(&self) -> Option<(&Credential, CredentialSource)> {
        resolve_credential(self.env_credential.as_ref(), self.entered_credential.as_ref())
    }

    /// Discard the whole transcript.
    pub fn clear(&mut self) {
        self.conversation.clear();
        info!(session = %self.id, "Chat history cleared");
    }

    /// Ask one question and wait for the reply.
    ///
    /// The question is recorded before the call and kept if the call fails, so
    /// the user can retry. A reply is recorded only on success.
    pub async fn submit(&mut self, question: &str) -> Result<String, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }

        let credential = resolve_credential(
            self.env_credential.as_ref(),
            self.entered_credential.as_ref(),
        )
        .map(|(c, _)| c)
        .ok_or(CompletionFailure::MissingCredential)?;

        self.conversation.append(Turn::user(question));
        let request = CompletionRequest::new(self.conversation.context_window(&self.system_prompt))
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        debug!(
            session = %self.id,
            context = request.messages.len(),
            "Submitting question"
        );

        match self.client.complete(&request, Some(credential)).await {
            Ok(reply) => {
                self.conversation.append(Turn::assistant(reply.clone()));
                Ok(reply)
            }
            Err(failure) => {
                warn!(session = %self.id, "Completion failed: {}", failure);
                Err(failure.into())
            }
        }
    }
}

/// Registry of independent chat sessions sharing one completion client.
pub struct SessionManager {
    config: Config,
    client: Arc<CompletionClient>,
    sessions: HashMap<SessionId, SessionSlot>,
}

impl SessionManager {
    pub fn new(config: Config, client: CompletionClient) -> Self {
        Self {
            config,
            client: Arc::new(client),
            sessions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start a session whose environment token is read now, once.
    pub fn create_session(&mut self) -> SessionId {
        let env_credential = self.config.env_credential();
        self.create_session_with_token(env_credential)
    }

    /// Start a session with an explicit environment-level token.
    pub fn create_session_with_token(&mut self, env_credential: Option<Credential>) -> SessionId {
        let session = ChatSession::from_config(&self.config, self.client.clone(), env_credential);
        let id = session.id();
        self.sessions.insert(
            id,
            SessionSlot {
                session: Arc::new(Mutex::new(session)),
                busy: AtomicBool::new(false),
            },
        );
        info!(session = %id, "Session created");
        id
    }

    fn slot(&self, id: SessionId) -> Result<&SessionSlot, SessionError> {
        self.sessions
            .get(&id)
            .ok_or(SessionError::UnknownSession(id))
    }

    pub fn get(&self, id: SessionId) -> Result<Arc<Mutex<ChatSession>>, SessionError> {
        Ok(self.slot(id)?.session.clone())
    }

    /// `Sending` while a completion call for `id` is in flight.
    pub fn state(&self, id: SessionId) -> Result<SubmissionState, SessionError> {
        let state = if self.slot(id)?.busy.load(Ordering::Acquire) {
            SubmissionState::Sending
        } else {
            SubmissionState::Idle
        };
        Ok(state)
    }

    pub fn remove(&mut self, id: SessionId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            info!(session = %id, "Session closed");
        }
        removed
    }

    pub fn list_sessions(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    /// Submit a question to one session. Fails with `Busy` instead of waiting
    /// when that session already has a call in flight; short reads of the
    /// session only delay it.
    pub async fn submit(&self, id: SessionId, question: &str) -> Result<String, SessionError> {
        let slot = self.slot(id)?;
        let _busy = BusyGuard::acquire(&slot.busy)?;
        let mut session = slot.session.lock().await;
        session.submit(question).await
    }

    pub async fn set_entered_token(&self, id: SessionId, token: &str) -> Result<(), SessionError> {
        let slot = self.slot(id)?;
        let _busy = BusyGuard::acquire(&slot.busy)?;
        slot.session.lock().await.set_entered_token(token);
        Ok(())
    }

    pub async fn clear(&self, id: SessionId) -> Result<(), SessionError> {
        let slot = self.slot(id)?;
        let _busy = BusyGuard::acquire(&slot.busy)?;
        slot.session.lock().await.clear();
        Ok(())
    }

    pub async fn message_count(&self, id: SessionId) -> Result<usize, SessionError> {
        let handle = self.get(id)?;
        let session = handle.lock().await;
        Ok(session.message_count())
    }
}
