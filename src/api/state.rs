use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use handlebars::Handlebars;
use tokio::sync::{Mutex, OwnedMutexGuard, TryLockError};

use crate::ai::chat::ChatContext;
use crate::api::templates;
use crate::core::{AppConfig, ChatError};
use crate::openai::{CompletionBackend, Message};

/// Sessions that haven't been touched for this long are dropped the
/// next time a session is created.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24);

pub const MAX_SESSIONS: usize = 1000;

/// The settings and displayed conversation of a session as of the
/// last time its context was released.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionView {
    pub model: String,
    pub system_message: String,
    pub conversation: Vec<Message>,
}

impl SessionView {
    fn of(ctx: &ChatContext) -> Self {
        Self {
            model: ctx.chatbot().model().to_string(),
            system_message: ctx.chatbot().system_message().to_string(),
            conversation: ctx.conversation().to_vec(),
        }
    }
}

/// A chat context shared between requests for the same session.
///
/// The context lock is held for the whole duration of a chat turn so
/// anything that only reads the session goes through `view` instead,
/// which always holds the last consistent state.
#[derive(Clone)]
pub struct Session {
    context: Arc<Mutex<ChatContext>>,
    view: Arc<RwLock<SessionView>>,
}

impl Session {
    fn new(ctx: ChatContext) -> Self {
        let view = SessionView::of(&ctx);
        Self {
            context: Arc::new(Mutex::new(ctx)),
            view: Arc::new(RwLock::new(view)),
        }
    }

    /// Lock the context without waiting, failing if a turn or another
    /// change is in progress.
    pub fn try_lock(&self) -> Result<OwnedMutexGuard<ChatContext>, TryLockError> {
        Arc::clone(&self.context).try_lock_owned()
    }

    pub async fn lock(&self) -> OwnedMutexGuard<ChatContext> {
        Arc::clone(&self.context).lock_owned().await
    }

    /// Make the current state of `ctx` visible to readers. Call this
    /// before releasing the lock after every change.
    pub fn publish(&self, ctx: &ChatContext) {
        *self.view.write().expect("Unable to write session view") = SessionView::of(ctx);
    }

    pub fn view(&self) -> SessionView {
        self.view
            .read()
            .expect("Unable to read session view")
            .clone()
    }

    // Held by a request or a running turn
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.context) > 1
    }
}

struct SessionEntry {
    session: Session,
    last_used: Instant,
}

pub struct AppState {
    pub config: AppConfig,
    pub backend: Arc<dyn CompletionBackend>,
    pub templates: Handlebars<'static>,
    // Chat state for each browser session, keyed by session ID
    sessions: HashMap<String, SessionEntry>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl AppState {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: AppConfig) -> Self {
        Self {
            config,
            backend,
            templates: templates::templates(),
            sessions: HashMap::new(),
            idle_timeout: SESSION_IDLE_TIMEOUT,
            max_sessions: MAX_SESSIONS,
        }
    }

    pub fn with_session_limits(mut self, idle_timeout: Duration, max_sessions: usize) -> Self {
        self.idle_timeout = idle_timeout;
        self.max_sessions = max_sessions;
        self
    }

    /// Get an existing session without creating one.
    pub fn find_session(&mut self, session_id: &str) -> Option<Session> {
        let entry = self.sessions.get_mut(session_id)?;
        entry.last_used = Instant::now();
        Some(entry.session.clone())
    }

    /// Get the session, initializing it with the configured defaults on
    /// first use.
    pub fn session(&mut self, session_id: &str) -> Result<Session, ChatError> {
        if let Some(session) = self.find_session(session_id) {
            return Ok(session);
        }

        let ctx = ChatContext::new(
            Arc::clone(&self.backend),
            &self.config.model,
            &self.config.system_message,
        )?;
        self.evict_sessions();

        let session = Session::new(ctx);
        self.sessions.insert(
            session_id.to_string(),
            SessionEntry {
                session: session.clone(),
                last_used: Instant::now(),
            },
        );
        tracing::info!(
            "Created chat session {} ({} active)",
            session_id,
            self.session_count()
        );
        Ok(session)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // Drop idle sessions, then the least recently used ones if there
    // still isn't room for another. Sessions in use are never dropped.
    fn evict_sessions(&mut self) {
        let before = self.sessions.len();
        let now = Instant::now();
        let idle_timeout = self.idle_timeout;
        self.sessions.retain(|_, entry| {
            entry.session.in_use() || now.duration_since(entry.last_used) < idle_timeout
        });

        while self.sessions.len() >= self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .filter(|(_, entry)| !entry.session.in_use())
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());
            let Some(id) = oldest else {
                break;
            };
            self.sessions.remove(&id);
        }

        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::info!("Evicted {} chat sessions", evicted);
        }
    }
}
