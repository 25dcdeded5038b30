//! One logical dialogue with the model.
//!
//! Turns are strictly sequential: a turn is "in flight" from `send_turn` until
//! the caller reports its outcome with `record_reply` or `abandon_turn`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{stream, TryStreamExt};

use crate::ai::{ChatBackend, Content, FragmentStream, GenerateRequest};
use crate::error::SessionError;
use crate::request::TurnRequest;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub struct ConversationSession {
    id: u64,
    backend: Arc<dyn ChatBackend>,
    model: String,
    system_instruction: String,
    history: Vec<Content>,
    /// User content of the turn currently in flight.
    pending: Option<Content>,
}

impl ConversationSession {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        system_instruction: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let model = model.into();
        tracing::info!(session_id = id, model = %model, "conversation session started");
        Self {
            id,
            backend,
            model,
            system_instruction: system_instruction.into(),
            history: Vec::new(),
            pending: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Completed turns, oldest first.
    #[cfg(test)]
    pub(crate) fn history(&self) -> &[Content] {
        &self.history
    }

    #[cfg(test)]
    pub(crate) fn is_turn_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Send one user turn. The returned stream is lazy: nothing goes over the
    /// network until it is first polled.
    pub fn send_turn(&mut self, request: TurnRequest) -> Result<FragmentStream, SessionError> {
        if self.pending.is_some() {
            tracing::warn!(session_id = self.id, "turn rejected: previous turn still open");
            return Err(SessionError::TurnInFlight);
        }

        let user = Content::user(request.into_parts());
        let mut contents = self.history.clone();
        contents.push(user.clone());
        self.pending = Some(user);

        let generate = GenerateRequest {
            model: self.model.clone(),
            system_instruction: self.system_instruction.clone(),
            contents,
        };
        tracing::debug!(session_id = self.id, turn = self.history.len() / 2 + 1, "turn sent");

        let backend = Arc::clone(&self.backend);
        let opened = async move { backend.stream_generate(generate).await };
        Ok(Box::pin(stream::once(opened).try_flatten()))
    }

    /// The in-flight turn completed; keep it as context for follow-ups.
    /// An empty reply is not kept, since the backend rejects empty turns.
    pub fn record_reply(&mut self, reply: &str) {
        let Some(user) = self.pending.take() else {
            return;
        };
        if reply.is_empty() {
            tracing::debug!(session_id = self.id, "empty reply not added to history");
            return;
        }
        self.history.push(user);
        self.history.push(Content::model(reply));
    }

    /// The in-flight turn failed. Nothing from it enters the history.
    pub fn abandon_turn(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!(session_id = self.id, "turn abandoned");
        }
    }
}
