//! Streaming session controller.
//!
//! A `ChatSession` drives one generation at a time against a provider. Each
//! submission spawns a task that opens the provider stream, accumulates
//! fragments, and reports exactly one terminal outcome. Callers observe
//! progress through the returned [`Generation`]:
//!
//! - incremental [`SessionUpdate`]s (state changes and text snapshots)
//! - a terminal [`StreamingOutcome`]
//! - a cancel control
//!
//! Cancellation is cooperative. It is observed at the next suspension
//! point (thinking delay, stream read, or pacing sleep), after which no
//! further fragments are emitted.

use crate::error::ChatError;
use crate::llm::ChatProvider;
use crate::messages::{ChatMessage, GenerationParameters, MessageRole};
use futures::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Text substituted when a generation completes without content.
pub const DEFAULT_EMPTY_PLACEHOLDER: &str = "No content was produced.";

/// Text shown in place of a reply when a failure left nothing to show.
pub const FAILURE_PLACEHOLDER: &str = "An error happened while generating the reply.";

/// Timing and presentation settings for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Minimum delay spent in `Thinking` before the stream is opened
    pub thinking_delay: Duration,
    /// Delay after each emitted fragment
    pub chunk_pacing: Duration,
    /// Text used when the provider produced nothing
    pub empty_placeholder: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            thinking_delay: Duration::ZERO,
            chunk_pacing: Duration::ZERO,
            empty_placeholder: DEFAULT_EMPTY_PLACEHOLDER.to_string(),
        }
    }
}

impl SessionConfig {
    /// Sets the thinking delay.
    #[must_use]
    pub fn with_thinking_delay(mut self, delay: Duration) -> Self {
        self.thinking_delay = delay;
        self
    }

    /// Sets the per-fragment pacing delay.
    #[must_use]
    pub fn with_chunk_pacing(mut self, pacing: Duration) -> Self {
        self.chunk_pacing = pacing;
        self
    }

    /// Sets the empty-reply placeholder.
    #[must_use]
    pub fn with_empty_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.empty_placeholder = placeholder.into();
        self
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No generation has run yet
    #[default]
    Idle,
    /// Request submitted, no content yet
    Thinking,
    /// At least one fragment has arrived
    Streaming,
    /// Stream ended normally
    Completed,
    /// Stream ended with an error
    Failed,
    /// Stream was stopped by the user
    Cancelled,
}

impl SessionState {
    /// Returns true for `Completed`, `Failed`, and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Incremental progress of a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The session moved to a new state
    State(SessionState),
    /// A fragment arrived
    Text {
        /// All text accumulated so far, including `delta`
        snapshot: String,
        /// The fragment that was just appended
        delta: String,
    },
}

/// Terminal result of a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamingOutcome {
    /// Full text (or the empty placeholder)
    Completed(String),
    /// The error and whatever text had accumulated
    Failed {
        /// What went wrong
        error: ChatError,
        /// Text received before the failure
        partial: String,
    },
    /// Text accumulated before the stop
    Cancelled(String),
}

impl StreamingOutcome {
    /// Returns the terminal state this outcome corresponds to.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match self {
            Self::Completed(_) => SessionState::Completed,
            Self::Failed { .. } => SessionState::Failed,
            Self::Cancelled(_) => SessionState::Cancelled,
        }
    }

    /// Returns the accumulated text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Completed(text) | Self::Cancelled(text) => text,
            Self::Failed { partial, .. } => partial,
        }
    }

    /// Returns the text a chat bubble should show for this outcome.
    #[must_use]
    pub fn display_text(&self) -> &str {
        match self {
            Self::Failed { partial, .. } if partial.is_empty() => FAILURE_PLACEHOLDER,
            other => other.text(),
        }
    }

    /// Returns the human-readable failure summary, if this is a failure.
    #[must_use]
    pub fn error_summary(&self) -> Option<String> {
        match self {
            Self::Failed { error, .. } => Some(error.to_string()),
            _ => None,
        }
    }
}

/// Handle to one in-flight generation.
///
/// Implements [`Stream`] over its updates. The stream ends once the
/// terminal state has been published.
pub struct Generation {
    updates: mpsc::UnboundedReceiver<SessionUpdate>,
    outcome: oneshot::Receiver<StreamingOutcome>,
    cancel: CancellationToken,
}

impl Generation {
    /// Requests cancellation. Observed at the next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a clone of the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the next update.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        self.updates.recv().await
    }

    /// Waits for the terminal outcome.
    pub async fn outcome(self) -> StreamingOutcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => StreamingOutcome::Failed {
                error: ChatError::transport("generation task ended without an outcome"),
                partial: String::new(),
            },
        }
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generation")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Stream for Generation {
    type Item = SessionUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.updates.poll_recv(cx)
    }
}

/// Bookkeeping for the generation currently owned by a session.
struct ActiveGeneration {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Controller that runs at most one generation at a time.
pub struct ChatSession {
    provider: Arc<dyn ChatProvider>,
    config: SessionConfig,
    state: Arc<watch::Sender<SessionState>>,
    active: Option<ActiveGeneration>,
}

impl ChatSession {
    /// Creates an idle session for the given provider.
    #[must_use]
    pub fn new(provider: Arc<dyn ChatProvider>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            provider,
            config,
            state: Arc::new(state),
            active: None,
        }
    }

    /// Returns the provider this session talks to.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Returns true while a generation task is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Starts a generation for the given conversation.
    ///
    /// The last user message is trimmed. Any generation already in flight is
    /// cancelled and awaited before the new one starts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if there is no user message or the last one
    /// is blank.
    pub async fn submit(
        &mut self,
        messages: Vec<ChatMessage>,
        params: GenerationParameters,
    ) -> Result<Generation, ChatError> {
        let messages = normalize_turn(messages)?;

        self.stop_and_wait().await;

        let cancel = CancellationToken::new();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let worker = Worker {
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
            cancel: cancel.clone(),
            state: Arc::clone(&self.state),
            updates: updates_tx,
        };

        tracing::info!(
            provider = worker.provider.name(),
            model = %params.model,
            messages = messages.len(),
            "Starting generation"
        );

        let handle = tokio::spawn(worker.run(messages, params, outcome_tx));
        self.active = Some(ActiveGeneration {
            cancel: cancel.clone(),
            handle,
        });

        Ok(Generation {
            updates: updates_rx,
            outcome: outcome_rx,
            cancel,
        })
    }

    /// Requests cancellation of the active generation, if any.
    pub fn stop(&self) {
        if let Some(active) = &self.active {
            if !active.cancel.is_cancelled() {
                tracing::info!("Stop streaming requested");
            }
            active.cancel.cancel();
        }
    }

    /// Cancels the active generation and waits for its task to finish.
    pub async fn stop_and_wait(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            if let Err(e) = active.handle.await {
                tracing::error!(error = %e, "Generation task failed");
            }
        }
    }
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

/// Trims the last user turn and rejects blank input.
fn normalize_turn(mut messages: Vec<ChatMessage>) -> Result<Vec<ChatMessage>, ChatError> {
    let last_user = messages
        .iter_mut()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .ok_or_else(|| ChatError::invalid_config("messages", "no user message to respond to"))?;

    let trimmed = last_user.content.trim();
    if trimmed.is_empty() {
        return Err(ChatError::invalid_config(
            "messages",
            "the last user message is empty",
        ));
    }
    if trimmed.len() != last_user.content.len() {
        *last_user = ChatMessage::user(trimmed);
    }
    Ok(messages)
}

/// The task side of a generation.
struct Worker {
    provider: Arc<dyn ChatProvider>,
    config: SessionConfig,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SessionState>>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
}

impl Worker {
    async fn run(
        self,
        messages: Vec<ChatMessage>,
        params: GenerationParameters,
        outcome_tx: oneshot::Sender<StreamingOutcome>,
    ) {
        self.transition(SessionState::Thinking);

        let mut buffer = String::new();
        let outcome = match self.drive(&messages, &params, &mut buffer).await {
            Ok(()) => {
                tracing::info!(
                    provider = self.provider.name(),
                    chars = buffer.chars().count(),
                    "Stream finished"
                );
                if buffer.is_empty() {
                    buffer.clone_from(&self.config.empty_placeholder);
                }
                StreamingOutcome::Completed(buffer)
            }
            Err(e) if e.is_cancelled() => StreamingOutcome::Cancelled(buffer),
            Err(e) => {
                tracing::error!(
                    provider = self.provider.name(),
                    error = %e,
                    partial_chars = buffer.chars().count(),
                    "Stream error"
                );
                StreamingOutcome::Failed {
                    error: e,
                    partial: buffer,
                }
            }
        };

        self.transition(outcome.state());
        // The receiver may already be gone if the caller dropped the handle.
        let _ = outcome_tx.send(outcome);
    }

    async fn drive(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParameters,
        buffer: &mut String,
    ) -> Result<(), ChatError> {
        self.pause(self.config.thinking_delay).await?;

        let mut stream = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(ChatError::cancelled()),
            opened = self.provider.stream(messages, params) => opened?,
        };

        let mut streaming = false;
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(ChatError::cancelled()),
                next = stream.next() => next,
            };

            let Some(fragment) = next else {
                return Ok(());
            };
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }

            if !streaming {
                streaming = true;
                self.transition(SessionState::Streaming);
            }

            buffer.push_str(&fragment);
            tracing::debug!(chars = fragment.len(), "Fragment received");
            let _ = self.updates.send(SessionUpdate::Text {
                snapshot: buffer.clone(),
                delta: fragment,
            });

            self.pause(self.config.chunk_pacing).await?;
        }
    }

    /// Sleeps unless cancelled first.
    async fn pause(&self, duration: Duration) -> Result<(), ChatError> {
        if self.cancel.is_cancelled() {
            return Err(ChatError::cancelled());
        }
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ChatError::cancelled()),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn transition(&self, state: SessionState) {
        tracing::info!(provider = self.provider.name(), state = %state, "Session state changed");
        self.state.send_replace(state);
        let _ = self.updates.send(SessionUpdate::State(state));
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Reached on a provider panic or an aborted task.
        if !self.state.borrow().is_terminal() {
            tracing::error!(
                provider = self.provider.name(),
                "Generation task ended without a terminal state"
            );
            self.transition(SessionState::Failed);
        }
    }
}
