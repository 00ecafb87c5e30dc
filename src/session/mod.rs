//! The conversation session loop.
//!
//! One cooperative loop per session drives a fixed cycle for every
//! submitted input: record the user turn, build a token-bounded history,
//! request a completion, translate the reply when a translator is
//! configured, synthesize speech. Stage failures are emitted as error
//! events and the cycle still runs end-to-end; the only short-circuit is
//! blank input, rejected at submission before any side effect.
//!
//! Cycles are strictly serialized: the loop parks on a continuation while
//! waiting for input, and a submission is accepted only while that
//! continuation is armed. Teardown cancels the loop's token, which discards
//! any outstanding continuation so late collaborator callbacks are dropped.

mod events;

pub use events::{ErrorEvent, ErrorKind, SessionEvent, SessionState};

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::{Resumer, continuation};
use crate::completion::{ChatCompletionClient, CompletionRequest, HistoryEntry, HistoryRolePolicy};
use crate::config::CompanionConfig;
use crate::error::{CompanionError, Result};
use crate::speech::{SpeechSynthesisService, SynthesisOutcome};
use crate::store::ConversationStore;
use crate::translate::TranslationClient;
use crate::window::{ContextWindowManager, TokenBudget};

/// Control input resumed into the parked loop.
enum SessionInput {
    /// The next user message (already validated non-blank).
    UserText(String),
    /// Switch the active channel between cycles.
    SwitchChannel {
        channel_id: String,
        system_prompt: Option<String>,
    },
}

/// State shared between the loop and its handles.
struct SessionShared {
    state: watch::Sender<SessionState>,
    input_slot: Mutex<Option<Resumer<SessionInput>>>,
    last_reply: Mutex<String>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionShared {
    fn emit_error(&self, error: &CompanionError) {
        let _ = self.events.send(SessionEvent::Error(ErrorEvent::from(error)));
    }
}

/// Cloneable front door to a running session.
///
/// UIs submit input, switch channels, and observe state and events through
/// this handle; the loop itself owns every mutable piece of the pipeline.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Submit the next user message.
    ///
    /// At most one submission may be in flight per session: input is
    /// accepted only while the loop is awaiting it. Blank input and
    /// submissions during a running cycle are rejected with a validation
    /// error and have no side effects.
    pub fn submit_input(&self, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return self.reject("input is empty");
        }
        self.resume_loop(SessionInput::UserText(trimmed.to_owned()))
    }

    /// Switch the active channel, optionally replacing the system prompt.
    ///
    /// Only valid between cycles, while the loop is awaiting input. Passing
    /// `None` restores the configured default prompt.
    pub fn switch_channel(&self, channel_id: &str, system_prompt: Option<String>) -> Result<()> {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return self.reject("channel id is empty");
        }
        self.resume_loop(SessionInput::SwitchChannel {
            channel_id: channel_id.to_owned(),
            system_prompt,
        })
    }

    /// Current pipeline state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Subscribe to pipeline state updates.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Subscribe to the session event stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// The most recent successful agent reply, empty before the first one.
    pub fn last_reply(&self) -> String {
        self.shared
            .last_reply
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Tear the session down: the loop stops without completing an
    /// in-flight cycle and late collaborator callbacks are discarded.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Get a clone of the cancellation token for external use.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn resume_loop(&self, input: SessionInput) -> Result<()> {
        let resumer = self
            .shared
            .input_slot
            .lock()
            .map_err(|_| CompanionError::Channel("input slot poisoned".to_owned()))?
            .take();
        match resumer {
            Some(resumer) => {
                if resumer.resume(input) {
                    Ok(())
                } else {
                    self.reject("session is not awaiting input")
                }
            }
            None => self.reject("session is not awaiting input"),
        }
    }

    fn reject(&self, reason: &str) -> Result<()> {
        let error = CompanionError::Validation(reason.to_owned());
        self.shared.emit_error(&error);
        Err(error)
    }
}

/// Drives one pipeline cycle per submitted input.
///
/// States: `Idle → AwaitingInput → RequestingCompletion → Translating →
/// Synthesizing → AwaitingInput`. Failure never produces a distinct state;
/// every stage absorbs its error and the machine advances.
pub struct SessionController {
    budget: TokenBudget,
    role_policy: HistoryRolePolicy,
    windows: ContextWindowManager,
    completion: Arc<dyn ChatCompletionClient>,
    translator: Option<Arc<dyn TranslationClient>>,
    speech: Arc<dyn SpeechSynthesisService>,
    default_channel: String,
    default_system_prompt: Option<String>,
    system_prompt: Option<String>,
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
}

impl SessionController {
    /// Create a controller over an explicit store and collaborators.
    pub fn new(
        config: &CompanionConfig,
        store: Arc<ConversationStore>,
        completion: Arc<dyn ChatCompletionClient>,
        speech: Arc<dyn SpeechSynthesisService>,
    ) -> Self {
        let (state_tx, _state_rx) = watch::channel(SessionState::Idle);
        let (events_tx, _events_rx) = broadcast::channel(config.session.event_capacity.max(1));
        let default_system_prompt = match config.session.system_prompt.trim() {
            "" => None,
            prompt => Some(prompt.to_owned()),
        };
        Self {
            budget: TokenBudget::from(&config.chat),
            role_policy: config.chat.history_roles,
            windows: ContextWindowManager::new(store, config.store.window_limit),
            completion,
            translator: None,
            speech,
            default_channel: config.session.default_channel.clone(),
            default_system_prompt: default_system_prompt.clone(),
            system_prompt: default_system_prompt,
            shared: Arc::new(SessionShared {
                state: state_tx,
                input_slot: Mutex::new(None),
                last_reply: Mutex::new(String::new()),
                events: events_tx,
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a translation client; absence means replies are spoken
    /// untranslated.
    pub fn with_translator(mut self, translator: Arc<dyn TranslationClient>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// A handle for submitting input and observing the session.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
            cancel: self.cancel.clone(),
        }
    }

    /// Run the loop until the cancellation token fires.
    ///
    /// Consumes the controller, so a second concurrent loop for the same
    /// session is unrepresentable.
    pub async fn run(mut self) -> Result<()> {
        let channel = self.default_channel.clone();
        self.windows.load_channel(&channel)?;
        info!(channel = %self.windows.channel_id(), "session loop started");

        loop {
            let input = match self.await_input().await {
                Some(input) => input,
                None => break,
            };
            match input {
                SessionInput::UserText(text) => self.run_cycle(&text).await,
                SessionInput::SwitchChannel {
                    channel_id,
                    system_prompt,
                } => self.switch_channel(&channel_id, system_prompt),
            }
        }

        info!("session loop stopped");
        Ok(())
    }

    /// Park until a handle resumes the loop. `None` means teardown.
    async fn await_input(&mut self) -> Option<SessionInput> {
        let (cont, resumer) = continuation();
        match self.shared.input_slot.lock() {
            Ok(mut slot) => *slot = Some(resumer),
            Err(_) => return None,
        }
        self.set_state(SessionState::AwaitingInput);

        tokio::select! {
            () = self.cancel.cancelled() => {
                // Disarm so late submissions are rejected, not queued.
                if let Ok(mut slot) = self.shared.input_slot.lock() {
                    slot.take();
                }
                None
            }
            input = cont.wait() => input,
        }
    }

    fn switch_channel(&mut self, channel_id: &str, system_prompt: Option<String>) {
        match self.windows.load_channel(channel_id) {
            Ok(()) => {
                self.system_prompt = system_prompt.or_else(|| self.default_system_prompt.clone());
                let _ = self.shared.events.send(SessionEvent::ChannelSwitched {
                    channel_id: channel_id.to_owned(),
                });
                info!(channel = channel_id, "switched channel");
            }
            Err(error) => {
                warn!(channel = channel_id, error = %error, "channel switch failed");
                self.shared.emit_error(&error);
            }
        }
    }

    /// One full pipeline cycle. Always runs end-to-end; intermediate
    /// failures degrade the payload instead of aborting.
    async fn run_cycle(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        debug!(channel = %self.windows.channel_id(), "cycle started");

        self.set_state(SessionState::RequestingCompletion);
        if let Err(error) = self.windows.record_user(text) {
            warn!(error = %error, "failed to persist user turn");
            self.shared.emit_error(&error);
        }

        let reply_text = self.request_completion(text).await;
        let spoken = self.translate_reply(&reply_text).await;

        if !reply_text.is_empty() {
            let _ = self.shared.events.send(SessionEvent::Reply {
                text: reply_text,
                spoken_text: spoken.clone(),
            });
        }

        if !spoken.is_empty() {
            self.synthesize(&spoken).await;
        }
    }

    /// Request one completion and record a successful reply. Returns the
    /// reply text, empty on failure — a failed completion is not retried.
    async fn request_completion(&mut self, user_text: &str) -> String {
        let history_budget = self.budget.history_budget();
        let history = self.windows.bounded_history(history_budget);
        debug!(
            budget = history_budget,
            messages = history.len(),
            "built bounded history"
        );

        let request = CompletionRequest {
            system_prompt: self.system_prompt.clone(),
            history: history
                .iter()
                .map(|m| HistoryEntry::from_message(m, self.role_policy))
                .collect(),
            user_message: user_text.to_owned(),
        };

        let result = tokio::select! {
            () = self.cancel.cancelled() => return String::new(),
            result = self.completion.complete(request) => result,
        };

        match result {
            Ok(reply) if !reply.text.trim().is_empty() => {
                let token_cost = reply.completion_tokens.unwrap_or(0);
                if let Err(error) = self.windows.record_agent(&reply.text, token_cost) {
                    warn!(error = %error, "failed to persist agent reply");
                    self.shared.emit_error(&error);
                }
                if let Ok(mut last) = self.shared.last_reply.lock() {
                    last.clone_from(&reply.text);
                }
                reply.text
            }
            Ok(_) => {
                debug!("completion returned empty text");
                String::new()
            }
            Err(error) => {
                warn!(error = %error, "completion failed");
                self.shared.emit_error(&error);
                String::new()
            }
        }
    }

    /// Translate the reply when a translator is configured. Failure or a
    /// blank result falls back to the untranslated text.
    async fn translate_reply(&self, reply_text: &str) -> String {
        if reply_text.is_empty() {
            return String::new();
        }
        let Some(translator) = &self.translator else {
            return reply_text.to_owned();
        };

        self.set_state(SessionState::Translating);
        let result = tokio::select! {
            () = self.cancel.cancelled() => return String::new(),
            result = translator.translate(reply_text) => result,
        };

        match result {
            Ok(translated) if !translated.trim().is_empty() => translated,
            Ok(_) => {
                debug!("translator returned blank text, speaking original");
                reply_text.to_owned()
            }
            Err(error) => {
                warn!(error = %error, "translation failed, speaking original");
                self.shared.emit_error(&error);
                reply_text.to_owned()
            }
        }
    }

    /// Hand the spoken text to the synthesis engine and wait for its
    /// callback through the bridge.
    async fn synthesize(&self, spoken: &str) {
        self.set_state(SessionState::Synthesizing);
        let (cont, resumer) = continuation();
        self.speech.synthesize(spoken, resumer);

        let outcome = tokio::select! {
            () = self.cancel.cancelled() => return,
            outcome = cont.wait() => outcome,
        };

        match outcome {
            Some(SynthesisOutcome::Played) => debug!("synthesis finished"),
            Some(SynthesisOutcome::Failed(message)) => {
                let error = CompanionError::Synthesis(message);
                warn!(error = %error, "synthesis failed");
                self.shared.emit_error(&error);
            }
            None => {
                let error =
                    CompanionError::Synthesis("engine dropped the continuation".to_owned());
                warn!(error = %error, "synthesis failed");
                self.shared.emit_error(&error);
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        self.shared.state.send_replace(state);
        let _ = self
            .shared
            .events
            .send(SessionEvent::StateChanged(state));
    }
}
