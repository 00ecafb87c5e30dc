//! Session state and event types observable by frontends.
//!
//! Events are small cloneable values so the loop can emit them without
//! blocking, and so observers never hold references into loop-owned state.

use crate::error::CompanionError;

/// Pipeline position of the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not yet driven.
    Idle,
    /// Parked, waiting for the next user message.
    AwaitingInput,
    /// A completion request is in flight.
    RequestingCompletion,
    /// The reply is being translated.
    Translating,
    /// The reply is being spoken.
    Synthesizing,
}

/// Classification of an emitted error, mirroring the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input or a call in the wrong state.
    Validation,
    /// A collaborator could not be reached.
    Transport,
    /// A collaborator rejected our credentials.
    Auth,
    /// A structured remote-service error.
    Provider,
    /// Speech synthesis failed.
    Synthesis,
    /// The conversation store failed.
    Storage,
}

/// Cloneable error payload carried on the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Error class.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl From<&CompanionError> for ErrorEvent {
    fn from(error: &CompanionError) -> Self {
        let kind = match error {
            CompanionError::Validation(_) | CompanionError::Config(_) => ErrorKind::Validation,
            CompanionError::Transport(_) => ErrorKind::Transport,
            CompanionError::Auth(_) => ErrorKind::Auth,
            CompanionError::Provider { .. } => ErrorKind::Provider,
            CompanionError::Synthesis(_) => ErrorKind::Synthesis,
            CompanionError::Storage(_) | CompanionError::Io(_) | CompanionError::Channel(_) => {
                ErrorKind::Storage
            }
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

/// Events describing what the session is doing "right now".
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The loop moved to a new pipeline state.
    StateChanged(SessionState),
    /// The active channel switched and the window was rebuilt.
    ChannelSwitched {
        /// The newly active channel.
        channel_id: String,
    },
    /// A completed agent reply.
    Reply {
        /// The reply as recorded in history.
        text: String,
        /// The text handed to synthesis (translated when configured).
        spoken_text: String,
    },
    /// A stage failure, absorbed by the loop.
    Error(ErrorEvent),
}
