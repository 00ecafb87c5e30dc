//! Speech synthesis seam.
//!
//! The synthesis engine is an external collaborator (typically a native
//! voice engine with its own callback threads). The session hands it the
//! text to speak and a [`Resumer`]; the engine resumes it when playback
//! completes or fails. Duplicate engine callbacks are absorbed by the
//! bridge, and a torn-down session discards late resumes.

use tracing::debug;

use crate::bridge::Resumer;

/// Outcome reported by the synthesis engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// Audio was produced and played to completion.
    Played,
    /// The engine failed to produce or play audio.
    Failed(String),
}

/// Speech synthesis capability consumed by the session loop.
///
/// `synthesize` must not block: synthesis and playback happen on the
/// engine's own execution context, and `done` is resumed from there.
pub trait SpeechSynthesisService: Send + Sync {
    /// Speak `text`, resuming `done` when playback finishes or fails.
    fn synthesize(&self, text: &str, done: Resumer<SynthesisOutcome>);
}

/// No-op synthesis for frontends without a voice engine.
///
/// Reports success immediately so the session loop keeps its normal shape.
pub struct NullSynthesis;

impl SpeechSynthesisService for NullSynthesis {
    fn synthesize(&self, text: &str, done: Resumer<SynthesisOutcome>) {
        debug!(chars = text.chars().count(), "null synthesis, skipping audio");
        done.resume(SynthesisOutcome::Played);
    }
}
