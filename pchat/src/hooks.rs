//! Hook contracts for observing session progress.
//!
//! ```rust
//! use pchat::{ChatSessionHooks, NoopChatHooks};
//!
//! fn accepts_hooks(_hooks: &dyn ChatSessionHooks) {}
//!
//! let hooks = NoopChatHooks;
//! accepts_hooks(&hooks);
//! ```

use std::time::Duration;

use pcommon::{ConversationId, SessionId};

use crate::{ChatError, SessionState};

pub trait ChatSessionHooks: Send + Sync {
    fn on_transition(&self, _session_id: &SessionId, _from: SessionState, _to: SessionState) {}

    fn on_fragment(&self, _session_id: &SessionId, _accumulated_len: usize) {}

    fn on_frame_skipped(&self, _session_id: &SessionId, _reason: &str) {}

    fn on_normalization_failed(&self, _session_id: &SessionId, _error: &ChatError) {}

    /// A conversation created for a failed commit could not be removed again.
    fn on_orphaned_conversation(
        &self,
        _session_id: &SessionId,
        _conversation_id: &ConversationId,
        _error: &ChatError,
    ) {
    }

    fn on_session_committed(
        &self,
        _session_id: &SessionId,
        _conversation_id: &ConversationId,
        _normalized: bool,
        _elapsed: Duration,
    ) {
    }

    fn on_session_failed(&self, _session_id: &SessionId, _error: &ChatError, _elapsed: Duration) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatHooks;

impl ChatSessionHooks for NoopChatHooks {}
