//! Tracing-based observability hooks for credential failover and chat sessions.
//!
//! ```rust
//! use pobserve::TracingObservabilityHooks;
//! use pchat::ChatSessionHooks;
//!
//! fn accepts_session_hooks(_hooks: &dyn ChatSessionHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_session_hooks(&hooks);
//! ```

use std::time::Duration;

use pchat::{ChatError, ChatSessionHooks, SessionState};
use pcommon::{ConversationId, SessionId};
use pprovider::{CredentialId, ProviderError, ProviderOperationHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl ProviderOperationHooks for TracingObservabilityHooks {
    fn on_attempt_start(&self, operation: &str, attempt: u32, credential: CredentialId) {
        tracing::info!(
            phase = "provider",
            event = "attempt_start",
            operation,
            attempt,
            credential = %credential
        );
    }

    fn on_credential_invalidated(
        &self,
        operation: &str,
        attempt: u32,
        credential: CredentialId,
        error: &ProviderError,
    ) {
        tracing::warn!(
            phase = "provider",
            event = "credential_invalidated",
            operation,
            attempt,
            credential = %credential,
            status = error.status,
            error = %error
        );
    }

    fn on_success(&self, operation: &str, attempts: u32) {
        tracing::info!(phase = "provider", event = "success", operation, attempts);
    }

    fn on_failure(&self, operation: &str, attempts: u32, error: &ProviderError) {
        tracing::error!(
            phase = "provider",
            event = "failure",
            operation,
            attempts,
            error_kind = ?error.kind,
            status = error.status,
            error = %error
        );
    }

    fn on_windows_swept(&self, reset: usize) {
        tracing::debug!(phase = "provider", event = "windows_swept", reset);
    }
}

impl ChatSessionHooks for TracingObservabilityHooks {
    fn on_transition(&self, session_id: &SessionId, from: SessionState, to: SessionState) {
        tracing::debug!(
            phase = "session",
            event = "transition",
            session_id = %session_id,
            from = from.as_str(),
            to = to.as_str()
        );
    }

    fn on_fragment(&self, session_id: &SessionId, accumulated_len: usize) {
        tracing::trace!(
            phase = "session",
            event = "fragment",
            session_id = %session_id,
            accumulated_len
        );
    }

    fn on_frame_skipped(&self, session_id: &SessionId, reason: &str) {
        tracing::warn!(
            phase = "session",
            event = "frame_skipped",
            session_id = %session_id,
            reason
        );
    }

    fn on_normalization_failed(&self, session_id: &SessionId, error: &ChatError) {
        tracing::warn!(
            phase = "session",
            event = "normalization_failed",
            session_id = %session_id,
            error_kind = ?error.kind,
            error = %error
        );
    }

    fn on_orphaned_conversation(
        &self,
        session_id: &SessionId,
        conversation_id: &ConversationId,
        error: &ChatError,
    ) {
        tracing::warn!(
            phase = "session",
            event = "orphaned_conversation",
            session_id = %session_id,
            conversation_id = %conversation_id,
            error_kind = ?error.kind,
            error = %error
        );
    }

    fn on_session_committed(
        &self,
        session_id: &SessionId,
        conversation_id: &ConversationId,
        normalized: bool,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "session",
            event = "committed",
            session_id = %session_id,
            conversation_id = %conversation_id,
            normalized,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_session_failed(&self, session_id: &SessionId, error: &ChatError, elapsed: Duration) {
        tracing::error!(
            phase = "session",
            event = "failed",
            session_id = %session_id,
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = ?error.kind,
            status = error.status,
            error = %error
        );
    }
}
