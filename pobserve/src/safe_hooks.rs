use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use pchat::{ChatError, ChatSessionHooks, SessionState};
use pcommon::{ConversationId, SessionId};
use pprovider::{CredentialId, ProviderError, ProviderOperationHooks};

/// Swallows panics raised by the wrapped provider hooks.
pub struct SafeProviderHooks<H> {
    inner: H,
}

impl<H> SafeProviderHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ProviderOperationHooks for SafeProviderHooks<H>
where
    H: ProviderOperationHooks,
{
    fn on_attempt_start(&self, operation: &str, attempt: u32, credential: CredentialId) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_attempt_start(operation, attempt, credential)
        }));
    }

    fn on_credential_invalidated(
        &self,
        operation: &str,
        attempt: u32,
        credential: CredentialId,
        error: &ProviderError,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_credential_invalidated(operation, attempt, credential, error)
        }));
    }

    fn on_success(&self, operation: &str, attempts: u32) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_success(operation, attempts)
        }));
    }

    fn on_failure(&self, operation: &str, attempts: u32, error: &ProviderError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_failure(operation, attempts, error)
        }));
    }

    fn on_windows_swept(&self, reset: usize) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_windows_swept(reset)));
    }
}

/// Swallows panics raised by the wrapped session hooks.
pub struct SafeChatHooks<H> {
    inner: H,
}

impl<H> SafeChatHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ChatSessionHooks for SafeChatHooks<H>
where
    H: ChatSessionHooks,
{
    fn on_transition(&self, session_id: &SessionId, from: SessionState, to: SessionState) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_transition(session_id, from, to)
        }));
    }

    fn on_fragment(&self, session_id: &SessionId, accumulated_len: usize) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_fragment(session_id, accumulated_len)
        }));
    }

    fn on_frame_skipped(&self, session_id: &SessionId, reason: &str) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_frame_skipped(session_id, reason)
        }));
    }

    fn on_normalization_failed(&self, session_id: &SessionId, error: &ChatError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_normalization_failed(session_id, error)
        }));
    }

    fn on_orphaned_conversation(
        &self,
        session_id: &SessionId,
        conversation_id: &ConversationId,
        error: &ChatError,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_orphaned_conversation(session_id, conversation_id, error)
        }));
    }

    fn on_session_committed(
        &self,
        session_id: &SessionId,
        conversation_id: &ConversationId,
        normalized: bool,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_session_committed(session_id, conversation_id, normalized, elapsed)
        }));
    }

    fn on_session_failed(&self, session_id: &SessionId, error: &ChatError, elapsed: Duration) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_session_failed(session_id, error, elapsed)
        }));
    }
}
