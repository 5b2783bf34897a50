//! Metrics-based observability hooks for credential failover and chat sessions.
//!
//! ```rust
//! use pobserve::MetricsObservabilityHooks;
//! use pprovider::ProviderOperationHooks;
//!
//! fn accepts_provider_hooks(_hooks: &dyn ProviderOperationHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_provider_hooks(&hooks);
//! ```

use std::time::Duration;

use pchat::{ChatError, ChatSessionHooks, SessionState};
use pcommon::{ConversationId, SessionId};
use pprovider::{CredentialId, ProviderError, ProviderOperationHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl ProviderOperationHooks for MetricsObservabilityHooks {
    fn on_attempt_start(&self, operation: &str, _attempt: u32, _credential: CredentialId) {
        metrics::counter!(
            "parley_provider_attempt_start_total",
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    fn on_credential_invalidated(
        &self,
        operation: &str,
        _attempt: u32,
        _credential: CredentialId,
        _error: &ProviderError,
    ) {
        metrics::counter!(
            "parley_credential_invalidated_total",
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    fn on_success(&self, operation: &str, attempts: u32) {
        metrics::counter!(
            "parley_provider_success_total",
            "operation" => operation.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "parley_provider_attempts_per_success",
            "operation" => operation.to_string()
        )
        .record(f64::from(attempts));
    }

    fn on_failure(&self, operation: &str, _attempts: u32, error: &ProviderError) {
        metrics::counter!(
            "parley_provider_failure_total",
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
    }

    fn on_windows_swept(&self, reset: usize) {
        metrics::counter!("parley_quota_windows_reset_total").increment(reset as u64);
    }
}

impl ChatSessionHooks for MetricsObservabilityHooks {
    fn on_transition(&self, _session_id: &SessionId, _from: SessionState, to: SessionState) {
        metrics::counter!(
            "parley_session_transition_total",
            "to" => to.as_str()
        )
        .increment(1);
    }

    fn on_frame_skipped(&self, _session_id: &SessionId, _reason: &str) {
        metrics::counter!("parley_stream_frame_skipped_total").increment(1);
    }

    fn on_normalization_failed(&self, _session_id: &SessionId, _error: &ChatError) {
        metrics::counter!("parley_normalization_failed_total").increment(1);
    }

    fn on_orphaned_conversation(
        &self,
        _session_id: &SessionId,
        _conversation_id: &ConversationId,
        _error: &ChatError,
    ) {
        metrics::counter!("parley_orphaned_conversation_total").increment(1);
    }

    fn on_session_committed(
        &self,
        _session_id: &SessionId,
        _conversation_id: &ConversationId,
        normalized: bool,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "parley_session_committed_total",
            "normalized" => if normalized { "true" } else { "false" }
        )
        .increment(1);
        metrics::histogram!("parley_session_duration_seconds", "outcome" => "committed")
            .record(elapsed.as_secs_f64());
    }

    fn on_session_failed(&self, _session_id: &SessionId, error: &ChatError, elapsed: Duration) {
        metrics::counter!(
            "parley_session_failed_total",
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!("parley_session_duration_seconds", "outcome" => "failed")
            .record(elapsed.as_secs_f64());
    }
}
