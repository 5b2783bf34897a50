//! Credential failover loop and operational hook contracts.
//!
//! A request is attempted with a freshly acquired credential. When the
//! endpoint rejects that credential it is invalidated and the request is
//! re-attempted with another one. The number of attempts is bounded by the
//! pool size observed when the operation starts.

use std::future::Future;

use crate::{CredentialId, CredentialLease, CredentialPool, ProviderError};

pub trait ProviderOperationHooks: Send + Sync {
    fn on_attempt_start(&self, _operation: &str, _attempt: u32, _credential: CredentialId) {}

    fn on_credential_invalidated(
        &self,
        _operation: &str,
        _attempt: u32,
        _credential: CredentialId,
        _error: &ProviderError,
    ) {
    }

    fn on_success(&self, _operation: &str, _attempts: u32) {}

    fn on_failure(&self, _operation: &str, _attempts: u32, _error: &ProviderError) {}

    fn on_windows_swept(&self, _reset: usize) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationHooks;

impl ProviderOperationHooks for NoopOperationHooks {}

/// Runs `execute` with pool credentials until it succeeds, fails for a reason
/// other than credential rejection, or the pool runs out.
///
/// On success returns the credential that produced the value, so follow-up
/// requests can reuse it.
pub async fn execute_with_failover<T, Op, OpFuture>(
    operation: &str,
    pool: &CredentialPool,
    hooks: &dyn ProviderOperationHooks,
    mut execute: Op,
) -> Result<(CredentialLease, T), ProviderError>
where
    Op: FnMut(CredentialLease) -> OpFuture,
    OpFuture: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = u32::try_from(pool.len()?).unwrap_or(u32::MAX).max(1);
    let mut attempt = 1;

    loop {
        let lease = match pool.acquire() {
            Ok(lease) => lease,
            Err(error) => {
                hooks.on_failure(operation, attempt, &error);
                return Err(error);
            }
        };

        hooks.on_attempt_start(operation, attempt, lease.id());

        match execute(lease.clone()).await {
            Ok(value) => {
                hooks.on_success(operation, attempt);
                return Ok((lease, value));
            }
            Err(error) if error.is_credential_rejection() => {
                pool.invalidate(lease.id())?;
                hooks.on_credential_invalidated(operation, attempt, lease.id(), &error);

                if pool.is_empty()? || attempt >= max_attempts {
                    let exhausted = ProviderError::credentials_exhausted(format!(
                        "every credential was rejected by the endpoint; last error: {}",
                        error.message
                    ));
                    hooks.on_failure(operation, attempt, &exhausted);
                    return Err(exhausted);
                }

                attempt += 1;
            }
            Err(error) => {
                hooks.on_failure(operation, attempt, &error);
                return Err(error);
            }
        }
    }
}
