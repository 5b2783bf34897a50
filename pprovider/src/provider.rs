use std::future::Future;
use std::pin::Pin;

use crate::{BoxedEventStream, CredentialLease, ModelRequest, ModelResponse, ProviderError};

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Chat-completion endpoint driven with a caller-supplied credential.
///
/// Providers never pick credentials themselves; the caller acquires a lease
/// from a [`crate::CredentialPool`] and decides what to do with rejections.
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn complete<'a>(
        &'a self,
        request: ModelRequest,
        credential: CredentialLease,
    ) -> ProviderFuture<'a, Result<ModelResponse, ProviderError>>;

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
        credential: CredentialLease,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>>;
}
