//! Model provider plumbing: credential pooling, failover, and an
//! OpenAI-compatible chat-completions adapter.
//!
//! ```rust
//! use pprovider::{CredentialPool, Message, ModelRequest, Role};
//!
//! let pool = CredentialPool::new(["gsk-first", "gsk-second"]).expect("pool");
//! let lease = pool.acquire().expect("a credential is available");
//! assert_eq!(pool.len().expect("len"), 2);
//!
//! let request = ModelRequest::new("llama-3.3-70b-versatile", vec![Message::new(Role::User, "hi")])
//!     .with_temperature(0.7)
//!     .enable_streaming();
//! assert!(request.validate().is_ok());
//! let _ = lease;
//! ```

pub mod adapters;
pub mod credentials;
pub mod error;
pub mod failover;
pub mod model;
pub mod prelude;
pub mod provider;
pub mod stream;

pub use credentials::{
    CredentialId, CredentialLease, CredentialPool, QuotaPolicy, SecretString, WindowSweeper,
};
pub use error::{ProviderError, ProviderErrorKind};
pub use failover::{NoopOperationHooks, ProviderOperationHooks, execute_with_failover};
pub use model::{Message, ModelRequest, ModelResponse, Role};
pub use provider::{ModelProvider, ProviderFuture};
pub use stream::{
    BoxedEventStream, LineBuffer, MAX_LINE_BYTES, ModelEventStream, StreamEvent, VecEventStream,
};

pub use pcommon::{BoxFuture, Clock, GenerationOptions, ManualClock, SystemClock};
