//! Shared utilities and strongly-typed common values for workspace crates.
//!
//! ```rust
//! use pcommon::{ConversationId, GenerationOptions, SessionId};
//!
//! let conversation = ConversationId::from("conversation-1");
//! let session = SessionId::new("turn-1");
//!
//! let options = GenerationOptions::default().with_temperature(0.3).enable_streaming();
//! assert_eq!(conversation.as_str(), "conversation-1");
//! assert_eq!(session.to_string(), "turn-1");
//! assert!(options.stream);
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use pcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Identifier newtypes shared between the orchestrator, stores, and sinks.
    //!
    //! ```rust
    //! use pcommon::{ConversationId, SessionId};
    //!
    //! let first = ConversationId::generate();
    //! let second = ConversationId::generate();
    //! assert_ne!(first, second);
    //!
    //! let session = SessionId::from("turn-42");
    //! assert_eq!(session.as_str(), "turn-42");
    //! ```

    use std::fmt::{Display, Formatter};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static SEQUENCE: AtomicU64 = AtomicU64::new(0);

    fn unique_suffix() -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        format!("{nanos:x}-{sequence}")
    }

    macro_rules! id_newtype {
        ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(String);

            impl $name {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                /// Creates a process-unique identifier.
                pub fn generate() -> Self {
                    Self(format!(concat!($prefix, "-{}"), unique_suffix()))
                }

                pub fn as_str(&self) -> &str {
                    self.0.as_str()
                }
            }

            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        };
    }

    id_newtype!(
        /// Key of a persisted conversation.
        ConversationId,
        "conv"
    );

    id_newtype!(
        /// Identifies one request/response/commit cycle.
        SessionId,
        "turn"
    );
}

pub mod model {
    //! Shared generation settings used by request types.
    //!
    //! ```rust
    //! use pcommon::GenerationOptions;
    //!
    //! let options = GenerationOptions::default()
    //!     .with_temperature(0.2)
    //!     .enable_streaming();
    //!
    //! assert_eq!(options.temperature, Some(0.2));
    //! assert!(options.stream);
    //! ```

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct GenerationOptions {
        pub temperature: Option<f32>,
        pub stream: bool,
    }

    impl GenerationOptions {
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_streaming(mut self, stream: bool) -> Self {
            self.stream = stream;
            self
        }

        pub fn enable_streaming(self) -> Self {
            self.with_streaming(true)
        }
    }
}

pub mod time {
    //! Monotonic clock abstraction so quota windows can be tested without sleeping.
    //!
    //! ```rust
    //! use std::time::Duration;
    //! use pcommon::{Clock, ManualClock};
    //!
    //! let clock = ManualClock::new();
    //! let start = clock.now();
    //! clock.advance(Duration::from_secs(61));
    //! assert_eq!(clock.now() - start, Duration::from_secs(61));
    //! ```

    use std::fmt::Debug;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    pub trait Clock: Send + Sync + Debug {
        fn now(&self) -> Instant;
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> Instant {
            Instant::now()
        }
    }

    /// Clock that only moves when told to.
    #[derive(Debug)]
    pub struct ManualClock {
        origin: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        pub fn advance(&self, by: Duration) {
            let mut offset = self
                .offset
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *offset += by;
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            let offset = self
                .offset
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.origin + *offset
        }
    }
}

pub use context::{ConversationId, SessionId};
pub use future::BoxFuture;
pub use model::GenerationOptions;
pub use time::{Clock, ManualClock, SystemClock};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Clock, ConversationId, GenerationOptions, ManualClock, SessionId};

    #[test]
    fn id_newtypes_round_trip_strings() {
        let conversation = ConversationId::new("conversation-1");
        let session = SessionId::from("turn-1");

        assert_eq!(conversation.as_str(), "conversation-1");
        assert_eq!(session.as_str(), "turn-1");
        assert_eq!(conversation.to_string(), "conversation-1");
        assert_eq!(session.to_string(), "turn-1");
    }

    #[test]
    fn generated_ids_are_prefixed_and_unique() {
        let ids = (0..64).map(|_| ConversationId::generate()).collect::<Vec<_>>();
        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();

        assert_eq!(deduped.len(), ids.len());
        assert!(ids.iter().all(|id| id.as_str().starts_with("conv-")));
        assert!(SessionId::generate().as_str().starts_with("turn-"));
    }

    #[test]
    fn generation_options_builder_helpers_set_values() {
        let options = GenerationOptions::default()
            .with_temperature(0.3)
            .enable_streaming();

        assert_eq!(options.temperature, Some(0.3));
        assert!(options.stream);
        assert!(!options.with_streaming(false).stream);
    }

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new();
        let first = clock.now();
        assert_eq!(clock.now(), first);

        clock.advance(Duration::from_secs(30));
        clock.advance(Duration::from_secs(30));
        assert_eq!(clock.now().duration_since(first), Duration::from_secs(60));
    }
}
