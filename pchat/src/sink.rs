//! Incremental rendering sink contract and channel-backed dispatch.
//!
//! Every update carries the entire accumulated reply, so a renderer only
//! ever replaces what it shows. Callbacks run on the session task and must
//! not block.
//!
//! ```rust
//! use pchat::{ChannelSink, FragmentSink, SessionEnd, SinkEvent};
//! use pcommon::SessionId;
//!
//! let (sink, mut events) = ChannelSink::new(8);
//! let session = SessionId::from("turn-1");
//! sink.on_fragment_update(&session, "He");
//! sink.on_fragment_update(&session, "Hello");
//! sink.on_session_end(&session, SessionEnd::Committed { text: "Hello".into() });
//!
//! assert!(matches!(events.try_recv(), Ok(SinkEvent::Update { .. })));
//! ```

use pcommon::SessionId;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::ChatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Committed { text: String },
    /// Anything rendered for this session must be discarded.
    Retracted { error: ChatError },
}

pub trait FragmentSink: Send + Sync {
    fn on_fragment_update(&self, session_id: &SessionId, full_text: &str);

    fn on_session_end(&self, session_id: &SessionId, end: SessionEnd);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl FragmentSink for NoopSink {
    fn on_fragment_update(&self, _session_id: &SessionId, _full_text: &str) {}

    fn on_session_end(&self, _session_id: &SessionId, _end: SessionEnd) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Update { session_id: SessionId, text: String },
    End { session_id: SessionId, end: SessionEnd },
}

/// Forwards sink callbacks to a bounded channel without blocking the session.
///
/// When the channel is full an update is dropped; the next one supersedes it.
/// The end event is never dropped while a tokio runtime is available: if the
/// channel is full it is delivered from a spawned task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SinkEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl FragmentSink for ChannelSink {
    fn on_fragment_update(&self, session_id: &SessionId, full_text: &str) {
        let _ = self.sender.try_send(SinkEvent::Update {
            session_id: session_id.clone(),
            text: full_text.to_string(),
        });
    }

    fn on_session_end(&self, session_id: &SessionId, end: SessionEnd) {
        let event = SinkEvent::End {
            session_id: session_id.clone(),
            end,
        };

        if let Err(TrySendError::Full(event)) = self.sender.try_send(event) {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let sender = self.sender.clone();
                handle.spawn(async move {
                    let _ = sender.send(event).await;
                });
            }
        }
    }
}
