//! Small convenience constructors for common types.

use pchat::{ConversationId, TurnOutcome, TurnRequest, TurnResult};
use pprovider::{Message, Role};

use crate::ChatError;

pub fn system_message(content: impl Into<String>) -> Message {
    Message::new(Role::System, content)
}

pub fn user_message(content: impl Into<String>) -> Message {
    Message::new(Role::User, content)
}

pub fn assistant_message(content: impl Into<String>) -> Message {
    Message::new(Role::Assistant, content)
}

/// First turn of a new conversation.
pub fn turn(user_text: impl Into<String>) -> TurnRequest {
    TurnRequest::new(user_text)
}

pub fn follow_up(
    conversation_id: impl Into<ConversationId>,
    user_text: impl Into<String>,
) -> TurnRequest {
    TurnRequest::new(user_text).in_conversation(conversation_id)
}

/// Collapses a turn result into the shape a presentation layer renders.
pub fn outcome(result: Result<TurnResult, ChatError>) -> TurnOutcome {
    TurnOutcome::from(result)
}
