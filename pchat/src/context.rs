//! Bounded conversational context for outgoing requests.
//!
//! ```rust
//! use pchat::{Conversation, ConversationMessage, context_window};
//! use pcommon::ConversationId;
//! use pprovider::Role;
//!
//! let mut conversation = Conversation::new(ConversationId::from("conv-1"));
//! for turn in 0..7 {
//!     conversation.push(ConversationMessage::user(format!("question {turn}")));
//! }
//!
//! let window = context_window(&conversation, 5);
//! assert_eq!(window.len(), 5);
//! assert_eq!(window[0].content, "question 2");
//! assert_eq!(window[4].role, Role::User);
//! ```

use pprovider::{Message, Role};

use crate::Conversation;

pub const DEFAULT_CONTEXT_TURNS: usize = 5;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an AI assistant. Please note:
1. Always answer in Simplified Chinese, even when the user writes in another language.
2. Keep answers concise and professional.
3. Organize answers with Markdown, including:
   - heading levels (#) to structure the content
   - lists (- or 1.) to enumerate points
   - code blocks (```) to show code
   - tables for structured data
   - bold (**) and italics (*) to emphasize important content where appropriate
4. Make sure the answer is readable and well structured.";

/// The last `max_turns` messages of `conversation`, oldest first.
pub fn context_window(conversation: &Conversation, max_turns: usize) -> Vec<Message> {
    let start = conversation.messages.len().saturating_sub(max_turns);
    conversation.messages[start..]
        .iter()
        .map(|message| message.to_provider_message())
        .collect()
}

/// System instruction, then the context window, then the new user turn.
pub fn build_turn_messages(
    system_instruction: &str,
    conversation: &Conversation,
    max_turns: usize,
    user_text: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(max_turns + 2);
    messages.push(Message::new(Role::System, system_instruction));
    messages.extend(context_window(conversation, max_turns));
    messages.push(Message::new(Role::User, user_text));
    messages
}
