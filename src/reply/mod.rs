//! Retrieval-augmented replies to user questions.
//!
//! A question is validated and moderated, rewritten into a standalone question using the
//! session history, answered from the most similar indexed chunks, and the exchange is appended
//! to the history.

pub mod moderation;
pub mod prompt;
pub mod service;
pub mod session;
pub mod types;

pub use moderation::{AllowAllModerator, ContentModerator, OpenAiModerator, is_query_meaningful};
pub use service::{ReplyService, ReplySettings};
pub use session::{InMemorySessionStore, SessionStore, session_key};
pub use types::{
    HistoryMessage, MessageRole, ReplyError, ReplyRequest, ReplyResponse, SessionError,
    SourceReference,
};
