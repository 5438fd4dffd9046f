//! Chat view state for streamed, citation-backed answers.
//!
//! [`ChatView`] folds stream events into its message list and guards against
//! events from streams that no longer belong to the visible chat.
//! [`StreamController`] runs providers on worker threads and feeds their events
//! back to the view through a pending queue.

pub mod accumulator;
pub mod chat;
pub mod citations;
pub mod commands;
pub mod controller;
pub mod ids;
pub mod message;

pub use accumulator::StreamAccumulator;
pub use chat::{ChatView, Exchange, HostOps, Mode, StreamSession};
pub use citations::{parse_cited_sections, CitedSection};
pub use commands::{parse_slash_command, SlashCommand};
pub use controller::StreamController;
pub use ids::MessageIdGenerator;
pub use message::{Message, RetryRequest, Sender};

pub use answer_provider::StreamId;
