//! Two interchangeable ways to turn a streamed model turn into
//! `StreamEvent`s: `native` for providers with structured tool-calling,
//! `tag` for providers that only speak text and need tool calls emulated
//! with delimiter tags.

pub mod event;
pub mod native;
pub mod tag;

pub use event::{FinishReasonKind, StreamEvent};
pub use native::NativeParser;
pub use tag::{TagParser, TagSet};
