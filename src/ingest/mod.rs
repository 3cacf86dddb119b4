//! Notification intake: parsing, enrichment and the network listeners

pub mod listener;
pub mod parser;
pub mod pipeline;

pub use listener::Listener;
pub use parser::{ParseError, ParsedEvent, PayloadGrammar};
pub use pipeline::{Outcome, Pipeline};
