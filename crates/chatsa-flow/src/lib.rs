pub mod builder;
pub mod engine;
pub mod error;
pub mod flow;
pub mod prompt;
pub mod router;

pub use builder::ConversationEngineBuilder;
pub use engine::{
    ConversationEngine, EngineConfig, InboundOutcome, WebChatEvents, WebChatReply, WebChatStream,
};
pub use error::{EngineError, Result};
pub use flow::{advance, validate, FlowStep};
pub use router::{DefaultRouter, Route, RouteContext, Router, SkipReason};
