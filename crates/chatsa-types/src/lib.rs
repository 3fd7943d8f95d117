pub mod team;
pub mod chatbot;
pub mod dataset;
pub mod conversation;
pub mod integration;
pub mod flow;

pub use team::{Plan, PlanLimits, Team, BILLING_PERIOD_DAYS};
pub use chatbot::{Chatbot, ChatbotSettings, DEFAULT_SYSTEM_PROMPT};
pub use dataset::{DatasetFile, FileSource, FileStatus};
pub use conversation::{Channel, Conversation, ConversationMessage, FlowCursor, MessageRole};
pub use integration::Integration;
pub use flow::{FlowEdge, FlowNode, FlowNodeKind, QuestionFlow};

/// Generate a new record id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
