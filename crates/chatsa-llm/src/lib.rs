pub mod types;
pub mod traits;
pub mod streaming;
pub mod buffer_utils;
pub mod openai;
pub mod anthropic;
pub mod config;
pub mod registry;

pub use traits::{ChatClient, ChatRequest, ChatResponse, ChatOptions, TokenUsage, EventStream};

pub use streaming::StreamEvent;
pub use buffer_utils::CircularLineBuffer;
pub use openai::OpenAIClient;
pub use anthropic::AnthropicClient;
pub use config::{ClientFactory, ProviderConfig, ProviderType};
pub use registry::ProviderRegistry;
pub use types::{Message, Content};
