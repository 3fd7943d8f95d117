mod client;
mod stream;

pub use client::{AnthropicClient, ANTHROPIC_API_BASE, ANTHROPIC_VERSION};
pub use stream::AnthropicParser;
