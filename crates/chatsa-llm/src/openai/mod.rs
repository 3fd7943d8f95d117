mod client;
mod stream;

pub use client::{OpenAIClient, OPENAI_API_BASE};
pub use stream::{ChatStreamChunk, OpenAIChatParser};
