pub mod knowledge;
pub mod meta;

pub use knowledge::{FileUpload, KnowledgeBase, KnowledgeConfig, ScoredChunk, TrieveClient};
pub use meta::{
    parse_webhook, sign_payload, verify_signature, EchoEvent, GraphApiClient, InboundEvent, InboundMessage,
    MetaConfig, MetaMessenger, OutboundMessage, SendTarget, SIGNATURE_HEADER,
};
