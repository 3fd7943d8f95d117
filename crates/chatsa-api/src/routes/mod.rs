pub mod chat;
pub mod chatbots;
pub mod conversations;
pub mod files;
pub mod flows;
pub mod health;
pub mod integrations;
pub mod teams;
pub mod webhooks;
