use std::pin::Pin;
use std::sync::Arc;

use chatsa_integrations::{
    EchoEvent, InboundEvent, InboundMessage, KnowledgeBase, MetaMessenger, OutboundMessage,
    ScoredChunk, SendTarget,
};
use chatsa_llm::{ChatOptions, ChatRequest, EventStream, ProviderRegistry, StreamEvent};
use chatsa_persist::PersistenceClient;
use chatsa_types::{
    Channel, Chatbot, Conversation, ConversationMessage, Integration, MessageRole, QuestionFlow,
    Team,
};
use chrono::{Duration, Utc};
use futures::{Stream, StreamExt};

use crate::error::{EngineError, Result};
use crate::flow;
use crate::prompt;
use crate::router::{Route, RouteContext, Router, SkipReason};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Human takeover ends on its own after this long; `None` keeps it until
    /// switched off
    pub takeover_timeout: Option<Duration>,
    /// Our Meta app id, to tell our own echoes from agent replies
    pub meta_app_id: Option<u64>,
    pub max_tokens: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            takeover_timeout: Some(Duration::minutes(60)),
            meta_app_id: None,
            max_tokens: None,
        }
    }
}

/// What happened to one webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Skipped(SkipReason),
    TakeoverStarted { conversation_id: String },
    FlowReplied { conversation_id: String, flow_id: String, sent: usize },
    AiReplied { conversation_id: String, sent: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebChatReply {
    pub conversation_id: String,
    /// `None` while a human agent handles the conversation
    pub reply: Option<String>,
    pub human_takeover: bool,
}

pub type WebChatEvents = Pin<Box<dyn Stream<Item = anyhow::Result<StreamEvent>> + Send>>;

pub struct WebChatStream {
    pub conversation_id: String,
    pub human_takeover: bool,
    pub events: WebChatEvents,
}

/// Turns inbound messages into replies: dedup, takeover, flows, RAG answers
#[derive(Clone)]
pub struct ConversationEngine {
    persist: Arc<dyn PersistenceClient>,
    providers: Arc<ProviderRegistry>,
    knowledge: Arc<dyn KnowledgeBase>,
    messenger: Arc<dyn MetaMessenger>,
    router: Arc<dyn Router>,
    config: EngineConfig,
}

impl ConversationEngine {
    pub fn new(
        persist: Arc<dyn PersistenceClient>,
        providers: Arc<ProviderRegistry>,
        knowledge: Arc<dyn KnowledgeBase>,
        messenger: Arc<dyn MetaMessenger>,
        router: Arc<dyn Router>,
        config: EngineConfig,
    ) -> Self {
        Self {
            persist,
            providers,
            knowledge,
            messenger,
            router,
            config,
        }
    }

    /// Create a builder for fluent construction
    pub fn builder() -> crate::builder::ConversationEngineBuilder {
        crate::builder::ConversationEngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ----- quota ---------------------------------------------------------

    /// Roll the billing period over if it ended, then check the team still
    /// has message credits
    pub async fn ensure_quota(&self, team: &mut Team) -> Result<()> {
        let now = Utc::now();
        if team.period_expired(now) {
            self.persist.reset_message_usage(&team.id, now).await?;
            team.messages_used = 0;
            team.period_started_at = now;
            tracing::info!(team_id = %team.id, "Billing period rolled over");
        }

        if team.messages_used >= team.plan.limits().message_credits {
            return Err(EngineError::QuotaExceeded);
        }
        Ok(())
    }

    async fn team_with_quota(&self, team_id: &str) -> Result<(Team, bool)> {
        let mut team = self
            .persist
            .get_team(team_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Team", team_id))?;

        match self.ensure_quota(&mut team).await {
            Ok(()) => Ok((team, true)),
            Err(EngineError::QuotaExceeded) => Ok((team, false)),
            Err(e) => Err(e),
        }
    }

    /// Count one AI answer against the team's plan
    async fn charge(&self, team: &Team) -> Result<()> {
        let limit = team.plan.limits().message_credits;
        if !self.persist.consume_message_credit(&team.id, limit).await? {
            tracing::warn!(team_id = %team.id, "Answer delivered after the last credit was spent");
        }
        Ok(())
    }

    // ----- records -------------------------------------------------------

    async fn load_chatbot(&self, chatbot_id: &str) -> Result<Chatbot> {
        self.persist
            .get_chatbot(chatbot_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Chatbot", chatbot_id))
    }

    async fn find_or_create_conversation(
        &self,
        chatbot_id: &str,
        channel: Channel,
        external_user_id: &str,
    ) -> Result<(Conversation, bool)> {
        if let Some(existing) = self
            .persist
            .find_conversation(chatbot_id, channel, external_user_id)
            .await?
        {
            return Ok((existing, false));
        }

        let conversation = Conversation::new(chatbot_id, channel, external_user_id);
        self.persist.save_conversation(&conversation).await?;
        tracing::info!(
            conversation_id = %conversation.id,
            chatbot_id = %chatbot_id,
            channel = %channel,
            "Conversation started"
        );
        Ok((conversation, true))
    }

    /// Persist an inbound user message and bump the conversation
    async fn record_user_message(
        &self,
        conversation: &mut Conversation,
        text: &str,
        external_id: Option<&str>,
    ) -> Result<ConversationMessage> {
        let mut message = ConversationMessage::new(&conversation.id, MessageRole::User, text);
        if let Some(id) = external_id {
            message = message.with_external_id(id);
        }
        self.persist.save_message(&message).await?;
        conversation.touch();
        Ok(message)
    }

    /// Check takeover, releasing it when it has expired. Saves the
    /// conversation.
    async fn refresh_takeover(&self, conversation: &mut Conversation) -> Result<bool> {
        let active = conversation.takeover_active(Utc::now(), self.config.takeover_timeout);
        if conversation.human_takeover && !active {
            conversation.set_human_takeover(false);
            tracing::info!(conversation_id = %conversation.id, "Human takeover expired");
        }
        self.persist.save_conversation(conversation).await?;
        Ok(active)
    }

    async fn save_reply(
        &self,
        conversation: &Conversation,
        role: MessageRole,
        text: &str,
        external_id: Option<&str>,
    ) -> Result<ConversationMessage> {
        let mut message = ConversationMessage::new(&conversation.id, role, text);
        if let Some(id) = external_id {
            message = message.with_external_id(id);
        }
        self.persist.save_message(&message).await?;
        Ok(message)
    }

    // ----- webhook pipeline ----------------------------------------------

    pub async fn handle_event(&self, event: InboundEvent) -> Result<InboundOutcome> {
        match event {
            InboundEvent::Message(message) => self.handle_inbound(message).await,
            InboundEvent::Echo(echo) => self.handle_echo(echo).await,
        }
    }

    /// Process one end-user message from a Meta channel
    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Result<InboundOutcome> {
        let key = format!("{}:{}", inbound.channel.as_str(), inbound.message_id);
        let duplicate = !self.persist.mark_message_processed(&key).await?;
        let integration = if duplicate {
            None
        } else {
            self.persist
                .find_integration(inbound.channel, &inbound.account_id)
                .await?
        };

        let admission = RouteContext::admission(duplicate, integration.as_ref().map(|i| i.enabled));
        if let Route::Skip(reason) = self.router.route(&admission) {
            tracing::debug!(key = %key, reason = %reason, "Inbound message skipped");
            return Ok(InboundOutcome::Skipped(reason));
        }
        let Some(integration) = integration else {
            return Ok(InboundOutcome::Skipped(SkipReason::NoIntegration));
        };

        let chatbot = self.load_chatbot(&integration.chatbot_id).await?;
        let (mut conversation, created) = self
            .find_or_create_conversation(&chatbot.id, inbound.channel, &inbound.sender_id)
            .await?;
        let user_message = self
            .record_user_message(&mut conversation, &inbound.text, Some(&inbound.message_id))
            .await?;
        let takeover_active = self.refresh_takeover(&mut conversation).await?;

        let (flows, team, quota_available) = if takeover_active {
            (Vec::new(), None, false)
        } else {
            let flows = self.persist.list_flows(&chatbot.id).await?;
            let (team, quota) = self.team_with_quota(&chatbot.team_id).await?;
            (flows, Some(team), quota)
        };

        let route = self.router.route(&RouteContext {
            duplicate: false,
            integration_enabled: Some(true),
            conversation: Some(&conversation),
            new_conversation: created,
            takeover_active,
            quota_available,
            text: &inbound.text,
            flows: &flows,
        });
        tracing::debug!(conversation_id = %conversation.id, route = ?route, "Routed inbound message");

        let target = SendTarget {
            channel: inbound.channel,
            account_id: integration.account_id.clone(),
            access_token: integration.access_token.clone(),
            recipient_id: inbound.sender_id.clone(),
        };

        match (route, team) {
            (Route::Skip(reason), _) => {
                if reason == SkipReason::QuotaExhausted {
                    tracing::warn!(team_id = %chatbot.team_id, "Message quota exhausted; no AI reply");
                }
                Ok(InboundOutcome::Skipped(reason))
            }
            (Route::Flow(flow_id), _) => {
                self.run_flow(&flows, &flow_id, &mut conversation, &inbound, &target)
                    .await
            }
            (Route::Ai, Some(team)) => {
                let answer = self.answer(&chatbot, &conversation.id, &user_message).await?;
                let ids = self.messenger.send(&target, &OutboundMessage::text(&answer)).await?;
                self.record_sent(target.channel, &ids).await?;
                self.save_reply(&conversation, MessageRole::Assistant, &answer, ids.first().map(String::as_str))
                    .await?;
                self.charge(&team).await?;
                Ok(InboundOutcome::AiReplied {
                    conversation_id: conversation.id.clone(),
                    sent: ids.len(),
                })
            }
            (Route::Ai, None) => Ok(InboundOutcome::Skipped(SkipReason::HumanTakeover)),
        }
    }

    async fn run_flow(
        &self,
        flows: &[QuestionFlow],
        flow_id: &str,
        conversation: &mut Conversation,
        inbound: &InboundMessage,
        target: &SendTarget,
    ) -> Result<InboundOutcome> {
        let flow = flows
            .iter()
            .find(|f| f.id == flow_id)
            .ok_or_else(|| EngineError::not_found("Flow", flow_id))?;

        let step = flow::advance(
            flow,
            conversation.flow_cursor.as_ref(),
            &inbound.text,
            inbound.reply_id.as_deref(),
        );
        if !step.matched {
            tracing::debug!(conversation_id = %conversation.id, "Reply matched no option; asking again");
        }

        conversation.flow_cursor = step.cursor.clone();
        self.persist.save_conversation(conversation).await?;

        let mut sent = 0;
        for message in &step.messages {
            let ids = self.messenger.send(target, message).await?;
            self.record_sent(target.channel, &ids).await?;
            self.save_reply(
                conversation,
                MessageRole::Assistant,
                &message.as_plain_text(),
                ids.first().map(String::as_str),
            )
            .await?;
            sent += 1;
        }

        if step.finished() {
            tracing::info!(conversation_id = %conversation.id, flow_id = %flow.id, "Flow finished");
        }

        Ok(InboundOutcome::FlowReplied {
            conversation_id: conversation.id.clone(),
            flow_id: flow.id.clone(),
            sent,
        })
    }

    /// Remember ids of messages we sent so their echoes are recognised
    async fn record_sent(&self, channel: Channel, ids: &[String]) -> Result<()> {
        for id in ids {
            self.persist.mark_message_processed(&sent_key(channel, id)).await?;
        }
        Ok(())
    }

    /// Echo of a message sent from a connected account. Anything not sent
    /// by our app is a human agent replying from the Meta inbox.
    pub async fn handle_echo(&self, echo: EchoEvent) -> Result<InboundOutcome> {
        let key = format!("{}:{}", echo.channel.as_str(), echo.message_id);
        if !self.persist.mark_message_processed(&key).await? {
            return Ok(InboundOutcome::Skipped(SkipReason::Duplicate));
        }

        // Without our app id, an echo is ours only if we recorded the send
        let own = match (echo.app_id, self.config.meta_app_id) {
            (Some(sender), Some(ours)) => sender == ours,
            _ => !self
                .persist
                .mark_message_processed(&sent_key(echo.channel, &echo.message_id))
                .await?,
        };
        if own {
            return Ok(InboundOutcome::Skipped(SkipReason::OwnEcho));
        }

        let Some(integration) = self
            .persist
            .find_integration(echo.channel, &echo.account_id)
            .await?
        else {
            return Ok(InboundOutcome::Skipped(SkipReason::NoIntegration));
        };

        let (mut conversation, _) = self
            .find_or_create_conversation(&integration.chatbot_id, echo.channel, &echo.recipient_id)
            .await?;
        conversation.set_human_takeover(true);
        self.persist.save_conversation(&conversation).await?;

        tracing::info!(
            conversation_id = %conversation.id,
            channel = %echo.channel,
            "Agent replied from inbox; human takeover started"
        );
        Ok(InboundOutcome::TakeoverStarted {
            conversation_id: conversation.id,
        })
    }

    // ----- answers -------------------------------------------------------

    async fn retrieve(&self, chatbot: &Chatbot, query: &str) -> Vec<ScoredChunk> {
        let limit = chatbot.settings.context_chunks;
        if limit == 0 || chatbot.dataset_id.is_empty() {
            return Vec::new();
        }
        match self.knowledge.search(&chatbot.dataset_id, query, limit).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(chatbot_id = %chatbot.id, error = %e, "Knowledge search failed; answering without context");
                Vec::new()
            }
        }
    }

    /// Recent history before `question`, oldest first
    async fn history(&self, conversation_id: &str, question: &ConversationMessage, limit: u32) -> Result<Vec<ConversationMessage>> {
        let limit = limit as usize;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut history: Vec<ConversationMessage> = self
            .persist
            .recent_messages(conversation_id, limit + 1)
            .await?
            .into_iter()
            .filter(|m| m.id != question.id)
            .collect();
        let excess = history.len().saturating_sub(limit);
        history.drain(..excess);
        Ok(history)
    }

    async fn prepare_request(
        &self,
        chatbot: &Chatbot,
        conversation_id: &str,
        question: &ConversationMessage,
    ) -> Result<(Arc<dyn chatsa_llm::ChatClient>, ChatRequest)> {
        let settings = &chatbot.settings;
        let client = self
            .providers
            .get(settings.provider)
            .ok_or(EngineError::ProviderUnavailable(settings.provider))?;

        let chunks = self.retrieve(chatbot, &question.content).await;
        let history = self.history(conversation_id, question, settings.history_messages).await?;
        let messages = prompt::build_messages(settings, &chunks, &history, &question.content);

        let mut options = ChatOptions::new().temperature(settings.temperature);
        if let Some(max_tokens) = self.config.max_tokens {
            options = options.max_tokens(max_tokens);
        }

        tracing::debug!(
            chatbot_id = %chatbot.id,
            provider = %settings.provider,
            model = %settings.model,
            context_chunks = chunks.len(),
            history = history.len(),
            "Prepared LLM request"
        );
        Ok((client, ChatRequest::new(&settings.model, messages).with_options(options)))
    }

    /// RAG answer to `question`, which must already be stored in the
    /// conversation
    pub async fn answer(
        &self,
        chatbot: &Chatbot,
        conversation_id: &str,
        question: &ConversationMessage,
    ) -> Result<String> {
        let (client, request) = self.prepare_request(chatbot, conversation_id, question).await?;
        let response = client.chat(request).await?;

        let answer = response.content.unwrap_or_default().trim().to_string();
        if answer.is_empty() {
            return Err(EngineError::Provider(anyhow::anyhow!("LLM returned an empty answer")));
        }
        Ok(answer)
    }

    /// Streaming variant of [`answer`](Self::answer)
    pub async fn answer_stream(
        &self,
        chatbot: &Chatbot,
        conversation_id: &str,
        question: &ConversationMessage,
    ) -> Result<EventStream> {
        let (client, request) = self.prepare_request(chatbot, conversation_id, question).await?;
        Ok(client.chat_stream(request).await?)
    }

    // ----- web widget ----------------------------------------------------

    async fn web_conversation(
        &self,
        chatbot: &Chatbot,
        conversation_id: Option<&str>,
        visitor_id: Option<&str>,
    ) -> Result<Conversation> {
        if let Some(id) = conversation_id {
            return match self.persist.get_conversation(id).await? {
                Some(c) if c.chatbot_id == chatbot.id && c.channel == Channel::Web => Ok(c),
                _ => Err(EngineError::not_found("Conversation", id)),
            };
        }

        let visitor = visitor_id
            .map(String::from)
            .unwrap_or_else(chatsa_types::new_id);
        let (conversation, _) = self
            .find_or_create_conversation(&chatbot.id, Channel::Web, &visitor)
            .await?;
        Ok(conversation)
    }

    /// Shared front half of the widget chat: store the question, check
    /// takeover and quota
    async fn begin_web_chat(
        &self,
        chatbot_id: &str,
        conversation_id: Option<&str>,
        visitor_id: Option<&str>,
        text: &str,
    ) -> Result<(Chatbot, Conversation, ConversationMessage, Option<Team>)> {
        let chatbot = self.load_chatbot(chatbot_id).await?;
        let mut conversation = self.web_conversation(&chatbot, conversation_id, visitor_id).await?;
        let question = self.record_user_message(&mut conversation, text, None).await?;

        if self.refresh_takeover(&mut conversation).await? {
            return Ok((chatbot, conversation, question, None));
        }

        let (team, quota) = self.team_with_quota(&chatbot.team_id).await?;
        if !quota {
            return Err(EngineError::QuotaExceeded);
        }
        Ok((chatbot, conversation, question, Some(team)))
    }

    pub async fn web_chat(
        &self,
        chatbot_id: &str,
        conversation_id: Option<&str>,
        visitor_id: Option<&str>,
        text: &str,
    ) -> Result<WebChatReply> {
        let (chatbot, conversation, question, team) = self
            .begin_web_chat(chatbot_id, conversation_id, visitor_id, text)
            .await?;

        let Some(team) = team else {
            return Ok(WebChatReply {
                conversation_id: conversation.id,
                reply: None,
                human_takeover: true,
            });
        };

        let answer = self.answer(&chatbot, &conversation.id, &question).await?;
        self.save_reply(&conversation, MessageRole::Assistant, &answer, None).await?;
        self.charge(&team).await?;

        Ok(WebChatReply {
            conversation_id: conversation.id,
            reply: Some(answer),
            human_takeover: false,
        })
    }

    /// Widget chat with the answer streamed as text deltas. The full answer
    /// is stored and charged once the stream completes.
    pub async fn web_chat_stream(
        &self,
        chatbot_id: &str,
        conversation_id: Option<&str>,
        visitor_id: Option<&str>,
        text: &str,
    ) -> Result<WebChatStream> {
        let (chatbot, conversation, question, team) = self
            .begin_web_chat(chatbot_id, conversation_id, visitor_id, text)
            .await?;

        let Some(team) = team else {
            let done: WebChatEvents = Box::pin(futures::stream::once(async {
                Ok(StreamEvent::Done { finish_reason: None })
            }));
            return Ok(WebChatStream {
                conversation_id: conversation.id,
                human_takeover: true,
                events: done,
            });
        };

        let mut upstream = self.answer_stream(&chatbot, &conversation.id, &question).await?;
        let engine = self.clone();
        let stored_conversation = conversation.clone();

        let events: WebChatEvents = Box::pin(async_stream::stream! {
            let mut full = String::new();
            while let Some(event) = upstream.next().await {
                match event {
                    Ok(StreamEvent::Message { content }) => {
                        full.push_str(&content);
                        yield Ok(StreamEvent::Message { content });
                    }
                    Ok(done @ StreamEvent::Done { .. }) => {
                        if let Err(e) = engine.finish_streamed_answer(&stored_conversation, &team, &full).await {
                            tracing::error!(conversation_id = %stored_conversation.id, error = %e, "Failed to store streamed answer");
                        }
                        yield Ok(done);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(conversation_id = %stored_conversation.id, error = %e, "LLM stream failed");
                        yield Err(e);
                        break;
                    }
                }
            }
        });

        Ok(WebChatStream {
            conversation_id: conversation.id,
            human_takeover: false,
            events,
        })
    }

    async fn finish_streamed_answer(&self, conversation: &Conversation, team: &Team, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.save_reply(conversation, MessageRole::Assistant, text, None).await?;
        self.charge(team).await
    }

    // ----- human agents --------------------------------------------------

    pub async fn set_takeover(&self, conversation_id: &str, enabled: bool) -> Result<Conversation> {
        let mut conversation = self
            .persist
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Conversation", conversation_id))?;

        conversation.set_human_takeover(enabled);
        if enabled {
            conversation.flow_cursor = None;
        }
        self.persist.save_conversation(&conversation).await?;
        tracing::info!(conversation_id = %conversation_id, enabled, "Human takeover toggled");
        Ok(conversation)
    }

    async fn channel_integration(&self, conversation: &Conversation) -> Result<Integration> {
        self.persist
            .list_integrations(&conversation.chatbot_id)
            .await?
            .into_iter()
            .find(|i| i.channel == conversation.channel && i.enabled)
            .ok_or_else(|| EngineError::not_found("Integration", conversation.channel.as_str()))
    }

    /// Reply as a human agent. Starts (or extends) the takeover and delivers
    /// the text on the conversation's channel.
    pub async fn agent_reply(&self, conversation_id: &str, text: &str) -> Result<ConversationMessage> {
        let mut conversation = self
            .persist
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Conversation", conversation_id))?;

        let mut external_id = None;
        if conversation.channel.is_meta() {
            let integration = self.channel_integration(&conversation).await?;
            let target = SendTarget {
                channel: conversation.channel,
                account_id: integration.account_id,
                access_token: integration.access_token,
                recipient_id: conversation.external_user_id.clone(),
            };
            let ids = self.messenger.send(&target, &OutboundMessage::text(text)).await?;
            self.record_sent(target.channel, &ids).await?;
            external_id = ids.into_iter().next();
        }

        conversation.set_human_takeover(true);
        conversation.flow_cursor = None;
        conversation.touch();
        self.persist.save_conversation(&conversation).await?;

        self.save_reply(&conversation, MessageRole::Agent, text, external_id.as_deref())
            .await
    }
}

fn sent_key(channel: Channel, message_id: &str) -> String {
    format!("sent:{}:{}", channel.as_str(), message_id)
}
