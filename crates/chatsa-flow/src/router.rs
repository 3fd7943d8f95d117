use chatsa_types::{Conversation, QuestionFlow};

use crate::flow;

/// Why an inbound message gets no automatic reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Duplicate,
    /// Copy of a message we sent ourselves
    OwnEcho,
    NoIntegration,
    IntegrationDisabled,
    HumanTakeover,
    QuotaExhausted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::OwnEcho => "own_echo",
            Self::NoIntegration => "no_integration",
            Self::IntegrationDisabled => "integration_disabled",
            Self::HumanTakeover => "human_takeover",
            Self::QuotaExhausted => "quota_exhausted",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Skip(SkipReason),
    /// Continue or start the question flow with this id
    Flow(String),
    /// Retrieval-augmented LLM answer
    Ai,
}

/// Facts the router decides on. The engine fills them in pipeline order;
/// `conversation` is `None` while only the admission checks have run.
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    pub duplicate: bool,
    /// `None` when no integration matched the receiving account
    pub integration_enabled: Option<bool>,
    pub conversation: Option<&'a Conversation>,
    pub new_conversation: bool,
    pub takeover_active: bool,
    pub quota_available: bool,
    pub text: &'a str,
    pub flows: &'a [QuestionFlow],
}

impl<'a> RouteContext<'a> {
    /// Context for the admission checks that run before the conversation is
    /// loaded
    pub fn admission(duplicate: bool, integration_enabled: Option<bool>) -> Self {
        Self {
            duplicate,
            integration_enabled,
            conversation: None,
            new_conversation: false,
            takeover_active: false,
            quota_available: true,
            text: "",
            flows: &[],
        }
    }
}

/// Decides how an inbound message is handled
pub trait Router: Send + Sync {
    fn route(&self, ctx: &RouteContext<'_>) -> Route;
}

/// Skip checks first, then an active or triggered flow, then the AI answer
pub struct DefaultRouter;

impl Router for DefaultRouter {
    fn route(&self, ctx: &RouteContext<'_>) -> Route {
        if ctx.duplicate {
            return Route::Skip(SkipReason::Duplicate);
        }
        match ctx.integration_enabled {
            None => return Route::Skip(SkipReason::NoIntegration),
            Some(false) => return Route::Skip(SkipReason::IntegrationDisabled),
            Some(true) => {}
        }

        let Some(conversation) = ctx.conversation else {
            // admission passed; the caller routes again once it has the conversation
            return Route::Ai;
        };

        if ctx.takeover_active {
            return Route::Skip(SkipReason::HumanTakeover);
        }

        if let Some(cursor) = &conversation.flow_cursor {
            let active = ctx
                .flows
                .iter()
                .any(|f| f.id == cursor.flow_id && f.enabled);
            if active {
                return Route::Flow(cursor.flow_id.clone());
            }
        }

        if let Some(flow) = flow::select_flow(ctx.flows, ctx.text, ctx.new_conversation) {
            return Route::Flow(flow.id.clone());
        }

        if !ctx.quota_available {
            return Route::Skip(SkipReason::QuotaExhausted);
        }

        Route::Ai
    }
}
