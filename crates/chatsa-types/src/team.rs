use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Length of a billing period for message credits
pub const BILLING_PERIOD_DAYS: i64 = 30;

/// Subscription plan of a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Starter,
    Pro,
    Business,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    /// AI answers allowed per billing period
    pub message_credits: u64,
    pub max_chatbots: usize,
}

impl Plan {
    pub fn limits(&self) -> PlanLimits {
        match self {
            Plan::Free => PlanLimits { message_credits: 100, max_chatbots: 1 },
            Plan::Starter => PlanLimits { message_credits: 2_000, max_chatbots: 3 },
            Plan::Pro => PlanLimits { message_credits: 10_000, max_chatbots: 10 },
            Plan::Business => PlanLimits { message_credits: 40_000, max_chatbots: 50 },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Starter => "starter",
            Plan::Pro => "pro",
            Plan::Business => "business",
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "starter" => Ok(Plan::Starter),
            "pro" => Ok(Plan::Pro),
            "business" => Ok(Plan::Business),
            other => Err(format!("unknown plan: {}", other)),
        }
    }
}

/// Billing and ownership unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub owner_email: String,
    pub api_key: String,
    pub plan: Plan,
    pub messages_used: u64,
    pub period_started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    pub fn new(name: impl Into<String>, owner_email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::new_id(),
            name: name.into(),
            owner_email: owner_email.into(),
            api_key: format!("cs_{}", uuid::Uuid::new_v4().simple()),
            plan: Plan::Free,
            messages_used: 0,
            period_started_at: now,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the current billing period has ended at `now`
    pub fn period_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.period_started_at >= Duration::days(BILLING_PERIOD_DAYS)
    }

    pub fn remaining_credits(&self) -> u64 {
        self.plan.limits().message_credits.saturating_sub(self.messages_used)
    }
}
