use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scripted question/answer graph used on messaging channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionFlow {
    pub id: String,
    pub chatbot_id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Empty means this is the chatbot's default flow
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl QuestionFlow {
    pub fn new(
        chatbot_id: impl Into<String>,
        name: impl Into<String>,
        nodes: Vec<FlowNode>,
        edges: Vec<FlowEdge>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: crate::new_id(),
            chatbot_id: chatbot_id.into(),
            name: name.into(),
            enabled: true,
            trigger_keywords: Vec::new(),
            nodes,
            edges,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_triggers(mut self, keywords: Vec<String>) -> Self {
        self.trigger_keywords = keywords;
        self
    }

    pub fn node(&self, node_id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn is_default(&self) -> bool {
        self.trigger_keywords.iter().all(|k| k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: FlowNodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowNodeKind {
    Question {
        text: String,
        options: Vec<String>,
    },
    Message {
        text: String,
    },
    End {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl FlowNode {
    pub fn question(id: impl Into<String>, text: impl Into<String>, options: Vec<&str>) -> Self {
        Self {
            id: id.into(),
            kind: FlowNodeKind::Question {
                text: text.into(),
                options: options.into_iter().map(String::from).collect(),
            },
        }
    }

    pub fn message(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: FlowNodeKind::Message { text: text.into() },
        }
    }

    pub fn end(id: impl Into<String>, text: Option<&str>) -> Self {
        Self {
            id: id.into(),
            kind: FlowNodeKind::End { text: text.map(String::from) },
        }
    }

    pub fn options(&self) -> &[String] {
        match &self.kind {
            FlowNodeKind::Question { options, .. } => options,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
    /// Selected option on the source question; absent for message nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_index: Option<usize>,
}

impl FlowEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            option_index: None,
        }
    }

    pub fn on_option(source: impl Into<String>, option_index: usize, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            option_index: Some(option_index),
        }
    }
}
