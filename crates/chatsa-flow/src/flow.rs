//! Question-flow traversal.
//!
//! A flow is a small directed graph. Question nodes branch on the selected
//! option, message nodes have a single unlabeled exit and end nodes stop the
//! walk. The conversation stores a cursor on the question waiting for an
//! answer.

use std::collections::HashSet;

use chatsa_integrations::OutboundMessage;
use chatsa_types::{FlowCursor, FlowNode, FlowNodeKind, QuestionFlow};

use crate::error::{EngineError, Result};

/// Result of feeding one inbound reply to a flow
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStep {
    /// Messages to send, in order
    pub messages: Vec<OutboundMessage>,
    /// Where the conversation waits next; `None` once the flow is over
    pub cursor: Option<FlowCursor>,
    /// `false` when the reply matched no option and the question was re-asked
    pub matched: bool,
}

impl FlowStep {
    pub fn finished(&self) -> bool {
        self.cursor.is_none()
    }
}

/// Entry node: the first node in declaration order with no incoming edge
pub fn start_node(flow: &QuestionFlow) -> Option<&FlowNode> {
    let targets: HashSet<&str> = flow.edges.iter().map(|e| e.target.as_str()).collect();
    flow.nodes.iter().find(|n| !targets.contains(n.id.as_str()))
}

/// Follow the edge leaving `current` for the given option (question nodes)
/// or the unlabeled edge (message nodes)
pub fn next_node<'a>(
    flow: &'a QuestionFlow,
    current: &str,
    option_index: Option<usize>,
) -> Option<&'a FlowNode> {
    flow.edges
        .iter()
        .find(|e| e.source == current && e.option_index == option_index)
        .and_then(|e| flow.node(&e.target))
}

/// Map a reply to an option index.
///
/// Accepts an interactive reply id (`opt_<i>`), the option title
/// (case-insensitive) or its 1-based number.
pub fn resolve_option(node: &FlowNode, reply: &str) -> Option<usize> {
    let options = node.options();
    let reply = reply.trim();
    if options.is_empty() || reply.is_empty() {
        return None;
    }

    if let Some(index) = reply
        .strip_prefix("opt_")
        .and_then(|i| i.parse::<usize>().ok())
        .filter(|&i| i < options.len())
    {
        return Some(index);
    }

    let lowered = reply.to_lowercase();
    if let Some(index) = options.iter().position(|o| o.trim().to_lowercase() == lowered) {
        return Some(index);
    }

    reply
        .trim_end_matches(['.', ')'])
        .parse::<usize>()
        .ok()
        .filter(|&n| n >= 1 && n <= options.len())
        .map(|n| n - 1)
}

fn question_message(node: &FlowNode) -> Option<OutboundMessage> {
    match &node.kind {
        FlowNodeKind::Question { text, options } => Some(OutboundMessage::options(text.clone(), options.clone())),
        _ => None,
    }
}

/// Walk from `from`, collecting messages until a question or the end
fn walk(flow: &QuestionFlow, from: Option<&FlowNode>, messages: &mut Vec<OutboundMessage>) -> Option<FlowCursor> {
    let mut current = from;
    let mut visited = 0;

    while let Some(node) = current {
        visited += 1;
        if visited > flow.nodes.len() {
            tracing::warn!(flow_id = %flow.id, node_id = %node.id, "Flow walk cut at cycle");
            return None;
        }

        match &node.kind {
            FlowNodeKind::Question { .. } => {
                messages.extend(question_message(node));
                return Some(FlowCursor {
                    flow_id: flow.id.clone(),
                    node_id: node.id.clone(),
                });
            }
            FlowNodeKind::Message { text } => {
                messages.push(OutboundMessage::text(text.clone()));
                current = next_node(flow, &node.id, None);
            }
            FlowNodeKind::End { text } => {
                if let Some(text) = text.as_ref().filter(|t| !t.trim().is_empty()) {
                    messages.push(OutboundMessage::text(text.clone()));
                }
                return None;
            }
        }
    }

    None
}

/// Feed an inbound reply to a flow.
///
/// Without a cursor (or with a cursor on a node that no longer exists) the
/// flow starts from its entry node and the reply is not interpreted.
/// `reply_id` is the interactive payload, if the channel sent one.
pub fn advance(
    flow: &QuestionFlow,
    cursor: Option<&FlowCursor>,
    reply: &str,
    reply_id: Option<&str>,
) -> FlowStep {
    let mut messages = Vec::new();

    let waiting_on = cursor
        .filter(|c| c.flow_id == flow.id)
        .and_then(|c| flow.node(&c.node_id))
        .filter(|n| matches!(n.kind, FlowNodeKind::Question { .. }));

    let Some(question) = waiting_on else {
        let cursor = walk(flow, start_node(flow), &mut messages);
        return FlowStep { messages, cursor, matched: true };
    };

    let selected = reply_id
        .and_then(|id| resolve_option(question, id))
        .or_else(|| resolve_option(question, reply));

    match selected {
        Some(index) => {
            let next = next_node(flow, &question.id, Some(index));
            let cursor = walk(flow, next, &mut messages);
            FlowStep { messages, cursor, matched: true }
        }
        None => {
            messages.extend(question_message(question));
            FlowStep {
                messages,
                cursor: cursor.cloned(),
                matched: false,
            }
        }
    }
}

/// Structural checks run before a flow is stored
pub fn validate(flow: &QuestionFlow) -> Result<()> {
    let invalid = |msg: String| Err(EngineError::InvalidFlow(msg));

    if flow.name.trim().is_empty() {
        return invalid("name is required".to_string());
    }

    let mut ids = HashSet::new();
    for node in &flow.nodes {
        if node.id.trim().is_empty() {
            return invalid("node id is required".to_string());
        }
        if !ids.insert(node.id.as_str()) {
            return invalid(format!("duplicate node id '{}'", node.id));
        }
        match &node.kind {
            FlowNodeKind::Question { text, options } => {
                if text.trim().is_empty() {
                    return invalid(format!("question '{}' has no text", node.id));
                }
                if options.is_empty() {
                    return invalid(format!("question '{}' has no options", node.id));
                }
                if options.iter().any(|o| o.trim().is_empty()) {
                    return invalid(format!("question '{}' has an empty option", node.id));
                }
            }
            FlowNodeKind::Message { text } if text.trim().is_empty() => {
                return invalid(format!("message '{}' has no text", node.id));
            }
            _ => {}
        }
    }

    let mut exits = HashSet::new();
    for edge in &flow.edges {
        let Some(source) = flow.node(&edge.source) else {
            return invalid(format!("edge source '{}' does not exist", edge.source));
        };
        if flow.node(&edge.target).is_none() {
            return invalid(format!("edge target '{}' does not exist", edge.target));
        }

        match (&source.kind, edge.option_index) {
            (FlowNodeKind::Question { options, .. }, Some(i)) if i < options.len() => {}
            (FlowNodeKind::Question { .. }, Some(i)) => {
                return invalid(format!("edge from '{}' uses option {} out of range", edge.source, i));
            }
            (FlowNodeKind::Question { .. }, None) => {
                return invalid(format!("edge from question '{}' needs an option index", edge.source));
            }
            (FlowNodeKind::Message { .. }, None) => {}
            (FlowNodeKind::Message { .. }, Some(_)) => {
                return invalid(format!("edge from message '{}' cannot have an option index", edge.source));
            }
            (FlowNodeKind::End { .. }, _) => {
                return invalid(format!("end node '{}' cannot have outgoing edges", edge.source));
            }
        }

        if !exits.insert((edge.source.as_str(), edge.option_index)) {
            return invalid(format!("duplicate exit from '{}'", edge.source));
        }
    }

    if !flow.nodes.is_empty() && start_node(flow).is_none() {
        return invalid("flow has no entry node".to_string());
    }

    Ok(())
}

/// Whether an inbound text starts this flow by keyword
pub fn matches_trigger(flow: &QuestionFlow, text: &str) -> bool {
    if !flow.enabled {
        return false;
    }
    let text = text.to_lowercase();
    flow.trigger_keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .any(|k| !k.is_empty() && text.contains(&k))
}

/// Pick the flow an inbound text starts: a keyword match first, then the
/// default flow for the first message of a new conversation.
pub fn select_flow<'a>(
    flows: &'a [QuestionFlow],
    text: &str,
    new_conversation: bool,
) -> Option<&'a QuestionFlow> {
    flows
        .iter()
        .filter(|f| !f.nodes.is_empty())
        .find(|f| matches_trigger(f, text))
        .or_else(|| {
            new_conversation
                .then(|| flows.iter().find(|f| f.enabled && f.is_default() && !f.nodes.is_empty()))
                .flatten()
        })
}
