use chatsa_integrations::ScoredChunk;
use chatsa_llm::Message;
use chatsa_types::{ChatbotSettings, ConversationMessage, DEFAULT_SYSTEM_PROMPT};

const CONTEXT_HEADER: &str = "Answer using only the context below. If the answer is not in the context, say you don't know.";

/// Drop markup from a chunk and collapse whitespace
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// System prompt with the retrieved context appended
pub fn build_system_prompt(settings: &ChatbotSettings, chunks: &[ScoredChunk]) -> String {
    let base = if settings.system_prompt.trim().is_empty() {
        DEFAULT_SYSTEM_PROMPT
    } else {
        settings.system_prompt.trim()
    };

    let context: Vec<String> = chunks
        .iter()
        .map(|c| strip_html(&c.content))
        .filter(|c| !c.is_empty())
        .enumerate()
        .map(|(i, c)| format!("[{}] {}", i + 1, c))
        .collect();

    if context.is_empty() {
        return base.to_string();
    }

    format!("{}\n\n{}\n\n<context>\n{}\n</context>", base, CONTEXT_HEADER, context.join("\n\n"))
}

/// Full message list for one answer: system prompt, history, question
pub fn build_messages(
    settings: &ChatbotSettings,
    chunks: &[ScoredChunk],
    history: &[ConversationMessage],
    question: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(build_system_prompt(settings, chunks)));
    messages.extend(history.iter().cloned().map(Message::from));
    messages.push(Message::human(question));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsa_types::MessageRole;

    fn chunk(content: &str) -> ScoredChunk {
        ScoredChunk {
            id: "c".into(),
            content: content.into(),
            link: None,
            score: 1.0,
        }
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Open <b>9</b>-5&nbsp;daily</p>"), "Open 9 -5 daily");
        assert_eq!(strip_html("plain"), "plain");
    }

    #[test]
    fn test_system_prompt_includes_context() {
        let settings = ChatbotSettings {
            system_prompt: "You are Acme's assistant.".into(),
            ..Default::default()
        };
        let prompt = build_system_prompt(&settings, &[chunk("<p>We ship worldwide</p>"), chunk("<br>")]);
        assert!(prompt.starts_with("You are Acme's assistant."));
        assert!(prompt.contains("[1] We ship worldwide"));
        assert!(!prompt.contains("[2]"));
    }

    #[test]
    fn test_empty_context_keeps_base_prompt() {
        let settings = ChatbotSettings {
            system_prompt: "  ".into(),
            ..Default::default()
        };
        assert_eq!(build_system_prompt(&settings, &[]), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_messages_order() {
        let history = vec![
            ConversationMessage::new("c", MessageRole::User, "Hi"),
            ConversationMessage::new("c", MessageRole::Assistant, "Hello!"),
        ];
        let messages = build_messages(&ChatbotSettings::default(), &[], &history, "Prices?");
        let roles: Vec<&str> = messages.iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content().to_plain_text(), "Prices?");
    }
}
