use serde::Serialize;

pub const RESEARCH_SYSTEM_PROMPT: &str = "You are a web research assistant. Use live web search/browsing when answering. \
Return ONLY a single JSON object with keys: \
content (string), sources (array of objects with url/title/snippet when possible). \
Keep content concise and evidence-backed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// The fixed two-message conversation sent for every query.
pub fn research_conversation(query: &str) -> Vec<Message> {
    vec![Message::system(RESEARCH_SYSTEM_PROMPT), Message::user(query)]
}
