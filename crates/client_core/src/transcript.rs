use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::protocol::Product;
use storage::{load_json, save_json, KeyValueStore};

use crate::store_keys;

pub const MATCHES_TEXT: &str = "Here are some laptops that match your requirements:";
pub const NO_MATCH_TEXT: &str =
    "I couldn't find any laptops matching your requirements. Could you try a different query?";
pub const FAILURE_TEXT: &str = "Failed to get results from AI assistant.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sender", rename_all = "lowercase")]
pub enum ChatMessage {
    User {
        text: String,
        #[serde(default = "Utc::now")]
        sent_at: DateTime<Utc>,
    },
    Bot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        laptops: Vec<Product>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        specs: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default = "Utc::now")]
        sent_at: DateTime<Utc>,
    },
}

impl ChatMessage {
    pub fn is_user(&self) -> bool {
        matches!(self, ChatMessage::User { .. })
    }

    /// Line shown for the message; bot failures show their error.
    pub fn display_text(&self) -> &str {
        match self {
            ChatMessage::User { text, .. } => text.as_str(),
            ChatMessage::Bot {
                text: Some(text), ..
            } => text.as_str(),
            ChatMessage::Bot {
                error: Some(error), ..
            } => error.as_str(),
            ChatMessage::Bot { .. } => "",
        }
    }
}

/// Chat history shared by the chatbot screen and the listing's chatbot mode,
/// kept under the `chatMessages` key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
}

impl ChatTranscript {
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let messages = load_json(store, store_keys::CHAT_MESSAGES)
            .await?
            .unwrap_or_default();
        Ok(Self { messages })
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        save_json(store, store_keys::CHAT_MESSAGES, &self.messages).await
    }

    pub async fn clear(&mut self, store: &dyn KeyValueStore) -> Result<()> {
        self.messages.clear();
        store.remove(store_keys::CHAT_MESSAGES).await
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Specs extracted from the most recent bot answer that carried any.
    pub fn last_specs(&self) -> Option<&Value> {
        self.messages.iter().rev().find_map(|message| match message {
            ChatMessage::Bot {
                specs: Some(specs), ..
            } => Some(specs),
            _ => None,
        })
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::User {
            text: text.into(),
            sent_at: Utc::now(),
        });
    }

    pub fn push_matches(&mut self, laptops: Vec<Product>, specs: Option<Value>) {
        self.messages.push(ChatMessage::Bot {
            text: Some(MATCHES_TEXT.to_string()),
            laptops,
            specs,
            error: None,
            sent_at: Utc::now(),
        });
    }

    pub fn push_no_match(&mut self) {
        self.messages.push(ChatMessage::Bot {
            text: Some(NO_MATCH_TEXT.to_string()),
            laptops: Vec::new(),
            specs: None,
            error: None,
            sent_at: Utc::now(),
        });
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.messages.push(ChatMessage::Bot {
            text: None,
            laptops: Vec::new(),
            specs: None,
            error: Some(if error.is_empty() {
                FAILURE_TEXT.to_string()
            } else {
                error
            }),
            sent_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use storage::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn transcript_survives_save_and_load() {
        let store = MemoryStore::new();
        let mut transcript = ChatTranscript::load(&store).await.expect("load");
        assert!(transcript.messages().is_empty());

        transcript.push_user("thin and light");
        transcript.push_no_match();
        transcript.push_error("");
        transcript.save(&store).await.expect("save");

        let reloaded = ChatTranscript::load(&store).await.expect("reload");
        assert_eq!(reloaded, transcript);
        assert!(reloaded.messages()[0].is_user());
        assert_eq!(reloaded.messages()[1].display_text(), NO_MATCH_TEXT);
        assert_eq!(reloaded.messages()[2].display_text(), FAILURE_TEXT);
    }

    #[tokio::test]
    async fn reads_entries_without_timestamps() {
        let raw = json!([
            { "sender": "user", "text": "gaming" },
            { "sender": "bot", "error": "Chatbot request failed with status 500" }
        ]);
        let store =
            MemoryStore::with_entries([(store_keys::CHAT_MESSAGES, raw.to_string())]);

        let mut transcript = ChatTranscript::load(&store).await.expect("load");
        assert_eq!(transcript.messages().len(), 2);
        assert_eq!(
            transcript.messages()[1].display_text(),
            "Chatbot request failed with status 500"
        );

        transcript.clear(&store).await.expect("clear");
        assert!(store
            .get(store_keys::CHAT_MESSAGES)
            .await
            .expect("get")
            .is_none());
    }

    #[tokio::test]
    async fn corrupt_history_starts_empty() {
        let store = MemoryStore::with_entries([(store_keys::CHAT_MESSAGES, "{not json")]);
        let transcript = ChatTranscript::load(&store).await.expect("load");
        assert!(transcript.messages().is_empty());
    }
}
