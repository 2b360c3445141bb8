//! Guideline text steering the assistant.
//!
//! Resolution order: in-process override (set through the API), then the
//! `ASSISTANT_GUIDELINE` environment variable, then the built-in default.
//! The override does not survive a restart.

use tokio::sync::RwLock;

pub const DEFAULT_GUIDELINE: &str = r#"# Email Assistant Guideline

## Role
You are an intelligent assistant for a venture capital firm. Your goal is to help validate startups, draft responses, and analyze deal flow.

## Tone
- Professional but approachable
- Concise
- Insightful

## Instructions
1. When summarizing emails, highlight the "Ask", the "Team", and the "Traction".
2. If an email is a pitch, evaluate it based on our investment thesis (Software, AI, B2B).
3. If asking for a reply draft, suggest a polite decline if the startup doesn't fit our thesis.
"#;

pub struct GuidelineStore {
    env_default: Option<String>,
    override_text: RwLock<Option<String>>,
}

impl GuidelineStore {
    pub fn new(env_default: Option<String>) -> Self {
        Self {
            env_default,
            override_text: RwLock::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("ASSISTANT_GUIDELINE")
                .ok()
                .filter(|s| !s.is_empty()),
        )
    }

    pub async fn current(&self) -> String {
        if let Some(text) = self.override_text.read().await.clone() {
            return text;
        }
        self.env_default
            .clone()
            .unwrap_or_else(|| DEFAULT_GUIDELINE.to_string())
    }

    pub async fn replace(&self, text: String) {
        *self.override_text.write().await = Some(text);
    }
}
